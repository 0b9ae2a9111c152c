//! Marker types.

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing an entity update.
#[derive(Clone, Copy, Debug)]
pub struct Modification;

/// Marker type describing an entity expiration.
#[derive(Clone, Copy, Debug)]
pub struct Expiration;

/// Marker type describing an entity settlement.
#[derive(Clone, Copy, Debug)]
pub struct Settlement;

/// Marker type describing a beginning of a span.
#[derive(Clone, Copy, Debug)]
pub struct Start;

/// Marker type describing an end of a span.
#[derive(Clone, Copy, Debug)]
pub struct End;

/// Marker type describing a birth.
#[derive(Clone, Copy, Debug)]
pub struct Birth;
