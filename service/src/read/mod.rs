//! Read entities definitions.

pub mod meter;
pub mod payment;
pub mod registration;
pub mod stay;

/// Wrapper around an entity indicating that it's still waiting for a review.
#[derive(Clone, Copy, Debug)]
pub struct Pending<T>(pub T);
