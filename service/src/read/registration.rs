//! [`Registration`] read model definitions.

#[cfg(doc)]
use crate::domain::{registration::Status, Registration};

/// Wrapper around a [`Registration`] indicating that it's [`Approved`].
///
/// [`Approved`]: Status::Approved
#[derive(Clone, Copy, Debug)]
pub struct Approved<T>(pub T);

/// Wrapper around the latest [`Approved`] [`Registration`] of a [`Student`]
/// still holding a bed, whose contract is about to end (or has ended).
///
/// [`Student`]: crate::domain::Student
#[derive(Clone, Copy, Debug)]
pub struct Expiring<T>(pub T);
