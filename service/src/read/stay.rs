//! [`Stay`] read model definitions.

#[cfg(doc)]
use crate::domain::Stay;

/// Wrapper around a [`Stay`] indicating that it [`is_open()`].
///
/// [`is_open()`]: Stay::is_open
#[derive(Clone, Copy, Debug)]
pub struct Open<T>(pub T);
