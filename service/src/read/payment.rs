//! [`Payment`] read model definitions.

#[cfg(doc)]
use crate::domain::{payment::Status, Payment};

/// Selector of [`Status::Unpaid`] [`Payment`]s to be marked as
/// [`Status::Overdue`].
#[derive(Clone, Copy, Debug)]
pub struct Overdue;

/// Selector of [`Status::AwaitingGateway`] [`Payment`]s whose payment link
/// has expired.
#[derive(Clone, Copy, Debug)]
pub struct ExpiredLink;
