//! [`Handler`] abstraction shared by the service layers.

use std::future::Future;

/// Something executing an operation described by `Op`.
///
/// Commands changing the dormitory state, queries reading it, periodic tasks,
/// database and notifier infrastructure are all [`Handler`]s of their
/// respective operations, so the service composes them by trait bounds only.
pub trait Handler<Op> {
    /// Outcome of a successful `Op`.
    type Ok;

    /// Reason of a failed `Op`.
    type Err;

    /// Executes the provided `Op`.
    fn execute(&self, op: Op) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}
