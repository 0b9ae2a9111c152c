//! [`Outbox`] [`Notifier`] implementation.

use std::sync::{Arc, Mutex, PoisonError};

use common::operations::Notify;
use tracerr::Traced;

use super::{Error, Notification, Notifier};

/// [`Notifier`] collecting [`Notification`]s in memory.
#[derive(Clone, Debug, Default)]
pub struct Outbox {
    /// Collected [`Notification`]s.
    sent: Arc<Mutex<Vec<Notification>>>,

    /// Indicator whether this [`Outbox`] refuses to accept anything.
    broken: bool,
}

impl Outbox {
    /// Creates a new [`Outbox`] failing every delivery.
    #[must_use]
    pub fn broken() -> Self {
        Self {
            sent: Arc::default(),
            broken: true,
        }
    }

    /// Returns all the [`Notification`]s collected so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier<Notify<Notification>> for Outbox {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Notify(notification): Notify<Notification>,
    ) -> Result<Self::Ok, Self::Err> {
        if self.broken {
            return Err(tracerr::new!(Error::Undelivered(notification.kind())));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}
