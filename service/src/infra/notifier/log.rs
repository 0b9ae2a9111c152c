//! [`Log`] [`Notifier`] implementation.

use common::operations::Notify;
use tracerr::Traced;
use tracing as log;

use super::{Error, Notification, Notifier};

/// [`Notifier`] recording [`Notification`]s into the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

impl Notifier<Notify<Notification>> for Log {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Notify(notification): Notify<Notification>,
    ) -> Result<Self::Ok, Self::Err> {
        log::info!(
            kind = notification.kind(),
            "notification: {notification:?}",
        );
        Ok(())
    }
}
