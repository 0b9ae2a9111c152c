//! [`ExpirePaymentLinks`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::{
    operations::{By, Perform, Start, Update},
    DateTime,
};
use smart_default::SmartDefault;
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::{payment::Status, Payment};
use crate::{
    infra::{database, Database},
    read, Service,
};

use super::Task;

/// Configuration for [`ExpirePaymentLinks`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between payment links sweeps.
    #[default(time::Duration::from_secs(60 * 60))]
    pub interval: time::Duration,
}

/// [`Task`] for returning [`Status::AwaitingGateway`] [`Payment`]s with an
/// expired payment link back to [`Status::Unpaid`].
#[derive(Clone, Copy, Debug)]
pub struct ExpirePaymentLinks<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Ntf> Task<Start<By<ExpirePaymentLinks<Self>, Config>>>
    for Service<Db, Ntf>
where
    ExpirePaymentLinks<Service<Db, Ntf>>:
        Task<Perform<()>, Ok = u64, Err: Error> + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<ExpirePaymentLinks<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = ExpirePaymentLinks {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            match task.execute(Perform(())).await {
                Ok(0) => {}
                Ok(n) => log::info!("{n} payment links are expired"),
                Err(e) => {
                    log::error!("`task::ExpirePaymentLinks` failed: {e}");
                }
            }
        }
    }
}

impl<Db, Ntf> Task<Perform<()>> for ExpirePaymentLinks<Service<Db, Ntf>>
where
    Db: Database<
        Update<By<read::payment::ExpiredLink, DateTime>>,
        Ok = u64,
        Err = Traced<database::Error>,
    >,
{
    type Ok = u64;
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        self.service
            .database()
            .execute(Update(By::new(DateTime::now())))
            .await
            .map_err(tracerr::map_from_and_wrap!())
    }
}

/// Error of [`ExpirePaymentLinks`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use std::time;

    use common::{
        operations::{Perform, Update},
        DateTime,
    };

    use crate::{
        command::{
            create_payment_link::spec::unpaid, spec, Command as _,
            CreatePaymentLink,
        },
        domain::{payment, Payment},
        infra::{Database as _, Memory},
        task::Task as _,
        Service,
    };

    use super::{Config, ExpirePaymentLinks};

    #[tokio::test]
    async fn expires_only_stale_links() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let stale = unpaid(&db, 100).await;
        let fresh = unpaid(&db, 100).await;
        for p in [&stale, &fresh] {
            _ = svc
                .execute(CreatePaymentLink { payment_id: p.id })
                .await
                .unwrap();
        }
        let mut expired = spec::select::<Payment, _>(&db, stale.id)
            .await
            .unwrap();
        expired.link_expires_at = Some(
            (DateTime::now() - time::Duration::from_secs(60)).coerce(),
        );
        db.execute(Update(expired)).await.unwrap();
        let task = ExpirePaymentLinks {
            config: Config::default(),
            service: svc,
        };

        assert_eq!(task.execute(Perform(())).await.unwrap(), 1);
        assert_eq!(task.execute(Perform(())).await.unwrap(), 0);

        let stale = spec::select::<Payment, _>(&db, stale.id).await.unwrap();
        assert_eq!(stale.status, payment::Status::Unpaid);
        assert_eq!(stale.method, None);
        let fresh = spec::select::<Payment, _>(&db, fresh.id).await.unwrap();
        assert_eq!(fresh.status, payment::Status::AwaitingGateway);
    }
}
