//! [`MarkOverduePayments`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Perform, Start, Update};
use smart_default::SmartDefault;
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::{payment::Status, Payment};
use crate::{
    domain::payment,
    infra::{database, Database},
    read, Service,
};

use super::Task;

/// Configuration for [`MarkOverduePayments`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between [`Payment`]s sweeps.
    #[default(time::Duration::from_secs(24 * 60 * 60))]
    pub interval: time::Duration,

    /// Duration after creation, during which a [`Payment`] is not overdue
    /// yet.
    #[default(time::Duration::from_secs(24 * 60 * 60))]
    pub grace_period: time::Duration,
}

/// [`Task`] for marking [`Status::Unpaid`] [`Payment`]s as
/// [`Status::Overdue`] once their grace period ends.
#[derive(Clone, Copy, Debug)]
pub struct MarkOverduePayments<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Ntf> Task<Start<By<MarkOverduePayments<Self>, Config>>>
    for Service<Db, Ntf>
where
    MarkOverduePayments<Service<Db, Ntf>>:
        Task<Perform<()>, Ok = u64, Err: Error> + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<MarkOverduePayments<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = MarkOverduePayments {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            match task.execute(Perform(())).await {
                Ok(0) => {}
                Ok(n) => log::info!("{n} `Payment`s are marked as overdue"),
                Err(e) => {
                    log::error!("`task::MarkOverduePayments` failed: {e}");
                }
            }
        }
    }
}

impl<Db, Ntf> Task<Perform<()>> for MarkOverduePayments<Service<Db, Ntf>>
where
    Db: Database<
        Update<By<read::payment::Overdue, payment::CreationDateTime>>,
        Ok = u64,
        Err = Traced<database::Error>,
    >,
{
    type Ok = u64;
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let deadline =
            payment::CreationDateTime::now() - self.config.grace_period;
        self.service
            .database()
            .execute(Update(By::new(deadline)))
            .await
            .map_err(tracerr::map_from_and_wrap!())
    }
}

/// Error of [`MarkOverduePayments`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use std::time;

    use common::{
        operations::{By, Insert, Perform, Select},
        DateTime, Money,
    };
    use rust_decimal::Decimal;

    use crate::{
        domain::{payment, student, Payment},
        infra::{Database as _, Memory},
        task::Task as _,
        Service,
    };

    use super::{Config, MarkOverduePayments};

    fn payment(age: time::Duration) -> Payment {
        let mut p = Payment::new(
            payment::Key {
                student_id: student::Id::new(),
                room_id: None,
                month: "09/2024".parse().unwrap(),
                kind: payment::Kind::Rent,
            },
            Money::vnd(Decimal::from(100)),
        );
        p.created_at = (DateTime::now() - age).coerce();
        p
    }

    #[tokio::test]
    async fn marks_only_stale_unpaid_payments() {
        let db = Memory::new();
        let day = time::Duration::from_secs(24 * 60 * 60);
        let stale = payment(2 * day);
        let fresh = payment(time::Duration::from_secs(60));
        let mut paid = payment(2 * day);
        paid.settle(DateTime::now());
        for p in [&stale, &fresh, &paid] {
            db.execute(Insert(p.clone())).await.unwrap();
        }
        let task = MarkOverduePayments {
            config: Config::default(),
            service: Service::spec(db.clone()),
        };

        assert_eq!(task.execute(Perform(())).await.unwrap(), 1);
        assert_eq!(task.execute(Perform(())).await.unwrap(), 0);

        let status = |id: payment::Id| {
            let db = db.clone();
            async move {
                db.execute(Select(By::<Option<Payment>, _>::new(id)))
                    .await
                    .unwrap()
                    .unwrap()
                    .status
            }
        };
        assert_eq!(status(stale.id).await, payment::Status::Overdue);
        assert_eq!(status(fresh.id).await, payment::Status::Unpaid);
        assert_eq!(status(paid.id).await, payment::Status::Paid);
    }
}
