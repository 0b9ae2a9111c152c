//! [`ProcessExpiringContracts`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::{
    operations::{By, Notify, Perform, Select, Start, Update},
    Date, DateTime,
};
use smart_default::SmartDefault;
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    command::{
        check_out_student, renew_registration, CheckOutStudent,
        RenewRegistration,
    },
    domain::{registration, student, Registration, Student},
    infra::{
        database,
        notifier::{self, Notification},
        Database, Notifier,
    },
    read::{registration::Expiring, Pending},
    Command, Service,
};

use super::Task;

/// Configuration for [`ProcessExpiringContracts`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between contracts sweeps.
    #[default(time::Duration::from_secs(24 * 60 * 60))]
    pub interval: time::Duration,

    /// Number of days before the contract end to start processing it.
    #[default(7)]
    pub window_days: u16,
}

/// [`Task`] processing contracts ending soon.
///
/// A [`Student`] is reminded once per [`Registration`]. Contracts of
/// [`student::RenewalIntent::Renew`] are renewed, while
/// [`student::RenewalIntent::Leave`] ones are checked out once ended. A
/// contract ended without any pending renewal is checked out as well.
#[derive(Clone, Copy, Debug)]
pub struct ProcessExpiringContracts<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

/// Outcome of a single [`ProcessExpiringContracts`] sweep.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Outcome {
    /// Number of reminded [`Student`]s.
    pub reminded: usize,

    /// Number of renewed contracts.
    pub renewed: usize,

    /// Number of checked out [`Student`]s.
    pub checked_out: usize,
}

impl<Db, Ntf> Task<Start<By<ProcessExpiringContracts<Self>, Config>>>
    for Service<Db, Ntf>
where
    ProcessExpiringContracts<Service<Db, Ntf>>:
        Task<Perform<()>, Ok = Outcome, Err: Error> + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<ProcessExpiringContracts<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = ProcessExpiringContracts {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            match task.execute(Perform(())).await {
                Ok(o) if o == Outcome::default() => {}
                Ok(o) => log::info!(
                    reminded = o.reminded,
                    renewed = o.renewed,
                    checked_out = o.checked_out,
                    "expiring contracts are processed",
                ),
                Err(e) => {
                    log::error!(
                        "`task::ProcessExpiringContracts` failed: {e}",
                    );
                }
            }
        }
    }
}

impl<Db, Ntf> Task<Perform<()>> for ProcessExpiringContracts<Service<Db, Ntf>>
where
    Db: Database<
            Select<
                By<Vec<Expiring<Registration>>, registration::ContractEndDate>,
            >,
            Ok = Vec<Expiring<Registration>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Student>, student::Id>>,
            Ok = Option<Student>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Pending<Registration>>, student::Id>>,
            Ok = Option<Pending<Registration>>,
            Err = Traced<database::Error>,
        > + Database<Update<Registration>, Err = Traced<database::Error>>,
    Ntf: Notifier<
        Notify<Notification>,
        Ok = (),
        Err = Traced<notifier::Error>,
    >,
    Service<Db, Ntf>: Command<
            RenewRegistration,
            Ok = Registration,
            Err = Traced<renew_registration::ExecutionError>,
        > + Command<
            CheckOutStudent,
            Ok = Student,
            Err = Traced<check_out_student::ExecutionError>,
        >,
{
    type Ok = Outcome;
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        use renew_registration::ExecutionError as RenewError;

        let today = Date::today();
        let until: registration::ContractEndDate = today
            .add_days(i64::from(self.config.window_days))
            .coerce();
        let svc = &self.service;

        let expiring = svc
            .database()
            .execute(Select(By::<Vec<Expiring<Registration>>, _>::new(until)))
            .await
            .map_err(tracerr::wrap!())?;

        let mut outcome = Outcome::default();
        for Expiring(mut registration) in expiring {
            let Some(end) = registration.contract_end_date else {
                continue;
            };
            let Some(student) = svc
                .database()
                .execute(Select(By::<Option<Student>, _>::new(
                    registration.student_id,
                )))
                .await
                .map_err(tracerr::wrap!())?
            else {
                continue;
            };

            if registration.reminded_at.is_none() {
                registration.reminded_at = Some(DateTime::now().coerce());
                svc.database()
                    .execute(Update(registration.clone()))
                    .await
                    .map_err(tracerr::wrap!())?;
                svc.notify(Notification::ContractExpiring {
                    registration_id: registration.id,
                    student_id: student.id,
                    contract_end_date: end,
                })
                .await;
                outcome.reminded += 1;
            }

            let end: Date = end.coerce();
            let check_out = match student.renewal_intent {
                student::RenewalIntent::Renew if end < today => {
                    let pending = svc
                        .database()
                        .execute(Select(
                            By::<Option<Pending<Registration>>, _>::new(
                                student.id,
                            ),
                        ))
                        .await
                        .map_err(tracerr::wrap!())?;
                    if pending.is_some() {
                        log::debug!(
                            student_id = %student.id,
                            "ended contract awaits renewal review",
                        );
                    }
                    pending.is_none()
                }
                student::RenewalIntent::Renew => {
                    let cmd = RenewRegistration {
                        student_id: student.id,
                    };
                    match svc.execute(cmd).await {
                        Ok(_) => outcome.renewed += 1,
                        Err(e) => match e.as_ref() {
                            skip @ (RenewError::PendingExists(_)
                            | RenewError::NotWithinRenewalWindow(_)) => {
                                log::debug!(
                                    student_id = %student.id,
                                    "contract is not renewed: {skip}",
                                );
                            }
                            _ => log::error!(
                                student_id = %student.id,
                                "failed to renew contract: {e}",
                            ),
                        },
                    }
                    false
                }
                student::RenewalIntent::Leave => end <= today,
                student::RenewalIntent::Undecided => false,
            };

            if check_out {
                let cmd = CheckOutStudent {
                    student_id: student.id,
                };
                match svc.execute(cmd).await {
                    Ok(_) => outcome.checked_out += 1,
                    Err(e) => log::error!(
                        student_id = %student.id,
                        "failed to check out: {e}",
                    ),
                }
            }
        }
        Ok(outcome)
    }
}

/// Error of [`ProcessExpiringContracts`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use common::operations::{By, Perform, Select};

    use crate::{
        command::{
            renew_registration::spec::ending_in, spec, Command as _,
            RejectRegistration, SetRenewalIntent,
        },
        domain::{registration, student, Payment, Registration, Student},
        infra::{
            notifier::{Notification, Outbox},
            Database as _, Memory,
        },
        read::Pending,
        task::Task as _,
        Service,
    };

    use super::{Config, Outcome, ProcessExpiringContracts};

    fn task(
        svc: &Service<Memory, Outbox>,
    ) -> ProcessExpiringContracts<Service<Memory, Outbox>> {
        ProcessExpiringContracts {
            config: Config::default(),
            service: svc.clone(),
        }
    }

    async fn intend(
        svc: &Service<Memory, Outbox>,
        student: &Student,
        intent: student::RenewalIntent,
    ) {
        _ = svc
            .execute(SetRenewalIntent {
                student_id: student.id,
                intent,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reminds_and_renews_once() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (student, approved) =
            spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;
        let approved = ending_in(&db, approved, 3).await;
        intend(&svc, &student, student::RenewalIntent::Renew).await;

        let first = task(&svc).execute(Perform(())).await.unwrap();
        let second = task(&svc).execute(Perform(())).await.unwrap();

        assert_eq!(
            first,
            Outcome {
                reminded: 1,
                renewed: 1,
                checked_out: 0,
            },
        );
        assert_eq!(second, Outcome::default());
        let stored = spec::select::<Registration, _>(&db, approved.id)
            .await
            .unwrap();
        assert!(stored.reminded_at.is_some());
        let sent = svc.notifier().sent();
        assert_eq!(
            sent.iter()
                .filter(|n| matches!(n, Notification::ContractExpiring { .. }))
                .count(),
            1,
        );
        assert!(sent
            .iter()
            .any(|n| matches!(n, Notification::ContractRenewed { .. })));
    }

    #[tokio::test]
    async fn checks_out_leaving_student_once_ended() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (student, approved) =
            spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;
        intend(&svc, &student, student::RenewalIntent::Leave).await;

        let approved = ending_in(&db, approved, 2).await;
        let early = task(&svc).execute(Perform(())).await.unwrap();
        assert_eq!(early.checked_out, 0);

        _ = ending_in(&db, approved, 0).await;
        let ended = task(&svc).execute(Perform(())).await.unwrap();
        assert_eq!(ended.checked_out, 1);
        let student = spec::select::<Student, _>(&db, student.id)
            .await
            .unwrap();
        assert_eq!(student.status, student::Status::Ended);
    }

    #[tokio::test]
    async fn leaves_undecided_student() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (student, approved) =
            spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;
        _ = ending_in(&db, approved, -1).await;

        let outcome = task(&svc).execute(Perform(())).await.unwrap();

        assert_eq!(outcome.renewed + outcome.checked_out, 0);
        let student = spec::select::<Student, _>(&db, student.id)
            .await
            .unwrap();
        assert_eq!(student.status, student::Status::Resident);
    }

    #[tokio::test]
    async fn checks_out_after_rejected_renewal() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (student, approved) =
            spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;
        let approved = ending_in(&db, approved, 3).await;
        spec::drop_invoices(&db, &student).await;
        intend(&svc, &student, student::RenewalIntent::Renew).await;
        let first = task(&svc).execute(Perform(())).await.unwrap();
        assert_eq!(first.renewed, 1);
        let Pending(renewal) = db
            .execute(Select(By::<Option<Pending<Registration>>, _>::new(
                student.id,
            )))
            .await
            .unwrap()
            .unwrap();
        _ = svc
            .execute(RejectRegistration {
                registration_id: renewal.id,
                reason: registration::RejectionReason::new("Room is closed")
                    .unwrap(),
                approver_id: spec::staff(),
            })
            .await
            .unwrap();

        let early = task(&svc).execute(Perform(())).await.unwrap();
        assert_eq!(early, Outcome::default());

        _ = ending_in(&db, approved, 0).await;
        let ended = task(&svc).execute(Perform(())).await.unwrap();
        assert_eq!(ended.checked_out, 1);
        let student = spec::select::<Student, _>(&db, student.id)
            .await
            .unwrap();
        assert_eq!(student.status, student::Status::Ended);
        let payments = db
            .execute(Select(By::<Vec<Payment>, _>::new(student.id)))
            .await
            .unwrap();
        assert!(payments.is_empty(), "rejected term is billed");
    }

    #[tokio::test]
    async fn checks_out_ended_unrenewed_contract() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (student, approved) =
            spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;
        intend(&svc, &student, student::RenewalIntent::Renew).await;
        _ = ending_in(&db, approved, -1).await;

        let outcome = task(&svc).execute(Perform(())).await.unwrap();

        assert_eq!(outcome.renewed, 0);
        assert_eq!(outcome.checked_out, 1);
        let student = spec::select::<Student, _>(&db, student.id)
            .await
            .unwrap();
        assert_eq!(student.status, student::Status::Ended);
    }
}
