//! Service contains the business logic of the dormitory.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;
pub mod task;

use std::{error::Error, time};

use common::operations::{By, Notify, Start};
use derive_more::Debug;
use secrecy::SecretString;
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use infra::Database;
use infra::{notifier, notifier::Notification, Notifier};

pub use self::{command::Command, query::Query, task::Task};

#[cfg(test)]
use proptest as _;

/// [`Service`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// [`PaymentGateway`] configuration.
    pub payment_gateway: PaymentGateway,

    /// [`task::MarkOverduePayments`] configuration.
    pub mark_overdue_payments: task::mark_overdue_payments::Config,

    /// [`task::ExpirePaymentLinks`] configuration.
    pub expire_payment_links: task::expire_payment_links::Config,

    /// [`task::ProcessExpiringContracts`] configuration.
    pub process_expiring_contracts: task::process_expiring_contracts::Config,
}

/// Payment gateway configuration.
#[derive(Clone, Debug)]
pub struct PaymentGateway {
    /// Key the gateway signs its webhooks with.
    #[debug(skip)]
    pub checksum_key: SecretString,

    /// Duration a created payment link stays valid for.
    pub link_timeout: time::Duration,

    /// Indicator whether a webhook reporting an amount different from the
    /// owed one is rejected, rather than settled with a warning.
    pub strict_amount_check: bool,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Ntf = notifier::Log> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Notifier`] of this [`Service`].
    notifier: Ntf,
}

impl<Db, Ntf> Service<Db, Ntf> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(
        config: Config,
        database: Db,
        notifier: Ntf,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::MarkOverduePayments<Self>,
                        task::mark_overdue_payments::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Task<
                Start<
                    By<
                        task::ExpirePaymentLinks<Self>,
                        task::expire_payment_links::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Task<
                Start<
                    By<
                        task::ProcessExpiringContracts<Self>,
                        task::process_expiring_contracts::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let this = Service {
            config,
            database,
            notifier,
        };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn("mark_overdue_payments", async move {
            svc.execute(Start(By::<task::MarkOverduePayments<_>, _>::new(
                svc.config().mark_overdue_payments,
            )))
            .await
        });
        let svc = this.clone();
        bg.spawn("expire_payment_links", async move {
            svc.execute(Start(By::<task::ExpirePaymentLinks<_>, _>::new(
                svc.config().expire_payment_links,
            )))
            .await
        });
        let svc = this.clone();
        bg.spawn("process_expiring_contracts", async move {
            svc.execute(Start(By::<task::ProcessExpiringContracts<_>, _>::new(
                svc.config().process_expiring_contracts,
            )))
            .await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`Notifier`] of this [`Service`].
    #[must_use]
    pub fn notifier(&self) -> &Ntf {
        &self.notifier
    }

    /// Hands the provided [`Notification`] over to the [`Notifier`].
    ///
    /// Failures are only logged, as notifications are sent once the changes
    /// are committed already.
    pub(crate) async fn notify(&self, notification: Notification)
    where
        Ntf: Notifier<
            Notify<Notification>,
            Ok = (),
            Err = Traced<notifier::Error>,
        >,
    {
        let kind = notification.kind();
        if let Err(e) = self.notifier.execute(Notify(notification)).await {
            log::warn!(kind, "failed to send notification: {e}");
        }
    }
}

#[cfg(test)]
impl<Db> Service<Db, notifier::Outbox> {
    /// Creates a new [`Service`] for tests, with an empty [`notifier::Outbox`]
    /// and no background [`Task`]s running.
    pub(crate) fn spec(database: Db) -> Self {
        Self::spec_with(database, notifier::Outbox::default())
    }

    /// Creates a new [`Service`] for tests with the provided
    /// [`notifier::Outbox`].
    pub(crate) fn spec_with(database: Db, notifier: notifier::Outbox) -> Self {
        Service {
            config: Config {
                payment_gateway: PaymentGateway {
                    checksum_key: SecretString::from("checksum"),
                    link_timeout: time::Duration::from_secs(15 * 60),
                    strict_amount_check: true,
                },
                mark_overdue_payments: task::mark_overdue_payments::Config::default(),
                expire_payment_links: task::expire_payment_links::Config::default(),
                process_expiring_contracts:
                    task::process_expiring_contracts::Config::default(),
            },
            database,
            notifier,
        }
    }
}
