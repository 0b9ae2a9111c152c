//! [`Notifier`]-related implementations.

mod log;
mod outbox;

use derive_more::{Display, Error as StdError};

use crate::domain::{
    payment, registration, room, student, transfer, Registration,
};
#[cfg(doc)]
use crate::domain::{Payment, Student, Transfer};

pub use self::{log::Log, outbox::Outbox};

/// Delivery of [`Notification`]s to [`Student`]s.
///
/// Email delivery itself lives outside of this service, so implementations
/// only hand [`Notification`]s over.
pub use common::Handler as Notifier;

/// Notification to be delivered to a [`Student`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Notification {
    /// [`Student`] should verify their email.
    EmailVerification {
        /// Email to be verified.
        email: student::Email,

        /// One-time token to verify the email with.
        token: student::VerificationToken,
    },

    /// [`Registration`] is approved.
    RegistrationApproved {
        /// ID of the approved [`Registration`].
        registration_id: registration::Id,

        /// ID of the [`Student`] to notify.
        student_id: student::Id,

        /// ID of the assigned [`room::Bed`].
        bed_id: room::bed::Id,
    },

    /// [`Registration`] is rejected.
    RegistrationRejected {
        /// ID of the rejected [`Registration`].
        registration_id: registration::Id,

        /// ID of the [`Student`] to notify.
        student_id: student::Id,

        /// Reason of the rejection.
        reason: registration::RejectionReason,
    },

    /// Contract is renewed by a new [`Registration`].
    ContractRenewed {
        /// ID of the new [`Registration`].
        registration_id: registration::Id,

        /// ID of the [`Student`] to notify.
        student_id: student::Id,

        /// Date the renewed contract ends.
        contract_end_date: registration::ContractEndDate,
    },

    /// Contract expires soon.
    ContractExpiring {
        /// ID of the expiring [`Registration`].
        registration_id: registration::Id,

        /// ID of the [`Student`] to notify.
        student_id: student::Id,

        /// Date the contract ends.
        contract_end_date: registration::ContractEndDate,
    },

    /// [`Student`] is checked out.
    CheckedOut {
        /// ID of the checked out [`Student`].
        student_id: student::Id,
    },

    /// Cash payment is rejected by a staff member.
    CashPaymentRejected {
        /// ID of the [`Payment`].
        payment_id: payment::Id,

        /// ID of the [`Student`] to notify.
        student_id: student::Id,
    },

    /// [`Transfer`] is approved.
    TransferApproved {
        /// ID of the approved [`Transfer`].
        transfer_id: transfer::Id,

        /// ID of the [`Student`] to notify.
        student_id: student::Id,
    },

    /// [`Transfer`] is rejected.
    TransferRejected {
        /// ID of the rejected [`Transfer`].
        transfer_id: transfer::Id,

        /// ID of the [`Student`] to notify.
        student_id: student::Id,
    },
}

impl Notification {
    /// Creates a [`Notification::RegistrationApproved`] out of the provided
    /// [`Registration`], if it has a [`room::Bed`] assigned.
    #[must_use]
    pub fn approved(registration: &Registration) -> Option<Self> {
        Some(Self::RegistrationApproved {
            registration_id: registration.id,
            student_id: registration.student_id,
            bed_id: registration.bed_id?,
        })
    }

    /// Returns a short name of this [`Notification`] kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EmailVerification { .. } => "email_verification",
            Self::RegistrationApproved { .. } => "registration_approved",
            Self::RegistrationRejected { .. } => "registration_rejected",
            Self::ContractRenewed { .. } => "contract_renewed",
            Self::ContractExpiring { .. } => "contract_expiring",
            Self::CheckedOut { .. } => "checked_out",
            Self::CashPaymentRejected { .. } => "cash_payment_rejected",
            Self::TransferApproved { .. } => "transfer_approved",
            Self::TransferRejected { .. } => "transfer_rejected",
        }
    }
}

/// [`Notifier`] error.
#[derive(Clone, Debug, Display, StdError)]
pub enum Error {
    /// [`Notification`] cannot be delivered.
    #[display("`{_0}` notification cannot be delivered")]
    Undelivered(#[error(not(source))] &'static str),
}
