//! [`Registration`] definitions.

use std::str::FromStr;

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateOf, DateTimeOf};
use derive_more::{AsRef, Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::{Bed, Room, Student};
use crate::domain::{room, staff, student};

/// Single registration (or renewal) cycle of a [`Student`].
#[derive(Clone, Debug)]
pub struct Registration {
    /// ID of this [`Registration`].
    pub id: Id,

    /// ID of the registered [`Student`].
    pub student_id: student::Id,

    /// ID of the requested or assigned [`Room`], if any.
    pub room_id: Option<room::Id>,

    /// ID of the assigned [`Bed`], if any.
    pub bed_id: Option<room::bed::Id>,

    /// Requested date of moving in, if any.
    pub move_in_date: Option<MoveInDate>,

    /// Date the contract of this [`Registration`] ends, if known.
    pub contract_end_date: Option<ContractEndDate>,

    /// Free-text [`Preference`] of the [`Student`].
    pub preference: Option<Preference>,

    /// [`Status`] of this [`Registration`].
    pub status: Status,

    /// [`RejectionReason`] if this [`Registration`] was rejected.
    pub rejection_reason: Option<RejectionReason>,

    /// ID of the staff member who reviewed this [`Registration`], if any.
    pub reviewed_by: Option<staff::Id>,

    /// [`DateTime`] when this [`Registration`] was reviewed, if it was.
    pub reviewed_at: Option<ReviewDateTime>,

    /// ID of the [`Registration`] this one renews, if any.
    pub renewal_of: Option<Id>,

    /// [`DateTime`] when the [`Student`] was reminded about the contract
    /// expiration, if they were.
    pub reminded_at: Option<ReminderDateTime>,

    /// [`DateTime`] when this [`Registration`] was submitted.
    pub created_at: CreationDateTime,
}

/// ID of a [`Registration`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    derive_more::FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

define_kind! {
    #[doc = "Status of a [`Registration`]."]
    enum Status {
        #[doc = "Waiting for a review."]
        Pending = "CHO_DUYET",

        #[doc = "Approved by a staff member."]
        Approved = "DA_DUYET",

        #[doc = "Rejected by a staff member."]
        Rejected = "TU_CHOI",
    }
}

/// Free-text preference of a [`Student`] regarding the accommodation.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Preference(String);

impl Preference {
    /// Creates a new [`Preference`] if the given `text` is valid.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        (!text.trim().is_empty() && text.len() <= 1000).then_some(Self(text))
    }
}

impl FromStr for Preference {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Preference`")
    }
}

/// Reason of rejecting a [`Registration`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct RejectionReason(String);

impl RejectionReason {
    /// Creates a new [`RejectionReason`] if the given `reason` is valid.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Option<Self> {
        let reason = reason.into();
        (!reason.trim().is_empty() && reason.len() <= 500)
            .then_some(Self(reason))
    }
}

impl FromStr for RejectionReason {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `RejectionReason`")
    }
}

/// Date of moving in under a [`Registration`].
pub type MoveInDate = DateOf<(Registration, unit::Start)>;

/// Date a [`Registration`] contract ends.
pub type ContractEndDate = DateOf<(Registration, unit::End)>;

/// [`DateTime`] when a [`Registration`] was submitted.
pub type CreationDateTime = DateTimeOf<(Registration, unit::Creation)>;

/// [`DateTime`] when a [`Registration`] was reviewed.
pub type ReviewDateTime = DateTimeOf<(Registration, unit::Modification)>;

/// [`DateTime`] when a [`Student`] was reminded about a [`Registration`]
/// expiration.
pub type ReminderDateTime = DateTimeOf<(Registration, unit::Expiration)>;
