//! Room [`Transfer`] definitions.

use std::str::FromStr;

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf};
use derive_more::{AsRef, Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use crate::domain::registration::RejectionReason;
#[cfg(doc)]
use crate::domain::{Room, Student};
use crate::domain::{room, staff, student};

/// Request of a [`Student`] to move into another [`Room`].
#[derive(Clone, Debug)]
pub struct Transfer {
    /// ID of this [`Transfer`].
    pub id: Id,

    /// ID of the [`Student`] requesting this [`Transfer`].
    pub student_id: student::Id,

    /// ID of the [`Room`] the [`Student`] stays in.
    pub from_room_id: room::Id,

    /// ID of the [`Room`] the [`Student`] wants to move into.
    pub to_room_id: room::Id,

    /// [`Reason`] of this [`Transfer`].
    pub reason: Reason,

    /// [`Status`] of this [`Transfer`].
    pub status: Status,

    /// ID of the staff member who reviewed this [`Transfer`], if any.
    pub reviewed_by: Option<staff::Id>,

    /// [`DateTime`] when this [`Transfer`] was reviewed, if it was.
    pub reviewed_at: Option<ReviewDateTime>,

    /// [`RejectionReason`] if this [`Transfer`] was rejected.
    pub rejection_reason: Option<RejectionReason>,

    /// [`DateTime`] when this [`Transfer`] was requested.
    pub created_at: CreationDateTime,
}

/// ID of a [`Transfer`].
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
    #[doc = "Status of a [`Transfer`]."]
    enum Status {
        #[doc = "Waiting for a review."]
        Pending = "CHO_DUYET",

        #[doc = "Approved by a staff member."]
        Approved = "DA_DUYET",

        #[doc = "Rejected by a staff member."]
        Rejected = "TU_CHOI",
    }
}

/// Reason of a [`Student`] to request a [`Transfer`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Reason(String);

impl Reason {
    /// Creates a new [`Reason`] if the given `reason` is valid.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Option<Self> {
        let reason = reason.into();
        (!reason.trim().is_empty() && reason.len() <= 1000)
            .then_some(Self(reason))
    }
}

impl FromStr for Reason {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Reason`")
    }
}

/// [`DateTime`] when a [`Transfer`] was requested.
pub type CreationDateTime = DateTimeOf<(Transfer, unit::Creation)>;

/// [`DateTime`] when a [`Transfer`] was reviewed.
pub type ReviewDateTime = DateTimeOf<(Transfer, unit::Modification)>;
