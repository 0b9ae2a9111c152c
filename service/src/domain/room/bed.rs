//! [`Bed`] definitions.

use std::str::FromStr;

use derive_more::{AsRef, Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::{Room, Student};
use crate::domain::{room, student};

/// Bed in a [`Room`].
#[derive(Clone, Debug)]
pub struct Bed {
    /// ID of this [`Bed`].
    pub id: Id,

    /// ID of the [`Room`] this [`Bed`] belongs to.
    pub room_id: room::Id,

    /// [`Number`] of this [`Bed`], unique within its [`Room`].
    pub number: Number,

    /// ID of the [`Student`] occupying this [`Bed`], if any.
    pub student_id: Option<student::Id>,
}

impl Bed {
    /// Indicates whether this [`Bed`] is occupied.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.student_id.is_some()
    }
}

/// ID of a [`Bed`].
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

/// Number of a [`Bed`] within its [`Room`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Number(String);

impl Number {
    /// Creates a new [`Number`] if the given `number` is valid.
    #[must_use]
    pub fn new(number: impl Into<String>) -> Option<Self> {
        let number = number.into();
        (number.trim() == number && !number.is_empty() && number.len() <= 10)
            .then_some(Self(number))
    }
}

impl FromStr for Number {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `bed::Number`")
    }
}
