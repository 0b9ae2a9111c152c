//! [`Payment`] definitions.

pub mod gateway;

use std::str::FromStr;

use common::{define_kind, unit, DateTime, DateTimeOf, Money, Month};
use derive_more::{AsRef, Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xxhash_rust::xxh3;

#[cfg(doc)]
use crate::domain::{Room, Student};
use crate::domain::{room, student};

/// Payment obligation of a [`Student`].
#[derive(Clone, Debug)]
pub struct Payment {
    /// ID of this [`Payment`].
    pub id: Id,

    /// ID of the [`Student`] owing this [`Payment`].
    pub student_id: student::Id,

    /// ID of the [`Room`] this [`Payment`] is charged for, if any.
    pub room_id: Option<room::Id>,

    /// [`Kind`] of this [`Payment`].
    pub kind: Kind,

    /// [`Method`] this [`Payment`] is being settled with, if chosen.
    pub method: Option<Method>,

    /// Billing [`Month`] of this [`Payment`].
    pub month: Month,

    /// Owed amount.
    pub amount: Money,

    /// [`Status`] of this [`Payment`].
    pub status: Status,

    /// [`OrderCode`] of the last payment link created for this [`Payment`].
    pub order_code: Option<OrderCode>,

    /// [`DateTime`] when the payment link of this [`Payment`] expires.
    pub link_expires_at: Option<LinkExpirationDateTime>,

    /// External [`Reference`] of the gateway transaction.
    pub reference: Option<Reference>,

    /// Audit [`Note`] of this [`Payment`].
    pub note: Option<Note>,

    /// [`DateTime`] when this [`Payment`] was settled.
    pub paid_at: Option<SettlementDateTime>,

    /// [`DateTime`] when this [`Payment`] was created.
    pub created_at: CreationDateTime,
}

impl Payment {
    /// Creates a new [`Status::Unpaid`] [`Payment`].
    #[must_use]
    pub fn new(key: Key, amount: Money) -> Self {
        Self {
            id: Id::new(),
            student_id: key.student_id,
            room_id: key.room_id,
            kind: key.kind,
            method: None,
            month: key.month,
            amount,
            status: Status::Unpaid,
            order_code: None,
            link_expires_at: None,
            reference: None,
            note: None,
            paid_at: None,
            created_at: CreationDateTime::now(),
        }
    }

    /// Returns the [`Key`] of this [`Payment`].
    #[must_use]
    pub const fn key(&self) -> Key {
        Key {
            student_id: self.student_id,
            room_id: self.room_id,
            month: self.month,
            kind: self.kind,
        }
    }

    /// Marks this [`Payment`] as settled at the provided [`DateTime`].
    pub fn settle(&mut self, at: DateTime) {
        self.status = Status::Paid;
        self.paid_at = Some(at.coerce());
        self.link_expires_at = None;
    }

    /// Appends the provided `line` to the [`Note`] of this [`Payment`].
    pub fn annotate(&mut self, line: &str) {
        self.note = Some(match self.note.take() {
            Some(note) => note.append(line),
            None => Note(line.to_owned()),
        });
    }
}

/// Natural key of a [`Payment`], unique among all [`Payment`]s.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Key {
    /// ID of the [`Student`] owing the [`Payment`].
    pub student_id: student::Id,

    /// ID of the [`Room`] the [`Payment`] is charged for.
    pub room_id: Option<room::Id>,

    /// Billing [`Month`] of the [`Payment`].
    pub month: Month,

    /// [`Kind`] of the [`Payment`].
    pub kind: Kind,
}

/// ID of a [`Payment`].
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
    #[doc = "Kind of a [`Payment`]."]
    enum Kind {
        #[doc = "Rent of a [`Room`]."]
        Rent = "TIEN_PHONG",

        #[doc = "Electricity and water costs."]
        Utilities = "TIEN_DIEN_NUOC",
    }
}

define_kind! {
    #[doc = "Method of settling a [`Payment`]."]
    enum Method {
        #[doc = "Cash handed to a staff member."]
        Cash = "TIEN_MAT",

        #[doc = "Transfer through the payment gateway."]
        Transfer = "CHUYEN_KHOAN",
    }
}

define_kind! {
    #[doc = "Status of a [`Payment`]."]
    enum Status {
        #[doc = "Not paid yet."]
        Unpaid = "CHUA_THANH_TOAN",

        #[doc = "Payment link is created and awaits the gateway confirmation."]
        AwaitingGateway = "CHO_THANH_TOAN_ONLINE",

        #[doc = "Cash payment awaits a staff confirmation."]
        AwaitingCash = "CHO_XAC_NHAN_TIEN_MAT",

        #[doc = "Settled."]
        Paid = "DA_THANH_TOAN",

        #[doc = "Not paid in time."]
        Overdue = "QUA_HAN",
    }
}

impl Status {
    /// Indicates whether a [`Payment`] in this [`Status`] may be paid.
    #[must_use]
    pub const fn is_payable(self) -> bool {
        matches!(self, Self::Unpaid | Self::Overdue)
    }
}

/// Order code identifying a [`Payment`] in the payment gateway.
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
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct OrderCode(i64);

impl OrderCode {
    /// Derives a new [`OrderCode`] from the provided [`Payment`] ID and the
    /// [`DateTime`] of creating a payment link.
    ///
    /// Leading six digits are taken from the hash of the ID and the
    /// `attempt`, while the trailing six digits are taken from the
    /// timestamp, so that every new link of the same [`Payment`] gets a
    /// different [`OrderCode`].
    ///
    /// The code stays below `2^53`, as gateways pass it through JSON numbers.
    #[must_use]
    pub fn new(id: Id, at: DateTime, attempt: u8) -> Self {
        use std::hash::{Hash as _, Hasher as _};

        let mut hasher = xxh3::Xxh3Builder::new().build();
        id.hash(&mut hasher);
        attempt.hash(&mut hasher);
        let prefix = i64::try_from(hasher.finish() % 1_000_000).unwrap_or(0);
        let suffix = at.unix_timestamp().rem_euclid(1_000_000);
        Self(prefix * 1_000_000 + suffix)
    }
}

/// External reference of a gateway transaction.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Reference(String);

impl Reference {
    /// Creates a new [`Reference`] if the given `reference` is valid.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Option<Self> {
        let reference = reference.into();
        let trimmed = reference.trim();
        (!trimmed.is_empty() && trimmed.len() <= 255)
            .then(|| Self(trimmed.to_owned()))
    }
}

impl FromStr for Reference {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Reference`")
    }
}

/// Audit note of a [`Payment`], one line per event.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Note(String);

impl Note {
    /// Appends the provided `line` to this [`Note`].
    #[must_use]
    pub fn append(mut self, line: &str) -> Self {
        if !self.0.is_empty() {
            self.0.push('\n');
        }
        self.0.push_str(line);
        self
    }
}

/// [`DateTime`] when a [`Payment`] was created.
pub type CreationDateTime = DateTimeOf<(Payment, unit::Creation)>;

/// [`DateTime`] when a payment link of a [`Payment`] expires.
pub type LinkExpirationDateTime = DateTimeOf<(Payment, unit::Expiration)>;

/// [`DateTime`] when a [`Payment`] was settled.
pub type SettlementDateTime = DateTimeOf<(Payment, unit::Settlement)>;

#[cfg(test)]
mod spec {
    use common::{DateTime, Money};
    use rust_decimal::Decimal;

    use crate::domain::student;

    use super::{Id, Key, Kind, OrderCode, Payment, Status};

    fn payment() -> Payment {
        Payment::new(
            Key {
                student_id: student::Id::new(),
                room_id: None,
                month: "09/2024".parse().unwrap(),
                kind: Kind::Rent,
            },
            Money::vnd(Decimal::from(1_000_000)),
        )
    }

    #[test]
    fn derives_order_code() {
        let id = Id::new();
        let at = DateTime::from_unix_timestamp(1_727_000_123).unwrap();

        let code = i64::from(OrderCode::new(id, at, 0));

        assert_eq!(code % 1_000_000, 123);
        assert!((0..1_000_000_000_000).contains(&code));
        assert_eq!(OrderCode::new(id, at, 0), OrderCode::new(id, at, 0));
        let later = DateTime::from_unix_timestamp(1_727_000_124).unwrap();
        assert_ne!(OrderCode::new(id, at, 0), OrderCode::new(id, later, 0));
        assert_ne!(OrderCode::new(id, at, 0), OrderCode::new(id, at, 1));
    }

    #[test]
    fn settles() {
        let mut p = payment();
        assert!(p.status.is_payable());

        p.settle(DateTime::now());

        assert_eq!(p.status, Status::Paid);
        assert!(p.paid_at.is_some());
        assert!(!p.status.is_payable());
        assert!(Status::Overdue.is_payable());
    }

    #[test]
    fn appends_notes() {
        let mut p = payment();
        p.annotate("cash rejected");
        p.annotate("cash approved");

        assert_eq!(
            p.note.unwrap().to_string(),
            "cash rejected\ncash approved",
        );
    }
}
