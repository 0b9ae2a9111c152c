//! [`Student`] definitions.

use std::{str::FromStr, sync::LazyLock};

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateOf, DateTimeOf};
use derive_more::{AsRef, Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use secrecy::{zeroize::Zeroize, CloneableSecret};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Student living in (or applying to) the dormitory.
#[derive(Clone, Debug)]
pub struct Student {
    /// ID of this [`Student`].
    pub id: Id,

    /// Unique [`Code`] of this [`Student`].
    pub code: Code,

    /// [`Name`] of this [`Student`].
    pub name: Name,

    /// Date when this [`Student`] was born, if known.
    pub birth_date: Option<BirthDate>,

    /// [`Gender`] of this [`Student`].
    pub gender: Gender,

    /// [`Email`] of this [`Student`], unique across all [`Student`]s.
    pub email: Email,

    /// [`Phone`] of this [`Student`].
    pub phone: Option<Phone>,

    /// Indicator whether the [`Email`] of this [`Student`] is verified.
    pub email_verified: bool,

    /// One-time [`VerificationToken`] for the [`Email`], if it's still
    /// unverified.
    pub verification_token: Option<VerificationToken>,

    /// [`PasswordHash`] of this [`Student`], if the password was set up.
    pub password_hash: Option<PasswordHash>,

    /// Lifecycle [`Status`] of this [`Student`].
    pub status: Status,

    /// Stated [`RenewalIntent`] of this [`Student`].
    pub renewal_intent: RenewalIntent,

    /// [`DateTime`] when this [`Student`] was registered.
    pub created_at: CreationDateTime,
}

impl Student {
    /// Indicates whether this [`Student`] may set up a password.
    #[must_use]
    pub fn can_set_up_password(&self) -> bool {
        self.email_verified && self.password_hash.is_none()
    }
}

/// ID of a [`Student`].
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
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Unique code of a [`Student`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Code(String);

impl Code {
    /// Creates a new [`Code`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `code` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Creates a new [`Code`] if the given `code` is valid.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code = code.into();
        Self::check(&code).then_some(Self(code))
    }

    /// Generates a new [`Code`] out of the registration `year` and the
    /// provided `sequence` number.
    ///
    /// Generated [`Code`] has `YY` + 8-digit sequence format.
    #[must_use]
    pub fn generate(year: i32, sequence: u64) -> Self {
        Self(format!(
            "{:02}{:08}",
            year.rem_euclid(100),
            sequence % 100_000_000,
        ))
    }

    /// Checks whether the given `code` is a valid [`Code`].
    fn check(code: impl AsRef<str>) -> bool {
        let code = code.as_ref();
        !code.is_empty()
            && code.len() <= 20
            && code.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

impl FromStr for Code {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Code`")
    }
}

/// Next value of the [`Code`] sequence.
#[derive(Clone, Copy, Debug, Eq, From, Into, PartialEq)]
pub struct CodeSequence(u64);

/// Name of a [`Student`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Name(String);

impl Name {
    /// Creates a new [`Name`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `name` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Name`].
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        name.trim() == name && !name.is_empty() && name.len() <= 100
    }
}

impl FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Name`")
    }
}

/// Email address of a [`Student`].
///
/// Stored in lowercase, so the uniqueness is case-insensitive.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Email(String);

impl Email {
    /// Creates a new [`Email`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `address` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Creates a new [`Email`] if the given `address` is valid.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Option<Self> {
        let address = address.into().to_lowercase();
        Self::check(&address).then_some(Self(address))
    }

    /// Checks whether the given `address` is a valid [`Email`].
    fn check(address: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Email`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex")
        });

        let address = address.as_ref();
        address.len() <= 254 && REGEX.is_match(address)
    }
}

impl FromStr for Email {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Email`")
    }
}

/// Phone number of a [`Student`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Phone(String);

impl Phone {
    /// Creates a new [`Phone`] if the given `number` is valid.
    #[must_use]
    pub fn new(number: impl Into<String>) -> Option<Self> {
        let number = number.into();
        Self::check(&number).then_some(Self(number))
    }

    /// Checks whether the given `number` is a valid [`Phone`].
    fn check(number: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Phone`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^(\+84|0)\d{9,10}$").expect("valid regex")
        });

        REGEX.is_match(number.as_ref())
    }
}

impl FromStr for Phone {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Phone`")
    }
}

/// Password of a [`Student`].
#[derive(Clone, Debug, Display, Eq, From, PartialEq)]
#[from(&str, String)]
pub struct Password(String);

impl Password {
    /// Creates a new [`Password`] if the given `password` is valid.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Option<Self> {
        let password = password.into();
        Self::check(&password).then_some(Self(password))
    }

    /// Checks whether the given `password` is a valid [`Password`].
    fn check(password: impl AsRef<str>) -> bool {
        let password = password.as_ref();
        password.len() >= 6 && password.len() <= 72
    }
}

impl FromStr for Password {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Password`")
    }
}

impl CloneableSecret for Password {}
impl Zeroize for Password {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// [bcrypt] hash of a [`Password`].
///
/// [bcrypt]: https://en.wikipedia.org/wiki/Bcrypt
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hashes the provided [`Password`].
    ///
    /// # Errors
    ///
    /// If hashing fails.
    pub fn new(password: &Password) -> Result<Self, bcrypt::BcryptError> {
        bcrypt::hash(&password.0, bcrypt::DEFAULT_COST).map(Self)
    }

    /// Checks whether the provided [`Password`] matches this [`PasswordHash`].
    #[must_use]
    pub fn verify(&self, password: &Password) -> bool {
        bcrypt::verify(&password.0, &self.0).unwrap_or(false)
    }
}

/// One-time token verifying an [`Email`] of a [`Student`].
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
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct VerificationToken(Uuid);

impl VerificationToken {
    /// Creates a new random [`VerificationToken`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

define_kind! {
    #[doc = "Gender of a [`Student`] or designation of a room."]
    enum Gender {
        #[doc = "Male."]
        Male = "NAM",

        #[doc = "Female."]
        Female = "NU",
    }
}

define_kind! {
    #[doc = "Lifecycle status of a [`Student`]."]
    enum Status {
        #[doc = "Registration submitted, not yet approved."]
        Registered = "DA_DANG_KY",

        #[doc = "Registration approved, waiting for the check-in."]
        PendingCheckIn = "CHO_NHAN_PHONG",

        #[doc = "Living in the dormitory."]
        Resident = "DANG_O",

        #[doc = "Stay in the dormitory ended."]
        Ended = "DA_KET_THUC",

        #[doc = "Stay in the dormitory ended due to a rules violation."]
        Violation = "VI_PHAM",
    }
}

impl Status {
    /// Indicates whether a [`Student`] in this [`Status`] holds a bed.
    #[must_use]
    pub const fn holds_bed(self) -> bool {
        matches!(self, Self::PendingCheckIn | Self::Resident)
    }
}

define_kind! {
    #[doc = "Intent of a [`Student`] regarding the contract renewal."]
    enum RenewalIntent {
        #[doc = "No decision has been made yet."]
        Undecided = "CHUA_QUYET_DINH",

        #[doc = "Contract should be renewed."]
        Renew = "GIA_HAN",

        #[doc = "Student leaves once the contract ends."]
        Leave = "KHONG_GIA_HAN",
    }
}

/// Date when a [`Student`] was born.
pub type BirthDate = DateOf<(Student, unit::Birth)>;

/// [`DateTime`] when a [`Student`] was registered.
pub type CreationDateTime = DateTimeOf<(Student, unit::Creation)>;

#[cfg(test)]
mod spec {
    use super::{Code, Email, Password, PasswordHash, Phone};

    #[test]
    fn generates_code() {
        assert_eq!(AsRef::<str>::as_ref(&Code::generate(2025, 42)), "2500000042");
        assert_eq!(AsRef::<str>::as_ref(&Code::generate(2100, 123_456_789)), "0023456789");
        assert!(Code::new("SV-01").is_none());
        assert!(Code::new("").is_none());
    }

    #[test]
    fn lowercases_email() {
        let email = Email::new("Student@Example.EDU.vn").unwrap();
        assert_eq!(AsRef::<str>::as_ref(&email), "student@example.edu.vn");
        assert!(Email::new("no-at-sign.example.com").is_none());
        assert!(Email::new("two words@example.com").is_none());
    }

    #[test]
    fn checks_phone() {
        assert!(Phone::new("0912345678").is_some());
        assert!(Phone::new("+84912345678").is_some());
        assert!(Phone::new("12345").is_none());
    }

    #[test]
    fn verifies_password_hash() {
        let password = Password::new("s3cret!").unwrap();
        let hash = PasswordHash::new(&password).unwrap();
        assert!(hash.verify(&password));
        assert!(!hash.verify(&Password::new("wrong-one").unwrap()));
        assert!(Password::new("short").is_none());
    }
}
