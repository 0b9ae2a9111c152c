//! [`Database`]-related implementations.

#[cfg(any(test, feature = "memory"))]
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use derive_more::{Display, Error as StdError, From};

#[cfg(any(test, feature = "memory"))]
pub use self::memory::Memory;
#[cfg(feature = "postgres")]
pub use self::postgres::Postgres;

/// Database operation.
pub use common::Handler as Database;

/// [`Database`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    #[cfg(any(test, feature = "memory"))]
    /// [`Memory`] error.
    Memory(memory::Error),

    #[cfg(feature = "postgres")]
    /// [`Postgres`] error.
    Postgres(postgres::Error),
}

impl Error {
    /// Checks if the error is a unique violation of the specified constraint.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            #[cfg(any(test, feature = "memory"))]
            Self::Memory(e) => e.is_unique_violation(constraint),
            #[cfg(feature = "postgres")]
            Self::Postgres(e) => e.is_unique_violation(constraint),
        }
    }
}

/// Names of unique constraints shared by all [`Database`] backends.
pub mod constraint {
    /// Unique email of a [`Student`].
    ///
    /// [`Student`]: crate::domain::Student
    pub const STUDENT_EMAIL: &str = "students_email_key";

    /// Unique code of a [`Student`].
    ///
    /// [`Student`]: crate::domain::Student
    pub const STUDENT_CODE: &str = "students_code_key";

    /// Unique number of a [`Room`].
    ///
    /// [`Room`]: crate::domain::Room
    pub const ROOM_NUMBER: &str = "rooms_number_key";

    /// Unique number of a [`Bed`] within its [`Room`].
    ///
    /// [`Bed`]: crate::domain::Bed
    /// [`Room`]: crate::domain::Room
    pub const BED_NUMBER: &str = "beds_room_id_number_key";

    /// Unique effective date of a [`Tariff`].
    ///
    /// [`Tariff`]: crate::domain::Tariff
    pub const TARIFF_EFFECTIVE_FROM: &str = "tariffs_effective_from_key";

    /// Unique [`Month`] of a [`meter::Reading`] per [`Room`].
    ///
    /// [`meter::Reading`]: crate::domain::meter::Reading
    /// [`Month`]: common::Month
    /// [`Room`]: crate::domain::Room
    pub const METER_READING_MONTH: &str = "meter_readings_room_id_month_key";

    /// Unique [`payment::Key`] of a [`Payment`].
    ///
    /// [`Payment`]: crate::domain::Payment
    /// [`payment::Key`]: crate::domain::payment::Key
    pub const PAYMENT_KEY: &str = "payments_key_idx";

    /// Unique [`payment::OrderCode`] of a [`Payment`].
    ///
    /// [`Payment`]: crate::domain::Payment
    /// [`payment::OrderCode`]: crate::domain::payment::OrderCode
    pub const PAYMENT_ORDER_CODE: &str = "payments_order_code_key";
}
