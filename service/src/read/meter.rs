//! [`meter::Reading`] read model definitions.

use derive_more::{From, Into};

#[cfg(doc)]
use crate::domain::{meter, Tariff};

/// Indication whether any [`meter::Reading`] exists within a [`Tariff`]
/// period.
#[derive(Clone, Copy, Debug, Eq, From, Into, PartialEq)]
pub struct HasReadings(pub bool);
