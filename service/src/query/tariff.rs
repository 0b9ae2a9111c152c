//! [`Query`] of the [`tariff::Timeline`].

use common::operations::By;

use crate::domain::tariff;
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries the whole [`tariff::Timeline`].
pub type Timeline = DatabaseQuery<By<tariff::Timeline, ()>>;
