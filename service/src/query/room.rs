//! [`Query`] collection related to a single [`Room`].

use common::operations::By;

use crate::domain::{room, Bed, Room};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`Room`] by its [`room::Id`].
pub type ById = DatabaseQuery<By<Option<Room>, room::Id>>;

/// Queries all the [`Bed`]s of a [`Room`].
pub type Beds = DatabaseQuery<By<Vec<Bed>, room::Id>>;
