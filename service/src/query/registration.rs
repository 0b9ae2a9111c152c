//! [`Query`] collection related to [`Registration`]s.

use common::operations::By;

#[cfg(doc)]
use crate::{domain::Student, Query};
use crate::{
    domain::{registration, student, Registration},
    read::{registration::Approved, Pending},
};

use super::DatabaseQuery;

/// Queries a [`Registration`] by its [`registration::Id`].
pub type ById = DatabaseQuery<By<Option<Registration>, registration::Id>>;

/// Queries the latest [`Approved`] [`Registration`] of a [`Student`].
pub type Current =
    DatabaseQuery<By<Option<Approved<Registration>>, student::Id>>;

/// Queries the [`Pending`] [`Registration`] of a [`Student`], if any.
pub type Waiting =
    DatabaseQuery<By<Option<Pending<Registration>>, student::Id>>;
