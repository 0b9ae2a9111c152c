//! [`Query`] collection related to [`Transfer`]s.

use common::operations::By;

#[cfg(doc)]
use crate::{domain::Student, Query};
use crate::{
    domain::{student, transfer, Transfer},
    read::Pending,
};

use super::DatabaseQuery;

/// Queries a [`Transfer`] by its [`transfer::Id`].
pub type ById = DatabaseQuery<By<Option<Transfer>, transfer::Id>>;

/// Queries the [`Pending`] [`Transfer`] of a [`Student`], if any.
pub type Waiting = DatabaseQuery<By<Option<Pending<Transfer>>, student::Id>>;
