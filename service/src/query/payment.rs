//! [`Query`] collection related to [`Payment`]s.

use common::operations::By;

use crate::domain::{payment, student, Payment};
#[cfg(doc)]
use crate::{domain::Student, Query};

use super::DatabaseQuery;

/// Queries a [`Payment`] by its [`payment::Id`].
pub type ById = DatabaseQuery<By<Option<Payment>, payment::Id>>;

/// Queries all [`Payment`]s of a [`Student`], oldest first.
pub type OfStudent = DatabaseQuery<By<Vec<Payment>, student::Id>>;
