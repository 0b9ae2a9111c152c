//! [`Query`] collection related to a single [`Student`].

use common::operations::By;

use crate::domain::{student, Student};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`Student`] by its [`student::Id`].
pub type ById = DatabaseQuery<By<Option<Student>, student::Id>>;

/// Queries a [`Student`] by its [`student::Email`].
pub type ByEmail = DatabaseQuery<By<Option<Student>, student::Email>>;

/// Queries a [`Student`] by its [`student::Code`].
pub type ByCode = DatabaseQuery<By<Option<Student>, student::Code>>;
