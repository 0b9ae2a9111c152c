//! [`NonTx`] client definitions.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{self, connection, Connection},
};

/// Postgres client running every statement in its own implicit transaction.
///
/// A pooled [`connection::NonTx`] is checked out on the first statement and
/// kept for the following ones, until handed over to a [`Tx`] client.
///
/// [`Tx`]: super::Tx
#[derive(Clone, Debug)]
pub struct NonTx {
    /// [`connection::Pool`] to check the connections out from.
    pub(crate) pool: connection::Pool,

    /// Checked out [`connection::NonTx`], if any.
    checked_out: Arc<RwLock<Option<connection::NonTx>>>,
}

impl NonTx {
    /// Creates a new [`NonTx`] client checking connections out of the
    /// provided [`connection::Pool`].
    #[must_use]
    pub(crate) fn from_pool(pool: connection::Pool) -> Self {
        Self {
            pool,
            checked_out: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the checked out [`connection::NonTx`], checking it out of the
    /// [`connection::Pool`] if there is none yet.
    async fn connection(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::NonTx>, Traced<database::Error>>
    {
        {
            let checked_out = self.checked_out.read().await;
            if checked_out.is_some() {
                return Ok(RwLockReadGuard::map(checked_out, |c| {
                    c.as_ref().expect("checked for presence")
                }));
            }
        }

        let mut checked_out = self.checked_out.write().await;
        if checked_out.is_none() {
            *checked_out = Some(
                self.pool
                    .get()
                    .await
                    .map_err(tracerr::from_and_wrap!(=> postgres::Error))
                    .map_err(tracerr::map_from)?,
            );
        }
        Ok(RwLockReadGuard::map(checked_out.downgrade(), |c| {
            c.as_ref().expect("checked out above")
        }))
    }

    /// Hands the checked out [`connection::NonTx`] over, so that a
    /// transaction may be opened on it.
    ///
    /// The next statement of this [`NonTx`] client checks out a new one.
    pub(crate) async fn hand_over(&self) -> Option<connection::NonTx> {
        self.checked_out.write().await.take()
    }
}

impl Connection for NonTx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        let conn = self.connection().await.map_err(tracerr::wrap!())?;
        conn.query(stmt, params).await.map_err(tracerr::wrap!())
    }

    async fn query_opt<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        let conn = self.connection().await.map_err(tracerr::wrap!())?;
        conn.query_opt(stmt, params).await.map_err(tracerr::wrap!())
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        let conn = self.connection().await.map_err(tracerr::wrap!())?;
        conn.exec(stmt, params).await.map_err(tracerr::wrap!())
    }
}
