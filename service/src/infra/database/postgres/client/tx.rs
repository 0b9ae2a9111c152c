//! [`Tx`] client definitions.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;
use tracing as log;

use crate::infra::database::{
    self,
    postgres::{self, connection, Connection},
};

use super::NonTx;

/// Postgres client running all its statements in a single transaction.
///
/// The transaction is opened lazily on the first statement, preferably on the
/// connection already checked out by the [`NonTx`] client it was created
/// from. Dropping all the clones of an uncommitted [`Tx`] rolls it back.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`connection::Pool`] to check a connection out from, if the [`NonTx`]
    /// client has none.
    pool: connection::Pool,

    /// [`NonTx`] client to take the connection from, until the transaction
    /// is opened.
    origin: Arc<Mutex<Option<NonTx>>>,

    /// Opened [`connection::Tx`], if any.
    opened: Arc<RwLock<Option<connection::Tx>>>,
}

impl Tx {
    /// Creates a new [`Tx`] client, not opening any transaction yet.
    #[must_use]
    pub fn from_non_tx(client: NonTx) -> Self {
        Self {
            pool: client.pool.clone(),
            origin: Arc::new(Mutex::new(Some(client))),
            opened: Arc::new(RwLock::new(None)),
        }
    }

    /// Opens a new [`connection::Tx`].
    async fn begin(&self) -> Result<connection::Tx, Traced<database::Error>> {
        let handed_over = match self.origin.lock().await.take() {
            Some(client) => client.hand_over().await,
            None => None,
        };
        let conn = if let Some(conn) = handed_over {
            conn
        } else {
            self.pool
                .get()
                .await
                .map_err(tracerr::from_and_wrap!(=> postgres::Error))
                .map_err(tracerr::map_from)?
        };
        connection::Tx::begin(conn).await.map_err(tracerr::wrap!())
    }

    /// Returns the opened [`connection::Tx`], opening it if there is none
    /// yet.
    async fn connection(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::Tx>, Traced<database::Error>>
    {
        {
            let opened = self.opened.read().await;
            if opened.is_some() {
                return Ok(RwLockReadGuard::map(opened, |c| {
                    c.as_ref().expect("checked for presence")
                }));
            }
        }

        let mut opened = self.opened.write().await;
        if opened.is_none() {
            *opened = Some(self.begin().await.map_err(tracerr::wrap!())?);
        }
        Ok(RwLockReadGuard::map(opened.downgrade(), |c| {
            c.as_ref().expect("opened above")
        }))
    }

    /// Commits the transaction of this [`Tx`] client, if it's opened.
    ///
    /// Statements executed afterwards run in a new transaction.
    ///
    /// # Errors
    ///
    /// If Postgres fails to commit the transaction.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        let Some(tx) = self.opened.write().await.take() else {
            log::trace!("nothing to commit, as no statement was executed");
            return Ok(());
        };
        tx.commit().await.map_err(tracerr::wrap!())
    }
}

impl Connection for Tx {
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
