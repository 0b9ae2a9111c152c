//! Pooled Postgres [`Connection`]s.

use std::{fmt, future::Future};

use futures::{FutureExt as _, TryFutureExt as _};
use ouroboros::self_referencing;
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{self, postgres};

pub use deadpool_postgres::{
    Client as NonTx, CreatePoolError as PoolCreationError, Pool, PoolError,
};
pub use tokio_postgres::Error;

/// Wraps the provided driver [`Error`] into a [`database::Error`].
fn traced(e: Error) -> Traced<database::Error> {
    tracerr::new!(database::Error::from(postgres::Error::from(e)))
}

/// Pooled [`NonTx`] connection with an open transaction.
///
/// The transaction borrows the connection it was opened on, so both are kept
/// together until the transaction is committed, or rolled back on drop.
#[self_referencing]
pub struct Tx {
    /// [`NonTx`] connection the transaction is opened on.
    non_tx: NonTx,

    /// Open transaction, if not committed yet.
    #[borrows(mut non_tx)]
    #[not_covariant]
    tx: Option<deadpool_postgres::Transaction<'this>>,
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx")
            .field("committed", &self.with_tx(|tx| tx.is_none()))
            .finish_non_exhaustive()
    }
}

impl Tx {
    /// Opens a new [`Tx`] on the provided [`NonTx`] connection.
    ///
    /// # Errors
    ///
    /// If Postgres refuses to `BEGIN` the transaction.
    pub async fn begin(non_tx: NonTx) -> Result<Self, Traced<database::Error>> {
        Self::try_new_async_send(non_tx, |c| {
            c.transaction().map_ok(Some).boxed()
        })
        .await
        .map_err(traced)
    }

    /// Returns the open transaction of this [`Tx`].
    fn open(&self) -> &deadpool_postgres::Transaction<'_> {
        self.with_tx(|tx| tx.as_ref().expect("`Tx` is used after commit"))
    }

    /// Commits all the changes made in this [`Tx`].
    ///
    /// # Errors
    ///
    /// If Postgres fails to `COMMIT` the transaction.
    #[expect(clippy::missing_panics_doc, reason = "consumes `self`")]
    pub async fn commit(mut self) -> Result<(), Traced<database::Error>> {
        #[expect(
            clippy::redundant_closure_for_method_calls,
            reason = "different variance, see \
                      https://doc.rust-lang.org/nomicon/subtyping.html#variance"
        )]
        self.with_tx_mut(|tx| tx.take())
            .expect("`Tx` is committed twice")
            .commit()
            .await
            .map_err(traced)
    }
}

/// Postgres connection able to run SQL statements.
pub trait Connection {
    /// Runs the provided `stmt` returning all the resulting [`Row`]s.
    ///
    /// # Errors
    ///
    /// If the `stmt` fails.
    fn query<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = Result<Vec<Row>, Traced<database::Error>>>
    where
        T: ToStatement + ?Sized;

    /// Runs the provided `stmt` returning at most one resulting [`Row`].
    ///
    /// # Errors
    ///
    /// If the `stmt` fails or returns more than one [`Row`].
    fn query_opt<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = Result<Option<Row>, Traced<database::Error>>>
    where
        T: ToStatement + ?Sized;

    /// Runs the provided `stmt` returning the number of affected rows.
    ///
    /// # Errors
    ///
    /// If the `stmt` fails.
    fn exec<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = Result<u64, Traced<database::Error>>>
    where
        T: ToStatement + ?Sized;
}

/// Implements [`Connection`] for a type dereferencing into a
/// [`tokio_postgres`] client via the provided accessor.
macro_rules! impl_connection {
    ($ty:ty, |$this:ident| $client:expr) => {
        impl Connection for $ty {
            async fn query<T>(
                &self,
                stmt: &T,
                params: &[&(dyn ToSql + Sync)],
            ) -> Result<Vec<Row>, Traced<database::Error>>
            where
                T: ToStatement + ?Sized,
            {
                let $this = self;
                $client.query(stmt, params).await.map_err(traced)
            }

            async fn query_opt<T>(
                &self,
                stmt: &T,
                params: &[&(dyn ToSql + Sync)],
            ) -> Result<Option<Row>, Traced<database::Error>>
            where
                T: ToStatement + ?Sized,
            {
                let $this = self;
                $client.query_opt(stmt, params).await.map_err(traced)
            }

            async fn exec<T>(
                &self,
                stmt: &T,
                params: &[&(dyn ToSql + Sync)],
            ) -> Result<u64, Traced<database::Error>>
            where
                T: ToStatement + ?Sized,
            {
                let $this = self;
                $client.execute(stmt, params).await.map_err(traced)
            }
        }
    };
}

impl_connection!(NonTx, |this| (**this));
impl_connection!(Tx, |this| this.open());
