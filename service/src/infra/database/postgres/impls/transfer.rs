//! [`Transfer`]-related [`Database`] implementations.

use common::operations::{By, Insert, Lock, Select, Update};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{student, transfer, Transfer},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read::Pending,
};

/// Columns of the `transfers` table, in the order [`from_row()`] expects.
const COLUMNS: &str = "\
    id, student_id, from_room_id, to_room_id, reason, status, \
    reviewed_by, reviewed_at, rejection_reason, created_at";

/// Builds a [`Transfer`] out of the provided [`Row`].
fn from_row(row: &Row) -> Transfer {
    Transfer {
        id: row.get("id"),
        student_id: row.get("student_id"),
        from_room_id: row.get("from_room_id"),
        to_room_id: row.get("to_room_id"),
        reason: row.get("reason"),
        status: row.get("status"),
        reviewed_by: row.get("reviewed_by"),
        reviewed_at: row.get("reviewed_at"),
        rejection_reason: row.get("rejection_reason"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Transfer>, transfer::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Transfer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Transfer>, transfer::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let sql =
            format!("SELECT {COLUMNS} FROM transfers WHERE id = $1::UUID");
        Ok(self
            .query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Option<Pending<Transfer>>, student::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Pending<Transfer>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Pending<Transfer>>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let student_id = by.into_inner();
        let status = transfer::Status::Pending;

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM transfers \
             WHERE student_id = $1::UUID \
               AND status = $2::VARCHAR \
             LIMIT 1",
        );
        Ok(self
            .query_opt(&sql, &[&student_id, &status])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(|row| Pending(from_row(row))))
    }
}

impl<C> Database<Insert<Transfer>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Transfer>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(transfer): Insert<Transfer>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(transfer)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Transfer>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(transfer): Update<Transfer>,
    ) -> Result<Self::Ok, Self::Err> {
        let Transfer {
            id,
            student_id,
            from_room_id,
            to_room_id,
            reason,
            status,
            reviewed_by,
            reviewed_at,
            rejection_reason,
            created_at,
        } = transfer;

        const SQL: &str = "\
            INSERT INTO transfers (\
                id, student_id, from_room_id, to_room_id, reason, status, \
                reviewed_by, reviewed_at, rejection_reason, created_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::UUID, $5::TEXT, \
                $6::VARCHAR, $7::UUID, $8::TIMESTAMPTZ, $9::TEXT, \
                $10::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET status = EXCLUDED.status, \
                reviewed_by = EXCLUDED.reviewed_by, \
                reviewed_at = EXCLUDED.reviewed_at, \
                rejection_reason = EXCLUDED.rejection_reason";
        self.exec(
            SQL,
            &[
                &id,
                &student_id,
                &from_room_id,
                &to_room_id,
                &reason,
                &status,
                &reviewed_by,
                &reviewed_at,
                &rejection_reason,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Transfer, transfer::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Transfer, transfer::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: transfer::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM transfers \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
