//! [`Payment`]-related [`Database`] implementations.

use common::{
    operations::{By, Delete, Insert, Lock, Select, Update},
    DateTime, Money,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{payment, student, Payment},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Columns of the `payments` table, in the order [`from_row()`] expects.
const COLUMNS: &str = "\
    id, student_id, room_id, kind, method, month, amount, currency, \
    status, order_code, link_expires_at, reference, note, paid_at, \
    created_at";

/// Builds a [`Payment`] out of the provided [`Row`].
fn from_row(row: &Row) -> Payment {
    Payment {
        id: row.get("id"),
        student_id: row.get("student_id"),
        room_id: row.get("room_id"),
        kind: row.get("kind"),
        method: row.get("method"),
        month: row.get("month"),
        amount: Money {
            amount: row.get("amount"),
            currency: row.get("currency"),
        },
        status: row.get("status"),
        order_code: row.get("order_code"),
        link_expires_at: row.get("link_expires_at"),
        reference: row.get("reference"),
        note: row.get("note"),
        paid_at: row.get("paid_at"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Payment>, payment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let sql = format!("SELECT {COLUMNS} FROM payments WHERE id = $1::UUID");
        Ok(self
            .query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Option<Payment>, payment::OrderCode>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::OrderCode>>,
    ) -> Result<Self::Ok, Self::Err> {
        let order_code = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} FROM payments WHERE order_code = $1::INT8",
        );
        Ok(self
            .query_opt(&sql, &[&order_code])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Option<Payment>, payment::Key>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let payment::Key {
            student_id,
            room_id,
            month,
            kind,
        } = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payments \
             WHERE student_id = $1::UUID \
               AND room_id IS NOT DISTINCT FROM $2::UUID \
               AND month = $3::VARCHAR \
               AND kind = $4::VARCHAR \
             ORDER BY created_at ASC \
             LIMIT 1",
        );
        Ok(self
            .query_opt(&sql, &[&student_id, &room_id, &month, &kind])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Vec<Payment>, student::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Payment>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let student_id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payments \
             WHERE student_id = $1::UUID \
             ORDER BY created_at ASC",
        );
        Ok(self
            .query(&sql, &[&student_id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect())
    }
}

impl<C> Database<Insert<Payment>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Payment>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(payment)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Payment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(payment): Update<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        let Payment {
            id,
            student_id,
            room_id,
            kind,
            method,
            month,
            amount,
            status,
            order_code,
            link_expires_at,
            reference,
            note,
            paid_at,
            created_at,
        } = payment;

        const SQL: &str = "\
            INSERT INTO payments (\
                id, student_id, room_id, kind, method, month, \
                amount, currency, status, order_code, link_expires_at, \
                reference, note, paid_at, created_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::VARCHAR, $5::VARCHAR, \
                $6::VARCHAR, $7::NUMERIC, $8::VARCHAR, $9::VARCHAR, \
                $10::INT8, $11::TIMESTAMPTZ, $12::VARCHAR, $13::TEXT, \
                $14::TIMESTAMPTZ, $15::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET room_id = EXCLUDED.room_id, \
                method = EXCLUDED.method, \
                amount = EXCLUDED.amount, \
                currency = EXCLUDED.currency, \
                status = EXCLUDED.status, \
                order_code = EXCLUDED.order_code, \
                link_expires_at = EXCLUDED.link_expires_at, \
                reference = EXCLUDED.reference, \
                note = EXCLUDED.note, \
                paid_at = EXCLUDED.paid_at";
        self.exec(
            SQL,
            &[
                &id,
                &student_id,
                &room_id,
                &kind,
                &method,
                &month,
                &amount.amount,
                &amount.currency,
                &status,
                &order_code,
                &link_expires_at,
                &reference,
                &note,
                &paid_at,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Delete<By<Payment, payment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Payment, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            DELETE FROM payments \
            WHERE id = $1::UUID";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Lock<By<Payment, payment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Payment, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: payment::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM payments \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C>
    Database<Update<By<read::payment::Overdue, payment::CreationDateTime>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(by): Update<
            By<read::payment::Overdue, payment::CreationDateTime>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline = by.into_inner();

        const SQL: &str = "\
            UPDATE payments \
            SET status = $2::VARCHAR \
            WHERE status = $3::VARCHAR \
              AND created_at < $1::TIMESTAMPTZ";
        self.exec(
            SQL,
            &[
                &deadline,
                &payment::Status::Overdue,
                &payment::Status::Unpaid,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<By<read::payment::ExpiredLink, DateTime>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(by): Update<By<read::payment::ExpiredLink, DateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let now = by.into_inner();

        const SQL: &str = "\
            UPDATE payments \
            SET status = $2::VARCHAR, \
                method = NULL, \
                link_expires_at = NULL \
            WHERE status = $3::VARCHAR \
              AND link_expires_at <= $1::TIMESTAMPTZ";
        self.exec(
            SQL,
            &[
                &now,
                &payment::Status::Unpaid,
                &payment::Status::AwaitingGateway,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
    }
}
