//! [`Registration`]-related [`Database`] implementations.

use common::operations::{By, Insert, Lock, Select, Update};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{registration, student, Registration},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read::{
        registration::{Approved, Expiring},
        Pending,
    },
};

/// Columns of the `registrations` table, in the order [`from_row()`]
/// expects.
const COLUMNS: &str = "\
    id, student_id, room_id, bed_id, move_in_date, contract_end_date, \
    preference, status, rejection_reason, reviewed_by, reviewed_at, \
    renewal_of, reminded_at, created_at";

/// Builds a [`Registration`] out of the provided [`Row`].
fn from_row(row: &Row) -> Registration {
    Registration {
        id: row.get("id"),
        student_id: row.get("student_id"),
        room_id: row.get("room_id"),
        bed_id: row.get("bed_id"),
        move_in_date: row.get("move_in_date"),
        contract_end_date: row.get("contract_end_date"),
        preference: row.get("preference"),
        status: row.get("status"),
        rejection_reason: row.get("rejection_reason"),
        reviewed_by: row.get("reviewed_by"),
        reviewed_at: row.get("reviewed_at"),
        renewal_of: row.get("renewal_of"),
        reminded_at: row.get("reminded_at"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Registration>, registration::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Registration>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Registration>, registration::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let sql =
            format!("SELECT {COLUMNS} FROM registrations WHERE id = $1::UUID");
        Ok(self
            .query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Option<Approved<Registration>>, student::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Approved<Registration>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Approved<Registration>>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let student_id = by.into_inner();
        let status = registration::Status::Approved;

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM registrations \
             WHERE student_id = $1::UUID \
               AND status = $2::VARCHAR \
             ORDER BY contract_end_date DESC NULLS LAST, created_at DESC \
             LIMIT 1",
        );
        Ok(self
            .query_opt(&sql, &[&student_id, &status])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(|row| Approved(from_row(row))))
    }
}

impl<C> Database<Select<By<Option<Pending<Registration>>, student::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Pending<Registration>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Pending<Registration>>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let student_id = by.into_inner();
        let status = registration::Status::Pending;

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM registrations \
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

impl<C>
    Database<
        Select<
            By<Vec<Expiring<Registration>>, registration::ContractEndDate>,
        >,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Expiring<Registration>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<Expiring<Registration>>, registration::ContractEndDate>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let until = by.into_inner();
        let approved = registration::Status::Approved;
        let holding = [student::Status::PendingCheckIn, student::Status::Resident];

        const SQL: &str = "\
            SELECT * FROM (\
                SELECT DISTINCT ON (r.student_id) r.* \
                FROM registrations AS r \
                INNER JOIN students AS s ON s.id = r.student_id \
                WHERE r.status = $2::VARCHAR \
                  AND s.status IN ($3::VARCHAR, $4::VARCHAR) \
                ORDER BY r.student_id, \
                         r.contract_end_date DESC NULLS LAST, \
                         r.created_at DESC\
            ) AS latest \
            WHERE contract_end_date <= $1::DATE \
            ORDER BY contract_end_date ASC";
        Ok(self
            .query(SQL, &[&until, &approved, &holding[0], &holding[1]])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(|row| Expiring(from_row(row)))
            .collect())
    }
}

impl<C> Database<Insert<Registration>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Registration>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(registration): Insert<Registration>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(registration))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Registration>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(registration): Update<Registration>,
    ) -> Result<Self::Ok, Self::Err> {
        let Registration {
            id,
            student_id,
            room_id,
            bed_id,
            move_in_date,
            contract_end_date,
            preference,
            status,
            rejection_reason,
            reviewed_by,
            reviewed_at,
            renewal_of,
            reminded_at,
            created_at,
        } = registration;

        const SQL: &str = "\
            INSERT INTO registrations (\
                id, student_id, room_id, bed_id, \
                move_in_date, contract_end_date, preference, status, \
                rejection_reason, reviewed_by, reviewed_at, \
                renewal_of, reminded_at, created_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::UUID, \
                $5::DATE, $6::DATE, $7::TEXT, $8::VARCHAR, \
                $9::TEXT, $10::UUID, $11::TIMESTAMPTZ, \
                $12::UUID, $13::TIMESTAMPTZ, $14::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET room_id = EXCLUDED.room_id, \
                bed_id = EXCLUDED.bed_id, \
                move_in_date = EXCLUDED.move_in_date, \
                contract_end_date = EXCLUDED.contract_end_date, \
                preference = EXCLUDED.preference, \
                status = EXCLUDED.status, \
                rejection_reason = EXCLUDED.rejection_reason, \
                reviewed_by = EXCLUDED.reviewed_by, \
                reviewed_at = EXCLUDED.reviewed_at, \
                reminded_at = EXCLUDED.reminded_at";
        self.exec(
            SQL,
            &[
                &id,
                &student_id,
                &room_id,
                &bed_id,
                &move_in_date,
                &contract_end_date,
                &preference,
                &status,
                &rejection_reason,
                &reviewed_by,
                &reviewed_at,
                &renewal_of,
                &reminded_at,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Registration, registration::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Registration, registration::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: registration::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM registrations \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
