//! [`Stay`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Select, Update},
    Date, Month,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{room, student, Stay},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read::stay::Open,
};

/// Builds a [`Stay`] out of the provided [`Row`].
fn from_row(row: &Row) -> Stay {
    Stay {
        id: row.get("id"),
        student_id: row.get("student_id"),
        room_id: row.get("room_id"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
    }
}

impl<C> Database<Select<By<Option<Open<Stay>>, student::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Open<Stay>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Open<Stay>>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let student_id = by.into_inner();

        const SQL: &str = "\
            SELECT id, student_id, room_id, start_date, end_date \
            FROM stays \
            WHERE student_id = $1::UUID \
              AND end_date IS NULL";
        Ok(self
            .query_opt(SQL, &[&student_id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(|row| Open(from_row(row))))
    }
}

impl<C> Database<Select<By<Vec<Stay>, (room::Id, Month)>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Stay>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Stay>, (room::Id, Month)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (room_id, month) = by.into_inner();
        let (first, last): (Date, Date) = (month.first_day(), month.last_day());

        const SQL: &str = "\
            SELECT id, student_id, room_id, start_date, end_date \
            FROM stays \
            WHERE room_id = $1::UUID \
              AND start_date <= $3::DATE \
              AND (end_date IS NULL OR end_date >= $2::DATE) \
            ORDER BY start_date ASC";
        Ok(self
            .query(SQL, &[&room_id, &first, &last])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect())
    }
}

impl<C> Database<Insert<Stay>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Stay>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(stay): Insert<Stay>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(stay)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Stay>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(stay): Update<Stay>,
    ) -> Result<Self::Ok, Self::Err> {
        let Stay {
            id,
            student_id,
            room_id,
            start_date,
            end_date,
        } = stay;

        const SQL: &str = "\
            INSERT INTO stays (id, student_id, room_id, start_date, end_date) \
            VALUES ($1::UUID, $2::UUID, $3::UUID, $4::DATE, $5::DATE) \
            ON CONFLICT (id) DO UPDATE \
            SET end_date = EXCLUDED.end_date";
        self.exec(SQL, &[&id, &student_id, &room_id, &start_date, &end_date])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
