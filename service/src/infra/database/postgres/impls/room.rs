//! [`Room`]- and [`Bed`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{room, student, Bed, Room},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of the `rooms` table, in the order [`room_from_row()`] expects.
const ROOM_COLUMNS: &str = "\
    id, number, capacity, area, monthly_rent, currency, \
    gender, occupants, created_at";

/// Builds a [`Room`] out of the provided [`Row`].
fn room_from_row(row: &Row) -> Room {
    let capacity = u8::try_from(row.get::<_, i16>("capacity"))
        .ok()
        .and_then(room::Capacity::new)
        .expect("`capacity` overflow");
    Room {
        id: row.get("id"),
        number: row.get("number"),
        capacity,
        area: row.get("area"),
        monthly_rent: Money {
            amount: row.get("monthly_rent"),
            currency: row.get("currency"),
        },
        gender: row.get("gender"),
        occupants: u8::try_from(row.get::<_, i16>("occupants"))
            .expect("`occupants` overflow"),
        created_at: row.get("created_at"),
    }
}

/// Builds a [`Bed`] out of the provided [`Row`].
fn bed_from_row(row: &Row) -> Bed {
    Bed {
        id: row.get("id"),
        room_id: row.get("room_id"),
        number: row.get("number"),
        student_id: row.get("student_id"),
    }
}

impl<C> Database<Select<By<Option<Room>, room::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Room>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Room>, room::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1::UUID");
        Ok(self
            .query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(room_from_row))
    }
}

impl<C> Database<Select<By<Option<Room>, room::Number>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Room>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Room>, room::Number>>,
    ) -> Result<Self::Ok, Self::Err> {
        let number = by.into_inner();

        let sql = format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE number = $1::VARCHAR",
        );
        Ok(self
            .query_opt(&sql, &[&number])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(room_from_row))
    }
}

impl<C> Database<Insert<Room>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Room>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(room): Insert<Room>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(room)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Room>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(room): Update<Room>,
    ) -> Result<Self::Ok, Self::Err> {
        let Room {
            id,
            number,
            capacity,
            area,
            monthly_rent,
            gender,
            occupants,
            created_at,
        } = room;
        let capacity = i16::from(capacity.get());
        let occupants = i16::from(occupants);

        const SQL: &str = "\
            INSERT INTO rooms (\
                id, number, capacity, area, monthly_rent, currency, \
                gender, occupants, created_at\
            ) \
            VALUES (\
                $1::UUID, $2::VARCHAR, $3::INT2, $4::NUMERIC, $5::NUMERIC, \
                $6::VARCHAR, $7::VARCHAR, $8::INT2, $9::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET number = EXCLUDED.number, \
                capacity = EXCLUDED.capacity, \
                area = EXCLUDED.area, \
                monthly_rent = EXCLUDED.monthly_rent, \
                currency = EXCLUDED.currency, \
                gender = EXCLUDED.gender, \
                occupants = EXCLUDED.occupants";
        self.exec(
            SQL,
            &[
                &id,
                &number,
                &capacity,
                &area,
                &monthly_rent.amount,
                &monthly_rent.currency,
                &gender,
                &occupants,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Room, room::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Room, room::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: room::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM rooms \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<Option<Bed>, room::bed::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Bed>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Bed>, room::bed::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT id, room_id, number, student_id \
            FROM beds \
            WHERE id = $1::UUID";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(bed_from_row))
    }
}

impl<C> Database<Select<By<Option<Bed>, student::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Bed>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Bed>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let student_id = by.into_inner();

        const SQL: &str = "\
            SELECT id, room_id, number, student_id \
            FROM beds \
            WHERE student_id = $1::UUID";
        Ok(self
            .query_opt(SQL, &[&student_id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(bed_from_row))
    }
}

impl<C> Database<Select<By<Vec<Bed>, room::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Bed>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Bed>, room::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let room_id = by.into_inner();

        const SQL: &str = "\
            SELECT id, room_id, number, student_id \
            FROM beds \
            WHERE room_id = $1::UUID \
            ORDER BY number ASC";
        Ok(self
            .query(SQL, &[&room_id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(bed_from_row)
            .collect())
    }
}

impl<C> Database<Insert<Bed>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Bed>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(bed): Insert<Bed>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(bed)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Bed>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(bed): Update<Bed>,
    ) -> Result<Self::Ok, Self::Err> {
        let Bed {
            id,
            room_id,
            number,
            student_id,
        } = bed;

        const SQL: &str = "\
            INSERT INTO beds (id, room_id, number, student_id) \
            VALUES ($1::UUID, $2::UUID, $3::VARCHAR, $4::UUID) \
            ON CONFLICT (id) DO UPDATE \
            SET number = EXCLUDED.number, \
                student_id = EXCLUDED.student_id";
        self.exec(SQL, &[&id, &room_id, &number, &student_id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
