//! [`meter::Reading`]- and [`utility::Share`]-related [`Database`]
//! implementations.

use common::{
    operations::{By, Insert, Select},
    Money, Month,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{meter, room, utility},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Builds a [`meter::Reading`] out of the provided [`Row`].
fn reading_from_row(row: &Row) -> meter::Reading {
    let counter = |previous: &str, current: &str| meter::Counter {
        previous: u32::try_from(row.get::<_, i64>(previous))
            .expect("meter counter overflow"),
        current: u32::try_from(row.get::<_, i64>(current))
            .expect("meter counter overflow"),
    };
    meter::Reading {
        id: row.get("id"),
        room_id: row.get("room_id"),
        month: row.get("month"),
        electricity: counter("electricity_previous", "electricity_current"),
        water: counter("water_previous", "water_current"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<meter::Reading>, meter::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<meter::Reading>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<meter::Reading>, meter::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT id, room_id, month, \
                   electricity_previous, electricity_current, \
                   water_previous, water_current, \
                   created_at \
            FROM meter_readings \
            WHERE id = $1::UUID";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(reading_from_row))
    }
}

impl<C> Database<Select<By<Option<meter::Reading>, (room::Id, Month)>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<meter::Reading>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<meter::Reading>, (room::Id, Month)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (room_id, month) = by.into_inner();

        const SQL: &str = "\
            SELECT id, room_id, month, \
                   electricity_previous, electricity_current, \
                   water_previous, water_current, \
                   created_at \
            FROM meter_readings \
            WHERE room_id = $1::UUID \
              AND month = $2::VARCHAR";
        Ok(self
            .query_opt(SQL, &[&room_id, &month])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(reading_from_row))
    }
}

impl<C> Database<Insert<meter::Reading>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(reading): Insert<meter::Reading>,
    ) -> Result<Self::Ok, Self::Err> {
        let meter::Reading {
            id,
            room_id,
            month,
            electricity,
            water,
            created_at,
        } = reading;

        const SQL: &str = "\
            INSERT INTO meter_readings (\
                id, room_id, month, \
                electricity_previous, electricity_current, \
                water_previous, water_current, \
                created_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::VARCHAR, \
                $4::INT8, $5::INT8, \
                $6::INT8, $7::INT8, \
                $8::TIMESTAMPTZ\
            )";
        self.exec(
            SQL,
            &[
                &id,
                &room_id,
                &month,
                &i64::from(electricity.previous),
                &i64::from(electricity.current),
                &i64::from(water.previous),
                &i64::from(water.current),
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Vec<utility::Share>, meter::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<utility::Share>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<utility::Share>, meter::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reading_id = by.into_inner();

        const SQL: &str = "\
            SELECT id, reading_id, student_id, room_id, month, days, \
                   electricity_cost, water_cost, total, currency, \
                   created_at \
            FROM utility_shares \
            WHERE reading_id = $1::UUID \
            ORDER BY student_id ASC";
        Ok(self
            .query(SQL, &[&reading_id])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let money = |column: &str| Money {
                    amount: row.get(column),
                    currency: row.get("currency"),
                };
                utility::Share {
                    id: row.get("id"),
                    reading_id: row.get("reading_id"),
                    student_id: row.get("student_id"),
                    room_id: row.get("room_id"),
                    month: row.get("month"),
                    days: u32::try_from(row.get::<_, i32>("days"))
                        .expect("`days` overflow"),
                    electricity_cost: money("electricity_cost"),
                    water_cost: money("water_cost"),
                    total: money("total"),
                    created_at: row.get("created_at"),
                }
            })
            .collect())
    }
}

impl<C> Database<Insert<utility::Share>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(share): Insert<utility::Share>,
    ) -> Result<Self::Ok, Self::Err> {
        let utility::Share {
            id,
            reading_id,
            student_id,
            room_id,
            month,
            days,
            electricity_cost,
            water_cost,
            total,
            created_at,
        } = share;
        let days = i32::try_from(days).expect("`days` overflow");

        const SQL: &str = "\
            INSERT INTO utility_shares (\
                id, reading_id, student_id, room_id, month, days, \
                electricity_cost, water_cost, total, currency, \
                created_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::UUID, $5::VARCHAR, $6::INT4, \
                $7::NUMERIC, $8::NUMERIC, $9::NUMERIC, $10::VARCHAR, \
                $11::TIMESTAMPTZ\
            )";
        self.exec(
            SQL,
            &[
                &id,
                &reading_id,
                &student_id,
                &room_id,
                &month,
                &days,
                &electricity_cost.amount,
                &water_cost.amount,
                &total.amount,
                &total.currency,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
