//! [`Tariff`]-related [`Database`] implementations.

use common::{
    operations::{By, Delete, Insert, Lock, Select, Update},
    Money,
};
use tracerr::Traced;

use crate::{
    domain::{tariff, Tariff},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

impl<C> Database<Select<By<tariff::Timeline, ()>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = tariff::Timeline;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<tariff::Timeline, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT id, effective_from, effective_to, \
                   electricity_price, water_price, currency, \
                   created_at \
            FROM tariffs \
            ORDER BY effective_from ASC";
        Ok(self
            .query(SQL, &[])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| Tariff {
                id: row.get("id"),
                effective_from: row.get("effective_from"),
                effective_to: row.get("effective_to"),
                electricity_price: Money {
                    amount: row.get("electricity_price"),
                    currency: row.get("currency"),
                },
                water_price: Money {
                    amount: row.get("water_price"),
                    currency: row.get("currency"),
                },
                created_at: row.get("created_at"),
            })
            .collect::<Vec<_>>()
            .into())
    }
}

impl<C> Database<Lock<By<tariff::Timeline, ()>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<tariff::Timeline, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Readers are still allowed, while other writers wait.
        const SQL: &str = "LOCK TABLE tariffs IN SHARE ROW EXCLUSIVE MODE";
        self.exec(SQL, &[]).await.map_err(tracerr::wrap!()).map(drop)
    }
}

impl<C> Database<Insert<Tariff>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Tariff>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(tariff): Insert<Tariff>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(tariff)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Tariff>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(tariff): Update<Tariff>,
    ) -> Result<Self::Ok, Self::Err> {
        let Tariff {
            id,
            effective_from,
            effective_to,
            electricity_price,
            water_price,
            created_at,
        } = tariff;

        const SQL: &str = "\
            INSERT INTO tariffs (\
                id, effective_from, effective_to, \
                electricity_price, water_price, currency, \
                created_at\
            ) \
            VALUES (\
                $1::UUID, $2::DATE, $3::DATE, \
                $4::NUMERIC, $5::NUMERIC, $6::VARCHAR, \
                $7::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET effective_from = EXCLUDED.effective_from, \
                effective_to = EXCLUDED.effective_to, \
                electricity_price = EXCLUDED.electricity_price, \
                water_price = EXCLUDED.water_price, \
                currency = EXCLUDED.currency";
        self.exec(
            SQL,
            &[
                &id,
                &effective_from,
                &effective_to,
                &electricity_price.amount,
                &water_price.amount,
                &electricity_price.currency,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Delete<By<Tariff, tariff::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Tariff, tariff::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            DELETE FROM tariffs \
            WHERE id = $1::UUID";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C>
    Database<
        Select<
            By<
                read::meter::HasReadings,
                (tariff::EffectiveFrom, Option<tariff::EffectiveTo>),
            >,
        >,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = read::meter::HasReadings;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<
                read::meter::HasReadings,
                (tariff::EffectiveFrom, Option<tariff::EffectiveTo>),
            >,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let (from, to) = by.into_inner();

        // Month of a reading intersects the period, if it ends after the
        // period starts and starts before the period ends.
        const SQL: &str = "\
            SELECT EXISTS (\
                SELECT 1 \
                FROM meter_readings \
                WHERE TO_DATE(month, 'MM/YYYY') \
                          + INTERVAL '1 month' > $1::DATE \
                  AND ($2::DATE IS NULL \
                       OR TO_DATE(month, 'MM/YYYY') <= $2::DATE)\
            )";
        let rows = self
            .query(SQL, &[&from, &to])
            .await
            .map_err(tracerr::wrap!())?;
        Ok(rows
            .first()
            .is_some_and(|row| row.get::<_, bool>(0))
            .into())
    }
}
