//! [`Student`]-related [`Database`] implementations.

use common::operations::{By, Insert, Lock, Select, Update};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{student, Student},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of the `students` table, in the order [`from_row()`] expects.
const COLUMNS: &str = "\
    id, code, name, birth_date, gender, \
    email, phone, email_verified, verification_token, password_hash, \
    status, renewal_intent, created_at";

/// Builds a [`Student`] out of the provided [`Row`].
fn from_row(row: &Row) -> Student {
    Student {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        birth_date: row.get("birth_date"),
        gender: row.get("gender"),
        email: row.get("email"),
        phone: row.get("phone"),
        email_verified: row.get("email_verified"),
        verification_token: row.get("verification_token"),
        password_hash: row.get("password_hash"),
        status: row.get("status"),
        renewal_intent: row.get("renewal_intent"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Student>, student::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Student>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Student>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let sql = format!("SELECT {COLUMNS} FROM students WHERE id = $1::UUID");
        Ok(self
            .query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Option<Student>, student::Email>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Student>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Student>, student::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} FROM students WHERE email = $1::VARCHAR LIMIT 1",
        );
        Ok(self
            .query_opt(&sql, &[&email])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Option<Student>, student::Code>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Student>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Student>, student::Code>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} FROM students WHERE code = $1::VARCHAR LIMIT 1",
        );
        Ok(self
            .query_opt(&sql, &[&code])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Option<Student>, student::VerificationToken>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Student>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Student>, student::VerificationToken>>,
    ) -> Result<Self::Ok, Self::Err> {
        let token = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} FROM students \
             WHERE verification_token = $1::UUID \
             LIMIT 1",
        );
        Ok(self
            .query_opt(&sql, &[&token])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<student::CodeSequence, ()>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = student::CodeSequence;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<student::CodeSequence, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "SELECT nextval('student_code_seq')";
        let rows = self.query(SQL, &[]).await.map_err(tracerr::wrap!())?;
        let next = rows.first().map_or(0, |row| row.get::<_, i64>(0));
        Ok(next.unsigned_abs().into())
    }
}

impl<C> Database<Insert<Student>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Student>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(student): Insert<Student>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(student)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Student>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(student): Update<Student>,
    ) -> Result<Self::Ok, Self::Err> {
        let Student {
            id,
            code,
            name,
            birth_date,
            gender,
            email,
            phone,
            email_verified,
            verification_token,
            password_hash,
            status,
            renewal_intent,
            created_at,
        } = student;

        const SQL: &str = "\
            INSERT INTO students (\
                id, code, name, birth_date, gender, \
                email, phone, email_verified, verification_token, \
                password_hash, status, renewal_intent, created_at\
            ) \
            VALUES (\
                $1::UUID, $2::VARCHAR, $3::VARCHAR, $4::DATE, $5::VARCHAR, \
                $6::VARCHAR, $7::VARCHAR, $8::BOOLEAN, $9::UUID, \
                $10::VARCHAR, $11::VARCHAR, $12::VARCHAR, $13::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET code = EXCLUDED.code, \
                name = EXCLUDED.name, \
                birth_date = EXCLUDED.birth_date, \
                gender = EXCLUDED.gender, \
                email = EXCLUDED.email, \
                phone = EXCLUDED.phone, \
                email_verified = EXCLUDED.email_verified, \
                verification_token = EXCLUDED.verification_token, \
                password_hash = EXCLUDED.password_hash, \
                status = EXCLUDED.status, \
                renewal_intent = EXCLUDED.renewal_intent";
        self.exec(
            SQL,
            &[
                &id,
                &code,
                &name,
                &birth_date,
                &gender,
                &email,
                &phone,
                &email_verified,
                &verification_token,
                &password_hash,
                &status,
                &renewal_intent,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Student, student::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Student, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: student::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM students \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
