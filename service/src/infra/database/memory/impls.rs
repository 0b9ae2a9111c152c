//! [`Database`] implementations.

use std::{collections::HashMap, hash::Hash};

use common::{
    operations::{By, Delete, Insert, Lock, Select, Update},
    Date, DateTime, Month,
};
use tracerr::Traced;

use crate::{
    domain::{
        meter, payment, registration, room, student, tariff, transfer,
        utility, Bed, Payment, Registration, Room, Stay, Student, Tariff,
        Transfer,
    },
    infra::{
        database::{self, constraint},
        Database,
    },
    read::{
        self,
        registration::{Approved, Expiring},
        stay::Open,
        Pending,
    },
};

use super::{Error, Fault, Memory, Table};

/// Fails with [`Error::UniqueViolation`] of the `constraint` if any of the
/// `existing` values, other than the one with the same `id`, conflicts.
fn unique<K, V>(
    existing: &HashMap<K, V>,
    id: &K,
    constraint: &'static str,
    conflicts: impl Fn(&V) -> bool,
) -> Result<(), Error>
where
    K: Eq + Hash,
{
    if existing.iter().any(|(k, v)| k != id && conflicts(v)) {
        return Err(Error::UniqueViolation(constraint));
    }
    Ok(())
}

/// Returns the latest [`Approved`] [`Registration`] of the [`Student`].
fn latest_approved<'a>(
    registrations: impl Iterator<Item = &'a Registration>,
    student_id: student::Id,
) -> Option<&'a Registration> {
    registrations
        .filter(|r| {
            r.student_id == student_id
                && r.status == registration::Status::Approved
        })
        .max_by_key(|r| (r.contract_end_date, r.created_at))
}

// Student

impl Database<Select<By<Option<Student>, student::Id>>> for Memory {
    type Ok = Option<Student>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Student>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|s| s.students.get(&id).cloned()))
    }
}

impl Database<Select<By<Option<Student>, student::Email>>> for Memory {
    type Ok = Option<Student>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Student>, student::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();
        Ok(self.read(|s| {
            s.students.values().find(|st| st.email == email).cloned()
        }))
    }
}

impl Database<Select<By<Option<Student>, student::Code>>> for Memory {
    type Ok = Option<Student>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Student>, student::Code>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();
        Ok(self.read(|s| {
            s.students.values().find(|st| st.code == code).cloned()
        }))
    }
}

impl Database<Select<By<Option<Student>, student::VerificationToken>>>
    for Memory
{
    type Ok = Option<Student>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Student>, student::VerificationToken>>,
    ) -> Result<Self::Ok, Self::Err> {
        let token = by.into_inner();
        Ok(self.read(|s| {
            s.students
                .values()
                .find(|st| st.verification_token == Some(token))
                .cloned()
        }))
    }
}

impl Database<Select<By<student::CodeSequence, ()>>> for Memory {
    type Ok = student::CodeSequence;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<student::CodeSequence, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.next_code())
    }
}

impl Database<Insert<Student>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(student): Insert<Student>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Insert(Table::Students), |s| {
            upsert_student(s, student)
        })
        .await
    }
}

impl Database<Update<Student>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(student): Update<Student>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Update(Table::Students), |s| {
            upsert_student(s, student)
        })
        .await
    }
}

/// Stores the provided [`Student`], checking its unique constraints.
fn upsert_student(s: &mut super::State, student: Student) -> Result<(), Error> {
    unique(&s.students, &student.id, constraint::STUDENT_EMAIL, |st| {
        st.email == student.email
    })?;
    unique(&s.students, &student.id, constraint::STUDENT_CODE, |st| {
        st.code == student.code
    })?;
    _ = s.students.insert(student.id, student);
    Ok(())
}

impl Database<Lock<By<Student, student::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Student, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

// Room

impl Database<Select<By<Option<Room>, room::Id>>> for Memory {
    type Ok = Option<Room>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Room>, room::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|s| s.rooms.get(&id).cloned()))
    }
}

impl Database<Select<By<Option<Room>, room::Number>>> for Memory {
    type Ok = Option<Room>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Room>, room::Number>>,
    ) -> Result<Self::Ok, Self::Err> {
        let number = by.into_inner();
        Ok(self.read(|s| s.rooms.values().find(|r| r.number == number).cloned()))
    }
}

impl Database<Insert<Room>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(room): Insert<Room>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Insert(Table::Rooms), |s| upsert_room(s, room))
            .await
    }
}

impl Database<Update<Room>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(room): Update<Room>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Update(Table::Rooms), |s| upsert_room(s, room))
            .await
    }
}

/// Stores the provided [`Room`], checking its unique constraints.
fn upsert_room(s: &mut super::State, room: Room) -> Result<(), Error> {
    unique(&s.rooms, &room.id, constraint::ROOM_NUMBER, |r| {
        r.number == room.number
    })?;
    _ = s.rooms.insert(room.id, room);
    Ok(())
}

impl Database<Lock<By<Room, room::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Room, room::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

// Bed

impl Database<Select<By<Option<Bed>, room::bed::Id>>> for Memory {
    type Ok = Option<Bed>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Bed>, room::bed::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|s| s.beds.get(&id).cloned()))
    }
}

impl Database<Select<By<Option<Bed>, student::Id>>> for Memory {
    type Ok = Option<Bed>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Bed>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|s| {
            s.beds.values().find(|b| b.student_id == Some(id)).cloned()
        }))
    }
}

impl Database<Select<By<Vec<Bed>, room::Id>>> for Memory {
    type Ok = Vec<Bed>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Bed>, room::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        let mut beds = self.read(|s| {
            s.beds
                .values()
                .filter(|b| b.room_id == id)
                .cloned()
                .collect::<Vec<_>>()
        });
        beds.sort_by_key(|b| b.number.to_string());
        Ok(beds)
    }
}

impl Database<Insert<Bed>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(bed): Insert<Bed>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Insert(Table::Beds), |s| upsert_bed(s, bed))
            .await
    }
}

impl Database<Update<Bed>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(bed): Update<Bed>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Update(Table::Beds), |s| upsert_bed(s, bed))
            .await
    }
}

/// Stores the provided [`Bed`], checking its unique constraints.
fn upsert_bed(s: &mut super::State, bed: Bed) -> Result<(), Error> {
    unique(&s.beds, &bed.id, constraint::BED_NUMBER, |b| {
        b.room_id == bed.room_id && b.number == bed.number
    })?;
    unique(&s.beds, &bed.id, "beds_student_id_key", |b| {
        bed.student_id.is_some() && b.student_id == bed.student_id
    })?;
    _ = s.beds.insert(bed.id, bed);
    Ok(())
}

// Registration

impl Database<Select<By<Option<Registration>, registration::Id>>> for Memory {
    type Ok = Option<Registration>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Registration>, registration::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|s| s.registrations.get(&id).cloned()))
    }
}

impl Database<Select<By<Option<Approved<Registration>>, student::Id>>>
    for Memory
{
    type Ok = Option<Approved<Registration>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Approved<Registration>>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|s| {
            latest_approved(s.registrations.values(), id)
                .cloned()
                .map(Approved)
        }))
    }
}

impl Database<Select<By<Option<Pending<Registration>>, student::Id>>>
    for Memory
{
    type Ok = Option<Pending<Registration>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Pending<Registration>>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|s| {
            s.registrations
                .values()
                .find(|r| {
                    r.student_id == id
                        && r.status == registration::Status::Pending
                })
                .cloned()
                .map(Pending)
        }))
    }
}

impl
    Database<
        Select<
            By<Vec<Expiring<Registration>>, registration::ContractEndDate>,
        >,
    > for Memory
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
        let mut expiring = self.read(|s| {
            s.students
                .values()
                .filter(|st| st.status.holds_bed())
                .filter_map(|st| {
                    latest_approved(s.registrations.values(), st.id)
                })
                .filter(|r| r.contract_end_date.is_some_and(|d| d <= until))
                .cloned()
                .collect::<Vec<_>>()
        });
        expiring.sort_by_key(|r| r.contract_end_date);
        Ok(expiring.into_iter().map(Expiring).collect())
    }
}

impl Database<Insert<Registration>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(registration): Insert<Registration>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Insert(Table::Registrations), |s| {
            _ = s.registrations.insert(registration.id, registration);
            Ok(())
        })
        .await
    }
}

impl Database<Update<Registration>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(registration): Update<Registration>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Update(Table::Registrations), |s| {
            _ = s.registrations.insert(registration.id, registration);
            Ok(())
        })
        .await
    }
}

impl Database<Lock<By<Registration, registration::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Registration, registration::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

// Stay

impl Database<Select<By<Option<Open<Stay>>, student::Id>>> for Memory {
    type Ok = Option<Open<Stay>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Open<Stay>>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|s| {
            s.stays
                .values()
                .find(|st| st.student_id == id && st.is_open())
                .cloned()
                .map(Open)
        }))
    }
}

impl Database<Select<By<Vec<Stay>, (room::Id, Month)>>> for Memory {
    type Ok = Vec<Stay>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Stay>, (room::Id, Month)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (room_id, month) = by.into_inner();
        let mut stays = self.read(|s| {
            s.stays
                .values()
                .filter(|st| st.room_id == room_id && st.days_within(month) > 0)
                .cloned()
                .collect::<Vec<_>>()
        });
        stays.sort_by_key(|st| st.start_date);
        Ok(stays)
    }
}

impl Database<Insert<Stay>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(stay): Insert<Stay>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Insert(Table::Stays), |s| {
            _ = s.stays.insert(stay.id, stay);
            Ok(())
        })
        .await
    }
}

impl Database<Update<Stay>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(stay): Update<Stay>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Update(Table::Stays), |s| {
            _ = s.stays.insert(stay.id, stay);
            Ok(())
        })
        .await
    }
}

// Tariff

impl Database<Select<By<tariff::Timeline, ()>>> for Memory {
    type Ok = tariff::Timeline;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<tariff::Timeline, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.read(|s| s.tariffs.values().cloned().collect::<Vec<_>>().into()))
    }
}

impl Database<Lock<By<tariff::Timeline, ()>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<tariff::Timeline, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl Database<Insert<Tariff>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(tariff): Insert<Tariff>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Insert(Table::Tariffs), |s| upsert_tariff(s, tariff))
            .await
    }
}

impl Database<Update<Tariff>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(tariff): Update<Tariff>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Update(Table::Tariffs), |s| upsert_tariff(s, tariff))
            .await
    }
}

/// Stores the provided [`Tariff`], checking its unique constraints.
fn upsert_tariff(s: &mut super::State, tariff: Tariff) -> Result<(), Error> {
    unique(&s.tariffs, &tariff.id, constraint::TARIFF_EFFECTIVE_FROM, |t| {
        t.effective_from == tariff.effective_from
    })?;
    _ = s.tariffs.insert(tariff.id, tariff);
    Ok(())
}

impl Database<Delete<By<Tariff, tariff::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Tariff, tariff::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.write(Fault::Delete(Table::Tariffs), |s| {
            _ = s.tariffs.remove(&id);
            Ok(())
        })
        .await
    }
}

impl
    Database<
        Select<
            By<
                read::meter::HasReadings,
                (tariff::EffectiveFrom, Option<tariff::EffectiveTo>),
            >,
        >,
    > for Memory
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
        Ok(self
            .read(|s| {
                s.readings.values().any(|r| {
                    let (first, last): (Date, Date) =
                        (r.month.first_day(), r.month.last_day());
                    from.coerce::<()>() <= last
                        && to.map_or(true, |to| first <= to.coerce::<()>())
                })
            })
            .into())
    }
}

// Meter reading

impl Database<Select<By<Option<meter::Reading>, meter::Id>>> for Memory {
    type Ok = Option<meter::Reading>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<meter::Reading>, meter::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|s| s.readings.get(&id).cloned()))
    }
}

impl Database<Select<By<Option<meter::Reading>, (room::Id, Month)>>>
    for Memory
{
    type Ok = Option<meter::Reading>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<meter::Reading>, (room::Id, Month)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (room_id, month) = by.into_inner();
        Ok(self.read(|s| {
            s.readings
                .values()
                .find(|r| r.room_id == room_id && r.month == month)
                .cloned()
        }))
    }
}

impl Database<Insert<meter::Reading>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(reading): Insert<meter::Reading>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Insert(Table::MeterReadings), |s| {
            unique(
                &s.readings,
                &reading.id,
                constraint::METER_READING_MONTH,
                |r| r.room_id == reading.room_id && r.month == reading.month,
            )?;
            _ = s.readings.insert(reading.id, reading);
            Ok(())
        })
        .await
    }
}

// Utility share

impl Database<Select<By<Vec<utility::Share>, meter::Id>>> for Memory {
    type Ok = Vec<utility::Share>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<utility::Share>, meter::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        let mut shares = self.read(|s| {
            s.shares
                .values()
                .filter(|sh| sh.reading_id == id)
                .cloned()
                .collect::<Vec<_>>()
        });
        shares.sort_by_key(|sh| sh.student_id);
        Ok(shares)
    }
}

impl Database<Insert<utility::Share>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(share): Insert<utility::Share>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Insert(Table::UtilityShares), |s| {
            unique(
                &s.shares,
                &share.id,
                "utility_shares_reading_id_student_id_key",
                |sh| {
                    sh.reading_id == share.reading_id
                        && sh.student_id == share.student_id
                },
            )?;
            _ = s.shares.insert(share.id, share);
            Ok(())
        })
        .await
    }
}

// Payment

impl Database<Select<By<Option<Payment>, payment::Id>>> for Memory {
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|s| s.payments.get(&id).cloned()))
    }
}

impl Database<Select<By<Option<Payment>, payment::OrderCode>>> for Memory {
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::OrderCode>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();
        Ok(self.read(|s| {
            s.payments
                .values()
                .find(|p| p.order_code == Some(code))
                .cloned()
        }))
    }
}

impl Database<Select<By<Option<Payment>, payment::Key>>> for Memory {
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let key = by.into_inner();
        Ok(self.read(|s| s.payments.values().find(|p| p.key() == key).cloned()))
    }
}

impl Database<Select<By<Vec<Payment>, student::Id>>> for Memory {
    type Ok = Vec<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Payment>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        let mut payments = self.read(|s| {
            s.payments
                .values()
                .filter(|p| p.student_id == id)
                .cloned()
                .collect::<Vec<_>>()
        });
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }
}

impl Database<Insert<Payment>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Insert(Table::Payments), |s| {
            upsert_payment(s, payment)
        })
        .await
    }
}

impl Database<Update<Payment>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(payment): Update<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Update(Table::Payments), |s| {
            upsert_payment(s, payment)
        })
        .await
    }
}

/// Stores the provided [`Payment`], checking its unique constraints.
fn upsert_payment(s: &mut super::State, payment: Payment) -> Result<(), Error> {
    if payment.room_id.is_some() {
        let key = payment.key();
        unique(&s.payments, &payment.id, constraint::PAYMENT_KEY, |p| {
            p.key() == key
        })?;
    }
    if payment.order_code.is_some() {
        unique(
            &s.payments,
            &payment.id,
            constraint::PAYMENT_ORDER_CODE,
            |p| p.order_code == payment.order_code,
        )?;
    }
    _ = s.payments.insert(payment.id, payment);
    Ok(())
}

impl Database<Delete<By<Payment, payment::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Payment, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.write(Fault::Delete(Table::Payments), |s| {
            _ = s.payments.remove(&id);
            Ok(())
        })
        .await
    }
}

impl Database<Lock<By<Payment, payment::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Payment, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl Database<Update<By<read::payment::Overdue, payment::CreationDateTime>>>
    for Memory
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
        self.write(Fault::Update(Table::Payments), |s| {
            let mut count = 0;
            for p in s.payments.values_mut().filter(|p| {
                p.status == payment::Status::Unpaid && p.created_at < deadline
            }) {
                p.status = payment::Status::Overdue;
                count += 1;
            }
            Ok(count)
        })
        .await
    }
}

impl Database<Update<By<read::payment::ExpiredLink, DateTime>>> for Memory {
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(by): Update<By<read::payment::ExpiredLink, DateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let now: payment::LinkExpirationDateTime = by.into_inner().coerce();
        self.write(Fault::Update(Table::Payments), |s| {
            let mut count = 0;
            for p in s.payments.values_mut().filter(|p| {
                p.status == payment::Status::AwaitingGateway
                    && p.link_expires_at.is_some_and(|at| at <= now)
            }) {
                p.status = payment::Status::Unpaid;
                p.method = None;
                p.link_expires_at = None;
                count += 1;
            }
            Ok(count)
        })
        .await
    }
}

// Transfer

impl Database<Select<By<Option<Transfer>, transfer::Id>>> for Memory {
    type Ok = Option<Transfer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Transfer>, transfer::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|s| s.transfers.get(&id).cloned()))
    }
}

impl Database<Select<By<Option<Pending<Transfer>>, student::Id>>> for Memory {
    type Ok = Option<Pending<Transfer>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Pending<Transfer>>, student::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|s| {
            s.transfers
                .values()
                .find(|t| {
                    t.student_id == id && t.status == transfer::Status::Pending
                })
                .cloned()
                .map(Pending)
        }))
    }
}

impl Database<Insert<Transfer>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(transfer): Insert<Transfer>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Insert(Table::Transfers), |s| {
            _ = s.transfers.insert(transfer.id, transfer);
            Ok(())
        })
        .await
    }
}

impl Database<Update<Transfer>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(transfer): Update<Transfer>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Fault::Update(Table::Transfers), |s| {
            _ = s.transfers.insert(transfer.id, transfer);
            Ok(())
        })
        .await
    }
}

impl Database<Lock<By<Transfer, transfer::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Transfer, transfer::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}
