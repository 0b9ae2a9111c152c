//! In-memory [`Database`] implementation.

mod impls;

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use common::operations::{Commit, Transact};
use derive_more::{Display, Error as StdError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracerr::Traced;

use crate::{
    domain::{
        meter, payment, registration, room, stay, student, tariff, transfer,
        utility, Bed, Payment, Registration, Room, Stay, Student, Tariff,
        Transfer,
    },
    infra::{database, Database},
};

/// In-memory [`Database`].
///
/// [`Transact`]ing takes a snapshot of the whole state, which replaces the
/// state on [`Commit`]. Dropping a non-committed transaction discards it.
/// Only one transaction may be in progress at a time.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// State shared between all the clones of this [`Memory`].
    shared: Arc<Shared>,

    /// Transaction of this [`Memory`], if it's [`Transact`]ed.
    tx: Option<Arc<Mutex<Tx>>>,
}

/// State shared between [`Memory`] clones.
#[derive(Debug, Default)]
struct Shared {
    /// Committed [`State`].
    state: Mutex<State>,

    /// Lock held by the transaction in progress, or a non-transactional
    /// write.
    writer: Arc<AsyncMutex<()>>,

    /// Last value of the [`student::CodeSequence`].
    code_sequence: AtomicU64,

    /// [`Fault`]s to be injected.
    faults: Mutex<Vec<Fault>>,
}

/// Transaction of a [`Memory`].
#[derive(Debug)]
struct Tx {
    /// Working copy of the [`State`].
    state: State,

    /// Guard of the [`Shared::writer`] lock.
    _writer: OwnedMutexGuard<()>,
}

/// Stored entities.
#[derive(Clone, Debug, Default)]
struct State {
    students: HashMap<student::Id, Student>,
    rooms: HashMap<room::Id, Room>,
    beds: HashMap<room::bed::Id, Bed>,
    registrations: HashMap<registration::Id, Registration>,
    stays: HashMap<stay::Id, Stay>,
    tariffs: HashMap<tariff::Id, Tariff>,
    readings: HashMap<meter::Id, meter::Reading>,
    shares: HashMap<utility::Id, utility::Share>,
    payments: HashMap<payment::Id, Payment>,
    transfers: HashMap<transfer::Id, Transfer>,
}

impl Memory {
    /// Creates a new empty [`Memory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next operation matching the provided [`Fault`] fail.
    pub fn fail_on(&self, fault: Fault) {
        lock(&self.shared.faults).push(fault);
    }

    /// Fails if the provided [`Fault`] is scheduled for injection.
    fn check(&self, fault: Fault) -> Result<(), Traced<database::Error>> {
        let mut faults = lock(&self.shared.faults);
        if let Some(idx) = faults.iter().position(|f| *f == fault) {
            _ = faults.remove(idx);
            return Err(tracerr::new!(database::Error::from(
                Error::Injected(fault)
            )));
        }
        Ok(())
    }

    /// Reads the [`State`] visible to this [`Memory`].
    fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        if let Some(tx) = &self.tx {
            f(&lock(tx).state)
        } else {
            f(&lock(&self.shared.state))
        }
    }

    /// Modifies the [`State`] visible to this [`Memory`].
    ///
    /// Outside of a transaction the committed [`State`] is modified
    /// directly.
    async fn write<R>(
        &self,
        fault: Fault,
        f: impl FnOnce(&mut State) -> Result<R, Error>,
    ) -> Result<R, Traced<database::Error>> {
        self.check(fault)?;
        let res = if let Some(tx) = &self.tx {
            f(&mut lock(tx).state)
        } else {
            let _writer = self.shared.writer.lock().await;
            f(&mut lock(&self.shared.state))
        };
        res.map_err(|e| tracerr::new!(database::Error::from(e)))
    }

    /// Returns the next value of the [`student::CodeSequence`].
    fn next_code(&self) -> student::CodeSequence {
        (self.shared.code_sequence.fetch_add(1, Ordering::SeqCst) + 1).into()
    }
}

impl Database<Transact> for Memory {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        if self.tx.is_some() {
            return Ok(self.clone());
        }
        let writer = Arc::clone(&self.shared.writer).lock_owned().await;
        let state = lock(&self.shared.state).clone();
        Ok(Self {
            shared: Arc::clone(&self.shared),
            tx: Some(Arc::new(Mutex::new(Tx {
                state,
                _writer: writer,
            }))),
        })
    }
}

impl Database<Commit> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.check(Fault::Commit)?;
        if let Some(tx) = &self.tx {
            let state = lock(tx).state.clone();
            *lock(&self.shared.state) = state;
        }
        Ok(())
    }
}

/// Failure to be injected into a [`Memory`] operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Fault {
    /// Inserting into the [`Table`].
    Insert(Table),

    /// Updating the [`Table`].
    Update(Table),

    /// Deleting from the [`Table`].
    Delete(Table),

    /// Committing a transaction.
    Commit,
}

/// Table of a [`Memory`] database.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Table {
    /// [`Student`]s.
    Students,

    /// [`Room`]s.
    Rooms,

    /// [`Bed`]s.
    Beds,

    /// [`Registration`]s.
    Registrations,

    /// [`Stay`]s.
    Stays,

    /// [`Tariff`]s.
    Tariffs,

    /// [`meter::Reading`]s.
    MeterReadings,

    /// [`utility::Share`]s.
    UtilityShares,

    /// [`Payment`]s.
    Payments,

    /// [`Transfer`]s.
    Transfers,
}

/// [`Memory`] database error.
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// Injected [`Fault`].
    #[display("injected `{_0:?}` failure")]
    Injected(#[error(not(source))] Fault),

    /// Unique constraint is violated.
    #[display("unique constraint `{_0}` is violated")]
    UniqueViolation(#[error(not(source))] &'static str),
}

impl Error {
    /// Checks if the error is a unique violation of the specified constraint.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::UniqueViolation(c) => constraint.map_or(true, |x| x == *c),
            Self::Injected(_) => false,
        }
    }
}

/// Locks the provided [`Mutex`], ignoring its poisoning.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Commit, Insert, Select, Transact},
        Money,
    };
    use rust_decimal::Decimal;

    use crate::{
        domain::{payment, room, student, Payment, Room},
        infra::{database::constraint, Database as _},
    };

    use super::{Fault, Memory, Table};

    fn room() -> Room {
        room::spec::room(2, crate::domain::student::Gender::Male)
    }

    #[tokio::test]
    async fn commits_transaction() {
        let db = Memory::new();
        let room = room();

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Insert(room.clone())).await.unwrap();
        let seen = db
            .execute(Select(By::<Option<Room>, _>::new(room.id)))
            .await
            .unwrap();
        assert!(seen.is_none(), "uncommitted changes are visible");
        tx.execute(Commit).await.unwrap();
        drop(tx);

        let seen = db
            .execute(Select(By::<Option<Room>, _>::new(room.id)))
            .await
            .unwrap();
        assert!(seen.is_some());
    }

    #[tokio::test]
    async fn discards_dropped_transaction() {
        let db = Memory::new();
        let room = room();

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Insert(room.clone())).await.unwrap();
        drop(tx);

        let seen = db
            .execute(Select(By::<Option<Room>, _>::new(room.id)))
            .await
            .unwrap();
        assert!(seen.is_none());
    }

    #[tokio::test]
    async fn injects_faults_once() {
        let db = Memory::new();
        db.fail_on(Fault::Insert(Table::Rooms));

        assert!(db.execute(Insert(room())).await.is_err());
        assert!(db.execute(Insert(room())).await.is_ok());
    }

    #[tokio::test]
    async fn enforces_unique_room_number() {
        let db = Memory::new();
        let a = room();
        let mut b = room();
        b.number = a.number.clone();

        db.execute(Insert(a)).await.unwrap();
        let err = db.execute(Insert(b)).await.unwrap_err();

        assert!(err.as_ref().is_unique_violation(Some("rooms_number_key")));
    }

    #[tokio::test]
    async fn refuses_double_invoice() {
        let db = Memory::new();
        let key = payment::Key {
            student_id: student::Id::new(),
            room_id: Some(room::Id::new()),
            month: "09/2024".parse().unwrap(),
            kind: payment::Kind::Rent,
        };
        let rent = Money::vnd(Decimal::from(500_000));

        db.execute(Insert(Payment::new(key, rent))).await.unwrap();
        let err = db
            .execute(Insert(Payment::new(key, rent)))
            .await
            .unwrap_err();

        assert!(err
            .as_ref()
            .is_unique_violation(Some(constraint::PAYMENT_KEY)));
        let payments = db
            .execute(Select(By::<Vec<Payment>, _>::new(key.student_id)))
            .await
            .unwrap();
        assert_eq!(payments.len(), 1);
    }
}
