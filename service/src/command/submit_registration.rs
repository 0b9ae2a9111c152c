//! [`Command`] for submitting a new [`Registration`].

use common::{
    operations::{By, Commit, Insert, Notify, Select, Transact, Transacted},
    Date, DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        registration, room, student, term, Registration, Room, Student,
    },
    infra::{
        database::{self, constraint},
        notifier::{self, Notification},
        Database, Notifier,
    },
    Service,
};

use super::Command;

/// Number of attempts to generate a free [`student::Code`].
const CODE_ATTEMPTS: usize = 5;

/// [`Command`] for submitting a new [`Registration`] along with a new
/// [`Student`].
#[derive(Clone, Debug)]
pub struct SubmitRegistration {
    /// [`student::Code`] of the new [`Student`], if assigned by the
    /// university.
    ///
    /// Generated, if not provided.
    pub code: Option<student::Code>,

    /// [`student::Name`] of the new [`Student`].
    pub name: student::Name,

    /// Birth date of the new [`Student`].
    pub birth_date: Option<student::BirthDate>,

    /// [`student::Gender`] of the new [`Student`].
    pub gender: student::Gender,

    /// [`student::Email`] of the new [`Student`].
    pub email: student::Email,

    /// [`student::Phone`] of the new [`Student`].
    pub phone: Option<student::Phone>,

    /// ID of the requested [`Room`], if any.
    pub room_id: Option<room::Id>,

    /// Requested date of moving in, if any.
    pub move_in_date: Option<registration::MoveInDate>,

    /// Free-text [`registration::Preference`].
    pub preference: Option<registration::Preference>,
}

/// Outcome of a [`SubmitRegistration`].
#[derive(Clone, Debug)]
pub enum Submission {
    /// New [`Student`] and [`Registration`] are created.
    Created {
        /// Created [`Student`].
        student: Box<Student>,

        /// Created [`Registration`].
        registration: Registration,
    },

    /// [`Student`] with the same email or code exists already, so should log
    /// in instead.
    AlreadyExists,
}

impl<Db, Ntf> Command<SubmitRegistration> for Service<Db, Ntf>
where
    Db: Database<
            Select<By<Option<Student>, student::Email>>,
            Ok = Option<Student>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Student>, student::Code>>,
            Ok = Option<Student>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<student::CodeSequence, ()>>,
            Ok = student::CodeSequence,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Room>, room::Id>>,
            Ok = Option<Room>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<Student>, Err = Traced<database::Error>>
        + Database<Insert<Registration>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Ntf: Notifier<
        Notify<Notification>,
        Ok = (),
        Err = Traced<notifier::Error>,
    >,
{
    type Ok = Submission;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: SubmitRegistration,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SubmitRegistration {
            code,
            name,
            birth_date,
            gender,
            email,
            phone,
            room_id,
            move_in_date,
            preference,
        } = cmd;

        let today = Date::today();
        let contract_end_date = move_in_date
            .map(|date| {
                let date = date.coerce();
                term::validate_move_in(date, today)
                    .map(|()| term::end_date(date).coerce())
            })
            .transpose()
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let existing = self
            .database()
            .execute(Select(By::<Option<Student>, _>::new(email.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if existing.is_some() {
            return Ok(Submission::AlreadyExists);
        }

        let supplied = code.is_some();
        let code = if let Some(code) = code {
            let existing = self
                .database()
                .execute(Select(By::<Option<Student>, _>::new(code.clone())))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if existing.is_some() {
                return Ok(Submission::AlreadyExists);
            }
            code
        } else {
            // Generated codes may clash with the ones assigned by the
            // university.
            let mut free = None;
            for _ in 0..CODE_ATTEMPTS {
                let seq = self
                    .database()
                    .execute(Select(By::<student::CodeSequence, _>::new(())))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                let code = student::Code::generate(today.year(), seq.into());
                let existing = self
                    .database()
                    .execute(Select(By::<Option<Student>, _>::new(
                        code.clone(),
                    )))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                if existing.is_none() {
                    free = Some(code);
                    break;
                }
                log::debug!(%code, "generated `student::Code` is taken");
            }
            free.ok_or(E::NoFreeCode).map_err(tracerr::wrap!())?
        };

        if let Some(id) = room_id {
            self.database()
                .execute(Select(By::<Option<Room>, _>::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::RoomNotExists(id))
                .map_err(tracerr::wrap!())
                .map(drop)?;
        }

        let now = DateTime::now();
        let token = student::VerificationToken::new();
        let student = Student {
            id: student::Id::new(),
            code,
            name,
            birth_date,
            gender,
            email,
            phone,
            email_verified: false,
            verification_token: Some(token),
            password_hash: None,
            status: student::Status::Registered,
            renewal_intent: student::RenewalIntent::Undecided,
            created_at: now.coerce(),
        };
        let registration = Registration {
            id: registration::Id::new(),
            student_id: student.id,
            room_id,
            bed_id: None,
            move_in_date,
            contract_end_date,
            preference,
            status: registration::Status::Pending,
            rejection_reason: None,
            reviewed_by: None,
            reviewed_at: None,
            renewal_of: None,
            reminded_at: None,
            created_at: now.coerce(),
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let inserted = tx.execute(Insert(student.clone())).await.map(drop);
        if let Err(e) = &inserted {
            let e = e.as_ref();
            if e.is_unique_violation(Some(constraint::STUDENT_EMAIL))
                || (supplied
                    && e.is_unique_violation(Some(constraint::STUDENT_CODE)))
            {
                return Ok(Submission::AlreadyExists);
            }
        }
        inserted.map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(registration.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.notify(Notification::EmailVerification {
            email: student.email.clone(),
            token,
        })
        .await;

        Ok(Submission::Created {
            student: Box::new(student),
            registration,
        })
    }
}

/// Error of [`SubmitRegistration`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Requested move-in date is not acceptable.
    #[display("Invalid move-in date: {_0}")]
    #[from]
    InvalidMoveInDate(term::MoveInError),

    /// No free [`student::Code`] could be generated.
    #[display("No free `student::Code` is left")]
    NoFreeCode,

    /// Requested [`Room`] does not exist.
    #[display("`Room(id: {_0})` does not exist")]
    RoomNotExists(#[error(not(source))] room::Id),
}
