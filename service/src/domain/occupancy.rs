//! Occupancy ledger of [`Room`]s and [`Bed`]s.
//!
//! Keeps [`Room::occupants`] equal to the number of its occupied [`Bed`]s and
//! a [`Student`] in at most one [`Bed`].

use derive_more::{Display, Error};

use crate::domain::{room, student, Bed, Room, Student};

/// Assigns the provided [`Bed`] of the [`Room`] to the [`Student`].
///
/// `held` is the [`Bed`] the [`Student`] currently occupies, if any.
///
/// # Errors
///
/// If the [`Bed`] cannot be assigned to the [`Student`].
pub fn assign(
    room: &mut Room,
    bed: &mut Bed,
    student: &Student,
    held: Option<&Bed>,
) -> Result<(), AssignError> {
    use AssignError as E;

    if bed.room_id != room.id {
        return Err(E::BedNotInRoom {
            bed: bed.id,
            room: room.id,
        });
    }
    if let Some(occupant) = bed.student_id {
        return Err(E::BedOccupied {
            bed: bed.id,
            occupant,
        });
    }
    if let Some(held) = held.filter(|b| b.id != bed.id) {
        return Err(E::StudentHoldsBed {
            student: student.id,
            bed: held.id,
        });
    }
    if room.gender != student.gender {
        return Err(E::GenderMismatch {
            room: room.id,
            student: student.id,
        });
    }
    if !room.has_vacancy() {
        return Err(E::RoomFull(room.id));
    }

    bed.student_id = Some(student.id);
    room.occupants += 1;
    Ok(())
}

/// Releases the provided [`Bed`] of the [`Room`], returning the ID of the
/// [`Student`] who occupied it.
///
/// # Errors
///
/// If the [`Bed`] is not occupied.
pub fn release(
    room: &mut Room,
    bed: &mut Bed,
) -> Result<student::Id, ReleaseError> {
    use ReleaseError as E;

    if bed.room_id != room.id {
        return Err(E::BedNotInRoom {
            bed: bed.id,
            room: room.id,
        });
    }
    let occupant = bed.student_id.take().ok_or(E::BedVacant(bed.id))?;
    room.occupants = room.occupants.saturating_sub(1);
    Ok(occupant)
}

/// Error of [`assign()`]ing a [`Bed`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum AssignError {
    /// [`Bed`] belongs to another [`Room`].
    #[display("`Bed(id: {bed})` doesn't belong to `Room(id: {room})`")]
    BedNotInRoom {
        /// ID of the [`Bed`].
        bed: room::bed::Id,

        /// ID of the [`Room`].
        room: room::Id,
    },

    /// [`Bed`] is already occupied.
    #[display("`Bed(id: {bed})` is occupied by `Student(id: {occupant})`")]
    BedOccupied {
        /// ID of the [`Bed`].
        bed: room::bed::Id,

        /// ID of the occupying [`Student`].
        occupant: student::Id,
    },

    /// [`Student`] already occupies another [`Bed`].
    #[display("`Student(id: {student})` already occupies `Bed(id: {bed})`")]
    StudentHoldsBed {
        /// ID of the [`Student`].
        student: student::Id,

        /// ID of the occupied [`Bed`].
        bed: room::bed::Id,
    },

    /// [`Room`] is designated for another gender.
    #[display(
        "`Room(id: {room})` is designated for another gender than \
         `Student(id: {student})`"
    )]
    GenderMismatch {
        /// ID of the [`Room`].
        room: room::Id,

        /// ID of the [`Student`].
        student: student::Id,
    },

    /// [`Room`] has no vacancy.
    #[display("`Room(id: {_0})` is full")]
    RoomFull(#[error(not(source))] room::Id),
}

/// Error of [`release()`]ing a [`Bed`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum ReleaseError {
    /// [`Bed`] belongs to another [`Room`].
    #[display("`Bed(id: {bed})` doesn't belong to `Room(id: {room})`")]
    BedNotInRoom {
        /// ID of the [`Bed`].
        bed: room::bed::Id,

        /// ID of the [`Room`].
        room: room::Id,
    },

    /// [`Bed`] is not occupied.
    #[display("`Bed(id: {_0})` is not occupied")]
    BedVacant(#[error(not(source))] room::bed::Id),
}

#[cfg(test)]
pub(crate) mod spec {
    use common::DateTime;
    use proptest::prelude::*;

    use crate::domain::{
        room::{self, bed, spec::room},
        student::{self, Gender},
        Bed, Student,
    };

    use super::{assign, release, AssignError, ReleaseError};

    pub(crate) fn student(gender: Gender) -> Student {
        let id = student::Id::new();
        Student {
            id,
            code: student::Code::generate(2025, 1),
            name: student::Name::new("Nguyen Van A").unwrap(),
            birth_date: None,
            gender,
            email: student::Email::new(format!("{id}@example.edu.vn"))
                .unwrap(),
            phone: None,
            email_verified: true,
            verification_token: None,
            password_hash: None,
            status: student::Status::Registered,
            renewal_intent: student::RenewalIntent::Undecided,
            created_at: DateTime::now().coerce(),
        }
    }

    pub(crate) fn bed(room_id: room::Id, number: usize) -> Bed {
        Bed {
            id: bed::Id::new(),
            room_id,
            number: bed::Number::new(number.to_string()).unwrap(),
            student_id: None,
        }
    }

    #[test]
    fn assigns_and_releases() {
        let mut room = room(2, Gender::Female);
        let mut b = bed(room.id, 1);
        let s = student(Gender::Female);

        assign(&mut room, &mut b, &s, None).unwrap();
        assert_eq!(b.student_id, Some(s.id));
        assert_eq!(room.occupants, 1);

        assert_eq!(release(&mut room, &mut b).unwrap(), s.id);
        assert!(!b.is_occupied());
        assert_eq!(room.occupants, 0);

        assert!(matches!(
            release(&mut room, &mut b),
            Err(ReleaseError::BedVacant(_)),
        ));
    }

    #[test]
    fn rejects_occupied_bed() {
        let mut room = room(2, Gender::Male);
        let mut b = bed(room.id, 1);
        let (first, second) = (student(Gender::Male), student(Gender::Male));

        assign(&mut room, &mut b, &first, None).unwrap();
        assert!(matches!(
            assign(&mut room, &mut b, &second, None),
            Err(AssignError::BedOccupied { .. }),
        ));
        assert_eq!(room.occupants, 1);
    }

    #[test]
    fn rejects_second_bed_for_student() {
        let mut room = room(2, Gender::Male);
        let mut first = bed(room.id, 1);
        let mut second = bed(room.id, 2);
        let s = student(Gender::Male);

        assign(&mut room, &mut first, &s, None).unwrap();
        assert!(matches!(
            assign(&mut room, &mut second, &s, Some(&first)),
            Err(AssignError::StudentHoldsBed { .. }),
        ));
    }

    #[test]
    fn rejects_gender_mismatch() {
        let mut room = room(2, Gender::Male);
        let mut b = bed(room.id, 1);
        assert!(matches!(
            assign(&mut room, &mut b, &student(Gender::Female), None),
            Err(AssignError::GenderMismatch { .. }),
        ));
    }

    #[test]
    fn rejects_full_room() {
        let mut room = room(1, Gender::Male);
        let mut first = bed(room.id, 1);
        let mut second = bed(room.id, 2);

        assign(&mut room, &mut first, &student(Gender::Male), None).unwrap();
        assert!(matches!(
            assign(&mut room, &mut second, &student(Gender::Male), None),
            Err(AssignError::RoomFull(_)),
        ));
    }

    proptest! {
        #[test]
        fn occupants_match_occupied_beds(
            ops in prop::collection::vec((any::<bool>(), 0..4_usize, 0..6_usize), 0..64),
        ) {
            let mut room = room(3, Gender::Male);
            let mut beds = (0..4).map(|n| bed(room.id, n)).collect::<Vec<_>>();
            let students =
                (0..6).map(|_| student(Gender::Male)).collect::<Vec<_>>();

            for (is_assign, b, s) in ops {
                if is_assign {
                    let held = beds
                        .iter()
                        .find(|bed| bed.student_id == Some(students[s].id))
                        .cloned();
                    _ = assign(&mut room, &mut beds[b], &students[s], held.as_ref());
                } else {
                    _ = release(&mut room, &mut beds[b]);
                }

                let occupied = beds.iter().filter(|b| b.is_occupied()).count();
                prop_assert_eq!(usize::from(room.occupants), occupied);
                prop_assert!(room.occupants <= room.capacity.get());
                for s in &students {
                    let held = beds
                        .iter()
                        .filter(|b| b.student_id == Some(s.id))
                        .count();
                    prop_assert!(held <= 1);
                }
            }
        }
    }
}
