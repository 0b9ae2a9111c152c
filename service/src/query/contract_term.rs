//! [`ContractTerm`] definition.

use std::convert::Infallible;

use common::Date;

use crate::{domain::term::Term, Query, Service};

/// [`Query`] previewing the contract [`Term`] for a move-in date.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContractTerm {
    /// Requested move-in date.
    pub move_in: Date,
}

impl<Db, Ntf> Query<ContractTerm> for Service<Db, Ntf> {
    type Ok = Term;
    type Err = Infallible;

    async fn execute(
        &self,
        ContractTerm { move_in }: ContractTerm,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(Term::starting(move_in))
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::term::{AcademicYear, Semester},
        infra::Memory,
        Query as _, Service,
    };

    use super::ContractTerm;

    #[tokio::test]
    async fn describes_term() {
        let svc = Service::spec(Memory::new());

        let term = svc
            .execute(ContractTerm {
                move_in: "2024-09-15".parse().unwrap(),
            })
            .await
            .unwrap();

        assert_eq!(term.end_date, "2024-12-31".parse().unwrap());
        assert_eq!(term.quarter.number(), 3);
        assert_eq!(term.semester, Semester::First);
        assert_eq!(term.academic_year, AcademicYear { start: 2024 });
    }
}
