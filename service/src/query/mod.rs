//! [`Query`] definition.

pub mod contract_term;
pub mod payment;
pub mod registration;
pub mod room;
pub mod room_fee;
pub mod student;
pub mod tariff;
pub mod transfer;

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    infra::{database, Database},
    Service,
};

pub use self::{contract_term::ContractTerm, room_fee::RoomFee};

/// [`Query`] of the [`Service`].
pub use common::Handler as Query;

/// [`Query`] [`Select`]ing a `T`ype from a [`Database`].
#[derive(Clone, Copy, Debug)]
#[expect(clippy::module_name_repetitions, reason = "more readable")]
pub struct DatabaseQuery<T>(T);

impl<W, B> DatabaseQuery<By<W, B>> {
    /// Creates a new [`DatabaseQuery`] selecting a `W` by the provided `B`.
    #[must_use]
    pub fn by(by: B) -> Self {
        Self(By::new(by))
    }
}

impl<Db, Ntf, W, B> Query<DatabaseQuery<By<W, B>>> for Service<Db, Ntf>
where
    Db: Database<Select<By<W, B>>, Ok = W, Err = Traced<database::Error>>,
{
    type Ok = W;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        DatabaseQuery(by): DatabaseQuery<By<W, B>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.database()
            .execute(Select(by))
            .await
            .map_err(tracerr::wrap!())
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        command::spec,
        domain::student,
        infra::Memory,
        Query as _, Service,
    };

    use super::room;

    #[tokio::test]
    async fn selects_from_database() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (created, beds) = spec::room(&db, 3, student::Gender::Female).await;

        let found = svc.execute(room::ById::by(created.id)).await.unwrap();
        let listed = svc.execute(room::Beds::by(created.id)).await.unwrap();

        assert_eq!(found.map(|r| r.number), Some(created.number));
        assert_eq!(listed.len(), beds.len());
    }
}
