//! [`Command`] for rejecting a [`Transfer`].

use common::{
    operations::{
        By, Commit, Lock, Notify, Select, Transact, Transacted, Update,
    },
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{staff, transfer, Transfer},
    infra::{
        database,
        notifier::{self, Notification},
        Database, Notifier,
    },
    Service,
};

use super::Command;

/// [`Command`] for rejecting a pending [`Transfer`].
#[derive(Clone, Debug)]
pub struct RejectTransfer {
    /// ID of the [`Transfer`] to be rejected.
    pub transfer_id: transfer::Id,

    /// Reason of the rejection.
    pub reason: transfer::RejectionReason,

    /// ID of the staff member rejecting the [`Transfer`].
    pub approver_id: staff::Id,
}

impl<Db, Ntf> Command<RejectTransfer> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Transfer, transfer::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Transfer>, transfer::Id>>,
            Ok = Option<Transfer>,
            Err = Traced<database::Error>,
        > + Database<Update<Transfer>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Ntf: Notifier<
        Notify<Notification>,
        Ok = (),
        Err = Traced<notifier::Error>,
    >,
{
    type Ok = Transfer;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RejectTransfer,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RejectTransfer {
            transfer_id,
            reason,
            approver_id,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Transfer, _>::new(transfer_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut transfer = tx
            .execute(Select(By::<Option<Transfer>, _>::new(transfer_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::TransferNotExists(transfer_id))
            .map_err(tracerr::wrap!())?;
        if transfer.status != transfer::Status::Pending {
            return Err(tracerr::new!(E::TransferNotPending(transfer_id)));
        }

        transfer.status = transfer::Status::Rejected;
        transfer.rejection_reason = Some(reason);
        transfer.reviewed_by = Some(approver_id);
        transfer.reviewed_at = Some(DateTime::now().coerce());

        tx.execute(Update(transfer.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.notify(Notification::TransferRejected {
            transfer_id,
            student_id: transfer.student_id,
        })
        .await;

        Ok(transfer)
    }
}

/// Error of [`RejectTransfer`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Transfer`] does not exist.
    #[display("`Transfer(id: {_0})` does not exist")]
    TransferNotExists(#[error(not(source))] transfer::Id),

    /// [`Transfer`] is reviewed already.
    #[display("`Transfer(id: {_0})` is not pending")]
    TransferNotPending(#[error(not(source))] transfer::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{request_transfer, spec, Command as _, RequestTransfer},
        domain::{student, transfer},
        infra::Memory,
        Service,
    };

    use super::{ExecutionError, RejectTransfer};

    #[tokio::test]
    async fn rejects_once_and_allows_new_request() {
        let db = Memory::new();
        let svc = Service::spec(db.clone());
        let (_, beds) = spec::room(&db, 2, student::Gender::Male).await;
        let (to, _) = spec::room(&db, 2, student::Gender::Male).await;
        let (student, _) = spec::resident(&svc, "a@uni.edu.vn", &beds[0]).await;
        let request: RequestTransfer =
            request_transfer::spec::request(student.id, to.id);
        let transfer = svc.execute(request.clone()).await.unwrap();
        let reject = || RejectTransfer {
            transfer_id: transfer.id,
            reason: transfer::RejectionReason::new("No reason").unwrap(),
            approver_id: spec::staff(),
        };

        let rejected = svc.execute(reject()).await.unwrap();
        assert_eq!(rejected.status, transfer::Status::Rejected);
        let err = svc.execute(reject()).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::TransferNotPending(_)));

        assert!(svc.execute(request).await.is_ok());
    }
}
