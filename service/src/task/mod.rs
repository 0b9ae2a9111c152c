//! Background [`Task`]s definitions.

mod background;
pub mod expire_payment_links;
pub mod mark_overdue_payments;
pub mod process_expiring_contracts;

pub use common::Handler as Task;

pub use self::{
    background::Background, expire_payment_links::ExpirePaymentLinks,
    mark_overdue_payments::MarkOverduePayments,
    process_expiring_contracts::ProcessExpiringContracts,
};
