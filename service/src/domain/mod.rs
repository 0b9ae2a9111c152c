//! Domain definitions.

pub mod meter;
pub mod occupancy;
pub mod payment;
pub mod registration;
pub mod room;
pub mod staff;
pub mod stay;
pub mod student;
pub mod tariff;
pub mod term;
pub mod transfer;
pub mod utility;

pub use self::{
    payment::Payment,
    registration::Registration,
    room::{Bed, Room},
    stay::Stay,
    student::Student,
    tariff::Tariff,
    transfer::Transfer,
};
