//! Command implementations

pub(crate) mod common;
pub mod donors;
pub mod identities;
pub mod merge_account;
pub mod pledges;
pub mod stage;
