pub mod access;
pub mod error;
pub mod feed;
pub mod identity;
pub mod ledger;
pub mod promo;
pub mod session;
pub mod withdrawal;
