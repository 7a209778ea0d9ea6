pub mod auth;
pub mod referrals;
pub mod users;
pub mod withdrawals;
