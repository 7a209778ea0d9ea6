pub mod referralmodel;
pub mod usermodel;
pub mod withdrawalmodels;
