pub mod balance;
pub mod token;
pub mod transactions;
