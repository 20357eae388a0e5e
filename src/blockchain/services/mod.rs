pub mod abi;
pub mod amounts;
pub mod balance;
pub mod metadata;
pub mod quote;
pub mod transactions;
