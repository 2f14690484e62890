pub mod balance;
pub mod benchmark;
pub mod simulate;
