pub mod client;
pub mod company;
pub mod job;
pub mod quote;
