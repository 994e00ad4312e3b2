pub mod agent;
pub mod intent;
pub mod keys;
pub mod reputation;
pub mod tools;
