pub mod core;
pub mod exchange;
pub mod import;
pub mod reports;
pub mod scores;
