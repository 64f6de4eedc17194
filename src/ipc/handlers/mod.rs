pub mod core;
pub mod marks;
pub mod reports;
pub mod results;
pub mod setup;
pub mod students;
