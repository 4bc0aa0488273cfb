pub mod catalog;
pub mod core;
pub mod records;
pub mod results;
pub mod students;
pub mod uploads;
