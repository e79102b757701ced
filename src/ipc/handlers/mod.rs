pub mod assignments;
pub mod attendance;
pub mod core;
pub mod reports;
pub mod students;
pub mod users;
