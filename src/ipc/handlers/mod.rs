pub mod attendance;
pub mod core;
pub mod dashboard;
pub mod exams;
pub mod fees;
pub mod performance;
pub mod students;
