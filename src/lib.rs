pub mod attendance;
pub mod backup;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod exams;
pub mod fees;
pub mod ipc;
pub mod logging;
pub mod model;
pub mod performance;
pub mod store;
pub mod students;
