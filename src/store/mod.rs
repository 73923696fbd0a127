//! Data access contract consumed by the aggregation and reconciliation core.

mod memory;
mod sqlite;

pub use memory::{FailPoint, MemoryStore};
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::model::{
    AttendanceFilter, AttendanceMark, Exam, ExamResult, FeeFields, Payment, Student,
    StudentFilter, StudentProfile,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed-table store. Reads always hit the backing store; implementations
/// must not serve rows from a cache that outlives a single call.
pub trait DataStore {
    fn students(&self, filter: &StudentFilter) -> StoreResult<Vec<Student>>;
    fn student(&self, id: &str) -> StoreResult<Option<Student>>;
    fn insert_student(&mut self, student: &Student) -> StoreResult<()>;
    /// Returns false when no row matched `id`.
    fn update_student_profile(&mut self, id: &str, profile: &StudentProfile) -> StoreResult<bool>;
    fn update_student_fees(&mut self, id: &str, fields: &FeeFields) -> StoreResult<bool>;
    fn set_student_active(&mut self, id: &str, active: bool) -> StoreResult<bool>;

    fn attendance(&self, filter: &AttendanceFilter) -> StoreResult<Vec<AttendanceMark>>;
    /// Insert-or-replace keyed on `(student_id, date)`.
    fn upsert_attendance(&mut self, marks: &[AttendanceMark]) -> StoreResult<usize>;

    fn payments(&self) -> StoreResult<Vec<Payment>>;
    fn payments_for(&self, student_id: &str) -> StoreResult<Vec<Payment>>;
    fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()>;

    fn results(&self) -> StoreResult<Vec<ExamResult>>;
    fn result(&self, id: &str) -> StoreResult<Option<ExamResult>>;
    fn insert_result(&mut self, result: &ExamResult) -> StoreResult<()>;
    fn update_result(&mut self, result: &ExamResult) -> StoreResult<bool>;

    fn exams(&self) -> StoreResult<Vec<Exam>>;
    fn insert_exam(&mut self, exam: &Exam) -> StoreResult<()>;

    /// Runs `f` as one unit of work: either every write inside it lands or
    /// none does.
    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StoreError>,
        F: FnOnce(&mut Self) -> Result<T, E>;
}
