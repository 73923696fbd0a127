use super::{DataStore, StoreResult};
use crate::error::StoreError;
use crate::model::{
    AttendanceFilter, AttendanceMark, Exam, ExamResult, FeeFields, Payment, Student,
    StudentFilter, StudentProfile,
};

/// Write paths that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertPayment,
    UpdateStudentFees,
    UpsertAttendance,
    InsertResult,
    UpdateResult,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    students: Vec<Student>,
    attendance: Vec<AttendanceMark>,
    payments: Vec<Payment>,
    results: Vec<ExamResult>,
    exams: Vec<Exam>,
}

/// In-process store. `atomically` snapshots every table and restores the
/// snapshot when the unit of work fails.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
    fail_on: Option<FailPoint>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&mut self, point: Option<FailPoint>) {
        self.fail_on = point;
    }

    fn check(&self, point: FailPoint) -> StoreResult<()> {
        if self.fail_on == Some(point) {
            return Err(StoreError::Write(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }
}

impl DataStore for MemoryStore {
    fn students(&self, filter: &StudentFilter) -> StoreResult<Vec<Student>> {
        Ok(self
            .tables
            .students
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    fn student(&self, id: &str) -> StoreResult<Option<Student>> {
        Ok(self.tables.students.iter().find(|s| s.id == id).cloned())
    }

    fn insert_student(&mut self, student: &Student) -> StoreResult<()> {
        if self.tables.students.iter().any(|s| s.id == student.id) {
            return Err(StoreError::Write(format!("duplicate student id {}", student.id)));
        }
        self.tables.students.push(student.clone());
        Ok(())
    }

    fn update_student_profile(&mut self, id: &str, profile: &StudentProfile) -> StoreResult<bool> {
        let Some(s) = self.tables.students.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };
        s.name = profile.name.clone();
        s.category = profile.category;
        s.course = profile.course.clone();
        s.email = profile.email.clone();
        s.phone = profile.phone.clone();
        s.address = profile.address.clone();
        s.total_fee = profile.total_fee;
        s.plan = profile.plan;
        Ok(true)
    }

    fn update_student_fees(&mut self, id: &str, fields: &FeeFields) -> StoreResult<bool> {
        self.check(FailPoint::UpdateStudentFees)?;
        let Some(s) = self.tables.students.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };
        s.paid_fee = fields.paid_fee;
        s.due_amount = fields.due_amount;
        s.fee_status = fields.fee_status;
        s.last_payment_date = fields.last_payment_date;
        Ok(true)
    }

    fn set_student_active(&mut self, id: &str, active: bool) -> StoreResult<bool> {
        let Some(s) = self.tables.students.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };
        s.active = active;
        Ok(true)
    }

    fn attendance(&self, filter: &AttendanceFilter) -> StoreResult<Vec<AttendanceMark>> {
        Ok(self
            .tables
            .attendance
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }

    fn upsert_attendance(&mut self, marks: &[AttendanceMark]) -> StoreResult<usize> {
        self.check(FailPoint::UpsertAttendance)?;
        for mark in marks {
            match self
                .tables
                .attendance
                .iter_mut()
                .find(|m| m.student_id == mark.student_id && m.date == mark.date)
            {
                Some(existing) => existing.status = mark.status.clone(),
                None => self.tables.attendance.push(mark.clone()),
            }
        }
        Ok(marks.len())
    }

    fn payments(&self) -> StoreResult<Vec<Payment>> {
        Ok(self.tables.payments.clone())
    }

    fn payments_for(&self, student_id: &str) -> StoreResult<Vec<Payment>> {
        Ok(self
            .tables
            .payments
            .iter()
            .filter(|p| p.student_id == student_id)
            .cloned()
            .collect())
    }

    fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        self.check(FailPoint::InsertPayment)?;
        self.tables.payments.push(payment.clone());
        Ok(())
    }

    fn results(&self) -> StoreResult<Vec<ExamResult>> {
        Ok(self.tables.results.clone())
    }

    fn result(&self, id: &str) -> StoreResult<Option<ExamResult>> {
        Ok(self.tables.results.iter().find(|r| r.id == id).cloned())
    }

    fn insert_result(&mut self, result: &ExamResult) -> StoreResult<()> {
        self.check(FailPoint::InsertResult)?;
        self.tables.results.push(result.clone());
        Ok(())
    }

    fn update_result(&mut self, result: &ExamResult) -> StoreResult<bool> {
        self.check(FailPoint::UpdateResult)?;
        let Some(existing) = self.tables.results.iter_mut().find(|r| r.id == result.id) else {
            return Ok(false);
        };
        *existing = result.clone();
        Ok(true)
    }

    fn exams(&self) -> StoreResult<Vec<Exam>> {
        let mut exams = self.tables.exams.clone();
        exams.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(exams)
    }

    fn insert_exam(&mut self, exam: &Exam) -> StoreResult<()> {
        self.tables.exams.push(exam.clone());
        Ok(())
    }

    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StoreError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        let snapshot = self.tables.clone();
        let out = f(self);
        if out.is_err() {
            self.tables = snapshot;
        }
        out
    }
}
