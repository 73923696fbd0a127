use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

use super::{DataStore, StoreResult};
use crate::error::StoreError;
use crate::model::{
    format_date, AttendanceFilter, AttendanceMark, AttendanceStatus, Category, Exam, ExamResult,
    FeeFields, FeeStatus, InstallmentPlan, Payment, PaymentStatus, Student, StudentFilter,
    StudentProfile, DATE_FORMAT,
};
use chrono::NaiveDate;

const STUDENT_COLUMNS: &str = "id, name, category, course, email, phone, address, enrollment_date,
     total_fee, paid_fee, due_amount, fee_status, last_payment, installments, installment_amt, active";

const RESULT_COLUMNS: &str =
    "id, student_id, student_name, student_category, exam_name, date, marks, total_marks, percentage";

const PAYMENT_COLUMNS: &str =
    "id, student_id, amount, payment_date, payment_method, status, description, created_at";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        crate::db::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn corrupt(table: &'static str, message: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        table,
        message: message.into(),
    }
}

fn stored_date(table: &'static str, raw: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| corrupt(table, format!("bad date {:?}", raw)))
}

struct StudentRow {
    id: String,
    name: String,
    category: String,
    course: String,
    email: String,
    phone: String,
    address: Option<String>,
    enrollment_date: String,
    total_fee: f64,
    paid_fee: f64,
    due_amount: f64,
    fee_status: String,
    last_payment: Option<String>,
    installments: Option<i64>,
    installment_amt: Option<f64>,
    active: i64,
}

impl StudentRow {
    fn read(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(StudentRow {
            id: r.get(0)?,
            name: r.get(1)?,
            category: r.get(2)?,
            course: r.get(3)?,
            email: r.get(4)?,
            phone: r.get(5)?,
            address: r.get(6)?,
            enrollment_date: r.get(7)?,
            total_fee: r.get(8)?,
            paid_fee: r.get(9)?,
            due_amount: r.get(10)?,
            fee_status: r.get(11)?,
            last_payment: r.get(12)?,
            installments: r.get(13)?,
            installment_amt: r.get(14)?,
            active: r.get(15)?,
        })
    }

    fn into_student(self) -> StoreResult<Student> {
        let category =
            Category::parse(&self.category).map_err(|e| corrupt("students", e.to_string()))?;
        let fee_status =
            FeeStatus::parse(&self.fee_status).map_err(|e| corrupt("students", e.to_string()))?;
        let last_payment_date = match self.last_payment.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(stored_date("students", raw)?),
        };
        let plan = match (self.installments, self.installment_amt) {
            (Some(n), Some(amt)) if n > 0 => Some(InstallmentPlan {
                installments: n as u32,
                installment_amt: amt,
            }),
            _ => None,
        };
        Ok(Student {
            enrollment_date: stored_date("students", &self.enrollment_date)?,
            id: self.id,
            name: self.name,
            category,
            course: self.course,
            email: self.email,
            phone: self.phone,
            address: self.address,
            total_fee: self.total_fee,
            paid_fee: self.paid_fee,
            due_amount: self.due_amount,
            fee_status,
            last_payment_date,
            plan,
            active: self.active != 0,
        })
    }
}

struct ResultRow {
    id: String,
    student_id: String,
    student_name: String,
    category: String,
    exam_name: String,
    date: String,
    marks: f64,
    total_marks: f64,
    percentage: f64,
}

impl ResultRow {
    fn read(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ResultRow {
            id: r.get(0)?,
            student_id: r.get(1)?,
            student_name: r.get(2)?,
            category: r.get(3)?,
            exam_name: r.get(4)?,
            date: r.get(5)?,
            marks: r.get(6)?,
            total_marks: r.get(7)?,
            percentage: r.get(8)?,
        })
    }

    fn into_result(self) -> StoreResult<ExamResult> {
        Ok(ExamResult {
            category: Category::parse(&self.category)
                .map_err(|e| corrupt("exam_results", e.to_string()))?,
            date: stored_date("exam_results", &self.date)?,
            id: self.id,
            student_id: self.student_id,
            student_name: self.student_name,
            exam_name: self.exam_name,
            marks: self.marks,
            total_marks: self.total_marks,
            percentage: self.percentage,
        })
    }
}

fn payment_from_parts(
    (id, student_id, amount, date, method, status, description, created_at): (
        String,
        String,
        f64,
        String,
        String,
        String,
        Option<String>,
        String,
    ),
) -> StoreResult<Payment> {
    let status = PaymentStatus::parse(&status)
        .ok_or_else(|| corrupt("payments", format!("unknown status {:?}", status)))?;
    Ok(Payment {
        payment_date: stored_date("payments", &date)?,
        id,
        student_id,
        amount,
        payment_method: method,
        status,
        description,
        created_at,
    })
}

fn read_payment_parts(
    r: &Row<'_>,
) -> rusqlite::Result<(String, String, f64, String, String, String, Option<String>, String)> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
    ))
}

fn write_attendance(conn: &Connection, marks: &[AttendanceMark]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO attendance(student_id, date, status)
         VALUES(?, ?, ?)
         ON CONFLICT(student_id, date) DO UPDATE SET
           status = excluded.status",
    )?;
    for m in marks {
        stmt.execute((&m.student_id, format_date(m.date), m.status.label()))?;
    }
    Ok(())
}

impl DataStore for SqliteStore {
    fn students(&self, filter: &StudentFilter) -> StoreResult<Vec<Student>> {
        let mut sql = format!("SELECT {} FROM students WHERE 1 = 1", STUDENT_COLUMNS);
        let mut bind: Vec<Value> = Vec::new();
        if let Some(category) = filter.category {
            sql.push_str(" AND category = ?");
            bind.push(Value::Text(category.label().to_string()));
        }
        if let Some(status) = filter.fee_status {
            sql.push_str(" AND fee_status = ?");
            bind.push(Value::Text(status.as_str().to_string()));
        }
        if !filter.include_inactive {
            sql.push_str(" AND active = 1");
        }
        sql.push_str(" ORDER BY name, id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind), StudentRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let student = row.into_student()?;
            if filter.matches(&student) {
                out.push(student);
            }
        }
        Ok(out)
    }

    fn student(&self, id: &str) -> StoreResult<Option<Student>> {
        let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
        self.conn
            .query_row(&sql, [id], StudentRow::read)
            .optional()?
            .map(StudentRow::into_student)
            .transpose()
    }

    fn insert_student(&mut self, s: &Student) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO students(
               id, name, category, course, email, phone, address, enrollment_date,
               total_fee, paid_fee, due_amount, fee_status, last_payment,
               installments, installment_amt, active, updated_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            rusqlite::params![
                s.id,
                s.name,
                s.category.label(),
                s.course,
                s.email,
                s.phone,
                s.address,
                format_date(s.enrollment_date),
                s.total_fee,
                s.paid_fee,
                s.due_amount,
                s.fee_status.as_str(),
                s.last_payment_date.map(format_date),
                s.plan.map(|p| p.installments as i64),
                s.plan.map(|p| p.installment_amt),
                if s.active { 1 } else { 0 },
            ],
        )?;
        Ok(())
    }

    fn update_student_profile(&mut self, id: &str, p: &StudentProfile) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE students SET
               name = ?, category = ?, course = ?, email = ?, phone = ?, address = ?,
               total_fee = ?, installments = ?, installment_amt = ?,
               updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
             WHERE id = ?",
            rusqlite::params![
                p.name,
                p.category.label(),
                p.course,
                p.email,
                p.phone,
                p.address,
                p.total_fee,
                p.plan.map(|x| x.installments as i64),
                p.plan.map(|x| x.installment_amt),
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn update_student_fees(&mut self, id: &str, f: &FeeFields) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE students SET
               paid_fee = ?, due_amount = ?, fee_status = ?, last_payment = ?,
               updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
             WHERE id = ?",
            rusqlite::params![
                f.paid_fee,
                f.due_amount,
                f.fee_status.as_str(),
                f.last_payment_date.map(format_date),
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn set_student_active(&mut self, id: &str, active: bool) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE students SET active = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
             WHERE id = ?",
            (if active { 1 } else { 0 }, id),
        )?;
        Ok(changed > 0)
    }

    fn attendance(&self, filter: &AttendanceFilter) -> StoreResult<Vec<AttendanceMark>> {
        let mut sql = "SELECT student_id, date, status FROM attendance WHERE 1 = 1".to_string();
        let mut bind: Vec<Value> = Vec::new();
        if let Some(from) = filter.from {
            sql.push_str(" AND date >= ?");
            bind.push(Value::Text(format_date(from)));
        }
        if let Some(to) = filter.to {
            sql.push_str(" AND date <= ?");
            bind.push(Value::Text(format_date(to)));
        }
        sql.push_str(" ORDER BY date, student_id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind), |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = Vec::with_capacity(rows.len());
        for (student_id, date, status) in rows {
            let mark = AttendanceMark {
                student_id,
                date: stored_date("attendance", &date)?,
                status: AttendanceStatus::from_label(&status),
            };
            if filter.matches(&mark) {
                out.push(mark);
            }
        }
        Ok(out)
    }

    fn upsert_attendance(&mut self, marks: &[AttendanceMark]) -> StoreResult<usize> {
        if !self.conn.is_autocommit() {
            // Already inside `atomically`; the caller owns the transaction.
            write_attendance(&self.conn, marks)?;
            return Ok(marks.len());
        }
        let tx = self.conn.unchecked_transaction()?;
        write_attendance(&tx, marks)?;
        tx.commit()?;
        Ok(marks.len())
    }

    fn payments(&self) -> StoreResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments ORDER BY payment_date, created_at",
            PAYMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], read_payment_parts)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(payment_from_parts).collect()
    }

    fn payments_for(&self, student_id: &str) -> StoreResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE student_id = ? ORDER BY payment_date, created_at",
            PAYMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([student_id], read_payment_parts)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(payment_from_parts).collect()
    }

    fn insert_payment(&mut self, p: &Payment) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO payments(
               id, student_id, amount, payment_date, payment_method, status, description, created_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                p.id,
                p.student_id,
                p.amount,
                format_date(p.payment_date),
                p.payment_method,
                p.status.as_str(),
                p.description,
                p.created_at,
            ],
        )?;
        Ok(())
    }

    fn results(&self) -> StoreResult<Vec<ExamResult>> {
        let sql = format!(
            "SELECT {} FROM exam_results ORDER BY date, exam_name, id",
            RESULT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], ResultRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ResultRow::into_result).collect()
    }

    fn result(&self, id: &str) -> StoreResult<Option<ExamResult>> {
        let sql = format!("SELECT {} FROM exam_results WHERE id = ?", RESULT_COLUMNS);
        self.conn
            .query_row(&sql, [id], ResultRow::read)
            .optional()?
            .map(ResultRow::into_result)
            .transpose()
    }

    fn insert_result(&mut self, r: &ExamResult) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO exam_results(
               id, student_id, student_name, student_category, exam_name, date,
               marks, total_marks, percentage
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                r.id,
                r.student_id,
                r.student_name,
                r.category.label(),
                r.exam_name,
                format_date(r.date),
                r.marks,
                r.total_marks,
                r.percentage,
            ],
        )?;
        Ok(())
    }

    fn update_result(&mut self, r: &ExamResult) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE exam_results SET
               student_id = ?, student_name = ?, student_category = ?, exam_name = ?, date = ?,
               marks = ?, total_marks = ?, percentage = ?
             WHERE id = ?",
            rusqlite::params![
                r.student_id,
                r.student_name,
                r.category.label(),
                r.exam_name,
                format_date(r.date),
                r.marks,
                r.total_marks,
                r.percentage,
                r.id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn exams(&self) -> StoreResult<Vec<Exam>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, date, categories FROM exams ORDER BY date, name")?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = Vec::with_capacity(rows.len());
        for (id, name, date, categories) in rows {
            let categories: Vec<String> = serde_json::from_str(&categories)
                .map_err(|e| corrupt("exams", e.to_string()))?;
            out.push(Exam {
                id,
                name,
                date: stored_date("exams", &date)?,
                categories,
            });
        }
        Ok(out)
    }

    fn insert_exam(&mut self, exam: &Exam) -> StoreResult<()> {
        let categories =
            serde_json::to_string(&exam.categories).map_err(|e| StoreError::Write(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO exams(id, name, date, categories) VALUES(?, ?, ?, ?)",
            (&exam.id, &exam.name, format_date(exam.date), categories),
        )?;
        Ok(())
    }

    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StoreError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(StoreError::from(e)))?;
        match f(self) {
            Ok(v) => {
                if let Err(e) = self.conn.execute_batch("COMMIT") {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    return Err(E::from(StoreError::from(e)));
                }
                Ok(v)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }
}
