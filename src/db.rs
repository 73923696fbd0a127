use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub const DB_FILE: &str = "campus.sqlite3";

pub fn db_path(workspace: &Path) -> PathBuf {
    workspace.join(DB_FILE)
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(db_path(workspace))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            course TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL,
            address TEXT,
            enrollment_date TEXT NOT NULL,
            total_fee REAL NOT NULL DEFAULT 0,
            paid_fee REAL NOT NULL DEFAULT 0,
            due_amount REAL NOT NULL DEFAULT 0,
            fee_status TEXT NOT NULL DEFAULT 'Unpaid',
            last_payment TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    // Older workspaces predate installment plans and soft deactivation.
    ensure_students_installments(conn)?;
    ensure_students_active(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_category ON students(category)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            student_id TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY(student_id, date),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS payments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            amount REAL NOT NULL,
            payment_date TEXT NOT NULL,
            payment_method TEXT NOT NULL,
            status TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_student ON payments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exam_results(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            student_name TEXT NOT NULL,
            student_category TEXT NOT NULL,
            exam_name TEXT NOT NULL,
            date TEXT NOT NULL,
            marks REAL NOT NULL,
            total_marks REAL NOT NULL,
            percentage REAL NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exam_results_student ON exam_results(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            categories TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

fn ensure_students_installments(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "students", "installments")? {
        conn.execute("ALTER TABLE students ADD COLUMN installments INTEGER", [])?;
    }
    if !table_has_column(conn, "students", "installment_amt")? {
        conn.execute("ALTER TABLE students ADD COLUMN installment_amt REAL", [])?;
    }
    Ok(())
}

fn ensure_students_active(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "active")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE students ADD COLUMN active INTEGER NOT NULL DEFAULT 1",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
