use thiserror::Error;

/// Bad user input. Surfaced inline to the caller, never logged as a fault.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("amount must be a positive number")]
    InvalidAmount,

    #[error("date is required")]
    MissingDate,

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("marks must be zero or more")]
    InvalidMarks,

    #[error("total marks must be greater than zero")]
    InvalidTotalMarks,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("installments must be between 1 and 24, got {0}")]
    InvalidInstallments(i64),

    #[error("fee amounts must be zero or more")]
    InvalidFee,

    #[error("unknown category {0:?}")]
    UnknownCategory(String),

    #[error("course {course:?} is not offered under {category}")]
    UnknownCourse { category: String, course: String },

    #[error("unknown fee status {0:?}")]
    UnknownStatus(String),

    #[error("unknown attendance status {0:?}, expected Present, Absent or Late")]
    InvalidAttendanceStatus(String),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidAmount => "invalid_amount",
            ValidationError::MissingDate => "missing_date",
            ValidationError::InvalidDate(_) => "invalid_date",
            ValidationError::InvalidMarks => "invalid_marks",
            ValidationError::InvalidTotalMarks => "invalid_total_marks",
            ValidationError::InvalidInstallments(_) => "invalid_installments",
            ValidationError::InvalidFee => "invalid_fee",
            ValidationError::MissingField(_)
            | ValidationError::UnknownCategory(_)
            | ValidationError::UnknownCourse { .. }
            | ValidationError::UnknownStatus(_)
            | ValidationError::InvalidAttendanceStatus(_) => "bad_params",
        }
    }
}

/// The backing store call itself failed.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },

    #[error("store write failed: {0}")]
    Write(String),
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoreError {
    pub fn unknown_student(id: &str) -> Self {
        CoreError::NotFound {
            entity: "student",
            id: id.to_string(),
        }
    }

    pub fn unknown_result(id: &str) -> Self {
        CoreError::NotFound {
            entity: "result",
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(v) => v.code(),
            CoreError::NotFound { .. } => "not_found",
            CoreError::Store(StoreError::Write(_)) => "db_update_failed",
            CoreError::Store(_) => "db_query_failed",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
