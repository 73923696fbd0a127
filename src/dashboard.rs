use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::attendance::{self, AttendanceSummary};
use crate::error::CoreResult;
use crate::exams;
use crate::fees;
use crate::model::{AttendanceFilter, Category, Exam, StudentFilter};
use crate::performance::{self, StudentPerformance};
use crate::store::DataStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTotals {
    pub total_fees: f64,
    pub total_collected: f64,
    pub total_pending: f64,
    pub collected_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub student_count: usize,
    pub attendance_by_category: BTreeMap<Category, AttendanceSummary>,
    pub fees: FeeTotals,
    pub overall_average: f64,
    pub top_performer: Option<StudentPerformance>,
    pub upcoming_exams: Vec<Exam>,
}

/// Read-only snapshot over active students, built fresh from the store.
pub fn overview<S: DataStore>(store: &S, today: NaiveDate) -> CoreResult<Overview> {
    let roster = store.students(&StudentFilter::active_only())?;
    let marks = store.attendance(&AttendanceFilter::default())?;
    let results = store.results()?;
    let fee = fees::overview(&roster, None);
    let report = performance::summarize(&roster, &results);

    Ok(Overview {
        student_count: roster.len(),
        attendance_by_category: attendance::summarize_by_category(&marks, &roster),
        fees: FeeTotals {
            total_fees: fee.total_fees,
            total_collected: fee.total_collected,
            total_pending: fee.total_pending,
            collected_percent: fee.collected_percent,
        },
        overall_average: report.overall_average,
        top_performer: report.top_performer,
        upcoming_exams: exams::list(store, Some(today))?,
    })
}
