use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::error::{CoreResult, ValidationError};
use crate::model::{parse_date, Exam};
use crate::store::DataStore;

#[derive(Debug, Clone, Default)]
pub struct ExamInput {
    pub name: String,
    pub date: Option<String>,
    /// Comma separated, as typed into the schedule form.
    pub categories: String,
}

pub fn split_categories(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn schedule<S: DataStore>(store: &mut S, input: &ExamInput) -> CoreResult<Exam> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ValidationError::MissingField("name").into());
    }
    let date = parse_date(input.date.as_deref().unwrap_or(""))?;
    let exam = Exam {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        date,
        categories: split_categories(&input.categories),
    };
    store.insert_exam(&exam)?;
    info!(exam_id = %exam.id, date = %exam.date, "exam scheduled");
    Ok(exam)
}

/// Exams ordered by date, optionally only those on or after `from`.
pub fn list<S: DataStore>(store: &S, from: Option<NaiveDate>) -> CoreResult<Vec<Exam>> {
    let mut exams = store.exams()?;
    if let Some(from) = from {
        exams.retain(|e| e.date >= from);
    }
    exams.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
    Ok(exams)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::store::MemoryStore;

    #[test]
    fn schedule_requires_name_and_date() {
        let mut store = MemoryStore::new();
        let no_name = ExamInput {
            name: " ".to_string(),
            date: Some("2024-09-01".to_string()),
            categories: String::new(),
        };
        assert!(matches!(
            schedule(&mut store, &no_name),
            Err(CoreError::Validation(ValidationError::MissingField("name")))
        ));
        let no_date = ExamInput {
            name: "Unit Test 1".to_string(),
            date: None,
            categories: String::new(),
        };
        assert!(matches!(
            schedule(&mut store, &no_date),
            Err(CoreError::Validation(ValidationError::MissingDate))
        ));
    }

    #[test]
    fn list_orders_by_date_and_filters_upcoming() {
        let mut store = MemoryStore::new();
        for (name, date) in [("Finals", "2024-12-01"), ("Midterm", "2024-09-15"), ("Quiz", "2024-08-01")] {
            schedule(
                &mut store,
                &ExamInput {
                    name: name.to_string(),
                    date: Some(date.to_string()),
                    categories: "School, ,Degree".to_string(),
                },
            )
            .expect("schedule");
        }
        let all = list(&store, None).expect("list");
        let names: Vec<&str> = all.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Quiz", "Midterm", "Finals"]);
        assert_eq!(all[0].categories, vec!["School".to_string(), "Degree".to_string()]);

        let upcoming = list(&store, NaiveDate::from_ymd_opt(2024, 9, 1)).expect("list");
        assert_eq!(upcoming.len(), 2);
    }
}
