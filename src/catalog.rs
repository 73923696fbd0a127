//! Courses offered under each enrollment category.

use crate::model::Category;

const SCHOOL: &[&str] = &[
    "SSC 8th", "SSC 9th", "SSC 10th", "CBSE 8th", "CBSE 9th", "CBSE 10th", "ICSE 8th",
    "ICSE 9th", "ICSE 10th", "Others",
];
const JUNIOR_COLLEGE: &[&str] = &["Science", "Commerce", "Arts"];
const DIPLOMA_BRANCHES: &[&str] = &["Computer Science", "Mechanical", "Electrical", "Civil"];
const DIPLOMA_YEARS: &[&str] = &["1st Year", "2nd Year", "3rd Year"];
const DEGREE_BRANCHES: &[&str] = &["B.Tech Computer Science", "B.Tech Mechanical", "B.Com", "B.A"];
const DEGREE_YEARS: &[&str] = &["1st Year", "2nd Year", "3rd Year", "4th Year"];
const ENTRANCE: &[&str] = &["NEET", "JEE", "MHTCET", "Boards"];

fn branch_years(branches: &[&str], years: &[&str]) -> Vec<String> {
    branches
        .iter()
        .flat_map(|b| years.iter().map(move |y| format!("{} - {}", b, y)))
        .collect()
}

pub fn courses(category: Category) -> Vec<String> {
    match category {
        Category::School => SCHOOL.iter().map(|s| s.to_string()).collect(),
        Category::JuniorCollege => JUNIOR_COLLEGE.iter().map(|s| s.to_string()).collect(),
        Category::Diploma => branch_years(DIPLOMA_BRANCHES, DIPLOMA_YEARS),
        Category::Degree => branch_years(DEGREE_BRANCHES, DEGREE_YEARS),
        Category::EntranceExam => ENTRANCE.iter().map(|s| s.to_string()).collect(),
    }
}

/// Canonical spelling of `course` under `category`, matched case-insensitively.
pub fn canonical_course(category: Category, course: &str) -> Option<String> {
    let wanted = course.trim();
    courses(category)
        .into_iter()
        .find(|c| c.eq_ignore_ascii_case(wanted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_year_courses_are_expanded() {
        let diploma = courses(Category::Diploma);
        assert_eq!(diploma.len(), 12);
        assert_eq!(diploma[0], "Computer Science - 1st Year");
        assert_eq!(courses(Category::Degree).len(), 16);
    }

    #[test]
    fn canonical_course_matches_case_insensitively() {
        assert_eq!(
            canonical_course(Category::School, "cbse 10TH"),
            Some("CBSE 10th".to_string())
        );
        assert_eq!(canonical_course(Category::School, "NEET"), None);
    }
}
