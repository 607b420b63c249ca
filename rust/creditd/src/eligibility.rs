use crate::model::{Semester, YearOfStudy};

/// Semesters a student in `year` may view and edit, in order.
pub fn accessible_semesters(year: YearOfStudy) -> Vec<Semester> {
    let last = match year {
        YearOfStudy::First => 2,
        YearOfStudy::Second => 4,
        YearOfStudy::Third => 6,
        YearOfStudy::Fourth => 8,
    };
    Semester::up_to(last)
}

/// Resolves a stored year-of-study value. Anything unrecognised denies all.
pub fn accessible_semesters_for(raw_year: &str) -> Vec<Semester> {
    YearOfStudy::parse(raw_year)
        .map(accessible_semesters)
        .unwrap_or_default()
}

pub fn is_accessible(raw_year: &str, semester: Semester) -> bool {
    accessible_semesters_for(raw_year).contains(&semester)
}
