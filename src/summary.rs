use std::collections::BTreeMap;

use crate::model::Course;

pub struct Stats {
    pub courses: usize,
    pub meetings: usize,
    pub without_meetings: usize,
    pub by_type: BTreeMap<String, usize>,
    /// Meet or Dur cells that did not hold an integer.
    pub raw_meet: usize,
    pub raw_duration: usize,
}

pub fn stats(courses: &[Course]) -> Stats {
    let mut by_type = BTreeMap::new();
    let mut raw_meet = 0;
    let mut raw_duration = 0;

    for m in courses.iter().flat_map(|c| &c.meetings) {
        *by_type.entry(m.kind.clone()).or_insert(0) += 1;
        if !m.meet.is_int() {
            raw_meet += 1;
        }
        if !m.duration.is_int() {
            raw_duration += 1;
        }
    }

    Stats {
        courses: courses.len(),
        meetings: courses.iter().map(|c| c.meetings.len()).sum(),
        without_meetings: courses.iter().filter(|c| c.meetings.is_empty()).count(),
        by_type,
        raw_meet,
        raw_duration,
    }
}

/// Courses matching the optional department and term, case-insensitively.
pub fn filter<'a>(
    courses: &'a [Course],
    dept: Option<&str>,
    term: Option<&str>,
    limit: usize,
) -> Vec<&'a Course> {
    courses
        .iter()
        .filter(|c| dept.map_or(true, |d| c.department.eq_ignore_ascii_case(d)))
        .filter(|c| term.map_or(true, |t| c.term.eq_ignore_ascii_case(t)))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_document, DialectChoice};

    fn courses() -> Vec<Course> {
        let html = std::fs::read_to_string("tests/fixtures/structural.html").unwrap();
        parse_document(&html, DialectChoice::Structural).courses
    }

    #[test]
    fn structural_stats() {
        let s = stats(&courses());
        assert_eq!(s.courses, 3);
        assert_eq!(s.meetings, 6);
        assert_eq!(s.without_meetings, 1);
        assert_eq!(s.by_type.get("LECT"), Some(&3));
        assert_eq!(s.by_type.get("LAB"), Some(&2));
        assert_eq!(s.by_type.get("TUTR"), Some(&1));
        assert_eq!(s.raw_meet, 1);
        assert_eq!(s.raw_duration, 1);
    }

    #[test]
    fn filter_by_term_and_dept() {
        let all = courses();
        let winter = filter(&all, None, Some("w"), 50);
        assert_eq!(winter.len(), 2);
        let eecs_winter = filter(&all, Some("eecs"), Some("W"), 50);
        assert_eq!(eecs_winter.len(), 1);
        assert_eq!(eecs_winter[0].name, "Software Design");
        assert_eq!(filter(&all, None, None, 1).len(), 1);
    }
}
