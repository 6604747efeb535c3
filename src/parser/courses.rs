use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::classify::{AnomalyKind, Dialect, RowKind, SectionKind};
use super::rows::Row;
use crate::model::{Course, Meeting, Numeric};

static FOUR_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

/// Day, Time, Dur, Campus, Room.
const SLOT_CELLS: usize = 5;

/// A row the fold could not use, with the row index it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    pub row: usize,
    pub kind: AnomalyKind,
}

/// What happened to the rows of one (or several merged) documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub rows: usize,
    pub blank: usize,
    pub headers: usize,
    pub lectures: usize,
    pub labs: usize,
    pub meetings: usize,
    /// Section rows seen before any course header.
    pub orphaned: usize,
    /// Unclassified rows inside another row's cell, i.e. meeting sub-table rows.
    pub sub_rows: usize,
    pub anomalies: Vec<Anomaly>,
}

impl ParseReport {
    pub fn merge(&mut self, other: ParseReport) {
        self.rows += other.rows;
        self.blank += other.blank;
        self.headers += other.headers;
        self.lectures += other.lectures;
        self.labs += other.labs;
        self.meetings += other.meetings;
        self.orphaned += other.orphaned;
        self.sub_rows += other.sub_rows;
        self.anomalies.extend(other.anomalies);
    }

    /// Row indices of the anomalies, grouped by reason.
    pub fn breakdown(&self) -> BTreeMap<String, Vec<usize>> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for a in &self.anomalies {
            groups.entry(a.kind.to_string()).or_default().push(a.row);
        }
        groups
    }

    #[cfg(test)]
    pub fn count(&self, pred: impl Fn(&AnomalyKind) -> bool) -> usize {
        self.anomalies.iter().filter(|a| pred(&a.kind)).count()
    }
}

/// Folds classified rows into courses. Meetings always attach to `current`,
/// the course opened by the most recent header row.
pub struct CourseFold {
    dialect: Dialect,
    courses: Vec<Course>,
    current: Option<Course>,
    report: ParseReport,
}

impl CourseFold {
    pub fn new(dialect: Dialect) -> Self {
        CourseFold {
            dialect,
            courses: Vec::new(),
            current: None,
            report: ParseReport::default(),
        }
    }

    pub fn push(&mut self, row: &Row) {
        self.report.rows += 1;
        match self.dialect.classify(row) {
            RowKind::Blank => self.report.blank += 1,
            RowKind::Header => self.open_course(row),
            RowKind::Section(section) => self.add_section(row, section),
            RowKind::Unrecognized(kind) => self.skip(row, kind),
        }
    }

    pub fn finish(mut self) -> (Vec<Course>, ParseReport) {
        if let Some(course) = self.current.take() {
            self.courses.push(course);
        }
        (self.courses, self.report)
    }

    fn open_course(&mut self, row: &Row) {
        let course = Course::new(
            row.text(0).to_string(),
            row.text(1).to_string(),
            row.text(2).to_string(),
            row.text(3).to_string(),
            self.dialect.tracks_course_id(),
        );
        debug!(
            "Row {}: course {} {} {}",
            row.index, course.department, course.term, course.name
        );
        self.report.headers += 1;
        if let Some(done) = self.current.replace(course) {
            self.courses.push(done);
        }
    }

    fn add_section(&mut self, row: &Row, section: SectionKind) {
        let layout = self.dialect.layout(section);
        let Some(course) = self.current.as_mut() else {
            self.report.orphaned += 1;
            return;
        };

        let full_id = layout.course_id_col.map(|col| normalize_id(row.text(col)));
        if let (Some(full), Some(id)) = (&full_id, course.course_id.as_mut()) {
            if id.is_empty() {
                *id = base_course_id(full).to_string();
            }
        }

        if row.cells.len() < layout.min_cells {
            let kind = AnomalyKind::InsufficientColumns {
                section,
                found: row.cells.len(),
                required: layout.min_cells,
            };
            warn!("Row {}: {}", row.index, kind);
            self.report.anomalies.push(Anomaly { row: row.index, kind });
            return;
        }

        let kind = row.text(layout.kind_col);
        let meet = Numeric::parse(row.text(layout.meet_col));
        let cat_no = row.text(layout.cat_no_col);
        let slots = &row.cells[layout.slots_col].slots;
        debug!("Row {}: found {} {} meeting rows", row.index, slots.len(), section);

        let before = course.meetings.len();
        for slot in slots.iter().filter(|s| s.len() >= SLOT_CELLS) {
            course.meetings.push(Meeting {
                kind: kind.to_string(),
                meet: meet.clone(),
                cat_no: cat_no.to_string(),
                day: slot[0].clone(),
                time: slot[1].clone(),
                duration: Numeric::parse(&slot[2]),
                campus: slot[3].clone(),
                room: slot[4].clone(),
                full_course_id: full_id.clone(),
            });
        }
        self.report.meetings += course.meetings.len() - before;

        match section {
            SectionKind::Lecture => self.report.lectures += 1,
            SectionKind::LabOrTutorial => self.report.labs += 1,
        }
    }

    fn skip(&mut self, row: &Row, kind: AnomalyKind) {
        if row.nested {
            self.report.sub_rows += 1;
            return;
        }
        match kind {
            AnomalyKind::ShortHeader { .. } => warn!("Row {}: {}", row.index, kind),
            _ => debug!("Skipping row {}: {}", row.index, kind),
        }
        self.report.anomalies.push(Anomaly { row: row.index, kind });
    }
}

/// Non-breaking spaces become spaces, whitespace runs collapse to one.
fn normalize_id(raw: &str) -> String {
    raw.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First four-digit run ("2021" of "LE/EECS 2021 3.00 A"), else the whole code.
fn base_course_id(id: &str) -> &str {
    FOUR_DIGITS.find(id).map(|m| m.as_str()).unwrap_or(id)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::rows::extract_rows;

    fn fold(body: &str) -> (Vec<Course>, ParseReport) {
        let rows = extract_rows(&format!("<table>{}</table>", body));
        let mut fold = CourseFold::new(Dialect::Structural);
        for row in &rows {
            fold.push(row);
        }
        fold.finish()
    }

    fn header(fac: &str, dept: &str, term: &str, name: &str) -> String {
        format!(
            "<tr><td><strong>{}</strong></td><td>{}</td><td>{}</td><td>{}</td></tr>",
            fac, dept, term, name
        )
    }

    fn slot_table(slots: &[[&str; 5]]) -> String {
        let rows: String = slots
            .iter()
            .map(|s| {
                let cells: String = s.iter().map(|c| format!("<td>{}</td>", c)).collect();
                format!("<tr>{}</tr>", cells)
            })
            .collect();
        format!("<table>{}</table>", rows)
    }

    fn lecture(id: &str, meet: &str, slots: &[[&str; 5]]) -> String {
        format!(
            r#"<tr><td colspan="3"></td><td>{}</td><td>EN</td><td>LECT</td><td>{}</td><td></td><td>{}</td><td>Instructor</td><td></td></tr>"#,
            id,
            meet,
            slot_table(slots)
        )
    }

    fn lab(kind: &str, meet: &str, cat_no: &str, slots: &[[&str; 5]]) -> String {
        format!(
            r#"<tr><td colspan="5"></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>TA</td><td></td></tr>"#,
            kind,
            meet,
            cat_no,
            slot_table(slots)
        )
    }

    const MO: [&str; 5] = ["MO", "10:00", "80", "KE", "101"];
    const WE: [&str; 5] = ["WE", "10:00", "80", "KE", "101"];

    #[test]
    fn header_then_lecture() {
        let body = header("LE", "CSE", "F", "Intro") + &lecture("2021 A", "1", &[MO]);
        let (courses, report) = fold(&body);
        assert_eq!(courses.len(), 1);
        let json = serde_json::to_value(&courses).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "Fac": "LE", "Dept": "CSE", "Term": "F", "Course Name": "Intro",
                "Course ID": "2021",
                "Hours": [{
                    "Type": "LECT", "Meet": 1, "Cat.No": "", "Day": "MO", "Time": "10:00",
                    "Dur": 80, "Campus": "KE", "Room": "101", "Full Course ID": "2021 A"
                }]
            }])
        );
        assert_eq!(report.headers, 1);
        assert_eq!(report.lectures, 1);
        assert_eq!(report.meetings, 1);
    }

    #[test]
    fn consecutive_headers_make_empty_courses() {
        let body = header("LE", "EECS", "F", "One") + &header("LE", "EECS", "W", "Two");
        let (courses, report) = fold(&body);
        assert_eq!(courses.len(), 2);
        assert!(courses.iter().all(|c| c.meetings.is_empty()));
        assert_eq!(courses[1].term, "W");
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn course_id_set_once_from_first_lecture() {
        let body = header("LE", "EECS", "F", "Intro")
            + &lecture("LE/EECS\u{a0}\u{a0}2021   3.00 A", "1", &[MO])
            + &lecture("LE/EECS 3311 3.00 B", "2", &[WE]);
        let (courses, _) = fold(&body);
        let course = &courses[0];
        assert_eq!(course.course_id.as_deref(), Some("2021"));
        assert_eq!(course.meetings.len(), 2);
        assert_eq!(course.meetings[0].full_course_id.as_deref(), Some("LE/EECS 2021 3.00 A"));
        assert_eq!(course.meetings[1].full_course_id.as_deref(), Some("LE/EECS 3311 3.00 B"));
    }

    #[test]
    fn course_id_falls_back_to_full_text() {
        let body = header("LE", "EECS", "F", "Intro") + &lecture("TBD  A", "1", &[MO]);
        let (courses, _) = fold(&body);
        assert_eq!(courses[0].course_id.as_deref(), Some("TBD A"));
    }

    #[test]
    fn each_course_discovers_its_own_id() {
        let body = header("LE", "EECS", "F", "One")
            + &lecture("EECS 1001 A", "1", &[MO])
            + &header("LE", "EECS", "F", "Two")
            + &lecture("EECS 1012 A", "1", &[MO]);
        let (courses, _) = fold(&body);
        assert_eq!(courses[0].course_id.as_deref(), Some("1001"));
        assert_eq!(courses[1].course_id.as_deref(), Some("1012"));
    }

    #[test]
    fn one_meeting_per_slot_in_order() {
        let body = header("LE", "EECS", "F", "Intro")
            + &lecture("2021 A", "1", &[MO, WE, ["FR", "13:00", "50", "KE", "102"]]);
        let (courses, report) = fold(&body);
        let days: Vec<&str> = courses[0].meetings.iter().map(|m| m.day.as_str()).collect();
        assert_eq!(days, ["MO", "WE", "FR"]);
        assert!(courses[0].meetings.iter().all(|m| m.meet == Numeric::Int(1) && m.kind == "LECT"));
        assert_eq!(courses[0].meetings[2].duration, Numeric::Int(50));
        assert_eq!(report.meetings, 3);
    }

    #[test]
    fn short_slot_rows_are_ignored() {
        let slots = format!(
            "<table><tr><td>MO</td><td>10:00</td><td>80</td></tr>{}</table>",
            "<tr><td>TU</td><td>9:00</td><td>80</td><td>KE</td><td>1</td></tr>"
        );
        let row = format!(
            r#"<tr><td colspan="3"></td><td>2021</td><td>EN</td><td>LECT</td><td>1</td><td></td><td>{}</td><td></td><td></td></tr>"#,
            slots
        );
        let (courses, _) = fold(&(header("LE", "EECS", "F", "Intro") + &row));
        assert_eq!(courses[0].meetings.len(), 1);
        assert_eq!(courses[0].meetings[0].day, "TU");
    }

    #[test]
    fn lab_rows_use_their_own_columns() {
        let body = header("LE", "EECS", "F", "Intro")
            + &lab("LAB", "01", "X12Y34", &[["TH", "14:30", "180", "KE", "LAS1002"]]);
        let (courses, report) = fold(&body);
        let m = &courses[0].meetings[0];
        assert_eq!(m.kind, "LAB");
        assert_eq!(m.meet, Numeric::Int(1));
        assert_eq!(m.cat_no, "X12Y34");
        assert_eq!(m.room, "LAS1002");
        assert_eq!(m.full_course_id, None);
        assert_eq!(courses[0].course_id.as_deref(), Some(""));
        assert_eq!(report.labs, 1);
    }

    #[test]
    fn non_numeric_meet_and_duration_kept_as_text() {
        let body = header("LE", "EECS", "F", "Intro")
            + &lab("TUTR", "TBA", "", &[["MO", "", "", "", ""]]);
        let (courses, _) = fold(&body);
        let m = &courses[0].meetings[0];
        assert_eq!(m.meet, Numeric::Raw("TBA".into()));
        assert_eq!(m.duration, Numeric::Raw(String::new()));
        let v = serde_json::to_value(m).unwrap();
        assert_eq!(v["Meet"], serde_json::json!("TBA"));
    }

    #[test]
    fn section_before_any_header_is_skipped() {
        let body = lecture("2021 A", "1", &[MO]) + &header("LE", "EECS", "F", "Intro");
        let (courses, report) = fold(&body);
        assert_eq!(courses.len(), 1);
        assert!(courses[0].meetings.is_empty());
        assert_eq!(courses[0].course_id.as_deref(), Some(""));
        assert_eq!(report.orphaned, 1);
    }

    #[test]
    fn short_lecture_row_logged_and_skipped() {
        let short = r#"<tr><td colspan="3"></td><td>2021 A</td><td>EN</td><td>LECT</td></tr>"#;
        let body = header("LE", "EECS", "F", "Intro") + short + &lab("LAB", "1", "", &[MO]);
        let (courses, report) = fold(&body);
        // the code is still picked up before the column check
        assert_eq!(courses[0].course_id.as_deref(), Some("2021"));
        assert_eq!(courses[0].meetings.len(), 1);
        assert_eq!(
            report.count(|k| matches!(
                k,
                AnomalyKind::InsufficientColumns {
                    section: SectionKind::Lecture,
                    found: 4,
                    required: 9
                }
            )),
            1
        );
        assert_eq!(report.lectures, 0);
    }

    #[test]
    fn corrupted_rows_do_not_stop_the_fold() {
        let bad_colspan = r#"<tr><td colspan="7"></td><td>x</td></tr>"#;
        let short_header = "<tr><td><strong>LE</strong></td><td>EECS</td></tr>";
        let body = header("LE", "EECS", "F", "Intro")
            + bad_colspan
            + &lecture("2021 A", "1", &[MO])
            + short_header
            + &lab("LAB", "2", "", &[WE]);
        let (courses, report) = fold(&body);
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].meetings.len(), 2);
        assert_eq!(
            report.count(|k| *k == AnomalyKind::UnexpectedColspan(Some("7".into()))),
            1
        );
        assert_eq!(report.count(|k| *k == AnomalyKind::ShortHeader { found: 2 }), 1);
        let bad = report
            .anomalies
            .iter()
            .find(|a| a.kind == AnomalyKind::UnexpectedColspan(Some("7".into())))
            .unwrap();
        assert_eq!(bad.row, 1);
    }

    #[test]
    fn sub_table_rows_are_not_anomalies() {
        let body = header("LE", "EECS", "F", "Intro") + &lecture("2021 A", "1", &[MO, WE]);
        let (courses, report) = fold(&body);
        assert_eq!(report.rows, 4);
        assert_eq!(report.sub_rows, 2);
        assert!(report.anomalies.is_empty());
        assert_eq!(courses[0].meetings.len(), 2);
    }

    #[test]
    fn top_level_row_without_colspan_is_still_an_anomaly() {
        let body = header("LE", "EECS", "F", "Intro") + "<tr><td>Fac</td><td>Dept</td></tr>";
        let (_, report) = fold(&body);
        assert_eq!(report.sub_rows, 0);
        assert_eq!(report.count(|k| *k == AnomalyKind::UnexpectedColspan(None)), 1);
    }

    #[test]
    fn cell_count_dialect_has_no_ids() {
        let rows = extract_rows(
            r#"<table>
            <tr><td>SC</td><td>MATH</td><td>F</td><td>Calculus</td></tr>
            <tr><td></td><td>LAB</td><td>3</td><td>K9</td><td><table><tr><td>TU</td><td>9:00</td><td>110</td><td>KE</td><td>R1</td></tr></table></td><td>TA</td><td></td></tr>
            </table>"#,
        );
        let mut fold = CourseFold::new(Dialect::CellCount);
        for row in &rows {
            fold.push(row);
        }
        let (courses, report) = fold.finish();
        assert_eq!(report.sub_rows, 1);
        assert!(report.anomalies.is_empty());
        assert_eq!(courses[0].course_id, None);
        assert_eq!(courses[0].meetings[0].meet, Numeric::Int(3));
        assert_eq!(courses[0].meetings[0].full_course_id, None);
    }

    #[test]
    fn normalize_and_base_id() {
        assert_eq!(normalize_id(" LE/EECS\u{a0}2021 \t 3.00  A "), "LE/EECS 2021 3.00 A");
        assert_eq!(base_course_id("LE/EECS 2021 3.00 A"), "2021");
        assert_eq!(base_course_id("12345"), "1234");
        assert_eq!(base_course_id("N/A"), "N/A");
    }

    #[test]
    fn breakdown_groups_rows_by_reason() {
        let body = header("LE", "EECS", "F", "Intro")
            + r#"<tr><td colspan="7"></td></tr>"#
            + "<tr><td><b>x</b></td></tr>"
            + r#"<tr><td colspan="2"></td></tr>"#;
        let (_, report) = fold(&body);
        let groups = report.breakdown();
        assert_eq!(groups["unexpected colspan: 7"], vec![1]);
        assert_eq!(groups["unexpected colspan: 2"], vec![3]);
        assert_eq!(groups["header row does not have enough columns; found 1"], vec![2]);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn merge_reports() {
        let (_, a) = fold(&header("LE", "EECS", "F", "One"));
        let bad = r#"<tr><td colspan="9">x</td></tr>"#;
        let body = header("SC", "MATH", "F", "Two") + bad + &lab("LAB", "1", "", &[MO]);
        let (_, b) = fold(&body);
        let mut total = ParseReport::default();
        total.merge(a);
        total.merge(b);
        assert_eq!(total.headers, 2);
        assert_eq!(total.rows, 5);
        assert_eq!(total.sub_rows, 1);
        assert_eq!(total.anomalies.len(), 1);
    }
}
