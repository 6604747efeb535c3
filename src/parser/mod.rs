pub mod classify;
pub mod courses;
pub mod rows;

use tracing::info;

use crate::model::Course;
use classify::Dialect;
use courses::{CourseFold, ParseReport};
use rows::Row;

/// Which layout to read a document with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DialectChoice {
    Auto,
    Structural,
    CellCount,
}

impl DialectChoice {
    fn resolve(self, rows: &[Row]) -> Dialect {
        match self {
            DialectChoice::Auto => Dialect::detect(rows),
            DialectChoice::Structural => Dialect::Structural,
            DialectChoice::CellCount => Dialect::CellCount,
        }
    }
}

pub struct ParsedDocument {
    pub dialect: Dialect,
    pub courses: Vec<Course>,
    pub report: ParseReport,
}

/// Two-pass pipeline: html → rows → courses.
pub fn parse_document(html: &str, choice: DialectChoice) -> ParsedDocument {
    let rows = rows::extract_rows(html);
    let dialect = choice.resolve(&rows);
    let (courses, report) = parse_rows(&rows, dialect);
    info!(
        "Parsed {} rows ({:?}): {} courses, {} meetings, {} skipped rows",
        report.rows,
        dialect,
        courses.len(),
        report.meetings,
        report.anomalies.len() + report.orphaned,
    );
    ParsedDocument {
        dialect,
        courses,
        report,
    }
}

pub fn parse_rows(rows: &[Row], dialect: Dialect) -> (Vec<Course>, ParseReport) {
    let mut fold = CourseFold::new(dialect);
    for row in rows {
        fold.push(row);
    }
    fold.finish()
}

// ── Tests ──
