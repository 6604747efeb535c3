use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::model::Course;

pub const DEFAULT_OUTPUT: &str = "courses_data.json";

/// Write courses as a JSON array indented by four spaces. `-` means stdout.
pub fn write_courses(path: &Path, courses: &[Course]) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    courses.serialize(&mut ser).context("Failed to serialize courses")?;

    if path == Path::new("-") {
        let mut out = std::io::stdout().lock();
        out.write_all(&buf)?;
        writeln!(out)?;
        return Ok(());
    }

    std::fs::write(path, &buf).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn read_courses(path: &Path) -> Result<Vec<Course>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("{} is not a course list", path.display()))
}
