use serde::{Deserialize, Serialize};

/// A Meet or Dur cell: an integer when the cell parses as one, the trimmed
/// cell text otherwise ("TBA", "", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Int(i64),
    Raw(String),
}

impl Numeric {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.parse::<i64>() {
            Ok(n) => Numeric::Int(n),
            Err(_) => Numeric::Raw(text.to_string()),
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Numeric::Int(_))
    }
}

/// One scheduled slot of a lecture, lab or tutorial section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Meet")]
    pub meet: Numeric,
    #[serde(rename = "Cat.No")]
    pub cat_no: String,
    #[serde(rename = "Day")]
    pub day: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Dur")]
    pub duration: Numeric,
    #[serde(rename = "Campus")]
    pub campus: String,
    #[serde(rename = "Room")]
    pub room: String,
    #[serde(
        rename = "Full Course ID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub full_course_id: Option<String>,
}

/// A course header plus every meeting listed under it.
///
/// `course_id` is `None` for layouts that never expose a course code; the
/// key is then left out of the JSON entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "Fac")]
    pub faculty: String,
    #[serde(rename = "Dept")]
    pub department: String,
    #[serde(rename = "Term")]
    pub term: String,
    #[serde(rename = "Course Name")]
    pub name: String,
    #[serde(rename = "Course ID", default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(rename = "Hours", default)]
    pub meetings: Vec<Meeting>,
}

impl Course {
    pub fn new(
        faculty: String,
        department: String,
        term: String,
        name: String,
        tracks_id: bool,
    ) -> Self {
        Course {
            faculty,
            department,
            term,
            name,
            course_id: tracks_id.then(String::new),
            meetings: Vec::new(),
        }
    }
}

// ── Tests ──
