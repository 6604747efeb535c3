use std::fmt;

use super::rows::Row;

/// Which kind of section row a meeting row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Lecture,
    LabOrTutorial,
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionKind::Lecture => f.write_str("Lecture"),
            SectionKind::LabOrTutorial => f.write_str("Lab/Tutorial"),
        }
    }
}

/// Role of a single table row, decided from its own structure only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    /// No `<td>` at all: spacer or `<th>`-only row.
    Blank,
    Header,
    Section(SectionKind),
    Unrecognized(AnomalyKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnomalyKind {
    ShortHeader { found: usize },
    UnexpectedColspan(Option<String>),
    UnexpectedCellCount(usize),
    InsufficientColumns { section: SectionKind, found: usize, required: usize },
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyKind::ShortHeader { found } => {
                write!(f, "header row does not have enough columns; found {}", found)
            }
            AnomalyKind::UnexpectedColspan(Some(c)) => write!(f, "unexpected colspan: {}", c),
            AnomalyKind::UnexpectedColspan(None) => f.write_str("unexpected colspan: none"),
            AnomalyKind::UnexpectedCellCount(n) => write!(f, "unexpected cell count: {}", n),
            AnomalyKind::InsufficientColumns { section, found, required } => write!(
                f,
                "{} row has insufficient columns: {} (need {})",
                section, found, required
            ),
        }
    }
}

/// Column positions of one section row layout, indexing the flattened cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionLayout {
    pub min_cells: usize,
    pub kind_col: usize,
    pub meet_col: usize,
    pub cat_no_col: usize,
    pub slots_col: usize,
    /// Column with the section code ("LE EECS 2021 3.00 A"), when exposed.
    pub course_id_col: Option<usize>,
}

const STRUCTURAL_LECTURE: SectionLayout = SectionLayout {
    min_cells: 9,
    kind_col: 3,
    meet_col: 4,
    cat_no_col: 5,
    slots_col: 6,
    course_id_col: Some(1),
};

const CELL_COUNT_LECTURE: SectionLayout = SectionLayout {
    min_cells: 9,
    kind_col: 5,
    meet_col: 6,
    cat_no_col: 7,
    slots_col: 8,
    course_id_col: None,
};

const LAB_OR_TUTORIAL: SectionLayout = SectionLayout {
    min_cells: 7,
    kind_col: 1,
    meet_col: 2,
    cat_no_col: 3,
    slots_col: 4,
    course_id_col: None,
};

const HEADER_CELLS: usize = 4;

/// The known HTML layouts of the timetable pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Bold first cell marks a course, first-cell colspan 3/5 marks lecture/lab.
    Structural,
    /// Older pages: the number of cells alone decides (4 / 9 / 7).
    CellCount,
}

impl Dialect {
    pub fn classify(self, row: &Row) -> RowKind {
        match self {
            Dialect::Structural => classify_structural(row),
            Dialect::CellCount => classify_cell_count(row),
        }
    }

    pub fn layout(self, section: SectionKind) -> SectionLayout {
        match (self, section) {
            (Dialect::Structural, SectionKind::Lecture) => STRUCTURAL_LECTURE,
            (Dialect::CellCount, SectionKind::Lecture) => CELL_COUNT_LECTURE,
            (_, SectionKind::LabOrTutorial) => LAB_OR_TUTORIAL,
        }
    }

    /// Whether courses of this layout carry a "Course ID".
    pub fn tracks_course_id(self) -> bool {
        matches!(self, Dialect::Structural)
    }

    /// Structural as soon as one row opens with a lecture/lab colspan.
    pub fn detect(rows: &[Row]) -> Dialect {
        let structural = rows.iter().any(|r| {
            r.first()
                .and_then(|c| c.colspan.as_deref())
                .is_some_and(|c| c == "3" || c == "5")
        });
        if structural {
            Dialect::Structural
        } else {
            Dialect::CellCount
        }
    }
}

fn classify_structural(row: &Row) -> RowKind {
    let Some(first) = row.first() else {
        return RowKind::Blank;
    };

    if first.bold {
        return if row.cells.len() >= HEADER_CELLS {
            RowKind::Header
        } else {
            RowKind::Unrecognized(AnomalyKind::ShortHeader { found: row.cells.len() })
        };
    }

    match first.colspan.as_deref() {
        Some("3") => RowKind::Section(SectionKind::Lecture),
        Some("5") => RowKind::Section(SectionKind::LabOrTutorial),
        other => RowKind::Unrecognized(AnomalyKind::UnexpectedColspan(other.map(str::to_string))),
    }
}

fn classify_cell_count(row: &Row) -> RowKind {
    if row.cells.is_empty() {
        return RowKind::Blank;
    }
    match row.own_cells {
        4 => RowKind::Header,
        9 => RowKind::Section(SectionKind::Lecture),
        7 => RowKind::Section(SectionKind::LabOrTutorial),
        n => RowKind::Unrecognized(AnomalyKind::UnexpectedCellCount(n)),
    }
}
