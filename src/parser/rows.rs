use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static BOLD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("strong, b").unwrap());

/// One `<td>` with the bits the classifier and the fold look at.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub text: String,
    pub colspan: Option<String>,
    pub bold: bool,
    /// `<td>` texts of every `<tr>` nested inside this cell.
    pub slots: Vec<Vec<String>>,
}

/// One `<tr>` of the document.
///
/// `cells` is flattened: every `<td>` below the row in document order, so a
/// cell holding a meeting sub-table is followed by that sub-table's cells.
/// `own_cells` counts only the row's direct `<td>` children. `nested` rows
/// sit inside another row's cell (meeting sub-tables).
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub index: usize,
    pub cells: Vec<Cell>,
    pub own_cells: usize,
    pub nested: bool,
}

impl Row {
    pub fn first(&self) -> Option<&Cell> {
        self.cells.first()
    }

    pub fn text(&self, col: usize) -> &str {
        self.cells.get(col).map(|c| c.text.as_str()).unwrap_or("")
    }
}

/// Every `<tr>` of the document, in document order.
pub fn extract_rows(html: &str) -> Vec<Row> {
    let doc = Html::parse_document(html);
    doc.select(&TR)
        .enumerate()
        .map(|(index, tr)| Row {
            index,
            cells: tr.select(&TD).map(read_cell).collect(),
            own_cells: tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|el| el.value().name() == "td")
                .count(),
            nested: tr
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|el| el.value().name() == "td"),
        })
        .collect()
}

fn read_cell(td: ElementRef<'_>) -> Cell {
    Cell {
        text: element_text(td),
        colspan: td.value().attr("colspan").map(str::to_string),
        bold: td.select(&BOLD).next().is_some(),
        slots: td
            .select(&TR)
            .map(|tr| tr.select(&TD).map(element_text).collect())
            .collect(),
    }
}

/// Text nodes trimmed one by one and glued back together.
fn element_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect()
}
