//! Orientation detection and grid reshaping.

use super::ElementTable;
use crate::llm::{RawExample, RawMolecule};
use crate::model::Orientation;

fn mostly_known<'a>(cells: impl Iterator<Item = &'a String>, elements: &ElementTable) -> bool {
    let mut total = 0;
    let mut known = 0;
    for cell in cells.filter(|c| !c.trim().is_empty()) {
        total += 1;
        if elements.contains(cell) {
            known += 1;
        }
    }
    total > 0 && known * 2 > total
}

/// Guess the orientation of a cell grid without the model.
///
/// Element names heading the columns mean rows are examples; element
/// names labeling the rows mean columns are examples. Vertical otherwise.
pub fn detect_orientation(grid: &[Vec<String>], elements: &ElementTable) -> Orientation {
    let Some(header) = grid.first() else {
        return Orientation::Vertical;
    };
    if mostly_known(header.iter().skip(1), elements) {
        return Orientation::Vertical;
    }
    if mostly_known(grid.iter().skip(1).filter_map(|row| row.first()), elements) {
        return Orientation::Horizontal;
    }
    Orientation::Vertical
}

fn cell(grid: &[Vec<String>], row: usize, column: usize) -> &str {
    grid.get(row)
        .and_then(|r| r.get(column))
        .map(|s| s.trim())
        .unwrap_or("")
}

/// Reshape a grid into raw examples along the given orientation.
///
/// Row 0 and column 0 are labels. Examples without a label and without
/// any value are dropped.
pub fn reshape(grid: &[Vec<String>], orientation: Orientation) -> Vec<RawExample> {
    let rows = grid.len();
    let columns = grid.iter().map(Vec::len).max().unwrap_or(0);

    let (examples, entries) = match orientation {
        Orientation::Vertical => (rows, columns),
        Orientation::Horizontal => (columns, rows),
    };
    let at = |example: usize, entry: usize| match orientation {
        Orientation::Vertical => cell(grid, example, entry),
        Orientation::Horizontal => cell(grid, entry, example),
    };

    (1..examples)
        .filter_map(|e| {
            let molecules: Vec<RawMolecule> = (1..entries)
                .map(|m| RawMolecule {
                    element: at(0, m).to_string(),
                    value: at(e, m).to_string(),
                })
                .filter(|m| !m.element.is_empty() && !m.value.is_empty())
                .collect();
            let label = at(e, 0);
            if label.is_empty() && molecules.is_empty() {
                return None;
            }
            Some(RawExample {
                example_number: label.to_string(),
                molecules,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_vertical_detection() {
        let g = grid(&[&["Ex.", "SiO2", "B2O3"], &["1", "60", "<5"]]);
        assert_eq!(detect_orientation(&g, &ElementTable::default()), Orientation::Vertical);
    }

    #[test]
    fn test_horizontal_detection() {
        let g = grid(&[
            &["", "Ex. 1", "Ex. 2"],
            &["SiO₂", "60", "61"],
            &["Al2O3", "20", "19"],
        ]);
        assert_eq!(detect_orientation(&g, &ElementTable::default()), Orientation::Horizontal);
    }

    #[test]
    fn test_unknown_defaults_vertical() {
        let g = grid(&[&["a", "b"], &["c", "d"]]);
        assert_eq!(detect_orientation(&g, &ElementTable::default()), Orientation::Vertical);
        assert_eq!(detect_orientation(&[], &ElementTable::default()), Orientation::Vertical);
    }

    #[test]
    fn test_reshape_vertical() {
        let g = grid(&[&["Ex.", "SiO2", "B2O3"], &["1", "60", ""], &["2", "61", "3"]]);
        let examples = reshape(&g, Orientation::Vertical);
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].example_number, "1");
        assert_eq!(examples[0].molecules.len(), 1);
        assert_eq!(examples[1].molecules[1].element, "B2O3");
        assert_eq!(examples[1].molecules[1].value, "3");
    }

    #[test]
    fn test_reshape_horizontal_ragged() {
        let g = grid(&[&["", "A", "B"], &["SiO2", "60"], &["MgO", "5", "6"]]);
        let examples = reshape(&g, Orientation::Horizontal);
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].example_number, "A");
        assert_eq!(examples[0].molecules.len(), 2);
        assert_eq!(examples[1].molecules.len(), 1);
        assert_eq!(examples[1].molecules[0].element, "MgO");
    }
}
