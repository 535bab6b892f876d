//! Plain text rendering of normalized tables.

use std::fmt::Write;

use crate::model::{Molecule, NormalizedTable, Orientation, ValueBasis};

fn basis_label(basis: ValueBasis) -> &'static str {
    match basis {
        ValueBasis::WeightPercent => "wt%",
        ValueBasis::MolarPercent => "mol%",
        ValueBasis::Unknown => "unknown basis",
    }
}

fn pages_label(pages: &[u32]) -> String {
    match pages {
        [] => "no pages".to_string(),
        [only] => format!("page {}", only),
        [first, .., last] => format!("pages {}-{}", first, last),
    }
}

/// Short bound notation: `65,8`, `<65,8`, `>19,9` or `1,0-2,5`.
pub fn format_bounds(molecule: &Molecule) -> String {
    match (&molecule.min, &molecule.max) {
        (Some(min), Some(max)) if min == max => min.clone(),
        (Some(min), Some(max)) => format!("{}-{}", min, max),
        (Some(min), None) => format!(">{}", min),
        (None, Some(max)) => format!("<{}", max),
        (None, None) => "?".to_string(),
    }
}

/// Render normalized tables as indented text, one example per line.
pub fn to_text(tables: &[NormalizedTable]) -> String {
    let mut output = String::new();
    for table in tables {
        let _ = writeln!(
            output,
            "Table {} ({}, {}, {})",
            table.table_id,
            pages_label(&table.page_refs),
            basis_label(table.value_basis),
            match table.orientation {
                Orientation::Vertical => "rows are examples",
                Orientation::Horizontal => "columns are examples",
            }
        );
        for example in &table.examples {
            let molecules: Vec<String> = example
                .molecules
                .iter()
                .map(|m| format!("{} {}", m.element, format_bounds(m)))
                .collect();
            let _ = writeln!(output, "  {}: {}", example.example_number, molecules.join("; "));
        }
        if !table.abnormal_elements.is_empty() {
            let _ = writeln!(output, "  unrecognized: {}", table.abnormal_elements.join(", "));
        }
    }
    output.trim_end().to_string()
}
