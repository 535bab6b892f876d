//! Deterministic normalization of extracted tables.
//!
//! The model only decides orientation and reshapes the grid into examples
//! with raw cell text; every value and element name is parsed here.

mod elements;
mod orientation;
mod value;

pub use elements::{canonical_name, ElementTable};
pub use orientation::{detect_orientation, reshape};
pub use value::{parse_cell_value, to_comma_decimal, Bounds};

use crate::llm::{NormalizationResult, RawExample};
use crate::model::{Molecule, NormalizedExample, NormalizedTable, Table, ValueBasis};

/// Turns reshaped examples into canonical element-min-max records.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    elements: ElementTable,
}

impl Normalizer {
    /// Create a normalizer with a reference element list.
    pub fn new(elements: ElementTable) -> Self {
        Self { elements }
    }

    /// The reference element list.
    pub fn elements(&self) -> &ElementTable {
        &self.elements
    }

    /// Reshape a table without the model.
    pub fn fallback(&self, grid: &[Vec<String>]) -> NormalizationResult {
        let orientation = detect_orientation(grid, &self.elements);
        NormalizationResult {
            orientation,
            examples: reshape(grid, orientation),
        }
    }

    /// Parse the values of reshaped examples.
    ///
    /// Returns the examples and the unrecognized element names in order of
    /// first appearance. Cells without a number produce no molecule.
    pub fn examples(&self, raw: &[RawExample]) -> (Vec<NormalizedExample>, Vec<String>) {
        let mut abnormal: Vec<String> = Vec::new();
        let examples = raw
            .iter()
            .map(|example| {
                let molecules = example
                    .molecules
                    .iter()
                    .filter_map(|molecule| {
                        let bounds = parse_cell_value(&molecule.value)?;
                        let element = match self.elements.resolve(&molecule.element) {
                            Some(name) => name.to_string(),
                            None => {
                                let name = canonical_name(&molecule.element);
                                if !abnormal.contains(&name) {
                                    abnormal.push(name.clone());
                                }
                                name
                            }
                        };
                        Some(Molecule {
                            element,
                            min: bounds.min,
                            max: bounds.max,
                        })
                    })
                    .collect();
                NormalizedExample {
                    example_number: example.example_number.trim().to_string(),
                    molecules,
                }
            })
            .collect();
        (examples, abnormal)
    }

    /// Normalize one table from its reshaped examples.
    pub fn normalize(&self, table: &Table, reshaped: &NormalizationResult) -> NormalizedTable {
        let value_basis = table
            .extracted_data
            .as_ref()
            .map(|d| d.value_basis)
            .unwrap_or(ValueBasis::Unknown);
        let (examples, abnormal_elements) = self.examples(&reshaped.examples);

        if !abnormal_elements.is_empty() {
            log::warn!(
                "Table {}: unrecognized element(s) {}",
                table.id,
                abnormal_elements.join(", ")
            );
        }

        NormalizedTable {
            table_id: table.id,
            page_refs: table.page_refs.clone(),
            value_basis,
            orientation: reshaped.orientation,
            examples,
            abnormal_elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::RawMolecule;
    use crate::model::{ExtractionResult, Orientation, TableId};

    fn raw(element: &str, value: &str) -> RawMolecule {
        RawMolecule {
            element: element.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_normalize_flags_unknown_elements() {
        let mut table = Table::fragment(TableId(3), "", 2);
        table.extracted_data = Some(ExtractionResult::new(vec![], ValueBasis::MolarPercent));
        let reshaped = NormalizationResult {
            orientation: Orientation::Vertical,
            examples: vec![RawExample {
                example_number: " 1 ".into(),
                molecules: vec![
                    raw("SiO₂", "<65.8"),
                    raw("Xy2O", "1.5"),
                    raw("MgO", "-"),
                    raw("Xy2O", "2"),
                ],
            }],
        };

        let normalized = Normalizer::default().normalize(&table, &reshaped);
        assert_eq!(normalized.table_id, TableId(3));
        assert_eq!(normalized.page_refs, vec![2]);
        assert_eq!(normalized.value_basis, ValueBasis::MolarPercent);
        assert_eq!(normalized.examples[0].example_number, "1");

        let molecules = &normalized.examples[0].molecules;
        assert_eq!(molecules.len(), 3);
        assert_eq!(molecules[0].element, "SiO2");
        assert_eq!(molecules[0].min, None);
        assert_eq!(molecules[0].max.as_deref(), Some("65,8"));
        assert_eq!(molecules[1].element, "Xy2O");
        assert_eq!(normalized.abnormal_elements, vec!["Xy2O".to_string()]);
        assert!(!normalized.is_clean());
    }

    #[test]
    fn test_fallback_then_normalize() {
        let grid = vec![
            vec!["Ex.".to_string(), "SiO2".to_string(), "Na2O".to_string()],
            vec!["A".to_string(), "72.5".to_string(), ">13".to_string()],
        ];
        let normalizer = Normalizer::default();
        let reshaped = normalizer.fallback(&grid);
        assert_eq!(reshaped.orientation, Orientation::Vertical);

        let (examples, abnormal) = normalizer.examples(&reshaped.examples);
        assert!(abnormal.is_empty());
        assert_eq!(examples[0].molecules[0].min.as_deref(), Some("72,5"));
        assert_eq!(examples[0].molecules[1].min.as_deref(), Some("13"));
        assert_eq!(examples[0].molecules[1].max, None);
    }

    #[test]
    fn test_single_letter_label_is_flagged() {
        let raw_examples = vec![RawExample {
            example_number: "1".into(),
            molecules: vec![raw("c", "2.5"), raw("C", "0.1")],
        }];
        let (examples, abnormal) = Normalizer::default().examples(&raw_examples);
        assert_eq!(examples[0].molecules[0].element, "c");
        assert_eq!(examples[0].molecules[1].element, "C");
        assert_eq!(abnormal, vec!["c".to_string()]);
    }
}
