//! Reference list of known element and oxide names.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};

/// Oxides and elements commonly reported in glass and ceramic compositions.
const BUILTIN_ELEMENTS: &[&str] = &[
    // Network formers
    "SiO2", "B2O3", "P2O5", "GeO2", "Al2O3", "Ga2O3", "As2O3", "Sb2O3", "TeO2", "V2O5",
    // Alkali oxides
    "Li2O", "Na2O", "K2O", "Rb2O", "Cs2O", "R2O",
    // Alkaline earth and divalent oxides
    "BeO", "MgO", "CaO", "SrO", "BaO", "ZnO", "CdO", "PbO", "SnO", "FeO", "MnO", "CoO", "NiO",
    "CuO", "Cu2O", "Ag2O", "Tl2O", "RO",
    // Intermediates and stabilizers
    "TiO2", "ZrO2", "HfO2", "SnO2", "CeO2", "MnO2", "SeO2", "SO3", "MoO3", "WO3", "Bi2O3",
    "Nb2O5", "Ta2O5", "Fe2O3", "Cr2O3", "In2O3", "Y2O3", "Sc2O3",
    // Rare earth oxides
    "La2O3", "Pr2O3", "Pr6O11", "Nd2O3", "Sm2O3", "Eu2O3", "Gd2O3", "Tb2O3", "Tb4O7", "Dy2O3",
    "Ho2O3", "Er2O3", "Tm2O3", "Yb2O3", "Lu2O3",
    // Anions and refining agents
    "F", "Cl", "Br", "I", "S", "N", "C",
];

/// Canonical form of an element name: NFKC-normalized with whitespace removed.
///
/// NFKC folds subscript digits, so `SiO₂` becomes `SiO2`.
pub fn canonical_name(raw: &str) -> String {
    raw.nfkc().filter(|c| !c.is_whitespace()).collect()
}

/// Set of recognized element names.
///
/// Lookup is exact on the canonical form, then case-insensitive for names
/// of two or more characters; a hit returns the reference spelling.
/// Single letters must match exactly, so example labels like `c` or `n`
/// are not read as carbon or nitrogen.
#[derive(Debug, Clone)]
pub struct ElementTable {
    names: HashSet<String>,
    folded: HashMap<String, String>,
}

impl Default for ElementTable {
    fn default() -> Self {
        Self::from_names(BUILTIN_ELEMENTS.iter().copied())
    }
}

impl ElementTable {
    /// Build a table from names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self {
            names: HashSet::new(),
            folded: HashMap::new(),
        };
        for name in names {
            let canonical = canonical_name(name.as_ref());
            if canonical.is_empty() {
                continue;
            }
            table
                .folded
                .entry(canonical.to_lowercase())
                .or_insert_with(|| canonical.clone());
            table.names.insert(canonical);
        }
        table
    }

    /// Parse a reference list.
    ///
    /// One name per line; `#` starts a comment and for CSV lines only the
    /// first column is read.
    pub fn parse(text: &str) -> Self {
        Self::from_names(text.lines().filter_map(|line| {
            let line = line.split('#').next().unwrap_or("");
            let first = line.split([',', ';']).next().unwrap_or("").trim();
            let first = first.trim_matches('"');
            (!first.is_empty()).then_some(first)
        }))
    }

    /// Load a reference list from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let table = Self::parse(&text);
        if table.is_empty() {
            return Err(Error::Config(format!(
                "Element list '{}' contains no names",
                path.display()
            )));
        }
        log::debug!("Loaded {} element name(s) from '{}'", table.len(), path.display());
        Ok(table)
    }

    /// Reference spelling of a name, if recognized.
    pub fn resolve(&self, raw: &str) -> Option<&str> {
        let canonical = canonical_name(raw);
        if let Some(name) = self.names.get(&canonical) {
            return Some(name.as_str());
        }
        if canonical.chars().count() < 2 {
            return None;
        }
        self.folded.get(&canonical.to_lowercase()).map(String::as_str)
    }

    /// Check whether a name is recognized.
    pub fn contains(&self, raw: &str) -> bool {
        self.resolve(raw).is_some()
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
