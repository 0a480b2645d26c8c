//! Data models for the proteomics tables.
//!
//! This module contains the in-memory representation of the tables loaded
//! from the store. Every table is built once per session and never mutated.

use crate::error::QueryError;
use anyhow::{bail, Result};
use std::collections::HashSet;

/// Table holding per-gene mass fractions, one column per condition.
pub const MASS_FRACTION_TABLE: &str = "mass_fraction_combine";
/// Table mapping genes to subcellular compartments.
pub const ANNOTATION_TABLE: &str = "compartment_annotation_refine";
/// Table holding per-compartment protein mass ratios, one column per condition.
pub const RATIO_TABLE: &str = "ProMassRatio_across_compartment_combine";
/// Table describing each condition identifier.
pub const CONDITION_TABLE: &str = "physiology_collection";

/// A table of real values keyed by a string column.
///
/// Values are stored column-major so that a condition column can be handed
/// out as a contiguous slice. Missing cells are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericTable {
    /// Name of the source table (used in messages).
    pub name: String,
    /// Name of the key column (`gene` or `compartment`).
    pub key_column: String,
    keys: Vec<String>,
    conditions: Vec<String>,
    columns: Vec<Vec<f64>>,
}

/// Per-gene mass fractions across conditions.
pub type MassFractionTable = NumericTable;

/// Per-compartment protein mass ratios across conditions.
pub type CompartmentMassRatioTable = NumericTable;

impl NumericTable {
    /// Build a table, checking that every column has one value per key.
    pub fn new(
        name: impl Into<String>,
        key_column: impl Into<String>,
        keys: Vec<String>,
        conditions: Vec<String>,
        columns: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let name = name.into();
        if conditions.len() != columns.len() {
            bail!(
                "{}: {} condition names for {} columns",
                name,
                conditions.len(),
                columns.len()
            );
        }
        if let Some((condition, column)) = conditions
            .iter()
            .zip(&columns)
            .find(|(_, column)| column.len() != keys.len())
        {
            bail!(
                "{}: column '{}' has {} values for {} rows",
                name,
                condition,
                column.len(),
                keys.len()
            );
        }

        Ok(Self {
            name,
            key_column: key_column.into(),
            keys,
            conditions,
            columns,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Row keys in table order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Condition identifiers in column order.
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    /// Look up a condition column.
    pub fn column(&self, condition: &str) -> Option<&[f64]> {
        self.conditions
            .iter()
            .position(|c| c == condition)
            .map(|idx| self.columns[idx].as_slice())
    }

    /// Look up a condition column, reporting a missing column as a query error.
    pub fn require_column(&self, condition: &str) -> Result<&[f64], QueryError> {
        self.column(condition).ok_or_else(|| QueryError::MissingColumn {
            table: self.name.clone(),
            column: condition.to_string(),
        })
    }

    /// All values of one row, in condition order.
    pub fn row_values(&self, row: usize) -> Vec<f64> {
        self.columns.iter().map(|column| column[row]).collect()
    }

    /// Copy of the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            key_column: self.key_column.clone(),
            keys: rows.iter().map(|&r| self.keys[r].clone()).collect(),
            conditions: self.conditions.clone(),
            columns: self
                .columns
                .iter()
                .map(|column| rows.iter().map(|&r| column[r]).collect())
                .collect(),
        }
    }

    /// Copy of the first `n` rows.
    pub fn head(&self, n: usize) -> Self {
        let rows: Vec<usize> = (0..self.len().min(n)).collect();
        self.select_rows(&rows)
    }
}

/// One gene-to-compartment assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub gene: String,
    pub compartment: String,
}

/// Gene-to-compartment mapping. A gene may be listed under several compartments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompartmentAnnotation {
    entries: Vec<Annotation>,
}

impl CompartmentAnnotation {
    pub fn new(entries: Vec<Annotation>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)] // Completes the len() pair
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct compartment labels in first-seen order.
    pub fn compartments(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|a| a.compartment.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    pub fn contains_compartment(&self, compartment: &str) -> bool {
        self.entries.iter().any(|a| a.compartment == compartment)
    }

    /// Genes annotated to a compartment.
    pub fn genes_in(&self, compartment: &str) -> HashSet<&str> {
        self.entries
            .iter()
            .filter(|a| a.compartment == compartment)
            .map(|a| a.gene.as_str())
            .collect()
    }
}

/// Descriptive attributes of one condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionRecord {
    pub id: String,
    pub attributes: Vec<String>,
}

/// One row per condition identifier (media, temperature, description, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionMetadata {
    /// Column names; the first names the identifier column.
    pub columns: Vec<String>,
    pub records: Vec<ConditionRecord>,
}

impl ConditionMetadata {
    /// Find the record for a condition identifier.
    pub fn get(&self, id: &str) -> Option<&ConditionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// One-line description of a condition, e.g. `Growth_Media: YPD, Temperature: 30`.
    pub fn describe(&self, id: &str) -> Option<String> {
        let record = self.get(id)?;
        let parts: Vec<String> = self
            .columns
            .iter()
            .skip(1)
            .zip(&record.attributes)
            .filter(|(_, value)| !value.is_empty())
            .map(|(column, value)| format!("{}: {}", column, value))
            .collect();
        Some(parts.join(", "))
    }
}

/// Everything loaded from the store for one session.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub mass_fractions: MassFractionTable,
    pub annotations: CompartmentAnnotation,
    pub ratios: CompartmentMassRatioTable,
    /// Absent when the store has no condition table.
    pub conditions: Option<ConditionMetadata>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Small mass-fraction table: genes A, B, C with P1 = [0.3, 0.1, 0.2].
    pub fn abc_table() -> NumericTable {
        NumericTable::new(
            MASS_FRACTION_TABLE,
            "gene",
            vec!["A".into(), "B".into(), "C".into()],
            vec!["P1".into(), "P2".into()],
            vec![vec![0.3, 0.1, 0.2], vec![0.01, 0.02, 0.03]],
        )
        .unwrap()
    }

    pub fn nucleus_annotation() -> CompartmentAnnotation {
        CompartmentAnnotation::new(vec![
            Annotation {
                gene: "A".into(),
                compartment: "nucleus".into(),
            },
            Annotation {
                gene: "C".into(),
                compartment: "nucleus".into(),
            },
            Annotation {
                gene: "B".into(),
                compartment: "cytoplasm".into(),
            },
        ])
    }

    pub fn ratio_table() -> NumericTable {
        NumericTable::new(
            RATIO_TABLE,
            "compartment",
            vec!["nucleus".into(), "cytoplasm".into(), "vacuole".into()],
            vec!["P1".into(), "P2".into()],
            vec![vec![0.2, 0.6, 0.01], vec![0.25, 0.5, 0.3]],
        )
        .unwrap()
    }

    pub fn dataset() -> Dataset {
        Dataset {
            mass_fractions: abc_table(),
            annotations: nucleus_annotation(),
            ratios: ratio_table(),
            conditions: Some(ConditionMetadata {
                columns: vec!["Condition_ID".into(), "Growth_Media".into()],
                records: vec![ConditionRecord {
                    id: "P1".into(),
                    attributes: vec!["YPD".into()],
                }],
            }),
        }
    }
}
