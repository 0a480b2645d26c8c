//! Compartment aggregation and ranking.
//!
//! This module provides the per-compartment sums, the descending rankings
//! and the cumulative-mass curve behind the compartment analysis.

use crate::error::QueryError;
use crate::models::{CompartmentAnnotation, CompartmentMassRatioTable, MassFractionTable};
use serde::Serialize;
use std::cmp::Ordering;

/// A labelled value in a ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked {
    pub label: String,
    pub value: f64,
}

/// One step of a cumulative-mass curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativePoint {
    pub gene: String,
    pub value: f64,
    pub cumulative: f64,
}

/// Result of the cumulative-mass analysis for one compartment and condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompartmentMass {
    pub compartment: String,
    pub condition: String,
    /// Sum of the condition over every gene of the compartment.
    pub total: f64,
    /// The largest genes, at most `top_n` of them.
    pub top: Vec<Ranked>,
    /// Every gene of the compartment, sorted descending, with the running sum.
    pub curve: Vec<CumulativePoint>,
}

/// Descending order with NaN last.
pub fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Sort a ranking largest first. The sort is stable: ties keep input order.
pub fn rank_descending(mut items: Vec<Ranked>) -> Vec<Ranked> {
    items.sort_by(|a, b| descending_nan_last(a.value, b.value));
    items
}

/// Running sum of `values`. Missing (NaN) values add nothing.
pub fn cumulative_sum(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, &v| {
            if !v.is_nan() {
                *acc += v;
            }
            Some(*acc)
        })
        .collect()
}

/// Cumulative-mass analysis of one compartment under one condition.
///
/// Genes annotated to the compartment are joined against the mass-fraction
/// table (each mass-fraction row at most once, in table order), summed,
/// sorted descending and accumulated. Nothing is computed when either the
/// compartment or the condition is unknown.
pub fn compartment_mass(
    mass_fractions: &MassFractionTable,
    annotations: &CompartmentAnnotation,
    compartment: &str,
    condition: &str,
    top_n: usize,
) -> Result<CompartmentMass, QueryError> {
    if !annotations.contains_compartment(compartment) {
        return Err(QueryError::MissingCompartment(compartment.to_string()));
    }
    let column = mass_fractions.require_column(condition)?;

    let members = annotations.genes_in(compartment);
    let joined: Vec<Ranked> = mass_fractions
        .keys()
        .iter()
        .zip(column)
        .filter(|(gene, _)| members.contains(gene.as_str()))
        .map(|(gene, &value)| Ranked {
            label: gene.clone(),
            value,
        })
        .collect();

    let total = joined.iter().map(|r| r.value).filter(|v| !v.is_nan()).sum();
    let sorted = rank_descending(joined);

    let values: Vec<f64> = sorted.iter().map(|r| r.value).collect();
    let curve = sorted
        .iter()
        .zip(cumulative_sum(&values))
        .map(|(r, cumulative)| CumulativePoint {
            gene: r.label.clone(),
            value: r.value,
            cumulative,
        })
        .collect();

    let top = sorted.into_iter().take(top_n).collect();

    Ok(CompartmentMass {
        compartment: compartment.to_string(),
        condition: condition.to_string(),
        total,
        top,
        curve,
    })
}

/// The `n` compartments with the largest mass ratio under a condition.
pub fn top_compartments(
    ratios: &CompartmentMassRatioTable,
    condition: &str,
    n: usize,
) -> Result<Vec<Ranked>, QueryError> {
    let column = ratios.require_column(condition)?;
    let ranked = ratios
        .keys()
        .iter()
        .zip(column)
        .map(|(label, &value)| Ranked {
            label: label.clone(),
            value,
        })
        .collect();

    let mut ranked = rank_descending(ranked);
    ranked.truncate(n);
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{abc_table, nucleus_annotation, ratio_table};
    use crate::models::{Annotation, NumericTable};
    use proptest::prelude::*;

    #[test]
    fn test_compartment_mass_example() {
        let result =
            compartment_mass(&abc_table(), &nucleus_annotation(), "nucleus", "P1", 10).unwrap();

        assert!((result.total - 0.5).abs() < 1e-12);
        assert_eq!(
            result.top,
            vec![
                Ranked {
                    label: "A".to_string(),
                    value: 0.3
                },
                Ranked {
                    label: "C".to_string(),
                    value: 0.2
                },
            ]
        );
        let cumulative: Vec<f64> = result.curve.iter().map(|p| p.cumulative).collect();
        assert!((cumulative[0] - 0.3).abs() < 1e-12);
        assert!((cumulative[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_compartment_or_condition() {
        let mf = abc_table();
        let ann = nucleus_annotation();
        assert_eq!(
            compartment_mass(&mf, &ann, "golgi", "P1", 10),
            Err(QueryError::MissingCompartment("golgi".to_string()))
        );
        assert!(matches!(
            compartment_mass(&mf, &ann, "nucleus", "P42", 10),
            Err(QueryError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_duplicate_annotations_do_not_duplicate_rows() {
        let ann = CompartmentAnnotation::new(vec![
            Annotation {
                gene: "A".into(),
                compartment: "nucleus".into(),
            },
            Annotation {
                gene: "A".into(),
                compartment: "nucleus".into(),
            },
        ]);
        let result = compartment_mass(&abc_table(), &ann, "nucleus", "P1", 10).unwrap();
        assert_eq!(result.curve.len(), 1);
        assert!((result.total - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_top_n_ties_keep_row_order() {
        let genes: Vec<String> = (0..12).map(|i| format!("G{}", i)).collect();
        let values = vec![0.1, 0.5, 0.1, 0.5, 0.2, 0.0, 0.3, 0.1, 0.1, 0.4, 0.1, 0.1];
        let table = NumericTable::new(
            "mass_fraction_combine",
            "gene",
            genes.clone(),
            vec!["P1".into()],
            vec![values],
        )
        .unwrap();
        let ann = CompartmentAnnotation::new(
            genes
                .iter()
                .map(|g| Annotation {
                    gene: g.clone(),
                    compartment: "all".into(),
                })
                .collect(),
        );

        let result = compartment_mass(&table, &ann, "all", "P1", 10).unwrap();
        let labels: Vec<&str> = result.top.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["G1", "G3", "G9", "G6", "G4", "G0", "G2", "G7", "G8", "G10"]
        );
        assert_eq!(result.curve.len(), 12);
    }

    #[test]
    fn test_missing_values_sort_last_and_add_nothing() {
        let table = NumericTable::new(
            "mass_fraction_combine",
            "gene",
            vec!["A".into(), "B".into(), "C".into()],
            vec!["P1".into()],
            vec![vec![f64::NAN, 0.2, 0.1]],
        )
        .unwrap();
        let ann = CompartmentAnnotation::new(
            ["A", "B", "C"]
                .iter()
                .map(|g| Annotation {
                    gene: g.to_string(),
                    compartment: "x".into(),
                })
                .collect(),
        );

        let result = compartment_mass(&table, &ann, "x", "P1", 10).unwrap();
        assert_eq!(result.curve.last().unwrap().gene, "A");
        assert!((result.total - 0.3).abs() < 1e-12);
        assert!((result.curve.last().unwrap().cumulative - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_top_compartments() {
        let ranked = top_compartments(&ratio_table(), "P1", 2).unwrap();
        let labels: Vec<&str> = ranked.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["cytoplasm", "nucleus"]);

        assert!(top_compartments(&ratio_table(), "P3", 2).is_err());
    }

    proptest! {
        #[test]
        fn prop_cumulative_is_monotone_and_ends_at_total(
            values in proptest::collection::vec(0.0f64..1.0, 1..60),
        ) {
            let genes: Vec<String> = (0..values.len()).map(|i| format!("G{}", i)).collect();
            let table = NumericTable::new(
                "mass_fraction_combine",
                "gene",
                genes.clone(),
                vec!["P1".into()],
                vec![values.clone()],
            )
            .unwrap();
            let ann = CompartmentAnnotation::new(
                genes
                    .iter()
                    .step_by(2)
                    .map(|g| Annotation { gene: g.clone(), compartment: "c".into() })
                    .collect(),
            );

            let result = compartment_mass(&table, &ann, "c", "P1", 10).unwrap();

            for pair in result.curve.windows(2) {
                prop_assert!(pair[1].cumulative >= pair[0].cumulative);
            }
            let last = result.curve.last().map(|p| p.cumulative).unwrap_or(0.0);
            prop_assert!((last - result.total).abs() < 1e-9);

            // The top list holds the largest values of the subset.
            let mut subset: Vec<f64> = values.iter().step_by(2).copied().collect();
            subset.sort_by(|a, b| b.partial_cmp(a).unwrap());
            subset.truncate(10);
            let top: Vec<f64> = result.top.iter().map(|r| r.value).collect();
            prop_assert_eq!(top, subset);
        }
    }
}
