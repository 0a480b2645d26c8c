//! Gene search.

use crate::analysis::aggregator::{rank_descending, Ranked};
use crate::models::MassFractionTable;
use crate::error::QueryError;

/// Outcome of a gene search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The query was empty.
    NoQuery,
    /// The query matched nothing.
    NoMatches { query: String },
    /// Row indices of the matching genes, in table order.
    Matches { query: String, rows: Vec<usize> },
}

/// Find the rows whose gene contains `query`, ignoring case.
///
/// Plain substring containment: no pattern syntax and no ranking.
pub fn search_genes(table: &MassFractionTable, query: &str) -> SearchOutcome {
    if query.is_empty() {
        return SearchOutcome::NoQuery;
    }

    let needle = query.to_lowercase();
    let rows: Vec<usize> = table
        .keys()
        .iter()
        .enumerate()
        .filter(|(_, gene)| gene.to_lowercase().contains(&needle))
        .map(|(i, _)| i)
        .collect();

    if rows.is_empty() {
        SearchOutcome::NoMatches {
            query: query.to_string(),
        }
    } else {
        SearchOutcome::Matches {
            query: query.to_string(),
            rows,
        }
    }
}

/// Sum each selected condition over the given rows, largest total first.
pub fn condition_totals(
    table: &MassFractionTable,
    rows: &[usize],
    conditions: &[String],
) -> Result<Vec<Ranked>, QueryError> {
    let totals = conditions
        .iter()
        .map(|condition| {
            let column = table.require_column(condition)?;
            let total = rows
                .iter()
                .map(|&r| column[r])
                .filter(|v| !v.is_nan())
                .sum();
            Ok(Ranked {
                label: condition.clone(),
                value: total,
            })
        })
        .collect::<Result<Vec<_>, QueryError>>()?;

    Ok(rank_descending(totals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::abc_table;
    use crate::models::NumericTable;
    use proptest::prelude::*;

    fn gene_table(genes: &[&str]) -> NumericTable {
        NumericTable::new(
            "mass_fraction_combine",
            "gene",
            genes.iter().map(|g| g.to_string()).collect(),
            vec!["P1".to_string()],
            vec![vec![0.0; genes.len()]],
        )
        .unwrap()
    }

    #[test]
    fn test_search_example() {
        let table = gene_table(&["YAL001C", "YBR002W"]);
        assert_eq!(
            search_genes(&table, "YAL"),
            SearchOutcome::Matches {
                query: "YAL".to_string(),
                rows: vec![0],
            }
        );
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let table = gene_table(&["YAL001C", "yal002w", "YBR002W"]);
        match search_genes(&table, "yAl") {
            SearchOutcome::Matches { rows, .. } => assert_eq!(rows, vec![0, 1]),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_empty_query_and_no_matches_are_distinct() {
        let table = gene_table(&["YAL001C"]);
        assert_eq!(search_genes(&table, ""), SearchOutcome::NoQuery);
        assert_eq!(
            search_genes(&table, "ZZZ"),
            SearchOutcome::NoMatches {
                query: "ZZZ".to_string()
            }
        );
    }

    #[test]
    fn test_search_has_no_pattern_syntax() {
        let table = gene_table(&["YAL001C", "Y.L001C"]);
        match search_genes(&table, "Y.L") {
            SearchOutcome::Matches { rows, .. } => assert_eq!(rows, vec![1]),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_condition_totals_sorted() {
        let table = abc_table();
        let totals =
            condition_totals(&table, &[0, 2], &["P2".to_string(), "P1".to_string()]).unwrap();
        assert_eq!(totals[0].label, "P1");
        assert!((totals[0].value - 0.5).abs() < 1e-12);
        assert_eq!(totals[1].label, "P2");
        assert!((totals[1].value - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_condition_totals_unknown_column() {
        let table = abc_table();
        let err = condition_totals(&table, &[0], &["P7".to_string()]).unwrap_err();
        assert!(matches!(err, QueryError::MissingColumn { .. }));
    }

    proptest! {
        #[test]
        fn prop_search_partitions_rows(
            genes in proptest::collection::vec("[A-Za-z0-9]{1,8}", 0..40),
            query in "[A-Za-z0-9]{1,3}",
        ) {
            let refs: Vec<&str> = genes.iter().map(String::as_str).collect();
            let table = gene_table(&refs);
            let needle = query.to_lowercase();

            let matched = match search_genes(&table, &query) {
                SearchOutcome::Matches { rows, .. } => rows,
                SearchOutcome::NoMatches { .. } => Vec::new(),
                SearchOutcome::NoQuery => unreachable!("query is never empty"),
            };

            for (i, gene) in genes.iter().enumerate() {
                let contains = gene.to_lowercase().contains(&needle);
                prop_assert_eq!(contains, matched.contains(&i));
            }
        }
    }
}
