//! SQLite store access.
//!
//! Each table is read in full with `SELECT *` and converted into the
//! in-memory models. The database is opened read-only.

pub mod demo;

use crate::error::AssetError;
use crate::models::{
    Annotation, CompartmentAnnotation, ConditionMetadata, ConditionRecord, Dataset, NumericTable,
    ANNOTATION_TABLE, CONDITION_TABLE, MASS_FRACTION_TABLE, RATIO_TABLE,
};
use anyhow::{anyhow, Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use tracing::{debug, info, warn};

/// Columns pandas adds when a frame is written with its index.
const INDEX_COLUMNS: &[&str] = &["index", "level_0"];

/// Open the database read-only.
pub fn open(path: &Path) -> Result<Connection> {
    if !path.exists() {
        return Err(AssetError::DatabaseMissing(path.display().to_string()).into());
    }

    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open database: {}", path.display()))
}

/// Load every table the session needs.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    info!("Loading dataset from: {}", path.display());
    let conn = open(path)?;

    let mass_fractions = load_numeric_table(&conn, MASS_FRACTION_TABLE, "gene")?;
    let annotations = load_annotations(&conn)?;
    let ratios = load_numeric_table(&conn, RATIO_TABLE, "compartment")?;

    let conditions = if table_exists(&conn, CONDITION_TABLE)? {
        Some(load_conditions(&conn)?)
    } else {
        warn!("Table {} not found; condition metadata unavailable", CONDITION_TABLE);
        None
    };

    info!(
        "Loaded {} genes x {} conditions, {} annotations, {} compartments",
        mass_fractions.len(),
        mass_fractions.conditions().len(),
        annotations.len(),
        ratios.len()
    );

    Ok(Dataset {
        mass_fractions,
        annotations,
        ratios,
        conditions,
    })
}

/// Check whether a table exists in the database.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .with_context(|| format!("Failed to look up table {}", table))?;
    Ok(count > 0)
}

/// Read a whole table: the column names and every row as raw cells.
fn read_table(conn: &Connection, table: &str) -> Result<(Vec<String>, Vec<Vec<Cell>>)> {
    let sql = format!("SELECT * FROM \"{}\"", table.replace('"', "\"\""));
    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("Failed to query table {}", table))?;

    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = names.len();

    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get_ref(i).map(Cell::from))
                .collect::<rusqlite::Result<Vec<Cell>>>()
        })
        .with_context(|| format!("Failed to read table {}", table))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read a row of {}", table))?;

    debug!("Read {} rows x {} columns from {}", rows.len(), width, table);
    Ok((names, rows))
}

/// Load a table keyed by `key_column`; every other column is a condition.
pub fn load_numeric_table(conn: &Connection, table: &str, key_column: &str) -> Result<NumericTable> {
    let (names, rows) = read_table(conn, table)?;

    let key_idx = find_column(&names, key_column, table)?;
    let value_columns: Vec<(usize, String)> = names
        .iter()
        .enumerate()
        .filter(|(i, name)| *i != key_idx && !INDEX_COLUMNS.contains(&name.as_str()))
        .map(|(i, name)| (i, name.clone()))
        .collect();

    let keys = rows.iter().map(|row| row[key_idx].as_text()).collect();
    let columns = value_columns
        .iter()
        .map(|(i, _)| rows.iter().map(|row| row[*i].as_number()).collect())
        .collect();
    let conditions = value_columns.into_iter().map(|(_, name)| name).collect();

    NumericTable::new(table, key_column, keys, conditions, columns)
}

/// Load the gene-to-compartment mapping.
pub fn load_annotations(conn: &Connection) -> Result<CompartmentAnnotation> {
    let (names, rows) = read_table(conn, ANNOTATION_TABLE)?;
    let gene_idx = find_column(&names, "gene", ANNOTATION_TABLE)?;
    let compartment_idx = find_column(&names, "compartment", ANNOTATION_TABLE)?;

    let entries = rows
        .iter()
        .map(|row| Annotation {
            gene: row[gene_idx].as_text(),
            compartment: row[compartment_idx].as_text(),
        })
        .collect();

    Ok(CompartmentAnnotation::new(entries))
}

/// Load the condition descriptions. The first non-index column is the identifier.
pub fn load_conditions(conn: &Connection) -> Result<ConditionMetadata> {
    let (names, rows) = read_table(conn, CONDITION_TABLE)?;

    let kept: Vec<usize> = names
        .iter()
        .enumerate()
        .filter(|(_, name)| !INDEX_COLUMNS.contains(&name.as_str()))
        .map(|(i, _)| i)
        .collect();
    let (&id_idx, attribute_idx) = kept
        .split_first()
        .ok_or_else(|| anyhow!("Table {} has no columns", CONDITION_TABLE))?;

    let records = rows
        .iter()
        .map(|row| ConditionRecord {
            id: row[id_idx].as_text(),
            attributes: attribute_idx.iter().map(|&i| row[i].as_text()).collect(),
        })
        .collect();

    Ok(ConditionMetadata {
        columns: kept.iter().map(|&i| names[i].clone()).collect(),
        records,
    })
}

fn find_column(names: &[String], column: &str, table: &str) -> Result<usize> {
    names
        .iter()
        .position(|n| n == column)
        .ok_or_else(|| anyhow!("Table {} has no '{}' column", table, column))
}

/// An owned SQLite cell.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<ValueRef<'_>> for Cell {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Integer(i),
            ValueRef::Real(f) => Cell::Real(f),
            ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(_) => Cell::Null,
        }
    }
}

impl Cell {
    /// Numeric value; NULL and unparseable text become NaN.
    fn as_number(&self) -> f64 {
        match self {
            Cell::Null => f64::NAN,
            Cell::Integer(i) => *i as f64,
            Cell::Real(f) => *f,
            Cell::Text(t) => t.trim().parse().unwrap_or(f64::NAN),
        }
    }

    fn as_text(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Integer(i) => i.to_string(),
            Cell::Real(f) => f.to_string(),
            Cell::Text(t) => t.clone(),
        }
    }
}
