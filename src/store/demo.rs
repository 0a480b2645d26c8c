//! Synthetic demo database.
//!
//! Writes the four tables with random but reproducible contents so the tool
//! can be tried without the real data set.

use crate::models::{ANNOTATION_TABLE, CONDITION_TABLE, MASS_FRACTION_TABLE, RATIO_TABLE};
use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::info;

const COMPARTMENTS: &[&str] = &["cytoplasm", "nucleus", "mitochondria", "ER", "vacuole"];
const MEDIA: &[&str] = &["YPD", "SD", "SC"];
const TEMPERATURES: &[i64] = &[25, 30, 37];

/// Shape of the generated data set.
#[derive(Debug, Clone, Copy)]
pub struct DemoOptions {
    pub genes: usize,
    pub conditions: usize,
    pub seed: u64,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            genes: 100,
            conditions: 10,
            seed: 42,
        }
    }
}

/// Write a demo database to `path`. Refuses to overwrite an existing file.
pub fn write_demo_database(path: &Path, options: DemoOptions) -> Result<()> {
    if path.exists() {
        bail!("{} already exists; remove it first", path.display());
    }
    if options.genes == 0 || options.conditions == 0 {
        bail!("Demo data needs at least one gene and one condition");
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("Failed to create database: {}", path.display()))?;
    let mut rng = StdRng::seed_from_u64(options.seed);

    let genes: Vec<String> = (1..=options.genes).map(|i| format!("YAL{:03}C", i)).collect();
    let conditions: Vec<String> = (1..=options.conditions).map(|i| format!("P{}", i)).collect();

    let tx = conn.transaction().context("Failed to start transaction")?;

    create_numeric_table(&tx, MASS_FRACTION_TABLE, "gene", &conditions)?;
    for gene in &genes {
        let values: Vec<f64> = conditions
            .iter()
            .map(|_| exponential(&mut rng, 0.001))
            .collect();
        insert_numeric_row(&tx, MASS_FRACTION_TABLE, &conditions, gene, &values)?;
    }

    tx.execute_batch(&format!(
        "CREATE TABLE \"{}\" (gene TEXT, compartment TEXT);",
        ANNOTATION_TABLE
    ))?;
    for _ in 0..options.genes * 2 {
        let gene = genes.choose(&mut rng).map(String::as_str).unwrap_or_default();
        let compartment = COMPARTMENTS.choose(&mut rng).copied().unwrap_or_default();
        tx.execute(
            &format!("INSERT INTO \"{}\" VALUES (?1, ?2)", ANNOTATION_TABLE),
            [gene, compartment],
        )?;
    }

    create_numeric_table(&tx, RATIO_TABLE, "compartment", &conditions)?;
    for compartment in COMPARTMENTS {
        let values: Vec<f64> = conditions
            .iter()
            .map(|_| exponential(&mut rng, 0.1))
            .collect();
        insert_numeric_row(&tx, RATIO_TABLE, &conditions, compartment, &values)?;
    }

    tx.execute_batch(&format!(
        "CREATE TABLE \"{}\" (Condition_ID TEXT, Description TEXT, Growth_Media TEXT, Temperature INTEGER);",
        CONDITION_TABLE
    ))?;
    for (i, condition) in conditions.iter().enumerate() {
        let media = MEDIA.choose(&mut rng).copied().unwrap_or_default();
        let temperature = TEMPERATURES.choose(&mut rng).copied().unwrap_or(30);
        tx.execute(
            &format!("INSERT INTO \"{}\" VALUES (?1, ?2, ?3, ?4)", CONDITION_TABLE),
            rusqlite::params![
                condition,
                format!("Experimental condition {}", i + 1),
                media,
                temperature
            ],
        )?;
    }

    tx.commit().context("Failed to commit demo data")?;

    info!(
        "Wrote demo database with {} genes and {} conditions to {}",
        options.genes,
        options.conditions,
        path.display()
    );
    Ok(())
}

/// Draw from an exponential distribution with the given mean.
fn exponential(rng: &mut StdRng, mean: f64) -> f64 {
    let u: f64 = rng.gen();
    -mean * (1.0 - u).ln()
}

fn create_numeric_table(
    conn: &Connection,
    table: &str,
    key_column: &str,
    conditions: &[String],
) -> Result<()> {
    let columns: Vec<String> = conditions.iter().map(|c| format!("\"{}\" REAL", c)).collect();
    conn.execute_batch(&format!(
        "CREATE TABLE \"{}\" ({} TEXT, {});",
        table,
        key_column,
        columns.join(", ")
    ))
    .with_context(|| format!("Failed to create table {}", table))
}

fn insert_numeric_row(
    conn: &Connection,
    table: &str,
    conditions: &[String],
    key: &str,
    values: &[f64],
) -> Result<()> {
    let placeholders: Vec<String> = (1..=conditions.len() + 1).map(|i| format!("?{}", i)).collect();
    let sql = format!("INSERT INTO \"{}\" VALUES ({})", table, placeholders.join(", "));

    let mut params: Vec<rusqlite::types::Value> = vec![key.to_string().into()];
    params.extend(values.iter().map(|&v| rusqlite::types::Value::Real(v)));

    conn.execute(&sql, params_from_iter(params))
        .with_context(|| format!("Failed to insert into {}", table))?;
    Ok(())
}
