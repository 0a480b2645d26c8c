//! Page rendering.
//!
//! This module turns a [`Page`] into Markdown or JSON text.

use crate::cli::OutputFormat;
use crate::report::page::{Block, Page, Status, TableBlock};
use anyhow::Result;

/// Render a page as Markdown.
pub fn generate_markdown(page: &Page) -> String {
    let mut output = String::new();

    // Title
    output.push_str(&format!("# {}\n\n", page.title));

    // Status line
    output.push_str(&generate_status_line(page));

    for block in &page.blocks {
        output.push_str(&generate_block(block));
    }

    // Footer
    output.push_str(&generate_footer(page));

    output
}

/// Status line under the title; nothing for a normal page.
fn generate_status_line(page: &Page) -> String {
    match page.status {
        Status::Ok => String::new(),
        Status::NotFound => "**Status:** not found\n\n".to_string(),
        Status::Degraded => "**Status:** degraded\n\n".to_string(),
        Status::Failed => "**Status:** failed\n\n".to_string(),
    }
}

fn generate_block(block: &Block) -> String {
    match block {
        Block::Heading { text } => format!("## {}\n\n", text),
        Block::Text { text } => format!("{}\n\n", text),
        Block::Table(table) => generate_table(table),
        Block::Chart { title, path } => {
            format!("![{}]({})\n\n", title, path.display())
        }
        Block::Notice { level, message } => format!("> {} {}\n\n", level.emoji(), message),
        Block::Html { html } => format!("{}\n\n", html),
    }
}

/// Generate a Markdown table. Pipes inside cells are escaped.
fn generate_table(table: &TableBlock) -> String {
    let mut section = String::new();

    if table.rows.is_empty() {
        section.push_str("*No rows.*\n\n");
        return section;
    }

    section.push_str(&format!("| {} |\n", escape_row(&table.headers).join(" | ")));
    section.push_str(&format!(
        "|{}\n",
        table.headers.iter().map(|_| ":---|").collect::<String>()
    ));

    for row in &table.rows {
        section.push_str(&format!("| {} |\n", escape_row(row).join(" | ")));
    }
    section.push('\n');

    section
}

fn escape_row(cells: &[String]) -> Vec<String> {
    cells.iter().map(|c| c.replace('|', "\\|")).collect()
}

/// Generate the page footer.
fn generate_footer(page: &Page) -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Generated by protmass {} at {}*\n",
        env!("CARGO_PKG_VERSION"),
        page.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    footer
}

/// Render a page as pretty-printed JSON.
pub fn generate_json(page: &Page) -> Result<String> {
    serde_json::to_string_pretty(page).map_err(Into::into)
}

/// Render a page in the requested format.
pub fn render(page: &Page, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => generate_json(page),
        OutputFormat::Markdown => Ok(generate_markdown(page)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::page::Level;
    use std::path::PathBuf;

    fn create_test_page() -> Page {
        let mut page = Page::new("Compartment analysis");
        page.heading("nucleus under P1")
            .text("Total mass fraction: 0.500000")
            .table(
                vec!["Gene".to_string(), "Mass fraction".to_string()],
                vec![
                    vec!["A".to_string(), "0.300000".to_string()],
                    vec!["C".to_string(), "0.200000".to_string()],
                ],
            )
            .chart("Top proteins", PathBuf::from("out/nucleus_P1.svg"));
        page
    }

    #[test]
    fn test_generate_markdown() {
        let markdown = generate_markdown(&create_test_page());

        assert!(markdown.starts_with("# Compartment analysis\n\n"));
        assert!(markdown.contains("## nucleus under P1"));
        assert!(markdown.contains("| Gene | Mass fraction |"));
        assert!(markdown.contains("|:---|:---|"));
        assert!(markdown.contains("| C | 0.200000 |"));
        assert!(markdown.contains("![Top proteins](out/nucleus_P1.svg)"));
        assert!(markdown.contains("Generated by protmass"));
        assert!(!markdown.contains("**Status:**"));
    }

    #[test]
    fn test_status_and_notice() {
        let mut page = Page::new("Download").with_status(Status::Degraded);
        page.notice(Level::Warning, "archive missing");

        let markdown = generate_markdown(&page);
        assert!(markdown.contains("**Status:** degraded"));
        assert!(markdown.contains("> ⚠️ archive missing"));
    }

    #[test]
    fn test_empty_table_and_escaping() {
        let empty = generate_table(&TableBlock {
            headers: vec!["Gene".to_string()],
            rows: vec![],
        });
        assert!(empty.contains("No rows"));

        let escaped = generate_table(&TableBlock {
            headers: vec!["Description".to_string()],
            rows: vec![vec!["a|b".to_string()]],
        });
        assert!(escaped.contains("a\\|b"));
    }

    #[test]
    fn test_render_selects_format() {
        let page = create_test_page();
        assert!(render(&page, OutputFormat::Markdown).unwrap().starts_with("# "));
        assert!(render(&page, OutputFormat::Json).unwrap().starts_with('{'));
    }

    #[test]
    fn test_generate_json() {
        let json = generate_json(&create_test_page()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["title"], "Compartment analysis");
        assert_eq!(value["status"], "ok");
        assert_eq!(value["blocks"][0]["kind"], "heading");
        assert_eq!(value["blocks"][2]["kind"], "table");
        assert_eq!(value["blocks"][2]["rows"][1][0], "C");
        assert_eq!(value["blocks"][3]["path"], "out/nucleus_P1.svg");
    }
}
