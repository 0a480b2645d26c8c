//! The rendered result of one command.
//!
//! Handlers build a `Page` of blocks; the generator turns it into Markdown
//! or JSON. Charts are referenced by path, never embedded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The request completed.
    Ok,
    /// A referenced column or compartment does not exist; nothing was computed.
    NotFound,
    /// An external asset is unavailable; a fallback was shown.
    Degraded,
    /// An unexpected error ended the request.
    Failed,
}

impl Status {
    /// Process exit code for one-shot commands.
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok | Status::Degraded => 0,
            Status::Failed => 1,
            Status::NotFound => 2,
        }
    }
}

/// Severity of an inline notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    /// Returns an emoji representation of the level.
    pub fn emoji(&self) -> &'static str {
        match self {
            Level::Info => "ℹ️",
            Level::Warning => "⚠️",
            Level::Error => "❌",
        }
    }
}

/// A rectangular table of already formatted cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableBlock {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One piece of a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Heading { text: String },
    Text { text: String },
    Table(TableBlock),
    Chart { title: String, path: PathBuf },
    Notice { level: Level, message: String },
    /// Raw HTML (the download link).
    Html { html: String },
}

/// Everything one command produced.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub status: Status,
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            generated_at: Utc::now(),
            status: Status::Ok,
            blocks: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn heading(&mut self, text: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Heading { text: text.into() });
        self
    }

    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Text { text: text.into() });
        self
    }

    pub fn table(&mut self, headers: Vec<String>, rows: Vec<Vec<String>>) -> &mut Self {
        self.blocks.push(Block::Table(TableBlock { headers, rows }));
        self
    }

    pub fn chart(&mut self, title: impl Into<String>, path: PathBuf) -> &mut Self {
        self.blocks.push(Block::Chart {
            title: title.into(),
            path,
        });
        self
    }

    pub fn notice(&mut self, level: Level, message: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Notice {
            level,
            message: message.into(),
        });
        self
    }

    pub fn html(&mut self, html: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Html { html: html.into() });
        self
    }

    /// Chart files referenced by this page.
    pub fn charts(&self) -> impl Iterator<Item = &PathBuf> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Chart { path, .. } => Some(path),
            _ => None,
        })
    }

    /// Messages of notices at the given level.
    #[cfg(test)]
    pub fn notices(&self, level: Level) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Notice { level: l, message } if *l == level => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Format a table value: scientific notation for small magnitudes.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else if value.abs() < 1e-3 || value.abs() >= 1e6 {
        format!("{:.4e}", value)
    } else {
        format!("{:.6}", value)
    }
}
