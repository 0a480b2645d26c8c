//! Command dispatch.
//!
//! Each request is looked up in a static handler table by its kind, run
//! behind a panic guard and turned into a [`Page`]. Failures never escape
//! as errors: they are classified and rendered like any other page.

use crate::analysis::{
    compartment_mass, condition_totals, log_distribution, log_scatter, ratio_scatter,
    search_genes, top_compartments, SearchOutcome,
};
use crate::cli::Command;
use crate::config::Config;
use crate::error::{AssetError, QueryError};
use crate::report::charts::{self, ChartSize};
use crate::report::{format_value, Level, Page, Status};
use crate::session::Session;
use anyhow::{bail, Context, Result};
use base64::Engine;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The kinds of request a session can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Overview,
    Search,
    Compartment,
    Compartments,
    Ratio,
    Distribution,
    Download,
    About,
    DemoDb,
    Shell,
}

impl CommandKind {
    pub fn of(command: &Command) -> Self {
        match command {
            Command::Overview { .. } => CommandKind::Overview,
            Command::Search { .. } => CommandKind::Search,
            Command::Compartment { .. } => CommandKind::Compartment,
            Command::Compartments => CommandKind::Compartments,
            Command::Ratio { .. } => CommandKind::Ratio,
            Command::Distribution { .. } => CommandKind::Distribution,
            Command::Download { .. } => CommandKind::Download,
            Command::About => CommandKind::About,
            Command::DemoDb { .. } => CommandKind::DemoDb,
            Command::Shell => CommandKind::Shell,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Overview => "overview",
            CommandKind::Search => "search",
            CommandKind::Compartment => "compartment",
            CommandKind::Compartments => "compartments",
            CommandKind::Ratio => "ratio",
            CommandKind::Distribution => "distribution",
            CommandKind::Download => "download",
            CommandKind::About => "about",
            CommandKind::DemoDb => "demo-db",
            CommandKind::Shell => "shell",
        }
    }
}

type Handler = for<'a> fn(&'a Session, &'a Command) -> BoxFuture<'a, Result<Page>>;

/// Handlers for the kinds that run against a loaded session.
static HANDLERS: &[(CommandKind, Handler)] = &[
    (CommandKind::Overview, overview),
    (CommandKind::Search, search),
    (CommandKind::Compartment, compartment),
    (CommandKind::Compartments, compartments),
    (CommandKind::Ratio, ratio),
    (CommandKind::Distribution, distribution),
    (CommandKind::Download, download),
    (CommandKind::About, about),
];

/// Run one command against the session.
pub async fn dispatch(session: &Session, command: &Command) -> Page {
    let kind = CommandKind::of(command);
    debug!("Dispatching {}", kind.name());

    let Some((_, handler)) = HANDLERS.iter().find(|(k, _)| *k == kind) else {
        let mut page = Page::new(kind.name()).with_status(Status::Failed);
        page.notice(
            Level::Error,
            format!("'{}' is not available inside a session.", kind.name()),
        );
        return page;
    };

    guarded(kind, &session.config, handler(session, command)).await
}

/// Await a handler, turning errors and panics into pages.
async fn guarded<F>(kind: CommandKind, config: &Config, action: F) -> Page
where
    F: Future<Output = Result<Page>>,
{
    match AssertUnwindSafe(action).catch_unwind().await {
        Ok(Ok(page)) => page,
        Ok(Err(e)) => error_page(kind, config, e),
        Err(_) => {
            error!("The {} command panicked", kind.name());
            let mut page = Page::new(kind.name()).with_status(Status::Failed);
            page.notice(Level::Error, "An internal error occurred. Please try again.");
            page
        }
    }
}

/// Classify a failed command.
fn error_page(kind: CommandKind, config: &Config, e: anyhow::Error) -> Page {
    if let Some(query) = e.downcast_ref::<QueryError>() {
        warn!("{}: {}", kind.name(), query);
        let mut page = Page::new(kind.name()).with_status(Status::NotFound);
        page.notice(Level::Warning, query.to_string());
        return page;
    }

    if let Some(asset) = e.downcast_ref::<AssetError>() {
        warn!("{}: {}", kind.name(), asset);
        return degraded_page(kind.name(), asset, &config.download.contact);
    }

    error!("{} failed: {:#}", kind.name(), e);
    let mut page = Page::new(kind.name()).with_status(Status::Failed);
    page.notice(Level::Error, format!("Error: {:#}", e));
    page
}

/// Page shown when an external asset is unavailable.
pub fn degraded_page(title: &str, asset: &AssetError, contact: &str) -> Page {
    let mut page = Page::new(title).with_status(Status::Degraded);
    page.notice(Level::Warning, format!("Unavailable: {}.", asset));
    page.text(format!(
        "The full dataset is not available here. Please contact {} to obtain it.",
        contact
    ));
    page
}

fn chart_size(config: &Config) -> ChartSize {
    ChartSize {
        width: config.output.chart_width,
        height: config.output.chart_height,
    }
}

/// Path for a chart file, creating the output directory if needed.
fn chart_path(config: &Config, stem: &str) -> Result<PathBuf> {
    let dir = &config.output.dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    Ok(dir.join(format!("{}.svg", sanitize_file_stem(stem))))
}

/// Keep file names portable: anything but ASCII alphanumerics, `-` and
/// `_` becomes `_`.
fn sanitize_file_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Attach a rendered chart, or a notice when rendering failed. The rest of
/// the page stays valid either way.
fn attach_chart(page: &mut Page, title: &str, path: PathBuf, drawn: Result<()>) {
    match drawn {
        Ok(()) => {
            info!("Chart written: {}", path.display());
            page.chart(title, path);
        }
        Err(e) => {
            warn!("Failed to render {}: {:#}", path.display(), e);
            page.notice(
                Level::Error,
                format!("The chart '{}' could not be rendered: {:#}", title, e),
            );
        }
    }
}

fn condition_note(session: &Session, condition: &str) -> Option<String> {
    let described = session.dataset.conditions.as_ref()?.describe(condition)?;
    if described.is_empty() {
        None
    } else {
        Some(format!("Condition {}: {}", condition, described))
    }
}

fn overview<'a>(session: &'a Session, command: &'a Command) -> BoxFuture<'a, Result<Page>> {
    async move {
        let Command::Overview { rows } = command else {
            bail!("overview handler received {:?}", command);
        };
        Ok(overview_page(session, rows.unwrap_or(session.config.analysis.overview_rows)))
    }
    .boxed()
}

fn overview_page(session: &Session, rows: usize) -> Page {
    let table = &session.dataset.mass_fractions;
    let head = table.head(rows);

    let mut page = Page::new("Overview");
    page.heading("Mass Fraction Data Overview");
    page.text(format!(
        "Showing {} of {} proteins across {} conditions.",
        head.len(),
        table.len(),
        table.conditions().len()
    ));

    let mut headers = vec![table.key_column.clone()];
    headers.extend(head.conditions().iter().cloned());
    let body = (0..head.len())
        .map(|row| {
            let mut cells = vec![head.keys()[row].clone()];
            cells.extend(head.row_values(row).into_iter().map(format_value));
            cells
        })
        .collect();
    page.table(headers, body);
    if table.is_empty() {
        page.notice(Level::Warning, "The mass-fraction table has no rows.");
    }

    page.heading("Condition Metadata");
    match session.dataset.conditions.as_ref() {
        Some(meta) => {
            let body = meta
                .records
                .iter()
                .map(|r| {
                    let mut cells = vec![r.id.clone()];
                    cells.extend(r.attributes.iter().cloned());
                    cells
                })
                .collect();
            page.table(meta.columns.clone(), body);
        }
        None => {
            page.notice(
                Level::Info,
                "Condition metadata is not available in this database.",
            );
        }
    }

    page
}

fn search<'a>(session: &'a Session, command: &'a Command) -> BoxFuture<'a, Result<Page>> {
    async move {
        let Command::Search { query, conditions } = command else {
            bail!("search handler received {:?}", command);
        };
        let config = &session.config;
        let table = &session.dataset.mass_fractions;

        let rows = match search_genes(table, query) {
            SearchOutcome::NoQuery => {
                return Ok(overview_page(session, config.analysis.overview_rows));
            }
            SearchOutcome::NoMatches { query } => {
                let mut page = Page::new("Search");
                page.notice(
                    Level::Warning,
                    format!("No proteins found matching '{}'", query),
                );
                return Ok(page);
            }
            SearchOutcome::Matches { rows, .. } => rows,
        };

        // Check every requested condition before building anything.
        let totals = if conditions.is_empty() {
            None
        } else {
            Some(condition_totals(table, &rows, conditions)?)
        };

        let matched = table.select_rows(&rows);
        let mut page = Page::new("Search");
        page.heading(format!("Search Results for '{}'", query));
        page.text(format!("Found {} matching proteins", matched.len()));

        let mut headers = vec![table.key_column.clone()];
        headers.extend(matched.conditions().iter().cloned());
        let body = (0..matched.len())
            .map(|row| {
                let mut cells = vec![matched.keys()[row].clone()];
                cells.extend(matched.row_values(row).into_iter().map(format_value));
                cells
            })
            .collect();
        page.table(headers, body);

        if let Some(totals) = totals {
            page.heading("Summed mass fraction by condition");
            page.table(
                vec!["Condition".to_string(), "Total".to_string()],
                totals
                    .iter()
                    .map(|t| vec![t.label.clone(), format_value(t.value)])
                    .collect(),
            );

            let path = chart_path(config, &format!("search_{}", query))?;
            let drawn = charts::condition_totals_chart(&path, query, &totals, chart_size(config));
            attach_chart(
                &mut page,
                &format!("Mass Fraction Distribution for '{}'", query),
                path,
                drawn,
            );
        }

        Ok(page)
    }
    .boxed()
}

fn compartment<'a>(session: &'a Session, command: &'a Command) -> BoxFuture<'a, Result<Page>> {
    async move {
        let Command::Compartment {
            compartment,
            condition,
            top,
        } = command
        else {
            bail!("compartment handler received {:?}", command);
        };
        let config = &session.config;
        let dataset = &session.dataset;
        let top_n = top.unwrap_or(config.analysis.top_n);

        let mass = compartment_mass(
            &dataset.mass_fractions,
            &dataset.annotations,
            compartment,
            condition,
            top_n,
        )?;

        let mut page = Page::new("Compartment Analysis");
        page.heading(format!("{} under {}", compartment, condition));
        if let Some(note) = condition_note(session, condition) {
            page.text(note);
        }
        page.text(format!(
            "Total mass of proteins in the {} for {}: {}",
            compartment,
            condition,
            format_value(mass.total)
        ));

        if mass.curve.is_empty() {
            page.notice(
                Level::Info,
                format!("No measured proteins are annotated to '{}'.", compartment),
            );
            return Ok(page);
        }

        page.heading(format!("Top {} proteins by mass fraction in {}", mass.top.len(), condition));
        page.table(
            vec![
                "Rank".to_string(),
                "Gene".to_string(),
                "Mass fraction".to_string(),
                "Cumulative".to_string(),
            ],
            mass.curve
                .iter()
                .take(mass.top.len())
                .enumerate()
                .map(|(i, p)| {
                    vec![
                        (i + 1).to_string(),
                        p.gene.clone(),
                        format_value(p.value),
                        format_value(p.cumulative),
                    ]
                })
                .collect(),
        );

        let path = chart_path(config, &format!("compartment_{}_{}", compartment, condition))?;
        let drawn = charts::compartment_chart(&path, &mass, chart_size(config));
        attach_chart(
            &mut page,
            &format!("Top proteins and cumulative mass in {} ({})", compartment, condition),
            path,
            drawn,
        );

        Ok(page)
    }
    .boxed()
}

fn compartments<'a>(session: &'a Session, _command: &'a Command) -> BoxFuture<'a, Result<Page>> {
    async move {
        let annotations = &session.dataset.annotations;
        let names = annotations.compartments();

        let mut page = Page::new("Compartments");
        page.text(format!("{} annotated compartments.", names.len()));
        page.table(
            vec!["Compartment".to_string(), "Annotated genes".to_string()],
            names
                .iter()
                .map(|c| vec![c.to_string(), annotations.genes_in(c).len().to_string()])
                .collect(),
        );
        Ok(page)
    }
    .boxed()
}

fn ratio<'a>(session: &'a Session, command: &'a Command) -> BoxFuture<'a, Result<Page>> {
    async move {
        let Command::Ratio { condition, second } = command else {
            bail!("ratio handler received {:?}", command);
        };
        let config = &session.config;
        let ratios = &session.dataset.ratios;
        let mut page = Page::new("Compartment Mass Ratio Analysis");

        let Some(second) = second else {
            let ranked = top_compartments(ratios, condition, config.analysis.ratio_top_n)?;
            page.heading(format!("Top {} compartments in {}", ranked.len(), condition));
            if let Some(note) = condition_note(session, condition) {
                page.text(note);
            }
            page.table(
                vec!["Compartment".to_string(), "Mass ratio".to_string()],
                ranked
                    .iter()
                    .map(|r| vec![r.label.clone(), format_value(r.value)])
                    .collect(),
            );
            if !ranked.is_empty() {
                let path = chart_path(config, &format!("ratio_{}", condition))?;
                let drawn =
                    charts::ratio_ranking_chart(&path, condition, &ranked, chart_size(config));
                attach_chart(&mut page, &format!("Compartment ranking ({})", condition), path, drawn);
            }
            return Ok(page);
        };

        let scatter = ratio_scatter(ratios, condition, second, config.analysis.label_threshold)?;
        page.heading(format!("{} vs {}", condition, second));
        page.text(format!(
            "{} compartments, {} labelled (both ratios >= {}).",
            scatter.points.len(),
            scatter.labelled().count(),
            config.analysis.label_threshold
        ));
        page.table(
            vec![
                "Compartment".to_string(),
                condition.clone(),
                second.clone(),
                "Labelled".to_string(),
            ],
            scatter
                .points
                .iter()
                .map(|p| {
                    vec![
                        p.compartment.clone(),
                        format_value(p.x),
                        format_value(p.y),
                        if p.labelled { "yes" } else { "no" }.to_string(),
                    ]
                })
                .collect(),
        );

        if !scatter.points.is_empty() {
            let path = chart_path(config, &format!("ratio_{}_vs_{}", condition, second))?;
            let drawn = charts::ratio_scatter_chart(&path, &scatter, chart_size(config));
            attach_chart(
                &mut page,
                &format!("Compartment mass ratio: {} vs {}", condition, second),
                path,
                drawn,
            );
        }

        Ok(page)
    }
    .boxed()
}

fn dropped_note(page: &mut Page, dropped: usize, what: &str) {
    if dropped > 0 {
        page.notice(
            Level::Warning,
            format!(
                "{} proteins with a zero, negative or missing mass fraction in {} were left out of the log scale.",
                dropped, what
            ),
        );
    }
}

fn distribution<'a>(session: &'a Session, command: &'a Command) -> BoxFuture<'a, Result<Page>> {
    async move {
        let Command::Distribution { condition, second } = command else {
            bail!("distribution handler received {:?}", command);
        };
        let config = &session.config;
        let table = &session.dataset.mass_fractions;
        let max_bins = config.analysis.max_bins;
        let mut page = Page::new("Protein Mass Distribution Analysis");

        let Some(second) = second else {
            let dist = log_distribution(table, condition, max_bins)?;
            page.heading(format!("{} Log Distribution", condition));
            if let Some(note) = condition_note(session, condition) {
                page.text(note);
            }
            dropped_note(&mut page, dist.dropped, condition);

            let stat = |v: Option<f64>| v.map(format_value).unwrap_or_else(|| "n/a".to_string());
            page.table(
                vec!["Statistic".to_string(), "Value".to_string()],
                vec![
                    vec!["Proteins".to_string(), dist.values.len().to_string()],
                    vec!["Dropped".to_string(), dist.dropped.to_string()],
                    vec!["Mean ln(mass fraction)".to_string(), stat(dist.mean())],
                    vec!["Median ln(mass fraction)".to_string(), stat(dist.median())],
                ],
            );

            if dist.histogram.is_some() {
                let path = chart_path(config, &format!("distribution_{}", condition))?;
                let drawn = charts::distribution_chart(&path, &dist, chart_size(config));
                attach_chart(&mut page, &format!("{} Log Distribution", condition), path, drawn);
            }
            return Ok(page);
        };

        let scatter = log_scatter(table, condition, second, max_bins)?;
        page.heading(format!("{} vs {} Log Scatter Plot", condition, second));
        dropped_note(&mut page, scatter.dropped, &format!("{} or {}", condition, second));
        page.text(match scatter.correlation {
            Some(r) => format!("Pearson correlation of the logs: {:.3}", r),
            None => "Pearson correlation of the logs: undefined (fewer than two finite pairs or no variance)".to_string(),
        });
        page.table(
            vec!["Statistic".to_string(), "Value".to_string()],
            vec![
                vec!["Pairs".to_string(), scatter.points.len().to_string()],
                vec!["Dropped".to_string(), scatter.dropped.to_string()],
            ],
        );

        if !scatter.points.is_empty() {
            let path = chart_path(config, &format!("distribution_{}_vs_{}", condition, second))?;
            let drawn = charts::log_scatter_chart(&path, &scatter, chart_size(config));
            attach_chart(
                &mut page,
                &format!("{} vs {} Log Scatter Plot", condition, second),
                path,
                drawn,
            );
        }

        Ok(page)
    }
    .boxed()
}

fn download<'a>(session: &'a Session, command: &'a Command) -> BoxFuture<'a, Result<Page>> {
    async move {
        let Command::Download { save } = command else {
            bail!("download handler received {:?}", command);
        };
        let config = &session.config;
        let timeout = Duration::from_secs(config.download.timeout_seconds);
        let bytes = session.archive.wait(timeout).await?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes.as_slice());
        let name = &config.data.archive_name;

        let mut page = Page::new("Download Data");
        page.text("Download the database in RAR format.");
        page.html(format!(
            "<a href=\"data:application/x-rar-compressed;base64,{}\" download=\"{}\">Download {}</a>",
            encoded, name, name
        ));

        if let Some(target) = save {
            tokio::fs::write(target, bytes.as_slice())
                .await
                .with_context(|| format!("Failed to save archive to {}", target.display()))?;
            info!("Archive saved to {}", target.display());
            page.text(format!("Saved {} bytes to {}", bytes.len(), target.display()));
        }

        Ok(page)
    }
    .boxed()
}

fn about<'a>(session: &'a Session, _command: &'a Command) -> BoxFuture<'a, Result<Page>> {
    async move { Ok(about_page(&session.config)) }.boxed()
}

/// The about page only needs the configuration, so it is also served
/// when the database cannot be opened.
pub fn about_page(config: &Config) -> Page {
    let mut page = Page::new("About Us");
    page.text(
        "This database contains absolute quantitative proteomic data from \
         Saccharomyces cerevisiae under a variety of experimental settings. \
         These datasets are valuable resources for yeast physiology, synthetic \
         biology and systems biology research. The database is updated as new \
         experimental datasets become available.",
    );
    page.text(format!(
        "For questions or suggestions, please contact {}.",
        config.download.contact
    ));
    page
}
