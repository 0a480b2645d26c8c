//! protmass - yeast absolute quantitative proteomics explorer
//!
//! A CLI tool that loads protein mass fractions from a SQLite database
//! and answers search, compartment, ratio and distribution queries as
//! Markdown or JSON pages with SVG charts.
//!
//! Exit codes:
//!   0 - Success (including degraded download pages)
//!   1 - Runtime error (missing database, I/O, config, etc.)
//!   2 - A requested column or compartment does not exist

mod analysis;
mod cli;
mod commands;
mod config;
mod error;
mod models;
mod report;
mod session;
mod shell;
mod store;

use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat};
use config::{Config, CONFIG_FILE};
use error::AssetError;
use session::Session;
use std::path::Path;
use store::demo::{write_demo_database, DemoOptions};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("protmass v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("protmass failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .protmass.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the database, archive, analysis limits and output.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one command (or the shell). Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let Some(command) = args.command.clone() else {
        return Ok(1);
    };

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // The demo database needs no session.
    if let Command::DemoDb {
        path,
        genes,
        conditions,
        seed,
    } = &command
    {
        let options = DemoOptions {
            genes: *genes,
            conditions: *conditions,
            seed: *seed,
        };
        write_demo_database(path, options)?;
        println!(
            "✅ Wrote demo database with {} genes and {} conditions to {}",
            genes,
            conditions,
            path.display()
        );
        return Ok(0);
    }

    // About is static text and must not depend on the database.
    if command == Command::About {
        let page = commands::about_page(&config);
        emit(&page, config.output.format, args.output.as_deref())?;
        return Ok(page.status.exit_code());
    }

    let contact = config.download.contact.clone();
    let session = match Session::open(config, !args.quiet).await {
        Ok(session) => session,
        Err(e) => {
            if let Some(asset) = e.downcast_ref::<AssetError>() {
                let page = commands::degraded_page("protmass", asset, &contact);
                eprintln!("{}", report::generator::generate_markdown(&page));
                return Ok(1);
            }
            return Err(e);
        }
    };

    if command == Command::Shell {
        shell::run(&session).await?;
        return Ok(0);
    }

    let page = commands::dispatch(&session, &command).await;
    for chart in page.charts() {
        debug!("Chart: {}", chart.display());
    }
    emit(&page, session.config.output.format, args.output.as_deref())?;

    Ok(page.status.exit_code())
}

/// Render a page to stdout or to the `--output` file.
fn emit(page: &report::Page, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let rendered = report::render(page, format)?;

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write page to {}", path.display()))?;
            println!("✅ Page saved to: {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn args_for(dir: &TempDir, command: &[&str]) -> Args {
        let database = dir.path().join("absent.db");
        let mut argv = vec![
            "protmass".to_string(),
            "--quiet".to_string(),
            "--database".to_string(),
            database.display().to_string(),
            "--archive".to_string(),
            dir.path().join("absent.rar").display().to_string(),
            "--output".to_string(),
            dir.path().join("page.md").display().to_string(),
        ];
        argv.extend(command.iter().map(|s| s.to_string()));
        Args::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn test_missing_database_exits_with_runtime_error() {
        let dir = TempDir::new().unwrap();
        let args = args_for(&dir, &["overview"]);

        assert_eq!(run(args).await.unwrap(), 1);
        // The degraded page goes to stderr, nothing is written as output.
        assert!(!dir.path().join("page.md").exists());
    }

    #[tokio::test]
    async fn test_about_without_database() {
        let dir = TempDir::new().unwrap();
        let args = args_for(&dir, &["about"]);

        assert_eq!(run(args).await.unwrap(), 0);
        let page = std::fs::read_to_string(dir.path().join("page.md")).unwrap();
        assert!(page.contains("About Us"));
        assert!(page.contains("Saccharomyces cerevisiae"));
    }
}
