use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use trace_graph::{PhaseDocument, TraceOptions, TraceOutcome};
use trace_metadata::MetadataDocument;

mod config;

use config::TraceConfig;

#[derive(Parser)]
#[command(name = "tracexml")]
#[command(about = "Trace clinical study metadata from collection to analysis", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Print the OIDs reachable from the root
    #[arg(long)]
    reachable: bool,

    /// Print the OIDs of orphan nodes
    #[arg(long)]
    unreachable: bool,

    /// Skip the deep-trace retest of unreachable nodes
    #[arg(long)]
    no_retest: bool,

    /// Add yEd graphics to the GraphML output
    #[arg(long)]
    yed: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut config = TraceConfig::load(&cli.config)?;
    config.yed |= cli.yed;
    let documents = load_documents(&config)?;

    let options = TraceOptions {
        retest: !cli.no_retest,
        include_reachable: cli.reachable,
    };
    let outcome = trace_graph::run(&documents, options).context("Failed to build the trace graph")?;

    write_outputs(&config, &outcome)?;

    if let Some(reachable) = &outcome.report.reachable {
        for oid in reachable {
            println!("{oid}");
        }
    }
    if cli.unreachable {
        for oid in outcome.report.orphan_oids() {
            println!("{oid}");
        }
    }

    Ok(())
}

fn load_documents(config: &TraceConfig) -> Result<Vec<PhaseDocument>> {
    config
        .phase_files()
        .into_iter()
        .map(|(phase, path)| -> Result<PhaseDocument> {
            log::info!("Reading {} metadata from {}", phase, path.display());
            let document = MetadataDocument::open(path)
                .with_context(|| format!("Failed to load {} metadata file {}", phase, path.display()))?;
            Ok(PhaseDocument::new(phase, document))
        })
        .collect()
}

fn write_outputs(config: &TraceConfig, outcome: &TraceOutcome) -> Result<()> {
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Cannot create output dir {}", config.output_dir.display()))?;

    outcome
        .export
        .write_graphml(&config.graph_file, config.yed)
        .with_context(|| format!("Failed to write {}", config.graph_file.display()))?;
    if let Some(path) = &config.graph_json_file {
        outcome
            .export
            .write_json(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let report = &outcome.report;
    report
        .write_json(&config.report_file)
        .with_context(|| format!("Failed to write {}", config.report_file.display()))?;
    report
        .write_text(&config.report_text_file)
        .with_context(|| format!("Failed to write {}", config.report_text_file.display()))?;

    log::info!(
        "{} orphans, {} expected unreachable, {} nodes added to root",
        report.orphans.len(),
        report.expected_unreachable.len(),
        report.added_to_root.len()
    );
    for entry in &report.orphans {
        log::warn!("Orphan: {}", entry.label());
    }
    for entry in &report.expected_unreachable {
        log::debug!("Expected unreachable: {}", entry.label());
    }
    for oid in &report.added_to_root {
        log::debug!("Added to root: {oid}");
    }
    Ok(())
}
