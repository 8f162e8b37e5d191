//! Command line entry point for the archiver
//!
//! Operates on a JSON base file holding the source and archive tables.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use archiver::{
    CapacityReport, EngineConfig, EngineError, MigrationOrchestrator, MigrationReport, RecordStore,
    services::{JsonBaseHandle, JsonFileStore, RunJournal, TracingReporter},
};
use shared::{Record, logging};

type Orchestrator = MigrationOrchestrator<JsonFileStore, JsonFileStore, TracingReporter>;

/// Duplicate clean-up and archiving for a table base
#[derive(Parser)]
#[command(name = "archiver")]
#[command(about = "Finds duplicate records and moves old or published records to an archive table")]
pub struct Args {
    /// Path of the JSON base file
    #[arg(long, global = true, default_value = "base.json")]
    pub base: PathBuf,

    /// Records per batch group (overrides ARCHIVER_BATCH_SIZE)
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Plan and report only; no record is created or deleted
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Record usage per table and for the whole base
    Usage,
    /// List records sharing a primary-field value
    FindDuplicates,
    /// Delete every duplicate but the first-created record of each group
    RemoveDuplicates,
    /// Move published records to the archive table
    ArchivePublished {
        /// Continue the failed migration saved beside the base
        #[arg(long)]
        resume: bool,
    },
    /// Move records from the cutoff year or earlier to the archive table
    ArchiveOld {
        /// Newest year to archive (defaults to ARCHIVER_YEAR_CUTOFF)
        #[arg(long)]
        year: Option<i32>,

        /// Continue the failed migration saved beside the base
        #[arg(long)]
        resume: bool,
    },
    /// Delete every record in the archive table
    PurgeArchive,
}

#[derive(Serialize)]
struct DryRun<'a> {
    command: &'a str,
    table: String,
    records: usize,
    ids: Vec<&'a str>,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_dry_run(command: &str, table: String, records: &[Record]) -> anyhow::Result<()> {
    print_json(&DryRun {
        command,
        table,
        records: records.len(),
        ids: records.iter().map(|record| record.id.as_str()).collect(),
    })
}

/// Print the report and fail the process when the run did not complete
fn finish(report: MigrationReport) -> anyhow::Result<()> {
    print_json(&report)?;
    report.into_result()?;
    Ok(())
}

async fn migrate(
    orchestrator: &mut Orchestrator,
    journal: &RunJournal,
    command: &str,
    records: Vec<Record>,
    resume: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    if dry_run {
        let records = match journal.unresolved().await? {
            Some(previous) if resume => previous.unarchived(&records),
            _ => records,
        };
        return print_dry_run(command, orchestrator.source().table_name(), &records);
    }
    let report = match journal.migrate(orchestrator, records, resume).await {
        Err(err @ EngineError::UnresolvedRun { .. }) => {
            let hint = format!("rerun with `{command} --resume` or remove {}", journal.path().display());
            return Err(anyhow::Error::new(err).context(hint));
        }
        result => result?,
    };
    finish(report)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    logging::init_tracing_with_level(Some(&args.log_level));

    let config = EngineConfig::read_env()
        .context("loading configuration")?
        .with_batch_size(args.batch_size)
        .validated()
        .context("validating configuration")?;

    logging::log_startup(&format!("archiver on {}", args.base.display()));
    tracing::debug!(
        "Source '{}', archive '{}', batch size {}",
        config.source_table,
        config.archive_table,
        config.batch_size
    );

    // Cancel between batch groups on Ctrl+C
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("🛑 Received Ctrl+C, stopping after the current batch group");
                signal_token.cancel();
            }
            Err(err) => tracing::error!("❌ Signal handling failed: {}", err),
        }
    });

    let base = JsonBaseHandle::open(&args.base);
    let journal = RunJournal::for_base(&args.base);
    let mut orchestrator = MigrationOrchestrator::from_config(
        base.table(&config.source_table),
        base.table(&config.archive_table),
        TracingReporter,
        &config,
    )?
    .with_cancellation(cancel);

    match args.command {
        Command::Usage => {
            let loaded = base
                .load()
                .await
                .with_context(|| format!("reading {}", args.base.display()))?;
            let report = CapacityReport::build(
                &loaded.name,
                &loaded.table_counts(),
                config.table_record_limit,
                config.base_record_limit,
            )?;
            for usage in report.tables_needing_attention() {
                tracing::warn!(
                    "⚠️ Table '{}' is at {:.1}% of its record limit",
                    usage.table,
                    usage.percent()
                );
            }
            print_json(&report)
        }
        Command::FindDuplicates => print_json(&orchestrator.detect_duplicates().await?),
        Command::RemoveDuplicates => {
            let groups = orchestrator.detect_duplicates().await?;
            if args.dry_run {
                return print_json(&groups);
            }
            let ids = groups.into_iter().flat_map(|group| group.duplicates).collect();
            finish(orchestrator.remove_duplicates(ids).await?)
        }
        Command::ArchivePublished { resume } => {
            let records = orchestrator.plan(&config.published_filter()).await?;
            migrate(&mut orchestrator, &journal, "archive-published", records, resume, args.dry_run).await
        }
        Command::ArchiveOld { year, resume } => {
            let records = orchestrator.plan(&config.old_records_filter(year)).await?;
            migrate(&mut orchestrator, &journal, "archive-old", records, resume, args.dry_run).await
        }
        Command::PurgeArchive => {
            if args.dry_run {
                let records = orchestrator.archive().list_records().await?;
                return print_dry_run("purge-archive", orchestrator.archive().table_name(), &records);
            }
            finish(orchestrator.purge_archive().await?)
        }
    }
}
