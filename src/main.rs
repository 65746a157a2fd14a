//! xv - X/Twitter stream-archive importer CLI
//!
//! Main entry point for the xv command-line tool.

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info};

use xv::cli::{Cli, Commands, CompletionsArgs, ImportArgs, ScanArgs, UsersArgs};
use xv::codec::KeyFamily;
use xv::config::Config;
use xv::error::{Result, XvError, format_error};
use xv::importer::{EntryOutcome, Importer};
use xv::model::Item;
use xv::pipeline::{self, PipelineOptions};
use xv::profiles::{self, ProfileImporter};
use xv::store::Store;
use xv::{Archive, collect_archives, format_bytes, format_number, format_number_usize};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = match Config::load_with(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{}", render_error("Configuration error", &error));
            return ExitCode::FAILURE;
        }
    };

    if cli.verbose || cli.quiet {
        xv::logging::init_cli_logging(cli.quiet, cli.verbose);
    } else {
        let mut log = config.log_config();
        log.colors = !cli.no_color;
        xv::logging::init_logging(&log);
    }

    let outcome = match &cli.command {
        Commands::Import(args) => cmd_import(&cli, &config, args),
        Commands::Users(args) => cmd_users(&cli, &config, args),
        Commands::Scan(args) => cmd_scan(&config, args),
        Commands::Stats => cmd_stats(&cli, &config),
        Commands::Completions(args) => cmd_completions(args.clone()),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!(
                "{}",
                "Some entries failed to import; re-run to retry exactly those entries.".yellow()
            );
            ExitCode::FAILURE
        }
        Err(error) => {
            eprintln!("{}", render_error("Command failed", &error));
            ExitCode::FAILURE
        }
    }
}

fn render_error(title: &str, error: &XvError) -> String {
    let suggestions: Vec<&str> = error.suggestion().into_iter().collect();
    format_error(title, &error.to_string(), &suggestions)
}

fn store_path(cli: &Cli, config: &Config) -> PathBuf {
    cli.store.clone().unwrap_or_else(|| config.store_path())
}

/// Totals accumulated across every archive of one import run.
#[derive(Default)]
struct RunTotals {
    imported: usize,
    skipped: usize,
    failed: usize,
    lines: u64,
    failed_lines: u64,
    written: u64,
    full_statuses: u64,
}

fn cmd_import(cli: &Cli, config: &Config, args: &ImportArgs) -> Result<bool> {
    let store_path = store_path(cli, config);
    let archives = collect_archives(&args.archives)?;
    if archives.is_empty() {
        println!("{}", "No .zip or .tar archives found.".yellow());
        return Ok(true);
    }

    let mut options = config.pipeline_options();
    if args.jobs > 0 {
        options.workers = args.jobs;
    }
    if let Some(capacity) = args.queue_capacity {
        options.queue_capacity = capacity;
    }
    if let Some(hours) = args.deadline_hours {
        options.deadline = Duration::from_secs(hours * 3600);
    }

    let store = Store::open(&store_path)?;
    let mut importer = Importer::new(&store)?;

    if !cli.quiet {
        println!("{}", "Importing stream archives...".bold().cyan());
        println!("  Store: {}", store_path.display());
        println!("  Archives: {}", archives.len());
        println!();
    }

    let started = Instant::now();
    let mut totals = RunTotals::default();

    for path in &archives {
        import_archive(&mut importer, path, &options, cli.quiet, &mut totals)?;
    }

    if !args.no_compact {
        info!("compacting store");
        if !cli.quiet {
            println!("  Compacting store...");
        }
        store.compact();
    }

    if !cli.quiet {
        println!();
        if totals.failed == 0 {
            println!("{}", "Import complete!".bold().green());
        } else {
            println!("{}", "Import finished with failures.".bold().yellow());
        }
        println!(
            "  Entries imported: {}",
            format_number_usize(totals.imported).cyan()
        );
        println!(
            "  Entries skipped:  {}",
            format_number_usize(totals.skipped)
        );
        if totals.failed > 0 {
            println!(
                "  Entries failed:   {}",
                format_number_usize(totals.failed).red()
            );
        }
        println!(
            "  Lines decoded:    {} ({} failed)",
            format_number(totals.lines - totals.failed_lines).cyan(),
            format_number(totals.failed_lines)
        );
        println!(
            "  Statuses stored:  {}",
            format_number(totals.full_statuses).cyan()
        );
        println!("  Rows written:     {}", format_number(totals.written));
        println!("  Elapsed: {:.1}s", started.elapsed().as_secs_f64());
    }

    Ok(totals.failed == 0)
}

fn import_archive(
    importer: &mut Importer<'_>,
    path: &Path,
    options: &PipelineOptions,
    quiet: bool,
    totals: &mut RunTotals,
) -> Result<()> {
    let archive = Archive::open(path)?;
    let name = archive.name().to_string();
    let entries = archive.entries()?;
    let completed = importer.completed_entries_for(&name);
    let pending = entries
        .iter()
        .filter(|entry| !completed.contains(entry.path()))
        .count();

    if !quiet {
        println!(
            "{} {} ({} entries, {} already imported)",
            "→".bold(),
            name,
            entries.len(),
            entries.len() - pending
        );
    }

    let bar = progress_bar(pending as u64, quiet);
    let mut failed_here = 0usize;

    pipeline::run(
        &archive,
        options,
        |entry| completed.contains(entry.path()),
        |result| {
            totals.lines += result.line_count() as u64;
            totals.failed_lines += result.failed_lines() as u64;
            match importer.import(&name, &result) {
                Ok(EntryOutcome::Imported {
                    written,
                    full_statuses,
                }) => {
                    totals.imported += 1;
                    totals.written += written;
                    totals.full_statuses += full_statuses;
                }
                Ok(EntryOutcome::AlreadyComplete) => totals.skipped += 1,
                Err(error) if error.is_entry_scoped() => {
                    failed_here += 1;
                    error!(archive = %name, entry = result.path(), %error, "entry failed, continuing");
                }
                Err(error) => return Err(error),
            }
            bar.inc(1);
            Ok(true)
        },
    )?;

    bar.finish_and_clear();
    totals.failed += failed_here;
    if !quiet {
        if failed_here == 0 {
            println!("  {} {}", "✓".green(), name);
        } else {
            println!(
                "  {} {} ({} entries failed)",
                "✗".red(),
                name,
                failed_here
            );
        }
    }
    Ok(())
}

fn cmd_users(cli: &Cli, config: &Config, args: &UsersArgs) -> Result<bool> {
    let store_path = args
        .profile_store
        .clone()
        .unwrap_or_else(|| config.profile_store_path());
    let archives = collect_archives(&args.archives)?;
    if archives.is_empty() {
        println!("{}", "No .zip or .tar archives found.".yellow());
        return Ok(true);
    }

    let filter = match &args.filter {
        Some(path) => Some(profiles::load_filter(path)?),
        None => None,
    };
    let mut options = config.pipeline_options();
    if args.jobs > 0 {
        options.workers = args.jobs;
    }

    let store = Store::open(&store_path)?;
    let mut importer = ProfileImporter::new(&store, filter);

    if !cli.quiet {
        println!("{}", "Importing author profiles...".bold().cyan());
        println!("  Profile store: {}", store_path.display());
        println!();
    }

    for path in &archives {
        let archive = Archive::open(path)?;
        let name = archive.name().to_string();
        let entry_count = archive.entries()?.len();
        let bar = progress_bar(entry_count as u64, cli.quiet);

        pipeline::run(
            &archive,
            &options,
            |_| false,
            |result| {
                importer.import(&result)?;
                bar.inc(1);
                Ok(true)
            },
        )?;

        bar.finish_and_clear();
        if !cli.quiet {
            println!("  {} {}", "✓".green(), name);
        }
    }

    if !cli.quiet {
        println!();
        println!("{}", "Profile import complete!".bold().green());
        println!(
            "  Profiles written: {}",
            format_number(importer.written()).cyan()
        );
        println!(
            "  Already present:  {}",
            format_number(importer.already_present())
        );
        if importer.filtered() > 0 {
            println!(
                "  Filtered authors: {}",
                format_number(importer.filtered())
            );
        }
        if importer.incomplete() > 0 {
            println!(
                "  Incomplete users: {}",
                format_number(importer.incomplete())
            );
        }
    }
    Ok(true)
}

fn cmd_scan(config: &Config, args: &ScanArgs) -> Result<bool> {
    let archives = collect_archives(&args.archives)?;
    if archives.is_empty() {
        println!("{}", "No .zip or .tar archives found.".yellow());
        return Ok(true);
    }

    let mut options = config.pipeline_options();
    if args.jobs > 0 {
        options.workers = args.jobs;
    }

    let stdout = io::stdout();
    let mut tweets = 0u64;
    let mut deletes = 0u64;
    let mut failed = 0u64;

    for path in &archives {
        let archive = Archive::open(path)?;
        pipeline::run(
            &archive,
            &options,
            |_| false,
            |result| {
                let mut entry_tweets = 0u64;
                let mut entry_deletes = 0u64;
                for item in result.decoded() {
                    match item {
                        Item::Tweet(_) => entry_tweets += 1,
                        Item::Delete(_) => entry_deletes += 1,
                    }
                }

                if args.json {
                    let mut out = stdout.lock();
                    for item in result.decoded() {
                        serde_json::to_writer(&mut out, &item_json(item))?;
                        out.write_all(b"\n")?;
                    }
                } else {
                    println!(
                        "  {} {} lines, {} tweets, {} deletes, {} failed",
                        result.path().dimmed(),
                        format_number_usize(result.line_count()),
                        format_number(entry_tweets),
                        format_number(entry_deletes),
                        format_number_usize(result.failed_lines())
                    );
                }

                tweets += entry_tweets;
                deletes += entry_deletes;
                failed += result.failed_lines() as u64;
                Ok(true)
            },
        )?;
    }

    if !args.json {
        println!();
        println!(
            "{} {} tweets, {} deletes, {} failed lines",
            "Total:".bold(),
            format_number(tweets).cyan(),
            format_number(deletes).cyan(),
            format_number(failed)
        );
    }
    Ok(true)
}

/// Normalized single-line JSON for one decoded item.
fn item_json(item: &Item) -> serde_json::Value {
    match item {
        Item::Tweet(tweet) => serde_json::json!({
            "type": "tweet",
            "status_id": tweet.status_id(),
            "user_id": tweet.user_id(),
            "screen_name": tweet.screen_name(),
            "timestamp_ms": tweet.timestamp_millis(),
        }),
        Item::Delete(delete) => serde_json::json!({
            "type": "delete",
            "status_id": delete.status_id,
            "user_id": delete.user_id,
            "timestamp_ms": delete.timestamp_millis(),
        }),
    }
}

fn cmd_stats(cli: &Cli, config: &Config) -> Result<bool> {
    let store_path = store_path(cli, config);
    if !store_path.exists() {
        return Err(XvError::invalid_argument(format!(
            "no store at '{}'; run 'xv import' first",
            store_path.display()
        )));
    }
    let store = Store::open(&store_path)?;

    println!("{}", "Store Statistics".bold().cyan());
    println!("{}", "─".repeat(40));
    for (label, family) in [
        ("User aliases:", KeyFamily::UserAlias),
        ("Screen names:", KeyFamily::ScreenName),
        ("Status facts:", KeyFamily::Status),
        ("Deletions:", KeyFamily::Delete),
        ("Completed entries:", KeyFamily::CompletedEntry),
    ] {
        println!(
            "  {:<20} {:>12}",
            label,
            format_number(store.count_family(family)?)
        );
    }
    println!("{}", "─".repeat(40));
    println!(
        "  {:<20} {:>12}",
        "Estimated keys:",
        format_number(store.estimated_keys()?)
    );
    println!(
        "  {:<20} {:>12}",
        "Data size:",
        format_bytes(store.sst_bytes()?)
    );

    Ok(true)
}

fn cmd_completions(args: CompletionsArgs) -> Result<bool> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "xv", &mut io::stdout());
    Ok(true)
}

fn progress_bar(total: u64, quiet: bool) -> ProgressBar {
    if quiet || total == 0 {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("##-"),
    );
    bar
}
