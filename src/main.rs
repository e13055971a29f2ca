//! Translarr - media library subtitle translation
//!
//! Command-line entry point: scans the media library, manages watch rules
//! and settings, and runs translation batches once or on a timer.

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use translarr::app::App;
use translarr::cli::{Args, Commands, EntryAction, SettingsAction, WatchAction};
use translarr::config::Config;
use translarr::jobs::{run_scan_job, run_translation_job};
use translarr::media::select_best_stream;
use translarr::models::{ScanProgress, ScanResult, SubtitleEntry, TranslationProgress, TranslationResult};
use translarr::settings::GEMINI_MODEL;
use translarr::store::EntryRepository;
use translarr::translate::GeminiTranslator;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load config.toml from current directory first
            if Path::new("config.toml").exists() {
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    // Setup logging to both console and file
    setup_logging(args.verbose, &config)?;
    info!("Starting Translarr");

    if let Commands::InitConfig { output } = &args.command {
        config.save_to_file(output)?;
        println!("Configuration written to {}", output.display());
        return Ok(());
    }

    let app = App::init(config).await?;

    match args.command {
        Commands::Scan => {
            let bar = spinner();
            let (tx, mut rx) = mpsc::unbounded_channel::<ScanProgress>();
            let progress_bar = bar.clone();
            let reporter = tokio::spawn(async move {
                while let Some(progress) = rx.recv().await {
                    progress_bar.set_message(progress.to_string());
                }
            });

            let result = run_scan_job(&app.jobs, &app.scanner, Some(tx)).await?;
            let _ = reporter.await;
            bar.finish_and_clear();
            print_scan_result(&result);
        }
        Commands::Translate { batch_size } => {
            let batch_size = batch_size.unwrap_or(app.config.library.batch_size);
            let (tx, mut rx) = mpsc::unbounded_channel::<TranslationProgress>();
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                    .progress_chars("#>-"),
            );
            let progress_bar = bar.clone();
            let reporter = tokio::spawn(async move {
                while let Some(progress) = rx.recv().await {
                    progress_bar.set_length(progress.total_files as u64);
                    progress_bar.set_position(progress.processed_files as u64);
                    progress_bar.set_message(format!("{}: {}", progress.step, progress.current_file));
                }
            });

            let result = run_translation_job(&app.jobs, &app.workflow, batch_size, Some(tx)).await?;
            let _ = reporter.await;
            bar.finish_and_clear();
            print_translation_result(&result);
        }
        Commands::Watch { action } => match action {
            WatchAction::List => {
                let configs = app.watch.watch_configs().await?;
                if configs.is_empty() {
                    println!("No auto-watch rules.");
                }
                for config in configs {
                    println!(
                        "{:<40} {:<20} {}",
                        config.series_name,
                        config.season_name.as_deref().unwrap_or("(all seasons)"),
                        config.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
            WatchAction::Add { series, season } => {
                let updated = app.watch.set_auto_watch(&series, season.as_deref(), true).await?;
                println!("Watching {}; {} entries marked as wanted", series, updated);
            }
            WatchAction::Remove { series, season } => {
                app.watch.set_auto_watch(&series, season.as_deref(), false).await?;
                println!("Stopped watching {}", series);
            }
        },
        Commands::Series => {
            for group in app.watch.series_groups_with_watch_status().await? {
                println!(
                    "{}{}  ({} files, {} wanted, {} processed)",
                    group.series_name,
                    if group.is_watched { " [watched]" } else { "" },
                    group.total_files,
                    group.wanted_files,
                    group.processed_files
                );
                for season in group.seasons {
                    println!(
                        "    {}{}  ({} files, {} wanted, {} processed)",
                        season.season_name,
                        if season.is_watched { " [watched]" } else { "" },
                        season.total_files,
                        season.wanted_files,
                        season.processed_files
                    );
                }
            }
        }
        Commands::Entries { action } => match action {
            EntryAction::List { pending, series } => {
                let entries = app.store.get_all().await?;
                println!("{:<6} {:<5} {:<5} {:<5} {:<5} {}", "Id", "Want", "Done", "Had", "Force", "File");
                println!("{}", "-".repeat(80));
                for entry in entries
                    .iter()
                    .filter(|e| !pending || e.is_eligible())
                    .filter(|e| series.as_deref().is_none_or(|s| e.series == s))
                {
                    print_entry(entry);
                }
            }
            EntryAction::Want { id, unset } => {
                let entry = app.set_entry_flags(id, Some(!unset), None).await?;
                print_entry(&entry);
            }
            EntryAction::Force { id, unset } => {
                let entry = app.set_entry_flags(id, None, Some(!unset)).await?;
                print_entry(&entry);
            }
        },
        Commands::Want { series, season, unset } => {
            let updated = app.watch.bulk_set_wanted(&series, season.as_deref(), !unset).await?;
            println!("Updated {} entries", updated);
        }
        Commands::Stats => {
            let stats = app.library_stats().await?;
            println!("Total files:       {}", stats.total_files);
            println!("Processed:         {}", stats.processed_files);
            println!("Unprocessed:       {}", stats.unprocessed_files);
            println!("Wanted:            {}", stats.wanted_files);
            println!("Already had subs:  {}", stats.already_had_files);
            println!("With errors:       {}", stats.error_files);
            match stats.last_scanned {
                Some(at) => println!("Last scan:         {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("Last scan:         never"),
            }
        }
        Commands::Settings { action } => match action {
            SettingsAction::List => {
                for setting in app.settings.store().all_settings().await? {
                    println!("{:<26} = {}", setting.key, display_value(&setting.key, &setting.value));
                    if let Some(description) = setting.description {
                        println!("{:<26}   {}", "", description);
                    }
                }
            }
            SettingsAction::Get { key } => match app.settings.get(&key).await? {
                Some(value) => println!("{}", value),
                None => anyhow::bail!("Setting {} not found", key),
            },
            SettingsAction::Set { key, value } => {
                app.settings.set(&key, &value).await?;
                println!("{} = {}", key, display_value(&key, &value));
            }
        },
        Commands::Usage { days, model } => {
            let model = match model {
                Some(model) => model,
                None => app.settings.get_required(GEMINI_MODEL).await?,
            };
            let summary = app.usage.summary(&model).await?;
            println!("Model:        {}", summary.model);
            println!("Today:        {}/{}", summary.today, summary.per_day_limit);
            println!("Last minute:  {}/{}", summary.last_minute, summary.per_minute_limit);
            println!("Can request:  {}", summary.allows_request());

            let now = Utc::now();
            let records = app
                .usage
                .usage_stats(now - Duration::days(days.max(1)), now, Some(&model))
                .await?;
            println!("\n{} requests in the last {} day(s)", records.len(), days.max(1));
            for record in records {
                println!("  {}  {}", record.recorded_at.format("%Y-%m-%d %H:%M:%S"), record.model);
            }
        }
        Commands::Streams { file } => {
            let streams = app.extractor.list_subtitle_streams(&file).await?;
            let selected = select_best_stream(&streams).map(|s| s.index);

            println!("{:<3} {:<6} {:<18} {:<6} {:<4} {}", "", "Index", "Codec", "Lang", "SDH", "Title");
            for stream in &streams {
                println!(
                    "{:<3} {:<6} {:<18} {:<6} {:<4} {}",
                    if Some(stream.index) == selected { "=>" } else { "" },
                    stream.index,
                    stream.codec.name(),
                    stream.language_or_und(),
                    if stream.is_sdh() { "yes" } else { "" },
                    stream.title.as_deref().unwrap_or("")
                );
            }
            if selected.is_none() {
                println!("No suitable subtitle stream.");
            }
        }
        Commands::TestApi => {
            let settings = app.settings.translation_settings().await?;
            let translator = GeminiTranslator::new(&app.config.translate)?;
            let reply = translator.test_connection(&settings).await?;
            println!("Gemini model {} replied: {}", settings.model, reply.trim());
        }
        Commands::Daemon => {
            app.extractor.check_availability()?;
            Arc::new(app).run_daemon().await?;
        }
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool, config: &Config) -> Result<()> {
    // Create log directory
    let log_dir = config.data_dir().join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "translarr.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("translarr.log").display()
    );

    Ok(())
}

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    bar
}

/// Hide secrets when echoing settings
fn display_value(key: &str, value: &str) -> String {
    if key.to_lowercase().contains("apikey") && !value.is_empty() {
        format!("{}…", value.chars().take(4).collect::<String>())
    } else {
        value.to_string()
    }
}

fn print_entry(entry: &SubtitleEntry) {
    let flag = |set: bool| if set { "x" } else { "" };
    println!(
        "{:<6} {:<5} {:<5} {:<5} {:<5} {}",
        entry.id,
        flag(entry.is_wanted),
        flag(entry.is_processed),
        flag(entry.already_had),
        flag(entry.force_process),
        entry.file_path
    );
    if let Some(message) = &entry.error_message {
        println!("{:<6} {}", "", message);
    }
}

fn print_scan_result(result: &ScanResult) {
    println!(
        "Scan finished in {:.1}s: {} new, {} updated, {} removed, {} errors",
        result.duration.as_secs_f64(),
        result.new_files,
        result.updated_files,
        result.removed_files,
        result.error_files
    );
    for error in &result.errors {
        println!("  {}", error);
    }
}

fn print_translation_result(result: &TranslationResult) {
    println!(
        "Translation finished in {:.1}s: {} translated, {} skipped (no subtitles), {} errors",
        result.duration.as_secs_f64(),
        result.success_count,
        result.skipped_no_subtitles,
        result.error_count
    );
    for error in &result.errors {
        println!("  {}", error);
    }
}
