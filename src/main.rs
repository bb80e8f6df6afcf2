use clap::{CommandFactory, Parser};
use colored::*;
use env_logger::{Builder, Env, Target};
use log::{info, warn};
use novelscan::cli::{Cli, Commands};
use novelscan::config::Config;
use novelscan::error::{NovelscanError, Result};
use novelscan::ingest::{BookRecord, Ingestor};
use novelscan::output_formats::OutputFormatter;
use novelscan::progress::ProgressReporter;
use novelscan::search::{
    SearchEvent, SearchOptions, SearchOrchestrator, SearchRequest, SearchSummary, Searchable,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli)?;

    let start_time = Instant::now();
    info!("Application started with command: {:?}", cli.command);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Import {
            file,
            encoding,
            format,
        } => {
            let ingestor = Ingestor::new(&config)?;
            let reporter = ProgressReporter::new(1);
            let book = import_with_progress(&ingestor, &reporter, &file, encoding.as_deref())?;
            reporter.main_progress.finish_and_clear();
            print!("{}", OutputFormatter::new(format).format_book(&book)?);
        }
        Commands::Preview { file, format } => {
            let ingestor = Ingestor::new(&config)?;
            let preview = ingestor.preview_path(&file)?;
            print!("{}", OutputFormatter::new(format).format_preview(&preview)?);
        }
        Commands::Chapters { file, encoding } => {
            let ingestor = Ingestor::new(&config)?;
            let book = ingestor.ingest_path(&file, encoding.as_deref(), |_, _| {})?;
            if book.chapters.is_empty() {
                println!("{}", "No chapters detected".yellow());
            } else {
                print!("{}", OutputFormatter::new(Default::default()).format_chapters(&book));
            }
        }
        Commands::Search {
            query,
            files,
            mode,
            case_sensitive,
            whole_word,
            regex,
            context,
            max_results,
            per_chapter,
            no_context,
            format,
            metrics,
        } => {
            let defaults = SearchOptions::from(&config.search);
            let options = SearchOptions {
                case_sensitive,
                whole_word,
                use_regex: regex,
                context_length: context.unwrap_or(defaults.context_length),
                max_results: max_results.unwrap_or(defaults.max_results),
                max_results_per_chapter: per_chapter.unwrap_or(defaults.max_results_per_chapter),
            };
            let mode = mode.unwrap_or(config.search.default_mode);

            let ingestor = Ingestor::new(&config)?;
            let reporter = ProgressReporter::new(files.len());
            let mut books: Vec<Arc<dyn Searchable>> = Vec::with_capacity(files.len());
            for file in &files {
                let book = import_with_progress(&ingestor, &reporter, file, None)?;
                books.push(Arc::new(book));
            }

            let orchestrator = SearchOrchestrator::with_config(&config)?;
            let handle = orchestrator.cancel_handle();
            ctrlc::set_handler(move || {
                if let Some(task_id) = handle.current() {
                    handle.cancel(task_id);
                }
            })
            .map_err(|e| NovelscanError::Other(format!("failed to install Ctrl-C handler: {e}")))?;

            let request = SearchRequest::new(books, query.clone())
                .with_options(options)
                .with_mode(mode);
            let task_id = orchestrator.start(request)?;

            let mut summary: Option<SearchSummary> = None;
            for event in orchestrator.events(task_id) {
                reporter.on_search_event(&event);
                match event {
                    SearchEvent::Complete {
                        task_id,
                        results,
                        total_matches,
                        total_chapters_with_matches,
                    } => {
                        summary = Some(SearchSummary {
                            task_id,
                            results,
                            total_matches,
                            total_chapters_with_matches,
                        });
                    }
                    SearchEvent::Cancelled { .. } => warn!("Search cancelled"),
                    _ => {}
                }
            }

            let Some(summary) = summary else {
                reporter.abandon("Cancelled");
                eprintln!("{}", "Search cancelled".yellow());
                return Err(NovelscanError::Cancelled(task_id));
            };
            reporter.finish();

            let formatter = OutputFormatter::new(format).with_context(!no_context);
            print!("{}", formatter.format_search(&summary, &query, mode)?);

            if metrics {
                println!("\n{}", orchestrator.metrics().gather()?);
            }
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "novelscan", &mut std::io::stdout());
        }
    }

    info!(
        "Application finished. Total elapsed time: {:.2?}",
        start_time.elapsed()
    );
    Ok(())
}

fn import_with_progress(
    ingestor: &Ingestor,
    reporter: &ProgressReporter,
    path: &Path,
    encoding: Option<&str>,
) -> Result<BookRecord> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let bar = reporter.create_import_bar(&name);
    let book = ingestor.ingest_path(path, encoding, |stage, percent| {
        reporter.import_stage(&bar, stage, percent)
    })?;
    reporter.finish_import(
        &bar,
        &format!(
            "{} chapters, {}",
            book.metadata.total_chapters, book.metadata.encoding
        ),
    );
    Ok(book)
}

fn setup_logging(cli: &Cli) -> Result<()> {
    let default_level = if cli.verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    if let Some(log_path) = &cli.log {
        if let Some(parent_dir) = log_path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir)?;
            }
        }
        let log_file = fs::File::create(log_path)?;
        builder.target(Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder
        .try_init()
        .map_err(|e| NovelscanError::Other(e.to_string()))?;
    Ok(())
}
