mod cli;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use cli::{GlobalOpts, Opts, OptsCmd};
use snafu::{ResultExt, Snafu};
use tally_core::{AliasTable, PostId};
use tally_nav::source::FetchError;
use tally_nav::{ChainWalker, PostArena, WalkOptions};
use tally_stats::sink::SinkError;
use tally_stats::{base_count, count_records, find_errors, write_thread_csv, Participation, ThreadLogger};
use tally_threads::parsing::{parse_directory_page, DirectoryChunk};
use tally_threads::registry::{Registry, SideThread};
use tally_util_error::FmtCompact as _;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

pub const LOG_TARGET: &str = "tally::cli";

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("reading {path:?} failed: {source}"))]
    ReadInput {
        path: PathBuf,
        source: io::Error,
    },
    #[snafu(display("parsing the post dump failed: {source}"))]
    ParseDump {
        source: serde_json::Error,
    },
    #[snafu(transparent)]
    Fetch {
        source: FetchError,
    },
    #[snafu(transparent)]
    Sink {
        source: SinkError,
    },
    #[snafu(display("writing {path:?} failed: {source}"))]
    WriteOutput {
        path: PathBuf,
        source: io::Error,
    },
}

pub type CliResult<T> = std::result::Result<T, CliError>;

#[tokio::main]
async fn main() -> ExitCode {
    let opts = Opts::parse();
    init_logging(opts.global.verbose, opts.global.quiet);
    match run(opts).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {}", err.fmt_compact());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            _ => LevelFilter::DEBUG,
        }
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();
}

fn read_file(path: &Path) -> CliResult<String> {
    fs::read_to_string(path).context(ReadInputSnafu { path })
}

fn load_arena(global: &GlobalOpts) -> CliResult<PostArena> {
    let text = read_file(&global.input)?;
    let records: Vec<tally_core::PostRecord> =
        serde_json::from_str(&text).context(ParseDumpSnafu)?;
    info!(target: LOG_TARGET, posts = records.len(), "loaded post dump");
    Ok(PostArena::new(records))
}

fn load_registry(global: &GlobalOpts) -> CliResult<Registry> {
    let registry = Registry::new();
    match &global.threads_config {
        Some(path) => Ok(registry.load_thread_ids(&read_file(path)?)),
        None => Ok(registry),
    }
}

fn load_aliases(global: &GlobalOpts) -> CliResult<AliasTable> {
    match &global.aliases {
        Some(path) => Ok(AliasTable::parse(&read_file(path)?)),
        None => Ok(AliasTable::default()),
    }
}

async fn run(opts: Opts) -> CliResult<ExitCode> {
    let arena = load_arena(&opts.global)?;
    let registry = load_registry(&opts.global)?;
    let aliases = load_aliases(&opts.global)?;
    match opts.cmd {
        OptsCmd::Log {
            leaf_id,
            n_threads,
            all_counts,
            output,
            sql,
            side_thread,
        } => {
            let sql = sql || side_thread;
            log_threads(
                &arena, &registry, &aliases, &leaf_id, n_threads, all_counts, output, sql,
                side_thread,
            )
            .await
        }
        OptsCmd::Validate { leaf_id, rule } => {
            validate(&arena, &registry, &aliases, &leaf_id, &rule).await
        }
        OptsCmd::UpdateDirectory { directory, output } => {
            update_directory(&arena, &registry, &directory, output.as_deref())
        }
        OptsCmd::StStats { leaf_id, n_threads } => {
            side_thread_stats(&arena, &registry, &aliases, &leaf_id, n_threads).await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn log_threads(
    arena: &PostArena,
    registry: &Registry,
    aliases: &AliasTable,
    leaf_id: &PostId,
    n_threads: usize,
    all_counts: bool,
    output: Option<PathBuf>,
    sql: bool,
    side_thread: bool,
) -> CliResult<ExitCode> {
    let options = WalkOptions {
        validate_get: !side_thread,
        ..WalkOptions::default()
    };
    let walker = ChainWalker::new(arena).with_options(options);
    let limit = if all_counts { None } else { Some(n_threads) };
    let chain = walker.walk_chain(leaf_id, limit).await?;
    for warning in chain.warnings() {
        warn!(target: LOG_TARGET, %warning, "walk warning");
    }

    let mut logger = if sql {
        let path = output.clone().unwrap_or_else(|| PathBuf::from("counting.sqlite"));
        // Side threads are keyed by their registered name when we have one,
        // falling back to the first submission's id.
        let thread_id = side_thread
            .then(|| {
                chain.threads.first().map(|thread| {
                    registry
                        .name_for_root(&thread.root.id)
                        .map(str::to_owned)
                        .unwrap_or_else(|| thread.root.id.to_string())
                })
            })
            .flatten();
        Some(ThreadLogger::open(&path, thread_id)?)
    } else {
        None
    };

    for thread in &chain.threads {
        let zero_based = count_records(thread.records.iter(), 0);
        let base = base_count(&zero_based);
        let records = count_records(thread.records.iter(), base);
        let title = thread.root.title.clone().unwrap_or_default();
        info!(target: LOG_TARGET, submission = %thread.root.id, base, "logging submission");
        match &mut logger {
            Some(logger) => logger.log_thread(&thread.root, &records, Some(base))?,
            None => {
                let directory = output.clone().unwrap_or_else(|| PathBuf::from("."));
                let path = directory.join(format!("{base}.csv"));
                let mut file = fs::File::create(&path)
                    .context(WriteOutputSnafu { path: path.clone() })?;
                write_thread_csv(&mut file, &title, &records)?;
            }
        }
    }
    if let Some(logger) = &mut logger {
        logger.update_checkpoint()?;
        logger.update_counters_table(aliases)?;
    }
    Ok(ExitCode::SUCCESS)
}

async fn validate(
    arena: &PostArena,
    registry: &Registry,
    aliases: &AliasTable,
    leaf_id: &PostId,
    rule: &str,
) -> CliResult<ExitCode> {
    let thread = registry.get(rule);
    let walker = ChainWalker::new(arena);
    let walk = walker.walk_up_thread(leaf_id).await?;
    // Ignored counters don't take part in the rule at all.
    let counted: Vec<&tally_core::PostRecord> = walk
        .records
        .iter()
        .filter(|record| !aliases.is_ignored(record.author.name()))
        .collect();
    let records = count_records(counted.into_iter(), 0);
    println!(
        "Validating thread {} with the {rule} rule",
        walk.root.title.as_deref().unwrap_or("<untitled>")
    );
    match thread.first_invalid(&records) {
        None => {
            println!("All counts were valid");
            for error in find_errors(&records, thread) {
                println!("Suspect count at {}: {:?}", error.id, error.body);
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(id) => {
            println!("Invalid count found at {id}");
            Ok(ExitCode::from(2))
        }
    }
}

/// Follow replies downward from a comment, always taking the newest reply
/// that still looks like a count.
fn newest_leaf(arena: &PostArena, start: &PostId, thread: &SideThread) -> PostId {
    let mut current = start.clone();
    loop {
        let next = arena
            .children_of(&current)
            .filter(|child| thread.looks_like_count(&child.body))
            .last()
            .map(|child| child.id.clone());
        match next {
            Some(id) => current = id,
            None => return current,
        }
    }
}

fn update_directory(
    arena: &PostArena,
    registry: &Registry,
    directory: &Path,
    output: Option<&Path>,
) -> CliResult<ExitCode> {
    let page = read_file(directory)?;
    let chunks = parse_directory_page(&page);
    let mut rendered = Vec::new();
    for chunk in chunks {
        match chunk {
            DirectoryChunk::Text(text) => {
                if !text.is_empty() {
                    rendered.push(text);
                }
            }
            DirectoryChunk::Table(mut rows) => {
                for row in &mut rows {
                    let thread = registry.for_root(&row.first_submission);
                    let start = row
                        .comment_id
                        .clone()
                        .unwrap_or_else(|| row.submission_id.clone());
                    let leaf = newest_leaf(arena, &start, thread);
                    if leaf != start {
                        info!(
                            target: LOG_TARGET,
                            thread = %row.name,
                            %leaf,
                            "advanced directory row"
                        );
                    }
                    row.comment_id = Some(leaf);
                    if let Some(submission) = arena.get(&row.submission_id) {
                        if let Some(title) = &submission.title {
                            row.title = title.clone();
                        }
                    }
                }
                let mut table = String::from(
                    "Name &amp; Initial Thread|Current Thread|# of Counts\n:--:|:--:|--:",
                );
                for row in &rows {
                    table.push('\n');
                    table.push_str(&row.to_markdown());
                }
                rendered.push(table);
            }
        }
    }
    let updated = rendered.join("\n\n") + "\n";
    match output {
        Some(path) => {
            fs::write(path, updated).context(WriteOutputSnafu { path })?;
        }
        None => print!("{updated}"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn side_thread_stats(
    arena: &PostArena,
    registry: &Registry,
    aliases: &AliasTable,
    leaf_id: &PostId,
    n_threads: usize,
) -> CliResult<ExitCode> {
    let options = WalkOptions {
        validate_get: false,
        ..WalkOptions::default()
    };
    let walker = ChainWalker::new(arena).with_options(options);
    let chain = walker.walk_chain(leaf_id, Some(n_threads)).await?;
    let Some(newest) = chain.threads.last() else {
        println!("No threads found");
        return Ok(ExitCode::SUCCESS);
    };
    let thread = registry.for_root(&newest.root.id);
    let all_records: Vec<&tally_core::PostRecord> = chain.records().collect();
    let counted = count_records(all_records.iter().copied(), 0);
    let valid_counts = counted
        .iter()
        .filter(|record| thread.looks_like_count(&record.body))
        .count();
    let stats = Participation::tabulate(
        newest.root.title.as_deref().unwrap_or("<untitled>"),
        &counted,
        aliases,
    );
    info!(target: LOG_TARGET, valid_counts, "tabulated side thread");
    print!("{}", stats.to_markdown());
    Ok(ExitCode::SUCCESS)
}
