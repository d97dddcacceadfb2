use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tally_core::PostId;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub cmd: OptsCmd,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// JSON dump of post records to operate on.
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Alias file: one `canonical,alias1,alias2` line per user.
    #[arg(long)]
    pub aliases: Option<PathBuf>,

    /// Side-thread registry file with a `[threads]` section.
    #[arg(long)]
    pub threads_config: Option<PathBuf>,

    /// Print more output; repeat for debug detail.
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress everything but errors.
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum OptsCmd {
    /// Log the submissions ending at a leaf comment, to csv or sqlite.
    Log {
        leaf_id: PostId,

        /// The number of submissions to log.
        #[arg(long, short = 'n', default_value_t = 1)]
        n_threads: usize,

        /// Keep walking until the chain's first submission.
        #[arg(long, short = 'a')]
        all_counts: bool,

        /// Output directory (csv mode) or database path (sql mode).
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Write to a sqlite database instead of csv files.
        #[arg(long)]
        sql: bool,

        /// Log a side thread: no get validation, sqlite output only.
        #[arg(long, short = 's')]
        side_thread: bool,
    },

    /// Check the thread ending at a leaf comment against a counting rule.
    Validate {
        leaf_id: PostId,

        /// A thread name from the registry whose rule should apply.
        #[arg(long, default_value = "default")]
        rule: String,
    },

    /// Refresh the rows of a directory page from the post dump.
    UpdateDirectory {
        /// The markdown directory page to update.
        directory: PathBuf,

        /// Where to write the updated page; stdout when omitted.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Participation totals for the side-thread chain ending at a leaf.
    StStats {
        leaf_id: PostId,

        /// The number of submissions to include.
        #[arg(long, short = 'n', default_value_t = 1)]
        n_threads: usize,
    },
}
