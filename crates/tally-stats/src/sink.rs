//! Reference serialisations: per-thread CSV files and the sqlite log.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use snafu::{ResultExt, Snafu};
use tally_core::{AliasTable, CountRecord, PostRecord};
use tracing::{debug, warn};

const LOG_TARGET: &str = "tally::sink";

#[derive(Debug, Snafu)]
pub enum SinkError {
    #[snafu(display("database operation failed: {source}"))]
    Database { source: rusqlite::Error },
    #[snafu(display("writing csv failed: {source}"))]
    Csv { source: csv::Error },
    #[snafu(display("writing output failed: {source}"))]
    Io { source: std::io::Error },
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Write one thread's validated history as CSV: a title comment, then one
/// row per count in ascending order.
pub fn write_thread_csv<W: Write>(
    out: &mut W,
    title: &str,
    records: &[CountRecord],
) -> SinkResult<()> {
    writeln!(out, "# {title}").context(IoSnafu)?;
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(["count", "username", "timestamp", "comment_id", "submission_id"])
        .context(CsvSnafu)?;
    for record in records {
        writer
            .write_record([
                record.position.to_string(),
                record.author.name().to_owned(),
                record.timestamp.as_secs().to_string(),
                record.id.to_string(),
                record.root_id.to_string(),
            ])
            .context(CsvSnafu)?;
    }
    writer.flush().context(IoSnafu)?;
    Ok(())
}

/// Appends submissions and their comments to a sqlite database, keeping a
/// checkpoint of the newest logged submission per side thread.
pub struct ThreadLogger {
    conn: Connection,
    side_thread_id: Option<String>,
    known_submissions: HashSet<String>,
    last_checkpoint: Option<String>,
}

impl ThreadLogger {
    pub fn open(path: &Path, side_thread_id: Option<String>) -> SinkResult<Self> {
        let conn = Connection::open(path).context(DatabaseSnafu)?;
        Self::with_connection(conn, side_thread_id)
    }

    pub fn open_in_memory(side_thread_id: Option<String>) -> SinkResult<Self> {
        let conn = Connection::open_in_memory().context(DatabaseSnafu)?;
        Self::with_connection(conn, side_thread_id)
    }

    fn with_connection(conn: Connection, side_thread_id: Option<String>) -> SinkResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS submissions (
                submission_id TEXT PRIMARY KEY,
                username TEXT,
                timestamp INTEGER,
                title TEXT,
                body TEXT,
                base_count INTEGER,
                thread_id TEXT NULL
            );
            CREATE TABLE IF NOT EXISTS comments (
                position INTEGER,
                username TEXT,
                timestamp INTEGER,
                comment_id TEXT PRIMARY KEY,
                submission_id TEXT,
                body TEXT
            );
            CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id TEXT,
                submission_id TEXT
            );
            CREATE TABLE IF NOT EXISTS counters (
                username TEXT,
                canonical_username TEXT,
                is_mod INTEGER,
                is_banned INTEGER
            );",
        )
        .context(DatabaseSnafu)?;
        let mut logger = Self {
            conn,
            side_thread_id,
            known_submissions: HashSet::new(),
            last_checkpoint: None,
        };
        logger.load_state()?;
        Ok(logger)
    }

    fn load_state(&mut self) -> SinkResult<()> {
        let known: Result<HashSet<String>, rusqlite::Error> = match &self.side_thread_id {
            Some(thread_id) => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT submission_id FROM submissions WHERE thread_id = ?1")
                    .context(DatabaseSnafu)?;
                let rows = stmt
                    .query_map(params![thread_id], |row| row.get(0))
                    .context(DatabaseSnafu)?;
                rows.collect()
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT submission_id FROM submissions")
                    .context(DatabaseSnafu)?;
                let rows = stmt.query_map([], |row| row.get(0)).context(DatabaseSnafu)?;
                rows.collect()
            }
        };
        self.known_submissions = known.context(DatabaseSnafu)?;
        self.last_checkpoint = match &self.side_thread_id {
            Some(thread_id) => self
                .conn
                .query_row(
                    "SELECT submission_id FROM checkpoints WHERE thread_id = ?1",
                    params![thread_id],
                    |row| row.get(0),
                )
                .optional()
                .context(DatabaseSnafu)?,
            None => self
                .conn
                .query_row(
                    "SELECT submission_id FROM checkpoints ORDER BY rowid DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()
                .context(DatabaseSnafu)?,
        };
        if self.last_checkpoint.is_none() {
            debug!(target: LOG_TARGET, "no previous checkpoint found");
        }
        Ok(())
    }

    pub fn last_checkpoint(&self) -> Option<&str> {
        self.last_checkpoint.as_deref()
    }

    pub fn is_already_logged(&self, submission_id: &str) -> bool {
        self.known_submissions.contains(submission_id)
    }

    /// Save one submission and its validated history.
    pub fn log_thread(
        &mut self,
        root: &PostRecord,
        records: &[CountRecord],
        base_count: Option<u128>,
    ) -> SinkResult<()> {
        if self.is_already_logged(root.id.as_str()) {
            warn!(target: LOG_TARGET, submission = %root.id, "submission already logged");
            return Ok(());
        }
        let tx = self.conn.transaction().context(DatabaseSnafu)?;
        tx.execute(
            "INSERT INTO submissions
                (submission_id, username, timestamp, title, body, base_count, thread_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                root.id.as_str(),
                root.author.name(),
                root.timestamp.as_secs() as i64,
                root.title,
                root.body,
                base_count.map(|count| count as i64),
                self.side_thread_id,
            ],
        )
        .context(DatabaseSnafu)?;
        for record in records {
            tx.execute(
                "INSERT OR REPLACE INTO comments
                    (position, username, timestamp, comment_id, submission_id, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.position as i64,
                    record.author.name(),
                    record.timestamp.as_secs() as i64,
                    record.id.as_str(),
                    record.root_id.as_str(),
                    record.body,
                ],
            )
            .context(DatabaseSnafu)?;
        }
        tx.commit().context(DatabaseSnafu)?;
        self.known_submissions.insert(root.id.to_string());
        Ok(())
    }

    /// Point the checkpoint at the newest logged submission.
    pub fn update_checkpoint(&mut self) -> SinkResult<()> {
        let newest: Option<String> = match &self.side_thread_id {
            Some(thread_id) => self
                .conn
                .query_row(
                    "SELECT submission_id FROM submissions WHERE thread_id = ?1
                     ORDER BY timestamp DESC LIMIT 1",
                    params![thread_id],
                    |row| row.get(0),
                )
                .optional()
                .context(DatabaseSnafu)?,
            None => self
                .conn
                .query_row(
                    "SELECT submission_id FROM submissions ORDER BY timestamp DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()
                .context(DatabaseSnafu)?,
        };
        let Some(newest) = newest else {
            return Ok(());
        };
        let thread_id = self.side_thread_id.as_deref();
        self.conn
            .execute(
                "DELETE FROM checkpoints WHERE thread_id IS ?1",
                params![thread_id],
            )
            .context(DatabaseSnafu)?;
        self.conn
            .execute(
                "INSERT INTO checkpoints (thread_id, submission_id) VALUES (?1, ?2)",
                params![thread_id, newest],
            )
            .context(DatabaseSnafu)?;
        self.last_checkpoint = Some(newest);
        Ok(())
    }

    /// Rebuild the counters rollup from the logged comments.
    pub fn update_counters_table(&mut self, aliases: &AliasTable) -> SinkResult<()> {
        let usernames: Vec<String> = {
            let mut stmt = self
                .conn
                .prepare("SELECT DISTINCT username FROM comments")
                .context(DatabaseSnafu)?;
            let rows = stmt
                .query_map([], |row| row.get(0))
                .context(DatabaseSnafu)?;
            rows.collect::<Result<_, _>>().context(DatabaseSnafu)?
        };
        let tx = self.conn.transaction().context(DatabaseSnafu)?;
        tx.execute("DELETE FROM counters", []).context(DatabaseSnafu)?;
        for username in usernames {
            tx.execute(
                "INSERT INTO counters (username, canonical_username, is_mod, is_banned)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    username,
                    aliases.canonical(&username),
                    aliases.is_mod(&username),
                    aliases.is_ignored(&username),
                ],
            )
            .context(DatabaseSnafu)?;
        }
        tx.commit().context(DatabaseSnafu)?;
        Ok(())
    }
}
