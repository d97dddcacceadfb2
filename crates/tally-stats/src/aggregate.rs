//! Participation tabulations for completed threads.

use std::collections::HashMap;

use itertools::Itertools;
use tally_core::units::{DAY, HOUR, MINUTE};
use tally_core::{AliasTable, CountRecord, PostRecord};
use tally_threads::parsing;

/// Assign chain positions to walked records: the first record sits at
/// `base + 1`, matching the convention that a thread beginning after count
/// 2000 runs 2001..=3000.
pub fn count_records<'a>(
    records: impl IntoIterator<Item = &'a PostRecord>,
    base: u128,
) -> Vec<CountRecord> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| CountRecord {
            position: base + index as u128 + 1,
            author: record.author.clone(),
            timestamp: record.timestamp,
            id: record.id.clone(),
            root_id: record.root_id.clone(),
            body: record.body.clone(),
        })
        .collect()
}

/// Estimate a thread's basecount from its bodies: the median of
/// `parsed count - row index`, rounded to the nearest thousand.
pub fn base_count(records: &[CountRecord]) -> u128 {
    let mut offsets: Vec<i128> = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let count = parsing::find_count_in_text(&record.body, 10).ok()?;
            Some(count as i128 - index as i128)
        })
        .collect();
    if offsets.is_empty() {
        return 0;
    }
    offsets.sort_unstable();
    let median = offsets[offsets.len() / 2];
    let rounded = (median + 500).div_euclid(1000) * 1000;
    rounded.max(0) as u128
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participation {
    /// `(canonical username, counts)`, sorted by counts descending then
    /// username.
    pub rows: Vec<(String, u64)>,
    pub get_author: String,
    /// Who counted right before the get.
    pub assist_author: Option<String>,
    pub total_counts: u64,
    pub elapsed_secs: u64,
    pub title: String,
}

impl Participation {
    /// Tabulate one validated thread. Aliases are applied before counting;
    /// the last record's author is the thread's get.
    pub fn tabulate(title: &str, records: &[CountRecord], aliases: &AliasTable) -> Self {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for record in records {
            *counts.entry(aliases.canonical(record.author.name())).or_insert(0) += 1;
        }
        let rows: Vec<(String, u64)> = counts
            .into_iter()
            .map(|(author, count)| (author.to_owned(), count))
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
            .collect();
        let get_author = records
            .last()
            .map(|record| aliases.canonical(record.author.name()).to_owned())
            .unwrap_or_default();
        let assist_author = records
            .len()
            .checked_sub(2)
            .map(|index| aliases.canonical(records[index].author.name()).to_owned());
        let elapsed_secs = match (records.first(), records.last()) {
            (Some(first), Some(last)) => last.timestamp.since(first.timestamp),
            _ => 0,
        };
        Self {
            rows,
            get_author,
            assist_author,
            total_counts: records.len() as u64,
            elapsed_secs,
            title: title.to_owned(),
        }
    }

    pub fn unique_counters(&self) -> usize {
        self.rows.len()
    }

    /// Elapsed wall-clock as (days, hours, minutes, seconds).
    pub fn elapsed_parts(&self) -> (u64, u64, u64, u64) {
        let days = self.elapsed_secs / DAY;
        let hours = self.elapsed_secs % DAY / HOUR;
        let minutes = self.elapsed_secs % HOUR / MINUTE;
        let seconds = self.elapsed_secs % MINUTE;
        (days, hours, minutes, seconds)
    }

    /// The pipe-separated participation chart consumers expect, with the
    /// get author in bold.
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "Thread Participation Chart for {}\n\nRank|Username|Counts\n---|---|---\n",
            self.title
        );
        for (rank, (author, count)) in self.rows.iter().enumerate() {
            let name = if *author == self.get_author {
                format!("**/u/{author}**")
            } else {
                format!("/u/{author}")
            };
            out.push_str(&format!("{}|{name}|{count}\n", rank + 1));
        }
        let (days, hours, minutes, seconds) = self.elapsed_parts();
        out.push_str(&format!(
            "\nIt took {} counters {days} days {hours} hours {minutes} mins {seconds} secs to complete this thread. Bold is the user with the get\ntotal counts in this chain logged: {}\n",
            self.unique_counters(),
            self.total_counts
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use tally_core::{Author, Timestamp};

    use super::*;

    fn record(position: u128, author: &str, timestamp: u64, body: &str) -> CountRecord {
        CountRecord {
            position,
            author: Author::from(author),
            timestamp: Timestamp::from(timestamp),
            id: format!("{position}").parse().expect("id"),
            root_id: "1".parse().expect("id"),
            body: body.to_owned(),
        }
    }

    fn alternating_thread(n: u128) -> Vec<CountRecord> {
        (1..=n)
            .map(|i| {
                record(
                    i,
                    if i % 2 == 1 { "alice" } else { "bob" },
                    i as u64 * 30,
                    &i.to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn an_alternating_thread_splits_evenly() {
        let records = alternating_thread(1000);
        let stats = Participation::tabulate("thread", &records, &AliasTable::default());
        assert_eq!(
            stats.rows,
            vec![("alice".to_owned(), 500), ("bob".to_owned(), 500)]
        );
        assert_eq!(stats.get_author, "bob");
        assert_eq!(stats.assist_author.as_deref(), Some("alice"));
        assert_eq!(stats.total_counts, 1000);
    }

    #[test]
    fn aliases_merge_before_counting() {
        let aliases = AliasTable::parse("alice,alice_alt\n");
        let mut records = alternating_thread(10);
        records[1].author = Author::from("alice_alt");
        let stats = Participation::tabulate("thread", &records, &aliases);
        assert_eq!(
            stats.rows,
            vec![("alice".to_owned(), 6), ("bob".to_owned(), 4)]
        );
    }

    #[test]
    fn the_markdown_chart_bolds_the_get() {
        let records = alternating_thread(4);
        let stats = Participation::tabulate("counting | 4", &records, &AliasTable::default());
        let chart = stats.to_markdown();
        assert!(chart.starts_with("Thread Participation Chart for counting | 4\n"));
        assert!(chart.contains("Rank|Username|Counts"));
        assert!(chart.contains("1|/u/alice|2"));
        assert!(chart.contains("2|**/u/bob**|2"));
        assert!(chart.contains("2 counters 0 days 0 hours 1 mins 30 secs"));
    }

    #[test]
    fn elapsed_time_splits_into_parts() {
        let records = vec![record(1, "a", 0, "1"), record(2, "b", 90061, "2")];
        let stats = Participation::tabulate("t", &records, &AliasTable::default());
        assert_eq!(stats.elapsed_parts(), (1, 1, 1, 1));
    }

    #[test]
    fn base_counts_come_from_the_median_body() {
        let records: Vec<CountRecord> = (1..=100u128)
            .map(|i| record(i, "a", i as u64, &(2000 + i).to_string()))
            .collect();
        assert_eq!(base_count(&records), 2000);
        // A few garbled bodies don't move the median.
        let mut noisy = records;
        noisy[3].body = "[deleted]".to_owned();
        noisy[40].body = "oops all words".to_owned();
        assert_eq!(base_count(&noisy), 2000);
    }

    #[test]
    fn positions_continue_from_the_base() {
        let posts: Vec<tally_core::PostRecord> = Vec::new();
        assert!(count_records(posts.iter(), 1000).is_empty());
    }
}
