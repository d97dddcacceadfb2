//! Pacing and turn-taking rules.
//!
//! A rule looks at the `(author, timestamp)` sequence of a thread and marks
//! each record valid or not. The first record of a history is always valid:
//! a validation window may start anywhere in a thread, and whatever came
//! before it has already been judged.

use std::collections::HashMap;

use tally_core::CountRecord;

/// The slice of a count a rule can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPost<'a> {
    pub author: &'a str,
    pub timestamp: u64,
}

impl<'a> From<&'a CountRecord> for HistoryPost<'a> {
    fn from(record: &'a CountRecord) -> Self {
        Self {
            author: record.author.name(),
            timestamp: record.timestamp.as_secs(),
        }
    }
}

impl<'a> From<(&'a str, u64)> for HistoryPost<'a> {
    fn from((author, timestamp): (&'a str, u64)) -> Self {
        Self { author, timestamp }
    }
}

/// Turn-taking plus minimum-gap constraints, the workhorse of most threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountingRule {
    /// A counter must wait for this many others before counting again;
    /// `None` means once per thread.
    pub wait: Option<u32>,
    /// Minimum seconds between consecutive counts.
    pub thread_secs: u64,
    /// Minimum seconds between two counts by the same person.
    pub user_secs: u64,
}

impl Default for CountingRule {
    fn default() -> Self {
        Self {
            wait: Some(1),
            thread_secs: 0,
            user_secs: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Counting(CountingRule),
    /// A count must come either quickly or after a long pause; thresholds
    /// are configuration, not convention.
    FastOrSlow { fast_secs: u64, slow_secs: u64 },
    /// Everyone counts exactly twice before someone else takes over.
    OnlyDoubleCounting,
}

impl Default for Rule {
    fn default() -> Self {
        Rule::Counting(CountingRule::default())
    }
}

impl Rule {
    pub fn wait(n: u32) -> Self {
        Rule::Counting(CountingRule {
            wait: Some(n),
            ..CountingRule::default()
        })
    }

    pub fn once_per_thread() -> Self {
        Rule::Counting(CountingRule {
            wait: None,
            ..CountingRule::default()
        })
    }

    pub fn time_gap(thread_secs: u64, user_secs: u64) -> Self {
        Rule::Counting(CountingRule {
            thread_secs,
            user_secs,
            ..CountingRule::default()
        })
    }

    /// Validity mask aligned with the history, `true` for valid records.
    pub fn is_valid(&self, history: &[HistoryPost<'_>]) -> Vec<bool> {
        let mut mask = match self {
            Rule::Counting(rule) => counting_mask(rule, history),
            Rule::FastOrSlow {
                fast_secs,
                slow_secs,
            } => fast_or_slow_mask(*fast_secs, *slow_secs, history),
            Rule::OnlyDoubleCounting => double_counting_mask(history),
        };
        if let Some(first) = mask.first_mut() {
            *first = true;
        }
        mask
    }

    /// How much history is needed ahead of one new record to evaluate it;
    /// `None` when the whole thread is needed.
    pub fn history_window(&self) -> Option<usize> {
        match self {
            Rule::Counting(CountingRule {
                wait: Some(k),
                user_secs: 0,
                ..
            }) => Some(*k as usize + 1),
            Rule::Counting(_) => None,
            Rule::FastOrSlow { .. } => Some(2),
            Rule::OnlyDoubleCounting => Some(4),
        }
    }
}

fn counting_mask(rule: &CountingRule, history: &[HistoryPost<'_>]) -> Vec<bool> {
    let mut mask = vec![true; history.len()];
    let mut last_seen: HashMap<&str, usize> = HashMap::new();
    for (i, post) in history.iter().enumerate() {
        let mut ok = true;
        let previous_own = last_seen.get(post.author).copied();
        match (rule.wait, previous_own) {
            (Some(k), Some(j)) => ok &= i - j > k as usize,
            (None, Some(_)) => ok = false,
            (_, None) => {}
        }
        if rule.thread_secs > 0 && i > 0 {
            ok &= post.timestamp.saturating_sub(history[i - 1].timestamp) >= rule.thread_secs;
        }
        if rule.user_secs > 0 {
            if let Some(j) = previous_own {
                ok &= post.timestamp.saturating_sub(history[j].timestamp) >= rule.user_secs;
            }
        }
        mask[i] = ok;
        last_seen.insert(post.author, i);
    }
    mask
}

fn fast_or_slow_mask(fast_secs: u64, slow_secs: u64, history: &[HistoryPost<'_>]) -> Vec<bool> {
    let mut mask = vec![true; history.len()];
    for i in 1..history.len() {
        let gap = history[i].timestamp.saturating_sub(history[i - 1].timestamp);
        mask[i] = gap < fast_secs || gap > slow_secs;
    }
    mask
}

/// Pair up each author's successive counts: the first with the second, the
/// third with the fourth, and so on. A count whose pair never completes is
/// a violation, and so is a pair that follows the same author's previous
/// pair with nothing in between.
fn double_counting_mask(history: &[HistoryPost<'_>]) -> Vec<bool> {
    let mut mask = vec![true; history.len()];
    let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, post) in history.iter().enumerate() {
        positions.entry(post.author).or_default().push(i);
    }
    for own in positions.values() {
        let mut previous_pair_end: Option<usize> = None;
        for pair in own.chunks(2) {
            match pair {
                [first, second] => {
                    if *first > 0 && previous_pair_end == Some(first - 1) {
                        mask[*first] = false;
                        mask[*second] = false;
                    }
                    previous_pair_end = Some(*second);
                }
                [lone] => mask[*lone] = false,
                _ => unreachable!("chunks(2) yields one or two items"),
            }
        }
    }
    mask
}
