//! Locating uncorrected mistakes in a counting history.

use tally_core::CountRecord;
use tally_threads::registry::SideThread;

/// Records that introduced an error which was never corrected.
///
/// Errors are defined narrowly to keep false positives down. A record is
/// flagged when its count is not one more than the previous count, not two
/// more than the one before that, and does not match where the thread
/// position says it should be. Only records after the last correct count
/// are considered; earlier mistakes were evidently fixed along the way.
pub fn find_errors<'a>(records: &'a [CountRecord], thread: &SideThread) -> Vec<&'a CountRecord> {
    let counts: Vec<Option<u128>> = records
        .iter()
        .map(|record| thread.body_to_count(&record.body).ok())
        .collect();
    let Some(first) = counts.first().copied().flatten() else {
        return Vec::new();
    };
    let off_position: Vec<bool> = counts
        .iter()
        .enumerate()
        .map(|(index, count)| match count {
            Some(count) => first + index as u128 != *count,
            None => false,
        })
        .collect();
    let last_correct = off_position.iter().rposition(|&off| !off).unwrap_or(0);
    records
        .iter()
        .enumerate()
        .filter(|&(index, _)| {
            if index <= last_correct || !off_position[index] {
                return false;
            }
            let count = counts[index];
            let step_one = index >= 1
                && matches!((count, counts[index - 1]), (Some(a), Some(b)) if a == b + 1);
            let step_two = index >= 2
                && matches!((count, counts[index - 2]), (Some(a), Some(b)) if a == b + 2);
            !step_one && !step_two
        })
        .map(|(_, record)| record)
        .collect()
}

#[cfg(test)]
mod tests {
    use tally_core::{Author, Timestamp};
    use tally_threads::registry::Registry;

    use super::*;

    fn history(bodies: &[&str]) -> Vec<CountRecord> {
        bodies
            .iter()
            .enumerate()
            .map(|(index, body)| CountRecord {
                position: index as u128 + 1,
                author: Author::from("a"),
                timestamp: Timestamp::from(index as u64),
                id: format!("{}", index + 100).parse().expect("id"),
                root_id: "1".parse().expect("id"),
                body: (*body).to_owned(),
            })
            .collect()
    }

    #[test]
    fn a_clean_thread_has_no_errors() {
        let registry = Registry::new();
        let thread = registry.get("decimal");
        let records = history(&["10", "11", "12", "13"]);
        assert!(find_errors(&records, thread).is_empty());
    }

    #[test]
    fn an_uncorrected_jump_is_flagged() {
        let registry = Registry::new();
        let thread = registry.get("decimal");
        let records = history(&["10", "11", "13", "14"]);
        let errors = find_errors(&records, thread);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].body, "13");
    }

    #[test]
    fn corrected_mistakes_are_forgiven() {
        // The 13 skips 12 but the next count returns to where the thread
        // should be, so nothing after the correction is flagged.
        let registry = Registry::new();
        let thread = registry.get("decimal");
        let records = history(&["10", "11", "13", "13", "14"]);
        let errors = find_errors(&records, thread);
        assert!(errors.iter().all(|record| record.body != "14"));
    }
}
