//! The whole pipeline over one plain decimal thread: walk, form-check,
//! rule-check, position, tabulate.

use tally_core::{AliasTable, Author, ParentId, PostRecord, Timestamp};
use tally_nav::{ChainWalker, PostArena};
use tally_stats::{base_count, count_records, Participation};
use tally_threads::encode::to_radix;
use tally_threads::registry::Registry;
use tally_threads::rules::HistoryPost;

fn id36(value: u128) -> tally_core::PostId {
    to_radix(value, 36).parse().expect("base-36 id")
}

fn basic_thread(n: u128) -> (PostArena, tally_core::PostId) {
    let mut arena = PostArena::default();
    let root = PostRecord {
        id: id36(500),
        parent_id: ParentId::Root,
        root_id: id36(500),
        author: Author::from("op"),
        timestamp: Timestamp::from(0),
        body: String::new(),
        title: Some("counting thread".to_owned()),
    };
    let root_id = root.id.clone();
    arena.insert(root);
    let mut parent = root_id.clone();
    let mut leaf = root_id.clone();
    for i in 1..=n {
        let record = PostRecord {
            id: id36(1000 + i),
            parent_id: ParentId::Post(parent.clone()),
            root_id: root_id.clone(),
            author: Author::from(if i % 2 == 1 { "alice" } else { "bob" }),
            timestamp: Timestamp::from(i as u64 * 10),
            body: i.to_string(),
            title: None,
        };
        parent = record.id.clone();
        leaf = record.id.clone();
        arena.insert(record);
    }
    (arena, leaf)
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn a_basic_decimal_thread_checks_out_end_to_end() {
    let (arena, leaf) = basic_thread(1000);
    let walker = ChainWalker::new(&arena);
    let walk = walker.walk_up_thread(&leaf).await.expect("walk");
    assert_eq!(walk.records.len(), 1000);

    let registry = Registry::new();
    let thread = registry.get("decimal");

    // Every body is a well-formed count.
    assert!(walk.records.iter().all(|record| thread.looks_like_count(&record.body)));

    // Alternating authors never violate the default rule.
    let history: Vec<HistoryPost<'_>> = walk
        .records
        .iter()
        .map(|record| HistoryPost {
            author: record.author.name(),
            timestamp: record.timestamp.as_secs(),
        })
        .collect();
    assert!(thread.rule.is_valid(&history).iter().all(|&ok| ok));

    // The encoder recovers positions 1..=1000 and the basecount is zero.
    let zero_based = count_records(walk.records.iter(), 0);
    assert_eq!(base_count(&zero_based), 0);
    for (index, record) in zero_based.iter().enumerate() {
        assert_eq!(
            thread.body_to_count(&record.body).expect("count"),
            index as u128 + 1
        );
    }

    // Participation splits evenly between the two counters.
    let stats = Participation::tabulate("counting thread", &zero_based, &AliasTable::default());
    assert_eq!(
        stats.rows,
        vec![("alice".to_owned(), 500), ("bob".to_owned(), 500)]
    );
    assert_eq!(stats.get_author, "bob");
}
