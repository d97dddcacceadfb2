use async_trait::async_trait;
use std::collections::HashMap;

use tally_core::{Author, ParentId, Timestamp};
use tally_threads::encode::to_radix;

use super::*;
use crate::arena::PostArena;
use crate::source::FetchError;

fn id36(value: u128) -> PostId {
    to_radix(value, 36).parse().expect("base-36 id")
}

fn submission(id_value: u128, body: &str, title: &str) -> PostRecord {
    PostRecord {
        id: id36(id_value),
        parent_id: ParentId::Root,
        root_id: id36(id_value),
        author: Author::from("op"),
        timestamp: Timestamp::from(id_value as u64),
        body: body.to_owned(),
        title: Some(title.to_owned()),
    }
}

fn comment(id_value: u128, parent: &PostId, root: &PostId, body: &str) -> PostRecord {
    PostRecord {
        id: id36(id_value),
        parent_id: ParentId::Post(parent.clone()),
        root_id: root.clone(),
        author: Author::from(if id_value % 2 == 0 { "alice" } else { "bob" }),
        timestamp: Timestamp::from(id_value as u64),
        body: body.to_owned(),
        title: None,
    }
}

/// A thread whose comments count `base + 1 ..= base + n`; returns the leaf
/// and the get (terminal) ids.
fn build_thread(
    arena: &mut PostArena,
    root_value: u128,
    first_comment_value: u128,
    base: u128,
    n: u128,
    root_body: &str,
) -> (PostId, PostId) {
    let root = submission(root_value, root_body, &format!("counting thread | {base}"));
    let root_id = root.id.clone();
    arena.insert(root);
    let mut parent = root_id.clone();
    let mut leaf = root_id.clone();
    for i in 1..=n {
        let record = comment(
            first_comment_value + i,
            &parent,
            &root_id,
            &(base + i).to_string(),
        );
        parent = record.id.clone();
        leaf = record.id.clone();
        arena.insert(record);
    }
    (leaf, parent)
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn walks_a_single_thread_in_order() {
    let mut arena = PostArena::default();
    let (leaf, _) = build_thread(&mut arena, 500, 1000, 0, 100, "");
    let walker = ChainWalker::new(&arena);
    let walk = walker.walk_up_thread(&leaf).await.expect("walk");
    assert_eq!(walk.records.len(), 100);
    assert!(walk.warnings.is_empty());
    assert_eq!(walk.records[0].body, "1");
    assert_eq!(walk.records[99].body, "100");
    for pair in walk.records.windows(2) {
        assert_eq!(pair[1].parent_id, ParentId::Post(pair[0].id.clone()));
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn walking_twice_yields_the_same_sequence() {
    let mut arena = PostArena::default();
    let (leaf, _) = build_thread(&mut arena, 500, 1000, 0, 50, "");
    let walker = ChainWalker::new(&arena);
    let first = walker.walk_up_thread(&leaf).await.expect("walk");
    let second = walker.walk_up_thread(&leaf).await.expect("walk");
    assert_eq!(first.records, second.records);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn stitches_across_thread_boundaries() {
    let mut arena = PostArena::default();
    let (_, t1_get) = build_thread(&mut arena, 1_000, 100_000, 0, 1000, "");
    let t1_root = id36(1_000);
    let link = format!("previous [get](/comments/{t1_root}/_/{t1_get})");
    let (t2_leaf, _) = build_thread(&mut arena, 2_000_000, 3_000_000, 1000, 1000, &link);

    let walker = ChainWalker::new(&arena);
    let chain = walker.walk_chain(&t2_leaf, None).await.expect("walk");

    assert_eq!(chain.threads.len(), 2);
    assert_eq!(chain.threads[0].root.id, t1_root);
    let records: Vec<_> = chain.records().collect();
    assert_eq!(records.len(), 2000);
    assert_eq!(records[0].body, "1");
    assert_eq!(records[999].body, "1000");
    assert_eq!(records[1000].body, "1001");
    assert_eq!(records[1999].body, "2000");
    // Within a thread every record replies to its predecessor; across the
    // boundary the successor thread starts over at its own root.
    assert_eq!(
        records[1000].parent_id,
        ParentId::Post(chain.threads[1].root.id.clone())
    );
    // The first thread has no predecessor link.
    assert!(chain
        .warnings()
        .any(|warning| matches!(warning, WalkWarning::Archived { root } if *root == t1_root)));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn an_assist_link_is_walked_down_to_the_get() {
    let mut arena = PostArena::default();
    let (_, t1_get) = build_thread(&mut arena, 1_000, 100_000, 0, 1000, "");
    // Link the assist (999) rather than the get itself.
    let assist = arena
        .get(&t1_get)
        .and_then(|get| get.parent_id.as_post().cloned())
        .expect("assist");
    let link = format!("/comments/{}/_/{assist}", id36(1_000));
    let (t2_leaf, _) = build_thread(&mut arena, 2_000_000, 3_000_000, 1000, 10, &link);

    let walker = ChainWalker::new(&arena);
    let chain = walker.walk_chain(&t2_leaf, None).await.expect("walk");
    assert_eq!(chain.threads.len(), 2);
    assert_eq!(chain.threads[0].records.last().expect("get").body, "1000");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn a_bare_submission_link_still_finds_the_get() {
    let mut arena = PostArena::default();
    build_thread(&mut arena, 1_000, 100_000, 0, 1000, "");
    let link = format!("see /comments/{}", id36(1_000));
    let (t2_leaf, _) = build_thread(&mut arena, 2_000_000, 3_000_000, 1000, 10, &link);

    let walker = ChainWalker::new(&arena);
    let chain = walker.walk_chain(&t2_leaf, None).await.expect("walk");
    assert_eq!(chain.threads.len(), 2);
    assert_eq!(chain.threads[0].records.last().expect("get").body, "1000");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn a_missing_ancestor_leaves_a_gap_marker() {
    let mut arena = PostArena::default();
    let root = submission(500, "", "thread | 0");
    let root_id = root.id.clone();
    arena.insert(root);
    let mut parent = root_id.clone();
    let mut leaf = root_id.clone();
    for i in 1..=100u128 {
        let record = comment(1000 + i, &parent, &root_id, &i.to_string());
        parent = record.id.clone();
        leaf = record.id.clone();
        if i != 50 {
            arena.insert(record);
        }
    }

    let walker = ChainWalker::new(&arena);
    let walk = walker.walk_up_thread(&leaf).await.expect("walk");
    assert_eq!(walk.records.len(), 99);
    assert_eq!(walk.warnings, vec![WalkWarning::ChainBroken { at: id36(1050) }]);
    assert!(walk.records.iter().all(|record| record.body != "50"));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn cancellation_returns_partial_history() {
    let mut arena = PostArena::default();
    let (leaf, _) = build_thread(&mut arena, 500, 1000, 0, 50, "");
    let cancel = CancelToken::new();
    cancel.cancel();
    let walker = ChainWalker::new(&arena).with_cancel(cancel);
    let chain = walker.walk_chain(&leaf, None).await.expect("walk");
    assert_eq!(chain.threads.len(), 1);
    assert_eq!(chain.threads[0].records.len(), 1, "only the leaf was gathered");
}

/// An arena with an archive bolted on, for deleted-content substitution.
struct ArchiveSource {
    live: PostArena,
    archive: HashMap<PostId, PostRecord>,
}

#[async_trait]
impl PostSource for ArchiveSource {
    async fn fetch_post(&self, id: &PostId) -> FetchResult<PostRecord> {
        self.live.fetch_post(id).await
    }
    async fn fetch_parent_batch(&self, id: &PostId, k: usize) -> FetchResult<Vec<PostRecord>> {
        self.live.fetch_parent_batch(id, k).await
    }
    async fn fetch_children(&self, id: &PostId) -> FetchResult<Vec<PostRecord>> {
        self.live.fetch_children(id).await
    }
    async fn fetch_thread_comment_ids(&self, root_id: &PostId) -> FetchResult<Vec<PostId>> {
        self.live.fetch_thread_comment_ids(root_id).await
    }
    async fn fetch_from_archive(&self, id: &PostId) -> FetchResult<PostRecord> {
        self.archive
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound { id: id.clone() })
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn deleted_bodies_are_restored_from_the_archive() {
    let mut arena = PostArena::default();
    let root = submission(500, "", "thread | 0");
    let root_id = root.id.clone();
    arena.insert(root);
    let first = comment(1001, &root_id, &root_id, "1");
    let first_id = first.id.clone();
    arena.insert(first);
    let deleted = comment(1002, &first_id, &root_id, "[deleted]");
    let deleted_id = deleted.id.clone();
    arena.insert(deleted.clone());
    let leaf = comment(1003, &deleted_id, &root_id, "3");
    let leaf_id = leaf.id.clone();
    arena.insert(leaf);

    let mut archive = HashMap::new();
    let mut restored = deleted;
    restored.body = "2".to_owned();
    archive.insert(deleted_id, restored);

    let source = ArchiveSource {
        live: arena,
        archive,
    };
    let walker = ChainWalker::new(&source);
    let walk = walker.walk_up_thread(&leaf_id).await.expect("walk");
    let bodies: Vec<&str> = walk.records.iter().map(|record| record.body.as_str()).collect();
    assert_eq!(bodies, vec!["1", "2", "3"]);
}
