//! A flat arena of post records.
//!
//! Post trees are navigated in both directions, but the records themselves
//! never hold references to each other: the arena keys everything by id and
//! keeps two flat maps for the tree structure. It doubles as an in-memory
//! [`PostSource`](crate::PostSource) for offline dumps and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use itertools::Itertools;
use tally_core::{ParentId, PostId, PostRecord};

use crate::source::{FetchError, FetchResult, PostSource};

#[derive(Debug, Clone, Default)]
pub struct PostArena {
    records: HashMap<PostId, PostRecord>,
    parents: HashMap<PostId, PostId>,
    children: HashMap<PostId, Vec<PostId>>,
}

impl PostArena {
    pub fn new(records: impl IntoIterator<Item = PostRecord>) -> Self {
        let mut arena = Self::default();
        for record in records {
            arena.insert(record);
        }
        arena
    }

    pub fn insert(&mut self, record: PostRecord) {
        if let ParentId::Post(parent) = &record.parent_id {
            self.parents.insert(record.id.clone(), parent.clone());
            let siblings = self.children.entry(parent.clone()).or_default();
            siblings.push(record.id.clone());
            // Children stay in creation order; ids sort that way.
            siblings.sort();
        }
        self.records.insert(record.id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &PostId) -> Option<&PostRecord> {
        self.records.get(id)
    }

    pub fn parent_of(&self, id: &PostId) -> Option<&PostRecord> {
        self.records.get(self.parents.get(id)?)
    }

    pub fn children_of(&self, id: &PostId) -> impl Iterator<Item = &PostRecord> {
        self.children
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.records.get(child))
    }

    pub fn ids(&self) -> impl Iterator<Item = &PostId> {
        self.records.keys()
    }

    /// Comment ids of one thread, sorted by creation.
    pub fn thread_comment_ids(&self, root_id: &PostId) -> Vec<PostId> {
        self.records
            .values()
            .filter(|record| record.root_id == *root_id && !record.is_root())
            .map(|record| record.id.clone())
            .sorted()
            .collect()
    }
}

#[async_trait]
impl PostSource for PostArena {
    async fn fetch_post(&self, id: &PostId) -> FetchResult<PostRecord> {
        self.get(id).cloned().ok_or_else(|| FetchError::NotFound { id: id.clone() })
    }

    async fn fetch_parent_batch(&self, id: &PostId, k: usize) -> FetchResult<Vec<PostRecord>> {
        let mut batch = Vec::with_capacity(k);
        let mut current = self.get(id).ok_or_else(|| FetchError::NotFound { id: id.clone() })?;
        while batch.len() < k {
            let ParentId::Post(parent_id) = &current.parent_id else {
                break;
            };
            if *parent_id == current.root_id {
                break;
            }
            // A missing ancestor ends the batch; the caller falls back to
            // single fetches to find out why.
            let Some(parent) = self.get(parent_id) else {
                break;
            };
            batch.push(parent.clone());
            current = parent;
        }
        Ok(batch)
    }

    async fn fetch_children(&self, id: &PostId) -> FetchResult<Vec<PostRecord>> {
        Ok(self.children_of(id).cloned().collect())
    }

    async fn fetch_thread_comment_ids(&self, root_id: &PostId) -> FetchResult<Vec<PostId>> {
        Ok(self.thread_comment_ids(root_id))
    }
}

#[cfg(test)]
mod tests {
    use tally_core::{Author, Timestamp};

    use super::*;

    fn record(id: &str, parent: Option<&str>, root: &str) -> PostRecord {
        PostRecord {
            id: id.parse().expect("id"),
            parent_id: match parent {
                Some(parent) => ParentId::Post(parent.parse().expect("id")),
                None => ParentId::Root,
            },
            root_id: root.parse().expect("id"),
            author: Author::from("someone"),
            timestamp: Timestamp::from(0),
            body: String::new(),
            title: None,
        }
    }

    #[test]
    fn tree_lookups_go_both_ways() {
        let arena = PostArena::new([
            record("aaa", None, "aaa"),
            record("bbb", Some("aaa"), "aaa"),
            record("ccc", Some("bbb"), "aaa"),
            record("ddd", Some("bbb"), "aaa"),
        ]);
        assert_eq!(arena.parent_of(&"ccc".parse().expect("id")).expect("parent").id.as_str(), "bbb");
        let children: Vec<&str> = arena
            .children_of(&"bbb".parse().expect("id"))
            .map(|child| child.id.as_str())
            .collect();
        assert_eq!(children, vec!["ccc", "ddd"]);
    }

    #[test]
    fn comment_ids_exclude_the_submission() {
        let arena = PostArena::new([
            record("aaa", None, "aaa"),
            record("ccc", Some("aaa"), "aaa"),
            record("bbb", Some("aaa"), "aaa"),
        ]);
        let ids: Vec<String> = arena
            .thread_comment_ids(&"aaa".parse().expect("id"))
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, vec!["bbb", "ccc"]);
    }
}
