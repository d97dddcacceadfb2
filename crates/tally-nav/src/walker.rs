//! Walking a chain of threads from a leaf post back to the chain's start.

use core::fmt;

use backon::{ExponentialBuilder, Retryable};
use tally_core::{ParentId, PostId, PostRecord};
use tally_threads::parsing;
use tracing::{debug, warn};

use crate::source::{FetchResult, PostSource};
use crate::CancelToken;

const LOG_TARGET: &str = "tally::walker";

/// Ancestors are fetched nine at a time; the batch endpoint amortises a
/// network round-trip about that well before payloads get heavy.
pub const DEFAULT_BATCH_SIZE: usize = 9;

#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub batch_size: usize,
    /// Transient fetch failures are retried this many times with
    /// exponential back-off before surfacing.
    pub max_retries: usize,
    /// Thread length used to validate gets when stitching threads.
    pub thread_length: u32,
    pub validate_get: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: 3,
            thread_length: 1000,
            validate_get: true,
        }
    }
}

/// Non-fatal conditions met during a walk, reported alongside the records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkWarning {
    /// An ancestor could not be resolved; the walk resumed below it.
    ChainBroken { at: PostId },
    /// The chain ends here: no previous-thread link was found.
    Archived { root: PostId },
}

impl fmt::Display for WalkWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkWarning::ChainBroken { at } => write!(f, "chain broken at {at}"),
            WalkWarning::Archived { root } => write!(f, "thread {root} has no predecessor"),
        }
    }
}

/// One thread's worth of walking: the submission and its comment chain in
/// root-to-leaf order.
#[derive(Debug, Clone)]
pub struct ThreadWalk {
    pub root: PostRecord,
    pub records: Vec<PostRecord>,
    pub warnings: Vec<WalkWarning>,
}

/// A whole chain, oldest thread first.
#[derive(Debug, Clone, Default)]
pub struct ChainWalk {
    pub threads: Vec<ThreadWalk>,
    pub chain_warnings: Vec<WalkWarning>,
}

impl ChainWalk {
    /// All comment records in chain order, thread roots excluded.
    pub fn records(&self) -> impl Iterator<Item = &PostRecord> {
        self.threads.iter().flat_map(|thread| thread.records.iter())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &WalkWarning> {
        self.threads
            .iter()
            .flat_map(|thread| thread.warnings.iter())
            .chain(self.chain_warnings.iter())
    }
}

pub struct ChainWalker<'s, S: ?Sized> {
    source: &'s S,
    options: WalkOptions,
    cancel: CancelToken,
}

impl<'s, S: PostSource + ?Sized> ChainWalker<'s, S> {
    pub fn new(source: &'s S) -> Self {
        Self {
            source,
            options: WalkOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_options(mut self, options: WalkOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    async fn fetch_with_retry(&self, id: &PostId) -> FetchResult<PostRecord> {
        (|| async { self.source.fetch_post(id).await })
            .retry(
                ExponentialBuilder::default().with_max_times(self.options.max_retries),
            )
            .when(|err| err.is_transient())
            .await
    }

    /// Deleted content gets one second chance against the archive; failing
    /// that, the sentinel record keeps its place in the chain.
    async fn substitute_deleted(&self, record: PostRecord) -> PostRecord {
        if !record.is_deleted() {
            return record;
        }
        match self.source.fetch_from_archive(&record.id).await {
            Ok(saved) => saved,
            Err(_) => record,
        }
    }

    /// After a broken link, the best resumption point is the newest comment
    /// in the thread created before the missing one.
    async fn resume_before(&self, missing: &PostId, root_id: &PostId) -> Option<PostRecord> {
        let ids = self.source.fetch_thread_comment_ids(root_id).await.ok()?;
        let before = ids.into_iter().filter(|id| id < missing).max()?;
        let record = self.fetch_with_retry(&before).await.ok()?;
        Some(self.substitute_deleted(record).await)
    }

    /// Walk from a leaf comment up to its thread's first reply. Records come
    /// back in root-to-leaf order.
    pub async fn walk_up_thread(&self, leaf: &PostId) -> FetchResult<ThreadWalk> {
        let leaf_record = self.fetch_with_retry(leaf).await?;
        let root_id = leaf_record.root_id.clone();
        let mut down = vec![self.substitute_deleted(leaf_record).await];
        let mut warnings = Vec::new();
        loop {
            let last = down.last().expect("starts non-empty");
            let parent_id = match &last.parent_id {
                ParentId::Root => break,
                ParentId::Post(parent) if *parent == root_id => break,
                ParentId::Post(parent) => parent.clone(),
            };
            if self.cancel.is_cancelled() {
                debug!(target: LOG_TARGET, %root_id, "walk cancelled; returning partial history");
                break;
            }
            let batch = self
                .source
                .fetch_parent_batch(&last.id, self.options.batch_size)
                .await
                .unwrap_or_default();
            let mut advanced = false;
            for ancestor in batch {
                let expected = match &down.last().expect("non-empty").parent_id {
                    ParentId::Post(parent) => parent.clone(),
                    ParentId::Root => break,
                };
                if ancestor.id != expected {
                    break;
                }
                down.push(self.substitute_deleted(ancestor).await);
                advanced = true;
            }
            if advanced {
                continue;
            }
            match self.fetch_with_retry(&parent_id).await {
                Ok(record) => down.push(self.substitute_deleted(record).await),
                Err(err) if !err.is_transient() => {
                    warn!(target: LOG_TARGET, at = %parent_id, "ancestor missing; resuming below the gap");
                    warnings.push(WalkWarning::ChainBroken {
                        at: parent_id.clone(),
                    });
                    match self.resume_before(&parent_id, &root_id).await {
                        Some(record) => down.push(record),
                        None => break,
                    }
                }
                Err(err) => return Err(err),
            }
        }
        let root = self.fetch_with_retry(&root_id).await?;
        down.reverse();
        Ok(ThreadWalk {
            root,
            records: down,
            warnings,
        })
    }

    /// The previous thread linked from a submission's body or its top-level
    /// replies: `(submission_id, comment_id)` with the comment id missing
    /// when someone linked the bare submission.
    async fn find_previous_link(
        &self,
        root: &PostRecord,
    ) -> FetchResult<Option<(PostId, Option<PostId>)>> {
        let mut bodies = vec![root.body.clone()];
        if let Ok(children) = self.source.fetch_children(&root.id).await {
            bodies.extend(children.into_iter().map(|child| child.body));
        }
        let mut urls = Vec::new();
        for body in &bodies {
            urls.extend(parsing::find_urls_in_text(body));
            for token in parsing::find_short_links(body) {
                if let Ok(expanded) = self.source.resolve_short_link(&token).await {
                    urls.extend(parsing::find_urls_in_text(&expanded));
                }
            }
        }
        let candidates: Vec<(PostId, Option<PostId>)> = urls
            .into_iter()
            .filter(|(submission, _)| *submission < root.id)
            .collect();
        let chosen = candidates
            .iter()
            .find(|(_, comment)| comment.is_some())
            .or_else(|| candidates.first());
        Ok(chosen.cloned())
    }

    /// Locate the get in a submission linked without a comment id, scanning
    /// newest comments first for one that parses to a multiple of the
    /// thread length.
    async fn find_get_in_submission(&self, submission_id: &PostId) -> FetchResult<Option<PostRecord>> {
        let mut ids = self.source.fetch_thread_comment_ids(submission_id).await?;
        ids.sort();
        let length = u128::from(self.options.thread_length);
        for id in ids.into_iter().rev() {
            let Ok(record) = self.fetch_with_retry(&id).await else {
                continue;
            };
            if let Ok(count) = parsing::find_count_in_text(&record.body, 10) {
                if count % length == 0 {
                    return Ok(Some(record));
                }
            }
        }
        Ok(None)
    }

    /// Counters sometimes link the assist or the post after the get; walk a
    /// step at a time toward the true terminal post.
    async fn validate_get(&self, get: PostRecord) -> FetchResult<PostRecord> {
        let mut current = get;
        let mut count = None;
        for _ in 0..5 {
            match parsing::find_count_in_text(&current.body, 10) {
                Ok(parsed) => {
                    count = Some(parsed);
                    break;
                }
                Err(_) => {
                    let ParentId::Post(parent) = &current.parent_id else {
                        break;
                    };
                    current = self.fetch_with_retry(parent).await?;
                }
            }
        }
        let Some(mut count) = count else {
            return Ok(current);
        };
        let length = u128::from(self.options.thread_length);
        for _ in 0..25 {
            let remainder = count % length;
            if remainder == 0 {
                break;
            }
            if remainder * 2 >= length {
                let children = self.source.fetch_children(&current.id).await?;
                let Some(child) = children.into_iter().next() else {
                    break;
                };
                current = child;
            } else {
                let ParentId::Post(parent) = &current.parent_id else {
                    break;
                };
                current = self.fetch_with_retry(parent).await?;
            }
            match parsing::find_count_in_text(&current.body, 10) {
                Ok(parsed) => count = parsed,
                Err(_) => break,
            }
        }
        Ok(current)
    }

    /// Walk whole threads backwards from a leaf until `n_threads` have been
    /// collected, the chain's first thread is reached, or the walk is
    /// cancelled. Threads come back oldest first, records in thread order.
    pub async fn walk_chain(&self, leaf: &PostId, n_threads: Option<usize>) -> FetchResult<ChainWalk> {
        let mut threads: Vec<ThreadWalk> = Vec::new();
        let mut chain_warnings = Vec::new();
        let mut current_leaf = leaf.clone();
        loop {
            let walk = self.walk_up_thread(&current_leaf).await?;
            let root = walk.root.clone();
            debug!(
                target: LOG_TARGET,
                root = %root.id,
                comments = walk.records.len(),
                "collected thread"
            );
            threads.push(walk);
            if let Some(limit) = n_threads {
                if threads.len() >= limit {
                    break;
                }
            }
            if self.cancel.is_cancelled() {
                break;
            }
            match self.find_previous_link(&root).await? {
                Some((submission, comment)) => {
                    let get = match comment {
                        Some(comment) => Some(self.fetch_with_retry(&comment).await?),
                        None => self.find_get_in_submission(&submission).await?,
                    };
                    let Some(get) = get else {
                        warn!(target: LOG_TARGET, %submission, "linked thread has no locatable get");
                        chain_warnings.push(WalkWarning::Archived {
                            root: root.id.clone(),
                        });
                        break;
                    };
                    let get = if self.options.validate_get {
                        self.validate_get(get).await?
                    } else {
                        get
                    };
                    current_leaf = get.id.clone();
                }
                None => {
                    chain_warnings.push(WalkWarning::Archived {
                        root: root.id.clone(),
                    });
                    break;
                }
            }
        }
        threads.reverse();
        Ok(ChainWalk {
            threads,
            chain_warnings,
        })
    }
}

#[cfg(test)]
mod tests;
