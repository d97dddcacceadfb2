//! The interface the embedder supplies: something that can fetch posts.

use async_trait::async_trait;
use snafu::Snafu;
use tally_core::{PostId, PostRecord};

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[snafu(display("post {id} was not found"))]
    NotFound { id: PostId },
    #[snafu(display("post {id} was deleted"))]
    Deleted { id: PostId },
    #[snafu(display("post {id} was removed"))]
    Removed { id: PostId },
    #[snafu(display("fetching {id} failed upstream: {message}"))]
    Upstream { id: PostId, message: String },
    #[snafu(display("this source cannot resolve short links"))]
    ShortLinksUnsupported,
}

impl FetchError {
    /// Whether retrying the same request can help.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Upstream { .. })
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// A supplier of post records. Implementations may hit the network; every
/// method is a suspension point.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_post(&self, id: &PostId) -> FetchResult<PostRecord>;

    /// Up to `k` ancestors of a post, nearest first, stopping at the
    /// thread's first reply. May return fewer than `k` on partial failure.
    async fn fetch_parent_batch(&self, id: &PostId, k: usize) -> FetchResult<Vec<PostRecord>>;

    /// Direct replies, oldest first.
    async fn fetch_children(&self, id: &PostId) -> FetchResult<Vec<PostRecord>>;

    /// Every comment id in a thread, unordered. Used to repair broken
    /// chains and to locate gets from bare submission links.
    async fn fetch_thread_comment_ids(&self, root_id: &PostId) -> FetchResult<Vec<PostId>>;

    /// Expand an opaque short-link token to a canonical url. Optional.
    async fn resolve_short_link(&self, _token: &str) -> FetchResult<String> {
        Err(FetchError::ShortLinksUnsupported)
    }

    /// Second-chance lookup for deleted or removed content, typically
    /// backed by an archive. Optional.
    async fn fetch_from_archive(&self, id: &PostId) -> FetchResult<PostRecord> {
        Err(FetchError::NotFound { id: id.clone() })
    }
}
