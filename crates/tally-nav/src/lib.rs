//! Navigating post trees and chains of threads.
//!
//! The embedder supplies a [`source::PostSource`]; the [`walker::ChainWalker`]
//! turns a leaf post id into the ordered sequence of posts from the chain's
//! first thread to the leaf, stitching across thread boundaries through the
//! previous-thread links counters leave behind.

pub mod arena;
pub mod source;
pub mod walker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use self::arena::PostArena;
pub use self::source::{FetchError, FetchResult, PostSource};
pub use self::walker::{ChainWalk, ChainWalker, ThreadWalk, WalkOptions, WalkWarning};

/// A cooperative cancellation flag. The walker checks it between parent
/// batches and between thread boundaries; in-flight fetches complete and the
/// partial history gathered so far is returned.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
