use core::fmt;

use crate::{PostId, Timestamp};

/// Bodies the forum substitutes for content that is no longer visible.
pub const DELETED_PHRASES: [&str; 3] = ["[deleted]", "[removed]", "[banned]"];

pub fn is_deleted_phrase(body: &str) -> bool {
    DELETED_PHRASES.contains(&body.trim())
}

/// The author of a post, or the sentinel left behind when the account is
/// gone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Author {
    Named(String),
    Deleted,
}

impl Author {
    pub fn name(&self) -> &str {
        match self {
            Author::Named(name) => name,
            Author::Deleted => "[deleted]",
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Author::Deleted)
    }
}

impl From<String> for Author {
    fn from(name: String) -> Self {
        if name == "[deleted]" {
            Author::Deleted
        } else {
            Author::Named(name)
        }
    }
}

impl From<&str> for Author {
    fn from(name: &str) -> Self {
        Author::from(name.to_owned())
    }
}

impl From<Author> for String {
    fn from(author: Author) -> Self {
        author.name().to_owned()
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a post hangs off: the thread head itself, or another post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ParentId {
    Post(PostId),
    /// The post is a direct reply to the thread head (or is the head).
    Root,
}

impl ParentId {
    pub fn as_post(&self) -> Option<&PostId> {
        match self {
            ParentId::Post(id) => Some(id),
            ParentId::Root => None,
        }
    }
}

/// One post as delivered by a post source.
///
/// `title` is populated for thread heads only; everything else treats it as
/// opaque.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PostRecord {
    pub id: PostId,
    pub parent_id: ParentId,
    pub root_id: PostId,
    pub author: Author,
    pub timestamp: Timestamp,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl PostRecord {
    pub fn is_root(&self) -> bool {
        matches!(self.parent_id, ParentId::Root) && self.id == self.root_id
    }

    pub fn is_deleted(&self) -> bool {
        self.author.is_deleted() || is_deleted_phrase(&self.body)
    }
}

/// One validated count in a thread's history.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CountRecord {
    /// Position of the count in the overall chain; strictly increasing and
    /// contiguous inside a thread, offset by the basecount across thread
    /// boundaries.
    pub position: u128,
    pub author: Author,
    pub timestamp: Timestamp,
    pub id: PostId,
    pub root_id: PostId,
    pub body: String,
}
