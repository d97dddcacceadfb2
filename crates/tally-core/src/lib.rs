pub mod alias;
pub mod id;
pub mod post;
pub mod units;

use core::fmt;

pub use self::alias::AliasTable;
pub use self::id::PostId;
pub use self::post::{Author, CountRecord, ParentId, PostRecord};

/// Seconds since the unix epoch.
///
/// All pacing rules operate on whole seconds, which is the resolution the
/// upstream data carries anyway.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Self = Self(0);

    pub fn as_secs(self) -> u64 {
        self.0
    }

    /// Seconds elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl From<u64> for Timestamp {
    fn from(secs: u64) -> Self {
        Self(secs)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
