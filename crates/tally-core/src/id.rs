use core::fmt;
use std::str::FromStr;

use snafu::Snafu;

const BASE36: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

/// An opaque post identifier: a base-36 string as handed out by the forum.
///
/// Ids sort by their base-36 integer value, which for posts in the same tree
/// is consistent with creation order. The string is stored lowercased and
/// without leading zeros so that the derived ordering below matches the
/// numeric one (shorter strings are smaller, equal lengths compare
/// lexicographically).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostId(String);

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum PostIdParseError {
    #[snafu(display("post id is empty"))]
    Empty,
    #[snafu(display("post id contains non-base-36 character {chr:?}"))]
    InvalidCharacter { chr: char },
}

impl PostId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id's base-36 integer value.
    ///
    /// Forum ids are currently at most a dozen characters, far inside the
    /// 24-character capacity of a u128.
    pub fn to_u128(&self) -> u128 {
        self.0
            .bytes()
            .map(|b| match b {
                b'0'..=b'9' => (b - b'0') as u128,
                _ => (b - b'a' + 10) as u128,
            })
            .fold(0, |acc, digit| acc * 36 + digit)
    }

    /// Whether this id was created before `other` (strictly smaller base-36
    /// value).
    pub fn created_before(&self, other: &PostId) -> bool {
        self < other
    }
}

impl Ord for PostId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.0.len(), &self.0).cmp(&(other.0.len(), &other.0))
    }
}

impl PartialOrd for PostId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for PostId {
    type Err = PostIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let normalized = normalized.trim_start_matches('0');
        // An all-zero id normalises to the single digit it denotes.
        let normalized = if normalized.is_empty() && !s.trim().is_empty() {
            "0"
        } else {
            normalized
        };
        if normalized.is_empty() {
            return Err(PostIdParseError::Empty);
        }
        if let Some(chr) = normalized.chars().find(|c| !BASE36.contains(*c)) {
            return Err(PostIdParseError::InvalidCharacter { chr });
        }
        Ok(Self(normalized.to_owned()))
    }
}

impl TryFrom<String> for PostId {
    type Error = PostIdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PostId> for String {
    fn from(id: PostId) -> Self {
        id.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
