//! Syntactic checks: does a post body look like a count for a given side
//! thread?
//!
//! Forms are deliberately permissive. They gate which posts enter the
//! history at all; the encoders do the precise work afterwards.

use tally_core::post::is_deleted_phrase;

use crate::fuzzy::{self, MATCH_THRESHOLD};
use crate::parsing;

#[derive(Debug, Clone, PartialEq)]
pub enum Form {
    /// Everything passes. Threads whose counts we cannot check.
    Permissive,
    /// A base-n token must open the normalised first line.
    BaseN { base: u32, strip_links: bool },
    /// Any of the listed symbols or words appears in the body
    /// (case-insensitive substring match).
    AnyOf { tokens: Vec<String> },
    /// A d20-style roll: a pipe plus a base-10 count.
    D20,
    /// A forum username mention.
    Username,
    /// A throwaway-account mention plus a base-10 count.
    Throwaway,
    /// Number-name counting ("four quadrillion"), matched fuzzily.
    Illion,
}

fn contains_digit(body: &str) -> bool {
    body.chars().any(|c| c.is_ascii_digit())
}

impl Form {
    pub fn base_n(base: u32) -> Self {
        Form::BaseN {
            base,
            strip_links: true,
        }
    }

    pub fn any_of_chars(chars: &str) -> Self {
        Form::AnyOf {
            tokens: chars.chars().map(|c| c.to_string()).collect(),
        }
    }

    pub fn any_of_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Form::AnyOf {
            tokens: words.into_iter().map(Into::into).collect(),
        }
    }

    pub fn check(&self, body: &str) -> bool {
        match self {
            Form::Permissive => true,
            Form::BaseN { base, strip_links } => {
                let body = if *strip_links {
                    body.to_owned()
                } else {
                    // Counts hidden inside link descriptions stay hidden; the
                    // url text itself is what gets checked.
                    body.replace('[', "").replace(']', "")
                };
                parsing::extract_count_string(&body, *base).is_ok()
            }
            Form::AnyOf { tokens } => {
                let body = body.to_lowercase();
                tokens.iter().any(|token| body.contains(&token.to_lowercase()))
            }
            Form::D20 => body.contains('|') && contains_digit(body),
            Form::Username => body.contains("u/"),
            Form::Throwaway => {
                fuzzy::partial_ratio("u/throwaway", body) > MATCH_THRESHOLD && contains_digit(body)
            }
            Form::Illion => fuzzy::partial_ratio("illion", body) > MATCH_THRESHOLD,
        }
    }

    /// Form check with the deletion sentinels let through, so that deleted
    /// posts keep their place in a history.
    pub fn looks_like_count(&self, body: &str) -> bool {
        is_deleted_phrase(body) || self.check(body)
    }
}
