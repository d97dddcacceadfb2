//! The side-thread engine: deciding whether a post body is a well-formed
//! count, whether a sequence of posts respects a thread's pacing rule, and
//! converting between post bodies and canonical integer positions.
//!
//! The pieces compose through [`SideThread`] descriptors: a [`form::Form`]
//! for syntax, a [`rules::Rule`] for pacing, and an [`encode::Encoder`] for
//! the body ↔ position bijection. Descriptors are bound to thread ids by the
//! [`registry::Registry`], built once at startup.

pub mod dfa;
pub mod encode;
pub mod form;
pub mod fuzzy;
pub mod parsing;
pub mod registry;
pub mod rules;

pub use self::encode::{CountError, Encoder};
pub use self::form::Form;
pub use self::registry::{Registry, SideThread};
pub use self::rules::Rule;

/// Digits available to base-n counting, in canonical order.
pub const ALPHANUMERIC: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

/// The standard thread length: a thread is complete at its 1000th count.
pub const DEFAULT_THREAD_LENGTH: u32 = 1000;
