//! Cross-provider identity resolution.
//!
//! [`TeamMatcher`] resolves provider team records to deduplicated
//! [`Team`](crate::models::Team) rows; [`PlayerDeduplicator`] runs the
//! tiered fallback cascade that resolves player records. Both short-
//! circuit on the provider external id before any name comparison, so
//! a re-sync of already-seen data never widens to fuzzy matching.

pub mod player;
pub mod team;

pub use player::PlayerDeduplicator;
pub use team::TeamMatcher;
