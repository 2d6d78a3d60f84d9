pub mod knowledge;
pub mod realtime;
pub mod slug;

/// Agent identifier used when a session-start request does not name one.
///
/// Kept here as a single named constant so it is passed through
/// configuration instead of being repeated at call sites.
pub const DEFAULT_AGENT_ID: &str = "default";
