/// Delay between an ensure-connection request and the actual connect pass,
/// so bursts of subscribe/unsubscribe calls collapse into a single attempt.
pub const CONNECT_DEBOUNCE_MS: u64 = 50;

/// Close code the server uses for policy/authentication violations.
/// A close preceded by an error message with this code is not auto-retried.
pub const POLICY_VIOLATION_CODE: i64 = 1008;

/// Key prefix under which the persisted session fallback token is stored,
/// completed with the project id.
pub const SESSION_KEY_PREFIX: &str = "a_session_";

/// Connect-time query parameter names.
pub const QUERY_PROJECT: &str = "project";
pub const QUERY_CHANNELS: &str = "channels";
