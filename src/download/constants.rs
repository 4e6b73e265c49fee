//! Constants for the download module.

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout: longest wait for the next bytes of a response (5 minutes).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default User-Agent for stream requests (identifies the tool).
///
/// Providers that need a browser User-Agent supply it through descriptor headers.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("vidstitch/{version}")
}
