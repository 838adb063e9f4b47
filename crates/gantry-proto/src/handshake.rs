//! Connection handshake and debug-reattach conventions.
//!
//! Both ends exchange a [`Handshake`] frame at connection time. The magic
//! cookie is a basic UX guard: it catches users running a plugin binary by
//! hand, not adversarial processes. The protocol version gates incompatible
//! frame-format revisions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable carrying the handshake cookie to plugin processes.
pub const MAGIC_COOKIE_KEY: &str = "GANTRY_PLUGIN";

/// Expected value of the handshake cookie.
pub const MAGIC_COOKIE_VALUE: &str = "be6c1928786a4df0222c13eef44ac846da2c0d461d99addc93f804601c6b7205";

/// Environment variable holding the debug-reattach map on the host side.
///
/// The value is a JSON object mapping plugin name to the address of an
/// already-running plugin process started in debug mode.
pub const REATTACH_ENV_VAR: &str = "GANTRY_REATTACH_PLUGINS";

/// Handshake frame exchanged when a connection is established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Protocol version the sender speaks.
    pub protocol_version: u32,
    /// Magic cookie proving the sender is a gantry host or plugin.
    pub magic_cookie: String,
}

impl Handshake {
    /// Builds the handshake frame for the current runtime.
    #[must_use]
    pub fn current() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            magic_cookie: MAGIC_COOKIE_VALUE.to_owned(),
        }
    }

    /// Returns `true` when the peer's handshake is compatible with ours.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.protocol_version == other.protocol_version && self.magic_cookie == other.magic_cookie
    }
}

/// Parses the reattach map from the raw environment variable value.
///
/// # Errors
///
/// Returns the underlying JSON error when the value is not a valid
/// `{plugin_name: address}` object.
pub fn parse_reattach_map(raw: &str) -> Result<HashMap<String, String>, serde_json::Error> {
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_handshake_matches_itself() {
        let hs = Handshake::current();
        assert!(hs.matches(&Handshake::current()));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut other = Handshake::current();
        other.protocol_version += 1;
        assert!(!Handshake::current().matches(&other));
    }

    #[test]
    fn cookie_mismatch_is_rejected() {
        let mut other = Handshake::current();
        other.magic_cookie = "wrong".into();
        assert!(!Handshake::current().matches(&other));
    }

    #[test]
    fn reattach_map_parses() {
        let map = parse_reattach_map(r#"{"docker": "127.0.0.1:4200"}"#).expect("parse");
        assert_eq!(map.get("docker").map(String::as_str), Some("127.0.0.1:4200"));
    }

    #[test]
    fn reattach_map_rejects_non_object() {
        assert!(parse_reattach_map("[1, 2]").is_err());
    }
}
