//! Derivation of the transport URL from a user-supplied address.

use crate::error::{EngineError, Result};

/// Path used when the address carries none.
pub const DEFAULT_PATH: &str = "/protocol/";

/// Query string every connection carries.
pub const QUERY: &str = "EIO=4&transport=websocket";

/// Derive the transport-layer URL: map `http`/`https` onto `ws`/`wss`
/// (pass `ws`/`wss` through), default the path, and append the required
/// query parameters. Any query already present on the address is replaced.
pub fn build_engine_url(address: &str) -> Result<String> {
    let (scheme, rest) = address.split_once("://").ok_or_else(|| EngineError::InvalidUrl {
        url: address.to_string(),
    })?;

    let scheme = match scheme {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(EngineError::UnsupportedScheme {
                scheme: other.to_string(),
            })
        }
    };

    let rest = rest.split_once('?').map_or(rest, |(r, _)| r);
    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    if authority.is_empty() {
        return Err(EngineError::InvalidUrl {
            url: address.to_string(),
        });
    }

    let path = if path.is_empty() || path == "/" {
        DEFAULT_PATH
    } else {
        path
    };

    Ok(format!("{scheme}://{authority}{path}?{QUERY}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_mapping() {
        assert_eq!(
            build_engine_url("http://example.test").unwrap(),
            "ws://example.test/protocol/?EIO=4&transport=websocket"
        );
        assert_eq!(
            build_engine_url("https://example.test").unwrap(),
            "wss://example.test/protocol/?EIO=4&transport=websocket"
        );
        assert_eq!(
            build_engine_url("ws://example.test/").unwrap(),
            "ws://example.test/protocol/?EIO=4&transport=websocket"
        );
        assert_eq!(
            build_engine_url("wss://example.test").unwrap(),
            "wss://example.test/protocol/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_explicit_path_and_port_kept() {
        assert_eq!(
            build_engine_url("http://host:8080/realtime/").unwrap(),
            "ws://host:8080/realtime/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_existing_query_replaced() {
        assert_eq!(
            build_engine_url("ws://host/x?foo=1").unwrap(),
            "ws://host/x?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_rejects_bad_addresses() {
        assert!(matches!(
            build_engine_url("ftp://host"),
            Err(EngineError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            build_engine_url("no-scheme.example"),
            Err(EngineError::InvalidUrl { .. })
        ));
        assert!(matches!(
            build_engine_url("http:///path-only"),
            Err(EngineError::InvalidUrl { .. })
        ));
    }
}
