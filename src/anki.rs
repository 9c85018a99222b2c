//! Downstream notification: open the chosen cards in Anki's browser
//!
//! Talks to the AnkiConnect add-on (JSON-RPC over HTTP, protocol version 6).
//! Notification never fails an invocation; the outcome is reported as a
//! status string on the result.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::error::Result;
use crate::http;

const ANKICONNECT_VERSION: u32 = 6;

pub const STATUS_DISABLED: &str = "Anki notification disabled";
pub const STATUS_UNREACHABLE: &str = "Anki not running (AnkiConnect unreachable)";
pub const STATUS_NOTHING_TO_SHOW: &str = "No cards to show in Anki";

/// Receives the card ids an invocation settled on
pub trait Notifier: Send + Sync {
    /// Notify the downstream application; returns a human-readable status
    fn notify(&self, ids: &[i64]) -> String;
}

impl<T: Notifier + ?Sized> Notifier for Box<T> {
    fn notify(&self, ids: &[i64]) -> String {
        (**self).notify(ids)
    }
}

/// Notifier used when notification is switched off
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn notify(&self, _ids: &[i64]) -> String {
        STATUS_DISABLED.to_string()
    }
}

/// AnkiConnect search string for the given note ids, e.g. `nid:1,2`
///
/// Empty when there are no ids.
pub fn format_nid_query(ids: &[i64]) -> String {
    if ids.is_empty() {
        return String::new();
    }
    let joined = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("nid:{}", joined)
}

/// AnkiConnect client
pub struct AnkiConnect {
    client: Client,
    endpoint: String,
}

impl AnkiConnect {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout, None)?,
            endpoint: endpoint.to_string(),
        })
    }

    /// `AnkiConnect` when `[anki].enabled`, otherwise `DisabledNotifier`
    pub fn notifier_from_config(config: &Config) -> Result<Box<dyn Notifier>> {
        if !config.anki.enabled {
            return Ok(Box::new(DisabledNotifier));
        }
        Ok(Box::new(Self::new(
            &config.anki.endpoint,
            config.network.timeout(),
        )?))
    }

    fn invoke(&self, request: &AnkiRequest<'_>) -> std::result::Result<AnkiResponse, http::CallError> {
        http::post_json(&self.client, &self.endpoint, request)
    }

    fn ping(&self) -> std::result::Result<Option<u64>, http::CallError> {
        let response = self.invoke(&AnkiRequest::new("version", None))?;
        let version = response.result.as_ref().and_then(Value::as_u64);
        tracing::debug!(?version, "AnkiConnect reachable");
        Ok(version)
    }
}

impl Notifier for AnkiConnect {
    fn notify(&self, ids: &[i64]) -> String {
        let query = format_nid_query(ids);
        if query.is_empty() {
            return STATUS_NOTHING_TO_SHOW.to_string();
        }
        if let Err(e) = self.ping() {
            tracing::warn!(error = %e, endpoint = %self.endpoint, "AnkiConnect unreachable");
            return STATUS_UNREACHABLE.to_string();
        }

        let request = AnkiRequest::new("guiBrowse", Some(BrowseParams { query: &query }));
        tracing::info!(query = %query, "opening Anki browser");
        match self.invoke(&request) {
            Ok(AnkiResponse {
                error: Some(message),
                ..
            }) => {
                tracing::warn!(error = %message, "AnkiConnect rejected guiBrowse");
                format!("AnkiConnect error: {}", message)
            }
            Ok(_) => format!("Opened Anki browser with {}", query),
            Err(e) => {
                tracing::warn!(error = %e, "guiBrowse call failed");
                format!("AnkiConnect error: {}", e)
            }
        }
    }
}

#[derive(Serialize)]
struct AnkiRequest<'a> {
    action: &'a str,
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<BrowseParams<'a>>,
}

impl<'a> AnkiRequest<'a> {
    fn new(action: &'a str, params: Option<BrowseParams<'a>>) -> Self {
        Self {
            action,
            version: ANKICONNECT_VERSION,
            params,
        }
    }
}

#[derive(Serialize)]
struct BrowseParams<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnkiResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_nid_query() {
        assert_eq!(format_nid_query(&[5, 7, 10]), "nid:5,7,10");
        assert_eq!(format_nid_query(&[]), "");
    }

    #[test]
    fn test_request_serialization() {
        let version = serde_json::to_string(&AnkiRequest::new("version", None)).unwrap();
        assert_eq!(version, r#"{"action":"version","version":6}"#);

        let browse = serde_json::to_string(&AnkiRequest::new(
            "guiBrowse",
            Some(BrowseParams { query: "nid:1,2" }),
        ))
        .unwrap();
        assert_eq!(
            browse,
            r#"{"action":"guiBrowse","version":6,"params":{"query":"nid:1,2"}}"#
        );
    }

    #[test]
    fn test_response_parsing() {
        let ok: AnkiResponse = serde_json::from_str(r#"{"result":[1,2],"error":null}"#).unwrap();
        assert!(ok.error.is_none());

        let failed: AnkiResponse =
            serde_json::from_str(r#"{"result":null,"error":"collection is not available"}"#)
                .unwrap();
        assert_eq!(failed.error.as_deref(), Some("collection is not available"));
    }

    #[test]
    fn test_disabled_notifier() {
        assert_eq!(DisabledNotifier.notify(&[1]), STATUS_DISABLED);
    }

    /// Endpoint on a port nothing listens on
    fn closed_endpoint() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}", port)
    }

    #[test]
    fn test_unreachable_endpoint_reports_status() {
        let anki = AnkiConnect::new(&closed_endpoint(), Duration::from_millis(500)).unwrap();
        assert_eq!(anki.notify(&[1, 2]), STATUS_UNREACHABLE);
    }

    #[test]
    fn test_empty_ids_skip_remote_calls() {
        let anki = AnkiConnect::new(&closed_endpoint(), Duration::from_millis(500)).unwrap();
        assert_eq!(anki.notify(&[]), STATUS_NOTHING_TO_SHOW);
    }
}
