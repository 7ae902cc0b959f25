//! Shared connection state for the Neviweb API.
//!
//! Authentication
//! - `POST /api/login` returns a session token, sent back as the `Session-Id` header.
//! - The header map lives behind a `RefCell` so that gateways and thermostats holding
//!   the same `Rc<NeviwebClient>` observe login and logout immediately.

use http::header::{ACCEPT, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::{ApiRequest, Transport};

pub const BASE_URL: &str = "https://neviweb.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) const SESSION_HEADER: HeaderName = HeaderName::from_static("session-id");

pub(crate) struct NeviwebClient {
    transport: Box<dyn Transport>,
    headers: RefCell<HeaderMap>,
    timeout: Duration,
}

impl fmt::Debug for NeviwebClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeviwebClient")
            .field("timeout", &self.timeout)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl NeviwebClient {
    pub(crate) fn new(transport: Box<dyn Transport>, timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        NeviwebClient {
            transport,
            headers: RefCell::new(headers),
            timeout,
        }
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.headers.borrow().contains_key(SESSION_HEADER)
    }

    pub(crate) fn set_session_id(&self, session_id: &str) -> Result<()> {
        let mut value = HeaderValue::from_str(session_id)
            .map_err(|_| Error::Authentication("session token is not a valid header value".to_string()))?;
        value.set_sensitive(true);
        self.headers.borrow_mut().insert(SESSION_HEADER, value);
        Ok(())
    }

    pub(crate) fn clear_session_id(&self) {
        self.headers.borrow_mut().remove(SESSION_HEADER);
    }

    /// Unauthenticated form POST (login).
    pub(crate) fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<Value> {
        self.send(&Method::POST, path, &[], form)
    }

    pub(crate) fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.require_session()?;
        self.send(&Method::GET, path, query, &[])
    }

    pub(crate) fn put_form(&self, path: &str, form: &[(&str, String)]) -> Result<Value> {
        self.require_session()?;
        debug!("PUT {}: {:?}", path, form);
        self.send(&Method::PUT, path, &[], form)
    }

    fn require_session(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn send(&self, method: &Method, path: &str, query: &[(&str, String)], form: &[(&str, String)]) -> Result<Value> {
        debug!("{} {} {:?}", method, path, query);
        let headers = self.headers.borrow().clone();
        let response = self.transport.send(&ApiRequest {
            method,
            path,
            query,
            form,
            headers: &headers,
        })?;
        Ok(response)
    }
}

/// Fail on the `{"code": ..., "message": ...}` error envelope.
pub(crate) fn check_envelope(response: &Value) -> Result<()> {
    match response.get("code") {
        Some(code) => Err(Error::Protocol {
            code: scalar_text(code),
            message: response
                .get("message")
                .map(scalar_text)
                .unwrap_or_else(|| "None".to_string()),
        }),
        None => Ok(()),
    }
}

/// Device data additionally reports failures under an `error` key.
pub(crate) fn check_device_envelope(response: &Value) -> Result<()> {
    check_envelope(response)?;
    match response.get("error") {
        Some(error) => Err(Error::Protocol {
            code: error
                .get("code")
                .map(scalar_text)
                .unwrap_or_else(|| "error".to_string()),
            message: scalar_text(error),
        }),
        None => Ok(()),
    }
}

/// Device data and write responses are always JSON objects.
pub(crate) fn expect_object(response: &Value) -> Result<()> {
    let kind = match response {
        Value::Object(_) => return Ok(()),
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
    };
    Err(Error::Protocol {
        code: "unexpected_payload".to_string(),
        message: format!("expected a JSON object, got {}", kind),
    })
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_path_to_error::deserialize(value)?)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
