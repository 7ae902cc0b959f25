//! HTTP transport used by the session.
//!
//! - [`Transport`] is the seam between the resource model and the wire.
//! - [`UreqTransport`] is the default blocking implementation (`ureq`, no async).
//! - Every response body is parsed as JSON; envelope checks happen in the caller.

use http::{HeaderMap, Method};
use serde_json::Value;
use std::io;
use std::time::Duration;

use crate::error::{Error, Result};

/// One call against the API, relative to the transport's base URL.
#[derive(Debug, Clone, Copy)]
pub struct ApiRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub query: &'a [(&'a str, String)],
    /// Form-encoded body, sent for POST and PUT.
    pub form: &'a [(&'a str, String)],
    pub headers: &'a HeaderMap,
}

pub trait Transport {
    /// Send the request and return the decoded JSON body.
    ///
    /// A request that exceeds its deadline must fail with [`Error::Timeout`];
    /// callers rely on that variant to tell unreachable devices apart.
    fn send(&self, request: &ApiRequest<'_>) -> Result<Value>;
}

pub struct UreqTransport {
    agent: ureq::Agent,
    base_url: String,
}

impl UreqTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            // error envelopes arrive with 4xx statuses and still carry JSON
            .http_status_as_error(false)
            .build();
        let base_url = base_url.into();
        UreqTransport {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn prepare<B>(builder: ureq::RequestBuilder<B>, request: &ApiRequest<'_>) -> ureq::RequestBuilder<B> {
        let mut builder = builder;
        for (key, value) in request.query {
            builder = builder.query(*key, value.as_str());
        }
        for (name, value) in request.headers {
            builder = builder.header(name.as_str(), value.as_bytes());
        }
        builder
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &ApiRequest<'_>) -> Result<Value> {
        let url = self.url(request.path);
        let form = request.form.iter().map(|(k, v)| (*k, v.as_str()));

        let result = match *request.method {
            Method::GET => Self::prepare(self.agent.get(url.as_str()), request).call(),
            Method::POST => Self::prepare(self.agent.post(url.as_str()), request).send_form(form),
            Method::PUT => Self::prepare(self.agent.put(url.as_str()), request).send_form(form),
            ref other => return Err(Error::Transport(format!("unsupported method {}", other))),
        };

        let mut response = result.map_err(map_ureq_error)?;
        let status = response.status();
        let body = response.body_mut().read_to_string().map_err(map_ureq_error)?;

        match serde_json::from_str::<Value>(&body) {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => Err(Error::Http {
                status: status.as_u16(),
                body,
            }),
            Err(e) => Err(Error::Transport(format!("invalid json from {}: {}", request.path, e))),
        }
    }
}

fn map_ureq_error(err: ureq::Error) -> Error {
    match &err {
        ureq::Error::Timeout(_) => Error::Timeout(err.to_string()),
        ureq::Error::Io(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
            Error::Timeout(e.to_string())
        }
        _ => Error::Transport(err.to_string()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_base_url_and_path() {
        let transport = UreqTransport::new("https://neviweb.com/", Duration::from_secs(1));
        assert_eq!(transport.url("/api/gateway"), "https://neviweb.com/api/gateway");
        assert_eq!(transport.url("api/logout"), "https://neviweb.com/api/logout");
    }

    #[test]
    fn io_timeouts_map_to_timeout() {
        let err = map_ureq_error(ureq::Error::Io(io::Error::new(io::ErrorKind::TimedOut, "read")));
        assert!(err.is_timeout());

        let err = map_ureq_error(ureq::Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")));
        assert!(matches!(err, Error::Transport(_)));
    }
}
