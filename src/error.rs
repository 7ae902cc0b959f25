//! Error type shared by the session, gateway and thermostat layers.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Login was rejected or the login response carried no session token.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// An authenticated call was attempted without a session token.
    #[error("not connected: call Session::connect first")]
    NotConnected,

    /// The service answered with an error envelope (`code` or `error` key).
    #[error("server error {code}: {message}")]
    Protocol { code: String, message: String },

    /// A write response did not echo the field that was written.
    #[error("{field} not found in PUT response, write unsuccessful")]
    MissingField { field: String },

    #[error("gateway list is empty")]
    EmptyGatewayList,

    #[error("invalid value: {0}")]
    Validation(String),

    /// A live field was used before the first successful refresh.
    #[error("thermostat state is uninitialized: call Thermostat::refresh first")]
    Uninitialized,

    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success status whose body was not JSON.
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("unexpected payload: {0}")]
    Decode(#[from] serde_path_to_error::Error<serde_json::Error>),
}

impl Error {
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication(_) | Error::NotConnected)
    }

    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::Protocol { .. } | Error::MissingField { .. } | Error::EmptyGatewayList
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    pub(crate) fn not_found(kind: &'static str, name: &str) -> Self {
        Error::NotFound {
            kind,
            name: name.to_string(),
        }
    }
}
