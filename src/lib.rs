//! Blocking client for the Sinopé Neviweb thermostat cloud API.
//!
//! A [`Session`] logs in and owns the account's [`Gateway`]s; each gateway owns the
//! [`Thermostat`]s that answered during its last refresh.
//!
//! ```no_run
//! use neviweb::{Mode, Session};
//!
//! let mut session = Session::new("me@example.com", "secret");
//! session.connect()?;
//! session.refresh_gateways()?;
//! let bedroom = session.get_thermostat_mut("Bedroom")?;
//! bedroom.set_setpoint(20.5)?;
//! assert_eq!(bedroom.mode()?, Some(Mode::Manual));
//! session.disconnect();
//! # Ok::<(), neviweb::Error>(())
//! ```

pub mod models {
    pub mod neviweb;
}

mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod session;
pub mod thermostat;
pub mod transport;

pub use client::{BASE_URL, DEFAULT_TIMEOUT};
pub use error::{Error, Result};
pub use gateway::Gateway;
pub use models::neviweb::{DeviceId, GatewayId};
pub use session::{Session, SessionBuilder};
pub use thermostat::{LiveFields, Mode, Thermostat};
pub use transport::{ApiRequest, Transport, UreqTransport};
