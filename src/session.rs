//! Authenticated session and the gateway inventory it owns.

use log::{debug, info, warn};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::client::{BASE_URL, DEFAULT_TIMEOUT, NeviwebClient, check_envelope, decode};
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::models::neviweb::{GatewayRecord, LoginResponse};
use crate::thermostat::Thermostat;
use crate::transport::{Transport, UreqTransport};

pub struct SessionBuilder {
    email: String,
    password: String,
    timeout: Duration,
    base_url: String,
    transport: Option<Box<dyn Transport>>,
}

impl SessionBuilder {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        SessionBuilder {
            email: email.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
            base_url: BASE_URL.to_string(),
            transport: None,
        }
    }

    /// Deadline applied to every request made by the session, its gateways and thermostats.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the default `ureq` transport. `base_url` is ignored when set.
    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Session {
        let transport = match self.transport {
            Some(t) => t,
            None => Box::new(UreqTransport::new(self.base_url, self.timeout)),
        };
        Session {
            email: self.email,
            password: self.password,
            client: Rc::new(NeviwebClient::new(transport, self.timeout)),
            gateways: Vec::new(),
        }
    }
}

pub struct Session {
    email: String,
    password: String,
    client: Rc<NeviwebClient>,
    gateways: Vec<Gateway>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("client", &self.client)
            .field("gateways", &self.gateways.len())
            .finish()
    }
}

impl Session {
    /// Session against the public service with the default timeout.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        SessionBuilder::new(email, password).build()
    }

    pub fn builder(email: impl Into<String>, password: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(email, password)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timeout(&self) -> Duration {
        self.client.timeout()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn gateways(&self) -> &[Gateway] {
        &self.gateways
    }

    /// Log in and install the session token for every later request.
    pub fn connect(&mut self) -> Result<()> {
        info!("Connecting to neviweb");
        debug!("Logging in as {}", self.email);
        let response = self.client.post_form(
            "/api/login",
            &[
                ("email", self.email.clone()),
                ("password", self.password.clone()),
                ("stayConnected", "0".to_string()),
            ],
        )?;

        check_envelope(&response).map_err(|e| match e {
            Error::Protocol { code, message } => Error::Authentication(format!("{}: {}", code, message)),
            other => other,
        })?;

        let login: LoginResponse = decode(response)?;
        match login.session.filter(|s| !s.is_empty()) {
            Some(token) => {
                self.client.set_session_id(&token)?;
                debug!("Session established");
                Ok(())
            }
            None => Err(Error::Authentication(
                "invalid login response: no session token".to_string(),
            )),
        }
    }

    /// Log out (best effort) and drop the session token.
    pub fn disconnect(&mut self) {
        if !self.client.is_connected() {
            debug!("Disconnect requested without an active session");
            return;
        }
        info!("Disconnecting");
        if let Err(e) = self.client.get("/api/logout", &[]) {
            warn!("Logout request failed: {}", e);
        }
        self.client.clear_session_id();
    }

    /// Start over with a fresh token, e.g. after the server reports an expired session.
    pub fn reconnect(&mut self) -> Result<()> {
        self.disconnect();
        self.connect()
    }

    /// Rebuild the whole inventory: every gateway and every reachable thermostat.
    pub fn refresh_gateways(&mut self) -> Result<()> {
        info!("Getting list of gateways");
        let response = self.client.get("/api/gateway", &[])?;
        check_envelope(&response)?;
        let records: Vec<GatewayRecord> = decode(response)?;
        if records.is_empty() {
            return Err(Error::EmptyGatewayList);
        }

        self.gateways = records
            .into_iter()
            .map(|record| Gateway::new(Rc::clone(&self.client), record))
            .collect();
        for gateway in &mut self.gateways {
            gateway.refresh()?;
        }
        info!("Discovered {} gateway(s)", self.gateways.len());
        Ok(())
    }

    pub fn get_gateway(&self, name: &str) -> Result<&Gateway> {
        self.gateways
            .iter()
            .find(|g| g.name() == name)
            .ok_or_else(|| Error::not_found("gateway", name))
    }

    pub fn get_gateway_mut(&mut self, name: &str) -> Result<&mut Gateway> {
        self.gateways
            .iter_mut()
            .find(|g| g.name() == name)
            .ok_or_else(|| Error::not_found("gateway", name))
    }

    /// First thermostat named `name`, searching gateways in server order.
    pub fn get_thermostat(&self, name: &str) -> Result<&Thermostat> {
        self.gateways
            .iter()
            .flat_map(|g| g.thermostats())
            .find(|t| t.name() == name)
            .ok_or_else(|| Error::not_found("thermostat", name))
    }

    pub fn get_thermostat_mut(&mut self, name: &str) -> Result<&mut Thermostat> {
        self.gateways
            .iter_mut()
            .flat_map(|g| g.thermostats_mut().iter_mut())
            .find(|t| t.name() == name)
            .ok_or_else(|| Error::not_found("thermostat", name))
    }
}
