use log::{debug, info, warn};
use std::rc::Rc;
use std::time::Duration;

use crate::client::{NeviwebClient, check_envelope, decode};
use crate::error::{Error, Result};
use crate::models::neviweb::{DeviceRecord, GatewayId, GatewayRecord};
use crate::thermostat::Thermostat;

/// A hub and the thermostats that answered during its last refresh.
#[derive(Debug)]
pub struct Gateway {
    client: Rc<NeviwebClient>,
    record: GatewayRecord,
    thermostats: Vec<Thermostat>,
}

impl Gateway {
    pub(crate) fn new(client: Rc<NeviwebClient>, record: GatewayRecord) -> Self {
        debug!("Initializing gateway from {:?}", record);
        Gateway {
            client,
            record,
            thermostats: Vec::new(),
        }
    }

    pub fn id(&self) -> GatewayId {
        self.record.id
    }

    pub fn mac(&self) -> &str {
        &self.record.mac_id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn is_active(&self) -> bool {
        self.record.active
    }

    pub fn city(&self) -> Option<&str> {
        self.record.city.as_deref()
    }

    pub fn postal_code(&self) -> Option<&str> {
        self.record.postal_code.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.client.timeout()
    }

    pub fn thermostats(&self) -> &[Thermostat] {
        &self.thermostats
    }

    pub(crate) fn thermostats_mut(&mut self) -> &mut [Thermostat] {
        &mut self.thermostats
    }

    /// Rebuild the thermostat list from the server.
    ///
    /// Thermostats whose data request times out are left out. Any other failure
    /// aborts the refresh and leaves the thermostats gathered so far.
    pub fn refresh(&mut self) -> Result<()> {
        self.thermostats.clear();
        info!("Getting list of thermostats for gateway {}({})", self.record.name, self.record.id);

        let response = self
            .client
            .get("/api/device", &[("gatewayId", self.record.id.to_string())])?;
        check_envelope(&response)?;
        let records: Vec<DeviceRecord> = decode(response)?;

        for record in records {
            let mut thermostat = Thermostat::new(Rc::clone(&self.client), record);
            match thermostat.refresh() {
                Ok(()) => self.thermostats.push(thermostat),
                Err(Error::Timeout(reason)) => warn!(
                    "Thermostat {}({}) is unresponsive ({}), skipping",
                    thermostat.name(),
                    thermostat.id(),
                    reason
                ),
                Err(e) => return Err(e),
            }
        }

        if self.thermostats.is_empty() {
            warn!("No thermostats found in gateway {}({})", self.record.name, self.record.id);
        }
        Ok(())
    }

    pub fn get_thermostat(&self, name: &str) -> Result<&Thermostat> {
        self.thermostats
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| Error::not_found("thermostat", name))
    }

    pub fn get_thermostat_mut(&mut self, name: &str) -> Result<&mut Thermostat> {
        self.thermostats
            .iter_mut()
            .find(|t| t.name() == name)
            .ok_or_else(|| Error::not_found("thermostat", name))
    }
}
