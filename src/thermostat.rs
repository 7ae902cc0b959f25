use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use crate::client::{NeviwebClient, check_device_envelope, check_envelope, decode, expect_object};
use crate::error::{Error, Result};
use crate::models::neviweb::{DeviceData, DeviceId, DeviceRecord, GatewayId};

/// Operating mode as reported by the device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Mode {
    Manual,
    Automatic,
    /// Any code the client cannot write, e.g. `0` (off) or `5` (away).
    Other(i64),
}

impl Mode {
    pub const MANUAL: i64 = 2;
    pub const AUTOMATIC: i64 = 3;

    pub fn from_code(code: i64) -> Self {
        match code {
            Self::MANUAL => Mode::Manual,
            Self::AUTOMATIC => Mode::Automatic,
            other => Mode::Other(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Mode::Manual => Self::MANUAL,
            Mode::Automatic => Self::AUTOMATIC,
            Mode::Other(code) => code,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Manual => write!(f, "manual"),
            Mode::Automatic => write!(f, "automatic"),
            Mode::Other(code) => write!(f, "mode {}", code),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Mode::Manual),
            "automatic" | "auto" => Ok(Mode::Automatic),
            other => other
                .parse::<i64>()
                .map(Mode::from_code)
                .map_err(|_| format!("unknown mode `{}` (expected manual or automatic)", s)),
        }
    }
}

/// Cached device readings; `None` means the server has not reported a value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveFields {
    pub alarm: Option<i64>,
    pub error_code: Option<String>,
    pub heat_level: Option<i64>,
    pub mode: Option<i64>,
    pub setpoint: Option<f64>,
    pub temperature: Option<f64>,
}

impl LiveFields {
    fn merge(&mut self, data: DeviceData) {
        fn take<T>(slot: &mut Option<T>, incoming: Option<Option<T>>) {
            if let Some(value) = incoming {
                *slot = value;
            }
        }
        take(&mut self.alarm, data.alarm);
        take(&mut self.error_code, data.error_code);
        take(&mut self.heat_level, data.heat_level);
        take(&mut self.mode, data.mode);
        take(&mut self.setpoint, data.setpoint);
        take(&mut self.temperature, data.temperature);
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LiveState {
    Uninitialized,
    Initialized {
        fields: LiveFields,
        refreshed_at: DateTime<Utc>,
    },
}

/// One thermostat as last seen by [`Thermostat::refresh`] or a write.
#[derive(Debug)]
pub struct Thermostat {
    client: Rc<NeviwebClient>,
    record: DeviceRecord,
    state: LiveState,
}

impl Thermostat {
    pub(crate) fn new(client: Rc<NeviwebClient>, record: DeviceRecord) -> Self {
        debug!("Initializing thermostat from {:?}", record);
        Thermostat {
            client,
            record,
            state: LiveState::Uninitialized,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn gateway_id(&self) -> GatewayId {
        self.record.gateway_id
    }

    pub fn model(&self) -> i64 {
        self.record.model
    }

    /// Device type code (`type` on the wire).
    pub fn kind(&self) -> i64 {
        self.record.r#type
    }

    pub fn is_active(&self) -> bool {
        self.record.active
    }

    pub fn temp_min(&self) -> f64 {
        self.record.temp_min
    }

    pub fn temp_max(&self) -> f64 {
        self.record.temp_max
    }

    pub fn timeout(&self) -> Duration {
        self.client.timeout()
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, LiveState::Initialized { .. })
    }

    /// Time of the last successful refresh or write, `None` before the first one.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            LiveState::Initialized { refreshed_at, .. } => Some(*refreshed_at),
            LiveState::Uninitialized => None,
        }
    }

    pub fn live(&self) -> Result<&LiveFields> {
        match &self.state {
            LiveState::Initialized { fields, .. } => Ok(fields),
            LiveState::Uninitialized => Err(Error::Uninitialized),
        }
    }

    pub fn temperature(&self) -> Result<Option<f64>> {
        Ok(self.live()?.temperature)
    }

    pub fn setpoint(&self) -> Result<Option<f64>> {
        Ok(self.live()?.setpoint)
    }

    pub fn mode(&self) -> Result<Option<Mode>> {
        Ok(self.live()?.mode.map(Mode::from_code))
    }

    pub fn alarm(&self) -> Result<Option<i64>> {
        Ok(self.live()?.alarm)
    }

    pub fn error_code(&self) -> Result<Option<&str>> {
        Ok(self.live()?.error_code.as_deref())
    }

    pub fn heat_level(&self) -> Result<Option<i64>> {
        Ok(self.live()?.heat_level)
    }

    /// Fetch current device data (forcing the gateway to poll the device).
    pub fn refresh(&mut self) -> Result<()> {
        let path = format!("/api/device/{}/data", self.record.id);
        let response = self.client.get(&path, &[("force", "1".to_string())])?;
        debug!("Thermostat {} data: {}", self.record.id, response);
        expect_object(&response)?;
        check_device_envelope(&response)?;
        let data: DeviceData = decode(response)?;
        self.apply(data);
        Ok(())
    }

    /// Write a new setpoint. The device only accepts setpoints in manual mode,
    /// so manual mode is written first.
    pub fn set_setpoint(&mut self, value: f64) -> Result<()> {
        self.live()?;
        let (min, max) = (self.record.temp_min, self.record.temp_max);
        if !value.is_finite() || value < min || value > max {
            return Err(Error::Validation(format!(
                "setpoint must be between {} and {}, got {}",
                min, max, value
            )));
        }

        self.set_mode(Mode::Manual)?;
        // `{:?}` keeps the decimal point: 20.0 is sent as "20.0"
        self.write("setpoint", &[("temperature", format!("{:?}", value))])
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.live()?;
        if let Mode::Other(code) = mode {
            return Err(Error::Validation(format!(
                "mode must be one of {} (manual) or {} (automatic), got {}",
                Mode::MANUAL,
                Mode::AUTOMATIC,
                code
            )));
        }
        self.write("mode", &[("mode", mode.code().to_string())])
    }

    fn write(&mut self, resource: &str, form: &[(&str, String)]) -> Result<()> {
        let path = format!("/api/device/{}/{}", self.record.id, resource);
        let response = self.client.put_form(&path, form)?;
        debug!("PUT response: {}", response);
        expect_object(&response)?;
        check_envelope(&response)?;
        if response.get(resource).is_none() {
            return Err(Error::MissingField {
                field: resource.to_string(),
            });
        }
        let data: DeviceData = decode(response)?;
        self.apply(data);
        Ok(())
    }

    fn apply(&mut self, data: DeviceData) {
        if let Some(Some(code)) = &data.error_code {
            if !code.is_empty() && code != "0" {
                warn!("Thermostat {}({}) error code: {}", self.record.name, self.record.id, code);
            }
        }

        let now = Utc::now();
        if let LiveState::Initialized { fields, refreshed_at } = &mut self.state {
            fields.merge(data);
            *refreshed_at = now;
            return;
        }

        let mut fields = LiveFields::default();
        fields.merge(data);
        self.state = LiveState::Initialized {
            fields,
            refreshed_at: now,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeTransport;
    use http::Method;
    use rstest::rstest;
    use serde_json::json;

    fn bedroom(fake: &FakeTransport) -> Thermostat {
        let record: DeviceRecord = serde_json::from_value(json!({
            "id": 11, "name": "Bedroom", "gatewayId": 7, "active": 1,
            "model": 1120, "type": 10, "tempMin": 5.0, "tempMax": 30.0
        }))
        .unwrap();
        Thermostat::new(fake.connected_client(), record)
    }

    fn refreshed(fake: &FakeTransport) -> Thermostat {
        fake.ok(
            Method::GET,
            "/api/device/11/data",
            json!({"temperature": 19.0, "setpoint": 18.0, "mode": 2, "alarm": 0, "heatLevel": 40}),
        );
        let mut thermostat = bedroom(fake);
        thermostat.refresh().unwrap();
        thermostat
    }

    #[test]
    fn live_fields_need_a_refresh() {
        let fake = FakeTransport::new();
        let mut thermostat = bedroom(&fake);

        assert!(matches!(thermostat.temperature(), Err(Error::Uninitialized)));
        assert!(matches!(thermostat.setpoint(), Err(Error::Uninitialized)));
        assert!(matches!(thermostat.mode(), Err(Error::Uninitialized)));
        assert!(matches!(thermostat.set_setpoint(20.0), Err(Error::Uninitialized)));
        assert!(matches!(thermostat.set_mode(Mode::Manual), Err(Error::Uninitialized)));
        assert!(thermostat.refreshed_at().is_none());
        assert!(fake.requests().is_empty());

        // identity fields are readable right away
        assert_eq!(thermostat.name(), "Bedroom");
        assert_eq!(thermostat.gateway_id(), GatewayId(7));
        assert!(thermostat.is_active());
    }

    #[test]
    fn refresh_requests_forced_data() {
        let fake = FakeTransport::new();
        let thermostat = refreshed(&fake);

        let requests = fake.requests();
        let request = &requests[0];
        assert_eq!(request.query, vec![("force".to_string(), "1".to_string())]);
        assert_eq!(thermostat.temperature().unwrap(), Some(19.0));
        assert_eq!(thermostat.mode().unwrap(), Some(Mode::Manual));
        assert_eq!(thermostat.heat_level().unwrap(), Some(40));
        assert!(thermostat.refreshed_at().is_some());
    }

    #[test]
    fn later_refresh_keeps_absent_fields() {
        let fake = FakeTransport::new();
        let mut thermostat = refreshed(&fake);
        fake.ok(Method::GET, "/api/device/11/data", json!({"temperature": 19.5, "setpoint": null}));

        thermostat.refresh().unwrap();
        assert_eq!(thermostat.temperature().unwrap(), Some(19.5));
        assert_eq!(thermostat.setpoint().unwrap(), None);
        assert_eq!(thermostat.mode().unwrap(), Some(Mode::Manual));
    }

    #[test]
    fn refresh_rejects_error_envelopes() {
        let fake = FakeTransport::new();
        fake.ok(Method::GET, "/api/device/11/data", json!({"error": {"code": "DVCCOMMTO"}}));
        let mut thermostat = bedroom(&fake);

        assert!(thermostat.refresh().unwrap_err().is_protocol());
        assert!(!thermostat.is_initialized());
    }

    #[rstest]
    #[case(json!([]))]
    #[case(json!([{"temperature": 19.0}]))]
    #[case(json!("OK"))]
    fn refresh_rejects_non_object_bodies(#[case] body: serde_json::Value) {
        let fake = FakeTransport::new();
        fake.ok(Method::GET, "/api/device/11/data", body);
        let mut thermostat = bedroom(&fake);

        let err = thermostat.refresh().unwrap_err();
        assert!(matches!(err, Error::Protocol { ref code, .. } if code == "unexpected_payload"));
        assert!(!thermostat.is_initialized());
    }

    #[test]
    fn write_rejects_non_object_bodies() {
        let fake = FakeTransport::new();
        let mut thermostat = refreshed(&fake);
        let before = thermostat.live().unwrap().clone();
        fake.ok(Method::PUT, "/api/device/11/mode", json!([{"mode": 3}]));

        let err = thermostat.set_mode(Mode::Automatic).unwrap_err();
        assert!(matches!(err, Error::Protocol { ref code, .. } if code == "unexpected_payload"));
        assert_eq!(thermostat.live().unwrap(), &before);
    }

    #[test]
    fn lenient_live_values_do_not_fail_the_refresh() {
        let fake = FakeTransport::new();
        fake.ok(
            Method::GET,
            "/api/device/11/data",
            json!({"alarm": false, "setpoint": "20.00", "temperature": 19.5, "mode": "3"}),
        );
        let mut thermostat = bedroom(&fake);

        thermostat.refresh().unwrap();
        assert_eq!(thermostat.alarm().unwrap(), Some(0));
        assert_eq!(thermostat.setpoint().unwrap(), Some(20.0));
        assert_eq!(thermostat.mode().unwrap(), Some(Mode::Automatic));
    }

    #[test]
    fn setpoint_forces_manual_mode_first() {
        let fake = FakeTransport::new();
        let mut thermostat = refreshed(&fake);
        fake.ok(Method::PUT, "/api/device/11/mode", json!({"mode": 2}));
        fake.ok(Method::PUT, "/api/device/11/setpoint", json!({"setpoint": 20.0}));

        thermostat.set_setpoint(20.0).unwrap();

        let requests = fake.requests();
        assert_eq!(
            fake.paths()[1..],
            ["PUT /api/device/11/mode".to_string(), "PUT /api/device/11/setpoint".to_string()]
        );
        assert_eq!(requests[1].form, vec![("mode".to_string(), "2".to_string())]);
        assert_eq!(requests[2].form, vec![("temperature".to_string(), "20.0".to_string())]);
        assert_eq!(thermostat.setpoint().unwrap(), Some(20.0));
    }

    #[rstest]
    #[case(4.9)]
    #[case(30.5)]
    #[case(-40.0)]
    #[case(f64::NAN)]
    fn setpoint_outside_bounds_is_rejected_locally(#[case] value: f64) {
        let fake = FakeTransport::new();
        let mut thermostat = refreshed(&fake);

        assert!(matches!(thermostat.set_setpoint(value), Err(Error::Validation(_))));
        assert_eq!(fake.requests().len(), 1);
    }

    #[rstest]
    #[case(5.0)]
    #[case(30.0)]
    fn setpoint_bounds_are_inclusive(#[case] value: f64) {
        let fake = FakeTransport::new();
        let mut thermostat = refreshed(&fake);
        fake.ok(Method::PUT, "/api/device/11/mode", json!({"mode": 2}));
        fake.ok(Method::PUT, "/api/device/11/setpoint", json!({"setpoint": value}));

        thermostat.set_setpoint(value).unwrap();
        assert_eq!(thermostat.setpoint().unwrap(), Some(value));
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(4)]
    #[case(5)]
    fn unsupported_modes_are_rejected(#[case] code: i64) {
        let fake = FakeTransport::new();
        let mut thermostat = refreshed(&fake);

        assert!(matches!(thermostat.set_mode(Mode::from_code(code)), Err(Error::Validation(_))));
        assert_eq!(fake.requests().len(), 1);
    }

    #[test]
    fn set_mode_applies_the_response() {
        let fake = FakeTransport::new();
        let mut thermostat = refreshed(&fake);
        fake.ok(Method::PUT, "/api/device/11/mode", json!({"mode": 3}));

        thermostat.set_mode(Mode::Automatic).unwrap();
        assert_eq!(thermostat.mode().unwrap(), Some(Mode::Automatic));
    }

    #[test]
    fn write_without_echoed_field_leaves_cache_untouched() {
        let fake = FakeTransport::new();
        let mut thermostat = refreshed(&fake);
        let before = thermostat.live().unwrap().clone();
        fake.ok(Method::PUT, "/api/device/11/mode", json!({"setpoint": 25.0}));

        let err = thermostat.set_mode(Mode::Automatic).unwrap_err();
        assert!(matches!(err, Error::MissingField { ref field } if field == "mode"));
        assert!(err.is_protocol());
        assert_eq!(thermostat.live().unwrap(), &before);
    }

    #[test]
    fn write_error_envelope_propagates() {
        let fake = FakeTransport::new();
        let mut thermostat = refreshed(&fake);
        fake.ok(Method::PUT, "/api/device/11/mode", json!({"code": "ACCDENIED", "message": "denied"}));

        let err = thermostat.set_setpoint(21.0).unwrap_err();
        assert!(matches!(err, Error::Protocol { ref code, .. } if code == "ACCDENIED"));
        // setpoint PUT never sent
        assert_eq!(fake.requests().len(), 2);
    }

    #[test]
    fn write_timeout_propagates() {
        let fake = FakeTransport::new();
        let mut thermostat = refreshed(&fake);
        fake.reply(Method::PUT, "/api/device/11/mode", Err(Error::Timeout("global".into())));

        assert!(thermostat.set_mode(Mode::Manual).unwrap_err().is_timeout());
    }

    #[test]
    fn mode_parses_from_cli_words() {
        assert_eq!("manual".parse::<Mode>().unwrap(), Mode::Manual);
        assert_eq!("Automatic".parse::<Mode>().unwrap(), Mode::Automatic);
        assert_eq!("5".parse::<Mode>().unwrap(), Mode::Other(5));
        assert!("sideways".parse::<Mode>().is_err());
    }
}
