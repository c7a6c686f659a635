use chrono::{DateTime, NaiveTime, Utc};
use serde_json::Value;

use crate::raw::{
    id_string, is_on, opt_f64, opt_flag, opt_i64, opt_str, opt_string, opt_time, parse_enum,
};
use crate::types::*;
use crate::{Error, Result};

/// Live telemetry for one enabled zone.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusZone {
    pub id: String,
    pub name: Option<String>,
    pub current_activity: ActivityType,
    pub temperature: Option<f64>,
    pub humidity: Option<i64>,
    pub occupancy: Option<bool>,
    pub fan: FanMode,
    pub hold: bool,
    pub hold_until: Option<NaiveTime>,
    pub heat_set_point: Option<f64>,
    pub cool_set_point: Option<f64>,
    pub conditioning: Option<String>,
}

impl StatusZone {
    pub(crate) fn from_raw(zone: &Value) -> Result<Self> {
        Ok(Self {
            id: zone
                .get("id")
                .and_then(id_string)
                .ok_or(Error::MissingField("id"))?,
            name: opt_string(zone, "name"),
            current_activity: parse_enum(zone, "currentActivity", ActivityType::from_carrier_str)?,
            temperature: opt_f64(zone, "rt"),
            humidity: opt_i64(zone, "rh"),
            occupancy: opt_str(zone, "occupancy").map(|s| s == "occupied"),
            fan: parse_enum(zone, "fan", FanMode::from_carrier_str)?,
            hold: is_on(zone, "hold"),
            hold_until: opt_time(zone, "otmr")?,
            heat_set_point: opt_f64(zone, "htsp"),
            cool_set_point: opt_f64(zone, "clsp"),
            conditioning: opt_string(zone, "zoneconditioning"),
        })
    }

    /// What the zone is doing right now, from the raw conditioning string.
    pub fn conditioning_mode(&self) -> Result<SystemMode> {
        match self.conditioning.as_deref() {
            Some("active_heat" | "prep_heat" | "pending_heat") => Ok(SystemMode::Heat),
            Some("active_cool" | "prep_cool" | "pending_cool") => Ok(SystemMode::Cool),
            Some("idle") => Ok(SystemMode::Off),
            other => Err(Error::UnrecognizedValue {
                field: "zoneconditioning",
                value: other.unwrap_or_default().to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndoorUnit {
    pub unit_type: Option<String>,
    pub operational_status: Option<String>,
    pub airflow_cfm: Option<i64>,
    pub blower_rpm: Option<i64>,
    pub static_pressure: Option<f64>,
}

impl IndoorUnit {
    fn from_raw(idu: &Value) -> Self {
        Self {
            unit_type: opt_string(idu, "type"),
            operational_status: opt_string(idu, "opstat"),
            airflow_cfm: opt_i64(idu, "cfm"),
            blower_rpm: opt_i64(idu, "blwrpm"),
            static_pressure: opt_f64(idu, "statpress"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutdoorUnit {
    pub unit_type: Option<String>,
    pub operational_status: Option<String>,
}

impl OutdoorUnit {
    fn from_raw(odu: &Value) -> Self {
        Self {
            unit_type: opt_string(odu, "type"),
            operational_status: opt_string(odu, "opstat"),
        }
    }
}

/// Typed projection of a system's live status document.
///
/// The raw document is kept alongside the projection; realtime deltas are
/// merged into the raw tree and the projection is rebuilt from it, so
/// fields this struct does not model survive every merge.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub(crate) raw: Value,
    pub outdoor_temperature: Option<f64>,
    pub mode: Option<String>,
    pub temperature_unit: TemperatureUnit,
    pub filter_used: Option<i64>,
    pub humidity_level: Option<i64>,
    pub humidifier_on: Option<bool>,
    pub uv_lamp_level: Option<i64>,
    pub is_disconnected: Option<bool>,
    pub indoor_unit: IndoorUnit,
    pub outdoor_unit: OutdoorUnit,
    pub time_stamp: Option<DateTime<Utc>>,
    pub zones: Vec<StatusZone>,
}

impl Status {
    /// Builds the projection. Zones whose `enabled` flag is not on are
    /// left out of `zones` but stay in the raw document.
    pub fn from_raw(raw: Value) -> Result<Self> {
        let zones = match raw.get("zones").and_then(|z| z.as_array()) {
            Some(zones) => zones
                .iter()
                .filter(|z| is_on(z, "enabled"))
                .map(StatusZone::from_raw)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let time_stamp = match opt_str(&raw, "utcTime") {
            Some(s) => Some(
                DateTime::parse_from_rfc3339(s)
                    .map_err(|_| Error::UnrecognizedValue {
                        field: "utcTime",
                        value: s.to_string(),
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        Ok(Self {
            outdoor_temperature: opt_f64(&raw, "oat"),
            mode: opt_string(&raw, "mode"),
            temperature_unit: parse_enum(&raw, "cfgem", TemperatureUnit::from_carrier_str)?,
            filter_used: opt_i64(&raw, "filtrlvl"),
            humidity_level: opt_i64(&raw, "humlvl"),
            humidifier_on: opt_flag(&raw, "humid"),
            uv_lamp_level: opt_i64(&raw, "uvlvl"),
            is_disconnected: opt_flag(&raw, "isDisconnected"),
            indoor_unit: raw.get("idu").map(IndoorUnit::from_raw).unwrap_or_default(),
            outdoor_unit: raw.get("odu").map(OutdoorUnit::from_raw).unwrap_or_default(),
            time_stamp,
            zones,
            raw,
        })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn zone(&self, id: &str) -> Option<&StatusZone> {
        self.zones.iter().find(|z| z.id == id)
    }

    /// Collapses the controller's equipment-level mode string into a
    /// system mode.
    pub fn operating_mode(&self) -> Result<SystemMode> {
        match self.mode.as_deref() {
            Some("gasheat" | "electric" | "hpheat" | "heat") => Ok(SystemMode::Heat),
            Some("dehumidify" | "cool") => Ok(SystemMode::Cool),
            Some("off") => Ok(SystemMode::Off),
            Some("fanonly") => Ok(SystemMode::FanOnly),
            Some("auto") => Ok(SystemMode::Auto),
            other => Err(Error::UnrecognizedValue {
                field: "mode",
                value: other.unwrap_or_default().to_string(),
            }),
        }
    }
}
