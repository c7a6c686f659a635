use serde::{Deserialize, Serialize};

/// Hardware identity of a controller and its attached equipment.
///
/// Only replaced by a full re-fetch; realtime deltas never touch it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: Option<String>,
    pub serial: String,
    pub model: Option<String>,
    pub brand: Option<String>,
    pub firmware: Option<String>,
    #[serde(rename = "indoorModel")]
    pub indoor_model: Option<String>,
    #[serde(rename = "indoorSerial")]
    pub indoor_serial: Option<String>,
    #[serde(rename = "idutype")]
    pub indoor_unit_type: Option<String>,
    #[serde(rename = "idusource")]
    pub indoor_unit_source: Option<String>,
    #[serde(rename = "outdoorModel")]
    pub outdoor_model: Option<String>,
    #[serde(rename = "outdoorSerial")]
    pub outdoor_serial: Option<String>,
    #[serde(rename = "odutype")]
    pub outdoor_unit_type: Option<String>,
}
