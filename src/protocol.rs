use serde_json::{json, Value};

use crate::types::*;
use crate::{Error, Result};

pub const LOGIN_OPERATION: &str = "assistedLogin";
pub const SYSTEMS_OPERATION: &str = "getInfinitySystems";
pub const ENERGY_OPERATION: &str = "getInfinityEnergy";
pub const USER_OPERATION: &str = "getUser";
pub const UPDATE_CONFIG_OPERATION: &str = "updateInfinityConfig";
pub const UPDATE_ZONE_CONFIG_OPERATION: &str = "updateInfinityZoneConfig";
pub const UPDATE_ZONE_ACTIVITY_OPERATION: &str = "updateInfinityZoneActivity";

pub const LOGIN_MUTATION: &str = r#"mutation assistedLogin($input: AssistedLoginInput!) {
  assistedLogin(input: $input) {
    success
    status
    errorMessage
    data {
      token_type
      expires_in
      access_token
      scope
      refresh_token
    }
  }
}"#;

pub const USER_QUERY: &str = r#"query getUser($userName: String!, $appVersion: String, $brand: String, $os: String, $osVersion: String) {
  user(userName: $userName, appVersion: $appVersion, brand: $brand, os: $os, osVersion: $osVersion) {
    username
    identityId
    first
    last
    email
    emailVerified
    postal
    locations {
      locationId
      name
      city
      state
      country
      postal
      systems {
        config { zones { id enabled } }
        profile { serial name }
        status { isDisconnected }
      }
      devices { deviceId type thingName name connectionStatus }
    }
  }
}"#;

pub const SYSTEMS_QUERY: &str = r#"query getInfinitySystems($userName: String!) {
  infinitySystems(userName: $userName) {
    profile {
      serial name firmware model brand
      indoorModel indoorSerial idutype idusource
      outdoorModel outdoorSerial odutype
    }
    status {
      localTime localTimeOffset utcTime wcTime isDisconnected cfgem mode vacatrunning oat
      odu { type opstat }
      filtrlvl
      idu { type opstat cfm statpress blwrpm }
      vent ventlvl humid humlvl uvlvl
      zones { id rt rh fan htsp clsp hold enabled currentActivity otmr occupancy zoneconditioning }
    }
    config {
      etag mode cfgem cfgdead cfghumid erate grate heatsource
      vacat vacstart vacend vacmint vacmaxt vacfan
      fueltype gasunit cfgvent cfguv cfgfan filtertype filterinterval
      humidityVacation { rclgovercool ventspdclg ventclg rhtg humidifier humid venthtg rclg ventspdhtg }
      zones {
        id name enabled hold holdActivity otmr occEnabled
        program {
          id
          day {
            id zoneId
            period { id zoneId dayId activity time enabled }
          }
        }
        activities { id zoneId type fan previousFan htsp clsp }
      }
      wholeHouse {
        hold holdActivity otmr
        activities { id htsp clsp fan }
      }
      humidityAway { humid humidifier rhtg rclg rclgovercool }
      humidityHome { humid humidifier rhtg rclg rclgovercool }
    }
  }
}"#;

pub const ENERGY_QUERY: &str = r#"query getInfinityEnergy($serial: String!) {
  infinityEnergy(serial: $serial) {
    energyConfig {
      cooling { display enabled }
      eheat { display enabled }
      fan { display enabled }
      fangas { display enabled }
      gas { display enabled }
      hpheat { display enabled }
      looppump { display enabled }
      reheat { display enabled }
      hspf
      seer
    }
    energyPeriods {
      energyPeriodType eHeatKwh coolingKwh fanGasKwh fanKwh hPHeatKwh loopPumpKwh gasKwh reheatKwh
    }
  }
}"#;

pub const UPDATE_CONFIG_MUTATION: &str = r#"mutation updateInfinityConfig($input: InfinityConfigInput!) {
  updateInfinityConfig(input: $input) { etag }
}"#;

pub const UPDATE_ZONE_CONFIG_MUTATION: &str = r#"mutation updateInfinityZoneConfig($input: InfinityZoneConfigInput!) {
  updateInfinityZoneConfig(input: $input) { etag }
}"#;

pub const UPDATE_ZONE_ACTIVITY_MUTATION: &str = r#"mutation updateInfinityZoneActivity($input: InfinityZoneActivityInput!) {
  updateInfinityZoneActivity(input: $input) { etag }
}"#;

const HUMIDIFIER_STEP: u8 = 5;
const HUMIDIFIER_MAX: u8 = 45;

pub fn graphql_request(operation: &str, query: &str, variables: Value) -> Value {
    json!({
        "operationName": operation,
        "query": query,
        "variables": variables,
    })
}

pub fn login_variables(username: &str, password: &str) -> Value {
    json!({ "input": { "username": username, "password": password } })
}

pub fn user_variables(username: &str) -> Value {
    json!({ "userName": username })
}

pub fn energy_variables(serial: &str) -> Value {
    json!({ "serial": serial })
}

pub fn refresh_form<'a>(client_id: &'a str, refresh_token: &'a str) -> [(&'static str, &'a str); 4] {
    [
        ("client_id", client_id),
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("scope", "offline_access"),
    ]
}

pub fn mode_variables(serial: &str, mode: SystemMode) -> Value {
    json!({ "input": { "serial": serial, "mode": mode.as_carrier_str() } })
}

pub fn heat_source_variables(serial: &str, heat_source: HeatSource) -> Value {
    json!({ "input": { "serial": serial, "heatsource": heat_source.as_carrier_str() } })
}

pub fn hold_variables(serial: &str, zone_id: &str, activity: ActivityType, hold_until: Option<&str>) -> Value {
    json!({
        "input": {
            "serial": serial,
            "hold": "on",
            "holdActivity": activity.as_carrier_str(),
            "otmr": hold_until,
            "zoneId": zone_id,
        }
    })
}

pub fn resume_schedule_variables(serial: &str, zone_id: &str) -> Value {
    json!({
        "input": {
            "serial": serial,
            "hold": "off",
            "holdActivity": null,
            "otmr": null,
            "zoneId": zone_id,
        }
    })
}

pub fn manual_activity_variables(
    serial: &str,
    zone_id: &str,
    heat_set_point: f64,
    cool_set_point: f64,
    fan: FanMode,
) -> Value {
    json!({
        "input": {
            "serial": serial,
            "activityType": ActivityType::Manual.as_carrier_str(),
            "clsp": cool_set_point,
            "fan": fan.as_carrier_str(),
            "htsp": heat_set_point,
            "zoneId": zone_id,
        }
    })
}

pub fn activity_fan_variables(serial: &str, zone_id: &str, activity: ActivityType, fan: FanMode) -> Value {
    json!({
        "input": {
            "serial": serial,
            "activityType": activity.as_carrier_str(),
            "fan": fan.as_carrier_str(),
            "zoneId": zone_id,
        }
    })
}

/// Humidifier settings for the home profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HumidifierSettings {
    pub on: bool,
    pub over_cooling: Option<bool>,
    /// Multiple of 5 in 5..=45.
    pub cooling_percent: Option<u8>,
    /// Multiple of 5 in 5..=45.
    pub heating_percent: Option<u8>,
}

fn humidity_step(field: &str, percent: u8) -> Result<u8> {
    if percent == 0 || percent > HUMIDIFIER_MAX || percent % HUMIDIFIER_STEP != 0 {
        return Err(Error::InvalidArgument(format!(
            "{field} {percent} must be a multiple of {HUMIDIFIER_STEP} between {HUMIDIFIER_STEP} and {HUMIDIFIER_MAX}"
        )));
    }
    Ok(percent / HUMIDIFIER_STEP)
}

pub fn humidifier_variables(serial: &str, settings: &HumidifierSettings) -> Result<Value> {
    let mut home = if settings.on {
        json!({ "humid": "manual", "humidifier": "on" })
    } else {
        json!({ "humid": "off", "humidifier": "off" })
    };
    if let Some(over_cooling) = settings.over_cooling {
        home["rclgovercool"] = json!(if over_cooling { "on" } else { "off" });
    }
    if let Some(percent) = settings.cooling_percent {
        home["rclg"] = json!(humidity_step("cooling percent", percent)?);
    }
    if let Some(percent) = settings.heating_percent {
        home["rhtg"] = json!(humidity_step("heating percent", percent)?);
    }
    Ok(json!({ "input": { "serial": serial, "humidityHome": home } }))
}

pub fn keepalive_message() -> Value {
    json!({ "action": "keepalive" })
}

pub fn reconcile_message() -> Value {
    json!({ "action": "reconcile" })
}

/// Text frame the server sends to ask the client to close the socket.
pub const CLOSE_COMMAND: &str = "close cmd";
