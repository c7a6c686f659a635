#![allow(dead_code)]

use carrier_infinity::System;
use serde_json::{json, Value};

pub const SYSTEMS_RESPONSE: &str = include_str!("../fixtures/systems.json");
pub const ENERGY_RESPONSE: &str = include_str!("../fixtures/energy.json");
pub const SERIAL: &str = "SERIALXXX";

pub fn systems() -> Vec<System> {
    let systems: Value = serde_json::from_str(SYSTEMS_RESPONSE).unwrap();
    let energy: Value = serde_json::from_str(ENERGY_RESPONSE).unwrap();
    systems["data"]["infinitySystems"]
        .as_array()
        .unwrap()
        .iter()
        .map(|raw| System::from_snapshot(raw.clone(), Some(energy["data"]["infinityEnergy"].clone())).unwrap())
        .collect()
}

/// Wraps `payload` in a realtime envelope addressed to the fixture system.
pub fn frame(kind: &str, payload: Value) -> String {
    let mut frame = json!({
        "messageType": kind,
        "deviceId": SERIAL,
        "timestamp": 1741009500000u64,
        "updatedTime": "2025-03-03T13:45:00.000Z",
    });
    if let (Some(frame), Value::Object(payload)) = (frame.as_object_mut(), payload) {
        frame.extend(payload);
    }
    frame.to_string()
}

pub fn status_frame(payload: Value) -> String {
    frame("InfinityStatus", payload)
}

pub fn config_frame(payload: Value) -> String {
    frame("InfinityConfig", payload)
}

pub fn login_response(expires_in: i64) -> Value {
    json!({
        "data": {
            "assistedLogin": {
                "success": true,
                "status": "SUCCESS",
                "errorMessage": null,
                "data": {
                    "token_type": "Bearer",
                    "expires_in": expires_in,
                    "access_token": "access-1",
                    "scope": "offline_access",
                    "refresh_token": "refresh-1"
                }
            }
        }
    })
}
