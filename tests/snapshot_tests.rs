mod common;

use carrier_infinity::{
    ActivityType, Error, FanMode, HeatSource, SystemMode, System, TemperatureUnit,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use common::{systems, SERIAL, SYSTEMS_RESPONSE};
use serde_json::{json, Value};

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    // March 2025: the 2nd is a Sunday
    NaiveDate::from_ymd_opt(2025, 3, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

#[test]
fn profile_projection() {
    let systems = systems();
    assert_eq!(systems.len(), 1);
    let system = &systems[0];
    assert_eq!(system.serial(), SERIAL);
    assert_eq!(system.name(), Some("HVAC"));
    assert_eq!(system.profile.brand.as_deref(), Some("Carrier"));
    assert_eq!(system.profile.indoor_unit_type.as_deref(), Some("furnace"));
    assert_eq!(system.profile.outdoor_unit_type.as_deref(), Some("ac2stg"));
}

#[test]
fn status_projection() {
    let status = &systems()[0].status;
    assert_eq!(status.temperature_unit, TemperatureUnit::Fahrenheit);
    assert_eq!(status.outdoor_temperature, Some(30.0));
    assert_eq!(status.operating_mode().unwrap(), SystemMode::Heat);
    assert_eq!(status.humidity_level, Some(19));
    assert_eq!(status.humidifier_on, Some(true));
    assert_eq!(status.is_disconnected, Some(false));
    assert_eq!(status.indoor_unit.airflow_cfm, Some(1239));
    assert_eq!(status.indoor_unit.static_pressure, Some(0.3));
    assert_eq!(status.outdoor_unit.operational_status.as_deref(), Some("off"));
    assert!(status.time_stamp.is_some());

    let ids: Vec<&str> = status.zones.iter().map(|z| z.id.as_str()).collect();
    assert_eq!(ids, ["1", "2"]);

    let zone = status.zone("2").unwrap();
    assert!(zone.hold);
    assert_eq!(zone.hold_until, Some(hm(22, 0)));
    assert_eq!(zone.occupancy, Some(false));
    assert_eq!(zone.conditioning_mode().unwrap(), SystemMode::Off);
    assert!(status.zone("3").is_none());
}

#[test]
fn config_projection() {
    let config = &systems()[0].config;
    assert_eq!(config.etag.as_deref(), Some("14b685b54f679cedf5e34313"));
    assert_eq!(config.mode, Some(SystemMode::Heat));
    assert_eq!(config.heat_source, Some(HeatSource::System));
    assert!(config.humidifier_enabled);
    assert!(!config.uv_enabled);
    assert_eq!(config.fuel_type.as_deref(), Some("gas"));
    assert_eq!(config.vacation_heat_set_point, Some(60.0));
    assert_eq!(config.vacation_cool_set_point, Some(80.0));
    assert_eq!(config.vacation_fan, Some(FanMode::Off));
    assert_eq!(config.zones.len(), 2);

    let zone = config.zone("1").unwrap();
    assert_eq!(zone.name.as_deref(), Some("ZONE 1"));
    assert!(zone.occupancy_enabled);
    let program = zone.program.as_ref().unwrap();
    assert_eq!(program.days.len(), 7);
    // disabled 23:00 period is dropped
    assert_eq!(program.days[0].periods.len(), 4);

    let vacation = zone.find_activity(ActivityType::Vacation).unwrap();
    assert_eq!(vacation.id, "vacation");
    assert_eq!(vacation.heat_set_point, Some(60.0));
    assert_eq!(vacation.cool_set_point, Some(80.0));
    assert_eq!(zone.activities.last(), Some(vacation));
}

#[test]
fn energy_projection() {
    let system = &systems()[0];
    let energy = system.energy.as_ref().unwrap();
    assert_eq!(energy.config.seer, Some(15.0));
    assert_eq!(energy.config.hspf, Some(8.80078125));
    assert!(energy.config.gas.show());
    assert!(energy.config.cooling.show());
    assert!(!energy.config.fan.show());
    assert!(!energy.config.hp_heat.show());

    let year = energy.current_year_measurements().unwrap();
    assert_eq!(year.gas, Some(25905));
    assert_eq!(year.cooling, Some(1132));
    assert_eq!(energy.period("day1").unwrap().gas, Some(64));
    assert!(energy.period("year2").is_none());
}

#[test]
fn scheduled_activity_follows_program() {
    let config = &systems()[0].config;
    let zone = config.zone("1").unwrap();

    let activity = |day, h, m| zone.current_activity_at(at(day, h, m)).unwrap().activity_type;
    assert_eq!(activity(3, 6, 0), ActivityType::Wake);
    assert_eq!(activity(3, 7, 59), ActivityType::Wake);
    assert_eq!(activity(3, 8, 0), ActivityType::Away);
    assert_eq!(activity(3, 17, 30), ActivityType::Home);
    // the disabled 23:00 home period does not apply
    assert_eq!(activity(3, 23, 30), ActivityType::Sleep);
    // before the first period, yesterday's last one is still running
    assert_eq!(activity(3, 5, 0), ActivityType::Sleep);

    let home = zone.current_activity_at(at(3, 18, 0)).unwrap();
    assert_eq!(home.heat_set_point, Some(70.0));
    assert_eq!(home.cool_set_point, Some(76.0));
}

#[test]
fn held_zone_runs_hold_activity() {
    let config = &systems()[0].config;
    let zone = config.zone("2").unwrap();
    let manual = zone.current_activity_at(at(3, 9, 0)).unwrap();
    assert_eq!(manual.activity_type, ActivityType::Manual);
    assert_eq!(manual.fan, Some(FanMode::High));
    assert_eq!(manual.heat_set_point, Some(72.0));
}

#[test]
fn next_activity_time_rolls_to_tomorrow() {
    let config = &systems()[0].config;
    let zone = config.zone("1").unwrap();
    assert_eq!(zone.next_activity_time_at(at(3, 7, 30)), Some(hm(8, 0)));
    assert_eq!(zone.next_activity_time_at(at(3, 8, 0)), Some(hm(17, 0)));
    assert_eq!(zone.next_activity_time_at(at(3, 22, 30)), Some(hm(6, 0)));
}

#[test]
fn missing_section_is_reported() {
    let mut raw: Value = serde_json::from_str(SYSTEMS_RESPONSE).unwrap();
    let mut system = raw["data"]["infinitySystems"][0].take();
    system.as_object_mut().unwrap().remove("config");
    let err = System::from_snapshot(system, None).unwrap_err();
    assert!(matches!(err, Error::MissingField("config")));
}

#[test]
fn unknown_mode_fails_projection() {
    let mut raw: Value = serde_json::from_str(SYSTEMS_RESPONSE).unwrap();
    let mut system = raw["data"]["infinitySystems"][0].take();
    system["config"]["mode"] = json!("turbo");
    let err = System::from_snapshot(system, None).unwrap_err();
    assert!(matches!(err, Error::UnrecognizedValue { field: "mode", .. }));
}
