use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use serde_json::{json, Value};

use crate::raw::{
    id_string, is_on, opt_f64, opt_string, opt_time, parse_enum, parse_opt_enum, parse_time,
    required_str,
};
use crate::types::*;
use crate::{Error, Result};

const VACATION_ACTIVITY_ID: &str = "vacation";

/// A comfort profile with its setpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: String,
    pub activity_type: ActivityType,
    pub fan: Option<FanMode>,
    pub heat_set_point: Option<f64>,
    pub cool_set_point: Option<f64>,
}

impl Activity {
    fn from_raw(activity: &Value) -> Result<Self> {
        Ok(Self {
            id: activity
                .get("id")
                .and_then(id_string)
                .ok_or(Error::MissingField("id"))?,
            activity_type: parse_enum(activity, "type", ActivityType::from_carrier_str)?,
            fan: parse_opt_enum(activity, "fan", FanMode::from_carrier_str)?,
            heat_set_point: opt_f64(activity, "htsp"),
            cool_set_point: opt_f64(activity, "clsp"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramPeriod {
    pub id: String,
    pub zone_id: Option<String>,
    pub day_id: Option<String>,
    pub activity: ActivityType,
    pub time: NaiveTime,
}

impl ProgramPeriod {
    fn from_raw(period: &Value) -> Result<Self> {
        Ok(Self {
            id: period
                .get("id")
                .and_then(id_string)
                .ok_or(Error::MissingField("id"))?,
            zone_id: period.get("zoneId").and_then(id_string),
            day_id: period.get("dayId").and_then(id_string),
            activity: parse_enum(period, "activity", ActivityType::from_carrier_str)?,
            time: parse_time("time", required_str(period, "time")?)?,
        })
    }

    fn minute_of_day(&self) -> u32 {
        self.time.hour() * 60 + self.time.minute()
    }
}

/// One day of the weekly program. Only enabled periods are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramDay {
    pub id: String,
    pub zone_id: Option<String>,
    pub periods: Vec<ProgramPeriod>,
}

impl ProgramDay {
    fn from_raw(day: &Value) -> Result<Self> {
        let periods = match day.get("period").and_then(|p| p.as_array()) {
            Some(periods) => periods
                .iter()
                .filter(|p| is_on(p, "enabled"))
                .map(ProgramPeriod::from_raw)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            id: day
                .get("id")
                .and_then(id_string)
                .ok_or(Error::MissingField("id"))?,
            zone_id: day.get("zoneId").and_then(id_string),
            periods,
        })
    }

    fn periods_by_time(&self) -> Vec<&ProgramPeriod> {
        let mut periods: Vec<_> = self.periods.iter().collect();
        periods.sort_by_key(|p| p.minute_of_day());
        periods
    }
}

/// Weekly schedule, days indexed Sunday = 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub id: Option<String>,
    pub days: Vec<ProgramDay>,
}

impl Program {
    fn from_raw(program: &Value) -> Result<Self> {
        let days = match program.get("day").and_then(|d| d.as_array()) {
            Some(days) => days
                .iter()
                .map(ProgramDay::from_raw)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            id: program.get("id").and_then(id_string),
            days,
        })
    }

    fn periods_for(&self, day_index: usize) -> Vec<&ProgramPeriod> {
        self.days
            .get(day_index)
            .map(ProgramDay::periods_by_time)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigZone {
    pub id: String,
    pub name: Option<String>,
    pub hold: bool,
    pub hold_activity: Option<ActivityType>,
    pub hold_until: Option<NaiveTime>,
    pub occupancy_enabled: bool,
    pub program: Option<Program>,
    /// Zone activities followed by the synthetic vacation activity.
    pub activities: Vec<Activity>,
}

impl ConfigZone {
    fn from_raw(zone: &Value, vacation: &Activity) -> Result<Self> {
        let mut activities = match zone.get("activities").and_then(|a| a.as_array()) {
            Some(activities) => activities
                .iter()
                .map(Activity::from_raw)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        activities.push(vacation.clone());

        Ok(Self {
            id: zone
                .get("id")
                .and_then(id_string)
                .ok_or(Error::MissingField("id"))?,
            name: opt_string(zone, "name"),
            hold: is_on(zone, "hold"),
            hold_activity: parse_opt_enum(zone, "holdActivity", ActivityType::from_carrier_str)?,
            hold_until: opt_time(zone, "otmr")?,
            occupancy_enabled: is_on(zone, "occEnabled"),
            program: zone.get("program").filter(|p| p.is_object()).map(Program::from_raw).transpose()?,
            activities,
        })
    }

    pub fn find_activity(&self, activity_type: ActivityType) -> Option<&Activity> {
        self.activities.iter().find(|a| a.activity_type == activity_type)
    }

    /// The activity in effect at `now` (controller local time).
    ///
    /// A held zone runs its hold activity. Otherwise the latest enabled
    /// period of today starting at or before `now` wins, falling back to
    /// the last enabled period of the previous day.
    pub fn current_activity_at(&self, now: NaiveDateTime) -> Option<&Activity> {
        if self.hold {
            return self.find_activity(self.hold_activity?);
        }
        let program = self.program.as_ref()?;
        let today = now.weekday().num_days_from_sunday() as usize;
        let now_minute = now.hour() * 60 + now.minute();

        if let Some(period) = program
            .periods_for(today)
            .into_iter()
            .rev()
            .find(|p| p.minute_of_day() <= now_minute)
        {
            return self.find_activity(period.activity);
        }

        let yesterday = (today + 6) % 7;
        let period = program.periods_for(yesterday).into_iter().last()?;
        self.find_activity(period.activity)
    }

    pub fn current_activity(&self) -> Option<&Activity> {
        self.current_activity_at(chrono::Local::now().naive_local())
    }

    /// Start time of the next scheduled period after `now`, looking no
    /// further than tomorrow.
    pub fn next_activity_time_at(&self, now: NaiveDateTime) -> Option<NaiveTime> {
        let program = self.program.as_ref()?;
        let today = now.weekday().num_days_from_sunday() as usize;
        let now_minute = now.hour() * 60 + now.minute();

        if let Some(period) = program
            .periods_for(today)
            .into_iter()
            .find(|p| p.minute_of_day() > now_minute)
        {
            return Some(period.time);
        }

        program
            .periods_for((today + 1) % 7)
            .first()
            .map(|p| p.time)
    }

    pub fn next_activity_time(&self) -> Option<NaiveTime> {
        self.next_activity_time_at(chrono::Local::now().naive_local())
    }
}

/// Typed projection of a system's configuration document. Like
/// [`Status`](crate::Status), the raw document is retained and is the
/// source of truth for rebuilds.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub(crate) raw: Value,
    pub temperature_unit: TemperatureUnit,
    pub mode: Option<SystemMode>,
    pub heat_source: Option<HeatSource>,
    pub etag: Option<String>,
    pub fuel_type: Option<String>,
    pub gas_unit: Option<String>,
    pub uv_enabled: bool,
    pub humidifier_enabled: bool,
    pub vacation_cool_set_point: Option<f64>,
    pub vacation_heat_set_point: Option<f64>,
    pub vacation_fan: Option<FanMode>,
    pub zones: Vec<ConfigZone>,
}

impl Config {
    pub fn from_raw(raw: Value) -> Result<Self> {
        let vacation_fan = parse_opt_enum(&raw, "vacfan", FanMode::from_carrier_str)?;
        let vacation = Activity::from_raw(&json!({
            "id": VACATION_ACTIVITY_ID,
            "type": ActivityType::Vacation.as_carrier_str(),
            "fan": vacation_fan.map(|f| f.as_carrier_str()),
            "htsp": raw.get("vacmint"),
            "clsp": raw.get("vacmaxt"),
        }))?;

        let zones = match raw.get("zones").and_then(|z| z.as_array()) {
            Some(zones) => zones
                .iter()
                .filter(|z| is_on(z, "enabled"))
                .map(|z| ConfigZone::from_raw(z, &vacation))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            temperature_unit: parse_enum(&raw, "cfgem", TemperatureUnit::from_carrier_str)?,
            mode: parse_opt_enum(&raw, "mode", SystemMode::from_carrier_str)?,
            heat_source: parse_opt_enum(&raw, "heatsource", HeatSource::from_carrier_str)?,
            etag: opt_string(&raw, "etag"),
            fuel_type: opt_string(&raw, "fueltype"),
            gas_unit: opt_string(&raw, "gasunit"),
            uv_enabled: is_on(&raw, "cfguv"),
            humidifier_enabled: is_on(&raw, "cfghumid"),
            vacation_cool_set_point: vacation.cool_set_point,
            vacation_heat_set_point: vacation.heat_set_point,
            vacation_fan,
            zones,
            raw,
        })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn zone(&self, id: &str) -> Option<&ConfigZone> {
        self.zones.iter().find(|z| z.id == id)
    }
}
