use std::sync::{Arc, PoisonError, RwLock};

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, error, trace, warn};

use crate::error::MergeTarget;
use crate::journal::MessageJournal;
use crate::merge::{deep_merge, find_by_id_mut, strip_keys};
use crate::raw::id_string;
use crate::{Config, Error, Result, Status, System};

const STATUS_MESSAGE: &str = "InfinityStatus";
const CONFIG_MESSAGE: &str = "InfinityConfig";

const ENVELOPE_KEYS: [&str; 2] = ["timestamp", "updatedTime"];
const CONFIG_ENVELOPE_KEYS: [&str; 2] = ["id", "infinitySystemConfigurationId"];
const ACTIVITY_BOOKKEEPING_KEYS: [&str; 3] = ["timestamp", "zoneConfigurationId", "fanSettingId"];

/// Status zone fields whose deltas arrive with a zone id one higher than
/// the snapshot's.
const OFFSET_ZONE_FIELDS: [&str; 5] = ["rt", "htsp", "clsp", "currentActivity", "fan"];

type SnapshotCallback = Box<dyn Fn(&System) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Shift status zone ids down by one when the delta carries one of the
    /// affected fields. Turn off once the upstream feed reports them
    /// correctly.
    pub zone_id_correction: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            zone_id_correction: true,
        }
    }
}

/// What a single frame did to the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No `deviceId`.
    Ignored,
    StatusMerged(String),
    ConfigMerged(String),
    /// Known system, unknown `messageType`. Logged, state untouched.
    Unrecognized(String),
}

impl MergeOutcome {
    pub fn serial(&self) -> Option<&str> {
        match self {
            MergeOutcome::StatusMerged(s) | MergeOutcome::ConfigMerged(s) => Some(s),
            _ => None,
        }
    }
}

/// Applies one raw realtime frame to `systems`.
///
/// Merge-target failures abandon the rest of the frame but keep whatever
/// was already merged; the projection is rebuilt either way.
pub fn apply_message(systems: &mut [System], raw: &str, options: &MergeOptions) -> Result<MergeOutcome> {
    let mut frame: Value = serde_json::from_str(raw)?;
    let Some(envelope) = frame.as_object_mut() else {
        return Err(Error::UnrecognizedMessage("frame is not a JSON object".into()));
    };

    let kind = envelope.remove("messageType");
    let device = envelope.remove("deviceId");
    strip_keys(envelope, &ENVELOPE_KEYS);

    let Some(serial) = device.as_ref().and_then(id_string) else {
        trace!("frame without deviceId ignored");
        return Ok(MergeOutcome::Ignored);
    };

    let system = systems
        .iter_mut()
        .find(|s| s.serial() == serial)
        .ok_or_else(|| Error::UnknownSystem(serial.clone()))?;

    let delta = std::mem::take(envelope);
    match kind.as_ref().and_then(Value::as_str) {
        Some(STATUS_MESSAGE) => {
            debug!(serial = %serial, "merging status delta");
            let merged = merge_status_delta(&mut system.status.raw, delta, options);
            let raw = system.status.raw.clone();
            rebuild(merged, raw, Status::from_raw, &mut system.status)?;
            Ok(MergeOutcome::StatusMerged(serial))
        }
        Some(CONFIG_MESSAGE) => {
            debug!(serial = %serial, "merging config delta");
            let merged = merge_config_delta(&mut system.config.raw, delta);
            let raw = system.config.raw.clone();
            rebuild(merged, raw, Config::from_raw, &mut system.config)?;
            Ok(MergeOutcome::ConfigMerged(serial))
        }
        other => {
            let kind = other.unwrap_or_default().to_string();
            error!(serial = %serial, kind = %kind, "unrecognized realtime message");
            Ok(MergeOutcome::Unrecognized(kind))
        }
    }
}

/// Re-derives `typed` from `raw`. A merge error wins over a rebuild error.
fn rebuild<T>(
    merged: Result<()>,
    raw: Value,
    project: fn(Value) -> Result<T>,
    typed: &mut T,
) -> Result<()> {
    match project(raw) {
        Ok(rebuilt) => {
            *typed = rebuilt;
            merged
        }
        Err(e) => match merged {
            Ok(()) => Err(e),
            Err(merge_err) => {
                warn!(error = %e, "projection rebuild failed after partial merge");
                Err(merge_err)
            }
        },
    }
}

fn not_found(target: MergeTarget, id: &str) -> Error {
    Error::MergeTargetNotFound {
        target,
        id: id.to_string(),
    }
}

fn take_list(obj: &mut Map<String, Value>, key: &str) -> Result<Vec<Map<String, Value>>> {
    match obj.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(entry) => Ok(entry),
                _ => Err(Error::UnrecognizedMessage(format!("{key} entry is not an object"))),
            })
            .collect(),
        Some(_) => Err(Error::UnrecognizedMessage(format!("{key} is not a list"))),
    }
}

fn correct_zone_id(zone: &mut Map<String, Value>) {
    if !OFFSET_ZONE_FIELDS.iter().any(|f| zone.contains_key(*f)) {
        return;
    }
    let corrected = match zone.get("id") {
        Some(Value::Number(n)) => n.as_i64().and_then(|id| id.checked_sub(1)).map(|id| json!(id)),
        Some(Value::String(s)) => s
            .parse::<i64>()
            .ok()
            .and_then(|id| id.checked_sub(1))
            .map(|id| json!(id.to_string())),
        _ => None,
    };
    if let Some(id) = corrected {
        debug!(from = ?zone.get("id"), to = %id, "correcting status zone id");
        zone.insert("id".to_string(), id);
    }
}

fn merge_status_delta(raw: &mut Value, mut delta: Map<String, Value>, options: &MergeOptions) -> Result<()> {
    for mut zone in take_list(&mut delta, "zones")? {
        zone.remove("timestamp");
        if options.zone_id_correction {
            correct_zone_id(&mut zone);
        }
        let Some(zone_id) = zone.get("id").and_then(id_string) else {
            debug!("status zone delta without id skipped");
            continue;
        };
        let stale = raw
            .get_mut("zones")
            .and_then(|zones| find_by_id_mut(zones, &zone_id))
            .ok_or_else(|| not_found(MergeTarget::Zone, &zone_id))?;
        trace!(zone_id = %zone_id, "merging status zone");
        deep_merge(stale, &Value::Object(zone));
    }

    deep_merge(raw, &Value::Object(delta));
    if let Some(status) = raw.as_object_mut() {
        status.insert(
            "utcTime".to_string(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
    Ok(())
}

fn merge_config_delta(raw: &mut Value, mut delta: Map<String, Value>) -> Result<()> {
    strip_keys(&mut delta, &CONFIG_ENVELOPE_KEYS);
    for zone in take_list(&mut delta, "zones")? {
        merge_config_zone(raw, zone)?;
    }
    deep_merge(raw, &Value::Object(delta));
    Ok(())
}

fn merge_config_zone(raw: &mut Value, mut zone: Map<String, Value>) -> Result<()> {
    zone.remove("timestamp");
    let Some(zone_id) = zone.get("id").and_then(id_string) else {
        debug!("config zone delta without id skipped");
        return Ok(());
    };
    let stale_zone = raw
        .get_mut("zones")
        .and_then(|zones| find_by_id_mut(zones, &zone_id))
        .ok_or_else(|| not_found(MergeTarget::Zone, &zone_id))?;

    for mut activity in take_list(&mut zone, "activities")? {
        strip_keys(&mut activity, &ACTIVITY_BOOKKEEPING_KEYS);
        let activity_id = activity
            .get("id")
            .and_then(id_string)
            .ok_or_else(|| Error::UnrecognizedMessage("activity delta without id".into()))?;
        let stale = stale_zone
            .get_mut("activities")
            .and_then(|activities| find_by_id_mut(activities, &activity_id))
            .ok_or_else(|| not_found(MergeTarget::Activity, &activity_id))?;
        deep_merge(stale, &Value::Object(activity));
    }

    match zone.remove("program") {
        Some(Value::Object(program)) => merge_program(stale_zone, program, &zone_id)?,
        Some(other) => {
            zone.insert("program".to_string(), other);
        }
        None => {}
    }

    deep_merge(stale_zone, &Value::Object(zone));
    Ok(())
}

fn merge_program(stale_zone: &mut Value, mut program: Map<String, Value>, zone_id: &str) -> Result<()> {
    let days = take_list(&mut program, "day")?;
    if !days.is_empty() && stale_zone.get("program").is_none_or(|p| !p.is_object()) {
        let first = days[0].get("id").and_then(id_string).unwrap_or_default();
        return Err(not_found(MergeTarget::Day, &first));
    }

    for mut day in days {
        let day_id = day
            .get("id")
            .and_then(id_string)
            .ok_or_else(|| Error::UnrecognizedMessage("program day delta without id".into()))?;
        let stale_day = stale_zone
            .get_mut("program")
            .and_then(|p| p.get_mut("day"))
            .and_then(|days| find_by_id_mut(days, &day_id))
            .ok_or_else(|| not_found(MergeTarget::Day, &day_id))?;

        for period in take_list(&mut day, "period")? {
            let Some(period_id) = period.get("id").and_then(id_string) else {
                debug!(zone_id, day_id = %day_id, "period delta without id skipped");
                continue;
            };
            match stale_day
                .get_mut("period")
                .and_then(|periods| find_by_id_mut(periods, &period_id))
            {
                Some(stale) => deep_merge(stale, &Value::Object(period)),
                None => {
                    debug!(zone_id, day_id = %day_id, period_id = %period_id, "period not in snapshot, skipped");
                }
            }
        }
        deep_merge(stale_day, &Value::Object(day));
    }

    if let Some(stale_program) = stale_zone.get_mut("program") {
        deep_merge(stale_program, &Value::Object(program));
    } else if let Some(zone) = stale_zone.as_object_mut() {
        zone.insert("program".to_string(), Value::Object(program));
    }
    Ok(())
}

/// Owns the shared system list and merges realtime frames into it, one at
/// a time. The write lock spans the raw merge and the projection rebuild.
pub struct DeltaMerger {
    systems: Arc<RwLock<Vec<System>>>,
    options: MergeOptions,
    journal: Option<Arc<MessageJournal>>,
    callbacks: Vec<SnapshotCallback>,
}

impl DeltaMerger {
    pub fn new(systems: Vec<System>) -> Self {
        Self::shared(Arc::new(RwLock::new(systems)))
    }

    pub fn shared(systems: Arc<RwLock<Vec<System>>>) -> Self {
        Self {
            systems,
            options: MergeOptions::default(),
            journal: None,
            callbacks: Vec::new(),
        }
    }

    pub fn options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn journal(mut self, journal: Arc<MessageJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Called with the updated system after every successful merge.
    pub fn on_update(mut self, f: impl Fn(&System) + Send + Sync + 'static) -> Self {
        self.callbacks.push(Box::new(f));
        self
    }

    pub fn systems(&self) -> Arc<RwLock<Vec<System>>> {
        Arc::clone(&self.systems)
    }

    pub fn system(&self, serial: &str) -> Option<System> {
        let systems = self.systems.read().unwrap_or_else(PoisonError::into_inner);
        systems.iter().find(|s| s.serial() == serial).cloned()
    }

    pub fn handle(&self, raw: &str) -> Result<MergeOutcome> {
        if let Some(journal) = &self.journal {
            journal.log_frame(raw);
        }

        let observed = self.journal.is_some() || !self.callbacks.is_empty();
        let (outcome, updated) = {
            let mut systems = self.systems.write().unwrap_or_else(PoisonError::into_inner);
            let outcome = apply_message(&mut systems, raw, &self.options)?;
            let updated = match outcome.serial() {
                Some(serial) if observed => systems.iter().find(|s| s.serial() == serial).cloned(),
                _ => None,
            };
            (outcome, updated)
        };

        if let Some(system) = updated {
            if let Some(journal) = &self.journal {
                match &outcome {
                    MergeOutcome::StatusMerged(_) => journal.log_merge(system.serial(), "status", system.status.raw()),
                    MergeOutcome::ConfigMerged(_) => journal.log_merge(system.serial(), "config", system.config.raw()),
                    _ => {}
                }
            }
            for cb in &self.callbacks {
                cb(&system);
            }
        }
        Ok(outcome)
    }

    /// Adapts the merger into a realtime frame handler.
    pub fn handler(self: &Arc<Self>) -> impl Fn(&str) -> Result<()> + Send + Sync + 'static {
        let merger = Arc::clone(self);
        move |frame| merger.handle(frame).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correction_only_for_affected_fields() {
        let mut zone = json!({"id": "2", "rt": "75"});
        correct_zone_id(zone.as_object_mut().unwrap());
        assert_eq!(zone["id"], "1");

        let mut zone = json!({"id": 2, "fan": "high"});
        correct_zone_id(zone.as_object_mut().unwrap());
        assert_eq!(zone["id"], 1);

        let mut zone = json!({"id": "2", "rh": "40"});
        correct_zone_id(zone.as_object_mut().unwrap());
        assert_eq!(zone["id"], "2");
    }

    #[test]
    fn correction_leaves_unshiftable_ids() {
        let mut zone = json!({"id": i64::MIN, "rt": "75"});
        correct_zone_id(zone.as_object_mut().unwrap());
        assert_eq!(zone["id"], i64::MIN);

        let mut zone = json!({"id": i64::MIN.to_string(), "htsp": "70"});
        correct_zone_id(zone.as_object_mut().unwrap());
        assert_eq!(zone["id"], i64::MIN.to_string());

        let mut raw = json!({"zones": [{"id": "1", "rt": "70"}]});
        let delta = json!({"zones": [{"id": i64::MIN, "rt": "75"}]}).as_object().unwrap().clone();
        let err = merge_status_delta(&mut raw, delta, &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MergeTargetNotFound { target: MergeTarget::Zone, .. }));
    }

    #[test]
    fn take_list_rejects_scalars() {
        let mut obj = json!({"zones": "nope"}).as_object().unwrap().clone();
        assert!(matches!(take_list(&mut obj, "zones"), Err(Error::UnrecognizedMessage(_))));

        let mut obj = json!({"zones": null}).as_object().unwrap().clone();
        assert!(take_list(&mut obj, "zones").unwrap().is_empty());
        assert!(!obj.contains_key("zones"));
    }

    #[test]
    fn status_delta_stamps_utc_time() {
        let mut raw = json!({"zones": [{"id": "1", "rh": 30}], "utcTime": "2020-01-01T00:00:00Z"});
        let delta = json!({"oat": 41}).as_object().unwrap().clone();
        merge_status_delta(&mut raw, delta, &MergeOptions::default()).unwrap();
        assert_eq!(raw["oat"], 41);
        assert_ne!(raw["utcTime"], "2020-01-01T00:00:00Z");
        assert!(chrono::DateTime::parse_from_rfc3339(raw["utcTime"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn status_delta_missing_zone_keeps_top_level() {
        let mut raw = json!({"zones": [{"id": "1", "rh": 30}], "oat": 30});
        let delta = json!({"oat": 50, "zones": [{"id": "1", "rh": 31}, {"id": "9", "rh": 1}]})
            .as_object()
            .unwrap()
            .clone();
        let err = merge_status_delta(&mut raw, delta, &MergeOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::MergeTargetNotFound { target: MergeTarget::Zone, ref id } if id == "9"
        ));
        assert_eq!(raw["zones"][0]["rh"], 31);
        assert_eq!(raw["oat"], 30);
    }

    #[test]
    fn program_period_merge_by_id() {
        let mut raw = json!({"zones": [{
            "id": "1",
            "program": {"id": "p", "day": [
                {"id": "0", "period": [{"id": "1", "time": "06:00"}, {"id": "2", "time": "08:00"}]}
            ]}
        }]});
        let delta = json!({"zones": [{
            "id": "1",
            "program": {"day": [{"id": "0", "period": [{"id": "2", "time": "09:15"}, {"id": "7", "time": "10:00"}]}]}
        }]})
        .as_object()
        .unwrap()
        .clone();
        merge_config_delta(&mut raw, delta).unwrap();
        let periods = &raw["zones"][0]["program"]["day"][0]["period"];
        assert_eq!(periods[0]["time"], "06:00");
        assert_eq!(periods[1]["time"], "09:15");
        assert_eq!(periods.as_array().unwrap().len(), 2);
        assert_eq!(raw["zones"][0]["program"]["id"], "p");
    }
}
