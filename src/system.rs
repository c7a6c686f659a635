use serde_json::Value;

use crate::{Config, Energy, Error, Profile, Result, Status};

/// One HVAC controller and everything known about it.
#[derive(Debug, Clone, PartialEq)]
pub struct System {
    pub profile: Profile,
    pub status: Status,
    pub config: Config,
    pub energy: Option<Energy>,
}

impl System {
    /// Builds a system from one entry of the `infinitySystems` list and,
    /// when fetched, its `infinityEnergy` document.
    pub fn from_snapshot(mut raw: Value, energy: Option<Value>) -> Result<Self> {
        let profile = raw
            .get_mut("profile")
            .map(Value::take)
            .ok_or(Error::MissingField("profile"))?;
        let status = raw
            .get_mut("status")
            .map(Value::take)
            .ok_or(Error::MissingField("status"))?;
        let config = raw
            .get_mut("config")
            .map(Value::take)
            .ok_or(Error::MissingField("config"))?;

        Ok(Self {
            profile: serde_json::from_value(profile)?,
            status: Status::from_raw(status)?,
            config: Config::from_raw(config)?,
            energy: energy
                .filter(|e| !e.is_null())
                .map(serde_json::from_value)
                .transpose()?,
        })
    }

    pub fn serial(&self) -> &str {
        &self.profile.serial
    }

    pub fn name(&self) -> Option<&str> {
        self.profile.name.as_deref()
    }
}
