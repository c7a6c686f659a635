use serde::Deserialize;

use crate::raw::{de_flag, de_opt_f64, de_opt_i64};

const CURRENT_YEAR_PERIOD: &str = "year1";

/// Whether a load category is reported for this system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EnergyCategory {
    #[serde(deserialize_with = "de_flag")]
    pub display: bool,
    #[serde(deserialize_with = "de_flag")]
    pub enabled: bool,
}

impl EnergyCategory {
    pub fn show(&self) -> bool {
        self.display && self.enabled
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    #[serde(deserialize_with = "de_opt_f64")]
    pub seer: Option<f64>,
    #[serde(deserialize_with = "de_opt_f64")]
    pub hspf: Option<f64>,
    pub cooling: EnergyCategory,
    #[serde(rename = "hpheat")]
    pub hp_heat: EnergyCategory,
    pub fan: EnergyCategory,
    #[serde(rename = "eheat")]
    pub electric_heat: EnergyCategory,
    pub reheat: EnergyCategory,
    #[serde(rename = "fangas")]
    pub fan_gas: EnergyCategory,
    pub gas: EnergyCategory,
    #[serde(rename = "looppump")]
    pub loop_pump: EnergyCategory,
}

/// Usage totals for one reporting period, keyed by `period_type`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnergyMeasurement {
    #[serde(rename = "energyPeriodType")]
    pub period_type: String,
    #[serde(rename = "coolingKwh", deserialize_with = "de_opt_i64")]
    pub cooling: Option<i64>,
    #[serde(rename = "hPHeatKwh", deserialize_with = "de_opt_i64")]
    pub hp_heat: Option<i64>,
    #[serde(rename = "fanKwh", deserialize_with = "de_opt_i64")]
    pub fan: Option<i64>,
    #[serde(rename = "eHeatKwh", deserialize_with = "de_opt_i64")]
    pub electric_heat: Option<i64>,
    #[serde(rename = "reheatKwh", deserialize_with = "de_opt_i64")]
    pub reheat: Option<i64>,
    #[serde(rename = "fanGasKwh", deserialize_with = "de_opt_i64")]
    pub fan_gas: Option<i64>,
    #[serde(rename = "gasKwh", deserialize_with = "de_opt_i64")]
    pub gas: Option<i64>,
    #[serde(rename = "loopPumpKwh", deserialize_with = "de_opt_i64")]
    pub loop_pump: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Energy {
    #[serde(rename = "energyConfig")]
    pub config: EnergyConfig,
    #[serde(rename = "energyPeriods")]
    pub periods: Vec<EnergyMeasurement>,
}

impl Energy {
    pub fn period(&self, period_type: &str) -> Option<&EnergyMeasurement> {
        self.periods.iter().find(|p| p.period_type == period_type)
    }

    pub fn current_year_measurements(&self) -> Option<&EnergyMeasurement> {
        self.period(CURRENT_YEAR_PERIOD)
    }
}
