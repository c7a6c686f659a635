use std::fmt;
use std::str::FromStr;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemMode {
    Off,
    Cool,
    Heat,
    Auto,
    FanOnly,
}

impl SystemMode {
    pub const ALL: [SystemMode; 5] = [
        SystemMode::Off,
        SystemMode::Cool,
        SystemMode::Heat,
        SystemMode::Auto,
        SystemMode::FanOnly,
    ];

    pub fn as_carrier_str(&self) -> &'static str {
        match self {
            SystemMode::Off => "off",
            SystemMode::Cool => "cool",
            SystemMode::Heat => "heat",
            SystemMode::Auto => "auto",
            SystemMode::FanOnly => "fanonly",
        }
    }

    pub fn from_carrier_str(s: &str) -> Option<Self> {
        match s {
            "off" => Some(SystemMode::Off),
            "cool" => Some(SystemMode::Cool),
            "heat" => Some(SystemMode::Heat),
            "auto" => Some(SystemMode::Auto),
            "fanonly" => Some(SystemMode::FanOnly),
            _ => None,
        }
    }
}

/// Named comfort profile a zone runs. `Vacation` only exists as the
/// synthetic activity derived from the controller-wide vacation setpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityType {
    Home,
    Away,
    Sleep,
    Wake,
    Manual,
    Vacation,
}

impl ActivityType {
    pub const ALL: [ActivityType; 6] = [
        ActivityType::Home,
        ActivityType::Away,
        ActivityType::Sleep,
        ActivityType::Wake,
        ActivityType::Manual,
        ActivityType::Vacation,
    ];

    pub fn as_carrier_str(&self) -> &'static str {
        match self {
            ActivityType::Home => "home",
            ActivityType::Away => "away",
            ActivityType::Sleep => "sleep",
            ActivityType::Wake => "wake",
            ActivityType::Manual => "manual",
            ActivityType::Vacation => "vacation",
        }
    }

    pub fn from_carrier_str(s: &str) -> Option<Self> {
        match s {
            "home" => Some(ActivityType::Home),
            "away" => Some(ActivityType::Away),
            "sleep" => Some(ActivityType::Sleep),
            "wake" => Some(ActivityType::Wake),
            "manual" => Some(ActivityType::Manual),
            "vacation" => Some(ActivityType::Vacation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FanMode {
    Off,
    Low,
    Med,
    High,
}

impl FanMode {
    pub const ALL: [FanMode; 4] = [FanMode::Off, FanMode::Low, FanMode::Med, FanMode::High];

    pub fn as_carrier_str(&self) -> &'static str {
        match self {
            FanMode::Off => "off",
            FanMode::Low => "low",
            FanMode::Med => "med",
            FanMode::High => "high",
        }
    }

    pub fn from_carrier_str(s: &str) -> Option<Self> {
        match s {
            "off" => Some(FanMode::Off),
            "low" => Some(FanMode::Low),
            "med" => Some(FanMode::Med),
            "high" => Some(FanMode::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn as_carrier_str(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "C",
            TemperatureUnit::Fahrenheit => "F",
        }
    }

    pub fn from_carrier_str(s: &str) -> Option<Self> {
        match s {
            "C" => Some(TemperatureUnit::Celsius),
            "F" => Some(TemperatureUnit::Fahrenheit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeatSource {
    IduOnly,
    OduOnly,
    System,
}

impl HeatSource {
    pub const ALL: [HeatSource; 3] = [HeatSource::IduOnly, HeatSource::OduOnly, HeatSource::System];

    pub fn as_carrier_str(&self) -> &'static str {
        match self {
            HeatSource::IduOnly => "idu only",
            HeatSource::OduOnly => "odu only",
            HeatSource::System => "system",
        }
    }

    pub fn from_carrier_str(s: &str) -> Option<Self> {
        match s {
            "idu only" => Some(HeatSource::IduOnly),
            "odu only" => Some(HeatSource::OduOnly),
            "system" => Some(HeatSource::System),
            _ => None,
        }
    }
}

macro_rules! carrier_enum_traits {
    ($ty:ident, $label:literal) => {
        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::from_carrier_str(s)
                    .ok_or_else(|| Error::InvalidArgument(format!("{s:?} is not a valid {}", $label)))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_carrier_str())
            }
        }
    };
}

carrier_enum_traits!(SystemMode, "system mode");
carrier_enum_traits!(ActivityType, "activity type");
carrier_enum_traits!(FanMode, "fan mode");
carrier_enum_traits!(TemperatureUnit, "temperature unit");
carrier_enum_traits!(HeatSource, "heat source");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_rejects_unknown() {
        let err = "turbo".parse::<FanMode>().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.to_string().contains("fan mode"));
    }

    #[test]
    fn heat_source_strings_have_spaces() {
        assert_eq!(HeatSource::IduOnly.as_carrier_str(), "idu only");
        assert_eq!("odu only".parse::<HeatSource>().unwrap(), HeatSource::OduOnly);
    }

    #[test]
    fn display_uses_wire_string() {
        assert_eq!(SystemMode::FanOnly.to_string(), "fanonly");
        assert_eq!(TemperatureUnit::Fahrenheit.to_string(), "F");
    }
}
