mod auth;
mod client;
mod config;
mod energy;
mod error;
mod journal;
mod merge;
mod profile;
mod protocol;
mod raw;
mod realtime;
mod status;
mod system;
mod types;
mod updater;

pub use client::{
    InfinityClient, InfinityClientBuilder, DEFAULT_CLIENT_ID, DEFAULT_GRAPHQL_URL, DEFAULT_LOGIN_URL,
    DEFAULT_REALTIME_URL, DEFAULT_TOKEN_URL,
};
pub use config::{Activity, Config, ConfigZone, Program, ProgramDay, ProgramPeriod};
pub use energy::{Energy, EnergyCategory, EnergyConfig, EnergyMeasurement};
pub use error::{Error, MergeTarget, Result};
pub use journal::{JournalMode, MessageJournal};
pub use profile::Profile;
pub use protocol::HumidifierSettings;
pub use realtime::{HandlerId, RealtimeChannel, RealtimeConfig, RealtimeSender, ReconnectConfig};
pub use status::{IndoorUnit, OutdoorUnit, Status, StatusZone};
pub use system::System;
pub use types::*;
pub use updater::{apply_message, DeltaMerger, MergeOptions, MergeOutcome};
