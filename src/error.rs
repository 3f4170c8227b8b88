use thiserror::Error;

use crate::zone::CourtLayout;

/// Settings or sequences the trainer refuses to run with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("zone {zone} is not on a {layout} court (1..={max})", max = .layout.max_zone())]
    ZoneOutOfRange { zone: u8, layout: CourtLayout },

    #[error("custom sequence entry {token:?} is not a zone number")]
    MalformedSequence { token: String },

    #[error("cannot change the configuration while a session is running")]
    SessionRunning,
}

/// No enabled zone was available when a selection was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no zones enabled")]
pub struct EmptyZoneSetError;
