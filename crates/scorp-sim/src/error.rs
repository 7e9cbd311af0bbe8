use std::fmt;

use scorp_core::{MessageId, ScheduleError};

#[derive(Debug)]
pub enum SimError {
    /// A message the environment guaranteed to exist is gone from a buffer.
    /// Indicates corrupted bookkeeping; the run cannot continue.
    MissingMessage(MessageId),
    /// Slot schedule rejected by the clock.
    Schedule(ScheduleError),
    /// Scenario file could not be parsed.
    Scenario(String),
    /// A scenario references a node name that was never declared.
    UnknownNode(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::MissingMessage(id) => {
                write!(f, "message {id} missing from buffer during transfer bookkeeping")
            }
            SimError::Schedule(e) => write!(f, "invalid slot schedule: {e}"),
            SimError::Scenario(msg) => write!(f, "invalid scenario: {msg}"),
            SimError::UnknownNode(name) => write!(f, "unknown node name: {name}"),
        }
    }
}

impl std::error::Error for SimError {}

impl From<ScheduleError> for SimError {
    fn from(e: ScheduleError) -> Self {
        SimError::Schedule(e)
    }
}

impl From<toml::de::Error> for SimError {
    fn from(e: toml::de::Error) -> Self {
        SimError::Scenario(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
