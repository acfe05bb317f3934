//! # Error taxonomy
//!
//! OpihiExarata separates two tiers of failure:
//!
//! - [`ExarataError`]: **handled** errors, returned through `Result`. These are
//!   domain failures the caller is expected to report or recover from, such as bad
//!   configuration or a web service refusal.
//! - [`TerminalError`]: **terminal** errors. They mark a state the program should
//!   never reach (a broken internal invariant) and are never returned: calling
//!   [`TerminalError::halt`] panics with the message.
//!
//! Engine dispatch failures are grouped under [`EngineError`] so that the
//! class-vs-instance, wrong-domain, unsupported and insufficiency cases stay
//! distinguishable by pattern matching.
use thiserror::Error;

use crate::engine::EngineDomain;

/// Why a vehicle result mapping lacked a field the solution requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsufficiencyCause {
    /// The engine itself cannot produce the quantity: the engine choice is wrong.
    EngineCannotProvide,
    /// The engine could, but the vehicle function never transferred it.
    IncompleteVehicle,
}

impl std::fmt::Display for InsufficiencyCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsufficiencyCause::EngineCannotProvide => {
                write!(f, "the engine cannot provide it, choose another engine")
            }
            InsufficiencyCause::IncompleteVehicle => {
                write!(f, "the vehicle function does not supply it from the engine")
            }
        }
    }
}

/// Failures of the engine/solution dispatch and of the engines themselves.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("The {domain} solver engine should be an engine class, not an instance of one")]
    InstanceNotClass { domain: EngineDomain },

    #[error("The engine `{engine}` is a {found} engine; a {expected} engine is required")]
    WrongDomain {
        engine: String,
        expected: EngineDomain,
        found: EngineDomain,
    },

    #[error("The {domain} engine `{engine}` is not supported, there is no vehicle function for it")]
    Unsupported { domain: EngineDomain, engine: String },

    #[error("The results of engine `{engine}` are insufficient, field `{field}` is missing: {cause}")]
    Insufficient {
        engine: String,
        field: &'static str,
        cause: InsufficiencyCause,
    },

    #[error("The engine `{engine}` failed: {reason}")]
    Failed { engine: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ExarataError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("File error: {0}")]
    File(String),

    #[error("Install error: {0}")]
    Install(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("There is no such engine named `{0}`")]
    NoSuchEngine(String),

    #[error("Web request error: {0}")]
    WebRequest(String),

    #[error("Sequential order error: {0}")]
    SequentialOrder(String),

    #[error("Practicality error: {0}")]
    Practicality(String),

    #[error("The operation was cancelled before the next web request")]
    Cancelled,

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP ureq error: {0}")]
    UreqHttpError(#[from] ureq::Error),

    #[error("HTTP reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("FITS error: {0}")]
    FitsError(#[from] fitsio::errors::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Time conversion error: {0}")]
    TimeError(String),
}

impl PartialEq for ExarataError {
    fn eq(&self, other: &Self) -> bool {
        use ExarataError::*;
        match (self, other) {
            (Configuration(a), Configuration(b)) => a == b,
            (File(a), File(b)) => a == b,
            (Install(a), Install(b)) => a == b,
            (Input(a), Input(b)) => a == b,
            (Engine(a), Engine(b)) => a == b,
            (NoSuchEngine(a), NoSuchEngine(b)) => a == b,
            (WebRequest(a), WebRequest(b)) => a == b,
            (SequentialOrder(a), SequentialOrder(b)) => a == b,
            (Practicality(a), Practicality(b)) => a == b,
            (TimeError(a), TimeError(b)) => a == b,
            (Cancelled, Cancelled) => true,

            // wrapped library errors only compare by variant
            (IoError(_), IoError(_)) => true,
            (UreqHttpError(_), UreqHttpError(_)) => true,
            (ReqwestError(_), ReqwestError(_)) => true,
            (FitsError(_), FitsError(_)) => true,
            (TomlError(_), TomlError(_)) => true,
            (JsonError(_), JsonError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            _ => false,
        }
    }
}

/// Errors which must never be handled.
///
/// They signal a broken internal assumption. The only thing to do with one is
/// [`halt`](TerminalError::halt).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TerminalError {
    #[error("Development error, this is a bug: {0}")]
    Development(String),

    #[error("Logic flow error, this branch should be unreachable: {0}")]
    LogicFlow(String),

    #[error("Beyond scope: {0}")]
    BeyondScope(String),

    #[error("Undiscovered case, please report it: {0}")]
    Undiscovered(String),
}

impl TerminalError {
    /// Stop the program with this error's message.
    pub fn halt(self) -> ! {
        panic!("{self}")
    }
}
