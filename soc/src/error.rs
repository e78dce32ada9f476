//! Error kinds surfaced to callers
use thiserror::Error;

/// Errors returned by the parsers, the container codec and the streams.
/// Clean end of input and per-signal exhaustion are not errors: they are
/// reported through `Ok(false)` / `Ok(None)` return values.
#[derive(Error, Debug)]
pub enum Error {
    /// Header is present but does not describe an observation file
    #[error("not an observation file")]
    NotObservation,
    /// Header revision is neither 2.x nor 3.x
    #[error("unknown RINEX revision")]
    UnknownVersion,
    /// Structural violation in text or container payload
    #[error("bad format")]
    BadFormat,
    /// Underlying transport failure
    #[error("system error: {0}")]
    System(#[from] std::io::Error),
    /// Container validation failure
    #[error("corrupt container")]
    Corrupt,
    /// Container major revision not understood
    #[error("container major revision not understood")]
    BadMajor,
    /// Operation invalid in current reader state
    #[error("invalid state for this operation")]
    BadState,
    /// Requested chunk is absent
    #[error("no such chunk")]
    NoChunk,
    /// GNSS system letter not recognized
    #[error("unknown GNSS system")]
    UnknownSystem,
    /// Observation code not declared for this system
    #[error("unknown observation code")]
    UnknownCode,
    /// Satellite not present in this container
    #[error("unknown satellite")]
    UnknownSatellite,
}
