//! Crate-wide error taxonomy.
//!
//! `VnaError` consolidates the error sources of the middle layer: switch
//! protocol violations, calibration state violations, measurement failures,
//! and calibration RPC failures. Using `thiserror`, each variant carries a
//! human-readable message and, via `#[from]`, converts transparently from
//! the lower-level error types produced by each component.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, VnaError>;

/// Errors produced by the switch driver (C1).
#[derive(Error, Debug)]
pub enum SwitchError {
    #[error("serial port not open")]
    PortNotOpen,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short write: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("read timed out waiting for a reply")]
    ReadTimeout,

    #[error("failed to parse switch reply {raw:?}: {reason}")]
    UnmarshalFailed { raw: String, reason: String },

    #[error("switch reply had report type {got:?}, expected \"port\"")]
    ReportTypeMismatch { got: String },

    #[error("switch confirmed port {got:?}, requested {expected:?}")]
    PortMismatch { expected: String, got: String },

    #[error("unknown switch port name {0:?}")]
    UnknownPort(String),
}

/// Errors produced by the calibration coordinator (C4).
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("not calibrated yet: no frozen range has been set up")]
    NotCalibratedYet,

    #[error("calibration not set up yet")]
    NotSetupYet,

    #[error("calibration not complete (missing {0}, maybe others)")]
    MissingStandard(&'static str),

    #[error("unknown calibration standard {0:?}")]
    UnknownStandard(String),
}

/// Errors produced by the format bridge (C3).
#[derive(Error, Debug)]
pub enum FormatBridgeError {
    #[error(
        "calibration buffer arrays have mismatched lengths: frequency={frequency}, s11={s11}"
    )]
    LengthMismatch { frequency: usize, s11: usize },
}

/// Top-level crate error.
#[derive(Error, Debug)]
pub enum VnaError {
    #[error("{0}")]
    Switch(#[from] SwitchError),

    #[error("{0}")]
    Calibration(#[from] CalibrationError),

    #[error("{0}")]
    FormatBridge(#[from] FormatBridgeError),

    #[error("measurement error: {0}")]
    Measurement(String),

    #[error("calibration RPC error: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timeout")]
    Timeout,
}

impl VnaError {
    /// The message shown to the remote user in a `CustomResult`.
    ///
    /// For `Timeout` this is the literal string `"timeout"` required by the
    /// dispatcher's contract (spec §4.5/§8 S5); every other variant uses
    /// its `Display` message.
    pub fn user_message(&self) -> String {
        match self {
            VnaError::Timeout => "timeout".to_string(),
            other => other.to_string(),
        }
    }
}
