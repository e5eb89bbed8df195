//! Shared data model (spec §3): S-parameters, frequency sweeps, and the
//! user-facing request/response shapes that travel over the WebSocket
//! relay as JSON.

use serde::{Deserialize, Serialize};

/// A real/imaginary pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

/// One frequency point's full two-port scattering parameters.
///
/// Immutable once constructed: produced only by the measurement primitive
/// (C2) and never mutated afterward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SParam {
    /// Frequency in Hz.
    pub freq: u64,
    pub s11: Complex,
    pub s12: Complex,
    pub s21: Complex,
    pub s22: Complex,
}

impl SParam {
    pub const fn new(freq: u64, s11: Complex, s12: Complex, s21: Complex, s22: Complex) -> Self {
        Self {
            freq,
            s11,
            s12,
            s21,
            s22,
        }
    }
}

/// Which of the four S-parameters the caller wants computed.
///
/// During any calibration step the dispatcher overrides this to
/// [`SParamSelect::all_true`] regardless of what the user requested, since
/// the calibration RPC always needs all four.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SParamSelect {
    pub s11: bool,
    pub s12: bool,
    pub s21: bool,
    pub s22: bool,
}

impl SParamSelect {
    pub const fn all_true() -> Self {
        Self {
            s11: true,
            s12: true,
            s21: true,
            s22: true,
        }
    }
}

/// An inclusive sweep range in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub start: u64,
    pub end: u64,
}

/// The discriminator carried by every request: a command keyword plus a
/// caller-supplied id echoed back unchanged in the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandId {
    pub command: String,
    pub id: String,
}

impl CommandId {
    /// Build a command id with a freshly generated v4 UUID, for relay
    /// adapters that don't already have a caller-supplied id to echo.
    pub fn generate(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// A direct or calibration-step measurement request.
///
/// `what` names the switch position to measure from (`short`, `open`,
/// `load`, `thru`, or `dut1`..`dut4`). `result` starts empty and is filled
/// in by whichever handler processes the request; the populated request is
/// itself the success response (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    pub command: CommandId,
    pub what: String,
    #[serde(default)]
    pub select: SParamSelect,
    pub size: u32,
    #[serde(default)]
    pub log_distribution: bool,
    pub frequency: FrequencyRange,
    #[serde(default = "default_avg")]
    pub avg: u32,
    #[serde(default)]
    pub result: Vec<SParam>,
}

fn default_avg() -> u32 {
    1
}

/// A request for a DUT sweep under an already-applied calibration.
///
/// Carries no calibration-defining fields (`size`, `frequency`,
/// `log_distribution`, `select`): those are frozen in the coordinator at
/// setup time and are not the caller's to change here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedRangeQuery {
    pub command: CommandId,
    pub what: String,
    #[serde(default = "default_avg")]
    pub avg: u32,
    #[serde(default)]
    pub result: Vec<SParam>,
}

/// The VNA's supported sweep range. Stateless; answered directly by the
/// VNA collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonableFrequencyRange {
    pub command: CommandId,
    #[serde(default)]
    pub result: Option<FrequencyRange>,
}

/// The tagged union of requests the dispatcher accepts (spec §9:
/// "polymorphic request discrimination").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IncomingRequest {
    ReasonableFrequencyRange(ReasonableFrequencyRange),
    RangeQuery(RangeQuery),
    CalibratedRangeQuery(CalibratedRangeQuery),
}

impl IncomingRequest {
    pub fn command_id(&self) -> &CommandId {
        match self {
            IncomingRequest::ReasonableFrequencyRange(rq) => &rq.command,
            IncomingRequest::RangeQuery(rq) => &rq.command,
            IncomingRequest::CalibratedRangeQuery(rq) => &rq.command,
        }
    }
}

/// An error response: the echoed request plus a human-readable message
/// (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomResult {
    pub message: String,
    pub command: IncomingRequest,
}

/// Whatever the dispatcher writes back for one request: either the
/// (now-populated) echoed request, or a `CustomResult` describing the
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutgoingResponse {
    Ok(IncomingRequest),
    Err(CustomResult),
}

/// Parallel-array S-parameter form used across the calibration RPC boundary
/// (spec §3/§4.3). All four arrays share one length, equal to the sweep
/// size; `format_bridge` is the only code that converts to and from
/// [`SParam`] lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalSet {
    pub s11: Vec<Complex>,
    pub s12: Vec<Complex>,
    pub s21: Vec<Complex>,
    pub s22: Vec<Complex>,
}

impl CalSet {
    pub fn len(&self) -> usize {
        self.s11.len()
    }

    pub fn is_empty(&self) -> bool {
        self.s11.is_empty()
    }
}
