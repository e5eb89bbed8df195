//! # VNA Middle Layer
//!
//! Core library for the middle layer of a two-port vector network analyzer
//! instrument server. A remote user sends JSON commands over a WebSocket
//! stream; this crate arbitrates access to an RF switch matrix (serial) and
//! a VNA vendor driver, and coordinates a gRPC calibration process, without
//! itself owning the WebSocket transport, the vendor driver, or the
//! calibration mathematics.
//!
//! ## Crate structure
//!
//! - **`model`**: shared data types — `SParam`, `SParamSelect`, `RangeQuery`,
//!   `CalibratedRangeQuery`, `Complex`, and the wire-level request/response
//!   envelopes the dispatcher consumes and produces.
//! - **`error`**: the crate-wide `VnaError` taxonomy.
//! - **`config`**: `Settings`, loaded from TOML plus environment overrides.
//! - **`switch`**: the RF switch driver (C1) — serial transport, wire
//!   protocol, and a mock for testing.
//! - **`vna`**: the `VnaDriver` trait the measurement primitive depends on,
//!   plus a mock implementation.
//! - **`measurement`**: the measurement primitive (C2).
//! - **`format_bridge`**: pure conversions between the S-parameter list form
//!   and the calibration RPC's parallel-array form (C3).
//! - **`rpc`**: the `CalibrationClient` trait wrapping the gRPC
//!   `CalibrateTwoPort` call, a `tonic`-backed implementation, and a mock.
//! - **`calibration`**: the calibration coordinator and readiness guard
//!   (C4, C6).
//! - **`dispatcher`**: the request dispatcher (C5).
//! - **`server`**: wiring that ties a dispatcher to an inbound request
//!   stream; used by the `vna-mid` binary.

pub mod calibration;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod format_bridge;
pub mod measurement;
pub mod model;
pub mod rpc;
pub mod server;
pub mod switch;
pub mod validation;
pub mod vna;
