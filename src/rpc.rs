//! Calibration RPC client (spec §6): wraps the gRPC `CalibrateTwoPort` call
//! exposed by the calibration-mathematics collaborator. This crate is a
//! client only — the server side, and the calibration math it performs, are
//! both out of scope (spec §1).

/// Generated Protocol Buffer definitions from `proto/calibration.proto`.
pub mod proto {
    tonic::include_proto!("calibration");
}

use crate::model::{CalSet, Complex};
use async_trait::async_trait;
pub use proto::two_port_calibration_client::TwoPortCalibrationClient;
pub use proto::{CalibrationRequest, CalibrationResponse, Complex as ProtoComplex, ComplexSet};
use tonic::transport::Channel;

/// The calibration math boundary: given the four measured standards and a
/// DUT sweep, return the calibrated DUT S-parameters.
#[async_trait]
pub trait CalibrationClient: Send + Sync {
    async fn calibrate_two_port(
        &self,
        request: CalibrationRequest,
    ) -> Result<CalibrationResponse, tonic::Status>;
}

/// `tonic`-backed implementation dialing a real calibration server.
pub struct GrpcCalibrationClient {
    client: tokio::sync::Mutex<TwoPortCalibrationClient<Channel>>,
}

impl GrpcCalibrationClient {
    /// Dial `endpoint`. Per spec §7, a dial failure here is process-fatal:
    /// there is no way to serve any calibration request without it.
    pub async fn connect(endpoint: String) -> Result<Self, tonic::transport::Error> {
        let client = TwoPortCalibrationClient::connect(endpoint).await?;
        Ok(Self {
            client: tokio::sync::Mutex::new(client),
        })
    }
}

#[async_trait]
impl CalibrationClient for GrpcCalibrationClient {
    async fn calibrate_two_port(
        &self,
        request: CalibrationRequest,
    ) -> Result<CalibrationResponse, tonic::Status> {
        let mut client = self.client.lock().await;
        let response = client.calibrate_two_port(request).await?;
        Ok(response.into_inner())
    }
}

/// In-process stand-in: applies a trivial identity "calibration" (echoes
/// the DUT standard back unchanged) so dispatcher/coordinator tests don't
/// need a running calibration server.
pub struct MockCalibrationClient {
    fail_with: Option<String>,
}

impl MockCalibrationClient {
    pub fn new() -> Self {
        Self { fail_with: None }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
        }
    }
}

impl Default for MockCalibrationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalibrationClient for MockCalibrationClient {
    async fn calibrate_two_port(
        &self,
        request: CalibrationRequest,
    ) -> Result<CalibrationResponse, tonic::Status> {
        if let Some(message) = &self.fail_with {
            return Err(tonic::Status::internal(message.clone()));
        }
        Ok(CalibrationResponse {
            frequency: request.frequency,
            result: request.dut,
        })
    }
}

pub fn cal_set_to_proto(set: &CalSet) -> ComplexSet {
    ComplexSet {
        s11: set.s11.iter().map(complex_to_proto).collect(),
        s12: set.s12.iter().map(complex_to_proto).collect(),
        s21: set.s21.iter().map(complex_to_proto).collect(),
        s22: set.s22.iter().map(complex_to_proto).collect(),
    }
}

pub fn cal_set_from_proto(set: &ComplexSet) -> CalSet {
    CalSet {
        s11: set.s11.iter().map(complex_from_proto).collect(),
        s12: set.s12.iter().map(complex_from_proto).collect(),
        s21: set.s21.iter().map(complex_from_proto).collect(),
        s22: set.s22.iter().map(complex_from_proto).collect(),
    }
}

fn complex_to_proto(c: &Complex) -> ProtoComplex {
    ProtoComplex { re: c.re, im: c.im }
}

fn complex_from_proto(c: &ProtoComplex) -> Complex {
    Complex::new(c.re, c.im)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_echoes_dut_as_result() {
        let client = MockCalibrationClient::new();
        let request = CalibrationRequest {
            frequency: vec![1.0, 2.0],
            short_standard: Some(ComplexSet::default()),
            open_standard: Some(ComplexSet::default()),
            load_standard: Some(ComplexSet::default()),
            thru_standard: Some(ComplexSet::default()),
            dut: Some(ComplexSet {
                s11: vec![ProtoComplex { re: 1.0, im: 0.0 }],
                s12: vec![ProtoComplex { re: 0.1, im: 0.0 }],
                s21: vec![ProtoComplex { re: 0.2, im: 0.0 }],
                s22: vec![ProtoComplex { re: 1.0, im: 0.0 }],
            }),
        };
        let response = client.calibrate_two_port(request.clone()).await.unwrap();
        assert_eq!(response.frequency, request.frequency);
        assert_eq!(response.result, request.dut);
    }

    #[tokio::test]
    async fn mock_can_be_made_to_fail() {
        let client = MockCalibrationClient::failing("solver diverged");
        let err = client
            .calibrate_two_port(CalibrationRequest {
                frequency: vec![],
                short_standard: None,
                open_standard: None,
                load_standard: None,
                thru_standard: None,
                dut: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::Internal);
        assert_eq!(err.message(), "solver diverged");
    }

    #[test]
    fn cal_set_round_trips_through_proto() {
        let set = CalSet {
            s11: vec![Complex::new(1.0, 2.0)],
            s12: vec![Complex::new(0.1, 0.2)],
            s21: vec![Complex::new(0.3, 0.4)],
            s22: vec![Complex::new(1.0, -1.0)],
        };
        let proto = cal_set_to_proto(&set);
        let back = cal_set_from_proto(&proto);
        assert_eq!(set, back);
    }
}
