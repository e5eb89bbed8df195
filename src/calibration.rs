//! Calibration coordinator and readiness guard (C4, C6; spec §4.4/§4.6).
//!
//! A two-port SOLT calibration proceeds: `calibrate_setup` freezes the
//! sweep parameters (size, frequency range, log distribution, select) for
//! the calibration session; `calibrate_measure` is called once per standard
//! (`short`, `open`, `load`, `thru`) and records it; once all four are in,
//! `calibrate_confirm` runs the frozen set through the calibration RPC,
//! using the thru standard as a placeholder DUT, producing a canonical
//! result. `calibrate_range` is the atomic one-shot equivalent of
//! setup+measure×4+confirm. `measure_range_calibrated` sweeps the DUT and
//! applies whatever calibration is currently on file.
//!
//! All mutation happens on whichever task calls these methods; per §5 that
//! is always the dispatcher's single task, so no internal locking is
//! needed.

use crate::error::{CalibrationError, VnaError};
use crate::format_bridge::{cal_to_meas, meas_to_cal, meas_to_freq};
use crate::measurement::MeasurementPrimitive;
use crate::model::{CalibratedRangeQuery, RangeQuery, SParam, SParamSelect};
use crate::rpc::{cal_set_from_proto, cal_set_to_proto, CalibrationClient, CalibrationRequest};
use crate::switch::SwitchDriver;
use crate::vna::VnaDriver;
use std::sync::Arc;
use std::time::Duration;

/// The five booleans gating when a calibrated measurement is legal (C6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub setup: bool,
    pub short: bool,
    pub open: bool,
    pub load: bool,
    pub thru: bool,
}

impl Readiness {
    pub fn all_standards_measured(&self) -> bool {
        self.short && self.open && self.load && self.thru
    }

    /// The first standard, in short/open/load/thru order, still missing.
    /// Used to build the ordered error message in §7/§8 S1/S3.
    pub fn first_missing(&self) -> Option<&'static str> {
        if !self.short {
            Some("short")
        } else if !self.open {
            Some("open")
        } else if !self.load {
            Some("load")
        } else if !self.thru {
            Some("thru")
        } else {
            None
        }
    }

    pub fn clear_standards(&mut self) {
        self.short = false;
        self.open = false;
        self.load = false;
        self.thru = false;
    }
}

#[derive(Debug, Clone, Default)]
struct Standards {
    short: Vec<SParam>,
    open: Vec<SParam>,
    load: Vec<SParam>,
    thru: Vec<SParam>,
}

pub struct CalibrationCoordinator<S: SwitchDriver + ?Sized, V: VnaDriver + ?Sized, R: CalibrationClient + ?Sized> {
    measurement: MeasurementPrimitive<S, V>,
    rpc: Arc<R>,
    rpc_timeout: Duration,
    frozen: Option<RangeQuery>,
    standards: Standards,
    dut: Vec<SParam>,
    dutcal: Vec<SParam>,
    readiness: Readiness,
}

impl<S: SwitchDriver + ?Sized, V: VnaDriver + ?Sized, R: CalibrationClient + ?Sized> CalibrationCoordinator<S, V, R> {
    pub fn new(switch: Arc<S>, vna: Arc<V>, rpc: Arc<R>, rpc_timeout: Duration) -> Self {
        Self {
            measurement: MeasurementPrimitive::new(switch, vna),
            rpc,
            rpc_timeout,
            frozen: None,
            standards: Standards::default(),
            dut: Vec::new(),
            dutcal: Vec::new(),
            readiness: Readiness::default(),
        }
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    /// Freeze the sweep parameters for a new calibration session, discarding
    /// any previously recorded standards. Forces `what := "thru"` and
    /// `select := all-true` on the stored copy, disconnected from whatever
    /// request produced it so later requests cannot mutate frozen fields.
    pub fn calibrate_setup(&mut self, mut rq: RangeQuery) {
        rq.what = "thru".to_string();
        rq.select = SParamSelect::all_true();
        self.frozen = Some(rq);
        self.standards = Standards::default();
        self.dut.clear();
        self.dutcal.clear();
        self.readiness.clear_standards();
        self.readiness.setup = true;
    }

    /// Measure one SOLT standard using the frozen sweep parameters, except
    /// for `avg`: spec §3 allows `avg` to change per step without
    /// invalidating the calibration, so the incoming request's `avg` is
    /// applied to this step's sweep rather than the one captured at setup.
    pub async fn calibrate_measure(&mut self, request: &RangeQuery) -> Result<Vec<SParam>, VnaError> {
        if !self.readiness.setup {
            return Err(CalibrationError::NotSetupYet.into());
        }
        let frozen = self
            .frozen
            .as_ref()
            .expect("readiness.setup implies frozen is set");

        let mut rq = frozen.clone();
        rq.what = request.what.clone();
        rq.avg = request.avg;
        self.measurement.measure_range(&mut rq).await?;

        match request.what.as_str() {
            "short" => {
                self.standards.short = rq.result.clone();
                self.readiness.short = true;
            }
            "open" => {
                self.standards.open = rq.result.clone();
                self.readiness.open = true;
            }
            "load" => {
                self.standards.load = rq.result.clone();
                self.readiness.load = true;
            }
            "thru" => {
                self.standards.thru = rq.result.clone();
                self.readiness.thru = true;
            }
            other => return Err(CalibrationError::UnknownStandard(other.to_string()).into()),
        }

        Ok(rq.result)
    }

    /// Run the frozen standards through the calibration RPC, using the thru
    /// standard as a placeholder DUT so the confirm trip produces a
    /// canonical result end to end.
    pub async fn calibrate_confirm(&mut self) -> Result<Vec<SParam>, VnaError> {
        self.require_all_standards()?;
        let request = self.build_request(self.standards.thru.clone());
        let response = self.call_rpc(request).await?;
        let result = cal_to_meas(
            &response.frequency,
            &cal_set_from_proto(&response.result.unwrap_or_default()),
        )?;
        self.dutcal = result.clone();
        Ok(result)
    }

    /// Atomic one-shot equivalent of setup + measure(short, open, load,
    /// thru) + confirm, in that order. Any step's failure aborts the
    /// sequence, leaving readiness consistent with whichever standards
    /// were actually measured before the failure.
    pub async fn calibrate_range(&mut self, rq: &mut RangeQuery) -> Result<(), VnaError> {
        self.calibrate_setup(rq.clone());
        for standard in ["short", "open", "load", "thru"] {
            let mut step = rq.clone();
            step.what = standard.to_string();
            self.calibrate_measure(&step).await?;
        }
        let result = self.calibrate_confirm().await?;
        rq.what = "thru".to_string();
        rq.select = SParamSelect::all_true();
        rq.result = result;
        Ok(())
    }

    /// Measure the DUT at `rq.what` on the frozen sweep parameters, then
    /// apply whatever calibration is currently on file.
    pub async fn measure_range_calibrated(
        &mut self,
        rq: &mut CalibratedRangeQuery,
    ) -> Result<(), VnaError> {
        let frozen = self
            .frozen
            .clone()
            .ok_or(CalibrationError::NotCalibratedYet)?;

        let mut raw = frozen.clone();
        raw.what = rq.what.clone();
        raw.avg = rq.avg;
        self.measurement.measure_range(&mut raw).await?;
        self.dut = raw.result.clone();

        let request = self.build_request(self.dut.clone());
        let response = self.call_rpc(request).await?;
        let calibrated = cal_to_meas(
            &response.frequency,
            &cal_set_from_proto(&response.result.unwrap_or_default()),
        )?;

        self.dutcal = calibrated.clone();
        rq.result = calibrated;
        Ok(())
    }

    fn require_all_standards(&self) -> Result<(), CalibrationError> {
        if !self.readiness.setup {
            return Err(CalibrationError::NotSetupYet);
        }
        if let Some(missing) = self.readiness.first_missing() {
            return Err(CalibrationError::MissingStandard(missing));
        }
        Ok(())
    }

    /// Build the RPC request buffer. The frequency axis always comes from
    /// the short standard (spec §4.4): by invariant 2 all six arrays share
    /// its length once calibration is complete.
    fn build_request(&self, dut: Vec<SParam>) -> CalibrationRequest {
        CalibrationRequest {
            frequency: meas_to_freq(&self.standards.short),
            short_standard: Some(cal_set_to_proto(&meas_to_cal(&self.standards.short))),
            open_standard: Some(cal_set_to_proto(&meas_to_cal(&self.standards.open))),
            load_standard: Some(cal_set_to_proto(&meas_to_cal(&self.standards.load))),
            thru_standard: Some(cal_set_to_proto(&meas_to_cal(&self.standards.thru))),
            dut: Some(cal_set_to_proto(&meas_to_cal(&dut))),
        }
    }

    async fn call_rpc(
        &self,
        request: CalibrationRequest,
    ) -> Result<crate::rpc::CalibrationResponse, VnaError> {
        tokio::time::timeout(self.rpc_timeout, self.rpc.calibrate_two_port(request))
            .await
            .map_err(|_| VnaError::Timeout)?
            .map_err(VnaError::from)
    }
}
