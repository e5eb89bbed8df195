//! Measurement primitive (C2, spec §4.2): moves the switch to the requested
//! position, asks the VNA collaborator to sweep, and fills in the result.
//! Errors from either collaborator pass through unchanged — this module
//! adds no retry or interpretation logic of its own.

use crate::error::VnaError;
use crate::model::RangeQuery;
use crate::switch::SwitchDriver;
use crate::vna::VnaDriver;
use std::sync::Arc;

pub struct MeasurementPrimitive<S: SwitchDriver + ?Sized, V: VnaDriver + ?Sized> {
    switch: Arc<S>,
    vna: Arc<V>,
}

impl<S: SwitchDriver + ?Sized, V: VnaDriver + ?Sized> MeasurementPrimitive<S, V> {
    pub fn new(switch: Arc<S>, vna: Arc<V>) -> Self {
        Self { switch, vna }
    }

    /// Move the switch to `rq.what`, sweep, and write the result into `rq`.
    pub async fn measure_range(&self, rq: &mut RangeQuery) -> Result<(), VnaError> {
        self.switch.set_port(&rq.what).await?;
        let result = self
            .vna
            .measure(rq)
            .await
            .map_err(VnaError::Measurement)?;
        rq.result = result;
        Ok(())
    }
}
