//! Request dispatcher (C5, spec §4.5): the task that reads inbound requests
//! off a channel, runs each against the shared calibration coordinator, and
//! writes a response. Routing, by `request.command.command`, for a
//! `RangeQuery` (spec §4.5):
//! - `rq` / `rangequery` -> C2 `MeasureRange`, a direct uncalibrated sweep
//! - `rc` / `rangecal` -> C4 `CalibrateRange`, the one-shot calibration
//! - `sc` / `setupcal` -> C4 `CalibrateSetup`
//! - `mc` / `measurecal` -> C4 `CalibrateMeasure`, standard named by `What`
//! - `cc` / `confirmcal` -> C4 `CalibrateConfirm`
//!
//! Any other command string inside a `RangeQuery` is an explicit "unknown
//! command" error rather than silently falling through to a plain sweep
//! (spec §9 flags the source's silent-ignore behavior as a likely bug).
//! A `CalibratedRangeQuery` always goes to C4 `MeasureRangeCalibrated`.
//!
//! Each request is handled by a `tokio::spawn`ed task, so its deadline can
//! be raced against that task's `JoinHandle` without cancelling the task on
//! timeout (spec §4.5 step 3, §5 Cancellation): "the worker continues to
//! completion in the background … an accepted trade-off." Dropping a
//! `JoinHandle` does not abort the task it points to, only `.abort()` does,
//! so letting a losing `select!` branch's handle fall out of scope is
//! exactly the detach the spec calls for. Because the coordinator's state
//! (C4/C6) can now be touched by more than one in-flight task at a time —
//! the leaked task from a prior timeout, plus whatever request the
//! dispatcher is now processing — it is held behind a `tokio::sync::Mutex`
//! rather than accessed through a bare `&mut self`; the lock is held only
//! for the duration of one handler's I/O, and the dispatcher's own
//! single-task request loop still determines response order, so FIFO
//! ordering (spec §8 invariant 6) is unaffected.

use crate::calibration::CalibrationCoordinator;
use crate::error::VnaError;
use crate::measurement::MeasurementPrimitive;
use crate::model::{CustomResult, IncomingRequest, OutgoingResponse};
use crate::rpc::CalibrationClient;
use crate::switch::SwitchDriver;
use crate::vna::VnaDriver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// One inbound request plus where to send its eventual response.
pub struct DispatchRequest {
    pub request: IncomingRequest,
    pub respond_to: oneshot::Sender<OutgoingResponse>,
}

impl DispatchRequest {
    pub fn new(request: IncomingRequest) -> (Self, oneshot::Receiver<OutgoingResponse>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                request,
                respond_to: tx,
            },
            rx,
        )
    }
}

pub struct Dispatcher<S: SwitchDriver + ?Sized, V: VnaDriver + ?Sized, R: CalibrationClient + ?Sized> {
    receiver: mpsc::Receiver<DispatchRequest>,
    vna: Arc<V>,
    measurement: Arc<MeasurementPrimitive<S, V>>,
    coordinator: Arc<Mutex<CalibrationCoordinator<S, V, R>>>,
    timeout_request: Duration,
    cancellation: CancellationToken,
}

impl<S, V, R> Dispatcher<S, V, R>
where
    S: SwitchDriver + 'static + ?Sized,
    V: VnaDriver + 'static + ?Sized,
    R: CalibrationClient + 'static + ?Sized,
{
    pub fn new(
        receiver: mpsc::Receiver<DispatchRequest>,
        switch: Arc<S>,
        vna: Arc<V>,
        rpc: Arc<R>,
        timeout_request: Duration,
        cancellation: CancellationToken,
    ) -> Self {
        let coordinator =
            CalibrationCoordinator::new(switch.clone(), vna.clone(), rpc, timeout_request);
        Self {
            receiver,
            measurement: Arc::new(MeasurementPrimitive::new(switch, vna.clone())),
            vna,
            coordinator: Arc::new(Mutex::new(coordinator)),
            timeout_request,
            cancellation,
        }
    }

    /// Process requests until the channel closes or cancellation fires.
    pub async fn run(mut self) {
        loop {
            let dispatch = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    info!("dispatcher cancelled, shutting down");
                    break;
                }
                next = self.receiver.recv() => next,
            };

            let Some(dispatch) = dispatch else {
                info!("dispatcher channel closed, shutting down");
                break;
            };

            self.dispatch_with_timeout(dispatch).await;
        }
    }

    /// Spawn the handler as a detached task and race its completion against
    /// `timeout_request`. On deadline, responds with `"timeout"` immediately
    /// and lets the spawned task keep running; its eventual result, once the
    /// `JoinHandle` is dropped, is simply discarded.
    #[instrument(
        skip(self, dispatch),
        fields(
            command = %dispatch.request.command_id().command,
            id = %dispatch.request.command_id().id
        )
    )]
    async fn dispatch_with_timeout(&mut self, dispatch: DispatchRequest) {
        let DispatchRequest { request, respond_to } = dispatch;
        let echoed_request = request.clone();

        let handle = tokio::spawn(process(
            request,
            self.vna.clone(),
            self.measurement.clone(),
            self.coordinator.clone(),
        ));

        tokio::select! {
            result = handle => {
                let response = match result {
                    Ok(response) => response,
                    Err(join_err) => OutgoingResponse::Err(CustomResult {
                        message: format!("handler task failed: {join_err}"),
                        command: echoed_request,
                    }),
                };
                let _ = respond_to.send(response);
            }
            _ = tokio::time::sleep(self.timeout_request) => {
                warn!("request timed out");
                let _ = respond_to.send(OutgoingResponse::Err(CustomResult {
                    message: VnaError::Timeout.user_message(),
                    command: echoed_request,
                }));
            }
        }
    }
}

/// Classify and run one request against the shared collaborators. Runs
/// inside its own `tokio::spawn`ed task so the dispatcher's deadline can be
/// raced without cancelling it.
async fn process<S, V, R>(
    mut request: IncomingRequest,
    vna: Arc<V>,
    measurement: Arc<MeasurementPrimitive<S, V>>,
    coordinator: Arc<Mutex<CalibrationCoordinator<S, V, R>>>,
) -> OutgoingResponse
where
    S: SwitchDriver + ?Sized,
    V: VnaDriver + ?Sized,
    R: CalibrationClient + ?Sized,
{
    let result = match &mut request {
        IncomingRequest::ReasonableFrequencyRange(rq) => {
            rq.result = vna.reasonable_frequency_range();
            Ok(())
        }
        IncomingRequest::RangeQuery(rq) => match rq.command.command.as_str() {
            "rq" | "rangequery" => measurement.measure_range(rq).await,
            "rc" | "rangecal" => coordinator.lock().await.calibrate_range(rq).await,
            "sc" | "setupcal" => {
                coordinator.lock().await.calibrate_setup(rq.clone());
                Ok(())
            }
            "mc" | "measurecal" => coordinator
                .lock()
                .await
                .calibrate_measure(rq)
                .await
                .map(|result| rq.result = result),
            "cc" | "confirmcal" => coordinator
                .lock()
                .await
                .calibrate_confirm()
                .await
                .map(|result| rq.result = result),
            other => Err(VnaError::Measurement(format!(
                "unknown command {other:?}"
            ))),
        },
        IncomingRequest::CalibratedRangeQuery(rq) => {
            coordinator.lock().await.measure_range_calibrated(rq).await
        }
    };

    match result {
        Ok(()) => OutgoingResponse::Ok(request),
        Err(err) => OutgoingResponse::Err(CustomResult {
            message: err.user_message(),
            command: request,
        }),
    }
}
