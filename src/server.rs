//! Wires an inbound request stream to the dispatcher.
//!
//! This crate doesn't own the WebSocket relay (spec §1/§6): a real relay
//! adapter decodes frames into [`IncomingRequest`](crate::model::IncomingRequest)
//! values and feeds them to [`Server::submit`], then encodes the returned
//! [`OutgoingResponse`](crate::model::OutgoingResponse) back into a frame.
//! `Server` just owns the channel to the dispatcher task and the task
//! handle, mirroring the teacher's `NetworkServerActor` handle pattern.

use crate::dispatcher::{DispatchRequest, Dispatcher};
use crate::model::{IncomingRequest, OutgoingResponse};
use crate::rpc::CalibrationClient;
use crate::switch::SwitchDriver;
use crate::vna::VnaDriver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A handle to the running dispatcher task plus the channel used to submit
/// requests to it.
pub struct Server {
    sender: mpsc::Sender<DispatchRequest>,
    cancellation: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl Server {
    /// Spawn the dispatcher task, wired to `switch`, `vna`, and `rpc`.
    pub fn spawn<S, V, R>(
        switch: Arc<S>,
        vna: Arc<V>,
        rpc: Arc<R>,
        timeout_request: Duration,
        channel_capacity: usize,
    ) -> Self
    where
        S: SwitchDriver + 'static + ?Sized,
        V: VnaDriver + 'static + ?Sized,
        R: CalibrationClient + 'static + ?Sized,
    {
        let (sender, receiver) = mpsc::channel(channel_capacity);
        let cancellation = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            receiver,
            switch,
            vna,
            rpc,
            timeout_request,
            cancellation.clone(),
        );
        let join_handle = tokio::spawn(dispatcher.run());

        Self {
            sender,
            cancellation,
            join_handle,
        }
    }

    /// Submit one request and await its response. Intended to be called by
    /// the relay adapter once per inbound frame.
    pub async fn submit(&self, request: IncomingRequest) -> Option<OutgoingResponse> {
        let (dispatch, rx) = DispatchRequest::new(request);
        self.sender.send(dispatch).await.ok()?;
        rx.await.ok()
    }

    /// Signal the dispatcher to stop accepting new work and wait for it to
    /// drain its current request.
    pub async fn shutdown(self) {
        self.cancellation.cancel();
        let _ = self.join_handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommandId, FrequencyRange, RangeQuery, SParamSelect};
    use crate::rpc::MockCalibrationClient;
    use crate::switch::MockSwitchDriver;
    use crate::vna::MockVnaDriver;

    #[tokio::test]
    async fn submit_round_trips_a_request() {
        let server = Server::spawn(
            Arc::new(MockSwitchDriver::new()),
            Arc::new(MockVnaDriver::new()),
            Arc::new(MockCalibrationClient::new()),
            Duration::from_secs(1),
            8,
        );

        let request = IncomingRequest::RangeQuery(RangeQuery {
            command: CommandId {
                command: "rangequery".into(),
                id: "1".into(),
            },
            what: "dut1".into(),
            select: SParamSelect::all_true(),
            size: 2,
            log_distribution: false,
            frequency: FrequencyRange {
                start: 1_000_000_000,
                end: 2_000_000_000,
            },
            avg: 1,
            result: vec![],
        });

        let response = server.submit(request).await.unwrap();
        assert!(matches!(response, OutgoingResponse::Ok(_)));
        server.shutdown().await;
    }
}
