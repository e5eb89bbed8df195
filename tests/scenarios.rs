//! End-to-end scenarios exercising the dispatcher against the mock switch,
//! mock VNA, and mock calibration client, mirroring the source project's
//! documented test scenarios.

use std::sync::Arc;
use std::time::Duration;

use vna_mid::dispatcher::{DispatchRequest, Dispatcher};
use vna_mid::model::{
    CalibratedRangeQuery, CommandId, FrequencyRange, IncomingRequest, OutgoingResponse, RangeQuery,
    SParamSelect,
};
use vna_mid::rpc::MockCalibrationClient;
use vna_mid::switch::MockSwitchDriver;
use vna_mid::vna::MockVnaDriver;

fn spawn(
    switch: MockSwitchDriver,
    timeout_request: Duration,
) -> tokio::sync::mpsc::Sender<DispatchRequest> {
    let (tx, rx) = tokio::sync::mpsc::channel(32);
    let dispatcher = Dispatcher::new(
        rx,
        Arc::new(switch),
        Arc::new(MockVnaDriver::new()),
        Arc::new(MockCalibrationClient::new()),
        timeout_request,
        tokio_util::sync::CancellationToken::new(),
    );
    tokio::spawn(dispatcher.run());
    tx
}

fn range_query(command: &str, size: u32) -> RangeQuery {
    RangeQuery {
        command: CommandId {
            command: command.to_string(),
            id: "id".into(),
        },
        what: String::new(),
        select: SParamSelect::default(),
        size,
        log_distribution: false,
        frequency: FrequencyRange {
            start: 1_000_000_000,
            end: 2_000_000_000,
        },
        avg: 1,
        result: vec![],
    }
}

async fn send(
    tx: &tokio::sync::mpsc::Sender<DispatchRequest>,
    request: IncomingRequest,
) -> OutgoingResponse {
    let (dispatch, rx) = DispatchRequest::new(request);
    tx.send(dispatch).await.unwrap();
    rx.await.unwrap()
}

#[tokio::test]
async fn s1_setup_then_confirm_without_measuring_reports_missing_short() {
    let tx = spawn(MockSwitchDriver::new(), Duration::from_secs(1));

    let setup = send(&tx, IncomingRequest::RangeQuery(range_query("sc", 3))).await;
    assert!(matches!(setup, OutgoingResponse::Ok(_)));

    let confirm = send(&tx, IncomingRequest::RangeQuery(range_query("cc", 3))).await;
    match confirm {
        OutgoingResponse::Err(err) => {
            assert_eq!(err.message, "calibration not complete (missing short, maybe others)");
        }
        OutgoingResponse::Ok(_) => panic!("expected confirm to fail"),
    }
}

#[tokio::test]
async fn s2_full_step_by_step_flow_produces_three_points() {
    let tx = spawn(MockSwitchDriver::new(), Duration::from_secs(1));

    assert!(matches!(
        send(&tx, IncomingRequest::RangeQuery(range_query("sc", 3))).await,
        OutgoingResponse::Ok(_)
    ));

    for standard in ["short", "open", "load", "thru"] {
        let mut rq = range_query("mc", 3);
        rq.what = standard.to_string();
        let response = send(&tx, IncomingRequest::RangeQuery(rq)).await;
        assert!(matches!(response, OutgoingResponse::Ok(_)), "{standard} measurement failed");
    }

    let confirm = send(&tx, IncomingRequest::RangeQuery(range_query("cc", 3))).await;
    match confirm {
        OutgoingResponse::Ok(IncomingRequest::RangeQuery(rq)) => {
            assert_eq!(rq.result.len(), 3);
        }
        other => panic!("unexpected confirm response: {other:?}"),
    }
}

#[tokio::test]
async fn s3_range_change_invalidates_prior_calibration() {
    let tx = spawn(MockSwitchDriver::new(), Duration::from_secs(1));

    let rc = send(&tx, IncomingRequest::RangeQuery(range_query("rc", 3))).await;
    assert!(matches!(rc, OutgoingResponse::Ok(_)));

    let resetup = send(&tx, IncomingRequest::RangeQuery(range_query("sc", 5))).await;
    assert!(matches!(resetup, OutgoingResponse::Ok(_)));

    let confirm = send(&tx, IncomingRequest::RangeQuery(range_query("cc", 5))).await;
    match confirm {
        OutgoingResponse::Err(err) => assert!(err.message.contains("missing short")),
        OutgoingResponse::Ok(_) => panic!("expected confirm to fail after range change"),
    }
}

#[tokio::test]
async fn s4_switch_drain_consumes_stale_bytes_before_validating_reply() {
    let (mut device, host) = tokio::io::duplex(512);
    let timeouts = vna_mid::switch::SwitchTimeouts {
        drain_timeout: Duration::from_millis(20),
        reply_drain_timeout: Duration::from_millis(30),
        read_timeout: Duration::from_millis(200),
    };
    let driver = vna_mid::switch::SerialSwitchDriver::new(Box::new(host), timeouts);

    // Stage stale bytes before the host ever writes its request.
    tokio::io::AsyncWriteExt::write_all(&mut device, b"\x01\x02\x03").await.unwrap();

    let responder = tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        let n = tokio::io::AsyncReadExt::read(&mut device, &mut buf).await.unwrap();
        let sent = String::from_utf8_lossy(&buf[..n]);
        assert!(sent.contains("\"to\":\"load\""));
        tokio::io::AsyncWriteExt::write_all(
            &mut device,
            b"{\"report\":\"port\",\"is\":\"load\"}\n",
        )
        .await
        .unwrap();
    });

    driver.set_port("load").await.unwrap();
    responder.await.unwrap();
    assert_eq!(driver.last_port(), Some("load".to_string()));
}

#[tokio::test]
async fn s5_request_deadline_reports_timeout() {
    struct SlowVna;

    #[async_trait::async_trait]
    impl vna_mid::vna::VnaDriver for SlowVna {
        async fn measure(
            &self,
            _rq: &vna_mid::model::RangeQuery,
        ) -> Result<Vec<vna_mid::model::SParam>, String> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(vec![])
        }

        fn reasonable_frequency_range(&self) -> Option<FrequencyRange> {
            None
        }
    }

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    let dispatcher = Dispatcher::new(
        rx,
        Arc::new(MockSwitchDriver::new()),
        Arc::new(SlowVna),
        Arc::new(MockCalibrationClient::new()),
        Duration::from_millis(50),
        tokio_util::sync::CancellationToken::new(),
    );
    tokio::spawn(dispatcher.run());

    let start = tokio::time::Instant::now();
    let response = send(&tx, IncomingRequest::RangeQuery(range_query("rangequery", 1))).await;
    let elapsed = start.elapsed();

    match response {
        OutgoingResponse::Err(err) => assert_eq!(err.message, "timeout"),
        OutgoingResponse::Ok(_) => panic!("expected a timeout response"),
    }
    assert!(elapsed < Duration::from_millis(150), "took {elapsed:?}");
}

#[tokio::test]
async fn s6_calibrated_dut_sweep_after_range_cal() {
    let switch = MockSwitchDriver::new();
    let tx = spawn(switch, Duration::from_secs(1));

    let rc = send(&tx, IncomingRequest::RangeQuery(range_query("rc", 3))).await;
    assert!(matches!(rc, OutgoingResponse::Ok(_)));

    let calibrated_request = IncomingRequest::CalibratedRangeQuery(CalibratedRangeQuery {
        command: CommandId {
            command: "measure_range_calibrated".into(),
            id: "dut-sweep".into(),
        },
        what: "dut1".into(),
        avg: 1,
        result: vec![],
    });

    match send(&tx, calibrated_request).await {
        OutgoingResponse::Ok(IncomingRequest::CalibratedRangeQuery(rq)) => {
            assert_eq!(rq.what, "dut1");
            assert_eq!(rq.result.len(), 3);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn unrecognized_range_query_command_is_an_explicit_error() {
    let tx = spawn(MockSwitchDriver::new(), Duration::from_secs(1));
    match send(&tx, IncomingRequest::RangeQuery(range_query("bogus", 1))).await {
        OutgoingResponse::Err(err) => assert!(err.message.contains("unknown command")),
        OutgoingResponse::Ok(_) => panic!("expected an explicit error for an unknown command"),
    }
}
