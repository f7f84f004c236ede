mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{wait_until, HeldTransport, InlineTransport};
use courier_blob::{
    BridgeError, CallTimeouts, MemoryTransport, RemoteBridge, RemoteFault, RemoteRequest,
    RemoteResponse,
};

fn probe() -> RemoteRequest {
    RemoteRequest::ProbeAuth
}

/// B1. A response arriving before the caller waits still resolves:
/// the correlation entry is registered before dispatch.
#[tokio::test]
async fn response_before_wait_is_not_lost() {
    let bridge = RemoteBridge::new(InlineTransport, CallTimeouts::default());

    let response = bridge.call(probe(), Duration::from_secs(1)).await.unwrap();
    assert!(matches!(response, RemoteResponse::AuthState { ready: true }));
    assert_eq!(bridge.pending_calls(), 0);
}

/// B2. A held call resolves with the fired response
#[tokio::test]
async fn resolves_fired_response() {
    let transport = Arc::new(HeldTransport::new());
    let bridge = Arc::new(RemoteBridge::from_arc(
        transport.clone(),
        CallTimeouts::default(),
    ));

    let call = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.call(probe(), Duration::from_secs(5)).await }
    });

    wait_until(|| transport.held_calls() == 1).await;
    assert_eq!(bridge.pending_calls(), 1);
    transport.fire_oldest(Ok(RemoteResponse::AuthState { ready: false }));

    let result = call.await.unwrap().unwrap();
    assert!(matches!(result, RemoteResponse::AuthState { ready: false }));
    assert_eq!(bridge.pending_calls(), 0);
}

/// B3. A backend error payload surfaces as BridgeError::Remote
#[tokio::test]
async fn backend_fault_maps_to_remote_error() {
    let transport = Arc::new(HeldTransport::new());
    let bridge = Arc::new(RemoteBridge::from_arc(
        transport.clone(),
        CallTimeouts::default(),
    ));

    let call = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.call(probe(), Duration::from_secs(5)).await }
    });

    wait_until(|| transport.held_calls() == 1).await;
    transport.fire_oldest(Err(RemoteFault::with_code(420, "FLOOD_WAIT")));

    let err = call.await.unwrap().unwrap_err();
    match err {
        BridgeError::Remote { message } => assert!(message.contains("FLOOD_WAIT")),
        other => panic!("expected Remote, got {other:?}"),
    }
}

/// B4. A call whose callback never fires times out and clears its entry
#[tokio::test]
async fn unanswered_call_times_out() {
    let transport = Arc::new(HeldTransport::new());
    let bridge = RemoteBridge::from_arc(transport.clone(), CallTimeouts::default());

    let err = bridge
        .call(probe(), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(bridge.pending_calls(), 0);
    assert_eq!(transport.held_calls(), 1);
}

/// B5. Exactly-once resolution: a success callback fired after the
/// timeout has elapsed is discarded silently: the call result stays
/// Timeout and no later state changes.
#[tokio::test]
async fn late_success_after_timeout_is_discarded() {
    let transport = Arc::new(HeldTransport::new());
    let bridge = RemoteBridge::from_arc(transport.clone(), CallTimeouts::default());

    let err = bridge
        .call(probe(), Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Timeout { .. }));

    // The timeout already removed the correlation entry; firing now must
    // be a no-op rather than a panic or a resurrected result.
    transport.fire_oldest(Ok(RemoteResponse::AuthState { ready: true }));
    assert_eq!(bridge.pending_calls(), 0);
}

/// B6. A late response never leaks into a later call: tokens are not
/// reused, so the stale callback cannot find the new call's entry.
#[tokio::test]
async fn late_response_cannot_cross_into_next_call() {
    let transport = Arc::new(HeldTransport::new());
    let bridge = Arc::new(RemoteBridge::from_arc(
        transport.clone(),
        CallTimeouts::default(),
    ));

    // First call times out, leaving its callback held.
    let err = bridge
        .call(probe(), Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    // Second call goes out while the first callback is still pending.
    let call = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.call(probe(), Duration::from_secs(5)).await }
    });
    wait_until(|| transport.held_calls() == 2).await;

    // Fire the STALE callback with a distinctive payload: it must vanish.
    transport.fire_oldest(Ok(RemoteResponse::AuthState { ready: true }));
    assert_eq!(bridge.pending_calls(), 1);

    // The second call still resolves with its own response.
    transport.fire_oldest(Ok(RemoteResponse::AuthState { ready: false }));
    let result = call.await.unwrap().unwrap();
    assert!(matches!(result, RemoteResponse::AuthState { ready: false }));
}

/// B7. A transport that destroys the callback without invoking it is
/// reclaimed by the timeout, not leaked.
#[tokio::test]
async fn abandoned_callback_is_reclaimed_by_timeout() {
    let transport = Arc::new(HeldTransport::new());
    let bridge = Arc::new(RemoteBridge::from_arc(
        transport.clone(),
        CallTimeouts::default(),
    ));

    let call = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.call(probe(), Duration::from_millis(100)).await }
    });
    wait_until(|| transport.held_calls() == 1).await;
    transport.abandon_oldest();

    let err = call.await.unwrap().unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(bridge.pending_calls(), 0);
}

/// B8. N concurrent calls with distinct tokens each resolve to their own
/// matching response under randomized callback-arrival interleavings.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_never_cross_wire() {
    let transport = MemoryTransport::new()
        .with_latency(Duration::ZERO, Duration::from_millis(25));
    let bridge = Arc::new(RemoteBridge::new(transport, CallTimeouts::default()));

    let mut tasks = Vec::new();
    for i in 0..32u32 {
        let bridge = Arc::clone(&bridge);
        tasks.push(tokio::spawn(async move {
            let filename = format!("file-{i}.bin");
            let payload = bytes::Bytes::from(vec![i as u8; 64]);
            let posted = bridge
                .call(
                    RemoteRequest::SendDocument {
                        filename: filename.clone(),
                        payload,
                    },
                    Duration::from_secs(5),
                )
                .await
                .unwrap();
            let handle = match posted {
                RemoteResponse::Posted { handle } => handle,
                other => panic!("expected Posted, got {other:?}"),
            };

            // Looking the handle back up must return THIS call's document.
            let looked_up = bridge
                .call(
                    RemoteRequest::LookupMessage { handle },
                    Duration::from_secs(5),
                )
                .await
                .unwrap();
            match looked_up {
                RemoteResponse::Message {
                    content:
                        courier_blob::MessageContent::Document {
                            filename: found, ..
                        },
                } => assert_eq!(found.as_deref(), Some(filename.as_str())),
                other => panic!("expected a document, got {other:?}"),
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(bridge.pending_calls(), 0);
}

/// B9. The auth probe reads errors and timeouts as "not ready"
#[tokio::test]
async fn auth_probe_reads_failure_as_not_ready() {
    let transport = MemoryTransport::new();
    transport.set_auth_ready(false);
    let bridge = RemoteBridge::new(transport, CallTimeouts::default());
    assert!(!bridge.is_ready().await);

    // Unanswered probe: not ready after the (short) probe timeout.
    let held = Arc::new(HeldTransport::new());
    let bridge = RemoteBridge::from_arc(
        held,
        CallTimeouts::default().with_auth_probe(Duration::from_millis(30)),
    );
    assert!(!bridge.is_ready().await);
}

/// B10. A ready backend probes as ready
#[tokio::test]
async fn auth_probe_reports_ready() {
    let bridge = RemoteBridge::new(MemoryTransport::new(), CallTimeouts::default());
    assert!(bridge.is_ready().await);
}
