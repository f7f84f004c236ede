mod common;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use common::patterned_payload;
use courier_blob::{
    BridgeError, CallTimeouts, DownloadError, DownloadPipe, MemoryTransport, RemoteBridge,
};
use tokio::io::AsyncWrite;

fn pipe() -> (Arc<MemoryTransport>, DownloadPipe) {
    let transport = Arc::new(MemoryTransport::new());
    let bridge = Arc::new(RemoteBridge::from_arc(
        transport.clone(),
        CallTimeouts::default(),
    ));
    (transport, DownloadPipe::new(bridge))
}

/// Sink that fails with a broken-pipe error after accepting `limit` bytes
struct FailingSink {
    written: usize,
    limit: usize,
}

impl AsyncWrite for FailingSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        if self.written + buf.len() > self.limit {
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "consumer went away",
            )));
        }
        self.written += buf.len();
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// D1. A stored document streams back byte-identical, relayed through
/// fixed-size chunks rather than one allocation.
#[tokio::test]
async fn roundtrip_streams_full_payload() {
    let (transport, pipe) = pipe();
    // Larger than the staged read chunk, so the relay spans many chunks.
    let payload = patterned_payload(300 * 1024);
    let handle = transport.post_document("video.mp4", payload.clone());

    let stream = pipe.open(&handle).await.unwrap();
    let mut sink = Vec::new();
    let relayed = DownloadPipe::copy(stream, &mut sink).await.unwrap();

    assert_eq!(relayed, payload.len() as u64);
    assert_eq!(sink, payload.to_vec());
}

/// D2. A handle referencing a non-document yields NotFound, and no
/// fetch is ever triggered.
#[tokio::test]
async fn non_document_is_not_found() {
    let (transport, pipe) = pipe();
    let handle = transport.post_text("text");

    let err = pipe.open(&handle).await.map(|_| ()).unwrap_err();
    assert!(matches!(err, DownloadError::NotFound));
    assert_eq!(transport.count_of("lookup_message"), 1);
    assert_eq!(transport.count_of("fetch_content"), 0);
}

/// D3. A backend that reports staging incomplete yields Incomplete and
/// never a byte source.
#[tokio::test]
async fn incomplete_staging_yields_incomplete() {
    let (transport, pipe) = pipe();
    let handle = transport.post_document("slow.bin", patterned_payload(1024));
    transport.set_incomplete(&handle);

    let err = pipe.open(&handle).await.map(|_| ()).unwrap_err();
    assert!(matches!(err, DownloadError::Incomplete));
}

/// D4. An unknown handle surfaces the lookup fault as a transport error
#[tokio::test]
async fn unknown_handle_surfaces_lookup_fault() {
    let (_transport, pipe) = pipe();
    let bogus = courier_blob::BlobHandle::from_string("msg-999999".into());

    let err = pipe.open(&bogus).await.map(|_| ()).unwrap_err();
    match err {
        DownloadError::Transport {
            source: BridgeError::Remote { message },
        } => assert!(message.contains("not found")),
        other => panic!("expected a transport error, got {other:?}"),
    }
}

/// D5. A consumer-side failure mid-stream aborts as StreamFailed;
/// partial output is reported as a failure, not a short success.
#[tokio::test]
async fn mid_stream_sink_failure_aborts() {
    let (transport, pipe) = pipe();
    let payload = patterned_payload(200 * 1024);
    let handle = transport.post_document("cut.bin", payload);

    let stream = pipe.open(&handle).await.unwrap();
    let mut sink = FailingSink {
        written: 0,
        limit: 80 * 1024,
    };
    let err = DownloadPipe::copy(stream, &mut sink).await.unwrap_err();
    assert!(matches!(err, DownloadError::StreamFailed { .. }));
}

/// D6. Deleted content stops resolving
#[tokio::test]
async fn deleted_document_no_longer_resolves() {
    let (transport, pipe) = pipe();
    let handle = transport.post_document("gone.bin", patterned_payload(512));

    // Delete through the remote contract, then try to open.
    let bridge = Arc::new(RemoteBridge::from_arc(
        transport.clone(),
        CallTimeouts::default(),
    ));
    bridge
        .call(
            courier_blob::RemoteRequest::DeleteMessage {
                handle: handle.clone(),
            },
            CallTimeouts::default().delete,
        )
        .await
        .unwrap();

    let err = pipe.open(&handle).await.map(|_| ()).unwrap_err();
    assert!(matches!(err, DownloadError::Transport { .. }));
    assert!(!transport.contains(&handle));
}
