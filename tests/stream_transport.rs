//! StreamTransport against real byte sources: a capture file and a TCP bridge.

use std::io::Write;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use airwatch::{drain, LineTransport, StreamTransport, TimeSeriesStore, TransportError};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Drain until the transport reports closure.
async fn drain_until_closed(transport: &mut dyn LineTransport, store: &TimeSeriesStore) -> String {
    for _ in 0..200 {
        match drain(transport, store) {
            Ok(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            Err(TransportError::Closed(reason)) => return reason,
        }
    }
    panic!("transport never closed");
}

#[tokio::test]
async fn replays_capture_file() {
    let mut capture = tempfile::NamedTempFile::new().unwrap();
    write!(
        capture,
        "VOC: 450, 甲醛: 80, PM2.5: 60\r\nnoise\r\nVOC: 700 ... 甲醛: 120 ... PM2.5: 90"
    )
    .unwrap();
    capture.flush().unwrap();

    let mut transport = StreamTransport::open(capture.path(), TIMEOUT).await.unwrap();
    assert!(transport.description().starts_with("stream: "));

    let store = TimeSeriesStore::new();
    let reason = drain_until_closed(&mut transport, &store).await;
    assert_eq!(reason, "Connection closed");

    let values: Vec<u32> = store.snapshot().iter().map(|s| s.readings.voc).collect();
    assert_eq!(values, [450, 700]);
}

#[tokio::test]
async fn open_missing_device_fails() {
    let result = StreamTransport::open("/nonexistent/ttyUSB9", TIMEOUT).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn reads_from_tcp_bridge() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        // Split a line across writes, including inside a multi-byte character
        let line = "VOC: 500, 甲醛: 90, PM2.5: 70\n".as_bytes();
        let (head, tail) = line.split_at(12);
        socket.write_all(head).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        socket.write_all(tail).await.unwrap();
        socket.write_all(b"VOC: 1, \xe7\x94\xb2\xe9\x86\x9b: 2, PM2.5: 3\n").await.unwrap();
    });

    let mut transport = StreamTransport::connect(&addr, TIMEOUT).await.unwrap();
    assert_eq!(transport.description(), format!("stream: tcp://{}", addr));

    server.await.unwrap();

    let store = TimeSeriesStore::new();
    drain_until_closed(&mut transport, &store).await;

    let readings: Vec<_> = store.snapshot().iter().map(|s| s.readings).collect();
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].voc, 500);
    assert_eq!(readings[0].hcho, 90);
    assert_eq!(readings[1].pm25, 3);
}
