//! Codec and channel round-trip benchmarks.
//!
//! - Frame encode/decode at several payload sizes
//! - Send-to-echo latency over a loopback channel
//!
//! Run with: cargo bench --bench codec
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures_util::{SinkExt, StreamExt};
use runtime_conduit::{
    Conduit, ControlApi, ControlCommand, EventKind, Message, Options, decode_message,
    encode_message,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const PAYLOAD_SIZES: &[usize] = &[0, 256, 4096, 65535];

fn sample_options() -> Options {
    Message::new()
        .with_option("type", "frame")
        .with_option("seq", 42u32)
        .with_option("final", true)
        .with_option("trace", "4f1c2a")
        .options
}

// ============================================================================
// Benchmark: Encode / Decode
// ============================================================================

fn bench_codec(c: &mut Criterion) {
    let options = sample_options();

    let mut group = c.benchmark_group("codec");

    for &size in PAYLOAD_SIZES {
        let payload = vec![0xA5u8; size];
        let frame = encode_message(&options, &payload).unwrap();
        group.throughput(Throughput::Bytes(frame.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &payload, |b, payload| {
            b.iter(|| encode_message(&options, payload).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("decode", size), &frame, |b, frame| {
            b.iter(|| decode_message(frame).unwrap());
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Channel Round Trip
// ============================================================================

/// Control API reporting an always-active listener.
struct FixedControl {
    port: u16,
}

#[async_trait]
impl ControlApi for FixedControl {
    async fn request(&self, command: &ControlCommand) -> runtime_conduit::Result<Value> {
        Ok(match command {
            ControlCommand::Start => json!({ "port": self.port }),
            ControlCommand::Status => json!({ "port": self.port, "isActive": true }),
            _ => Value::Null,
        })
    }
}

/// Binds a loopback host that echoes binary frames.
async fn echo_host() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let (mut write, mut read) = ws.split();
                while let Some(Ok(message)) = read.next().await {
                    if let tungstenite::Message::Binary(data) = message
                        && write.send(tungstenite::Message::Binary(data)).await.is_err()
                    {
                        break;
                    }
                }
            });
        }
    });

    port
}

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let (channel, rx) = rt.block_on(async {
        let port = echo_host().await;
        let conduit = Conduit::builder()
            .control(Arc::new(FixedControl { port }))
            .client_id("bench")
            .status_poll_interval(Duration::from_millis(1))
            .build()
            .unwrap();

        let channel = conduit.channel().connect().await.unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        channel.subscribe(EventKind::Message, move |_| {
            let _ = tx.send(());
        });
        (channel, rx)
    });
    let rx = tokio::sync::Mutex::new(rx);
    let options = sample_options();

    let mut group = c.benchmark_group("round_trip");
    group.measurement_time(Duration::from_secs(10));

    for &size in &PAYLOAD_SIZES[..3] {
        let payload = vec![0x5Au8; size];
        group.bench_with_input(BenchmarkId::new("echo", size), &payload, |b, payload| {
            b.to_async(&rt).iter(|| async {
                assert!(channel.send(&options, payload));
                rx.lock().await.recv().await.unwrap();
            });
        });
    }

    group.finish();
    channel.close();
}

criterion_group!(benches, bench_codec, bench_round_trip);
criterion_main!(benches);
