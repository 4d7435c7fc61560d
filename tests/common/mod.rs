//! In-process hub speaking the wireup frame protocol.
//!
//! Serves the sample streaming methods over any byte stream:
//!
//! - `Sum`: adds an `i64` stream
//! - `LocalSum`: same, but fire-and-forget; totals are reported on a channel
//! - `UploadWord`: concatenates a string stream
//! - `UploadWithSuffix`: concatenates, then appends the first scalar argument
//! - `DoubleTrouble`: a letter stream and a number stream, `"<word> <numbers>"`
//! - `UploadFile`: counts byte chunks, returns a status naming the target
//! - `Fail`: rejects without reading its stream

#![allow(dead_code)]

use std::collections::HashMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wireup::codec::MsgPackCodec;
use wireup::connection::WireConnection;
use wireup::protocol::{flags, Frame, FrameBuffer, FrameKind, Header, Invocation, NO_REPLY_ID};
use wireup::writer::{spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle};
use wireup::ConnectionBuilder;

enum StreamEvent {
    Item(Bytes),
    End(Option<String>),
}

/// Observations the hub reports back to the test.
pub struct HubEvents {
    /// Totals computed by `LocalSum`.
    pub local_sums: mpsc::UnboundedReceiver<i64>,
    /// Invocation ids the client cancelled.
    pub cancels: mpsc::UnboundedReceiver<u32>,
}

struct Hub {
    writer: WriterHandle,
    streams: HashMap<u32, mpsc::UnboundedSender<StreamEvent>>,
    local_sums: mpsc::UnboundedSender<i64>,
    cancels: mpsc::UnboundedSender<u32>,
}

/// Serve the hub on `io` until the client hangs up.
pub fn spawn_hub<S>(io: S) -> (HubEvents, JoinHandle<()>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, write_half) = tokio::io::split(io);
    let (writer, _writer_task) = spawn_writer_task(write_half, WriterConfig::default());
    let (local_sums_tx, local_sums) = mpsc::unbounded_channel();
    let (cancels_tx, cancels) = mpsc::unbounded_channel();

    let mut hub = Hub {
        writer,
        streams: HashMap::new(),
        local_sums: local_sums_tx,
        cancels: cancels_tx,
    };

    let task = tokio::spawn(async move {
        let mut buffer = FrameBuffer::new();
        let mut chunk = vec![0u8; 16 * 1024];
        loop {
            let n = match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            for frame in buffer.push(&chunk[..n]).expect("client sent a malformed frame") {
                hub.dispatch(frame);
            }
        }
    });

    (HubEvents { local_sums, cancels }, task)
}

/// Client connection wired to a fresh in-memory hub.
pub fn connect_to_hub() -> (WireConnection, HubEvents) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (events, _task) = spawn_hub(server);
    (ConnectionBuilder::new().connect_io(client), events)
}

impl Hub {
    fn dispatch(&mut self, frame: Frame) {
        match frame.kind() {
            FrameKind::Invoke => {
                let invocation: Invocation = MsgPackCodec::decode(frame.payload()).expect("bad invocation");
                let mut inputs = Vec::new();
                for id in &invocation.stream_ids {
                    let (tx, rx) = mpsc::unbounded_channel();
                    self.streams.insert(*id, tx);
                    inputs.push(rx);
                }
                tokio::spawn(serve(
                    frame.id(),
                    invocation,
                    inputs,
                    self.writer.clone(),
                    self.local_sums.clone(),
                ));
            }
            FrameKind::StreamItem => {
                if let Some(tx) = self.streams.get(&frame.id()) {
                    let _ = tx.send(StreamEvent::Item(frame.payload.clone()));
                }
            }
            FrameKind::StreamComplete => {
                if let Some(tx) = self.streams.remove(&frame.id()) {
                    let error = frame
                        .is_error()
                        .then(|| MsgPackCodec::decode::<String>(frame.payload()).unwrap_or_default());
                    let _ = tx.send(StreamEvent::End(error));
                }
            }
            FrameKind::Cancel => {
                let _ = self.cancels.send(frame.id());
            }
            FrameKind::Completion => panic!("client sent a completion"),
        }
    }
}

async fn collect<T: DeserializeOwned>(mut rx: mpsc::UnboundedReceiver<StreamEvent>) -> Result<Vec<T>, String> {
    let mut items = Vec::new();
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Item(bytes) => items.push(MsgPackCodec::decode(&bytes).map_err(|e| e.to_string())?),
            StreamEvent::End(None) => return Ok(items),
            StreamEvent::End(Some(error)) => return Err(format!("upload failed: {}", error)),
        }
    }
    Err("stream abandoned".to_string())
}

async fn run_method(
    invocation: Invocation,
    inputs: Vec<mpsc::UnboundedReceiver<StreamEvent>>,
    local_sums: mpsc::UnboundedSender<i64>,
) -> Result<Bytes, String> {
    let mut inputs = inputs.into_iter();
    let mut next_input = || inputs.next().ok_or_else(|| "missing stream argument".to_string());

    match invocation.target.as_str() {
        "Sum" | "LocalSum" => {
            let total: i64 = collect::<i64>(next_input()?).await?.iter().sum();
            if invocation.target == "LocalSum" {
                let _ = local_sums.send(total);
            }
            encode(&total)
        }
        "UploadWord" => encode(&collect::<String>(next_input()?).await?.concat()),
        "UploadWithSuffix" => {
            let mut word = collect::<String>(next_input()?).await?.concat();
            let suffix = invocation.arguments.first().and_then(|v| v.as_str()).unwrap_or_default();
            word.push_str(suffix);
            encode(&word)
        }
        "DoubleTrouble" => {
            let letters = next_input()?;
            let numbers = next_input()?;
            let (letters, numbers) = tokio::join!(collect::<String>(letters), collect::<i64>(numbers));
            encode(&format!("{} {:?}", letters?.concat(), numbers?))
        }
        "UploadFile" => {
            let chunks = collect::<Bytes>(next_input()?).await?;
            let total: usize = chunks.iter().map(Bytes::len).sum();
            let target = invocation.arguments.first().and_then(|v| v.as_str()).unwrap_or("?");
            let lengths: Vec<usize> = chunks.iter().map(Bytes::len).collect();
            encode(&format!("{} bytes in chunks {:?} written to {}", total, lengths, target))
        }
        "Fail" => Err("Fail was called".to_string()),
        other => Err(format!("unknown method {}", other)),
    }
}

async fn serve(
    id: u32,
    invocation: Invocation,
    inputs: Vec<mpsc::UnboundedReceiver<StreamEvent>>,
    writer: WriterHandle,
    local_sums: mpsc::UnboundedSender<i64>,
) {
    let outcome = run_method(invocation, inputs, local_sums).await;
    if id == NO_REPLY_ID {
        return;
    }

    let (bits, payload) = match outcome {
        Ok(payload) => (0, payload),
        Err(reason) => (flags::ERROR, MsgPackCodec::encode_bytes(&reason).expect("encode error")),
    };
    let header = Header::new(FrameKind::Completion, bits, id, payload.len() as u32);
    let _ = writer.send(OutboundFrame::new(&header, payload)).await;
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, String> {
    MsgPackCodec::encode_bytes(value).map_err(|e| e.to_string())
}
