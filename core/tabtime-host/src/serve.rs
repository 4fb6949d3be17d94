//! Native messaging host loop.
//!
//! A reader thread decodes frames from stdin and hands them to the main
//! thread over a channel; the main thread owns the controller and writes
//! lookups back on stdout. Lookup replies arrive as ordinary inbound frames,
//! so every controller step runs on this one thread, one message at a time.
//!
//! EOF on stdin means the extension closed the port. The loop stops, queued
//! storage writes are drained, and the open main session is left for the
//! next startup's recovery to bound.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use serde::Serialize;
use tabtime_core::{Controller, JsonFileGateway, Result, SessionSink, TrackerConfig, TrackerError};
use tabtime_protocol::{parse_inbound, read_frame, write_frame, ErrorInfo, FrameError, OutboundEnvelope};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum ReaderMessage {
    Frame(Vec<u8>),
    /// A frame was skipped; the stream is still usable.
    Rejected(ErrorInfo),
    Closed,
    Failed(String),
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn run(config: &TrackerConfig) -> Result<()> {
    let storage_path = config.resolve_storage_path()?;
    info!(path = %storage_path.display(), "tabtime host started");

    let (mut controller, _recovered) =
        Controller::bootstrap(JsonFileGateway::new(storage_path), now_millis())?;

    let (sender, receiver) = mpsc::channel();
    spawn_reader(io::stdin(), sender)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let outcome = run_loop(&mut controller, &receiver, &mut out);

    controller.into_sink().shutdown()?;
    info!("tabtime host stopped");
    outcome
}

pub fn spawn_reader<R>(mut reader: R, sender: Sender<ReaderMessage>) -> Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("tabtime-stdin".to_string())
        .spawn(move || loop {
            let (message, stop) = match read_frame(&mut reader) {
                Ok(Some(body)) => (ReaderMessage::Frame(body), false),
                Ok(None) => (ReaderMessage::Closed, true),
                Err(err @ FrameError::TooLarge(_)) => {
                    (ReaderMessage::Rejected(err.to_error_info()), false)
                }
                Err(FrameError::Io(err)) => (ReaderMessage::Failed(err.to_string()), true),
            };
            if sender.send(message).is_err() || stop {
                break;
            }
        })
        .map_err(|err| TrackerError::io("Failed to spawn stdin reader", err))
}

pub fn run_loop<S, W>(
    controller: &mut Controller<S>,
    receiver: &Receiver<ReaderMessage>,
    out: &mut W,
) -> Result<()>
where
    S: SessionSink,
    W: Write,
{
    for message in receiver.iter() {
        match message {
            ReaderMessage::Frame(body) => match parse_inbound(&body) {
                Ok(inbound) => {
                    debug!(message = ?inbound, "Inbound message");
                    if let Some(lookup) = controller.handle(inbound) {
                        send(out, &OutboundEnvelope::lookup(lookup.request_id, lookup.query))?;
                    }
                }
                Err(info) => reject(out, info)?,
            },
            ReaderMessage::Rejected(info) => reject(out, info)?,
            ReaderMessage::Closed => {
                info!("Extension closed the native messaging port");
                break;
            }
            ReaderMessage::Failed(err) => {
                warn!(error = %err, "Native messaging input failed");
                break;
            }
        }
    }
    Ok(())
}

fn reject<W: Write>(out: &mut W, info: ErrorInfo) -> Result<()> {
    warn!(code = %info.code, message = %info.message, "Rejected inbound message");
    send(out, &OutboundEnvelope::error(info))
}

fn send<W: Write, T: Serialize>(out: &mut W, message: &T) -> Result<()> {
    write_frame(out, message).map_err(|err| TrackerError::io("Failed to write to extension", err))
}
