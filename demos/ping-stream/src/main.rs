//! Ping/pong over one streamrpc session.
//!
//! Spawns an in-process "server" on one end of a Unix socket pair that answers
//! every `Ping` with a `Pong`, then drives a client [`RpcStream`] on the other
//! end until the server ends the stream.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=streamrpc_core=trace cargo run -p streamrpc-ping-stream -- 5
//! ```

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::{Duration, Instant};

use facet::Facet;
use streamrpc_core::{
    CodecError, CodecLimits, Context, MethodRequest, RequestHeader, ResponseHeader, RpcStream,
    StreamCodec, StreamError, read_frame, write_frame,
};

#[derive(Debug, Facet)]
struct Ping {
    n: u32,
    sent_at_us: u64,
}

#[derive(Debug, Facet)]
struct Pong {
    n: u32,
    echoed_at_us: u64,
}

fn now_us(epoch: Instant) -> u64 {
    epoch.elapsed().as_micros() as u64
}

/// Answer pings until `count` have been served, then end the stream.
fn serve(mut peer: UnixStream, count: u32, epoch: Instant) -> Result<(), CodecError> {
    let limits = CodecLimits::from_env();
    let mut served = 0;
    loop {
        let header = match read_frame(&mut peer, limits.max_frame_len) {
            Ok(bytes) => bytes,
            Err(CodecError::Eof) => return Ok(()),
            Err(e) => return Err(e),
        };
        let body = read_frame(&mut peer, limits.max_frame_len)?;
        let header: RequestHeader =
            facet_postcard::from_slice(&header).map_err(|e| CodecError::Decode(e.to_string()))?;

        let (response, payload) = match facet_postcard::from_slice::<Ping>(&body) {
            Ok(_) if served >= count => (ResponseHeader::end_of_stream(header.seq), Vec::new()),
            Ok(ping) => {
                tracing::debug!(n = ping.n, sent_at_us = ping.sent_at_us, "ping");
                served += 1;
                let pong = Pong {
                    n: ping.n,
                    echoed_at_us: now_us(epoch),
                };
                let payload = facet_postcard::to_vec(&pong)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
                (ResponseHeader::ok(header.seq), payload)
            }
            Err(e) => (
                ResponseHeader::error(header.seq, format!("bad ping: {e}")),
                Vec::new(),
            ),
        };

        let response =
            facet_postcard::to_vec(&response).map_err(|e| CodecError::Encode(e.to_string()))?;
        let mut buf = Vec::new();
        write_frame(&mut buf, &response, limits.max_frame_len)?;
        write_frame(&mut buf, &payload, limits.max_frame_len)?;
        peer.write_all(&buf)?;
    }
}

fn run(count: u32) -> Result<(), Box<dyn std::error::Error>> {
    let epoch = Instant::now();
    let (client_side, server_side) = UnixStream::pair()?;
    let server = thread::spawn(move || serve(server_side, count, epoch));

    let ctx = Context::builder()
        .metadata("client", "ping-stream")
        .timeout(Duration::from_secs(10))
        .build();
    let stream = RpcStream::new(
        StreamCodec::new(client_side),
        MethodRequest::new("Pinger", "PingStream"),
        ctx,
    );

    let mut n = 0;
    loop {
        if stream.context().is_done() {
            tracing::warn!("deadline reached, giving up");
            break;
        }
        let sent_at_us = now_us(epoch);
        stream.send(&Ping { n, sent_at_us })?;
        match stream.recv::<Pong>() {
            Ok(pong) => {
                tracing::info!(
                    n = pong.n,
                    echoed_at_us = pong.echoed_at_us,
                    rtt_us = now_us(epoch) - sent_at_us,
                    "pong"
                );
                n += 1;
            }
            Err(StreamError::EndOfStream) => {
                tracing::info!(pongs = n, "server ended the stream");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    stream.close()?;
    match server.join() {
        Ok(result) => result?,
        Err(_) => return Err("server thread panicked".into()),
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let count = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(3);

    if let Err(e) = run(count) {
        tracing::error!(error = %e, "ping-stream failed");
        std::process::exit(1);
    }
}
