use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use streamrpc_core::{
    CodecError, Context, IoError, MethodRequest, ResponseHeader, RpcStream, StreamError,
};
use streamrpc_testkit::{LogCapture, ScriptedCodec};
use tracing::Level;

fn open_stream(codec: &ScriptedCodec) -> RpcStream<ScriptedCodec> {
    RpcStream::new(
        codec.clone(),
        MethodRequest::new("Echo", "Stream"),
        Context::background(),
    )
}

fn injected_io_error() -> CodecError {
    CodecError::Io(IoError::new(std::io::ErrorKind::BrokenPipe, "injected"))
}

#[test]
fn three_pings_use_sequences_zero_one_two() {
    let codec = ScriptedCodec::new();
    let stream = open_stream(&codec);

    for _ in 0..3 {
        stream.send(&"ping".to_string()).unwrap();
    }

    assert_eq!(codec.written_seqs(), vec![0, 1, 2]);
    for written in codec.written() {
        assert_eq!(written.header.service, "Echo");
        assert_eq!(written.header.method, "Stream");
        assert_eq!(written.decode::<String>(), "ping");
    }
}

#[test]
fn concurrent_sends_are_gapless_and_unique() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let codec = ScriptedCodec::new();
    let stream = Arc::new(open_stream(&codec));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let stream = stream.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    stream.send(&((t * PER_THREAD + i) as u32)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let seqs = codec.written_seqs();
    let n = (THREADS * PER_THREAD) as u64;
    assert_eq!(seqs.len() as u64, n);
    // Wire order is lock order, so the sequence is strictly increasing.
    assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1));
    let unique: HashSet<u64> = seqs.iter().copied().collect();
    assert_eq!(unique, (0..n).collect::<HashSet<u64>>());

    // Every payload arrived exactly once.
    let payloads: HashSet<u32> = codec.written().iter().map(|w| w.decode::<u32>()).collect();
    assert_eq!(payloads.len() as u64, n);
}

#[test]
fn failed_send_still_consumes_its_sequence() {
    let codec = ScriptedCodec::new();
    let stream = open_stream(&codec);

    stream.send(&1u32).unwrap();
    codec.fail_writes(Some(injected_io_error()));
    assert_eq!(
        stream.send(&2u32).unwrap_err(),
        StreamError::Codec(injected_io_error())
    );
    assert_eq!(stream.error(), Some(StreamError::Codec(injected_io_error())));

    codec.fail_writes(None);
    stream.send(&3u32).unwrap();

    assert_eq!(codec.write_calls(), 3);
    assert_eq!(codec.written_seqs(), vec![0, 2]);
    // Success overwrites the previous failure.
    assert_eq!(stream.error(), None);
}

#[test]
fn failed_send_is_logged_at_debug() {
    let capture = LogCapture::new();
    let _guard = capture.install();

    let codec = ScriptedCodec::new();
    let stream = open_stream(&codec);

    stream.send(&1u32).unwrap();
    assert!(capture.at(Level::DEBUG).is_empty());

    codec.fail_writes(Some(injected_io_error()));
    let err = stream.send(&2u32).unwrap_err();

    let debug = capture.at(Level::DEBUG);
    assert_eq!(debug.len(), 1);
    assert_eq!(debug[0].message, "send failed");
    assert_eq!(debug[0].field("seq"), Some("1"));
    assert_eq!(debug[0].field("error"), Some(err.to_string().as_str()));
    // Send failures stay below the protocol-error warning.
    assert!(capture.warnings().is_empty());
}

#[test]
fn send_after_close_never_touches_codec() {
    let codec = ScriptedCodec::new();
    let stream = open_stream(&codec);

    stream.close().unwrap();
    assert_eq!(
        stream.send(&"msg".to_string()).unwrap_err(),
        StreamError::Shutdown
    );

    assert_eq!(codec.write_calls(), 0);
    assert_eq!(stream.error(), Some(StreamError::Shutdown));
}

#[test]
fn recv_after_close_never_touches_codec() {
    let codec = ScriptedCodec::new();
    codec.respond_ok(0, &"unread".to_string());
    let stream = open_stream(&codec);

    stream.close().unwrap();
    let calls_after_close = codec.total_calls();
    assert_eq!(stream.recv::<String>().unwrap_err(), StreamError::Shutdown);
    assert_eq!(stream.send(&0u8).unwrap_err(), StreamError::Shutdown);

    assert_eq!(codec.total_calls(), calls_after_close);
    assert_eq!(codec.header_reads(), 0);
}

#[test]
fn receive_loop_ends_cleanly_on_sentinel() {
    let capture = LogCapture::new();
    let _guard = capture.install();

    let codec = ScriptedCodec::new();
    codec
        .respond_ok(0, &"a".to_string())
        .respond_ok(1, &"b".to_string())
        .respond_end_of_stream(2);
    let stream = open_stream(&codec);

    let mut received = Vec::new();
    let end = loop {
        match stream.recv::<String>() {
            Ok(message) => received.push(message),
            Err(err) => break err,
        }
    };

    assert_eq!(received, vec!["a", "b"]);
    assert_eq!(end, StreamError::EndOfStream);
    assert!(end.is_end_of_stream());
    assert_eq!(stream.error(), Some(StreamError::EndOfStream));
    // The filler body after the marker was consumed.
    assert_eq!(codec.discards(), 1);
    assert!(capture.warnings().is_empty(), "{:?}", capture.warnings());
}

#[test]
fn application_error_surfaces_exact_text_and_logs() {
    let capture = LogCapture::new();
    let _guard = capture.install();

    let codec = ScriptedCodec::new();
    codec
        .respond_error(0, "method not found")
        .respond_ok(1, &"still alive".to_string());
    let stream = open_stream(&codec);

    let err = stream.recv::<String>().unwrap_err();
    assert_eq!(err, StreamError::Server("method not found".into()));
    assert_eq!(err.to_string(), "method not found");
    assert_eq!(codec.discards(), 1);

    let warnings = capture.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "client protocol error");
    assert_eq!(warnings[0].field("error"), Some("method not found"));
    assert_eq!(warnings[0].target, "streamrpc_core::session");

    // Application errors leave the stream usable, and a clean read is quiet.
    capture.clear();
    assert_eq!(stream.recv::<String>().unwrap(), "still alive");
    assert_eq!(stream.error(), None);
    assert!(capture.warnings().is_empty());
}

#[test]
fn discard_failure_overwrites_application_error() {
    let codec = ScriptedCodec::new();
    codec.respond_with_broken_body(
        ResponseHeader::error(0, "method not found"),
        CodecError::Decode("truncated".into()),
    );
    let stream = open_stream(&codec);

    let err = stream.recv::<String>().unwrap_err();
    assert_eq!(
        err,
        StreamError::ErrorPayload(CodecError::Decode("truncated".into()))
    );
    assert_eq!(err.server_message(), None);
    assert_eq!(stream.error(), Some(err));
}

#[test]
fn discard_failure_after_sentinel_is_not_benign() {
    let capture = LogCapture::new();
    let _guard = capture.install();

    let codec = ScriptedCodec::new();
    codec.respond_with_broken_body(ResponseHeader::end_of_stream(0), injected_io_error());
    let stream = open_stream(&codec);

    let err = stream.recv::<String>().unwrap_err();
    assert_eq!(err, StreamError::ErrorPayload(injected_io_error()));
    assert_eq!(capture.warnings().len(), 1);
}

#[test]
fn undecodable_body_is_a_body_error() {
    let codec = ScriptedCodec::new();
    // A lone continuation byte is not a valid postcard varint.
    codec.respond_raw(0, vec![0xFF]);
    let stream = open_stream(&codec);

    match stream.recv::<String>().unwrap_err() {
        StreamError::Body(CodecError::Decode(_)) => {}
        other => panic!("expected Body(Decode), got {other:?}"),
    }
    assert_eq!(codec.body_reads(), 1);
}

#[test]
fn eof_while_open_is_unexpected() {
    let codec = ScriptedCodec::new();
    let stream = open_stream(&codec);

    assert_eq!(
        stream.recv::<String>().unwrap_err(),
        StreamError::UnexpectedEof
    );
    assert_eq!(stream.error(), Some(StreamError::UnexpectedEof));
}

#[test]
fn eof_after_close_reports_shutdown() {
    // The closed check runs before the codec is consulted, so an EOF the
    // codec would have reported is never escalated once the stream is closed.
    let codec = ScriptedCodec::new();
    codec.fail_header(CodecError::Eof);
    let stream = open_stream(&codec);

    stream.close().unwrap();
    assert_eq!(stream.recv::<String>().unwrap_err(), StreamError::Shutdown);
    assert_eq!(codec.header_reads(), 0);
}

#[test]
fn other_header_errors_pass_through_verbatim() {
    let capture = LogCapture::new();
    let _guard = capture.install();

    let codec = ScriptedCodec::new();
    codec.fail_header(injected_io_error());
    let stream = open_stream(&codec);

    assert_eq!(
        stream.recv::<String>().unwrap_err(),
        StreamError::Codec(injected_io_error())
    );
    assert_eq!(codec.body_reads() + codec.discards(), 0);
    // Header failures return before the protocol-error diagnostic.
    assert!(capture.warnings().is_empty());
}

#[test]
fn shutdown_is_never_logged() {
    let capture = LogCapture::new();
    let _guard = capture.install();

    let codec = ScriptedCodec::new();
    let stream = open_stream(&codec);
    stream.close().unwrap();
    let _ = stream.send(&1u8);
    let _ = stream.recv::<u8>();

    assert!(capture.warnings().is_empty());
}

#[test]
fn close_reaches_codec_every_time() {
    let codec = ScriptedCodec::new();
    let stream = open_stream(&codec);

    stream.close().unwrap();
    codec.fail_closes(Some(CodecError::Closed));
    assert_eq!(
        stream.close().unwrap_err(),
        StreamError::Codec(CodecError::Closed)
    );
    assert_eq!(codec.closes(), 2);
    assert!(stream.is_closed());
}

#[test]
fn error_snapshot_is_never_partial() {
    let rejected = CodecError::Encode("rejected".into());
    let allowed = [
        None,
        Some(StreamError::Codec(injected_io_error())),
        Some(StreamError::Codec(rejected.clone())),
    ];

    let codec = ScriptedCodec::new();
    let stream = Arc::new(open_stream(&codec));
    let done = Arc::new(AtomicBool::new(false));

    // Senders cycle through two failures and a success until the poller has
    // watched the cell change.
    let senders: Vec<_> = (0..4)
        .map(|t| {
            let stream = stream.clone();
            let codec = codec.clone();
            let done = done.clone();
            let rejected = rejected.clone();
            thread::spawn(move || {
                let mut i = t;
                while !done.load(Ordering::Acquire) {
                    match i % 3 {
                        0 => codec.fail_writes(Some(injected_io_error())),
                        1 => codec.fail_writes(Some(rejected.clone())),
                        _ => codec.fail_writes(None),
                    };
                    let _ = stream.send(&"payload".to_string());
                    i += 1;
                }
            })
        })
        .collect();

    let mut seen: Vec<Option<StreamError>> = Vec::new();
    while seen.len() < 2 {
        let snapshot = stream.error();
        assert!(allowed.contains(&snapshot), "partial snapshot: {snapshot:?}");
        if !seen.contains(&snapshot) {
            seen.push(snapshot);
        }
    }
    done.store(true, Ordering::Release);
    for sender in senders {
        sender.join().unwrap();
    }

    assert!(allowed.contains(&stream.error()));
    assert!(codec.write_calls() >= 2);
}

#[test]
fn accessors_return_construction_values() {
    let ctx = Context::builder().metadata("trace-id", "42").build();
    let codec = ScriptedCodec::new();
    let stream = RpcStream::new(codec, MethodRequest::new("Chat", "Talk"), ctx.clone());

    assert_eq!(stream.request().service(), "Chat");
    assert_eq!(stream.request().method(), "Talk");
    assert_eq!(stream.context().metadata("trace-id"), Some("42"));

    // The stream observes cancellation but never triggers it.
    stream.close().unwrap();
    assert!(!stream.context().is_cancelled());
    ctx.cancel();
    assert!(stream.context().is_cancelled());
}
