//! RpcStream: one bidirectional streaming call over an owned codec.
//!
//! A stream multiplexes any number of request messages and response messages
//! over a single [`ClientCodec`]. Callers on any thread may call
//! [`send`](RpcStream::send) and [`recv`](RpcStream::recv) in any interleaving.
//!
//! # Locking
//!
//! ```text
//!               ┌───────────────────────────────┐
//!               │           RpcStream           │
//!               ├───────────────────────────────┤
//!   request ───►│ request: Arc<dyn Request>     │ immutable, no lock
//!   context ───►│ context: Context              │ immutable, no lock
//!               │ state: RwLock<StreamState> ───┼──► seq, closed, last_error, codec
//!               └───────────────────────────────┘
//! ```
//!
//! `send`, `recv` and `close` hold the write lock for their whole duration,
//! including the blocking codec call, so the codec never sees two operations
//! at once and a send never overlaps a receive. `error` takes the read lock
//! and only ever observes a value some completed operation stored.
//!
//! # Usage
//!
//! ```ignore
//! let stream = Arc::new(RpcStream::new(codec, MethodRequest::new("Chat", "Talk"), Context::background()));
//!
//! stream.send(&"hello".to_string())?;
//! loop {
//!     match stream.recv::<String>() {
//!         Ok(reply) => println!("{reply}"),
//!         Err(StreamError::EndOfStream) => break,
//!         Err(e) => return Err(e),
//!     }
//! }
//! stream.close()?;
//! ```

use std::fmt;
use std::sync::Arc;

use facet::Facet;
use parking_lot::RwLock;

use crate::{ClientCodec, Context, Request, RequestHeader, ResponseOutcome, StreamError};

/// Mutable state, always accessed through the stream's lock.
struct StreamState<C> {
    /// Sequence number for the next request that reaches the codec.
    seq: u64,
    closed: bool,
    /// Outcome of the most recent `send`/`recv`. Last writer wins.
    last_error: Option<StreamError>,
    codec: C,
}

/// A bidirectional streaming RPC call.
///
/// Share it between threads with `Arc<RpcStream<C>>`; every method takes `&self`.
pub struct RpcStream<C: ClientCodec> {
    state: RwLock<StreamState<C>>,
    request: Arc<dyn Request>,
    context: Context,
}

impl<C: ClientCodec> RpcStream<C> {
    /// Bind a new open stream to `codec`. The stream owns the codec from here on.
    pub fn new(codec: C, request: impl Request + 'static, context: Context) -> Self {
        Self {
            state: RwLock::new(StreamState {
                seq: 0,
                closed: false,
                last_error: None,
                codec,
            }),
            request: Arc::new(request),
            context,
        }
    }

    /// The caller-supplied context. The stream never cancels it.
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn request(&self) -> &dyn Request {
        &*self.request
    }

    /// Send one request message.
    ///
    /// Every call that reaches the codec consumes one sequence number, even if
    /// the write then fails. Nothing is retried.
    pub fn send<M: Facet<'static>>(&self, message: &M) -> Result<(), StreamError> {
        let mut state = self.state.write();

        if state.closed {
            state.last_error = Some(StreamError::Shutdown);
            return Err(StreamError::Shutdown);
        }

        let seq = state.seq;
        state.seq += 1;

        let header = RequestHeader {
            service: self.request.service().to_owned(),
            method: self.request.method().to_owned(),
            seq,
        };

        let result = state
            .codec
            .write_request(&header, message)
            .map_err(StreamError::Codec);
        state.last_error = result.as_ref().err().cloned();

        match &result {
            Ok(()) => tracing::trace!(
                service = %header.service,
                method = %header.method,
                seq,
                "send"
            ),
            Err(err) => tracing::debug!(
                service = %header.service,
                method = %header.method,
                seq,
                error = %err,
                "send failed"
            ),
        }
        result
    }

    /// Receive the next response message.
    ///
    /// Returns [`StreamError::EndOfStream`] once the server finishes the
    /// stream and [`StreamError::Server`] for application errors; both leave
    /// framing intact. Any other error most likely means the stream is unusable.
    pub fn recv<M: for<'a> Facet<'a>>(&self) -> Result<M, StreamError> {
        let mut state = self.state.write();

        if state.closed {
            state.last_error = Some(StreamError::Shutdown);
            return Err(StreamError::Shutdown);
        }

        let header = match state.codec.read_response_header() {
            Ok(header) => header,
            Err(e) => {
                let err = if e.is_eof() && !state.closed {
                    StreamError::UnexpectedEof
                } else {
                    StreamError::Codec(e)
                };
                state.last_error = Some(err.clone());
                return Err(err);
            }
        };

        let result = match header.outcome() {
            ResponseOutcome::Ok => state
                .codec
                .read_response_body::<M>()
                .map_err(StreamError::Body),
            outcome => {
                let err = match outcome {
                    ResponseOutcome::ApplicationError(message) => StreamError::Server(message),
                    _ => StreamError::EndOfStream,
                };
                // The filler body still has to come off the wire.
                match state.codec.discard_response_body() {
                    Ok(()) => Err(err),
                    Err(e) => Err(StreamError::ErrorPayload(e)),
                }
            }
        };
        state.last_error = result.as_ref().err().cloned();

        match &result {
            Err(err) if !err.is_end_of_stream() && !state.closed => {
                tracing::warn!(
                    service = %self.request.service(),
                    method = %self.request.method(),
                    seq = header.seq,
                    error = %err,
                    "client protocol error"
                );
            }
            _ => {
                tracing::trace!(seq = header.seq, ok = result.is_ok(), "recv");
            }
        }
        result
    }

    /// Error recorded by the most recent `send` or `recv`, if any.
    pub fn error(&self) -> Option<StreamError> {
        self.state.read().last_error.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Mark the stream closed and close the codec.
    ///
    /// Not idempotent: every call reaches the codec's `close`, and a second
    /// call reports whatever the codec says about being closed twice.
    pub fn close(&self) -> Result<(), StreamError> {
        let mut state = self.state.write();
        state.closed = true;
        tracing::debug!(
            service = %self.request.service(),
            method = %self.request.method(),
            sent = state.seq,
            "closing stream"
        );
        state.codec.close().map_err(StreamError::Codec)
    }
}

impl<C: ClientCodec> fmt::Debug for RpcStream<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("RpcStream")
            .field("service", &self.request.service())
            .field("method", &self.request.method())
            .field("seq", &state.seq)
            .field("closed", &state.closed)
            .field("last_error", &state.last_error)
            .finish_non_exhaustive()
    }
}
