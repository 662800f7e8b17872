//! streamrpc-testkit: test doubles for streamrpc sessions.
//!
//! - [`ScriptedCodec`]: a [`ClientCodec`](streamrpc_core::ClientCodec) with
//!   queued responses and an inspectable call log
//! - [`LogCapture`]: a `tracing` layer that records events so tests can
//!   assert on what a stream logged
//!
//! ```ignore
//! let codec = ScriptedCodec::new();
//! codec.respond_ok(0, &"pong".to_string()).respond_end_of_stream(1);
//!
//! let stream = RpcStream::new(codec.clone(), MethodRequest::new("Echo", "Stream"), Context::background());
//! stream.send(&"ping".to_string())?;
//! assert_eq!(codec.written_seqs(), vec![0]);
//! ```

mod codec;
mod logs;

pub use codec::*;
pub use logs::*;
