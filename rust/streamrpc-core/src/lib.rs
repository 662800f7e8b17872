//! streamrpc-core: bidirectional streaming RPC sessions over a framed codec.
//!
//! The central type is [`RpcStream`], one logical call that carries many
//! request messages and many response messages over a single
//! [`ClientCodec`]. [`StreamCodec`] is the stock codec: postcard-encoded
//! envelopes and messages in length-prefixed frames over any `Read + Write`.

#![forbid(unsafe_code)]

mod codec;
mod context;
mod descriptor;
mod envelope;
mod error;
mod limits;
mod session;

pub use codec::stream::{LEN_PREFIX_SIZE, StreamCodec, read_frame, write_frame};
pub use codec::*;
pub use context::*;
pub use descriptor::*;
pub use envelope::*;
pub use error::*;
pub use limits::*;
pub use session::*;

pub use facet;
pub use facet_postcard;
