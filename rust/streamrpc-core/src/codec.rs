//! Client codec trait.
//!
//! A [`ClientCodec`] turns envelopes and messages into frames on some
//! transport and back. Codecs are stateful and not reentrant: exactly one
//! operation may be in flight at a time, which is why every method takes
//! `&mut self`. [`RpcStream`](crate::RpcStream) owns its codec and serializes
//! access to it.
//!
//! Implementations live in submodules:
//!
//! - [`stream`]: length-prefixed postcard frames over any `Read + Write`

use facet::Facet;

use crate::{CodecError, RequestHeader, ResponseHeader};

/// Client half of a framed request/response codec.
///
/// A response is always a header followed by exactly one body frame. Callers
/// must consume the body (with [`read_response_body`](Self::read_response_body)
/// or [`discard_response_body`](Self::discard_response_body)) before reading
/// the next header, or framing goes out of sync.
pub trait ClientCodec: Send {
    /// Write a request header followed by the encoded message.
    fn write_request<M: Facet<'static>>(
        &mut self,
        header: &RequestHeader,
        message: &M,
    ) -> Result<(), CodecError>;

    /// Read the next response header.
    ///
    /// Returns [`CodecError::Eof`] when the transport closed cleanly before a
    /// new header started.
    fn read_response_header(&mut self) -> Result<ResponseHeader, CodecError>;

    /// Decode the pending response body as `M`.
    fn read_response_body<M: for<'a> Facet<'a>>(&mut self) -> Result<M, CodecError>;

    /// Consume the pending response body without decoding it.
    fn discard_response_body(&mut self) -> Result<(), CodecError>;

    /// Release the underlying transport.
    fn close(&mut self) -> Result<(), CodecError>;
}

pub mod stream;
