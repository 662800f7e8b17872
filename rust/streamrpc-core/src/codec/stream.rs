use std::io::{self, Read, Write};

use facet::Facet;

use crate::{CodecError, CodecLimits, RequestHeader, ResponseHeader};

use super::ClientCodec;

/// Size of the little-endian length prefix in front of every frame.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Postcard codec over a byte stream.
///
/// Every envelope and every message travels in its own frame:
///
/// ```text
/// ┌──────────────┬──────────────────────┐
/// │ len: u32 LE  │ body: [u8; len]      │
/// └──────────────┴──────────────────────┘
/// ```
///
/// A request is a `RequestHeader` frame followed by a message frame. A
/// response is a `ResponseHeader` frame followed by a body frame.
pub struct StreamCodec<S> {
    stream: Option<S>,
    limits: CodecLimits,
}

impl<S> std::fmt::Debug for StreamCodec<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCodec")
            .field("closed", &self.stream.is_none())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl<S: Read + Write + Send> StreamCodec<S> {
    /// Wrap `stream` using limits from the environment.
    pub fn new(stream: S) -> Self {
        Self::with_limits(stream, CodecLimits::from_env())
    }

    pub fn with_limits(stream: S, limits: CodecLimits) -> Self {
        Self {
            stream: Some(stream),
            limits,
        }
    }

    pub fn limits(&self) -> CodecLimits {
        self.limits
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    fn stream(&mut self) -> Result<&mut S, CodecError> {
        self.stream.as_mut().ok_or(CodecError::Closed)
    }

    fn read_body_frame(&mut self) -> Result<Vec<u8>, CodecError> {
        let max = self.limits.max_frame_len;
        // EOF between a header and its body is a torn response, not a clean end.
        read_frame(self.stream()?, max).map_err(|e| match e {
            CodecError::Eof => io::Error::from(io::ErrorKind::UnexpectedEof).into(),
            other => other,
        })
    }
}

impl<S: Read + Write + Send> ClientCodec for StreamCodec<S> {
    fn write_request<M: Facet<'static>>(
        &mut self,
        header: &RequestHeader,
        message: &M,
    ) -> Result<(), CodecError> {
        let max = self.limits.max_frame_len;
        let header_bytes =
            facet_postcard::to_vec(header).map_err(|e| CodecError::Encode(e.to_string()))?;
        let body_bytes =
            facet_postcard::to_vec(message).map_err(|e| CodecError::Encode(e.to_string()))?;

        // One write_all for both frames so a failed encode never leaves half a
        // request on the wire.
        let mut buf =
            Vec::with_capacity(2 * LEN_PREFIX_SIZE + header_bytes.len() + body_bytes.len());
        write_frame(&mut buf, &header_bytes, max)?;
        write_frame(&mut buf, &body_bytes, max)?;

        let stream = self.stream()?;
        stream.write_all(&buf)?;
        stream.flush()?;

        tracing::trace!(
            service = %header.service,
            method = %header.method,
            seq = header.seq,
            body_len = body_bytes.len(),
            "wrote request"
        );
        Ok(())
    }

    fn read_response_header(&mut self) -> Result<ResponseHeader, CodecError> {
        let max = self.limits.max_frame_len;
        let bytes = read_frame(self.stream()?, max)?;
        let header: ResponseHeader = facet_postcard::from_slice(&bytes)
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        tracing::trace!(seq = header.seq, error = %header.error, "read response header");
        Ok(header)
    }

    fn read_response_body<M: for<'a> Facet<'a>>(&mut self) -> Result<M, CodecError> {
        let bytes = self.read_body_frame()?;
        facet_postcard::from_slice::<M>(&bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn discard_response_body(&mut self) -> Result<(), CodecError> {
        let bytes = self.read_body_frame()?;
        tracing::trace!(len = bytes.len(), "discarded response body");
        Ok(())
    }

    fn close(&mut self) -> Result<(), CodecError> {
        let mut stream = self.stream.take().ok_or(CodecError::Closed)?;
        // Dropping the stream releases the transport even if the flush fails.
        stream.flush()?;
        Ok(())
    }
}

/// Append one length-prefixed frame to `writer`.
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8], max_len: usize) -> Result<(), CodecError> {
    if body.len() > max_len || body.len() > u32::MAX as usize {
        return Err(CodecError::FrameTooLarge {
            len: body.len(),
            max: max_len.min(u32::MAX as usize),
        });
    }
    writer.write_all(&(body.len() as u32).to_le_bytes())?;
    writer.write_all(body)?;
    Ok(())
}

/// Read one length-prefixed frame from `reader`.
///
/// Returns [`CodecError::Eof`] if the reader is exhausted before the first
/// byte of the length prefix; any later EOF is an `UnexpectedEof` I/O error.
pub fn read_frame<R: Read>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, CodecError> {
    let mut len_buf = [0u8; LEN_PREFIX_SIZE];
    let mut filled = 0;
    while filled < LEN_PREFIX_SIZE {
        match reader.read(&mut len_buf[filled..]) {
            Ok(0) if filled == 0 => return Err(CodecError::Eof),
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > max_len {
        return Err(CodecError::FrameTooLarge { len, max: max_len });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(body)
}
