//! Error types for codecs and streaming sessions.

use core::fmt;

/// Codec-level errors.
///
/// All variants are cheap to clone so a session can keep the last one around
/// and hand out copies to concurrent readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The peer closed the transport cleanly at a frame boundary.
    Eof,
    /// The codec was already closed locally.
    Closed,
    Io(IoError),
    Encode(String),
    Decode(String),
    /// A frame length prefix exceeded the configured limit.
    FrameTooLarge {
        len: usize,
        max: usize,
    },
}

impl CodecError {
    /// True for a clean end of input.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => write!(f, "end of input"),
            Self::Closed => write!(f, "codec closed"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Encode(e) => write!(f, "serialize error: {e}"),
            Self::Decode(e) => write!(f, "deserialize error: {e}"),
            Self::FrameTooLarge { len, max } => {
                write!(f, "frame of {len} bytes exceeds max {max}")
            }
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.into())
    }
}

/// Cloneable snapshot of a [`std::io::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoError {
    pub kind: std::io::ErrorKind,
    pub message: String,
}

impl IoError {
    pub fn new(kind: std::io::ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for IoError {}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Errors surfaced by [`RpcStream`](crate::RpcStream) operations.
///
/// | Variant | Session still usable? |
/// |---------|-----------------------|
/// | `Shutdown` | no, already closed |
/// | `UnexpectedEof` | no, the transport went away |
/// | `EndOfStream` | the logical stream is done |
/// | `Server` | yes |
/// | `ErrorPayload`, `Body` | framing is probably out of sync, close it |
/// | `Codec` | depends on the codec |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The session was closed before this call.
    Shutdown,
    /// The transport reached end of input while the session was still open.
    UnexpectedEof,
    /// The server marked the logical stream as finished.
    EndOfStream,
    /// Application-level error message reported by the server.
    Server(String),
    /// Discarding the payload that accompanies an error response failed.
    ErrorPayload(CodecError),
    /// Decoding a response body failed.
    Body(CodecError),
    /// Any other codec failure, passed through unchanged.
    Codec(CodecError),
}

impl StreamError {
    /// True for the benign end-of-stream marker.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }

    /// Server-reported message, if this is an application error.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Server(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => write!(f, "connection is shut down"),
            Self::UnexpectedEof => write!(f, "unexpected end of stream"),
            Self::EndOfStream => write!(f, "end of stream"),
            Self::Server(message) => write!(f, "{message}"),
            Self::ErrorPayload(e) => write!(f, "reading error payload: {e}"),
            Self::Body(e) => write!(f, "reading body: {e}"),
            Self::Codec(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ErrorPayload(e) | Self::Body(e) | Self::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CodecError> for StreamError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}
