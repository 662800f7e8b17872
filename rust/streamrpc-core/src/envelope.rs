//! Request and response envelopes.
//!
//! An envelope is the header half of a frame. Request envelopes carry routing
//! and ordering; response envelopes carry the sequence they answer and a
//! string error channel:
//!
//! - empty: success, the body frame holds the response message
//! - [`END_OF_STREAM`]: the server finished the logical stream
//! - anything else: an application error message
//!
//! In every case a body frame follows the header, possibly empty.

use facet::Facet;

/// Reserved response error value marking a clean end of the logical stream.
pub const END_OF_STREAM: &str = "EOS";

/// Header written in front of every request message.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct RequestHeader {
    pub service: String,
    pub method: String,
    pub seq: u64,
}

/// Header read in front of every response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Facet)]
pub struct ResponseHeader {
    pub seq: u64,
    pub error: String,
}

impl ResponseHeader {
    /// Successful response for `seq`.
    pub fn ok(seq: u64) -> Self {
        Self {
            seq,
            error: String::new(),
        }
    }

    /// Clean end-of-stream marker.
    pub fn end_of_stream(seq: u64) -> Self {
        Self {
            seq,
            error: END_OF_STREAM.to_owned(),
        }
    }

    /// Application error carrying `message`.
    pub fn error(seq: u64, message: impl Into<String>) -> Self {
        Self {
            seq,
            error: message.into(),
        }
    }

    /// Classify the error channel. Call this right after decoding the header.
    pub fn outcome(&self) -> ResponseOutcome {
        match self.error.as_str() {
            "" => ResponseOutcome::Ok,
            END_OF_STREAM => ResponseOutcome::EndOfStream,
            message => ResponseOutcome::ApplicationError(message.to_owned()),
        }
    }
}

/// What a response header says about its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The body is a response message.
    Ok,
    /// The server ended the stream; the body is filler.
    EndOfStream,
    /// The server reported a failure; the body is filler.
    ApplicationError(String),
}
