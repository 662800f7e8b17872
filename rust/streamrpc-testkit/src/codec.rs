//! Scripted [`ClientCodec`] test double.

use std::collections::VecDeque;
use std::sync::Arc;

use facet::Facet;
use parking_lot::Mutex;
use streamrpc_core::{ClientCodec, CodecError, RequestHeader, ResponseHeader};

/// A request the stream handed to the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenRequest {
    pub header: RequestHeader,
    /// Postcard encoding of the message.
    pub body: Vec<u8>,
}

impl WrittenRequest {
    /// Decode the message body.
    pub fn decode<M: for<'a> Facet<'a>>(&self) -> M {
        facet_postcard::from_slice(&self.body).expect("written body should decode")
    }
}

#[derive(Default)]
struct Script {
    headers: VecDeque<Result<ResponseHeader, CodecError>>,
    bodies: VecDeque<Result<Vec<u8>, CodecError>>,
    write_failure: Option<CodecError>,
    close_failure: Option<CodecError>,
    written: Vec<WrittenRequest>,
    write_calls: usize,
    header_reads: usize,
    body_reads: usize,
    discards: usize,
    closes: usize,
}

/// In-memory codec whose responses are queued up front.
///
/// Clones share one script, so a test keeps a clone to inspect the call log
/// after moving the codec into a stream. Once the header queue runs dry,
/// `read_response_header` reports [`CodecError::Eof`].
#[derive(Clone, Default)]
pub struct ScriptedCodec {
    script: Arc<Mutex<Script>>,
}

impl ScriptedCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response carrying `message`.
    pub fn respond_ok<M: Facet<'static>>(&self, seq: u64, message: &M) -> &Self {
        let body = facet_postcard::to_vec(message).expect("scripted body should encode");
        let mut script = self.script.lock();
        script.headers.push_back(Ok(ResponseHeader::ok(seq)));
        script.bodies.push_back(Ok(body));
        self
    }

    /// Queue a clean end-of-stream marker with an empty body.
    pub fn respond_end_of_stream(&self, seq: u64) -> &Self {
        let mut script = self.script.lock();
        script.headers.push_back(Ok(ResponseHeader::end_of_stream(seq)));
        script.bodies.push_back(Ok(Vec::new()));
        self
    }

    /// Queue an application error with an empty body.
    pub fn respond_error(&self, seq: u64, message: &str) -> &Self {
        let mut script = self.script.lock();
        script.headers.push_back(Ok(ResponseHeader::error(seq, message)));
        script.bodies.push_back(Ok(Vec::new()));
        self
    }

    /// Queue an arbitrary header followed by a body read that fails with `err`.
    pub fn respond_with_broken_body(&self, header: ResponseHeader, err: CodecError) -> &Self {
        let mut script = self.script.lock();
        script.headers.push_back(Ok(header));
        script.bodies.push_back(Err(err));
        self
    }

    /// Queue a raw body frame after a successful header.
    pub fn respond_raw(&self, seq: u64, body: Vec<u8>) -> &Self {
        let mut script = self.script.lock();
        script.headers.push_back(Ok(ResponseHeader::ok(seq)));
        script.bodies.push_back(Ok(body));
        self
    }

    /// Queue a header read that fails with `err`.
    pub fn fail_header(&self, err: CodecError) -> &Self {
        self.script.lock().headers.push_back(Err(err));
        self
    }

    /// Make every following write fail with `err`, or succeed again with `None`.
    pub fn fail_writes(&self, err: Option<CodecError>) -> &Self {
        self.script.lock().write_failure = err;
        self
    }

    /// Make every following close fail with `err`.
    pub fn fail_closes(&self, err: Option<CodecError>) -> &Self {
        self.script.lock().close_failure = err;
        self
    }

    /// Requests written successfully, in wire order.
    pub fn written(&self) -> Vec<WrittenRequest> {
        self.script.lock().written.clone()
    }

    /// Sequence numbers written successfully, in wire order.
    pub fn written_seqs(&self) -> Vec<u64> {
        self.script
            .lock()
            .written
            .iter()
            .map(|w| w.header.seq)
            .collect()
    }

    /// Calls to `write_request`, including failed ones.
    pub fn write_calls(&self) -> usize {
        self.script.lock().write_calls
    }

    pub fn header_reads(&self) -> usize {
        self.script.lock().header_reads
    }

    pub fn body_reads(&self) -> usize {
        self.script.lock().body_reads
    }

    pub fn discards(&self) -> usize {
        self.script.lock().discards
    }

    pub fn closes(&self) -> usize {
        self.script.lock().closes
    }

    /// Total calls of any kind.
    pub fn total_calls(&self) -> usize {
        let script = self.script.lock();
        script.write_calls + script.header_reads + script.body_reads + script.discards + script.closes
    }

    fn next_body(script: &mut Script) -> Result<Vec<u8>, CodecError> {
        script.bodies.pop_front().unwrap_or_else(|| {
            Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into())
        })
    }
}

impl ClientCodec for ScriptedCodec {
    fn write_request<M: Facet<'static>>(
        &mut self,
        header: &RequestHeader,
        message: &M,
    ) -> Result<(), CodecError> {
        let mut script = self.script.lock();
        script.write_calls += 1;
        if let Some(err) = script.write_failure.clone() {
            return Err(err);
        }
        let body = facet_postcard::to_vec(message).map_err(|e| CodecError::Encode(e.to_string()))?;
        script.written.push(WrittenRequest {
            header: header.clone(),
            body,
        });
        Ok(())
    }

    fn read_response_header(&mut self) -> Result<ResponseHeader, CodecError> {
        let mut script = self.script.lock();
        script.header_reads += 1;
        script.headers.pop_front().unwrap_or(Err(CodecError::Eof))
    }

    fn read_response_body<M: for<'a> Facet<'a>>(&mut self) -> Result<M, CodecError> {
        let mut script = self.script.lock();
        script.body_reads += 1;
        let bytes = Self::next_body(&mut script)?;
        facet_postcard::from_slice::<M>(&bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn discard_response_body(&mut self) -> Result<(), CodecError> {
        let mut script = self.script.lock();
        script.discards += 1;
        Self::next_body(&mut script).map(drop)
    }

    fn close(&mut self) -> Result<(), CodecError> {
        let mut script = self.script.lock();
        script.closes += 1;
        match script.close_failure.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
