//! Incremental demultiplexer for chunked query responses.
//!
//! ```text
//! transport chunks           +--------------+--- rows    --> consumer
//! ---------------> append -> |  QueryDemux  |--- errors  --> consumer
//!  (is_last flag)            | state machine|--- status  --> consumer
//!                            +--------------+--- metrics --> consumer
//! ```
//!
//! One `QueryDemux` parses exactly one response. Chunks are pushed in
//! arrival order on the task that owns the connection; nothing here blocks,
//! and a scan that runs out of buffered bytes simply suspends until the
//! next chunk. Channel consumers may live on any other task.

use crate::buffer::ChunkBuffer;
use crate::channel::{channel_set, ChannelSet};
use crate::error::ProtocolError;
use crate::response::{QueryResponse, QueryStatus};
use crate::scan::{contains_token, find_balanced_from};
use crate::state::ParseState;
use tracing::{debug, trace};

/// Lookahead tuning for response assembly.
///
/// The windows are sized to reliably contain their token even when a chunk
/// boundary splits it; the defaults come from the wire format's observed
/// field lengths (a 36-character request id and the `clientContextID` key
/// with its JSON separators). They are tuning values, not invariants.
#[derive(Debug, Clone)]
pub struct DemuxConfig {
    /// Bytes that must be buffered before request-id extraction is
    /// attempted, covering the `"requestID"` key and its value.
    pub request_id_window: usize,
    /// Window within which a `clientContextID` key is recognised.
    pub client_id_window: usize,
    /// Fixed-width peek after the id fields used to provisionally detect
    /// an errors-first response.
    pub error_peek_window: usize,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            request_id_window: 55,
            client_id_window: 27,
            error_peek_window: 20,
        }
    }
}

/// Streaming parser for one query response.
///
/// Owns the byte accumulator and the field state machine; exclusively
/// driven by [`push_chunk`](Self::push_chunk) from a single ingesting flow,
/// so it needs no locking. The channel boundary inside the emitted
/// [`QueryResponse`] is the only concurrency seam.
#[derive(Debug)]
pub struct QueryDemux {
    config: DemuxConfig,
    buf: ChunkBuffer,
    state: ParseState,
    channels: Option<ChannelSet>,
    /// Default status derived from the transport status code.
    transport_status: QueryStatus,
    handle_issued: bool,
    last_seen: bool,
}

impl QueryDemux {
    pub fn new(transport_status: QueryStatus) -> Self {
        Self::with_config(transport_status, DemuxConfig::default())
    }

    pub fn with_config(transport_status: QueryStatus, config: DemuxConfig) -> Self {
        Self {
            config,
            buf: ChunkBuffer::new(),
            state: ParseState::Initial,
            channels: None,
            transport_status,
            handle_issued: false,
            last_seen: false,
        }
    }

    /// Ingest one transport chunk; `is_last` marks the terminal chunk of
    /// the response (which may carry zero bytes).
    ///
    /// Returns the [`QueryResponse`] handle exactly once, on whichever call
    /// first buffers enough bytes to read the request id; `Ok(None)` before
    /// that is the normal "not yet" condition, and `Ok(None)` afterwards
    /// means the chunk was parsed into the already-issued handle's
    /// channels. A fatal error fails the response: the channels (if any)
    /// receive the error as their terminal item and this parser goes inert.
    pub fn push_chunk(
        &mut self,
        chunk: &[u8],
        is_last: bool,
    ) -> Result<Option<QueryResponse>, ProtocolError> {
        self.buf.append(chunk);
        if is_last {
            self.last_seen = true;
        }

        let mut issued = None;
        if !self.handle_issued {
            match self.try_assemble() {
                Some(handle) => {
                    self.handle_issued = true;
                    issued = Some(handle);
                }
                None => {
                    if self.last_seen {
                        return Err(self.fail(ProtocolError::MissingRequestId));
                    }
                    return Ok(None);
                }
            }
        }

        if let Err(err) = self.run() {
            return Err(self.fail(err));
        }

        if self.last_seen && self.state != ParseState::Done {
            let err = ProtocolError::Truncated {
                state: self.state.name(),
            };
            return Err(self.fail(err));
        }

        Ok(issued)
    }

    /// Tear down an in-flight response (the owning connection went away).
    ///
    /// If the channels are still open they are terminated in an error
    /// state, exactly once; rows already delivered remain valid. Safe to
    /// call repeatedly and after normal completion.
    pub fn cancel(&mut self) {
        if self.channels.is_some() {
            debug!("query response cancelled mid-stream");
        }
        self.fail(ProtocolError::Cancelled);
    }

    fn fail(&mut self, err: ProtocolError) -> ProtocolError {
        if let Some(channels) = self.channels.take() {
            channels.fail(err.clone());
        }
        self.state = ParseState::Done;
        err
    }

    // ------------------------------------------------------------------
    // Response assembly
    // ------------------------------------------------------------------

    /// Build the response handle once the id preamble is fully readable.
    ///
    /// Consumption is committed only when every gate passes; any "not yet"
    /// rewinds to the pre-assembly cursor so the next chunk retries from
    /// scratch.
    fn try_assemble(&mut self) -> Option<QueryResponse> {
        if self.buf.remaining() < self.config.request_id_window && !self.last_seen {
            return None;
        }

        let start = self.buf.position();
        let Some((request_id, client_context_id, errors_ahead)) = self.read_preamble() else {
            self.buf.rewind_to(start);
            return None;
        };

        let status = if errors_ahead {
            QueryStatus::Failure
        } else {
            self.transport_status
        };

        debug!(%request_id, ?status, "query response assembled");

        let (set, rows, errors, status_rx, metrics) = channel_set();
        self.channels = Some(set);
        self.buf.discard_consumed();
        Some(QueryResponse::new(
            request_id,
            client_context_id,
            status,
            rows,
            errors,
            status_rx,
            metrics,
        ))
    }

    /// Read `"requestID":"…"` and an optional `"clientContextID":"…"`,
    /// then peek a fixed window for an early `errors` field. `None` means
    /// a token is split across the chunk boundary; the caller rewinds.
    fn read_preamble(&mut self) -> Option<(String, String, bool)> {
        // "requestID":"<36 chars>" -- skip to the colon, then into the
        // quoted value. Adaptive to the actual id length.
        self.buf.skip(self.buf.bytes_before(b':')?);
        self.buf.skip(self.buf.bytes_before(b'"')? + 1);
        let id_len = self.buf.bytes_before(b'"')?;
        let request_id = String::from_utf8_lossy(&self.buf.read_slice(id_len)).into_owned();

        // Each lookahead window must be fully buffered before its check
        // runs, so the outcome cannot depend on where a chunk boundary
        // fell. Once the terminal chunk is in, the buffer holds everything
        // there is and the windows may come up short.
        let mut client_context_id = String::new();
        if self.buf.remaining() < self.config.client_id_window && !self.last_seen {
            return None;
        }
        if let Some(colon) = self.buf.bytes_before(b':') {
            if colon < self.config.client_id_window {
                let before_key = self.buf.position();
                let key = self.buf.read_slice(colon);
                if contains_token(&key, b"clientContextID") {
                    // does not account for an escaped quote inside the id
                    self.buf.skip(self.buf.bytes_before(b'"')? + 1);
                    let len = self.buf.bytes_before(b'"')?;
                    client_context_id =
                        String::from_utf8_lossy(&self.buf.read_slice(len)).into_owned();
                    self.buf.skip(1); // closing quote
                    self.buf.skip(self.buf.bytes_before(b'"')?); // next key's quote
                } else {
                    self.buf.rewind_to(before_key);
                }
            }
        }

        if self.buf.remaining() < self.config.error_peek_window && !self.last_seen {
            return None;
        }
        // Heuristic: an errors field this early means the query failed
        // outright. Confirmed later when the errors state is reached.
        let errors_ahead = contains_token(
            self.buf.peek_slice(self.config.error_peek_window),
            b"errors",
        );

        Some((request_id, client_context_id, errors_ahead))
    }

    // ------------------------------------------------------------------
    // Field state machine
    // ------------------------------------------------------------------

    /// Drive the state machine as far as the buffered bytes allow.
    ///
    /// States run in protocol order; each handler either commits a whole
    /// step (consuming bytes, possibly emitting, advancing the state) or
    /// leaves everything untouched so the next chunk can retry.
    fn run(&mut self) -> Result<(), ProtocolError> {
        if self.state == ParseState::Initial {
            if let Some((next, consumed)) = self.peek_field(0)? {
                self.buf.skip(consumed);
                self.state = next;
            }
        }
        if self.state == ParseState::Signature {
            self.parse_signature()?;
        }
        if self.state == ParseState::Rows {
            self.parse_array(ParseState::Rows)?;
        }
        if self.state == ParseState::Error {
            self.parse_array(ParseState::Error)?;
        }
        if self.state == ParseState::Warning {
            // warnings ride the errors channel
            self.parse_array(ParseState::Warning)?;
        }
        if self.state == ParseState::Status {
            self.parse_status()?;
        }
        if self.state == ParseState::Info {
            self.parse_info();
        }
        if self.state == ParseState::Done {
            self.finish();
        }
        Ok(())
    }

    /// Peek the first `"key":` token at or after cursor-relative `start`.
    ///
    /// Returns the matched state and the cursor-relative offset one past
    /// the colon, consuming nothing. `Ok(None)` means the colon is not
    /// buffered yet.
    fn peek_field(&self, start: usize) -> Result<Option<(ParseState, usize)>, ProtocolError> {
        let Some(colon) = self.buf.bytes_before_from(start, b':') else {
            return Ok(None);
        };
        let peek = self.buf.peek_range(start, colon + 1 - start);
        match ParseState::for_key(peek) {
            Some(next) => Ok(Some((next, colon + 1))),
            None => {
                let context = String::from_utf8_lossy(peek).into_owned();
                trace!(%context, "unknown field in query response");
                Err(ProtocolError::UnknownField { context })
            }
        }
    }

    /// Locate the balanced signature object and drop it, then move to the
    /// next field. The object and the following key are committed as one
    /// step so a suspension in between cannot strand the cursor.
    fn parse_signature(&mut self) -> Result<(), ProtocolError> {
        let Some(open) = self.buf.bytes_before(b'{') else {
            return Ok(());
        };
        let Some(close) = find_balanced_from(self.buf.unread(), open, b'{', b'}') else {
            return Ok(());
        };
        let Some((next, consumed)) = self.peek_field(close + 1)? else {
            return Ok(());
        };
        self.buf.skip(consumed);
        self.buf.discard_consumed();
        self.state = next;
        Ok(())
    }

    /// Extract `{…}` array elements one at a time, emitting each as soon
    /// as it closes. The array ends when the next field's colon comes
    /// before another opening brace.
    fn parse_array(&mut self, from: ParseState) -> Result<(), ProtocolError> {
        loop {
            let open = self.buf.bytes_before(b'{');
            let colon = self.buf.bytes_before(b':');

            let element_open = match (open, colon) {
                // a key's colon precedes any further element: field done
                (Some(o), Some(c)) if c < o => None,
                (None, Some(_)) => None,
                (Some(o), _) => Some(o),
                (None, None) => break, // wait for more data
            };

            let Some(open) = element_open else {
                if let Some((next, consumed)) = self.peek_field(0)? {
                    self.buf.skip(consumed);
                    self.state = next;
                }
                break;
            };

            let Some(close) = find_balanced_from(self.buf.unread(), open, b'{', b'}') else {
                break; // element not fully buffered yet
            };

            self.buf.skip(open);
            let doc = self.buf.read_slice(close - open + 1);
            if let Some(channels) = &self.channels {
                match from {
                    ParseState::Rows => channels.push_row(doc),
                    _ => channels.push_error(doc),
                }
            }
        }

        self.buf.discard_consumed();
        Ok(())
    }

    /// Extract the quoted status scalar and emit it unquoted.
    ///
    /// Committed together with the decision of what follows: either the
    /// next field's key, or - on the terminal chunk with no colon left -
    /// the end of the document (the envelope's trailing `}` carries no
    /// field).
    fn parse_status(&mut self) -> Result<(), ProtocolError> {
        let Some(open_quote) = self.buf.bytes_before(b'"') else {
            return Ok(());
        };
        let Some(close_quote) = self.buf.bytes_before_from(open_quote + 1, b'"') else {
            return Ok(());
        };
        let value = String::from_utf8_lossy(
            self.buf
                .peek_range(open_quote + 1, close_quote - open_quote - 1),
        )
        .into_owned();

        match self.peek_field(close_quote + 1)? {
            Some((next, consumed)) => {
                if let Some(channels) = &self.channels {
                    channels.push_status(value);
                }
                self.buf.skip(consumed);
                self.buf.discard_consumed();
                self.state = next;
            }
            None if self.last_seen => {
                if let Some(channels) = &self.channels {
                    channels.push_status(value);
                }
                self.buf.skip(close_quote + 1);
                self.buf.discard_consumed();
                self.state = ParseState::Done;
            }
            None => {} // next field key not buffered yet
        }
        Ok(())
    }

    /// Extract the metrics object. Only attempted once the terminal chunk
    /// has been seen; metrics are assumed complete only at stream end. A
    /// span that still cannot close then is reported as truncation by
    /// `push_chunk`.
    fn parse_info(&mut self) {
        if !self.last_seen {
            return;
        }
        let Some(open) = self.buf.bytes_before(b'{') else {
            return;
        };
        let Some(close) = find_balanced_from(self.buf.unread(), open, b'{', b'}') else {
            return;
        };
        self.buf.skip(open);
        let doc = self.buf.read_slice(close - open + 1);
        if let Some(channels) = &self.channels {
            channels.push_metrics(doc);
        }
        self.buf.discard_consumed();
        self.state = ParseState::Done;
    }

    /// Terminal teardown: close all four channels and release buffered
    /// state. Idempotent; the channels can only be taken once.
    fn finish(&mut self) {
        if let Some(channels) = self.channels.take() {
            debug!("query response complete, closing channels");
            channels.complete();
        }
        self.buf.discard_consumed();
    }
}
