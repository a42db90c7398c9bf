//! The response handle exposed to callers.

use crate::channel::{DocReceiver, StatusReceiver};

/// Coarse outcome of a query response.
///
/// Starts out derived from the transport status code, then overridden by
/// the errors-lookahead heuristic once enough of the JSON body has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Success,
    Failure,
}

impl QueryStatus {
    /// Classify a transport-level (HTTP) status code. Used only as the
    /// initial default before the JSON-derived status is known.
    pub fn from_http_code(code: u16) -> QueryStatus {
        if (200..300).contains(&code) {
            QueryStatus::Success
        } else {
            QueryStatus::Failure
        }
    }
}

/// Handle for one in-flight query response.
///
/// Produced by the demultiplexer once enough bytes have arrived to read the
/// request id. Carries the id metadata plus the consumer side of the four
/// field channels; each channel is an in-order, single-pass sequence of
/// opaque JSON sub-documents. The producer closes all four together when
/// the response terminates.
///
/// Consumers are free to move individual receivers onto other tasks.
#[derive(Debug)]
pub struct QueryResponse {
    request_id: String,
    client_context_id: String,
    status: QueryStatus,

    /// Result rows, one JSON object per item, in stream order.
    pub rows: DocReceiver,
    /// Errors and warnings, combined, one JSON object per item.
    pub errors: DocReceiver,
    /// Final execution status string (single item, unquoted).
    pub query_status: StatusReceiver,
    /// Execution metrics object, delivered once the stream ends.
    pub metrics: DocReceiver,
}

impl QueryResponse {
    pub(crate) fn new(
        request_id: String,
        client_context_id: String,
        status: QueryStatus,
        rows: DocReceiver,
        errors: DocReceiver,
        query_status: StatusReceiver,
        metrics: DocReceiver,
    ) -> Self {
        Self {
            request_id,
            client_context_id,
            status,
            rows,
            errors,
            query_status,
            metrics,
        }
    }

    /// Server-assigned request id. Fixed for the life of the handle.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Client-supplied correlation id; empty if the request carried none.
    pub fn client_context_id(&self) -> &str {
        &self.client_context_id
    }

    /// Resolved overall status.
    pub fn status(&self) -> QueryStatus {
        self.status
    }
}
