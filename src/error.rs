//! Error taxonomy for response demultiplexing.

use thiserror::Error;

/// Fatal protocol-level failures.
///
/// Insufficient buffered data is deliberately *not* represented here: a scan
/// that cannot complete with the bytes on hand suspends internally and is
/// retried once the next chunk arrives. Everything in this enum poisons the
/// in-flight response; parsing cannot resume after any of them.
///
/// The type is `Clone` so a single failure can be fanned out to all four
/// response channels as their terminal item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A field key matched none of the known protocol fields.
    #[error("unknown field in query response near {context:?}")]
    UnknownField { context: String },

    /// The transport signalled end-of-response while a field was still open.
    #[error("query response truncated while parsing {state}")]
    Truncated { state: &'static str },

    /// The response ended before the request id could be read.
    #[error("query response ended before the request id was available")]
    MissingRequestId,

    /// The connection owning this response was torn down mid-stream.
    #[error("query response cancelled by connection teardown")]
    Cancelled,
}
