//! Field states for the query response parser.

use crate::scan::contains_token;

/// Parsing state for one in-flight query response.
///
/// The protocol emits its top-level fields in a fixed order:
///
/// ```text
/// requestID [clientContextID] [signature] [results] [errors|warnings] status [metrics]
/// ```
///
/// States advance strictly forward; optional fields are skipped by
/// dispatching on whichever known key appears next. Exactly one value
/// exists per response, owned by the demultiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Waiting for the first field key after the id preamble.
    Initial,
    /// Consuming the `signature` object (dropped, not delivered).
    Signature,
    /// Streaming `results` array elements to the rows channel.
    Rows,
    /// Streaming `errors` array elements to the errors channel.
    Error,
    /// Streaming `warnings` array elements to the errors channel.
    Warning,
    /// Extracting the scalar `status` string.
    Status,
    /// Extracting the `metrics` object; waits for the terminal chunk.
    Info,
    /// Terminal: channels closed, per-response state released.
    Done,
}

impl ParseState {
    /// Dispatch on a peeked key token (everything up to and including the
    /// `:`). `None` marks an unknown key, which the caller treats as a
    /// fatal protocol violation.
    pub fn for_key(peek: &[u8]) -> Option<ParseState> {
        if contains_token(peek, b"\"signature\"") {
            Some(ParseState::Signature)
        } else if contains_token(peek, b"\"results\"") {
            Some(ParseState::Rows)
        } else if contains_token(peek, b"\"status\"") {
            Some(ParseState::Status)
        } else if contains_token(peek, b"\"errors\"") {
            Some(ParseState::Error)
        } else if contains_token(peek, b"\"warnings\"") {
            Some(ParseState::Warning)
        } else if contains_token(peek, b"\"metrics\"") {
            Some(ParseState::Info)
        } else {
            None
        }
    }

    /// Field name for error reporting.
    pub fn name(self) -> &'static str {
        match self {
            ParseState::Initial => "initial",
            ParseState::Signature => "signature",
            ParseState::Rows => "results",
            ParseState::Error => "errors",
            ParseState::Warning => "warnings",
            ParseState::Status => "status",
            ParseState::Info => "metrics",
            ParseState::Done => "done",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_key_known_fields() {
        assert_eq!(
            ParseState::for_key(b",\"signature\":"),
            Some(ParseState::Signature)
        );
        assert_eq!(ParseState::for_key(b",\"results\":"), Some(ParseState::Rows));
        assert_eq!(ParseState::for_key(b"],\"errors\":"), Some(ParseState::Error));
        assert_eq!(
            ParseState::for_key(b"],\"warnings\":"),
            Some(ParseState::Warning)
        );
        assert_eq!(
            ParseState::for_key(b"],\"status\":"),
            Some(ParseState::Status)
        );
        assert_eq!(
            ParseState::for_key(b",\"metrics\":"),
            Some(ParseState::Info)
        );
    }

    #[test]
    fn test_for_key_tolerates_junk_prefix() {
        // the peek slice includes whatever punctuation precedes the key
        assert_eq!(
            ParseState::for_key(b"\"},\"results\":"),
            Some(ParseState::Rows)
        );
    }

    #[test]
    fn test_for_key_unknown() {
        assert_eq!(ParseState::for_key(b",\"bogus\":"), None);
        assert_eq!(ParseState::for_key(b""), None);
    }
}
