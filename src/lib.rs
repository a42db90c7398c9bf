//! rowstream - incremental demultiplexer for chunked JSON query responses.
//!
//! A query server streams back one large JSON document whose top-level
//! fields arrive in a fixed order, split arbitrarily across transport
//! chunks that have no relationship to JSON token boundaries:
//!
//! ```text
//! {"requestID":"...","clientContextID":"...","signature":{...},
//!  "results":[{...},{...}],"errors":[...],"status":"...","metrics":{...}}
//! ```
//!
//! [`QueryDemux`] consumes the chunks as they arrive, recognises field
//! boundaries incrementally, and fans completed sub-documents out to four
//! independently consumed channels without ever buffering the whole
//! response:
//!
//! ```text
//!                     +------------+--- rows    --> consumer task
//! transport chunks -> | QueryDemux |--- errors  --> consumer task
//!  (is_last flag)     |            |--- status  --> consumer task
//!                     +------------+--- metrics --> consumer task
//! ```
//!
//! Ingestion is single-threaded and never blocks: a scan that runs out of
//! buffered bytes suspends and resumes when the next chunk is pushed.
//! Consumers may run on any task; the channels are the only concurrency
//! seam.

pub mod buffer;
pub mod channel;
pub mod demux;
pub mod error;
pub mod response;
pub mod scan;
pub mod state;

pub use buffer::ChunkBuffer;
pub use channel::{DocItem, DocReceiver, StatusItem, StatusReceiver};
pub use demux::{DemuxConfig, QueryDemux};
pub use error::ProtocolError;
pub use response::{QueryResponse, QueryStatus};
pub use state::ParseState;
