//! Channel fan-out for demultiplexed response fields.
//!
//! Four independently consumed channels bridge the single-threaded ingest
//! side to consumers that may run on any other task. Production is
//! non-blocking (unbounded push) so a slow consumer buffers rather than
//! stalls chunk ingestion. All four channels close together, exactly once,
//! when the response reaches its terminal state.

use crate::error::ProtocolError;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Item on the rows / errors / metrics channels: one complete JSON
/// sub-document, or the fatal error that terminated the response.
pub type DocItem = Result<Bytes, ProtocolError>;

/// Item on the status channel: the unquoted status string.
pub type StatusItem = Result<String, ProtocolError>;

/// Consumer side of a sub-document channel.
pub type DocReceiver = mpsc::UnboundedReceiver<DocItem>;

/// Consumer side of the status channel.
pub type StatusReceiver = mpsc::UnboundedReceiver<StatusItem>;

/// Producer half of the fan-out, owned by the demultiplexer.
///
/// [`complete`](ChannelSet::complete) and [`fail`](ChannelSet::fail) take
/// the set by value, so closing twice is unrepresentable.
#[derive(Debug)]
pub(crate) struct ChannelSet {
    rows: mpsc::UnboundedSender<DocItem>,
    errors: mpsc::UnboundedSender<DocItem>,
    status: mpsc::UnboundedSender<StatusItem>,
    metrics: mpsc::UnboundedSender<DocItem>,
}

/// Create the four channels, returning the producer set and the consumer
/// endpoints in field order: rows, errors, status, metrics.
pub(crate) fn channel_set() -> (ChannelSet, DocReceiver, DocReceiver, StatusReceiver, DocReceiver) {
    let (rows_tx, rows_rx) = mpsc::unbounded_channel();
    let (errors_tx, errors_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let (metrics_tx, metrics_rx) = mpsc::unbounded_channel();
    (
        ChannelSet {
            rows: rows_tx,
            errors: errors_tx,
            status: status_tx,
            metrics: metrics_tx,
        },
        rows_rx,
        errors_rx,
        status_rx,
        metrics_rx,
    )
}

impl ChannelSet {
    // A send only fails when the consumer dropped its receiver, which is
    // the consumer declining the data, not an ingest error.

    pub(crate) fn push_row(&self, doc: Bytes) {
        let _ = self.rows.send(Ok(doc));
    }

    pub(crate) fn push_error(&self, doc: Bytes) {
        let _ = self.errors.send(Ok(doc));
    }

    pub(crate) fn push_status(&self, status: String) {
        let _ = self.status.send(Ok(status));
    }

    pub(crate) fn push_metrics(&self, doc: Bytes) {
        let _ = self.metrics.send(Ok(doc));
    }

    /// Close all four channels cleanly. Items already pushed remain
    /// readable; receivers then observe end-of-stream.
    pub(crate) fn complete(self) {
        // dropping the senders is the close
    }

    /// Terminate all four channels with `err` as their final item.
    pub(crate) fn fail(self, err: ProtocolError) {
        let _ = self.rows.send(Err(err.clone()));
        let _ = self.errors.send(Err(err.clone()));
        let _ = self.status.send(Err(err.clone()));
        let _ = self.metrics.send(Err(err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_then_complete() {
        let (set, mut rows, mut errors, mut status, mut metrics) = channel_set();

        set.push_row(Bytes::from_static(b"{\"x\":1}"));
        set.push_row(Bytes::from_static(b"{\"x\":2}"));
        set.push_status("success".to_string());
        set.complete();

        assert_eq!(rows.recv().await.unwrap().unwrap().as_ref(), b"{\"x\":1}");
        assert_eq!(rows.recv().await.unwrap().unwrap().as_ref(), b"{\"x\":2}");
        assert!(rows.recv().await.is_none());

        assert_eq!(status.recv().await.unwrap().unwrap(), "success");
        assert!(status.recv().await.is_none());

        assert!(errors.recv().await.is_none());
        assert!(metrics.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_fail_reaches_every_channel() {
        let (set, mut rows, mut errors, mut status, mut metrics) = channel_set();

        set.push_row(Bytes::from_static(b"{\"x\":1}"));
        set.fail(ProtocolError::Cancelled);

        // the row delivered before the failure is still readable
        assert!(rows.recv().await.unwrap().is_ok());
        assert_eq!(rows.recv().await.unwrap(), Err(ProtocolError::Cancelled));
        assert!(rows.recv().await.is_none());

        assert_eq!(errors.recv().await.unwrap(), Err(ProtocolError::Cancelled));
        assert_eq!(status.recv().await.unwrap(), Err(ProtocolError::Cancelled));
        assert_eq!(metrics.recv().await.unwrap(), Err(ProtocolError::Cancelled));
    }

    #[tokio::test]
    async fn test_push_survives_dropped_consumer() {
        let (set, rows, _errors, _status, _metrics) = channel_set();
        drop(rows);
        // must not panic or error out of the ingest path
        set.push_row(Bytes::from_static(b"{}"));
        set.complete();
    }
}
