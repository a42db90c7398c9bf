//! Chunk-boundary invariance: however the transport slices the response,
//! every channel must see the exact sequence it would see from a single
//! unsplit chunk.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use proptest::prelude::*;
    use rowstream::{DocReceiver, QueryDemux, QueryStatus};

    const REQUEST_ID: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeffff";

    fn payload_ok() -> String {
        format!(
            "{{\"requestID\":\"{REQUEST_ID}\",\"signature\":{{\"a\":1}},\
             \"results\":[{{\"x\":1}},{{\"x\":2}}],\"status\":\"success\",\
             \"metrics\":{{\"n\":2}}}}"
        )
    }

    fn payload_with_context_id() -> String {
        format!(
            "{{\"requestID\":\"{REQUEST_ID}\",\"clientContextID\":\"ctx-123\",\
             \"results\":[{{\"x\":1}},{{\"x\":2}},{{\"x\":3}}],\
             \"status\":\"success\",\"metrics\":{{\"n\":3}}}}"
        )
    }

    fn payload_errors() -> String {
        format!(
            "{{\"requestID\":\"{REQUEST_ID}\",\"errors\":[{{\"msg\":\"bad\"}}],\
             \"status\":\"fatal\",\"metrics\":{{\"n\":0}}}}"
        )
    }

    /// Everything a response delivered, in order, for equality comparison.
    #[derive(Debug, PartialEq)]
    struct Delivered {
        request_id: String,
        client_context_id: String,
        status: QueryStatus,
        rows: Vec<Bytes>,
        errors: Vec<Bytes>,
        statuses: Vec<String>,
        metrics: Vec<Bytes>,
    }

    fn drain(rx: &mut DocReceiver) -> Vec<Bytes> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            out.push(item.expect("channel failed"));
        }
        out
    }

    /// Feed `payload` split at `cuts` (sorted, cursor offsets), final chunk
    /// flagged last, and collect everything that comes out.
    fn run_split(payload: &[u8], cuts: &[usize]) -> Delivered {
        let mut demux = QueryDemux::new(QueryStatus::Success);
        let mut handle = None;
        let mut bounds = cuts.to_vec();
        bounds.push(payload.len());
        let mut prev = 0;
        for (i, &end) in bounds.iter().enumerate() {
            let is_last = i == bounds.len() - 1;
            if let Some(h) = demux
                .push_chunk(&payload[prev..end], is_last)
                .expect("valid payload must parse")
            {
                handle = Some(h);
            }
            prev = end;
        }
        let mut resp = handle.expect("handle issued");

        let mut statuses = Vec::new();
        while let Ok(item) = resp.query_status.try_recv() {
            statuses.push(item.expect("status failed"));
        }
        Delivered {
            request_id: resp.request_id().to_string(),
            client_context_id: resp.client_context_id().to_string(),
            status: resp.status(),
            rows: drain(&mut resp.rows),
            errors: drain(&mut resp.errors),
            statuses,
            metrics: drain(&mut resp.metrics),
        }
    }

    #[test]
    fn test_every_two_chunk_split_matches_unsplit() {
        for payload in [payload_ok(), payload_with_context_id(), payload_errors()] {
            let bytes = payload.as_bytes();
            let baseline = run_split(bytes, &[]);
            for cut in 1..bytes.len() {
                let split = run_split(bytes, &[cut]);
                assert_eq!(split, baseline, "split at byte {cut} diverged");
            }
        }
    }

    #[test]
    fn test_byte_at_a_time_delivery() {
        let payload = payload_ok();
        let bytes = payload.as_bytes();
        let cuts: Vec<usize> = (1..bytes.len()).collect();
        assert_eq!(run_split(bytes, &cuts), run_split(bytes, &[]));
    }

    #[test]
    fn test_order_preserved_across_channels() {
        let payload = payload_with_context_id();
        let delivered = run_split(payload.as_bytes(), &[]);
        assert_eq!(delivered.client_context_id, "ctx-123");
        assert_eq!(
            delivered
                .rows
                .iter()
                .map(|r| String::from_utf8_lossy(r).into_owned())
                .collect::<Vec<_>>(),
            vec!["{\"x\":1}", "{\"x\":2}", "{\"x\":3}"]
        );
        assert_eq!(delivered.statuses, vec!["success"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_random_three_way_splits_match_unsplit(
            a: prop::sample::Index,
            b: prop::sample::Index,
        ) {
            let payload = payload_ok();
            let bytes = payload.as_bytes();
            let mut cuts = [a.index(bytes.len()), b.index(bytes.len())];
            cuts.sort_unstable();
            prop_assert_eq!(run_split(bytes, &cuts), run_split(bytes, &[]));
        }

        #[test]
        fn prop_error_payload_splits_match_unsplit(
            a: prop::sample::Index,
            b: prop::sample::Index,
        ) {
            let payload = payload_errors();
            let bytes = payload.as_bytes();
            let mut cuts = [a.index(bytes.len()), b.index(bytes.len())];
            cuts.sort_unstable();
            prop_assert_eq!(run_split(bytes, &cuts), run_split(bytes, &[]));
        }
    }
}
