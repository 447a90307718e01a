use ingest_bench_core::proto::{DataColumn, DataFrame, FrameAck};
use std::time::{Duration, Instant};
use tonic::Status;

/// Per-call state of one `StreamingIngestion` stream.
///
/// One instance exists per inbound call. It is owned by the single task that
/// reads the call's inbound frames, so it is never mutated concurrently.
#[derive(Debug)]
pub struct IngestionCall {
    call_id: u64,
    request_count: u64,
    started: Instant,
}

/// Terminal observation of a call that completed normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSummary {
    pub call_id: u64,
    pub request_count: u64,
    pub elapsed: Duration,
}

impl IngestionCall {
    pub fn open(call_id: u64) -> Self {
        tracing::debug!("ingestion call {call_id} opened");
        Self {
            call_id,
            request_count: 0,
            started: Instant::now(),
        }
    }

    pub const fn call_id(&self) -> u64 {
        self.call_id
    }

    pub const fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Counts the frame and returns its acknowledgment.
    ///
    /// An ack is produced for every frame, whether or not it validates.
    pub fn on_frame(&mut self, frame: &DataFrame) -> FrameAck {
        self.request_count += 1;
        let ack = inspect_frame(frame);
        tracing::debug!(
            "call {} frame #{} rowCount: {} colCount: {}",
            self.call_id,
            self.request_count,
            ack.row_count,
            ack.col_count
        );
        if ack.data_error {
            tracing::warn!(
                "call {} frame #{} failed validation: {}",
                self.call_id,
                self.request_count,
                ack.status_message
            );
        }
        ack
    }

    /// Consumes the call after the client signalled end-of-input.
    pub fn on_complete(self) -> CallSummary {
        let summary = CallSummary {
            call_id: self.call_id,
            request_count: self.request_count,
            elapsed: self.started.elapsed(),
        };
        tracing::info!(
            "call {} requestCount: {} seconds: {:.3}",
            summary.call_id,
            summary.request_count,
            summary.elapsed.as_secs_f64()
        );
        summary
    }

    /// Consumes the call after the transport reported an error. The response
    /// side is presumed unusable, so nothing is flushed.
    pub fn on_error(self, status: &Status) {
        tracing::warn!(
            "call {} failed after {} frames: {}",
            self.call_id,
            self.request_count,
            status
        );
    }
}

/// Computes a frame's dimensions and checks its last-row checksum.
///
/// Both the first and the last column must end with a value equal to the row
/// count. Each failing column contributes one sentence to `status_message`.
pub fn inspect_frame(frame: &DataFrame) -> FrameAck {
    let col_count = frame.col_count();
    let row_count = frame.row_count();
    let mut problems = Vec::new();

    if let (Some(first), Some(last)) = (frame.columns.first(), frame.columns.last()) {
        if let Err(msg) = check_last_row("first", first, row_count) {
            problems.push(msg);
        }
        if col_count > 1 {
            if let Err(msg) = check_last_row("last", last, row_count) {
                problems.push(msg);
            }
        }
    }

    FrameAck {
        row_count: saturating_u32(row_count),
        col_count: saturating_u32(col_count),
        data_error: !problems.is_empty(),
        status_message: problems.join("; "),
    }
}

fn check_last_row(position: &str, column: &DataColumn, row_count: usize) -> Result<(), String> {
    if row_count == 0 {
        return Err(format!("{position} column '{}' has no rows", column.name));
    }

    let index = row_count - 1;
    let Some(datum) = column.data.get(index) else {
        return Err(format!(
            "{position} column '{}' data error, expected {row_count} rows but found {}",
            column.name,
            column.data.len()
        ));
    };

    match datum.as_f64() {
        Some(v) if v == row_count as f64 => Ok(()),
        _ => Err(format!(
            "{position} column '{}' data error, expected value: {row_count} in last row with index: {index}",
            column.name
        )),
    }
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_bench_core::{frame::build_frame, proto::Datum};

    fn corrupt_last_row(frame: &mut DataFrame, column: usize) {
        let data = &mut frame.columns[column].data;
        let last = data.len() - 1;
        data[last] = Datum::float(-1.0);
    }

    #[test]
    fn valid_frames_ack_their_dimensions() {
        for (rows, cols) in [(1, 1), (100, 5), (10, 250), (3, 2)] {
            let ack = inspect_frame(&build_frame(rows, cols));
            assert!(!ack.data_error, "{rows}x{cols}: {}", ack.status_message);
            assert_eq!(ack.row_count as usize, rows);
            assert_eq!(ack.col_count as usize, cols);
            assert!(ack.status_message.is_empty());
        }
    }

    #[test]
    fn corrupt_first_column_is_named() {
        let mut frame = build_frame(10, 4);
        corrupt_last_row(&mut frame, 0);

        let ack = inspect_frame(&frame);
        assert!(ack.data_error);
        assert!(ack.status_message.contains("first column 'col_1'"));
        assert!(ack.status_message.contains("expected value: 10"));
        assert!(!ack.status_message.contains("col_4"));
    }

    #[test]
    fn corrupt_last_column_is_named() {
        let mut frame = build_frame(10, 4);
        corrupt_last_row(&mut frame, 3);

        let ack = inspect_frame(&frame);
        assert!(ack.data_error);
        assert!(ack.status_message.contains("last column 'col_4'"));
        assert!(!ack.status_message.contains("col_1"));
    }

    #[test]
    fn both_columns_are_checked_independently() {
        let mut frame = build_frame(5, 3);
        corrupt_last_row(&mut frame, 0);
        corrupt_last_row(&mut frame, 2);

        let ack = inspect_frame(&frame);
        assert!(ack.data_error);
        assert!(ack.status_message.contains("col_1"));
        assert!(ack.status_message.contains("col_3"));
    }

    #[test]
    fn frame_without_columns_is_accepted() {
        let ack = inspect_frame(&DataFrame::default());
        assert!(!ack.data_error);
        assert_eq!(ack.row_count, 0);
        assert_eq!(ack.col_count, 0);
    }

    #[test]
    fn empty_or_ragged_columns_are_data_errors() {
        let ack = inspect_frame(&build_frame(0, 3));
        assert!(ack.data_error);
        assert!(ack.status_message.contains("has no rows"));

        let mut frame = build_frame(8, 3);
        frame.columns[2].data.truncate(5);
        let ack = inspect_frame(&frame);
        assert!(ack.data_error);
        assert!(ack.status_message.contains("col_3"));
        assert_eq!(ack.row_count, 8);
    }

    #[test]
    fn repeated_frames_produce_identical_acks() {
        let frame = build_frame(20, 6);
        let mut call = IngestionCall::open(7);

        let acks: Vec<_> = (0..25).map(|_| call.on_frame(&frame)).collect();
        assert_eq!(call.request_count(), 25);
        assert!(acks.iter().all(|ack| ack == &acks[0]));
        assert!(!acks[0].data_error);

        let summary = call.on_complete();
        assert_eq!(summary.call_id, 7);
        assert_eq!(summary.request_count, 25);
    }
}
