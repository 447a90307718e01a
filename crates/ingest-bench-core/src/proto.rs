//! Wire messages and generated service bindings for `dp.benchmark.Benchmark`.
//!
//! Messages are declared directly with `prost` derives; field tags are part of
//! the wire contract and must not be renumbered.

/// Single signed integer payload used by the spam RPCs.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Int64Msg {
    #[prost(int64, tag = "1")]
    pub value: i64,
}

/// Identifier handed back for a unary ingestion.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct SnapshotId {
    #[prost(int64, tag = "1")]
    pub snapshot_id: i64,
}

/// One scalar cell of a [`DataColumn`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Datum {
    #[prost(oneof = "datum::Value", tags = "1, 2, 3")]
    pub value: Option<datum::Value>,
}

pub mod datum {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(double, tag = "1")]
        FloatValue(f64),
        #[prost(int64, tag = "2")]
        IntValue(i64),
        #[prost(string, tag = "3")]
        StringValue(String),
    }
}

/// A named column; row `i` of the frame is `data[i]`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataColumn {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub data: Vec<Datum>,
}

/// Column-oriented payload sent once per ingestion request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataFrame {
    #[prost(message, repeated, tag = "1")]
    pub columns: Vec<DataColumn>,
}

/// Per-frame acknowledgment streamed back by the server.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FrameAck {
    #[prost(uint32, tag = "1")]
    pub row_count: u32,
    #[prost(uint32, tag = "2")]
    pub col_count: u32,
    #[prost(bool, tag = "3")]
    pub data_error: bool,
    #[prost(string, tag = "4")]
    pub status_message: String,
}

impl Datum {
    pub const fn float(value: f64) -> Self {
        Self {
            value: Some(datum::Value::FloatValue(value)),
        }
    }

    /// Returns the value if this cell carries a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            Some(datum::Value::FloatValue(v)) => Some(v),
            _ => None,
        }
    }
}

impl DataFrame {
    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    /// Row count as seen by the server: the length of the first column, or
    /// zero for a frame without columns.
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }
}

include!(concat!(env!("OUT_DIR"), "/dp.benchmark.Benchmark.rs"));
