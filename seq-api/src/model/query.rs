use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a query against the data endpoint.
///
/// The server picks the shape by query kind; the variant is chosen by which
/// fields are present. `Error` goes first since failed queries may also carry
/// empty result fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResult {
    /// The query failed on the server side.
    #[serde(rename_all = "PascalCase")]
    Error {
        /// Summary message.
        error: String,
        /// Detailed reasons.
        #[serde(default)]
        reasons: Vec<String>,
        /// Suggested correction, if any.
        #[serde(default)]
        suggestion: Option<String>,
    },
    /// Time-series result (`group by time(...)`).
    #[serde(rename_all = "PascalCase")]
    Series {
        /// One series per group.
        series: Vec<QueryTimeSeries>,
    },
    /// Time-sliced result.
    #[serde(rename_all = "PascalCase")]
    Slices {
        /// Slices in time order.
        slices: Vec<QuerySlice>,
    },
    /// Tabular result.
    #[serde(rename_all = "PascalCase")]
    Table {
        /// Column names.
        columns: Vec<String>,
        /// Rows of raw JSON values.
        rows: Vec<Vec<Value>>,
    },
}

/// One time slice of a sliced result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QuerySlice {
    /// Slice start, as sent by the server.
    pub time: String,
    /// Rows within the slice.
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

/// One series of a time-series result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryTimeSeries {
    /// Key values identifying the series.
    #[serde(default)]
    pub key: Vec<Value>,
    /// Slices of this series.
    #[serde(default)]
    pub slices: Vec<QuerySlice>,
}
