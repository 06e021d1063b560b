// ============================================================
// Layer 3: Record Domain Types
// ============================================================
// A Record is one line of the JSON-lines annotation file:
//
//   {"desc_id": 90200, "desc": "Phoebe puts one of her ...",
//    "vid_name": "friends_s01e03_seg02_clip_19",
//    "duration": 61.04, "ts": [16.48, 33.87]}
//
// Training splits always carry vid_name and duration. Test
// splits may strip them (and ts) so the ground truth is hidden.
//
// A VideoEntry is one row of the video index file, which maps
// every video of an evaluation split to its duration and the
// integer index used by the ranking code.

use serde::{Deserialize, Serialize};

/// Ground-truth moment inside a video, in seconds.
/// Serialised as a two-element array `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Span {
    pub start: f64,
    pub end:   f64,
}

impl Span {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

impl From<[f64; 2]> for Span {
    fn from([start, end]: [f64; 2]) -> Self {
        Self { start, end }
    }
}

impl From<Span> for [f64; 2] {
    fn from(s: Span) -> Self {
        [s.start, s.end]
    }
}

/// One natural-language query with its (optional) ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique query id; its decimal string is the key in the query store
    pub desc_id: i64,

    /// The query text itself
    pub desc: String,

    /// Video that contains the described moment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vid_name: Option<String>,

    /// Duration of that video in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Ground-truth moment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<Span>,
}

impl Record {
    /// Key of this record's embedding in the query store.
    pub fn query_key(&self) -> String {
        self.desc_id.to_string()
    }
}

/// One distinct video of an evaluation split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEntry {
    pub vid_name: String,
    pub duration: f64,
    /// Position of the video in the ranking matrix built downstream
    pub index:    usize,
}
