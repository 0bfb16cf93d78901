// SYNOID Segment Orderer
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Concatenation order is playback order, so segments are sorted by the
// numeric suffix of their field name. A plain string sort would put
// segment_10 before segment_2.

use crate::stitch::UploadedFile;

pub const SEGMENT_PREFIX: &str = "segment_";

/// Parse the index out of a `segment_<n>` field name.
///
/// Indexes start at 1 and are plain decimal digits: `segment_0`,
/// `segment_01`, `segment_+1` and `segment_` are not segment fields.
pub fn segment_index(field_name: &str) -> Option<u32> {
    let digits = field_name.strip_prefix(SEGMENT_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

/// Sort segment uploads into playback order.
///
/// Files whose field name is not a segment field sort last; intake never
/// hands such files over.
pub fn order_segments(mut segments: Vec<UploadedFile>) -> Vec<UploadedFile> {
    segments.sort_by_key(|f| segment_index(&f.field_name).unwrap_or(u32::MAX));
    segments
}
