//! Length-delimited record framing used by data files.
//!
//! Each record is `[kind: 1 byte][len: 4 bytes LE][payload: len bytes]`.
//! Framing overhead (5 bytes) counts toward the byte budgets alongside the
//! payload.

pub const METADATA_KIND: u8 = 0;
pub const OBSERVATION_KIND: u8 = 1;

pub const FRAME_OVERHEAD: u64 = 5;

#[must_use]
pub fn encode(kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5 + payload.len());
    buf.push(kind);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Decodes as many complete records as `bytes` holds. A truncated trailing
/// record (a partial header or a payload shorter than its declared length)
/// is dropped silently rather than treated as an error, matching the
/// store's tolerant recovery policy for mid-write crashes.
#[must_use]
pub fn decode_all(bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos + 5 <= bytes.len() {
        let kind = bytes[pos];
        let len = u32::from_le_bytes([bytes[pos + 1], bytes[pos + 2], bytes[pos + 3], bytes[pos + 4]]) as usize;
        if pos + 5 + len > bytes.len() {
            break;
        }
        out.push((kind, bytes[pos + 5..pos + 5 + len].to_vec()));
        pos += 5 + len;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_multiple_records() {
        let mut buf = Vec::new();
        buf.extend(encode(METADATA_KIND, b"meta"));
        buf.extend(encode(OBSERVATION_KIND, b"obs1"));
        let records = decode_all(&buf);
        assert_eq!(records, vec![
            (METADATA_KIND, b"meta".to_vec()),
            (OBSERVATION_KIND, b"obs1".to_vec()),
        ]);
    }

    #[test]
    fn drops_truncated_trailing_record() {
        let mut buf = encode(OBSERVATION_KIND, b"complete");
        buf.extend(encode(OBSERVATION_KIND, b"partial"));
        let cut = buf.len() - 3;
        buf.truncate(cut);
        let records = decode_all(&buf);
        assert_eq!(records, vec![(OBSERVATION_KIND, b"complete".to_vec())]);
    }
}
