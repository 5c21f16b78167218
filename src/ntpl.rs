//! NTPL parser error block decoding and filter program helpers
//!
//! When the driver rejects a statement it fills a fixed-layout error block:
//!
//! ```text
//! offset 0          segment 0: NUL-terminated text, padded to S bytes
//! offset S          segment 1: NUL-terminated text, padded to S bytes
//! offset 2S         segment 2: NUL-terminated text, padded to S bytes
//! offset 3S         error code: i32, big-endian, 4 bytes
//! ```
//!
//! The block is exactly `3 * S + 4` bytes, so the segment size is derived from the
//! block length. Each segment must contain a NUL within its own `S` bytes; a
//! segment without one means the block does not have this layout and the driver
//! and library disagree on the response structure.

use tracing::trace;

use crate::types::FilterDiagnostics;
use crate::{CaptureError, Result};

/// Number of text segments in the error block.
pub const ERROR_SEGMENTS: usize = 3;

/// Size of the trailing error code field.
pub const ERROR_CODE_LEN: usize = 4;

/// Total block size for a given segment size.
pub const fn error_block_len(segment_len: usize) -> usize {
    ERROR_SEGMENTS * segment_len + ERROR_CODE_LEN
}

/// Decode a parser error block into its three lines and error code.
pub fn decode_error_block(block: &[u8]) -> Result<FilterDiagnostics> {
    let text_len = block.len().checked_sub(ERROR_CODE_LEN).ok_or_else(|| {
        CaptureError::malformed(format!(
            "NTPL error block is {} bytes, shorter than its {} byte error code",
            block.len(),
            ERROR_CODE_LEN
        ))
    })?;

    if text_len == 0 || text_len % ERROR_SEGMENTS != 0 {
        return Err(CaptureError::malformed(format!(
            "NTPL error block text area of {} bytes does not split into {} equal segments",
            text_len, ERROR_SEGMENTS
        )));
    }

    let segment_len = text_len / ERROR_SEGMENTS;
    let mut lines: [String; ERROR_SEGMENTS] = Default::default();

    for (index, line) in lines.iter_mut().enumerate() {
        let start = index * segment_len;
        *line = parse_segment(&block[start..start + segment_len], index)?;
    }

    let code = parse_i32_be(&block[text_len..])?;

    trace!(segment_len, code, "Decoded NTPL error block");

    Ok(FilterDiagnostics { lines, code })
}

/// Text of one segment up to its first NUL.
fn parse_segment(segment: &[u8], index: usize) -> Result<String> {
    let end = segment.iter().position(|&b| b == 0).ok_or_else(|| {
        CaptureError::malformed(format!(
            "NTPL error segment {} has no NUL terminator within {} bytes",
            index,
            segment.len()
        ))
    })?;
    Ok(String::from_utf8_lossy(&segment[..end]).into_owned())
}

fn parse_i32_be(bytes: &[u8]) -> Result<i32> {
    let raw: [u8; ERROR_CODE_LEN] = bytes.try_into().map_err(|_| {
        CaptureError::malformed(format!("NTPL error code field is {} bytes", bytes.len()))
    })?;
    Ok(i32::from_be_bytes(raw))
}

/// Encode diagnostics into an error block with `segment_len` byte segments.
///
/// Lines longer than `segment_len - 1` bytes are cut so the NUL always fits.
/// Used by emulated drivers to produce the same layout as the native one.
pub fn encode_error_block(diagnostics: &FilterDiagnostics, segment_len: usize) -> Vec<u8> {
    let mut block = vec![0u8; error_block_len(segment_len)];
    for (index, line) in diagnostics.lines.iter().enumerate() {
        let start = index * segment_len;
        let len = line.len().min(segment_len.saturating_sub(1));
        block[start..start + len].copy_from_slice(&line.as_bytes()[..len]);
    }
    let code_at = ERROR_SEGMENTS * segment_len;
    block[code_at..].copy_from_slice(&diagnostics.code.to_be_bytes());
    block
}

/// NTPL program that sends all traffic from `port` to `stream_id`.
///
/// Clears existing filters, defines a port filter, then assigns it to the stream.
pub fn port_program(port: u8, stream_id: u32) -> Vec<String> {
    vec![
        "Delete = ALL".to_string(),
        format!("Define FilterPort = Filter(Port=={})", port),
        format!("Assign[streamid={}] = FilterPort", stream_id),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ntpl_error_block;
    use proptest::prelude::*;

    #[test]
    fn decodes_three_lines_and_code() {
        let block = ntpl_error_block(["bad token", "at offset 5", "see docs"], 42, 64);
        assert_eq!(&block[block.len() - 4..], &[0x00, 0x00, 0x00, 0x2A]);

        let diagnostics = decode_error_block(&block).unwrap();
        assert_eq!(diagnostics.lines[0], "bad token");
        assert_eq!(diagnostics.lines[1], "at offset 5");
        assert_eq!(diagnostics.lines[2], "see docs");
        assert_eq!(diagnostics.code, 42);
    }

    #[test]
    fn text_after_terminator_is_ignored() {
        let mut block = ntpl_error_block(["a", "b", "c"], -1, 8);
        block[3..7].copy_from_slice(b"junk");
        block[8 + 4] = b'x';

        let diagnostics = decode_error_block(&block).unwrap();
        assert_eq!(diagnostics.lines, ["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(diagnostics.code, -1);
    }

    #[test]
    fn each_segment_is_scanned_within_its_own_bounds() {
        let mut block = ntpl_error_block(["first", "", "third"], 1, 8);
        // Fill segment 2 completely; the NUL in segment 1 must not satisfy it
        block[16..24].copy_from_slice(b"ABCDEFGH");

        let err = decode_error_block(&block).unwrap_err();
        assert!(matches!(err, CaptureError::MalformedResponse { .. }));
        assert!(err.to_string().contains("segment 2"));
    }

    #[test]
    fn missing_terminator_is_malformed() {
        let mut block = ntpl_error_block(["", "", ""], 0, 4);
        block[..4].copy_from_slice(b"full");
        assert!(matches!(decode_error_block(&block), Err(CaptureError::MalformedResponse { .. })));
    }

    #[test]
    fn uneven_or_short_blocks_are_malformed() {
        assert!(decode_error_block(&[]).is_err());
        assert!(decode_error_block(&[0, 0, 0, 1]).is_err());
        assert!(decode_error_block(&[0u8; 3 * 5 + 4 + 1]).is_err());
    }

    #[test]
    fn port_program_matches_reference_flow() {
        assert_eq!(
            port_program(3, 1),
            vec![
                "Delete = ALL".to_string(),
                "Define FilterPort = Filter(Port==3)".to_string(),
                "Assign[streamid=1] = FilterPort".to_string(),
            ]
        );
    }

    proptest! {
        #[test]
        fn decode_recovers_encoded_diagnostics(
            a in "[ -~]{0,15}",
            b in "[ -~]{0,15}",
            c in "[ -~]{0,15}",
            code in any::<i32>(),
            segment_len in 16usize..256usize,
        ) {
            let diagnostics = FilterDiagnostics { lines: [a, b, c], code };
            let block = encode_error_block(&diagnostics, segment_len);
            prop_assert_eq!(block.len(), error_block_len(segment_len));
            prop_assert_eq!(decode_error_block(&block).unwrap(), diagnostics);
        }
    }
}
