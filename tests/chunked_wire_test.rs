//! Wire-level tests for the chunked codec
//!
//! Bodies are encoded through the writer stack, then decoded from a source
//! that hands out arbitrarily small spans, the way a socket would.

use docbody::streaming::{
    copy, BufferedReader, BufferedWriter, ByteSink, ChunkedReader, ChunkedWriter, SliceSource,
};
use docbody::{BodyRead, ChunkError, ChunkFraming, ChunkLocation, HeaderState};

fn encode(data: &[u8], chunk_size: usize, write_size: usize, framing: ChunkFraming) -> Vec<u8> {
    let mut wire = Vec::new();
    {
        let buffered = BufferedWriter::with_capacity(64, &mut wire);
        let mut writer = ChunkedWriter::with_options(buffered, chunk_size, framing);
        for piece in data.chunks(write_size.max(1)) {
            writer.write(piece).unwrap();
        }
        writer.close().unwrap();
    }
    wire
}

/// Decodes `wire` and returns the body, the first error, and whatever the
/// decoder left unread in the source.
fn decode(
    wire: &[u8],
    max_span: usize,
    framing: ChunkFraming,
) -> (Vec<u8>, Option<ChunkError>, Vec<u8>) {
    let mut source = SliceSource::with_max_span(wire, max_span);
    let (body, error) = {
        let mut reader =
            ChunkedReader::with_options(BufferedReader::new(&mut source), framing, None);
        let mut body = Vec::new();
        copy(&mut reader, &mut body).unwrap();
        (body, reader.chunk_error())
    };
    (body, error, source.remaining().to_vec())
}

fn document(len: usize) -> Vec<u8> {
    (0..len).map(|i| b"{\"_id\":\"abc\",\"n\":[1,2,3]}"[i % 25]).collect()
}

// =============================================================================
// Known wire images
// =============================================================================

#[test]
fn test_hello_wire_image() {
    let wire = encode(b"Hello", 3, 1, ChunkFraming::Compact);
    assert_eq!(wire, b"3\r\nHel\r\n2\r\nlo\r\n0\r\n");

    let (body, error, rest) = decode(&wire, 1, ChunkFraming::Compact);
    assert_eq!(body, b"Hello");
    assert_eq!(error, None);
    assert!(rest.is_empty());
}

#[test]
fn test_malformed_header_yields_empty_body() {
    let (body, error, _) = decode(b"X\r\n", 16, ChunkFraming::Compact);
    assert!(body.is_empty());
    assert_eq!(
        error,
        Some(ChunkError::Malformed {
            byte: b'X',
            at: ChunkLocation::Header(HeaderState::SkipLeadingWhitespace),
        })
    );
}

#[test]
fn test_lowercase_hex_and_leading_whitespace_are_accepted() {
    let (body, error, _) = decode(b"  a\r\n0123456789\r\n0\r\n", 4, ChunkFraming::Compact);
    assert_eq!(body, b"0123456789");
    assert_eq!(error, None);
}

// =============================================================================
// Chunk-size boundaries
// =============================================================================

#[test]
fn test_round_trip_around_chunk_size() {
    let chunk_size = 16;
    for len in [0, 1, 15, 16, 17, 31, 32, 33, 160, 161] {
        let data = document(len);
        for write_size in [1, 7, 16, 17, 64] {
            let wire = encode(&data, chunk_size, write_size, ChunkFraming::Compact);
            let (body, error, rest) = decode(&wire, 5, ChunkFraming::Compact);
            assert_eq!(body, data, "len {} write_size {}", len, write_size);
            assert_eq!(error, None);
            assert!(rest.is_empty());
        }
    }
}

#[test]
fn test_writes_up_to_chunk_size_never_exceed_it() {
    // A write that exceeds the capacity is the only way to get a bigger chunk
    let data = document(100);
    let wire = encode(&data, 10, 10, ChunkFraming::Compact);

    let expected: Vec<u8> = data
        .chunks(10)
        .flat_map(|c| {
            let mut frame = format!("{:X}\r\n", c.len()).into_bytes();
            frame.extend_from_slice(c);
            frame.extend_from_slice(b"\r\n");
            frame
        })
        .chain(b"0\r\n".iter().copied())
        .collect();
    assert_eq!(wire, expected);
}

// =============================================================================
// Message boundaries on a persistent connection
// =============================================================================

#[test]
fn test_pipelined_response_stays_in_source() {
    let mut wire = encode(b"{\"ok\":true}", 4, 3, ChunkFraming::Compact);
    wire.extend_from_slice(b"HTTP/1.1 200 OK\r\n");

    let (body, error, rest) = decode(&wire, 3, ChunkFraming::Compact);
    assert_eq!(body, b"{\"ok\":true}");
    assert_eq!(error, None);
    assert_eq!(rest, b"HTTP/1.1 200 OK\r\n");
}

#[test]
fn test_rfc7230_pipelined_response_stays_in_source() {
    let mut wire = encode(b"attachment", 4, 4, ChunkFraming::Rfc7230);
    assert!(wire.ends_with(b"\r\n0\r\n\r\n"));
    wire.extend_from_slice(b"HTTP/1.1 201 Created\r\n");

    let (body, error, rest) = decode(&wire, 2, ChunkFraming::Rfc7230);
    assert_eq!(body, b"attachment");
    assert_eq!(error, None);
    assert_eq!(rest, b"HTTP/1.1 201 Created\r\n");
}

#[test]
fn test_two_bodies_back_to_back() {
    let mut wire = encode(b"first", 2, 5, ChunkFraming::Compact);
    wire.extend(encode(b"second", 4, 1, ChunkFraming::Compact));

    let mut source = SliceSource::with_max_span(&wire, 3);
    for expected in [&b"first"[..], &b"second"[..]] {
        let mut reader = ChunkedReader::new(BufferedReader::new(&mut source));
        let mut body = Vec::new();
        reader.read_to_end(&mut body).unwrap();
        assert_eq!(body, expected);
        assert!(!reader.invalid_chunk());
    }
    assert!(source.remaining().is_empty());
}

// =============================================================================
// Properties
// =============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: any body survives encode/decode for any buffer sizing
        /// and any span fragmentation on the read side
        #[test]
        fn prop_round_trip_any_fragmentation(
            data in prop::collection::vec(any::<u8>(), 0..2048),
            chunk_size in 1usize..96,
            write_size in 1usize..128,
            max_span in 1usize..40,
            rfc in any::<bool>(),
        ) {
            let framing = if rfc { ChunkFraming::Rfc7230 } else { ChunkFraming::Compact };
            let wire = encode(&data, chunk_size, write_size, framing);
            let (body, error, rest) = decode(&wire, max_span, framing);

            prop_assert_eq!(body, data);
            prop_assert_eq!(error, None);
            prop_assert!(rest.is_empty());
        }

        /// Property: every strict prefix of a valid body is reported invalid
        #[test]
        fn prop_truncation_is_always_detected(
            data in prop::collection::vec(any::<u8>(), 0..256),
            chunk_size in 1usize..32,
            cut in any::<prop::sample::Index>(),
        ) {
            let wire = encode(&data, chunk_size, chunk_size, ChunkFraming::Compact);
            let cut = cut.index(wire.len());
            let (body, error, _) = decode(&wire[..cut], 7, ChunkFraming::Compact);

            prop_assert!(
                matches!(error, Some(ChunkError::Truncated { .. })),
                "cut at {} of {} gave {:?}",
                cut,
                wire.len(),
                error
            );
            prop_assert!(data.starts_with(&body), "body is not a prefix of the input");
        }
    }
}
