//! Wire record framing
//!
//! A record is the frame index as a 32-bit big-endian prefix followed by
//! the opaque codec payload. The transport delivers records whole, so no
//! length field or checksum is carried.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::NetworkError;
use crate::pipeline::EncodedFrame;

/// Bytes occupied by the index prefix
pub const INDEX_BYTES: usize = 4;

/// Serialize an indexed frame into a wire record
pub fn encode(frame: &EncodedFrame) -> Bytes {
    let mut record = BytesMut::with_capacity(INDEX_BYTES + frame.payload.len());
    record.put_u32(frame.index);
    record.extend_from_slice(&frame.payload);
    record.freeze()
}

/// Parse a wire record back into an indexed frame.
///
/// The payload is copied out of `record`: the transport's receive buffer
/// is reused for the next datagram.
pub fn decode(record: &[u8]) -> Result<EncodedFrame, NetworkError> {
    if record.len() < INDEX_BYTES {
        return Err(NetworkError::TruncatedRecord(record.len()));
    }
    let index = u32::from_be_bytes([record[0], record[1], record[2], record[3]]);
    Ok(EncodedFrame {
        index,
        payload: Bytes::copy_from_slice(&record[INDEX_BYTES..]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_index_prefix_big_endian() {
        let frame = EncodedFrame {
            index: 0xDEAD_BEEF,
            payload: Bytes::from_static(&[0x01, 0x02, 0x03]),
        };
        let record = encode(&frame);
        assert_eq!(&record[..], &[0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn round_trips_identity() {
        let frame = EncodedFrame {
            index: 0xDEAD_BEEF,
            payload: Bytes::from_static(&[0x01, 0x02, 0x03]),
        };
        let decoded = decode(&encode(&frame)).unwrap();
        assert_eq!(decoded.index, frame.index);
        assert_eq!(decoded.payload, frame.payload);
    }

    #[test]
    fn round_trips_empty_payload() {
        let frame = EncodedFrame {
            index: u32::MAX,
            payload: Bytes::new(),
        };
        let decoded = decode(&encode(&frame)).unwrap();
        assert_eq!(decoded.index, u32::MAX);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn rejects_truncated_record() {
        assert!(matches!(
            decode(&[0xDE, 0xAD, 0xBE]),
            Err(NetworkError::TruncatedRecord(3))
        ));
    }

    #[test]
    fn payload_survives_buffer_reuse() {
        let mut buf = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x11, 0x22];
        let decoded = decode(&buf).unwrap();
        buf.fill(0);
        assert_eq!(&decoded.payload[..], &[0x11, 0x22]);
    }
}
