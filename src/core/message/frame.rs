/*!
Length-prefixed framing.

A frame is a 4-byte big-endian payload length followed by the payload.
Empty frames and frames above the configured limit are rejected.
*/

use byteorder::{BigEndian, ByteOrder};

use crate::core::{
    constants::{FRAME_HEADER_SIZE, MAX_FRAME_SIZE},
    error::{Error, Result},
};

/// Encode the header for a payload of `len` bytes
pub fn encode_header(len: usize, max_len: usize) -> Result<[u8; FRAME_HEADER_SIZE]> {
    check_len(len, max_len)?;
    let mut header = [0u8; FRAME_HEADER_SIZE];
    BigEndian::write_u32(&mut header, len as u32);
    Ok(header)
}

/// Parse a frame header, returning the payload length
pub fn decode_header(header: &[u8; FRAME_HEADER_SIZE], max_len: usize) -> Result<usize> {
    let len = BigEndian::read_u32(header) as usize;
    check_len(len, max_len)?;
    Ok(len)
}

fn check_len(len: usize, max_len: usize) -> Result<()> {
    let max_len = max_len.min(MAX_FRAME_SIZE);
    if len == 0 {
        return Err(Error::InvalidFormat("Empty frame".into()));
    }
    if len > max_len {
        return Err(Error::InvalidFormat(format!(
            "Frame of {} bytes exceeds limit of {}",
            len, max_len
        )));
    }
    Ok(())
}

/// Header and payload in one buffer
pub fn encode(payload: &[u8], max_len: usize) -> Result<Vec<u8>> {
    let header = encode_header(payload.len(), max_len)?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(payload);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_big_endian() {
        let frame = encode(&[7u8; 258], MAX_FRAME_SIZE).unwrap();
        assert_eq!(&frame[..4], &[0, 0, 1, 2]);
        assert_eq!(frame.len(), 262);
    }

    #[test]
    fn test_limits() {
        assert!(encode(&[], MAX_FRAME_SIZE).is_err());
        assert!(encode(&vec![0u8; MAX_FRAME_SIZE], MAX_FRAME_SIZE).is_ok());
        assert!(encode(&vec![0u8; MAX_FRAME_SIZE + 1], usize::MAX).is_err());
        assert!(decode_header(&[0, 0, 0x20, 0x01], 8192).is_err());
        assert_eq!(decode_header(&[0, 0, 0x20, 0x00], 8192).unwrap(), 8192);
    }
}
