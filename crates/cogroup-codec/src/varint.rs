//! Order-preserving variable-length integers.
//!
//! Layout: one header byte, then `n` (0..=8) big-endian payload bytes.
//!
//! - `v >= 0`: header `0x80 + n`, payload = the `n` significant bytes of `v`.
//! - `v < 0`: with `m = !v` (= -v-1), header `0x7F - n`, payload = the `n`
//!   significant bytes of `m`, each bit-inverted.
//!
//! Unsigned byte-lexicographic order of encodings equals numeric order of
//! values, and the header alone gives the encoded length.

use cogroup_core::error::{Error, Result};

pub const MAX_VARINT_LEN: usize = 9;

const NON_NEGATIVE_BASE: u8 = 0x80;
const NEGATIVE_BASE: u8 = 0x7F;

fn significant_bytes(m: u64) -> usize {
    (64 - m.leading_zeros() as usize + 7) / 8
}

pub fn write_varint(out: &mut Vec<u8>, v: i64) {
    if v >= 0 {
        let m = v as u64;
        let n = significant_bytes(m);
        out.push(NON_NEGATIVE_BASE + n as u8);
        out.extend_from_slice(&m.to_be_bytes()[8 - n..]);
    } else {
        let m = !v as u64;
        let n = significant_bytes(m);
        out.push(NEGATIVE_BASE - n as u8);
        out.extend_from_slice(&(!m).to_be_bytes()[8 - n..]);
    }
}

/// Total encoded length announced by a header byte.
pub fn len_from_header(header: u8) -> Result<usize> {
    let n = if header >= NON_NEGATIVE_BASE {
        (header - NON_NEGATIVE_BASE) as usize
    } else {
        (NEGATIVE_BASE - header) as usize
    };
    if n > 8 {
        return Err(Error::Codec(format!("invalid varint header 0x{header:02x}")));
    }
    Ok(1 + n)
}

/// Encoded length of the varint starting at `pos`, checked against the buffer.
pub fn varint_len(buf: &[u8], pos: usize) -> Result<usize> {
    let header = *buf
        .get(pos)
        .ok_or_else(|| Error::Codec(format!("varint truncated at offset {pos}")))?;
    let len = len_from_header(header)?;
    if pos + len > buf.len() {
        return Err(Error::Codec(format!(
            "varint at offset {pos} needs {len} bytes, {} available",
            buf.len() - pos
        )));
    }
    Ok(len)
}

/// Decode the varint at `pos`; returns `(value, bytes consumed)`.
pub fn read_varint(buf: &[u8], pos: usize) -> Result<(i64, usize)> {
    let len = varint_len(buf, pos)?;
    let header = buf[pos];
    let payload = &buf[pos + 1..pos + len];

    let mut be = [0u8; 8];
    be[8 - payload.len()..].copy_from_slice(payload);
    if header >= NON_NEGATIVE_BASE {
        let m = u64::from_be_bytes(be);
        let v = i64::try_from(m)
            .map_err(|_| Error::Codec(format!("varint at offset {pos} overflows i64")))?;
        Ok((v, len))
    } else {
        for b in &mut be[8 - payload.len()..] {
            *b = !*b;
        }
        let m = u64::from_be_bytes(be);
        let m = i64::try_from(m)
            .map_err(|_| Error::Codec(format!("varint at offset {pos} overflows i64")))?;
        Ok((!m, len))
    }
}

/// Decode a varint that must fit an `i32`.
pub fn read_varint_i32(buf: &[u8], pos: usize) -> Result<(i32, usize)> {
    let (v, len) = read_varint(buf, pos)?;
    let v = i32::try_from(v)
        .map_err(|_| Error::Codec(format!("varint {v} at offset {pos} overflows i32")))?;
    Ok((v, len))
}

/// Decode a varint that must be a non-negative length/ordinal no larger than `max`.
pub fn read_len(buf: &[u8], pos: usize, max: usize) -> Result<(usize, usize)> {
    let (v, len) = read_varint(buf, pos)?;
    if v < 0 || v as u64 > max as u64 {
        return Err(Error::Codec(format!(
            "length {v} at offset {pos} outside 0..={max}"
        )));
    }
    Ok((v as usize, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn enc(v: i64) -> Vec<u8> {
        let mut out = Vec::new();
        write_varint(&mut out, v);
        out
    }

    #[test]
    fn small_values_are_short() {
        assert_eq!(enc(0), vec![0x80]);
        assert_eq!(enc(-1), vec![0x7F]);
        assert_eq!(enc(1), vec![0x81, 0x01]);
        assert_eq!(enc(-2), vec![0x7E, 0xFE]);
        assert_eq!(enc(i64::MAX).len(), MAX_VARINT_LEN);
        assert_eq!(enc(i64::MIN).len(), MAX_VARINT_LEN);
    }

    #[test]
    fn extremes_decode() {
        for v in [i64::MIN, i64::MIN + 1, -256, -255, -1, 0, 255, 256, i64::MAX] {
            let bytes = enc(v);
            assert_eq!(read_varint(&bytes, 0).unwrap(), (v, bytes.len()));
        }
    }

    #[test]
    fn truncated_and_bad_headers_fail() {
        assert!(read_varint(&[0x82, 0x01], 0).is_err());
        assert!(read_varint(&[], 0).is_err());
        assert!(len_from_header(0x89).is_err());
        assert!(len_from_header(0x76).is_err());
    }

    #[test]
    fn i32_and_len_bounds() {
        let big = enc(i64::from(i32::MAX) + 1);
        assert!(read_varint_i32(&big, 0).is_err());
        assert!(read_len(&enc(-1), 0, 10).is_err());
        assert!(read_len(&enc(11), 0, 10).is_err());
        assert_eq!(read_len(&enc(10), 0, 10).unwrap(), (10, 2));
    }

    proptest! {
        #[test]
        fn byte_order_matches_numeric_order(a in any::<i64>(), b in any::<i64>()) {
            prop_assert_eq!(enc(a).cmp(&enc(b)), a.cmp(&b));
        }

        #[test]
        fn decodes_what_it_encodes(v in any::<i64>()) {
            let bytes = enc(v);
            prop_assert_eq!(varint_len(&bytes, 0).unwrap(), bytes.len());
            prop_assert_eq!(read_varint(&bytes, 0).unwrap(), (v, bytes.len()));
        }
    }
}
