//! Small writers functions to be used in file format writers.

use std::io::{Result, Write};

/// Number of zero bytes needed to reach the next 4-bytes boundary.
#[must_use]
pub const fn padding4(len: usize) -> usize {
    (4 - (len % 4)) % 4
}

/// Writes `count` zero bytes in given output.
pub fn zeros<W: Write>(output: &mut W, count: usize) -> Result<usize> {
    output.write_all(&vec![0; count])?;
    Ok(count)
}

/// Writes a bytes buffer in given output.
pub fn bytes<W: Write>(output: &mut W, bytes: &[u8]) -> Result<usize> {
    output.write_all(bytes)?;
    Ok(bytes.len())
}

/// Writes a u8 in given output.
pub fn le_u8<W: Write>(output: &mut W, v: u8) -> Result<usize> {
    bytes(output, &[v])
}

/// Writes a u16 in given output.
pub fn le_u16<W: Write>(output: &mut W, v: u16) -> Result<usize> {
    bytes(output, &v.to_le_bytes())
}

/// Writes a u32 in given output.
pub fn le_u32<W: Write>(output: &mut W, v: u32) -> Result<usize> {
    bytes(output, &v.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_writer() {
        let mut buf = Vec::new();
        assert_eq!(bytes(&mut buf, b"hello").unwrap(), 5);
        assert_eq!(zeros(&mut buf, 3).unwrap(), 3);
        assert_eq!(buf, b"hello\0\0\0".to_vec());
    }

    #[test]
    fn le_u8_writer() {
        let mut buf = Vec::new();
        assert!(le_u8(&mut buf, 40u8).is_ok());
        assert_eq!(buf, vec![40]);
    }

    #[test]
    fn le_u16_writer() {
        let mut buf = Vec::new();
        assert!(le_u16(&mut buf, 0x88b8u16).is_ok());
        assert_eq!(buf, vec![0xb8, 0x88]);
    }

    #[test]
    fn le_u32_writer() {
        let mut buf = Vec::new();
        assert!(le_u32(&mut buf, 0x12345678u32).is_ok());
        assert_eq!(buf, vec![0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn padding4_values() {
        assert_eq!(padding4(0), 0);
        assert_eq!(padding4(1), 3);
        assert_eq!(padding4(6), 2);
        assert_eq!(padding4(8), 0);
    }
}
