//! Little-endian scalar readers and writers for the checkpoint formats.

use std::io::{BufRead, Write};

/// Number of 32-bit integers in a file header.
pub const HEADER_INTS: usize = 256;

/// Reads a fixed-size buffer of bytes.
pub fn read_bytes<const N: usize>(reader: &mut dyn BufRead) -> Result<[u8; N], std::io::Error> {
    let mut bytes = [0u8; N];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Reads a single `i32`.
pub fn read_i32(reader: &mut dyn BufRead) -> Result<i32, std::io::Error> {
    Ok(i32::from_le_bytes(read_bytes::<4>(reader)?))
}

/// Reads the 1024-byte header shared by the model and vocabulary formats.
pub fn read_header(reader: &mut dyn BufRead) -> Result<[i32; HEADER_INTS], std::io::Error> {
    let bytes = read_bytes::<1024>(reader)?;
    let mut header = [0i32; HEADER_INTS];
    for (i, value) in header.iter_mut().enumerate() {
        *value = i32::from_le_bytes([
            bytes[4 * i],
            bytes[4 * i + 1],
            bytes[4 * i + 2],
            bytes[4 * i + 3],
        ]);
    }
    Ok(header)
}

/// Writes a single `i32`.
pub fn write_i32(writer: &mut dyn Write, value: i32) -> Result<(), std::io::Error> {
    writer.write_all(&value.to_le_bytes())
}

/// Writes a single `f32`.
pub fn write_f32(writer: &mut dyn Write, value: f32) -> Result<(), std::io::Error> {
    writer.write_all(&value.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_roundtrip() {
        let mut data = vec![];
        for i in 0..HEADER_INTS as i32 {
            write_i32(&mut data, i * 3 - 7).unwrap();
        }
        let header = read_header(&mut Cursor::new(data)).unwrap();
        assert_eq!(header[0], -7);
        assert_eq!(header[255], 255 * 3 - 7);
    }

    #[test]
    fn short_header_is_an_error() {
        let data = vec![0u8; 1023];
        assert!(read_header(&mut Cursor::new(data)).is_err());
    }
}
