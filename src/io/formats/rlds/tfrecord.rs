// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! TFRecord framing.
//!
//! Each record is stored as:
//!
//! ```text
//! u64 length (LE) | u32 masked_crc32c(length) | data | u32 masked_crc32c(data)
//! ```

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

const MASK_DELTA: u32 = 0xa282_ead8;

/// CRC32-C with the rotation and offset TFRecord applies.
pub fn masked_crc(data: &[u8]) -> u32 {
    let crc = crc32c::crc32c(data);
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Append one framed record.
pub fn write_record<W: Write>(writer: &mut W, data: &[u8]) -> std::io::Result<()> {
    let len = data.len() as u64;
    writer.write_u64::<LittleEndian>(len)?;
    writer.write_u32::<LittleEndian>(masked_crc(&len.to_le_bytes()))?;
    writer.write_all(data)?;
    writer.write_u32::<LittleEndian>(masked_crc(data))?;
    Ok(())
}

/// Split a TFRecord file into its records, verifying both checksums.
pub fn read_records(bytes: &[u8]) -> Result<Vec<Vec<u8>>, String> {
    let total = bytes.len() as u64;
    let mut cursor = Cursor::new(bytes);
    let mut records = Vec::new();

    while cursor.position() < total {
        let offset = cursor.position();
        let truncated = |_| format!("record at offset {offset} is truncated");

        let len = cursor.read_u64::<LittleEndian>().map_err(truncated)?;
        let len_crc = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
        if len_crc != masked_crc(&len.to_le_bytes()) {
            return Err(format!("length checksum mismatch at offset {offset}"));
        }
        if len > total - cursor.position() {
            return Err(format!("record at offset {offset} is truncated"));
        }

        let mut data = vec![0u8; len as usize];
        cursor.read_exact(&mut data).map_err(truncated)?;
        let data_crc = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
        if data_crc != masked_crc(&data) {
            return Err(format!("data checksum mismatch at offset {offset}"));
        }
        records.push(data);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_crc_known_value() {
        // crc32c("") == 0, so the masked value is the delta itself
        assert_eq!(masked_crc(b""), MASK_DELTA);
        assert_eq!(crc32c::crc32c(b"123456789"), 0xe306_9283);
    }

    #[test]
    fn test_records_round_trip() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"first").unwrap();
        write_record(&mut buf, b"").unwrap();
        write_record(&mut buf, b"third record").unwrap();
        assert_eq!(buf.len(), 3 * 16 + 5 + 12);

        let records = read_records(&buf).unwrap();
        assert_eq!(records, vec![b"first".to_vec(), Vec::new(), b"third record".to_vec()]);
    }

    #[test]
    fn test_corruption_detected() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"payload").unwrap();

        let mut flipped = buf.clone();
        flipped[14] ^= 0xff;
        assert!(read_records(&flipped).unwrap_err().contains("data checksum"));

        let mut bad_len = buf.clone();
        bad_len[0] ^= 0x01;
        assert!(read_records(&bad_len).unwrap_err().contains("length checksum"));

        assert!(read_records(&buf[..buf.len() - 2]).unwrap_err().contains("truncated"));
    }

    #[test]
    fn test_empty_file_has_no_records() {
        assert!(read_records(&[]).unwrap().is_empty());
    }
}
