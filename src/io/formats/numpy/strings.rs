// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Fixed-width NumPy string arrays.
//!
//! Strings are written as `<U{n}`: UCS-4 little-endian code points, each
//! element padded with NULs to the widest string. Loading also accepts
//! big-endian `>U{n}` and byte strings `|S{n}`. Trailing NULs are padding
//! and are stripped, as NumPy does.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

const MAGIC: &[u8] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;

/// Parsed `.npy` header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    descr: String,
    fortran_order: bool,
    shape: Vec<usize>,
}

/// Element layout of a string descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Ucs4 { chars: usize, big_endian: bool },
    Bytes { len: usize },
}

impl Layout {
    fn parse(descr: &str) -> Option<Self> {
        let mut chars = descr.chars();
        let order = chars.next()?;
        let kind = chars.next()?;
        let width: usize = chars.as_str().parse().ok()?;
        match (order, kind) {
            ('<' | '=' | '|', 'U') => Some(Layout::Ucs4 {
                chars: width,
                big_endian: false,
            }),
            ('>', 'U') => Some(Layout::Ucs4 {
                chars: width,
                big_endian: true,
            }),
            (_, 'S' | 'a') => Some(Layout::Bytes { len: width }),
            _ => None,
        }
    }

    fn item_size(self) -> Option<usize> {
        match self {
            Layout::Ucs4 { chars, .. } => chars.checked_mul(4),
            Layout::Bytes { len } => Some(len),
        }
    }
}

// =============================================================================
// Header
// =============================================================================

/// Split an `.npy` file into its header and payload.
fn split(bytes: &[u8]) -> Option<(Header, &[u8])> {
    if !bytes.starts_with(MAGIC) || bytes.len() < 10 {
        return None;
    }
    let (header_len, offset): (usize, usize) = match bytes[6] {
        1 => (LittleEndian::read_u16(&bytes[8..10]) as usize, 10),
        2 | 3 if bytes.len() >= 12 => (LittleEndian::read_u32(&bytes[8..12]) as usize, 12),
        _ => return None,
    };
    let end = offset.checked_add(header_len)?;
    let text = std::str::from_utf8(bytes.get(offset..end)?).ok()?;
    Some((parse_header(text)?, &bytes[end..]))
}

/// Read the three keys of a header dict such as
/// `{'descr': '<U5', 'fortran_order': False, 'shape': (2, 3), }`.
fn parse_header(text: &str) -> Option<Header> {
    let descr = {
        let rest = after_key(text, "descr")?;
        let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
        let body = &rest[1..];
        body[..body.find(quote)?].to_string()
    };
    let fortran_order = after_key(text, "fortran_order")?.starts_with("True");
    let shape = {
        let rest = after_key(text, "shape")?.strip_prefix('(')?;
        let body = &rest[..rest.find(')')?];
        body.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_end_matches('L').parse().ok())
            .collect::<Option<Vec<usize>>>()?
    };
    Some(Header {
        descr,
        fortran_order,
        shape,
    })
}

fn after_key<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let start = text
        .find(&format!("'{key}'"))
        .or_else(|| text.find(&format!("\"{key}\"")))?;
    let rest = &text[start + key.len() + 2..];
    Some(rest.trim_start().strip_prefix(':')?.trim_start())
}

fn shape_repr(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => {
            let parts: Vec<String> = dims.iter().map(usize::to_string).collect();
            format!("({})", parts.join(", "))
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a string array, or `Ok(None)` when the file holds another dtype.
pub(super) fn decode(bytes: &[u8]) -> Result<Option<(Vec<usize>, Vec<String>)>, String> {
    let Some((header, payload)) = split(bytes) else {
        return Ok(None);
    };
    let Some(layout) = Layout::parse(&header.descr) else {
        return Ok(None);
    };

    let count = header
        .shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| format!("shape {:?} is too large", header.shape))?;
    let item = layout
        .item_size()
        .ok_or_else(|| format!("descriptor {} is too wide", header.descr))?;
    let expected = count
        .checked_mul(item)
        .ok_or_else(|| format!("shape {:?} is too large", header.shape))?;
    if payload.len() != expected {
        return Err(format!(
            "{} payload is {} bytes, expected {expected}",
            header.descr,
            payload.len()
        ));
    }

    let mut strings = Vec::new();
    strings
        .try_reserve_exact(count)
        .map_err(|e| format!("cannot allocate {count} strings: {e}"))?;
    for i in 0..count {
        strings.push(decode_element(&payload[i * item..(i + 1) * item], layout)?);
    }

    if header.fortran_order && header.shape.len() > 1 {
        strings = fortran_to_c(&header.shape, strings);
    }
    Ok(Some((header.shape, strings)))
}

fn decode_element(raw: &[u8], layout: Layout) -> Result<String, String> {
    match layout {
        Layout::Ucs4 { big_endian, .. } => {
            let mut s = String::new();
            for unit in raw.chunks_exact(4) {
                let code = if big_endian {
                    BigEndian::read_u32(unit)
                } else {
                    LittleEndian::read_u32(unit)
                };
                let c = char::from_u32(code)
                    .ok_or_else(|| format!("invalid code point {code:#x}"))?;
                s.push(c);
            }
            Ok(s.trim_end_matches('\0').to_string())
        }
        Layout::Bytes { .. } => {
            let end = raw.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
            String::from_utf8(raw[..end].to_vec()).map_err(|e| e.to_string())
        }
    }
}

/// Reorder column-major elements into row-major order.
fn fortran_to_c(shape: &[usize], column_major: Vec<String>) -> Vec<String> {
    let mut strides = vec![1usize; shape.len()];
    for d in 1..shape.len() {
        strides[d] = strides[d - 1] * shape[d - 1];
    }
    let mut source: Vec<Option<String>> = column_major.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(source.len());
    let mut coords = vec![0usize; shape.len()];
    for _ in 0..source.len() {
        let offset: usize = coords.iter().zip(&strides).map(|(c, s)| c * s).sum();
        out.push(source[offset].take().unwrap_or_default());
        for d in (0..shape.len()).rev() {
            coords[d] += 1;
            if coords[d] < shape[d] {
                break;
            }
            coords[d] = 0;
        }
    }
    out
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode strings as a version 1.0 `.npy` file with a `<U{n}` dtype.
pub(super) fn encode(shape: &[usize], strings: &[String]) -> Result<Vec<u8>, String> {
    let width = strings
        .iter()
        .map(|s| s.chars().count())
        .max()
        .unwrap_or(0)
        .max(1);

    let mut header = format!(
        "{{'descr': '<U{width}', 'fortran_order': False, 'shape': {}, }}",
        shape_repr(shape)
    );
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    header.push_str(&" ".repeat((ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT));
    header.push('\n');
    let header_len = u16::try_from(header.len())
        .map_err(|_| format!("header for shape {shape:?} is too long"))?;

    let payload_len = strings
        .len()
        .checked_mul(width * 4)
        .ok_or_else(|| format!("{} strings of width {width} are too large", strings.len()))?;
    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + payload_len);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    let mut len_bytes = [0u8; 2];
    LittleEndian::write_u16(&mut len_bytes, header_len);
    out.extend_from_slice(&len_bytes);
    out.extend_from_slice(header.as_bytes());

    let mut unit = [0u8; 4];
    for s in strings {
        let mut written = 0;
        for c in s.chars() {
            LittleEndian::write_u32(&mut unit, c as u32);
            out.extend_from_slice(&unit);
            written += 1;
        }
        out.resize(out.len() + (width - written) * 4, 0);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_aligned() {
        let bytes = encode(&[2], &["pick".to_string(), "place".to_string()]).unwrap();
        let header_len = LittleEndian::read_u16(&bytes[8..10]) as usize;
        assert_eq!((10 + header_len) % ALIGNMENT, 0);
        assert_eq!(bytes.len(), 10 + header_len + 2 * 5 * 4);

        let (header, _) = split(&bytes).unwrap();
        assert_eq!(header.descr, "<U5");
        assert_eq!(header.shape, vec![2]);
        assert!(!header.fortran_order);
    }

    #[test]
    fn test_decode_strips_padding() {
        let strings = vec!["a".to_string(), "grasp".to_string(), "ü→".to_string()];
        let bytes = encode(&[3], &strings).unwrap();
        let (shape, decoded) = decode(&bytes).unwrap().unwrap();
        assert_eq!(shape, vec![3]);
        assert_eq!(decoded, strings);
    }

    #[test]
    fn test_scalar_shape() {
        let bytes = encode(&[], &["pick_and_place".to_string()]).unwrap();
        let (shape, decoded) = decode(&bytes).unwrap().unwrap();
        assert!(shape.is_empty());
        assert_eq!(decoded, vec!["pick_and_place".to_string()]);
    }

    #[test]
    fn test_byte_strings_and_fortran_order() {
        let header = "{'descr': '|S2', 'fortran_order': True, 'shape': (2, 2), }";
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0, header.len() as u8, 0]);
        bytes.extend_from_slice(header.as_bytes());
        // Column-major: a, c, b, d
        bytes.extend_from_slice(b"a\0c\0b\0dd");

        let (shape, decoded) = decode(&bytes).unwrap().unwrap();
        assert_eq!(shape, vec![2, 2]);
        assert_eq!(decoded, vec!["a", "b", "c", "dd"]);
    }

    #[test]
    fn test_numeric_descr_is_skipped() {
        let header = "{'descr': '<f8', 'fortran_order': False, 'shape': (1,), }";
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0, header.len() as u8, 0]);
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&1.0f64.to_le_bytes());
        assert_eq!(decode(&bytes).unwrap(), None);
    }

    #[test]
    fn test_truncated_payload_fails() {
        let mut bytes = encode(&[2], &["ab".to_string(), "cd".to_string()]).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(decode(&bytes).is_err());
    }
}
