//! Data section decoding for MaxMind DB files
//!
//! Decodes the typed, self-describing records stored in the data section
//! (and the metadata block) of an MMDB file into [`DataValue`] trees.
//!
//! # Supported Types
//!
//! - **Pointer**: Reference to another data item, followed transparently
//! - **String**: UTF-8 text data
//! - **Double**: 64-bit floating point (IEEE 754)
//! - **Bytes**: Raw byte arrays
//! - **Uint16** / **Uint32** / **Uint64** / **Uint128**: Unsigned integers
//! - **Map**: Key-value pairs (string keys)
//! - **Int32**: Signed 32-bit integers
//! - **Array**: Ordered lists of values
//! - **Bool**: Boolean values
//! - **Float**: 32-bit floating point (IEEE 754)
//!
//! # Format
//!
//! Each field starts with a control byte: the top 3 bits carry the type and
//! the low 5 bits the payload size. Type 0 means "extended": the real type is
//! `7 + next byte`. Sizes 29, 30 and 31 are followed by 1, 2 or 3 extra size
//! bytes. Integers use as few big-endian bytes as needed.
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use serde_json::json;
use std::collections::HashMap;

/// Maximum nesting of maps, arrays and pointers before decoding gives up.
const MAX_DEPTH: usize = 512;

/// A decoded value from the data section
///
/// Pointers never appear here: the decoder resolves them while walking.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Raw byte array
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map (string keys only)
    Map(HashMap<String, DataValue>),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue>),
    /// Boolean value
    Bool(bool),
    /// IEEE 754 single precision float
    Float(f32),
}

impl DataValue {
    /// Look up a key if this value is a map
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        match self {
            DataValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Unsigned integer view of any of the unsigned integer variants
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::Uint16(n) => Some(*n as u64),
            DataValue::Uint32(n) => Some(*n as u64),
            DataValue::Uint64(n) => Some(*n),
            DataValue::Uint128(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// String view if this value is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a JSON value
    ///
    /// `Uint128` is emitted as a decimal string since JSON numbers cannot
    /// hold it losslessly.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            DataValue::String(s) => json!(s),
            DataValue::Double(d) => json!(d),
            DataValue::Bytes(b) => json!(b),
            DataValue::Uint16(u) => json!(u),
            DataValue::Uint32(u) => json!(u),
            DataValue::Uint64(u) => json!(u),
            DataValue::Uint128(u) => json!(u.to_string()),
            DataValue::Int32(i) => json!(i),
            DataValue::Bool(b) => json!(b),
            DataValue::Float(f) => json!(f),
            DataValue::Map(entries) => {
                let mut map = serde_json::Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(map)
            }
            DataValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(DataValue::to_json).collect())
            }
        }
    }
}

/// Data section decoder
///
/// Decodes values from an encoded data section buffer. Pointers are
/// resolved relative to the start of `buffer`.
pub struct DataDecoder<'a> {
    buffer: &'a [u8],
    base_offset: usize,
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder for a data section
    ///
    /// # Arguments
    /// * `buffer` - The encoded data buffer
    /// * `base_offset` - Subtracted from offsets passed to [`decode`](Self::decode)
    pub fn new(buffer: &'a [u8], base_offset: usize) -> Self {
        Self {
            buffer,
            base_offset,
        }
    }

    /// Decode a value at the given offset
    pub fn decode(&self, offset: u32) -> Result<DataValue, &'static str> {
        let mut cursor = offset as usize;
        if cursor < self.base_offset {
            return Err("Offset before base");
        }
        cursor -= self.base_offset;
        self.decode_at(&mut cursor, 0)
    }

    fn decode_at(&self, cursor: &mut usize, depth: usize) -> Result<DataValue, &'static str> {
        if depth > MAX_DEPTH {
            return Err("Data nested too deeply");
        }

        let ctrl = self.read_byte(cursor)?;
        let mut type_id = ctrl >> 5;
        let size_bits = ctrl & 0x1F;

        if type_id == 1 {
            let target = self.decode_pointer(cursor, size_bits)?;
            return self.decode_pointee(target, depth);
        }

        if type_id == 0 {
            let ext = self.read_byte(cursor)?;
            type_id = ext.checked_add(7).ok_or("Unknown extended type")?;
            if type_id < 8 {
                return Err("Invalid extended type");
            }
        }

        let size = self.decode_size(cursor, size_bits)?;

        match type_id {
            2 => self.decode_string(cursor, size),
            3 => self.decode_double(cursor, size),
            4 => self.decode_bytes(cursor, size),
            5 => Ok(DataValue::Uint16(self.decode_uint(cursor, size, 2)? as u16)),
            6 => Ok(DataValue::Uint32(self.decode_uint(cursor, size, 4)? as u32)),
            7 => self.decode_map(cursor, size, depth),
            // Short encodings zero-extend; only a full 4 bytes can carry the sign
            8 => Ok(DataValue::Int32(self.decode_uint(cursor, size, 4)? as u32 as i32)),
            9 => Ok(DataValue::Uint64(self.decode_uint(cursor, size, 8)? as u64)),
            10 => Ok(DataValue::Uint128(self.decode_uint(cursor, size, 16)?)),
            11 => self.decode_array(cursor, size, depth),
            12 | 13 => Err("Unsupported data type"),
            14 => match size {
                0 => Ok(DataValue::Bool(false)),
                1 => Ok(DataValue::Bool(true)),
                _ => Err("Invalid bool size"),
            },
            15 => self.decode_float(cursor, size),
            _ => Err("Unknown extended type"),
        }
    }

    /// Decode the value a pointer refers to; the cursor of the caller is
    /// left just past the pointer itself.
    fn decode_pointee(&self, target: usize, depth: usize) -> Result<DataValue, &'static str> {
        let first = *self.buffer.get(target).ok_or("Pointer out of bounds")?;
        if first >> 5 == 1 {
            return Err("Pointer to pointer");
        }
        let mut cursor = target;
        self.decode_at(&mut cursor, depth + 1)
    }

    fn decode_pointer(&self, cursor: &mut usize, payload: u8) -> Result<usize, &'static str> {
        let size_bits = (payload >> 3) & 0x3;
        let vvv = (payload & 0x7) as usize;
        let bytes = self.take(cursor, size_bits as usize + 1)?;

        let offset = match size_bits {
            0 => (vvv << 8) | bytes[0] as usize,
            1 => 2048 + ((vvv << 16) | (bytes[0] as usize) << 8 | bytes[1] as usize),
            2 => {
                526_336
                    + ((vvv << 24)
                        | (bytes[0] as usize) << 16
                        | (bytes[1] as usize) << 8
                        | bytes[2] as usize)
            }
            _ => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize,
        };

        Ok(offset)
    }

    fn decode_string(&self, cursor: &mut usize, len: usize) -> Result<DataValue, &'static str> {
        let bytes = self.take(cursor, len)?;
        let s = std::str::from_utf8(bytes).map_err(|_| "Invalid UTF-8")?;
        Ok(DataValue::String(s.to_string()))
    }

    fn decode_double(&self, cursor: &mut usize, size: usize) -> Result<DataValue, &'static str> {
        if size != 8 {
            return Err("Invalid double size");
        }
        let bytes = self.take(cursor, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(DataValue::Double(f64::from_be_bytes(buf)))
    }

    fn decode_float(&self, cursor: &mut usize, size: usize) -> Result<DataValue, &'static str> {
        if size != 4 {
            return Err("Invalid float size");
        }
        let bytes = self.take(cursor, 4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(DataValue::Float(f32::from_be_bytes(buf)))
    }

    fn decode_bytes(&self, cursor: &mut usize, len: usize) -> Result<DataValue, &'static str> {
        Ok(DataValue::Bytes(self.take(cursor, len)?.to_vec()))
    }

    /// Big-endian unsigned integer of `size` bytes, at most `max_size`
    fn decode_uint(
        &self,
        cursor: &mut usize,
        size: usize,
        max_size: usize,
    ) -> Result<u128, &'static str> {
        if size > max_size {
            return Err("Integer too large for its type");
        }
        let bytes = self.take(cursor, size)?;
        Ok(bytes.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128))
    }

    fn decode_map(
        &self,
        cursor: &mut usize,
        count: usize,
        depth: usize,
    ) -> Result<DataValue, &'static str> {
        // Each entry needs at least two bytes, so cap preallocation by what remains
        let remaining = self.buffer.len().saturating_sub(*cursor);
        let mut map = HashMap::with_capacity(count.min(remaining / 2));

        for _ in 0..count {
            let key = match self.decode_at(cursor, depth + 1)? {
                DataValue::String(s) => s,
                _ => return Err("Map key must be string"),
            };

            let value = self.decode_at(cursor, depth + 1)?;
            map.insert(key, value);
        }

        Ok(DataValue::Map(map))
    }

    fn decode_array(
        &self,
        cursor: &mut usize,
        count: usize,
        depth: usize,
    ) -> Result<DataValue, &'static str> {
        let remaining = self.buffer.len().saturating_sub(*cursor);
        let mut array = Vec::with_capacity(count.min(remaining));

        for _ in 0..count {
            array.push(self.decode_at(cursor, depth + 1)?);
        }

        Ok(DataValue::Array(array))
    }

    fn decode_size(&self, cursor: &mut usize, size_bits: u8) -> Result<usize, &'static str> {
        match size_bits {
            0..=28 => Ok(size_bits as usize),
            29 => {
                let b = self.take(cursor, 1)?;
                Ok(29 + b[0] as usize)
            }
            30 => {
                let b = self.take(cursor, 2)?;
                Ok(285 + u16::from_be_bytes([b[0], b[1]]) as usize)
            }
            _ => {
                let b = self.take(cursor, 3)?;
                Ok(65_821 + ((b[0] as usize) << 16 | (b[1] as usize) << 8 | b[2] as usize))
            }
        }
    }

    fn read_byte(&self, cursor: &mut usize) -> Result<u8, &'static str> {
        let byte = *self.buffer.get(*cursor).ok_or("Cursor out of bounds")?;
        *cursor += 1;
        Ok(byte)
    }

    fn take(&self, cursor: &mut usize, len: usize) -> Result<&'a [u8], &'static str> {
        let end = cursor.checked_add(len).ok_or("Length overflow")?;
        let bytes = self.buffer.get(*cursor..end).ok_or("Data out of bounds")?;
        *cursor = end;
        Ok(bytes)
    }
}
