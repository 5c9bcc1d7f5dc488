// AMF0 value

use byteorder::{BigEndian, ByteOrder};

use super::AMFDecodingCursor;

const AMF0_TYPE_NUMBER: u8 = 0x00;
const AMF0_TYPE_BOOL: u8 = 0x01;
const AMF0_TYPE_STRING: u8 = 0x02;
const AMF0_TYPE_OBJECT: u8 = 0x03;
const AMF0_TYPE_NULL: u8 = 0x05;
const AMF0_TYPE_UNDEFINED: u8 = 0x06;
const AMF0_TYPE_ARRAY: u8 = 0x08;
const AMF0_TYPE_LONG_STRING: u8 = 0x0C;

const AMF0_OBJECT_TERM_CODE: u8 = 0x09;

/// AMF0 compatible value
///
/// Object and array properties keep their insertion order, so encoding
/// a value always produces the same bytes.
pub enum AMF0Value {
    Number {
        value: f64,
    },
    Bool {
        value: bool,
    },
    String {
        value: String,
    },
    Object {
        properties: Vec<(String, AMF0Value)>,
    },
    Array {
        items: Vec<(String, AMF0Value)>,
    },
    Null,
    Undefined,
}

impl AMF0Value {
    /// Gets the value as a number, or 0 if it is not a number
    pub fn get_number(&self) -> f64 {
        match self {
            AMF0Value::Number { value } => *value,
            _ => 0.0,
        }
    }

    /// Gets the value as a string, or an empty string if it is not one
    pub fn get_string(&self) -> &str {
        match self {
            AMF0Value::String { value } => value,
            _ => "",
        }
    }

    /// Gets an object property by name
    pub fn get_property(&self, name: &str) -> Option<&AMF0Value> {
        let props = match self {
            AMF0Value::Object { properties } => properties,
            AMF0Value::Array { items } => items,
            _ => return None,
        };

        props.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Encodes the value, appending the bytes to a buffer
    ///
    /// # Arguments
    ///
    /// * `buf` - Buffer to append the bytes to
    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            AMF0Value::Number { value } => {
                buf.push(AMF0_TYPE_NUMBER);

                let mut b = [0; 8];
                BigEndian::write_f64(&mut b, *value);
                buf.extend_from_slice(&b);
            }
            AMF0Value::Bool { value } => {
                buf.push(AMF0_TYPE_BOOL);
                buf.push(if *value { 1 } else { 0 });
            }
            AMF0Value::String { value } => {
                buf.push(AMF0_TYPE_STRING);
                Self::encode_field_name(value, buf);
            }
            AMF0Value::Object { properties } => {
                buf.push(AMF0_TYPE_OBJECT);

                for (name, value) in properties {
                    Self::encode_field_name(name, buf);
                    value.encode(buf);
                }

                buf.extend_from_slice(&[0x00, 0x00, AMF0_OBJECT_TERM_CODE]);
            }
            AMF0Value::Array { items } => {
                buf.push(AMF0_TYPE_ARRAY);

                let mut b = [0; 4];
                BigEndian::write_u32(&mut b, items.len() as u32);
                buf.extend_from_slice(&b);

                for (name, value) in items {
                    Self::encode_field_name(name, buf);
                    value.encode(buf);
                }

                buf.extend_from_slice(&[0x00, 0x00, AMF0_OBJECT_TERM_CODE]);
            }
            AMF0Value::Null => {
                buf.push(AMF0_TYPE_NULL);
            }
            AMF0Value::Undefined => {
                buf.push(AMF0_TYPE_UNDEFINED);
            }
        }
    }

    /// Encodes a field name (2 byte length + bytes)
    fn encode_field_name(name: &str, buf: &mut Vec<u8>) {
        let name_bytes = name.as_bytes();

        let mut b = [0; 2];
        BigEndian::write_u16(&mut b, name_bytes.len() as u16);

        buf.extend_from_slice(&b);
        buf.extend_from_slice(name_bytes);
    }

    /// Reads a value from a buffer
    ///
    /// # Arguments
    ///
    /// * `cursor` - Decoding cursor over the buffer
    /// * `data` - The buffer
    pub fn read(cursor: &mut AMFDecodingCursor, data: &[u8]) -> Result<AMF0Value, ()> {
        let amf_type = cursor.read(data, 1)?[0];

        match amf_type {
            AMF0_TYPE_NUMBER => {
                let b = cursor.read(data, 8)?;

                Ok(AMF0Value::Number {
                    value: BigEndian::read_f64(b),
                })
            }
            AMF0_TYPE_BOOL => {
                let b = cursor.read(data, 1)?;

                Ok(AMF0Value::Bool { value: b[0] != 0 })
            }
            AMF0_TYPE_STRING => Ok(AMF0Value::String {
                value: Self::read_field_name(cursor, data)?,
            }),
            AMF0_TYPE_OBJECT => {
                let mut properties: Vec<(String, AMF0Value)> = Vec::new();

                loop {
                    let name = Self::read_field_name(cursor, data)?;

                    if name.is_empty() && cursor.look(data, 1)?[0] == AMF0_OBJECT_TERM_CODE {
                        cursor.skip(1)?;
                        break;
                    }

                    properties.push((name, AMF0Value::read(cursor, data)?));
                }

                Ok(AMF0Value::Object { properties })
            }
            AMF0_TYPE_ARRAY => {
                cursor.skip(4)?; // Declared item count, not reliable

                let mut items: Vec<(String, AMF0Value)> = Vec::new();

                loop {
                    let name = Self::read_field_name(cursor, data)?;

                    if name.is_empty() && cursor.look(data, 1)?[0] == AMF0_OBJECT_TERM_CODE {
                        cursor.skip(1)?;
                        break;
                    }

                    items.push((name, AMF0Value::read(cursor, data)?));
                }

                Ok(AMF0Value::Array { items })
            }
            AMF0_TYPE_LONG_STRING => {
                let len_bytes = cursor.read(data, 4)?;
                let len = BigEndian::read_u32(len_bytes) as usize;

                let str_bytes = cursor.read(data, len)?;

                Ok(AMF0Value::String {
                    value: String::from_utf8_lossy(str_bytes).to_string(),
                })
            }
            AMF0_TYPE_NULL => Ok(AMF0Value::Null),
            AMF0_TYPE_UNDEFINED => Ok(AMF0Value::Undefined),
            _ => Err(()),
        }
    }

    /// Reads a field name (2 byte length + bytes)
    fn read_field_name(cursor: &mut AMFDecodingCursor, data: &[u8]) -> Result<String, ()> {
        let len_bytes = cursor.read(data, 2)?;
        let len = BigEndian::read_u16(len_bytes) as usize;

        let str_bytes = cursor.read(data, len)?;

        Ok(String::from_utf8_lossy(str_bytes).to_string())
    }
}

// Tests
