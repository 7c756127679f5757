//! # Record Line Codec
//!
//! Encodes one record as one line of the observation log and decodes it back.
//!
//! ## Line Format
//!
//! - A single JSON object, no trailing newline (the log adds it).
//! - `", "` between items and `": "` between key and value.
//! - ASCII only: every character outside `0x20..=0x7e` is written as a
//!   lowercase `\uXXXX` escape, using surrogate pairs above the BMP.
//!
//! Keys are written in the record's insertion order.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use webwatch_core::MetaInfo;

/// `serde_json` formatter producing the log line layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFormatter;

impl Formatter for RecordFormatter {
    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        if fragment.bytes().all(is_plain_ascii) {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if c.is_ascii() && is_plain_ascii(c as u8) {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

fn is_plain_ascii(b: u8) -> bool {
    (0x20..=0x7e).contains(&b)
}

/// Encode a value as a single log line (no newline).
pub fn encode_line<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::with_capacity(256);
    let mut ser = Serializer::with_formatter(&mut out, RecordFormatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

/// Decode one log line into a record.
pub fn decode_line(line: &str) -> Result<MetaInfo, serde_json::Error> {
    serde_json::from_str(line)
}
