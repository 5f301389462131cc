//-
// Copyright (c) 2026, the keywsync authors
//
// This file is part of keywsync.
//
// keywsync is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// keywsync is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// keywsync. If not, see <http://www.gnu.org/licenses/>.

//! A minimal model of the header block of an RFC 5322 message.
//!
//! The block is split into fields, each holding its raw bytes (including
//! continuation lines and line endings), so that serialising an unmodified
//! block reproduces the input byte-for-byte. Nothing beyond the field name is
//! interpreted unless asked for.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::bytes::Regex;

/// The header holding the keyword list.
pub const KEYWORDS: &str = "X-Keywords";

lazy_static! {
    // RFC 5322 3.6.8 "field-name": printable ASCII except ':'
    static ref FIELD_NAME: Regex = Regex::new("^[!-9;-~]+$").unwrap();
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    raw: Vec<u8>,
    /// Length of the name within `raw`, if this is a well-formed field at all.
    name_len: Option<usize>,
}

impl Field {
    /// Build a new single-line field.
    pub fn new(name: &str, value: &str, line_ending: &[u8]) -> Self {
        let mut raw = Vec::with_capacity(
            name.len() + value.len() + 2 + line_ending.len(),
        );
        raw.extend_from_slice(name.as_bytes());
        raw.extend_from_slice(b": ");
        raw.extend_from_slice(value.as_bytes());
        raw.extend_from_slice(line_ending);
        Field {
            raw,
            name_len: Some(name.len()),
        }
    }

    fn parse(raw: &[u8]) -> Self {
        let name_len = memchr::memchr(b':', raw).filter(|&colon| {
            FIELD_NAME.is_match(trim_end_wsp(&raw[..colon]))
        });
        Field {
            raw: raw.to_vec(),
            name_len,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name_len.map(|len| {
            // FIELD_NAME only matches ASCII
            std::str::from_utf8(trim_end_wsp(&self.raw[..len])).unwrap_or("")
        })
    }

    pub fn is(&self, name: &str) -> bool {
        self.name().map_or(false, |n| n.eq_ignore_ascii_case(name))
    }

    /// The unfolded value of the field, without surrounding whitespace.
    pub fn value(&self) -> Option<Cow<'_, [u8]>> {
        let len = self.name_len?;
        let value = trim_wsp(&self.raw[len + 1..]);
        if !value.contains(&b'\r') && !value.contains(&b'\n') {
            return Some(Cow::Borrowed(value));
        }

        Some(Cow::Owned(
            value
                .iter()
                .copied()
                .filter(|&b| b'\r' != b && b'\n' != b)
                .collect(),
        ))
    }

    fn ends_line(&self) -> bool {
        self.raw.ends_with(b"\n")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderBlock {
    fields: Vec<Field>,
    /// The blank line ending the block; empty if the input ended first.
    separator: Vec<u8>,
    body_start: usize,
    line_ending: &'static [u8],
}

impl HeaderBlock {
    /// Split `data` into its header fields and the offset of the body.
    pub fn parse(data: &[u8]) -> Self {
        let mut fields = Vec::<Field>::new();
        let mut separator = Vec::new();
        let mut body_start = data.len();
        let mut line_ending: &'static [u8] = b"\n";
        let mut current: Option<(usize, usize)> = None;

        let mut pos = 0;
        while pos < data.len() {
            let end = memchr::memchr(b'\n', &data[pos..])
                .map_or(data.len(), |ix| pos + ix + 1);
            let line = &data[pos..end];

            if 0 == pos && line.ends_with(b"\r\n") {
                line_ending = b"\r\n";
            }

            if b"\n" == line || b"\r\n" == line {
                separator = line.to_vec();
                body_start = end;
                break;
            }

            let is_continuation =
                line.starts_with(b" ") || line.starts_with(b"\t");
            match current {
                Some((start, _)) if is_continuation => {
                    current = Some((start, end));
                },
                _ => {
                    if let Some((start, field_end)) = current.take() {
                        fields.push(Field::parse(&data[start..field_end]));
                    }
                    current = Some((pos, end));
                },
            }

            pos = end;
        }

        if let Some((start, end)) = current {
            fields.push(Field::parse(&data[start..end]));
        }

        HeaderBlock {
            fields,
            separator,
            body_start,
            line_ending,
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The line ending used by the first line of the message.
    pub fn line_ending(&self) -> &'static [u8] {
        self.line_ending
    }

    /// Whether any line of the block is a well-formed field.
    pub fn has_fields(&self) -> bool {
        self.fields.iter().any(|f| f.name_len.is_some())
    }

    /// Indices of every field called `name`, compared case-insensitively.
    pub fn positions(&self, name: &str) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is(name))
            .map(|(ix, _)| ix)
            .collect()
    }

    /// The values of every field called `name`, in order.
    pub fn values(&self, name: &str) -> Vec<Cow<'_, [u8]>> {
        self.fields
            .iter()
            .filter(|f| f.is(name))
            .filter_map(Field::value)
            .collect()
    }

    pub fn replace(&mut self, ix: usize, field: Field) {
        self.fields[ix] = field;
    }

    pub fn remove(&mut self, ix: usize) {
        self.fields.remove(ix);
    }

    /// Append `field` at the end of the block.
    pub fn push(&mut self, field: Field) {
        let line_ending = self.line_ending;
        if let Some(last) = self.fields.last_mut() {
            if !last.ends_line() {
                last.raw.extend_from_slice(line_ending);
            }
        }
        self.fields.push(field);
    }

    /// Reassemble the message, taking the body from `data`, which must be
    /// what this block was parsed from.
    pub fn serialise(&self, data: &[u8]) -> Vec<u8> {
        let body = &data[self.body_start..];
        let mut out = Vec::with_capacity(
            self.fields.iter().map(|f| f.raw.len()).sum::<usize>()
                + self.separator.len()
                + body.len(),
        );
        for field in &self.fields {
            out.extend_from_slice(&field.raw);
        }
        out.extend_from_slice(&self.separator);
        out.extend_from_slice(body);
        out
    }
}

fn is_wsp(b: u8) -> bool {
    b' ' == b || b'\t' == b || b'\r' == b || b'\n' == b
}

fn trim_end_wsp(s: &[u8]) -> &[u8] {
    let end = s.iter().rposition(|&b| !is_wsp(b)).map_or(0, |ix| ix + 1);
    &s[..end]
}

fn trim_wsp(s: &[u8]) -> &[u8] {
    let s = trim_end_wsp(s);
    let start = s.iter().position(|&b| !is_wsp(b)).unwrap_or(s.len());
    &s[start..]
}
