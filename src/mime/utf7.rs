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

//! IMAP "modified UTF-7" (RFC 3501 section 5.1.3).
//!
//! Mail synchronisers such as offlineimap store IMAP keywords verbatim in the
//! `X-Keywords` header, so non-ASCII labels arrive in this encoding.

use std::borrow::Cow;

const SHIFT_IN: char = '&';
const SHIFT_OUT: char = '-';

/// Decode `s` from modified UTF-7.
///
/// Decoding is permissive and never fails: a shift sequence whose base64
/// cannot be decoded is passed through as-is, the shift-out character may
/// be omitted before a non-base64 character, and non-ASCII input is kept.
pub fn decode(s: &str) -> Cow<'_, str> {
    if !s.contains(SHIFT_IN) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find(SHIFT_IN) {
        out.push_str(&rest[..start]);

        let after = &rest[start + 1..];
        let run = after.bytes().take_while(|&b| is_base64(b)).count();
        let (encoded, tail) = after.split_at(run);
        let shifted_out = tail.starts_with(SHIFT_OUT);

        if encoded.is_empty() {
            // "&-" is the escape for a literal '&'; a bare '&' is taken as
            // itself.
            out.push(SHIFT_IN);
        } else if let Some(text) = decode_utf16(encoded) {
            out.push_str(&text);
        } else {
            out.push(SHIFT_IN);
            out.push_str(encoded);
            rest = tail;
            continue;
        }

        rest = if shifted_out { &tail[1..] } else { tail };
    }
    out.push_str(rest);

    Cow::Owned(out)
}

/// Encode `s` into modified UTF-7.
///
/// The output is minimal: printable ASCII is never encoded, every encoded
/// run is explicitly shifted out, and '&' uses the `&-` escape.
pub fn encode(s: &str) -> Cow<'_, str> {
    if s.bytes().all(|b| is_direct(b) && SHIFT_IN as u8 != b) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() * 2);
    let mut run = Vec::<u16>::new();
    for ch in s.chars() {
        if SHIFT_IN == ch {
            flush_run(&mut out, &mut run);
            out.push(SHIFT_IN);
            out.push(SHIFT_OUT);
        } else if ch.is_ascii() && is_direct(ch as u8) {
            flush_run(&mut out, &mut run);
            out.push(ch);
        } else {
            let mut units = [0u16; 2];
            run.extend_from_slice(ch.encode_utf16(&mut units));
        }
    }
    flush_run(&mut out, &mut run);

    Cow::Owned(out)
}

fn decode_utf16(encoded: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(encoded.len());
    base64::decode_config_buf(
        encoded,
        base64::IMAP_MUTF7.decode_allow_trailing_bits(true),
        &mut bytes,
    )
    .ok()?;

    // A spurious trailing byte is dropped.
    let units = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect::<Vec<_>>();
    Some(String::from_utf16_lossy(&units))
}

fn flush_run(dst: &mut String, run: &mut Vec<u16>) {
    if run.is_empty() {
        return;
    }

    let bytes = run
        .iter()
        .flat_map(|unit| unit.to_be_bytes().to_vec())
        .collect::<Vec<u8>>();
    dst.push(SHIFT_IN);
    dst.push_str(&base64::encode_config(&bytes, base64::IMAP_MUTF7));
    dst.push(SHIFT_OUT);
    run.clear();
}

fn is_direct(b: u8) -> bool {
    b >= b' ' && b < 0x7F
}

fn is_base64(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b'+' == b || b',' == b
}
