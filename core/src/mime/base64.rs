/*
 * base64.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Carteggio, a cross-platform email client.
 *
 * Carteggio is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Carteggio is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Carteggio.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Base64 Content-Transfer-Encoding (RFC 2045): incremental decoder, line-wrapped encoder.

const WHITESPACE: i8 = -2;
const INVALID: i8 = -1;

/// Sextet value per input byte; [`WHITESPACE`] for skippable bytes, [`INVALID`] otherwise.
static DECODE: [i8; 256] = build_decode_table();

const fn build_decode_table() -> [i8; 256] {
    const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut table = [INVALID; 256];
    table[b' ' as usize] = WHITESPACE;
    table[b'\t' as usize] = WHITESPACE;
    table[b'\r' as usize] = WHITESPACE;
    table[b'\n' as usize] = WHITESPACE;
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as i8;
        i += 1;
    }
    table
}

/// Encoded line length before a CRLF is inserted.
pub const LINE_LENGTH: usize = 76;

/// Decode base64 from `src` into `dst`. Consumes only complete 4-char quanta; leaves remainder.
/// If `end_of_stream` then flush remaining bits into dst.
/// Returns number of bytes consumed from src.
pub fn decode(
    src: &[u8],
    src_pos: &mut usize,
    dst: &mut [u8],
    dst_pos: &mut usize,
    max_decode: usize,
    end_of_stream: bool,
) -> usize {
    let start_src = *src_pos;
    let mut quantum: u32 = 0;
    let mut quantum_bits: u32 = 0;
    let mut last_valid_src = *src_pos;
    let mut saw_padding = false;
    let dst_limit = (*dst_pos + max_decode).min(dst.len());

    while *src_pos < src.len() {
        let b = src[*src_pos];
        *src_pos += 1;
        let val = DECODE[b as usize];

        if val >= 0 {
            quantum = (quantum << 6) | (val as u32);
            quantum_bits += 6;
            if quantum_bits >= 24 {
                if *dst_pos + 3 <= dst_limit {
                    dst[*dst_pos] = (quantum >> 16) as u8;
                    dst[*dst_pos + 1] = (quantum >> 8) as u8;
                    dst[*dst_pos + 2] = quantum as u8;
                    *dst_pos += 3;
                    last_valid_src = *src_pos;
                    quantum = 0;
                    quantum_bits = 0;
                } else {
                    *src_pos = last_valid_src;
                    break;
                }
            }
        } else if val == WHITESPACE {
            continue;
        } else if b == b'=' {
            saw_padding = true;
            break;
        }
    }

    if (saw_padding || end_of_stream) && quantum_bits >= 8 && *dst_pos < dst_limit {
        dst[*dst_pos] = (quantum >> (quantum_bits - 8)) as u8;
        *dst_pos += 1;
        if quantum_bits >= 16 && *dst_pos < dst_limit {
            dst[*dst_pos] = (quantum >> (quantum_bits - 16)) as u8;
            *dst_pos += 1;
        }
        last_valid_src = *src_pos;
    }

    *src_pos = last_valid_src;
    last_valid_src - start_src
}

/// Encode `data` as base64 broken into CRLF-terminated lines of 76 characters.
pub fn encode(data: &[u8]) -> Vec<u8> {
    use ::base64::Engine as _;
    let encoded = ::base64::engine::general_purpose::STANDARD.encode(data);
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / LINE_LENGTH * 2 + 2);
    for line in encoded.as_bytes().chunks(LINE_LENGTH) {
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }
    out
}
