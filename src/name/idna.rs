// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Conversion of internationalized labels to their ASCII-compatible
//! encoding.
//!
//! Only the lookup direction is implemented: a U-label is lowercased
//! and encoded with Punycode ([RFC 3492]) behind the `xn--` prefix.
//! Full UTS #46 mapping is not attempted.
//!
//! [RFC 3492]: https://datatracker.ietf.org/doc/html/rfc3492

use std::borrow::Cow;

use super::label::ACE_PREFIX;
use super::{Error, Label};

const BASE: u32 = 36;
const T_MIN: u32 = 1;
const T_MAX: u32 = 26;
const SKEW: u32 = 38;
const DAMP: u32 = 700;
const INITIAL_BIAS: u32 = 72;
const INITIAL_N: u32 = 0x80;

/// Returns the ASCII-compatible form of `label`. ASCII labels are
/// returned as they are.
pub fn label_to_ascii(label: &Label) -> Result<Cow<[u8]>, Error> {
    if label.is_ascii() {
        return Ok(Cow::Borrowed(label.octets()));
    }
    let text = std::str::from_utf8(label.octets()).or(Err(Error::InvalidUtf8))?;
    let lowercase: String = text.chars().flat_map(char::to_lowercase).collect();
    let mut encoded = ACE_PREFIX.to_vec();
    encoded.extend_from_slice(punycode_encode(&lowercase)?.as_bytes());
    Ok(Cow::Owned(encoded))
}

/// Encodes `input` with Punycode (RFC 3492 § 6.3).
pub fn punycode_encode(input: &str) -> Result<String, Error> {
    let code_points: Vec<u32> = input.chars().map(u32::from).collect();
    let mut output: String = input.chars().filter(char::is_ascii).collect();
    let basic_len = output.len() as u32;
    if basic_len > 0 {
        output.push('-');
    }

    let mut n = INITIAL_N;
    let mut delta: u32 = 0;
    let mut bias = INITIAL_BIAS;
    let mut handled = basic_len;
    while (handled as usize) < code_points.len() {
        let m = match code_points.iter().copied().filter(|c| *c >= n).min() {
            Some(m) => m,
            None => break,
        };
        delta = (m - n)
            .checked_mul(handled + 1)
            .and_then(|d| d.checked_add(delta))
            .ok_or(Error::PunycodeOverflow)?;
        n = m;

        for &c in &code_points {
            if c < n {
                delta = delta.checked_add(1).ok_or(Error::PunycodeOverflow)?;
            } else if c == n {
                let mut q = delta;
                let mut k = BASE;
                loop {
                    let t = threshold(k, bias);
                    if q < t {
                        break;
                    }
                    output.push(encode_digit(t + (q - t) % (BASE - t)));
                    q = (q - t) / (BASE - t);
                    k += BASE;
                }
                output.push(encode_digit(q));
                bias = adapt(delta, handled + 1, handled == basic_len);
                delta = 0;
                handled += 1;
            }
        }
        delta = delta.checked_add(1).ok_or(Error::PunycodeOverflow)?;
        n += 1;
    }
    Ok(output)
}

fn threshold(k: u32, bias: u32) -> u32 {
    if k <= bias {
        T_MIN
    } else if k >= bias + T_MAX {
        T_MAX
    } else {
        k - bias
    }
}

/// The bias adaptation function of RFC 3492 § 6.1.
fn adapt(delta: u32, n_points: u32, first_time: bool) -> u32 {
    let mut delta = if first_time { delta / DAMP } else { delta / 2 };
    delta += delta / n_points;
    let mut k = 0;
    while delta > ((BASE - T_MIN) * T_MAX) / 2 {
        delta /= BASE - T_MIN;
        k += BASE;
    }
    k + (((BASE - T_MIN + 1) * delta) / (delta + SKEW))
}

fn encode_digit(digit: u32) -> char {
    let digit = digit as u8;
    if digit < 26 {
        (b'a' + digit) as char
    } else {
        (b'0' + digit - 26) as char
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
