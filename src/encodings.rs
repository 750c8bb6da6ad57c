/*
 * epistoli - encodings module
 *
 * Copyright 2017 - 2020 Manos Pitsidianakis
 *
 * This file is part of epistoli.
 *
 * epistoli is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * epistoli is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with epistoli. If not, see <http://www.gnu.org/licenses/>.
 */

//! `RFC2047` encoded words (`=?charset?encoding?encoded text?=`), as found
//! in display names and other header phrases.

use std::borrow::Cow;

use data_encoding::{BASE64, BASE64_MIME};
use nom::{branch::alt, error::ErrorKind, multi::many0, number::complete::le_u8};

use crate::error::{Error, Result};

#[derive(Eq, PartialEq)]
pub struct ParsingError<I> {
    pub input: I,
    pub error: Cow<'static, str>,
}

impl std::fmt::Debug for ParsingError<&'_ [u8]> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("ParsingError")
            .field("input", &String::from_utf8_lossy(self.input))
            .field("error", &self.error)
            .finish()
    }
}

pub type IResult<I, O, E = ParsingError<I>> = std::result::Result<(I, O), nom::Err<E>>;

impl<I> From<(I, &'static str)> for ParsingError<I> {
    fn from((input, error): (I, &'static str)) -> Self {
        Self {
            input,
            error: error.into(),
        }
    }
}

impl<I> From<(I, String)> for ParsingError<I> {
    fn from((input, error): (I, String)) -> Self {
        Self {
            input,
            error: error.into(),
        }
    }
}

impl<I> nom::error::ParseError<I> for ParsingError<I> {
    fn from_error_kind(input: I, kind: ErrorKind) -> Self {
        Self {
            input,
            error: kind.description().to_string().into(),
        }
    }

    fn append(input: I, kind: ErrorKind, other: Self) -> Self {
        Self {
            input,
            error: format!("{}, {}", kind.description(), other.error).into(),
        }
    }
}

impl<'i> From<ParsingError<&'i [u8]>> for Error {
    fn from(val: ParsingError<&'i [u8]>) -> Self {
        Self::new("Parsing error").set_summary(format!(
            r#"In input: "{}...",
Error: {}"#,
            String::from_utf8_lossy(val.input)
                .chars()
                .take(30)
                .collect::<String>(),
            val.error
        ))
    }
}

impl<'i> From<nom::Err<ParsingError<&'i [u8]>>> for Error {
    fn from(val: nom::Err<ParsingError<&'i [u8]>>) -> Self {
        match val {
            nom::Err::Incomplete(_) => Self::new("Parsing Error: Incomplete"),
            nom::Err::Error(err) | nom::Err::Failure(err) => err.into(),
        }
    }
}

#[inline]
fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}

pub fn quoted_printable_byte(input: &[u8]) -> IResult<&[u8], u8> {
    if input.len() < 3
        || input[0] != b'='
        || !input[1].is_ascii_hexdigit()
        || !input[2].is_ascii_hexdigit()
    {
        return Err(nom::Err::Error(
            (input, "quoted_printable_byte(): invalid input").into(),
        ));
    }
    Ok((&input[3..], hex_value(input[1]) * 16 + hex_value(input[2])))
}

// In header context a quoted printable underscore stands for a space.
fn qp_underscore_header(input: &[u8]) -> IResult<&[u8], u8> {
    if input.first() == Some(&b'_') {
        Ok((&input[1..], 0x20))
    } else {
        Err(nom::Err::Error(
            (input, "qp_underscore_header(): invalid input").into(),
        ))
    }
}

pub fn quoted_printable_bytes_header(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    many0(alt((quoted_printable_byte, qp_underscore_header, le_u8)))(input)
}

/// Decode the charset named by an encoded word's tag. Unknown charsets
/// pass the bytes through lossily instead of failing the whole phrase.
fn decode_charset(s: &[u8], label: &[u8]) -> String {
    // An RFC2231 language suffix may trail the charset tag.
    let label = label.split(|&b| b == b'*').next().unwrap_or(label);
    if label.eq_ignore_ascii_case(b"utf-8") || label.eq_ignore_ascii_case(b"us-ascii") {
        return String::from_utf8_lossy(s).into_owned();
    }
    match encoding_rs::Encoding::for_label(label) {
        Some(enc) => {
            let (cow, _, _) = enc.decode(s);
            cow.into_owned()
        }
        None => String::from_utf8_lossy(s).into_owned(),
    }
}

/* Encoded words
 * "=?charset?encoding?encoded text?=".
 */
pub fn encoded_word(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    if input.len() < 6 || !input.starts_with(b"=?") {
        return Err(nom::Err::Error(
            (input, "encoded_word(): expected '=?'").into(),
        ));
    }
    let charset_end = match input[2..].iter().position(|&b| b == b'?') {
        Some(p) => p + 2,
        None => {
            return Err(nom::Err::Error(
                (input, "encoded_word(): expected charset tag").into(),
            ))
        }
    };
    if charset_end + 2 >= input.len() || input[charset_end + 2] != b'?' {
        return Err(nom::Err::Error(
            (input, "encoded_word(): expected encoding tag").into(),
        ));
    }
    let encoding = input[charset_end + 1];
    let text_start = charset_end + 3;
    let text_end = match input[text_start..]
        .windows(2)
        .position(|w| w == b"?=")
    {
        Some(p) => p + text_start,
        None => {
            return Err(nom::Err::Error(
                (input, "encoded_word(): expected terminating '?='").into(),
            ))
        }
    };
    let encoded_text = &input[text_start..text_end];

    let s: Vec<u8> = match encoding {
        b'b' | b'B' => BASE64_MIME
            .decode(encoded_text)
            .map_or_else(|_| encoded_text.to_vec(), |v| v),
        b'q' | b'Q' => match quoted_printable_bytes_header(encoded_text) {
            Ok((b"", s)) => s,
            _ => {
                return Err(nom::Err::Error(
                    (input, "encoded_word(): invalid quoted_printable").into(),
                ))
            }
        },
        _ => {
            return Err(nom::Err::Error(
                (input, "encoded_word(): expected 'b|q'").into(),
            ))
        }
    };

    Ok((
        &input[text_end + 2..],
        decode_charset(&s, &input[2..charset_end]).into_bytes(),
    ))
}

#[inline]
fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

/// Decode a whole phrase: encoded words are decoded in place, whitespace
/// between two adjacent encoded words is folding and disappears, plain
/// text runs pass through untouched.
pub fn decode_phrase(input: &[u8]) -> Result<String> {
    let mut out: Vec<u8> = Vec::with_capacity(input.len());
    let mut last_encoded = false;
    let mut i = 0;
    while i < input.len() {
        if is_whitespace(input[i]) {
            let start = i;
            while i < input.len() && is_whitespace(input[i]) {
                i += 1;
            }
            if i >= input.len() || !(last_encoded && encoded_word(&input[i..]).is_ok()) {
                out.extend_from_slice(&input[start..i]);
            }
            continue;
        }
        match encoded_word(&input[i..]) {
            Ok((rest, v)) => {
                out.extend_from_slice(&v);
                last_encoded = true;
                i = input.len() - rest.len();
            }
            Err(_) => {
                let start = i;
                while i < input.len() && !is_whitespace(input[i]) {
                    i += 1;
                }
                out.extend_from_slice(&input[start..i]);
                last_encoded = false;
            }
        }
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

// Q encoding keeps these bytes bare.
#[inline]
fn is_q_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'!' | b'*' | b'+' | b'-' | b'/')
}

/// Budget for one encoded word, all syntax included.
const ENCODED_WORD_MAX: usize = 75;

/// Encode a display name for the wire. ASCII phrases come back untouched;
/// anything else becomes utf-8 encoded words, Q or B according to which
/// is denser, split so that no single word overruns its length budget.
pub fn encode_phrase(s: &str) -> String {
    if s.is_ascii() {
        return s.to_string();
    }
    let bytes = s.as_bytes();
    let non_ascii = bytes.iter().filter(|b| !b.is_ascii()).count();
    if non_ascii > bytes.len() / 2 {
        encode_words(s, "B", ENCODED_WORD_MAX - 12, |chunk| {
            BASE64.encode(chunk.as_bytes())
        })
    } else {
        encode_words(s, "Q", ENCODED_WORD_MAX - 12, |chunk| {
            let mut out = String::new();
            for &b in chunk.as_bytes() {
                if b == b' ' {
                    out.push('_');
                } else if is_q_safe(b) {
                    out.push(b as char);
                } else {
                    out.push_str(&format!("={:02X}", b));
                }
            }
            out
        })
    }
}

fn encode_words<F>(s: &str, encoding: &str, budget: usize, encode: F) -> String
where
    F: Fn(&str) -> String,
{
    let mut words: Vec<String> = Vec::new();
    let mut chunk = String::new();
    for c in s.chars() {
        chunk.push(c);
        if encode(&chunk).len() > budget {
            chunk.pop();
            if !chunk.is_empty() {
                words.push(format!("=?utf-8?{}?{}?=", encoding, encode(&chunk)));
            }
            chunk.clear();
            chunk.push(c);
        }
    }
    if !chunk.is_empty() {
        words.push(format!("=?utf-8?{}?{}?=", encoding, encode(&chunk)));
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodings_encoded_word() {
        let (rest, v) = encoded_word(b"=?utf-8?q?J=C3=B6e?=").unwrap();
        assert!(rest.is_empty());
        assert_eq!(String::from_utf8(v).unwrap(), "Jöe");

        // malformed base64 degrades to the raw text instead of failing
        let (_, v) = encoded_word(b"=?iso-8859-7?B?not base64!?=").unwrap();
        assert!(!v.is_empty());

        assert!(encoded_word(b"plain text").is_err());
        assert!(encoded_word(b"=?utf-8?x?abc?=").is_err());
    }

    #[test]
    fn test_encodings_b_encoding() {
        let (rest, v) = encoded_word(b"=?utf-8?B?zqzOu8+GzrE=?=").unwrap();
        assert!(rest.is_empty());
        assert_eq!(String::from_utf8(v).unwrap(), "άλφα");
    }

    #[test]
    fn test_encodings_latin_charset() {
        let (_, v) = encoded_word(b"=?iso-8859-1?Q?Andr=E9?=").unwrap();
        assert_eq!(String::from_utf8(v).unwrap(), "André");
    }

    #[test]
    fn test_encodings_decode_phrase() {
        assert_eq!(decode_phrase(b"Joe User").unwrap(), "Joe User");
        assert_eq!(
            decode_phrase(b"=?utf-8?q?J=C3=B6e?= User").unwrap(),
            "Jöe User"
        );
        // whitespace between adjacent encoded words folds away
        assert_eq!(
            decode_phrase(b"=?utf-8?q?J=C3=B6?= =?utf-8?q?e?=").unwrap(),
            "Jöe"
        );
        assert_eq!(
            decode_phrase(b"=?utf-8?q?a_b?= and more").unwrap(),
            "a b and more"
        );
    }

    #[test]
    fn test_encodings_roundtrip() {
        for phrase in ["Jöe", "Καλημέρα κόσμε", "mixed ascii και ελληνικά"] {
            let encoded = encode_phrase(phrase);
            assert!(encoded.split(' ').all(|w| w.len() <= ENCODED_WORD_MAX));
            assert_eq!(decode_phrase(encoded.as_bytes()).unwrap(), phrase);
        }
        assert_eq!(encode_phrase("plain"), "plain");
    }
}
