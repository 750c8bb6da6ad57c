/*
 * epistoli - address module
 *
 * Copyright 2019 Manos Pitsidianakis
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

use std::{
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
};

use smallvec::SmallVec;

use crate::{
    encodings,
    error::{Error, ErrorKind, Result},
    parser,
    scanner::{self, TokenKind},
};

/**
 * Container for a single parsed address.
 *
 * ```text
 * >       "Name Name2" <address@domain.tld>
 * >        └─────┬──┘   └──────────┬─────┘
 * >   personal (decoded)           │
 * >                            address
 * ```
 *
 * `address` holds the address-spec for a mailbox, or the entire
 * `phrase: member, member;` text for a group. Two addresses are equal iff
 * their `address` strings match ASCII case-insensitively.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Address {
    address: String,
    personal: Option<String>,
    encoded_personal: Option<String>,
}

impl Address {
    /// Build an address from caller-supplied parts. A non-ASCII display
    /// name is transparently `RFC2047`-encoded for the wire form.
    pub fn new(display_name: Option<String>, address: String) -> Self {
        let encoded_personal = display_name.as_deref().map(encodings::encode_phrase);
        Self {
            address,
            personal: display_name,
            encoded_personal,
        }
    }

    /// Parser-side constructor: the personal phrase arrives in its wire
    /// (possibly `RFC2047`-encoded) form and is decoded here.
    pub(crate) fn from_raw_parts(address: String, encoded_personal: Option<String>) -> Self {
        let personal = encoded_personal
            .as_ref()
            .map(|p| encodings::decode_phrase(p.as_bytes()).unwrap_or_else(|_| p.clone()));
        Self {
            address,
            personal,
            encoded_personal,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// The decoded display name, if any.
    pub fn personal(&self) -> Option<&str> {
        self.personal.as_deref()
    }

    /// The display name as it appears on the wire.
    pub fn encoded_personal(&self) -> Option<&str> {
        self.encoded_personal.as_deref()
    }

    pub fn set_personal(&mut self, display_name: Option<String>) {
        self.encoded_personal = display_name.as_deref().map(encodings::encode_phrase);
        self.personal = display_name;
    }

    /// Whether the address string has the `phrase: members;` group shape.
    pub fn is_group(&self) -> bool {
        self.address.trim_end().ends_with(';') && self.address.contains(':')
    }

    /// Re-parse the member list of a group address. `strict` selects full
    /// grammar validation of every member.
    pub fn group_members(&self, strict: bool) -> Result<SmallVec<[Self; 1]>> {
        let seq = scanner::scan(&self.address)?;
        let mut colon_end = None;
        let mut angle = false;
        for tok in seq.tokens() {
            match tok.kind {
                TokenKind::LeftAngle => angle = true,
                TokenKind::RightAngle => angle = false,
                TokenKind::Colon if !angle => {
                    colon_end = Some(tok.span.end());
                    break;
                }
                _ => {}
            }
        }
        let semi = seq
            .tokens()
            .iter()
            .rev()
            .find(|t| t.kind == TokenKind::Semicolon)
            .map(|t| t.position());
        match (colon_end, semi) {
            (Some(start), Some(end)) if start <= end => {
                parser::parse_header_list(&self.address[start..end], strict)
            }
            _ => Err(Error::new("Not an RFC822 group").set_kind(ErrorKind::Grammar)),
        }
    }
}

impl Eq for Address {}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.address.eq_ignore_ascii_case(&other.address)
    }
}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.address.as_bytes() {
            b.to_ascii_lowercase().hash(state);
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.encoded_personal.as_deref() {
            Some(p) if !p.is_empty() => {
                write!(f, "{} <{}>", quote_phrase(p), self.address)
            }
            _ => write!(f, "{}", self.address),
        }
    }
}

/// Render a slice of addresses the way they appear in a header value.
pub fn display_slice(addresses: &[Address]) -> String {
    let rendered: Vec<String> = addresses.iter().map(ToString::to_string).collect();
    rendered.join(", ")
}

/// True if `s` cannot stand bare as an `RFC822` phrase.
pub fn phrase_needs_quoting(s: &str) -> bool {
    s.bytes().any(|b| {
        matches!(
            b,
            b'(' | b')'
                | b'<'
                | b'>'
                | b'@'
                | b','
                | b';'
                | b':'
                | b'\\'
                | b'"'
                | b'.'
                | b'['
                | b']'
        ) || b < 0x20
            || b >= 0x7f
    })
}

/// Quote `s` as an `RFC822` phrase if it needs it, escaping `"` and `\`.
/// A phrase that already carries its own quotes is left alone.
pub fn quote_phrase(s: &str) -> Cow<'_, str> {
    if !phrase_needs_quoting(s) || (s.len() > 1 && s.starts_with('"') && s.ends_with('"')) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    Cow::Owned(out)
}
