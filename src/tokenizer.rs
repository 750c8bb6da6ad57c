/*
 * epistoli - header value tokenizer
 *
 * Copyright 2020 Manos Pitsidianakis
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

//! Single pass tokenizer for structured header values such as
//! `Content-Type` and `Content-Disposition`.
//!
//! Unlike the address [`scanner`](crate::scanner), this one works off a
//! configurable delimiter alphabet and never rewinds except through
//! [`HeaderTokenizer::peek`].

use crate::error::{Error, ErrorKind, Result};

/// Delimiters for `RFC822` headers: `.` and `[]` split atoms.
pub const RFC822_DELIMITERS: &str = "()<>@,;:\\\".[]";
/// Delimiters for `MIME` headers, where dotted atoms and bracketed hosts
/// stay whole but `/`, `?` and `=` split.
pub const MIME_DELIMITERS: &str = "()<>@,;:\\\"/?=";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Atom,
    QuotedString,
    Comment,
    Delimiter,
    Eof,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

pub struct HeaderTokenizer<'s> {
    src: &'s str,
    pos: usize,
    delimiters: &'static str,
    return_comments: bool,
}

impl<'s> HeaderTokenizer<'s> {
    pub fn rfc822(src: &'s str) -> Self {
        Self::with_options(src, RFC822_DELIMITERS, false)
    }

    pub fn mime(src: &'s str) -> Self {
        Self::with_options(src, MIME_DELIMITERS, false)
    }

    pub fn with_options(src: &'s str, delimiters: &'static str, return_comments: bool) -> Self {
        Self {
            src,
            pos: 0,
            delimiters,
            return_comments,
        }
    }

    /// Everything after the cursor, unparsed.
    pub fn remainder(&self) -> &'s str {
        &self.src[self.pos..]
    }

    /// Non-destructive lookahead: parse the next token, then rewind.
    pub fn peek(&mut self) -> Result<Token> {
        let mark = self.pos;
        let tok = self.next_token();
        self.pos = mark;
        tok
    }

    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.current_char() else {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    value: String::new(),
                });
            };
            match c {
                '(' => {
                    let comment = self.read_comment()?;
                    if self.return_comments {
                        return Ok(comment);
                    }
                }
                '"' => return self.read_quoted_string(),
                c if !c.is_ascii() || c.is_ascii_control() || self.delimiters.contains(c) => {
                    self.pos += c.len_utf8();
                    return Ok(Token {
                        kind: TokenKind::Delimiter,
                        value: c.to_string(),
                    });
                }
                _ => return Ok(self.read_atom()),
            }
        }
    }

    fn current_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && matches!(bytes[self.pos], b' ' | b'\t' | b'\r' | b'\n') {
            self.pos += 1;
        }
    }

    fn read_atom(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if !c.is_ascii()
                || c.is_ascii_control()
                || c == ' '
                || c == '('
                || c == '"'
                || self.delimiters.contains(c)
            {
                break;
            }
            self.pos += c.len_utf8();
        }
        Token {
            kind: TokenKind::Atom,
            value: self.src[start..self.pos].to_string(),
        }
    }

    fn read_quoted_string(&mut self) -> Result<Token> {
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let mut needs_filter = false;
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'\\' => {
                    needs_filter = true;
                    self.pos += 2;
                }
                b'\r' => {
                    needs_filter = true;
                    self.pos += 1;
                }
                b'"' => {
                    let raw = &self.src[start..self.pos.min(bytes.len())];
                    self.pos = (self.pos + 1).min(bytes.len());
                    let value = if needs_filter {
                        filter_quoted(raw)
                    } else {
                        raw.to_string()
                    };
                    return Ok(Token {
                        kind: TokenKind::QuotedString,
                        value,
                    });
                }
                _ => self.pos += 1,
            }
        }
        self.pos = bytes.len();
        Err(Error::parse(
            ErrorKind::Lexical,
            self.src,
            "Missing '\"'",
            open,
        ))
    }

    fn read_comment(&mut self) -> Result<Token> {
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let mut depth = 1_usize;
        let mut needs_filter = false;
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'\\' => {
                    needs_filter = true;
                    self.pos += 2;
                }
                b'(' => {
                    depth += 1;
                    self.pos += 1;
                }
                b')' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        let raw = &self.src[start..(self.pos - 1).min(bytes.len())];
                        let value = if needs_filter {
                            filter_escapes(raw)
                        } else {
                            raw.to_string()
                        };
                        return Ok(Token {
                            kind: TokenKind::Comment,
                            value,
                        });
                    }
                }
                _ => self.pos += 1,
            }
        }
        self.pos = bytes.len();
        Err(Error::parse(
            ErrorKind::Lexical,
            self.src,
            "Missing ')'",
            open,
        ))
    }
}

/// Unescape pass for quoted strings: escape pairs collapse, CRLF folding
/// disappears, a lone CR stays data.
fn filter_quoted(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                out.push(bytes[i + 1]);
                i += 2;
            }
            b'\r' if i + 1 < bytes.len() && bytes[i + 1] == b'\n' => {
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn filter_escapes(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            out.push(bytes[i + 1]);
            i += 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(mut tok: HeaderTokenizer) -> Vec<Token> {
        let mut out = Vec::new();
        loop {
            let t = tok.next_token().unwrap();
            if t.kind == TokenKind::Eof {
                break;
            }
            out.push(t);
        }
        out
    }

    #[test]
    fn test_tokenizer_content_type() {
        let toks = collect(HeaderTokenizer::mime("text/plain; charset=\"us-ascii\""));
        let rendered: Vec<(TokenKind, &str)> =
            toks.iter().map(|t| (t.kind, t.value.as_str())).collect();
        assert_eq!(
            rendered,
            vec![
                (TokenKind::Atom, "text"),
                (TokenKind::Delimiter, "/"),
                (TokenKind::Atom, "plain"),
                (TokenKind::Delimiter, ";"),
                (TokenKind::Atom, "charset"),
                (TokenKind::Delimiter, "="),
                (TokenKind::QuotedString, "us-ascii"),
            ]
        );
    }

    #[test]
    fn test_tokenizer_presets_differ_on_dot_and_brackets() {
        let mime = collect(HeaderTokenizer::mime("boundary=a.b"));
        assert_eq!(mime.last().unwrap().value, "a.b");

        let rfc = collect(HeaderTokenizer::rfc822("a.b"));
        assert_eq!(
            rfc.iter().map(|t| t.value.as_str()).collect::<Vec<_>>(),
            vec!["a", ".", "b"]
        );

        let mime = collect(HeaderTokenizer::mime("[1.2]"));
        assert_eq!(mime[0].value, "[1.2]");
        let rfc = collect(HeaderTokenizer::rfc822("[x]"));
        assert_eq!(
            rfc.iter().map(|t| t.value.as_str()).collect::<Vec<_>>(),
            vec!["[", "x", "]"]
        );
    }

    #[test]
    fn test_tokenizer_comments() {
        // skipped by default
        let toks = collect(HeaderTokenizer::mime("a (note (nested)) b"));
        assert_eq!(
            toks.iter().map(|t| t.value.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        // surfaced on request
        let toks = collect(HeaderTokenizer::with_options(
            "a (note (nested)) b",
            MIME_DELIMITERS,
            true,
        ));
        assert_eq!(toks[1].kind, TokenKind::Comment);
        assert_eq!(toks[1].value, "note (nested)");
    }

    #[test]
    fn test_tokenizer_quoted_string_folding() {
        let toks = collect(HeaderTokenizer::mime("\"line1\r\n line2\""));
        assert_eq!(toks[0].value, "line1 line2");

        // a lone CR is data, not folding
        let toks = collect(HeaderTokenizer::mime("\"a\rb\""));
        assert_eq!(toks[0].value, "a\rb");

        let toks = collect(HeaderTokenizer::mime("\"say \\\"hi\\\"\""));
        assert_eq!(toks[0].value, "say \"hi\"");
    }

    #[test]
    fn test_tokenizer_peek_and_remainder() {
        let mut tok = HeaderTokenizer::mime("text/plain");
        assert_eq!(tok.peek().unwrap().value, "text");
        assert_eq!(tok.next_token().unwrap().value, "text");
        assert_eq!(tok.remainder(), "/plain");
    }

    #[test]
    fn test_tokenizer_errors() {
        let mut tok = HeaderTokenizer::mime("name=\"open");
        assert_eq!(tok.next_token().unwrap().value, "name");
        assert_eq!(tok.next_token().unwrap().value, "=");
        let err = tok.next_token().unwrap_err();
        assert_eq!(err.details, "Missing '\"'");
        assert_eq!(err.offset, Some(5));

        let err = HeaderTokenizer::mime("(still open")
            .next_token()
            .unwrap_err();
        assert_eq!(err.details, "Missing ')'");
    }

    #[test]
    fn test_tokenizer_control_bytes_are_single_tokens() {
        let toks = collect(HeaderTokenizer::mime("a\u{7}b"));
        assert_eq!(toks[1].kind, TokenKind::Delimiter);
        assert_eq!(toks[1].value, "\u{7}");
    }
}
