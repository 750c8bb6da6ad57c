/*
 * epistoli - scanner module
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

//! Lexical scanning of `RFC822` address text.
//!
//! [`scan`] turns a raw header string into a [`TokenSeq`]: a cursor over an
//! arena of positional [`Token`]s that the address parser can walk, rewind
//! and slice. Rewinding is done with arena indices ([`TokenSeq::cursor`] /
//! [`TokenSeq::push_back_to`]), never with token identity, so extracted
//! copies of a sequence stay independent of their parent.

use crate::error::{Error, ErrorKind, Result};

/// Nesting depth limit for `(comments (in (comments)))`. Crafted inputs are
/// bounded by this instead of the input length.
pub const MAX_COMMENT_DEPTH: usize = 64;

/// A half-open byte range into the scanned source string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
}

impl Span {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// The source text this span covers.
    pub fn display<'a>(&self, src: &'a str) -> &'a str {
        &src[self.offset..self.end()]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    End,
    Atom,
    QuotedLiteral,
    DomainLiteral,
    Comment,
    LeftAngle,
    RightAngle,
    Comma,
    AtSign,
    Semicolon,
    Colon,
    Period,
    Whitespace,
}

/// One lexical token. `text` holds decoded content for atoms, quoted
/// literals (escapes removed), domain literals and comments (escapes kept);
/// delimiters and whitespace carry no text, their `span` into the source
/// says it all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: Option<String>,
    pub span: Span,
}

impl Token {
    fn delimiter(kind: TokenKind, offset: usize, length: usize) -> Self {
        Self {
            kind,
            text: None,
            span: Span { offset, length },
        }
    }

    pub fn position(&self) -> usize {
        self.span.offset
    }

    pub fn is_end(&self) -> bool {
        self.kind == TokenKind::End
    }
}

/// An indexable, rewindable token sequence. The last token is always a
/// synthetic [`TokenKind::End`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenSeq {
    tokens: Vec<Token>,
    cursor: usize,
}

impl TokenSeq {
    fn from_tokens(tokens: Vec<Token>) -> Self {
        debug_assert!(matches!(
            tokens.last(),
            Some(Token {
                kind: TokenKind::End,
                ..
            })
        ));
        Self { tokens, cursor: 0 }
    }

    /// Number of tokens, the terminating `End` included.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        // Only the End terminator.
        self.tokens.len() <= 1
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Arena index the next call to [`Self::next`] would consume. Save it
    /// before reading ahead, hand it back to [`Self::push_back_to`] to
    /// rewind.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn push_back_to(&mut self, index: usize) {
        debug_assert!(index < self.tokens.len());
        self.cursor = index.min(self.tokens.len().saturating_sub(1));
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    /// The token under the cursor, without advancing. Does not skip
    /// whitespace.
    pub fn peek(&self) -> &Token {
        self.tokens
            .get(self.cursor)
            .unwrap_or_else(|| self.tokens.last().expect("TokenSeq is End-terminated"))
    }

    /// Next token, skipping whitespace. At exhaustion this keeps returning
    /// the `End` token.
    pub fn next_token(&mut self) -> Token {
        loop {
            let tok = self.peek().clone();
            if !tok.is_end() {
                self.cursor += 1;
            }
            if tok.kind != TokenKind::Whitespace {
                return tok;
            }
        }
    }

    /// Next token, skipping whitespace and comments.
    pub fn next_non_comment(&mut self) -> Token {
        loop {
            let tok = self.next_token();
            if tok.kind != TokenKind::Comment {
                return tok;
            }
        }
    }

    /// Copy out `[start, end)` as an independent sequence terminated by its
    /// own `End` token. Cursor starts at the beginning of the copy.
    pub fn extract(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.tokens.len());
        let start = start.min(end);
        let mut tokens: Vec<Token> = self.tokens[start..end]
            .iter()
            .filter(|t| !t.is_end())
            .cloned()
            .collect();
        let end_pos = tokens.last().map(|t| t.span.end()).unwrap_or_default();
        tokens.push(Token::delimiter(TokenKind::End, end_pos, 0));
        Self::from_tokens(tokens)
    }

    /// True if no quoted literal, domain literal or comment token appears
    /// anywhere in the sequence. The legacy blank-delimited parsing mode is
    /// only ever armed for such sequences.
    pub fn is_plain(&self) -> bool {
        !self.tokens.iter().any(|t| {
            matches!(
                t.kind,
                TokenKind::QuotedLiteral | TokenKind::DomainLiteral | TokenKind::Comment
            )
        })
    }
}

#[inline]
fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

#[inline]
fn is_special(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"' | b'.' | b'[' | b']'
    )
}

#[inline]
fn is_atom_byte(b: u8) -> bool {
    (0x21..0x7f).contains(&b) && !is_special(b)
}

fn lexical(src: &str, msg: &'static str, offset: usize) -> Error {
    Error::parse(ErrorKind::Lexical, src, msg, offset)
}

/// Scan `src` into a terminated [`TokenSeq`].
///
/// Lexical grammar notes:
///
/// - an atom is a maximal run of printable non-special ASCII;
/// - `"..."` drops the backslash of every escape pair;
/// - `[...]` keeps the backslash, domain literals are never unescaped again
///   downstream;
/// - `(...)` nests, inner parentheses are kept verbatim in the token text,
///   the outermost pair is stripped;
/// - runs of blanks/tabs/CR/LF collapse into one whitespace token at the
///   run's start.
pub fn scan(src: &str) -> Result<TokenSeq> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        match bytes[i] {
            b' ' | b'\t' | b'\r' | b'\n' => {
                while i < bytes.len() && is_whitespace(bytes[i]) {
                    i += 1;
                }
                tokens.push(Token::delimiter(TokenKind::Whitespace, start, i - start));
            }
            b'"' => {
                i += 1;
                let mut text: Vec<u8> = Vec::new();
                let mut closed = false;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' if i + 1 < bytes.len() => {
                            text.push(bytes[i + 1]);
                            i += 2;
                        }
                        b'\\' => {
                            // Trailing backslash, the literal cannot close.
                            i += 1;
                        }
                        b'\r' => return Err(lexical(src, "Bare CR in address", i)),
                        b'"' => {
                            i += 1;
                            closed = true;
                            break;
                        }
                        c => {
                            text.push(c);
                            i += 1;
                        }
                    }
                }
                if !closed {
                    return Err(lexical(src, "Missing '\"'", start));
                }
                tokens.push(Token {
                    kind: TokenKind::QuotedLiteral,
                    text: Some(String::from_utf8_lossy(&text).into_owned()),
                    span: Span {
                        offset: start,
                        length: i - start,
                    },
                });
            }
            b'[' => {
                i += 1;
                let mut text: Vec<u8> = Vec::new();
                let mut closed = false;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' if i + 1 < bytes.len() => {
                            // Unlike quoted literals the backslash stays:
                            // domain literals see no second unescaping pass.
                            text.push(b'\\');
                            text.push(bytes[i + 1]);
                            i += 2;
                        }
                        b'\\' => {
                            i += 1;
                        }
                        b'\r' => return Err(lexical(src, "Bare CR in address", i)),
                        b'[' => return Err(lexical(src, "Unexpected '['", i)),
                        b']' => {
                            i += 1;
                            closed = true;
                            break;
                        }
                        c => {
                            text.push(c);
                            i += 1;
                        }
                    }
                }
                if !closed {
                    return Err(lexical(src, "Missing ']'", start));
                }
                tokens.push(Token {
                    kind: TokenKind::DomainLiteral,
                    text: Some(String::from_utf8_lossy(&text).into_owned()),
                    span: Span {
                        offset: start,
                        length: i - start,
                    },
                });
            }
            b'(' => {
                i += 1;
                let mut depth = 1_usize;
                let mut text: Vec<u8> = Vec::new();
                while i < bytes.len() && depth > 0 {
                    match bytes[i] {
                        b'\\' if i + 1 < bytes.len() => {
                            text.push(b'\\');
                            text.push(bytes[i + 1]);
                            i += 2;
                        }
                        b'\\' => {
                            i += 1;
                        }
                        b'\r' => return Err(lexical(src, "Bare CR in address", i)),
                        b'(' => {
                            depth += 1;
                            if depth > MAX_COMMENT_DEPTH {
                                return Err(lexical(src, "Comment nesting too deep", i));
                            }
                            text.push(b'(');
                            i += 1;
                        }
                        b')' => {
                            depth -= 1;
                            if depth > 0 {
                                text.push(b')');
                            }
                            i += 1;
                        }
                        c => {
                            text.push(c);
                            i += 1;
                        }
                    }
                }
                if depth > 0 {
                    return Err(lexical(src, "Missing ')'", start));
                }
                tokens.push(Token {
                    kind: TokenKind::Comment,
                    text: Some(String::from_utf8_lossy(&text).into_owned()),
                    span: Span {
                        offset: start,
                        length: i - start,
                    },
                });
            }
            b'<' => {
                tokens.push(Token::delimiter(TokenKind::LeftAngle, i, 1));
                i += 1;
            }
            b'>' => {
                tokens.push(Token::delimiter(TokenKind::RightAngle, i, 1));
                i += 1;
            }
            b',' => {
                tokens.push(Token::delimiter(TokenKind::Comma, i, 1));
                i += 1;
            }
            b'@' => {
                tokens.push(Token::delimiter(TokenKind::AtSign, i, 1));
                i += 1;
            }
            b';' => {
                tokens.push(Token::delimiter(TokenKind::Semicolon, i, 1));
                i += 1;
            }
            b':' => {
                tokens.push(Token::delimiter(TokenKind::Colon, i, 1));
                i += 1;
            }
            b'.' => {
                tokens.push(Token::delimiter(TokenKind::Period, i, 1));
                i += 1;
            }
            b')' => return Err(lexical(src, "Unexpected ')'", i)),
            b']' => return Err(lexical(src, "Unexpected ']'", i)),
            b'\\' => return Err(lexical(src, "Illegal character in address", i)),
            c if is_atom_byte(c) => {
                while i < bytes.len() && is_atom_byte(bytes[i]) {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Atom,
                    text: Some(src[start..i].to_string()),
                    span: Span {
                        offset: start,
                        length: i - start,
                    },
                });
            }
            _ => return Err(lexical(src, "Illegal character in address", i)),
        }
    }
    tokens.push(Token::delimiter(TokenKind::End, bytes.len(), 0));
    Ok(TokenSeq::from_tokens(tokens))
}

#[cfg(test)]
mod tests;
