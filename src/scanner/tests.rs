//
// epistoli
//
// Copyright 2017 Emmanouil Pitsidianakis <manos@pitsidianak.is>
//
// This file is part of epistoli.
//
// epistoli is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// epistoli is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with epistoli. If not, see <http://www.gnu.org/licenses/>.
//
// SPDX-License-Identifier: EUPL-1.2 OR GPL-3.0-or-later

use super::*;

fn kinds(seq: &TokenSeq) -> Vec<TokenKind> {
    seq.tokens().iter().map(|t| t.kind).collect()
}

#[test]
fn test_scanner_mailbox() {
    let seq = scan("Joe <joe@example.com>").unwrap();
    assert_eq!(
        kinds(&seq),
        vec![
            TokenKind::Atom,
            TokenKind::Whitespace,
            TokenKind::LeftAngle,
            TokenKind::Atom,
            TokenKind::AtSign,
            TokenKind::Atom,
            TokenKind::Period,
            TokenKind::Atom,
            TokenKind::RightAngle,
            TokenKind::End,
        ]
    );
    assert_eq!(seq.tokens()[0].text.as_deref(), Some("Joe"));
    assert_eq!(seq.tokens()[3].text.as_deref(), Some("joe"));
    assert_eq!(seq.tokens()[3].position(), 5);
    assert_eq!(seq.tokens()[9].position(), 21);
}

#[test]
fn test_scanner_whitespace_collapses() {
    let seq = scan("a \t\r\n  b").unwrap();
    assert_eq!(
        kinds(&seq),
        vec![
            TokenKind::Atom,
            TokenKind::Whitespace,
            TokenKind::Atom,
            TokenKind::End
        ]
    );
    assert_eq!(seq.tokens()[1].position(), 1);
    assert_eq!(seq.tokens()[1].span.length, 6);
}

#[test]
fn test_scanner_quoted_literal_unescapes() {
    let seq = scan(r#""Joe \"Q\" User""#).unwrap();
    assert_eq!(seq.tokens()[0].kind, TokenKind::QuotedLiteral);
    assert_eq!(seq.tokens()[0].text.as_deref(), Some(r#"Joe "Q" User"#));
    assert_eq!(seq.tokens()[0].span.display(r#""Joe \"Q\" User""#), r#""Joe \"Q\" User""#);
}

#[test]
fn test_scanner_domain_literal_keeps_backslash() {
    let seq = scan(r"[127.0\.0.1]").unwrap();
    assert_eq!(seq.tokens()[0].kind, TokenKind::DomainLiteral);
    assert_eq!(seq.tokens()[0].text.as_deref(), Some(r"127.0\.0.1"));
}

#[test]
fn test_scanner_nested_comment_kept_verbatim() {
    let seq = scan("(outer (inner) tail)").unwrap();
    assert_eq!(seq.tokens()[0].kind, TokenKind::Comment);
    assert_eq!(seq.tokens()[0].text.as_deref(), Some("outer (inner) tail"));
    assert_eq!(kinds(&seq), vec![TokenKind::Comment, TokenKind::End]);
}

#[test]
fn test_scanner_errors() {
    let err = scan("ab \"unterminated").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Lexical);
    assert_eq!(err.details, "Missing '\"'");
    // The offset points at the opening quote, not at end of input.
    assert_eq!(err.offset, Some(3));

    let err = scan("\"bare\rcr\"").unwrap_err();
    assert_eq!(err.details, "Bare CR in address");

    let err = scan("a\u{0007}b").unwrap_err();
    assert_eq!(err.details, "Illegal character in address");
    assert_eq!(err.offset, Some(1));

    let err = scan("a)b").unwrap_err();
    assert_eq!(err.details, "Unexpected ')'");

    let err = scan("[a[b]]").unwrap_err();
    assert_eq!(err.details, "Unexpected '['");

    let err = scan("(never closed").unwrap_err();
    assert_eq!(err.details, "Missing ')'");
    assert_eq!(err.offset, Some(0));
}

#[test]
fn test_scanner_comment_depth_cap() {
    let mut s = String::new();
    for _ in 0..(MAX_COMMENT_DEPTH + 1) {
        s.push('(');
    }
    for _ in 0..(MAX_COMMENT_DEPTH + 1) {
        s.push(')');
    }
    let err = scan(&s).unwrap_err();
    assert_eq!(err.details, "Comment nesting too deep");
}

#[test]
fn test_token_seq_cursor() {
    let mut seq = scan("a, b").unwrap();
    let mark = seq.cursor();
    assert_eq!(seq.next_token().kind, TokenKind::Atom);
    assert_eq!(seq.next_token().kind, TokenKind::Comma);
    // whitespace is skipped
    assert_eq!(seq.next_token().kind, TokenKind::Atom);
    assert_eq!(seq.next_token().kind, TokenKind::End);
    // End keeps coming back
    assert_eq!(seq.next_token().kind, TokenKind::End);
    seq.push_back_to(mark);
    assert_eq!(seq.next_token().text.as_deref(), Some("a"));
}

#[test]
fn test_token_seq_next_non_comment() {
    let mut seq = scan("a (comment) b").unwrap();
    assert_eq!(seq.next_non_comment().text.as_deref(), Some("a"));
    assert_eq!(seq.next_non_comment().text.as_deref(), Some("b"));
    assert_eq!(seq.next_non_comment().kind, TokenKind::End);
}

#[test]
fn test_token_seq_extract_is_independent() {
    let src = "one two three";
    let mut seq = scan(src).unwrap();
    // [Atom, Ws, Atom, Ws, Atom, End]
    let mut sub = seq.extract(2, 3);
    assert_eq!(sub.len(), 2);
    assert_eq!(sub.next_token().text.as_deref(), Some("two"));
    assert_eq!(sub.next_token().kind, TokenKind::End);
    // the End terminator of the copy sits at the end of "two" in the source
    assert_eq!(sub.tokens().last().unwrap().position(), 7);
    // parent cursor was not disturbed
    assert_eq!(seq.next_token().text.as_deref(), Some("one"));
}

#[test]
fn test_token_seq_is_plain() {
    assert!(scan("a@b.com, c@d.com").unwrap().is_plain());
    assert!(!scan("\"a\"@b.com").unwrap().is_plain());
    assert!(!scan("a@b.com (comment)").unwrap().is_plain());
    assert!(!scan("a@[10.0.0.1]").unwrap().is_plain());
}
