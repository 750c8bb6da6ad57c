/*
 * epistoli - parser module
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

//! The `RFC822` address grammar.
//!
//! Parsing one list element is a two pass affair. A forward classification
//! scan over the token sequence settles the element's [`Form`] (simple
//! addr-spec, `phrase <route-addr>`, or `phrase: members;` group) and
//! records the phrase and body subranges as arena index pairs. A second
//! pass then validates the extracted body subrange against the addr-spec
//! grammar, when the caller asked for validation.
//!
//! The list driver splits on top level commas; an empty slot between two
//! commas contributes no address. When validation is off and the *whole*
//! scan produced nothing but plain atoms and delimiters, a relaxed legacy
//! mode splits simple elements on blanks instead, one address per run.

use smallvec::SmallVec;

use crate::{
    address::Address,
    error::{Error, ErrorKind, Result},
    scanner::{self, Token, TokenKind, TokenSeq},
};

pub type AddressList = SmallVec<[Address; 1]>;

/// Parse a comma separated address list, with full validation.
pub fn parse_address_list(src: &str) -> Result<AddressList> {
    Parser::new(src)?.run(true)
}

/// Parse an address header value. `strict` selects validation; without it
/// the relaxed legacy mode described in the module docs may apply.
pub fn parse_header_list(src: &str, strict: bool) -> Result<AddressList> {
    Parser::new(src)?.run(strict)
}

/// Parse exactly one address. A list that yields zero or several addresses
/// is rejected, even though it is well-formed as a list.
pub fn parse_address(src: &str) -> Result<Address> {
    let mut list = parse_address_list(src)?;
    if list.len() != 1 {
        return Err(Error::parse(
            ErrorKind::Cardinality,
            src,
            "Expected exactly one address",
            0,
        ));
    }
    Ok(list.remove(0))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Form {
    #[default]
    Unknown,
    Simple,
    Route,
    Group,
}

/// Classification state for one list element. Updated only through the
/// `on_*` transitions; ranges are arena index pairs into the owning
/// [`TokenSeq`].
#[derive(Debug, Default)]
struct ScanState {
    form: Form,
    /// First substantive (non-whitespace, non-comment) token.
    start: Option<usize>,
    /// One past the last substantive token.
    end: usize,
    /// Personal phrase subrange, for route and group forms.
    phrase: Option<(usize, usize)>,
    /// Route form: between `<` and `>`. Group form: between `:` and `;`.
    body: Option<(usize, usize)>,
    /// Group form: arena index of the terminating `;`.
    group_semi: Option<usize>,
    /// Group form: arena index of the `:`.
    group_colon: Option<usize>,
}

impl ScanState {
    fn on_substantive(&mut self, idx: usize) -> std::result::Result<(), &'static str> {
        match self.form {
            Form::Route | Form::Group => Err("Missing ','"),
            Form::Unknown | Form::Simple => {
                self.form = Form::Simple;
                if self.start.is_none() {
                    self.start = Some(idx);
                }
                self.end = idx + 1;
                Ok(())
            }
        }
    }

    fn on_left_angle(&mut self) -> std::result::Result<(), &'static str> {
        match self.form {
            Form::Route | Form::Group => Err("Missing ','"),
            Form::Unknown | Form::Simple => {
                self.form = Form::Route;
                self.phrase = self.start.map(|s| (s, self.end));
                Ok(())
            }
        }
    }

    fn on_colon(&mut self) -> std::result::Result<(), &'static str> {
        match self.form {
            Form::Route | Form::Group => Err("Missing ','"),
            Form::Unknown | Form::Simple => {
                self.form = Form::Group;
                self.phrase = self.start.map(|s| (s, self.end));
                Ok(())
            }
        }
    }
}

struct Parser<'s> {
    src: &'s str,
    seq: TokenSeq,
    /// Armed at scan time: the whole input contained no quoted literal,
    /// domain literal or comment. See the module docs on the relaxed
    /// legacy mode.
    fallback_armed: bool,
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Result<Self> {
        let seq = scanner::scan(src)?;
        let fallback_armed = seq.is_plain();
        Ok(Self {
            src,
            seq,
            fallback_armed,
        })
    }

    fn grammar(&self, msg: &'static str, offset: usize) -> Error {
        Error::parse(ErrorKind::Grammar, self.src, msg, offset)
    }

    /// Consume the next token (whitespace skipped) along with its arena
    /// index.
    fn bump(&mut self) -> (usize, Token) {
        let tok = self.seq.next_token();
        let idx = if tok.is_end() {
            self.seq.cursor()
        } else {
            self.seq.cursor() - 1
        };
        (idx, tok)
    }

    fn run(mut self, validate: bool) -> Result<AddressList> {
        let mut out = AddressList::new();
        loop {
            let (state, terminator) = self.scan_element()?;
            self.emit(state, validate, &mut out)?;
            if terminator == TokenKind::End {
                break;
            }
        }
        Ok(out)
    }

    /// Classification pass over one list element. Returns the settled scan
    /// state and the terminator kind (`Comma` or `End`).
    fn scan_element(&mut self) -> Result<(ScanState, TokenKind)> {
        let mut st = ScanState::default();
        loop {
            let (idx, tok) = self.bump();
            match tok.kind {
                TokenKind::End => return Ok((st, TokenKind::End)),
                TokenKind::Comma => return Ok((st, TokenKind::Comma)),
                TokenKind::Comment => {}
                TokenKind::Atom
                | TokenKind::QuotedLiteral
                | TokenKind::DomainLiteral
                | TokenKind::AtSign
                | TokenKind::Period => {
                    st.on_substantive(idx)
                        .map_err(|m| self.grammar(m, tok.position()))?;
                }
                TokenKind::LeftAngle => {
                    st.on_left_angle()
                        .map_err(|m| self.grammar(m, tok.position()))?;
                    self.consume_route_body(&mut st)?;
                }
                TokenKind::Colon => {
                    st.on_colon().map_err(|m| self.grammar(m, tok.position()))?;
                    st.group_colon = Some(idx);
                    self.consume_group_body(&mut st)?;
                }
                TokenKind::RightAngle => {
                    return Err(self.grammar("Unexpected '>'", tok.position()));
                }
                TokenKind::Semicolon => {
                    return Err(self.grammar("Unexpected ';'", tok.position()));
                }
                TokenKind::Whitespace => unreachable!("next_token() skips whitespace"),
            }
        }
    }

    /// The cursor sits right after a `<`. Consume up to the matching `>`
    /// and record the body subrange.
    fn consume_route_body(&mut self, st: &mut ScanState) -> Result<()> {
        let body_start = self.seq.cursor();
        loop {
            let (idx, tok) = self.bump();
            match tok.kind {
                TokenKind::RightAngle => {
                    st.body = Some((body_start, idx));
                    return Ok(());
                }
                TokenKind::LeftAngle => {
                    return Err(self.grammar("Unexpected '<'", tok.position()));
                }
                TokenKind::End => {
                    return Err(self.grammar("Missing '>'", tok.position()));
                }
                _ => {}
            }
        }
    }

    /// The cursor sits right after the `:` of a group. Consume the member
    /// list up to the matching top level `;`.
    fn consume_group_body(&mut self, st: &mut ScanState) -> Result<()> {
        let body_start = self.seq.cursor();
        let mut in_angle = false;
        loop {
            let (idx, tok) = self.bump();
            match tok.kind {
                TokenKind::Semicolon if !in_angle => {
                    st.body = Some((body_start, idx));
                    st.group_semi = Some(idx);
                    return Ok(());
                }
                TokenKind::LeftAngle if in_angle => {
                    return Err(self.grammar("Unexpected '<'", tok.position()));
                }
                TokenKind::LeftAngle => in_angle = true,
                TokenKind::RightAngle if !in_angle => {
                    return Err(self.grammar("Unexpected '>'", tok.position()));
                }
                TokenKind::RightAngle => in_angle = false,
                // No nested groups.
                TokenKind::Colon if !in_angle => {
                    return Err(self.grammar("Nested group", tok.position()));
                }
                TokenKind::End => {
                    return Err(self.grammar("Missing ';'", tok.position()));
                }
                _ => {}
            }
        }
    }

    /// Source text covered by the arena subrange, with whitespace tokens
    /// trimmed off both ends.
    fn slice_tokens(&self, start: usize, end: usize) -> &'s str {
        let toks = &self.seq.tokens()[start..end.min(self.seq.len())];
        let is_real = |t: &&Token| !matches!(t.kind, TokenKind::Whitespace | TokenKind::End);
        match (
            toks.iter().find(is_real),
            toks.iter().rev().find(is_real),
        ) {
            (Some(first), Some(last)) => &self.src[first.position()..last.span.end()],
            _ => "",
        }
    }

    /// Canonicalize the personal phrase subrange per the legacy rules:
    /// no tokens gives no phrase; a single quoted literal with no embedded
    /// specials is returned bare; a single token otherwise is returned as
    /// written; several tokens are joined with single blanks, quoted
    /// literals re-quoted.
    fn canonical_phrase(&self, range: Option<(usize, usize)>) -> Option<String> {
        let (start, end) = range?;
        let toks: Vec<&Token> = self.seq.tokens()[start..end]
            .iter()
            .filter(|t| {
                !matches!(
                    t.kind,
                    TokenKind::Whitespace | TokenKind::Comment | TokenKind::End
                )
            })
            .collect();
        match toks.as_slice() {
            [] => None,
            [tok] => match tok.kind {
                TokenKind::QuotedLiteral => {
                    let text = tok.text.as_deref().unwrap_or_default();
                    if text.is_empty() || crate::address::phrase_needs_quoting(text) {
                        // Keep whatever quoting it already carried.
                        Some(tok.span.display(self.src).to_string())
                    } else {
                        Some(text.to_string())
                    }
                }
                TokenKind::Atom => tok.text.clone(),
                _ => Some(tok.span.display(self.src).to_string()),
            },
            _ => {
                let mut phrase = String::new();
                for (i, tok) in toks.iter().enumerate() {
                    if i > 0 {
                        phrase.push(' ');
                    }
                    match tok.kind {
                        TokenKind::QuotedLiteral => {
                            phrase.push('"');
                            for c in tok.text.as_deref().unwrap_or_default().chars() {
                                if c == '"' || c == '\\' {
                                    phrase.push('\\');
                                }
                                phrase.push(c);
                            }
                            phrase.push('"');
                        }
                        TokenKind::Atom => {
                            phrase.push_str(tok.text.as_deref().unwrap_or_default());
                        }
                        _ => phrase.push_str(tok.span.display(self.src)),
                    }
                }
                Some(phrase)
            }
        }
    }

    /// Validation pass over an extracted body subrange.
    ///
    /// `local-part ["@" domain]` where the local part is atoms or quoted
    /// literals joined by `.` and the domain is atoms or domain literals
    /// joined by `.`. Route form bodies may lead with an
    /// `@domain[,@domain...]:` source route.
    fn validate_body(&self, body: &mut TokenSeq, allow_route: bool) -> Result<()> {
        let mut tok = body.next_non_comment();
        if allow_route && tok.kind == TokenKind::AtSign {
            loop {
                self.validate_route_hop(body)?;
                let sep = body.next_non_comment();
                match sep.kind {
                    TokenKind::Comma => {
                        let at = body.next_non_comment();
                        if at.kind != TokenKind::AtSign {
                            return Err(self.grammar("Missing '@'", at.position()));
                        }
                    }
                    TokenKind::Colon => break,
                    _ => return Err(self.grammar("Missing ':'", sep.position())),
                }
            }
            tok = body.next_non_comment();
        }
        // local part
        let mut first = true;
        loop {
            match tok.kind {
                TokenKind::Atom | TokenKind::QuotedLiteral => {}
                _ if first => {
                    return Err(self.grammar("Missing local part", tok.position()));
                }
                _ => return Err(self.grammar("Misplaced '.'", tok.position())),
            }
            first = false;
            let sep = body.next_non_comment();
            match sep.kind {
                TokenKind::Period => tok = body.next_non_comment(),
                TokenKind::AtSign => break,
                TokenKind::End => return Ok(()),
                _ => {
                    return Err(self.grammar("Unexpected token in address", sep.position()));
                }
            }
        }
        // domain
        let mut tok = body.next_non_comment();
        let mut first = true;
        loop {
            match tok.kind {
                TokenKind::Atom | TokenKind::DomainLiteral => {}
                _ if first => return Err(self.grammar("Missing domain", tok.position())),
                _ => return Err(self.grammar("Misplaced '.'", tok.position())),
            }
            first = false;
            let sep = body.next_non_comment();
            match sep.kind {
                TokenKind::Period => tok = body.next_non_comment(),
                TokenKind::End => return Ok(()),
                _ => {
                    return Err(self.grammar("Unexpected token in address", sep.position()));
                }
            }
        }
    }

    /// One `@domain` hop of a source route. The leading `@` has been
    /// consumed.
    fn validate_route_hop(&self, body: &mut TokenSeq) -> Result<()> {
        let mut tok = body.next_non_comment();
        let mut first = true;
        loop {
            match tok.kind {
                TokenKind::Atom | TokenKind::DomainLiteral => {}
                _ if first => return Err(self.grammar("Missing domain", tok.position())),
                _ => return Err(self.grammar("Misplaced '.'", tok.position())),
            }
            first = false;
            let mark = body.cursor();
            let sep = body.next_non_comment();
            match sep.kind {
                TokenKind::Period => tok = body.next_non_comment(),
                _ => {
                    body.push_back_to(mark);
                    return Ok(());
                }
            }
        }
    }

    /// Turn a settled scan state into zero or more addresses.
    fn emit(&mut self, st: ScanState, validate: bool, out: &mut AddressList) -> Result<()> {
        match st.form {
            // Empty slot in the list; contributes nothing.
            Form::Unknown => Ok(()),
            Form::Simple => {
                let start = st.start.expect("simple form saw a substantive token");
                if validate {
                    let mut body = self.seq.extract(start, st.end);
                    self.validate_body(&mut body, false)?;
                } else if self.fallback_armed {
                    return self.emit_blank_delimited(start, st.end, out);
                }
                out.push(Address::from_raw_parts(
                    self.slice_tokens(start, st.end).to_string(),
                    None,
                ));
                Ok(())
            }
            Form::Route => {
                let (body_start, body_end) = st.body.expect("route form records its body");
                let body_text = self.slice_tokens(body_start, body_end);
                if validate {
                    if body_text.is_empty() {
                        let pos = self
                            .seq
                            .get(body_end)
                            .map(|t| t.position())
                            .unwrap_or_default();
                        return Err(self.grammar("Missing address between '<' and '>'", pos));
                    }
                    let mut body = self.seq.extract(body_start, body_end);
                    self.validate_body(&mut body, true)?;
                }
                let personal = self.canonical_phrase(st.phrase);
                out.push(Address::from_raw_parts(body_text.to_string(), personal));
                Ok(())
            }
            Form::Group => {
                let colon = st.group_colon.expect("group form records its colon");
                let semi = st.group_semi.expect("group form records its semicolon");
                if validate {
                    if st.phrase.is_none() {
                        let pos = self.seq.tokens()[colon].position();
                        return Err(self.grammar("Missing group name", pos));
                    }
                    let (body_start, body_end) = st.body.expect("group form records its body");
                    // Members are validated by re-parsing the member list on
                    // its own.
                    let members = self.slice_tokens(body_start, body_end);
                    parse_header_list(members, true)?;
                }
                let start_pos = st
                    .start
                    .map(|s| self.seq.tokens()[s].position())
                    .unwrap_or_else(|| self.seq.tokens()[colon].position());
                let end_pos = self.seq.tokens()[semi].span.end();
                out.push(Address::from_raw_parts(
                    self.src[start_pos..end_pos].to_string(),
                    None,
                ));
                Ok(())
            }
        }
    }

    /// Relaxed legacy mode: split a simple element on blanks, one address
    /// per run of tokens.
    fn emit_blank_delimited(
        &self,
        start: usize,
        end: usize,
        out: &mut AddressList,
    ) -> Result<()> {
        log::trace!(
            "relaxed address parse: splitting {:?} on blanks",
            self.slice_tokens(start, end)
        );
        let mut run_start: Option<usize> = None;
        for idx in start..end {
            let tok = &self.seq.tokens()[idx];
            if tok.kind == TokenKind::Whitespace {
                if let Some(rs) = run_start.take() {
                    out.push(Address::from_raw_parts(
                        self.slice_tokens(rs, idx).to_string(),
                        None,
                    ));
                }
            } else if run_start.is_none() {
                run_start = Some(idx);
            }
        }
        if let Some(rs) = run_start {
            out.push(Address::from_raw_parts(
                self.slice_tokens(rs, end).to_string(),
                None,
            ));
        }
        Ok(())
    }
}
