/*
 * epistoli - multipart module
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

//! Splitting `MIME` multipart bodies on their boundary markers.
//!
//! [`BoundaryReader`] wraps any byte stream and hands back one body part at
//! a time: content bytes pass through until a `[CR]LF--boundary` line is
//! recognized, at which point the reader reports end-of-part. A candidate
//! match that falls apart midway is replayed byte for byte through the
//! same state machine, so boundary-like noise inside part content is never
//! lost or corrupted. Backtracking uses an explicit replay queue, not the
//! stream's own positioning.

use std::{
    collections::VecDeque,
    io::{self, Read},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    error::{Error, ErrorKind, Result},
    utils::{random, BytesExt},
};

pub struct BoundaryReader<R> {
    inner: R,
    /// The full marker, `--` included. Empty until discovered, in
    /// discovery mode.
    marker: Vec<u8>,
    /// Bytes consumed by a failed match attempt, queued for reprocessing.
    replay: VecDeque<u8>,
    strict: bool,
    /// No byte handed out yet; a boundary may sit at the very start
    /// without a leading line break.
    bof: bool,
    /// The start-of-stream boundary match fired.
    bof_boundary: bool,
    part_done: bool,
    found_boundary: bool,
    final_boundary: bool,
    at_eof: bool,
}

impl<R: Read> BoundaryReader<R> {
    /// Wrap `inner`, delimiting parts on `--boundary`. `strict` makes a
    /// missing closing boundary an error instead of a flagged condition.
    pub fn new(inner: R, boundary: &str, strict: bool) -> Self {
        let mut marker = Vec::with_capacity(boundary.len() + 2);
        marker.extend_from_slice(b"--");
        marker.extend_from_slice(boundary.as_bytes());
        Self {
            inner,
            marker,
            replay: VecDeque::new(),
            strict,
            bof: true,
            bof_boundary: false,
            part_done: false,
            found_boundary: false,
            final_boundary: false,
            at_eof: false,
        }
    }

    /// For bodies whose content type named no boundary parameter: the
    /// first `--`-led line of the stream defines it. Only
    /// [`Self::read_preamble`] can settle the marker.
    pub fn discover(inner: R, strict: bool) -> Self {
        let mut this = Self::new(inner, "", strict);
        this.marker.clear();
        this
    }

    /// The full boundary marker, leading `--` included. Empty while still
    /// undiscovered.
    pub fn marker(&self) -> &[u8] {
        &self.marker
    }

    pub fn found_boundary(&self) -> bool {
        self.found_boundary
    }

    pub fn found_final_boundary(&self) -> bool {
        self.final_boundary
    }

    /// False once the stream ran out before the closing `--boundary--`.
    pub fn is_complete(&self) -> bool {
        self.final_boundary || !self.at_eof
    }

    /// Step over the boundary that ended the current part. Drains any
    /// unread remainder of the current part first. Returns false when the
    /// final boundary or end of stream has been seen.
    pub fn next_part(&mut self) -> io::Result<bool> {
        let mut sink = [0_u8; 256];
        while self.read(&mut sink)? != 0 {}
        if self.final_boundary || self.at_eof {
            return Ok(false);
        }
        self.part_done = false;
        Ok(true)
    }

    /// Consume everything up to and including the first boundary line,
    /// returning the bytes before it: the multipart preamble. In
    /// discovery mode this is also what settles the marker.
    pub fn read_preamble(&mut self) -> io::Result<Vec<u8>> {
        self.bof = false;
        let mut preamble: Vec<u8> = Vec::new();
        let mut line: Vec<u8> = Vec::new();
        loop {
            line.clear();
            loop {
                match self.next_byte()? {
                    None => break,
                    Some(b'\n') => {
                        line.push(b'\n');
                        break;
                    }
                    Some(b) => line.push(b),
                }
            }
            if self.check_boundary_line(&line) {
                if self.final_boundary {
                    self.part_done = true;
                }
                return Ok(preamble);
            }
            preamble.extend_from_slice(&line);
            if !line.ends_with(b"\n") {
                // Stream ran out with no boundary in sight.
                self.at_eof = true;
                self.part_done = true;
                if self.strict {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "multipart body has no boundary line",
                    ));
                }
                log::warn!("multipart body has no boundary line");
                return Ok(preamble);
            }
        }
    }

    /// Whether `line` (terminator still attached) is a boundary line. In
    /// discovery mode the first `--`-led line defines the marker.
    fn check_boundary_line(&mut self, line: &[u8]) -> bool {
        let trimmed = line.rtrim();
        if self.marker.is_empty() {
            if trimmed.len() > 2 && trimmed.starts_with(b"--") {
                if trimmed.len() > 4 && trimmed.ends_with(b"--") {
                    self.marker = trimmed[..trimmed.len() - 2].to_vec();
                    self.final_boundary = true;
                } else {
                    self.marker = trimmed.to_vec();
                }
                self.found_boundary = true;
                return true;
            }
            return false;
        }
        if !trimmed.starts_with(&self.marker) {
            return false;
        }
        match &trimmed[self.marker.len()..] {
            b"" => {
                self.found_boundary = true;
                true
            }
            b"--" => {
                self.found_boundary = true;
                self.final_boundary = true;
                true
            }
            _ => false,
        }
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(b) = self.replay.pop_front() {
            return Ok(Some(b));
        }
        let mut buf = [0_u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// One content byte of the current part, or `None` at its end.
    fn read_part_byte(&mut self) -> io::Result<Option<u8>> {
        if self.part_done {
            return Ok(None);
        }
        if self.bof {
            self.bof = false;
            if !self.marker.is_empty() && self.try_match(None)? {
                self.bof_boundary = true;
                self.part_done = true;
                return Ok(None);
            }
        }
        match self.next_byte()? {
            None => {
                // EOF is an implicit boundary.
                self.at_eof = true;
                self.part_done = true;
                if self.strict {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "multipart body ended before its closing boundary",
                    ));
                }
                log::warn!("multipart body ended before its closing boundary");
                Ok(None)
            }
            Some(b @ (b'\r' | b'\n')) => {
                if !self.marker.is_empty() && self.try_match(Some(b))? {
                    self.part_done = true;
                    return Ok(None);
                }
                Ok(Some(b))
            }
            Some(b) => Ok(Some(b)),
        }
    }

    /// Attempt a boundary match. `line_break` is the already-consumed CR
    /// or LF that anchors it, or `None` at start of stream. On failure
    /// every byte looked at goes back on the replay queue, to be run
    /// through the state machine again as ordinary input.
    fn try_match(&mut self, line_break: Option<u8>) -> io::Result<bool> {
        let mut consumed: Vec<u8> = Vec::new();
        let matched = self.match_marker(line_break, &mut consumed)?;
        if !matched {
            for b in consumed.into_iter().rev() {
                self.replay.push_front(b);
            }
        }
        Ok(matched)
    }

    fn match_marker(&mut self, line_break: Option<u8>, consumed: &mut Vec<u8>) -> io::Result<bool> {
        if line_break == Some(b'\r') {
            match self.next_byte()? {
                Some(b'\n') => consumed.push(b'\n'),
                Some(other) => {
                    consumed.push(other);
                    return Ok(false);
                }
                None => return Ok(false),
            }
        }
        for idx in 0..self.marker.len() {
            match self.next_byte()? {
                Some(b) => {
                    consumed.push(b);
                    if b != self.marker[idx] {
                        return Ok(false);
                    }
                }
                None => return Ok(false),
            }
        }
        // Optional trailing `--` flags the final boundary, then linear
        // whitespace and CRLF, LF or EOF must close the line.
        let mut is_final = false;
        let mut next = self.next_byte()?;
        if next == Some(b'-') {
            consumed.push(b'-');
            match self.next_byte()? {
                Some(b'-') => {
                    consumed.push(b'-');
                    is_final = true;
                    next = self.next_byte()?;
                }
                Some(other) => {
                    consumed.push(other);
                    return Ok(false);
                }
                None => return Ok(false),
            }
        }
        while let Some(b @ (b' ' | b'\t')) = next {
            consumed.push(b);
            next = self.next_byte()?;
        }
        match next {
            None => self.at_eof = true,
            Some(b'\n') => consumed.push(b'\n'),
            Some(b'\r') => {
                consumed.push(b'\r');
                match self.next_byte()? {
                    Some(b'\n') => consumed.push(b'\n'),
                    Some(other) => {
                        consumed.push(other);
                        return Ok(false);
                    }
                    None => return Ok(false),
                }
            }
            Some(other) => {
                consumed.push(other);
                return Ok(false);
            }
        }
        self.found_boundary = true;
        self.final_boundary |= is_final;
        Ok(true)
    }
}

impl<R: Read> Read for BoundaryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.read_part_byte()? {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

/// A multipart body split into its pieces.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multipart {
    pub preamble: Option<Vec<u8>>,
    pub parts: Vec<Vec<u8>>,
    /// False when the closing boundary never showed up.
    pub complete: bool,
}

fn incomplete(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::new("Incomplete multipart body").set_kind(ErrorKind::Incomplete)
    } else {
        err.into()
    }
}

/// Split a whole in-memory body on `boundary`. Content before the first
/// boundary line, when the body does not open with one, counts as the
/// first part.
pub fn split_parts(body: &[u8], boundary: &str, strict: bool) -> Result<Multipart> {
    let mut reader = BoundaryReader::new(io::Cursor::new(body), boundary, strict);
    let mut parts: Vec<Vec<u8>> = Vec::new();
    loop {
        let mut chunk = Vec::new();
        reader.read_to_end(&mut chunk).map_err(incomplete)?;
        parts.push(chunk);
        if !reader.next_part().map_err(incomplete)? {
            break;
        }
    }
    if reader.bof_boundary {
        parts.remove(0);
    }
    Ok(Multipart {
        preamble: None,
        parts,
        complete: reader.is_complete(),
    })
}

/// Split a body whose boundary was never declared: the first `--`-led
/// line defines it, and everything before that line is the preamble.
pub fn split_parts_discover(body: &[u8], strict: bool) -> Result<Multipart> {
    let mut reader = BoundaryReader::discover(io::Cursor::new(body), strict);
    let preamble = reader.read_preamble().map_err(incomplete)?;
    let mut parts: Vec<Vec<u8>> = Vec::new();
    while !reader.part_done {
        let mut chunk = Vec::new();
        reader.read_to_end(&mut chunk).map_err(incomplete)?;
        parts.push(chunk);
        if !reader.next_part().map_err(incomplete)? {
            break;
        }
    }
    Ok(Multipart {
        preamble: Some(preamble),
        parts,
        complete: reader.is_complete(),
    })
}

/// A fresh boundary token, unique through the injected counter plus
/// urandom material. The caller owns the counter's scope.
pub fn make_boundary(counter: &AtomicU64) -> String {
    format!(
        "=_{:x}_{:x}",
        random::random_u64(),
        counter.fetch_add(1, Ordering::Relaxed)
    )
}

#[cfg(test)]
mod tests;
