/*
 * epistoli - headers module
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

//! An ordered header block.
//!
//! [`Headers`] keeps entries in wire order and matches names ASCII
//! case-insensitively while preserving the case they were written with.
//! A freshly built block starts out seeded with null-valued placeholder
//! entries that pin the customary header ordering; placeholders are never
//! serialized, they only decide where a later [`Headers::add`] lands.

use std::{
    fmt,
    io::{self, BufRead, Write},
};

use crate::error::Result;

/// The customary ordering of well-known headers. The bare `":"` entry
/// marks where unrecognized headers go.
const PREFERRED_ORDER: &[&str] = &[
    "Return-Path",
    "Received",
    "Resent-Date",
    "Resent-From",
    "Resent-Sender",
    "Resent-To",
    "Resent-Cc",
    "Resent-Bcc",
    "Resent-Message-Id",
    "Date",
    "From",
    "Sender",
    "Reply-To",
    "To",
    "Cc",
    "Bcc",
    "Message-Id",
    "In-Reply-To",
    "References",
    "Subject",
    "Comments",
    "Keywords",
    "Errors-To",
    "MIME-Version",
    "Content-Type",
    "Content-Transfer-Encoding",
    "Content-MD5",
    ":",
    "Content-Length",
    "Status",
];

/// Headers whose occurrences read newest first, so additions are
/// prepended among entries of the same name.
const REVERSE_ORDER: &[&str] = &["Received", "Return-Path"];

/// One header line. `value: None` is a placeholder: invisible to readers
/// and serialization, but it holds the entry's position for future adds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    entries: Vec<HeaderEntry>,
}

impl Default for Headers {
    fn default() -> Self {
        Self::new()
    }
}

impl Headers {
    /// A block seeded with the preferred-order placeholders.
    pub fn new() -> Self {
        Self {
            entries: PREFERRED_ORDER
                .iter()
                .map(|name| HeaderEntry {
                    name: (*name).to_string(),
                    value: None,
                })
                .collect(),
        }
    }

    /// A block with no placeholders, for loading an existing header block
    /// in its own order.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Load an `RFC822` header block: reads up to (and consuming) the
    /// blank separator line or end of input, folding continuation lines
    /// onto their parent entry.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self> {
        let mut headers = Self::empty();
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            if line.is_empty() {
                break;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                headers.append_continuation(&line);
            } else {
                headers.add_raw_line(&line);
            }
        }
        Ok(headers)
    }

    fn matches(entry: &HeaderEntry, name: &str) -> bool {
        entry.name.eq_ignore_ascii_case(name)
    }

    /// All non-placeholder values for `name`, in block order.
    pub fn get(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| Self::matches(e, name))
            .filter_map(|e| e.value.as_deref())
            .collect()
    }

    /// First value for `name` when `delimiter` is `None`, else all values
    /// joined by it. `None` when no value exists.
    pub fn get_joined(&self, name: &str, delimiter: Option<&str>) -> Option<String> {
        let values = self.get(name);
        match (values.as_slice(), delimiter) {
            ([], _) => None,
            ([first, ..], None) => Some((*first).to_string()),
            (all, Some(d)) => Some(all.join(d)),
        }
    }

    /// Replace the first entry matching `name` in place and drop every
    /// other one, collapsing to a single positioned entry. Acts as
    /// [`Self::add`] when nothing matches.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let Some(first) = self.entries.iter().position(|e| Self::matches(e, name)) else {
            self.add(name, value);
            return;
        };
        self.entries[first].value = Some(value.into());
        let mut idx = first + 1;
        while idx < self.entries.len() {
            if Self::matches(&self.entries[idx], name) {
                self.entries.remove(idx);
            } else {
                idx += 1;
            }
        }
    }

    /// Append a value for `name`, after the last entry of the same name.
    /// `Received` and `Return-Path` instead go before the first one, so
    /// repeated adds read in reverse chronological order. A name with no
    /// entry at all goes right before the `":"` ordering marker, or at
    /// the end without one.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        let entry = HeaderEntry {
            name: name.to_string(),
            value: Some(value.into()),
        };
        let reverse = REVERSE_ORDER.iter().any(|r| r.eq_ignore_ascii_case(name));
        let slot = if reverse {
            self.entries.iter().position(|e| Self::matches(e, name))
        } else {
            self.entries
                .iter()
                .rposition(|e| Self::matches(e, name))
                .map(|idx| idx + 1)
        };
        let slot = slot
            .or_else(|| self.entries.iter().position(|e| e.name == ":"))
            .unwrap_or(self.entries.len());
        self.entries.insert(slot, entry);
    }

    /// Null out the first entry matching `name`, keeping it as a
    /// placeholder for its position, and delete every other one.
    pub fn remove(&mut self, name: &str) {
        let Some(first) = self.entries.iter().position(|e| Self::matches(e, name)) else {
            return;
        };
        self.entries[first].value = None;
        let mut idx = first + 1;
        while idx < self.entries.len() {
            if Self::matches(&self.entries[idx], name) {
                self.entries.remove(idx);
            } else {
                idx += 1;
            }
        }
    }

    /// Append a raw header line, split on the first `:`. A line without
    /// one becomes a bare name with no value.
    pub fn add_raw_line(&mut self, line: &str) {
        match line.split_once(':') {
            Some((name, value)) => self.entries.push(HeaderEntry {
                name: name.trim_end().to_string(),
                value: Some(value.trim_start_matches(|c| c == ' ' || c == '\t').to_string()),
            }),
            None => {
                log::warn!("header line without a colon: {:?}", line);
                self.entries.push(HeaderEntry {
                    name: line.trim_end().to_string(),
                    value: None,
                });
            }
        }
    }

    /// Fold a continuation line onto the previous entry, joined by CRLF.
    pub fn append_continuation(&mut self, line: &str) {
        match self.entries.last_mut() {
            Some(entry) => match entry.value.as_mut() {
                Some(value) => {
                    value.push_str("\r\n");
                    value.push_str(line);
                }
                None => entry.value = Some(line.to_string()),
            },
            None => log::warn!("continuation line with no header to continue: {:?}", line),
        }
    }

    /// Iterate non-placeholder entries in block order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|e| e.value.as_deref().map(|v| (e.name.as_str(), v)))
    }

    /// Serialize every valued entry as `Name: value\r\n`, skipping names
    /// in `ignore`. The blank line that terminates a header block is the
    /// caller's to write.
    pub fn write_to<W: Write>(&self, writer: &mut W, ignore: &[&str]) -> io::Result<()> {
        for (name, value) in self.iter() {
            if ignore.iter().any(|i| i.eq_ignore_ascii_case(name)) {
                continue;
            }
            write!(writer, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}
