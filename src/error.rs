/*
 * epistoli - error module
 *
 * Copyright 2017 Manos Pitsidianakis
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

/*!
 * An error object for `epistoli`
 */

use std::{borrow::Cow, error, fmt, io, result, str, string, sync::Arc};

pub type Result<T> = result::Result<T, Error>;

/// Classification of failures this crate produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A malformed lexical construct: illegal character, unterminated
    /// quote/comment/domain literal.
    Lexical,
    /// A well-formed token in the wrong place: bare `>`, nested group,
    /// missing phrase or domain.
    Grammar,
    /// A list parse succeeded but the caller required exactly one address.
    Cardinality,
    /// A multipart body ended before its closing boundary, under strict
    /// policy.
    Incomplete,
    Io,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Lexical => "Lexical error",
                Self::Grammar => "Grammar error",
                Self::Cardinality => "Cardinality error",
                Self::Incomplete => "Incomplete input",
                Self::Io => "I/O error",
                Self::Other => "Error",
            }
        )
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub summary: Option<Cow<'static, str>>,
    pub details: Cow<'static, str>,
    pub kind: ErrorKind,
    /// Byte offset of the offending character or token in the parsed
    /// source, when the failure came out of a parser.
    pub offset: Option<usize>,
    pub source: Option<Arc<dyn error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new<M>(msg: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        Self {
            summary: None,
            details: msg.into(),
            kind: ErrorKind::Other,
            offset: None,
            source: None,
        }
    }

    /// A parse failure carrying the source text and the byte offset of the
    /// offending character or token.
    pub fn parse<M>(kind: ErrorKind, src: &str, msg: M, offset: usize) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        let details = msg.into();
        Self {
            summary: Some(format!("{} at position {} in {:?}", details, offset, src).into()),
            details,
            kind,
            offset: Some(offset),
            source: None,
        }
    }

    pub fn set_summary<M>(mut self, summary: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        self.summary = Some(summary.into());
        self
    }

    pub fn set_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn set_source(
        mut self,
        new_val: Option<Arc<dyn error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.source = new_val;
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(summary) = self.summary.as_ref() {
            writeln!(f, "Summary: {}", summary)?;
        }
        write!(f, "{}", self.details)?;
        if let Some(source) = self.source.as_ref() {
            write!(f, "\nCaused by: {}", source)?;
        }
        Ok(())
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source.as_ref().map(|s| &(*(*s)) as _)
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(kind: io::Error) -> Self {
        Self::new(kind.to_string())
            .set_kind(ErrorKind::Io)
            .set_source(Some(Arc::new(kind)))
    }
}

impl From<string::FromUtf8Error> for Error {
    #[inline]
    fn from(kind: string::FromUtf8Error) -> Self {
        Self::new(format!("{:?}", kind)).set_source(Some(Arc::new(kind)))
    }
}

impl From<str::Utf8Error> for Error {
    #[inline]
    fn from(kind: str::Utf8Error) -> Self {
        Self::new(format!("{:?}", kind)).set_source(Some(Arc::new(kind)))
    }
}

impl From<&str> for Error {
    #[inline]
    fn from(kind: &str) -> Self {
        Self::new(kind.to_string())
    }
}

impl From<String> for Error {
    #[inline]
    fn from(kind: String) -> Self {
        Self::new(kind)
    }
}
