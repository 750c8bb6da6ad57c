/*
 * epistoli - lib.rs
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

#![deny(
    rustdoc::redundant_explicit_links,
    /* groups */
    clippy::correctness,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::style,
    /* restriction */
    clippy::dbg_macro,
    clippy::rc_buffer,
    clippy::as_underscore,
    /* rustdoc */
    rustdoc::broken_intra_doc_links,
    /* pedantic */
    clippy::doc_markdown,
    clippy::expect_fun_call,
    clippy::or_fun_call
)]
#![allow(clippy::option_if_let_else, clippy::cognitive_complexity)]

//! A crate that parses the structured parts of Internet mail:
//!
//! - `RFC5322`/`RFC822` address lists, with the full mailbox, route-addr and
//!   group grammar (see modules [`scanner`], [`parser`] and [`address`])
//! - structured header values such as `Content-Type` (see module
//!   [`tokenizer`])
//! - ordered header blocks with their folding and serialization rules (see
//!   module [`headers`])
//! - `MIME` multipart bodies, split on their boundary markers from any byte
//!   stream (see module [`multipart`])
//!
//! Address parsing is a two stage affair: [`scanner::scan`] turns the raw
//! string into a rewindable token sequence, and [`parser`] classifies and
//! validates each address in it. Decoded (`RFC2047`) display names come out
//! of module [`encodings`].

pub mod address;
pub mod encodings;
pub mod error;
pub mod headers;
pub mod multipart;
pub mod parser;
pub mod scanner;
pub mod tokenizer;
pub mod utils;

pub use address::Address;
pub use error::{Error, ErrorKind, Result};
pub use headers::Headers;
pub use multipart::BoundaryReader;

#[macro_use]
extern crate serde_derive;
pub extern crate log;
/* parser */
extern crate data_encoding;
pub extern crate nom;

pub extern crate smallvec;
