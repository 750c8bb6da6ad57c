/*
 * epistoli - utils module
 *
 * Copyright 2017-2020 Manos Pitsidianakis
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
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

macro_rules! is_whitespace {
    ($var:expr) => {
        $var == b' ' || $var == b'\t' || $var == b'\n' || $var == b'\r'
    };
}

pub trait BytesExt {
    fn rtrim(&self) -> &Self;
    fn ltrim(&self) -> &Self;
    fn trim(&self) -> &Self;
    fn is_quoted(&self) -> bool;
}

impl BytesExt for [u8] {
    fn rtrim(&self) -> &Self {
        if let Some(last) = self.iter().rposition(|b| !is_whitespace!(*b)) {
            &self[..=last]
        } else {
            &[]
        }
    }

    fn ltrim(&self) -> &Self {
        if let Some(first) = self.iter().position(|b| !is_whitespace!(*b)) {
            &self[first..]
        } else {
            &[]
        }
    }

    fn trim(&self) -> &[u8] {
        self.rtrim().ltrim()
    }

    fn is_quoted(&self) -> bool {
        self.starts_with(b"\"") && self.ends_with(b"\"") && self.len() > 1
    }
}

pub mod random {
    use std::{fs::File, io::prelude::*};

    const EXPECT: &str = "Could not open/read /dev/urandom";

    pub fn random_u64() -> u64 {
        let mut f = File::open("/dev/urandom").expect(EXPECT);
        let mut buffer = [0; 8];

        // read exactly 8 bytes
        f.read_exact(&mut buffer).expect(EXPECT);

        u64::from_le_bytes(buffer)
    }

    pub fn random_u32() -> u32 {
        let mut f = File::open("/dev/urandom").expect(EXPECT);
        let mut buffer = [0; 4];

        f.read_exact(&mut buffer).expect(EXPECT);

        u32::from_le_bytes(buffer)
    }
}

/// A fresh `Message-Id` value for `fqdn`. Uniqueness comes from the
/// injected counter on top of clock and urandom material, so the caller
/// decides the counter's scope instead of a hidden global.
pub fn make_message_id(fqdn: &str, counter: &AtomicU64) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!(
        "<{:x}.{:x}.{:x}@{}>",
        timestamp,
        counter.fetch_add(1, Ordering::Relaxed),
        random::random_u64(),
        fqdn
    )
}
