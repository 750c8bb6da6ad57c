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

use std::io::Write;

use super::*;

#[test]
fn test_multipart_streaming_two_parts() {
    let body = b"part1\r\n--B\r\npart2\r\n--B--\r\n";
    let mut reader = BoundaryReader::new(io::Cursor::new(&body[..]), "B", false);

    let mut part = Vec::new();
    reader.read_to_end(&mut part).unwrap();
    assert_eq!(part, b"part1");
    assert!(reader.found_boundary());
    assert!(!reader.found_final_boundary());

    assert!(reader.next_part().unwrap());
    part.clear();
    reader.read_to_end(&mut part).unwrap();
    assert_eq!(part, b"part2");
    assert!(reader.found_final_boundary());
    assert!(reader.is_complete());
    assert!(!reader.next_part().unwrap());
}

#[test]
fn test_multipart_split_parts() {
    let m = split_parts(b"part1\r\n--B\r\npart2\r\n--B--\r\n", "B", false).unwrap();
    assert_eq!(m.parts, vec![b"part1".to_vec(), b"part2".to_vec()]);
    assert!(m.complete);

    // the canonical shape, body opening with a boundary line
    let m = split_parts(b"--B\r\npart1\r\n--B\r\npart2\r\n--B--\r\n", "B", false).unwrap();
    assert_eq!(m.parts, vec![b"part1".to_vec(), b"part2".to_vec()]);
    assert!(m.complete);
}

#[test]
fn test_multipart_near_miss_is_content() {
    // "--BX" differs from the boundary by a trailing character and must
    // come through verbatim.
    let m = split_parts(b"a\r\n--BX\r\nb\r\n--B\r\nc\r\n--B--\r\n", "B", false).unwrap();
    assert_eq!(m.parts, vec![b"a\r\n--BX\r\nb".to_vec(), b"c".to_vec()]);

    // junk after the marker disqualifies the line too
    let m = split_parts(b"a\r\n--B junk\r\n--B--\r\n", "B", false).unwrap();
    assert_eq!(m.parts, vec![b"a\r\n--B junk".to_vec()]);

    // a bare CR does not anchor a boundary
    let m = split_parts(b"a\r--B\rb\r\n--B--\r\n", "B", false).unwrap();
    assert_eq!(m.parts, vec![b"a\r--B\rb".to_vec()]);
}

#[test]
fn test_multipart_lf_only_bodies() {
    let m = split_parts(b"--B\npart one\n--B\npart two\n--B--\n", "B", false).unwrap();
    assert_eq!(m.parts, vec![b"part one".to_vec(), b"part two".to_vec()]);
    assert!(m.complete);
}

#[test]
fn test_multipart_trailing_whitespace_on_boundary_line() {
    let m = split_parts(b"--B \t\r\npart\r\n--B-- \r\n", "B", false).unwrap();
    assert_eq!(m.parts, vec![b"part".to_vec()]);
    assert!(m.complete);
}

#[test]
fn test_multipart_truncated_body() {
    let m = split_parts(b"part1\r\n--B\r\npart2", "B", false).unwrap();
    assert_eq!(m.parts, vec![b"part1".to_vec(), b"part2".to_vec()]);
    assert!(!m.complete);

    let err = split_parts(b"part1\r\n--B\r\npart2", "B", true).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Incomplete);
}

#[test]
fn test_multipart_boundary_at_eof_without_newline() {
    let m = split_parts(b"part1\r\n--B--", "B", false).unwrap();
    assert_eq!(m.parts, vec![b"part1".to_vec()]);
    assert!(m.complete);
}

#[test]
fn test_multipart_discovered_boundary_and_preamble() {
    let body = b"This is the preamble.\r\n--frontier\r\nhello\r\n--frontier--\r\n";
    let m = split_parts_discover(body, false).unwrap();
    assert_eq!(m.preamble.as_deref(), Some(&b"This is the preamble.\r\n"[..]));
    assert_eq!(m.parts, vec![b"hello".to_vec()]);
    assert!(m.complete);

    let mut reader = BoundaryReader::discover(io::Cursor::new(&body[..]), false);
    reader.read_preamble().unwrap();
    assert_eq!(reader.marker(), b"--frontier");
}

#[test]
fn test_multipart_preamble_with_known_boundary() {
    let body = b"preamble\r\n--B\r\nx\r\n--B--\r\n";
    let mut reader = BoundaryReader::new(io::Cursor::new(&body[..]), "B", false);
    assert_eq!(reader.read_preamble().unwrap(), b"preamble\r\n");
    let mut part = Vec::new();
    reader.read_to_end(&mut part).unwrap();
    assert_eq!(part, b"x");
}

#[test]
fn test_multipart_from_a_file_stream() {
    let mut tmp = tempfile::tempfile().unwrap();
    tmp.write_all(b"--B\r\nfrom a file\r\n--B--\r\n").unwrap();
    use std::io::Seek;
    tmp.rewind().unwrap();

    let mut reader = BoundaryReader::new(std::io::BufReader::new(tmp), "B", false);
    let mut part = Vec::new();
    reader.read_to_end(&mut part).unwrap();
    assert_eq!(part, b"");
    assert!(reader.next_part().unwrap());
    part.clear();
    reader.read_to_end(&mut part).unwrap();
    assert_eq!(part, b"from a file");
    assert!(reader.is_complete());
}

#[test]
fn test_multipart_make_boundary_is_unique() {
    let counter = AtomicU64::new(0);
    let a = make_boundary(&counter);
    let b = make_boundary(&counter);
    assert!(a != b);
    assert!(a.starts_with("=_"));
    // usable as a header parameter without quoting surprises
    assert!(a.bytes().all(|c| c.is_ascii_alphanumeric() || c == b'=' || c == b'_'));
}
