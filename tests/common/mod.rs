//! Byte-level helpers for inspecting generated files.
//!
//! Cross-reference offsets are absolute byte positions, so everything
//! here works on raw bytes rather than lossy strings.
#![allow(dead_code)]

/// First position of `needle` at or after `from`.
pub fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Last position of `needle`.
pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|w| w == needle)
}

/// One parsed cross-reference record.
#[derive(Debug, Clone, Copy)]
pub struct XrefRecord {
    pub offset: u64,
    pub generation: u32,
    pub in_use: bool,
}

/// The parsed cross-reference section and trailer of a generated file.
#[derive(Debug)]
pub struct FileTail {
    pub xref_offset: u64,
    pub size: usize,
    pub records: Vec<XrefRecord>,
    pub trailer: String,
}

/// Parse the footer, cross-reference table, and trailer dictionary.
pub fn parse_tail(bytes: &[u8]) -> FileTail {
    let sx = rfind(bytes, b"startxref\n").expect("startxref present");
    let after = sx + "startxref\n".len();
    let end = find(bytes, b"\n", after).expect("offset line terminated");
    let xref_offset: u64 = std::str::from_utf8(&bytes[after..end])
        .unwrap()
        .trim()
        .parse()
        .expect("numeric xref offset");

    let table = xref_offset as usize;
    assert!(
        bytes[table..].starts_with(b"xref\n0 "),
        "xref section starts at the recorded offset"
    );
    let header_start = table + "xref\n".len();
    let header_end = find(bytes, b"\n", header_start).unwrap();
    let header = std::str::from_utf8(&bytes[header_start..header_end]).unwrap();
    let size: usize = header.strip_prefix("0 ").unwrap().parse().unwrap();

    let mut records = Vec::with_capacity(size);
    let mut p = header_end + 1;
    for _ in 0..size {
        let record = std::str::from_utf8(&bytes[p..p + 20]).unwrap();
        records.push(XrefRecord {
            offset: record[0..10].parse().unwrap(),
            generation: record[11..16].parse().unwrap(),
            in_use: &record[17..18] == "n",
        });
        p += 20;
    }

    let trailer_start = find(bytes, b"trailer\n", p).expect("trailer present");
    let trailer_end = find(bytes, b">>\nstartxref", trailer_start).unwrap();
    let trailer = String::from_utf8_lossy(&bytes[trailer_start..trailer_end]).into_owned();

    FileTail {
        xref_offset,
        size,
        records,
        trailer,
    }
}

impl FileTail {
    /// Resolve a `/Key n 0 R` reference in the trailer to its object
    /// number.
    pub fn trailer_ref(&self, key: &str) -> Option<u32> {
        let tag = format!("/{} ", key);
        let at = self.trailer.find(&tag)? + tag.len();
        let rest = &self.trailer[at..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    /// The recorded byte offset of an object, by number.
    pub fn object_offset(&self, number: u32) -> u64 {
        let record = self.records[number as usize];
        assert!(record.in_use, "object {} is in use", number);
        record.offset
    }
}

/// The first few hundred bytes of the object with the given number.
pub fn object_at<'a>(bytes: &'a [u8], tail: &FileTail, number: u32) -> &'a [u8] {
    let offset = tail.object_offset(number) as usize;
    let header = format!("{} 0 obj", number);
    assert!(
        bytes[offset..].starts_with(header.as_bytes()),
        "object {} starts at its recorded offset",
        number
    );
    let end = (offset + 400).min(bytes.len());
    &bytes[offset..end]
}
