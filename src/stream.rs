//! Buffered stream content with deferred compression.
//!
//! Stream payloads are accumulated in memory while the rest of the file
//! keeps moving forward, because the `/Length` entry must be known before
//! the first payload byte is written. On close the chunks are stitched
//! together, compressed with zlib at best compression, and the smaller of
//! the two representations is emitted.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::document::DocumentWriter;
use crate::error::Result;
use crate::object::ObjectId;

/// Chunk granularity of the content buffer.
const CHUNK_SIZE: usize = 1024;

/// Growable byte accumulator made of fixed-size chunks.
///
/// A full chunk is sealed and a new one started; a bulk append of at
/// least one chunk size becomes its own chunk without copying through
/// the current one.
#[derive(Debug)]
pub(crate) struct ContentBuffer {
    chunks: Vec<Vec<u8>>,
    cur: Vec<u8>,
    size: usize,
}

impl ContentBuffer {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            cur: Vec::with_capacity(CHUNK_SIZE),
            size: 0,
        }
    }

    /// Total bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.size
    }

    fn seal(&mut self) {
        if !self.cur.is_empty() {
            let full = std::mem::replace(&mut self.cur, Vec::with_capacity(CHUNK_SIZE));
            self.chunks.push(full);
        }
    }

    fn push(&mut self, byte: u8) {
        self.cur.push(byte);
        self.size += 1;
        if self.cur.len() == CHUNK_SIZE {
            self.seal();
        }
    }

    /// Append raw bytes.
    pub fn append_data(&mut self, data: &[u8]) {
        if data.len() >= CHUNK_SIZE {
            self.seal();
            self.chunks.push(data.to_vec());
            self.size += data.len();
            return;
        }
        for &byte in data {
            self.push(byte);
        }
    }

    /// Append text, escaping the characters that delimit string literals.
    pub fn append_text(&mut self, text: &str) {
        for &byte in text.as_bytes() {
            if byte == b'(' || byte == b')' || byte == b'\\' {
                self.push(b'\\');
            }
            self.push(byte);
        }
    }

    /// Append an integer coordinate pair, space separated.
    pub fn append_point(&mut self, x: i32, y: i32) {
        self.append_data(format!(" {} {} ", x, y).as_bytes());
    }

    /// Concatenate all chunks into one contiguous buffer of exactly the
    /// recorded size.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.seal();
        if self.chunks.len() == 1 {
            return self.chunks.pop().unwrap_or_default();
        }
        let mut out = Vec::with_capacity(self.size);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }
}

/// A stream object under construction.
///
/// The builder owns the payload buffer for exactly one object. Dictionary
/// entries may be written through the document between [`open`] and
/// [`close`]; the payload itself is held back until [`close`] so that the
/// declared length is exact.
///
/// [`open`]: StreamBuilder::open
/// [`close`]: StreamBuilder::close
#[derive(Debug)]
pub struct StreamBuilder {
    id: ObjectId,
    buf: ContentBuffer,
    opened: bool,
}

impl StreamBuilder {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self {
            id,
            buf: ContentBuffer::new(),
            opened: false,
        }
    }

    /// The object this stream will be written as.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when no payload bytes have been accumulated.
    pub fn is_empty(&self) -> bool {
        self.buf.len() == 0
    }

    /// Append operator text verbatim.
    pub fn append_cmd(&mut self, text: &str) {
        self.buf.append_data(text.as_bytes());
    }

    /// Append string-literal text, escaping `(`, `)` and `\`.
    pub fn append_text(&mut self, text: &str) {
        self.buf.append_text(text);
    }

    /// Append raw bytes.
    pub fn append_data(&mut self, data: &[u8]) {
        self.buf.append_data(data);
    }

    /// Append an integer coordinate pair.
    pub fn append_point(&mut self, x: i32, y: i32) {
        self.buf.append_point(x, y);
    }

    /// Open the stream dictionary, capturing the object's offset.
    ///
    /// Further dictionary entries can be written through the document
    /// until [`close`](StreamBuilder::close) is called.
    pub fn open<W: Write>(&mut self, doc: &mut DocumentWriter<W>, kind: Option<&str>) -> Result<()> {
        doc.open_object(self.id, kind)?;
        self.opened = true;
        Ok(())
    }

    /// Finish the stream object.
    ///
    /// Opens the dictionary first if needed, then emits the payload with
    /// the smaller of the compressed and raw representations. A stream
    /// with zero accumulated bytes closes as an empty object with no
    /// payload section.
    pub fn close<W: Write>(self, doc: &mut DocumentWriter<W>) -> Result<ObjectId> {
        let Self { id, buf, opened } = self;
        if !opened {
            doc.open_object(id, None)?;
        }
        if buf.len() == 0 {
            doc.close_object(id)?;
            return Ok(id);
        }

        let raw = buf.into_bytes();
        let compressed = if doc.config().compress {
            deflate(&raw).ok()
        } else {
            None
        };
        match compressed {
            Some(packed) if packed.len() < raw.len() => {
                doc.put_raw("/Filter/FlateDecode")?;
                doc.put_int("Length", packed.len() as i64)?;
                doc.put_raw(">>stream\n")?;
                doc.write_bytes(&packed)?;
            },
            _ => {
                doc.put_int("Length", raw.len() as i64)?;
                doc.put_raw(">>stream\n")?;
                doc.write_bytes(&raw)?;
            },
        }
        doc.put_raw("endstream\nendobj\n")?;
        doc.mark_closed(id);
        Ok(id)
    }
}

/// Compress data for a FlateDecode filter.
fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}
