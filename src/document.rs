//! Document writer: owns the output cursor and drives emission.
//!
//! The writer is strictly forward-only. Object numbers are handed out
//! before any content exists; the byte offset of an object is fixed the
//! moment its header is written and never revisited. Finalizing walks the
//! owned page groups and outline, emits the catalog, and ends the file
//! with the cross-reference table and trailer.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Local};

use crate::attachments::{Attachment, AttachmentList};
use crate::error::{Error, Result};
use crate::image::ImageData;
use crate::object::{ObjectId, ObjectState, ObjectTable};
use crate::outline::{Chapter, OutlineTree};
use crate::page::{Orientation, PageGroup, PageHandle, PageRecord};
use crate::resources::{ResourceCache, ResourceSpec};
use crate::stream::StreamBuilder;

/// Fixed file header: the version line plus a binary-marker comment.
const HEADER: &[u8] = b"%PDF-1.3\n\n%\xC5\xD4\x9C\x9C\n\n";

/// Options for one generated document.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Producer name written into the Info dictionary
    pub producer: String,
    /// Whether stream payloads are compressed when that wins
    pub compress: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            producer: "pdf_forge".to_string(),
            compress: true,
        }
    }
}

impl WriterConfig {
    /// Set the producer name.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// Byte-counting wrapper around the output destination.
///
/// Cross-reference offsets are absolute byte counts from the first header
/// byte, so every write funnels through this counter.
#[derive(Debug)]
struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Current position, in bytes from the start of the file.
    fn position(&self) -> u64 {
        self.written
    }

    fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Top-level coordinator for one document.
///
/// Exactly one writer drives one output; the `&mut` API and the consuming
/// [`finalize`](DocumentWriter::finalize) keep it that way. Nothing
/// survives past finalize.
pub struct DocumentWriter<W: Write> {
    out: CountingWriter<W>,
    config: WriterConfig,
    table: ObjectTable,
    pages: Vec<PageRecord>,
    portrait: Option<PageGroup>,
    landscape: Option<PageGroup>,
    outline: OutlineTree,
    attachments: AttachmentList,
    res_cache: ResourceCache,
    info: Option<ObjectId>,
    body_font: Option<ObjectId>,
    symbol_font: Option<ObjectId>,
}

impl DocumentWriter<BufWriter<File>> {
    /// Create the output file and write the header.
    ///
    /// Failure to create the file is fatal for the run.
    pub fn create(path: impl AsRef<Path>, config: WriterConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::Create {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_writer(BufWriter::new(file), config)
    }
}

impl<W: Write> DocumentWriter<W> {
    /// Start a document on an arbitrary byte sink, writing the header.
    pub fn from_writer(writer: W, config: WriterConfig) -> Result<Self> {
        let mut out = CountingWriter::new(writer);
        out.write_all(HEADER)?;
        let mut table = ObjectTable::default();
        let outline_root = table.alloc(false);
        Ok(Self {
            out,
            config,
            table,
            pages: Vec::new(),
            portrait: None,
            landscape: None,
            outline: OutlineTree::new(outline_root),
            attachments: AttachmentList::default(),
            res_cache: ResourceCache::default(),
            info: None,
            body_font: None,
            symbol_font: None,
        })
    }

    /// The active writer options.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Number of objects allocated so far.
    pub fn object_count(&self) -> usize {
        self.table.len()
    }

    // ---- low-level put family -------------------------------------------

    pub(crate) fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.out.write_all(data)?;
        Ok(())
    }

    /// Append a raw dictionary fragment.
    pub fn put_raw(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Append a name, `/name`.
    pub fn put_name(&mut self, name: &str) -> Result<()> {
        write!(self.out, "/{}", name)?;
        Ok(())
    }

    /// Append an integer entry, `/name value`.
    pub fn put_int(&mut self, name: &str, value: i64) -> Result<()> {
        write!(self.out, "/{} {}", name, value)?;
        Ok(())
    }

    /// Append a string entry, `/name (value)`, escaping the string
    /// delimiters.
    pub fn put_str(&mut self, name: &str, value: &str) -> Result<()> {
        write!(self.out, "/{} ({})", name, escape_literal(value))?;
        Ok(())
    }

    /// Append a date entry in `D:` form.
    pub fn put_date(&mut self, name: &str, date: DateTime<Local>) -> Result<()> {
        self.put_str(name, &pdf_date(date))
    }

    /// Append a reference, `/name id 0 R`, or ` id 0 R` without a name.
    pub fn put_ref(&mut self, name: Option<&str>, id: ObjectId) -> Result<()> {
        if let Some(name) = name {
            write!(self.out, "/{}", name)?;
        }
        write!(self.out, " {} 0 R", id.number())?;
        Ok(())
    }

    /// Append a bracketed list of references. Nothing is written for an
    /// empty list.
    pub fn put_ref_array(&mut self, name: Option<&str>, ids: &[ObjectId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        if let Some(name) = name {
            write!(self.out, "/{}", name)?;
        }
        self.out.write_all(b" [")?;
        for &id in ids {
            write!(self.out, " {} 0 R", id.number())?;
        }
        self.out.write_all(b" ]")?;
        Ok(())
    }

    /// Append a reference list followed by its `/Count`.
    pub fn put_ref_list(&mut self, name: Option<&str>, ids: &[ObjectId]) -> Result<()> {
        self.put_ref_array(name, ids)?;
        self.put_int("Count", ids.len() as i64)
    }

    // ---- object lifecycle -----------------------------------------------

    /// Reserve the next object number. No bytes are emitted.
    pub fn alloc(&mut self) -> ObjectId {
        self.table.alloc(false)
    }

    /// Reserve an array-shaped object, which never gets a `/Type` entry.
    pub fn alloc_array(&mut self) -> ObjectId {
        self.table.alloc(true)
    }

    /// Emit the numbered object header, capturing the current output
    /// offset as the object's offset.
    ///
    /// Opening an object twice is a programmer error.
    pub fn open_object(&mut self, id: ObjectId, kind: Option<&str>) -> Result<()> {
        let offset = self.out.position();
        let entry = self.table.entry_mut(id);
        assert!(
            entry.state == ObjectState::Unopened,
            "object {} opened twice",
            id.number()
        );
        entry.offset = Some(offset);
        entry.state = ObjectState::Open;
        let array = entry.array;
        write!(self.out, "{} 0 obj <<", id.number())?;
        if !array {
            if let Some(kind) = kind {
                write!(self.out, "/Type/{}", kind)?;
            }
        }
        Ok(())
    }

    /// Emit the object terminator and seal the entry.
    pub fn close_object(&mut self, id: ObjectId) -> Result<()> {
        self.put_raw(">>endobj\n")?;
        self.mark_closed(id);
        Ok(())
    }

    pub(crate) fn mark_closed(&mut self, id: ObjectId) {
        let entry = self.table.entry_mut(id);
        assert!(
            entry.state == ObjectState::Open,
            "object {} closed before it was opened",
            id.number()
        );
        entry.state = ObjectState::Closed;
    }

    /// Allocate a stream object and hand back its payload builder.
    pub fn new_stream(&mut self) -> StreamBuilder {
        StreamBuilder::new(self.alloc())
    }

    // ---- document structure ---------------------------------------------

    /// Write the Info dictionary with the producer, the given title, and
    /// the current time.
    pub fn set_title(&mut self, title: &str) -> Result<()> {
        let id = self.alloc_array();
        self.open_object(id, None)?;
        let producer = self.config.producer.clone();
        self.put_str("Producer", &producer)?;
        self.put_str("Title", title)?;
        self.put_date("CreationDate", Local::now())?;
        self.close_object(id)?;
        self.info = Some(id);
        Ok(())
    }

    /// Start a new chapter. Page numbering restarts at 1.
    ///
    /// Without a title the chapter gets no outline node of its own and
    /// its pages attach directly to the outline root.
    pub fn start_chapter(&mut self, title: Option<&str>) {
        let id = self.table.alloc(false);
        self.outline.chapters.push(Chapter::new(id, title));
    }

    /// Allocate a page in the given orientation.
    ///
    /// The page joins the orientation's group, created lazily on first
    /// use, and the current chapter, which assigns its sequence number.
    /// An untitled chapter is opened automatically when none exists.
    pub fn new_page(&mut self, orientation: Orientation) -> PageHandle {
        if self.outline.chapters.is_empty() {
            self.start_chapter(None);
        }
        let group_missing = match orientation {
            Orientation::Portrait => self.portrait.is_none(),
            Orientation::Landscape => self.landscape.is_none(),
        };
        if group_missing {
            let gid = self.table.alloc(false);
            let group = PageGroup::new(gid, orientation);
            match orientation {
                Orientation::Portrait => self.portrait = Some(group),
                Orientation::Landscape => self.landscape = Some(group),
            }
        }
        let id = self.table.alloc(false);
        let index = self.pages.len();
        match orientation {
            Orientation::Portrait => self.portrait.as_mut().expect("group exists"),
            Orientation::Landscape => self.landscape.as_mut().expect("group exists"),
        }
        .pages
        .push(index);
        let chapter = self.outline.chapters.last_mut().expect("chapter exists");
        chapter.pages.push(index);
        let number = chapter.pages.len() as u32;
        self.pages.push(PageRecord {
            id,
            orientation,
            number,
            resources: None,
            contents: None,
            annotations: Vec::new(),
        });
        PageHandle(index)
    }

    /// The page's object id.
    pub fn page_id(&self, page: PageHandle) -> ObjectId {
        self.pages[page.0].id
    }

    /// The page's chapter-assigned sequence number.
    pub fn page_number(&self, page: PageHandle) -> u32 {
        self.pages[page.0].number
    }

    /// Bind the page's content stream.
    pub fn set_page_contents(&mut self, page: PageHandle, contents: ObjectId) {
        self.pages[page.0].contents = Some(contents);
    }

    /// Bind the page's resource dictionary.
    pub fn set_page_resources(&mut self, page: PageHandle, resources: ObjectId) {
        self.pages[page.0].resources = Some(resources);
    }

    /// Append an annotation to the page.
    pub fn add_page_annotation(&mut self, page: PageHandle, annotation: ObjectId) {
        self.pages[page.0].annotations.push(annotation);
    }

    /// Emit the page object. Contents and resources must be bound first.
    pub fn finish_page(&mut self, page: PageHandle) -> Result<()> {
        let record = &self.pages[page.0];
        let id = record.id;
        let orientation = record.orientation;
        let resources = record.resources.expect("page resources bound");
        let contents = record.contents.expect("page contents bound");
        let annotations = record.annotations.clone();
        let parent = match orientation {
            Orientation::Portrait => self.portrait.as_ref().expect("group exists").id,
            Orientation::Landscape => self.landscape.as_ref().expect("group exists").id,
        };
        self.open_object(id, Some("Page"))?;
        self.put_ref(Some("Parent"), parent)?;
        self.put_ref(Some("Resources"), resources)?;
        self.put_ref(Some("Contents"), contents)?;
        self.put_ref_array(Some("Annots"), &annotations)?;
        self.close_object(id)
    }

    // ---- shared resources -----------------------------------------------

    /// Intern a Type1 font object with the given base font name.
    pub fn add_font(&mut self, base_font: &str) -> Result<ObjectId> {
        let id = self.alloc();
        self.open_object(id, Some("Font"))?;
        write!(self.out, "/Subtype/Type1/BaseFont/{}", base_font)?;
        self.close_object(id)?;
        Ok(id)
    }

    /// The document-wide body text font, created on first use.
    pub fn body_font(&mut self) -> Result<ObjectId> {
        if let Some(id) = self.body_font {
            return Ok(id);
        }
        let id = self.add_font("Courier")?;
        self.body_font = Some(id);
        Ok(id)
    }

    /// The document-wide symbol font, created on first use.
    pub fn symbol_font(&mut self) -> Result<ObjectId> {
        if let Some(id) = self.symbol_font {
            return Ok(id);
        }
        let id = self.add_font("Symbol")?;
        self.symbol_font = Some(id);
        Ok(id)
    }

    /// Resolve a resource set to its dictionary object, serializing it on
    /// first sight and returning the interned id on every later match.
    pub fn resources(&mut self, spec: &ResourceSpec) -> Result<ObjectId> {
        if let Some(id) = self.res_cache.lookup(spec) {
            return Ok(id);
        }
        let id = self.alloc_array();
        self.open_object(id, None)?;
        if spec.has_font() {
            self.put_raw("/Font<<")?;
            if let Some(font) = spec.body_font() {
                self.put_ref(Some("FF"), font)?;
            }
            if let Some(font) = spec.symbol_font() {
                self.put_ref(Some("FS"), font)?;
            }
            self.put_raw(">>")?;
        }
        if !spec.images().is_empty() {
            self.put_raw("/XObject<<")?;
            for &img in spec.images() {
                write!(self.out, "/Im{} {} 0 R", img.number(), img.number())?;
            }
            self.put_raw(">>")?;
        }
        self.put_raw("/ProcSet[/PDF")?;
        if spec.has_font() {
            self.put_raw("/Text")?;
        }
        if !spec.images().is_empty() {
            self.put_raw("/ImageB")?;
        }
        self.put_raw("]")?;
        self.close_object(id)?;
        self.res_cache.insert(spec.clone(), id);
        Ok(id)
    }

    /// Store decoded image data as an image XObject stream.
    pub fn add_image(&mut self, image: &ImageData) -> Result<ObjectId> {
        let mut strm = self.new_stream();
        strm.append_data(&image.pixels);
        strm.open(self, Some("XObject"))?;
        self.put_raw("/Subtype/Image")?;
        self.put_int("Width", image.width as i64)?;
        self.put_int("Height", image.height as i64)?;
        self.put_raw("\n/ColorSpace/DeviceGray")?;
        self.put_int("BitsPerComponent", image.bits_per_component as i64)?;
        strm.close(self)
    }

    // ---- attachments ----------------------------------------------------

    /// Embed a file, under the given anchor name, as an attachment.
    ///
    /// Text mode re-terminates every line with CRLF; binary mode streams
    /// the bytes untouched. The embedded stream and its file
    /// specification are written immediately; the attachment stays
    /// pending until an anchor places it on a page.
    pub fn attach_file(
        &mut self,
        path: &str,
        name: &str,
        kind: Option<&str>,
        binary: bool,
    ) -> Result<()> {
        let attachment = Attachment::load(self, path, name, kind, binary)?;
        self.attachments.push(attachment);
        Ok(())
    }

    /// Fix the position of a pending attachment. Unknown names are
    /// ignored.
    pub fn place_attachment(&mut self, name: &str, x: i32, y: i32) {
        self.attachments.place(name, x, y);
    }

    /// Emit annotation objects for every placed attachment and hang them
    /// off the given page. Unplaced attachments stay pending.
    pub fn flush_attachments(&mut self, page: PageHandle) -> Result<()> {
        let mut list = std::mem::take(&mut self.attachments);
        let result = list.flush(self, page);
        self.attachments = list;
        result
    }

    // ---- finalize -------------------------------------------------------

    /// Finish the document: page tree, outline, catalog, cross-reference
    /// table and trailer. Returns the underlying byte sink.
    pub fn finalize(mut self) -> Result<W> {
        let portrait = self.portrait.take();
        let landscape = self.landscape.take();
        let pages = std::mem::take(&mut self.pages);

        let page_root = match (portrait, landscape) {
            (Some(port), Some(land)) => {
                let root = self.alloc();
                self.emit_group(&port, Some(root), &pages)?;
                self.emit_group(&land, Some(root), &pages)?;
                let total = port.pages.len() + land.pages.len();
                self.open_object(root, Some("Pages"))?;
                self.put_ref_array(Some("Kids"), &[port.id, land.id])?;
                self.put_int("Count", total as i64)?;
                self.close_object(root)?;
                root
            },
            (Some(group), None) | (None, Some(group)) => {
                self.emit_group(&group, None, &pages)?;
                group.id
            },
            (None, None) => {
                let root = self.alloc();
                self.open_object(root, Some("Pages"))?;
                self.put_int("Count", 0)?;
                self.close_object(root)?;
                root
            },
        };

        let outline_root = self.outline.id;
        let root_count = self.outline.root_count();
        let chapters = std::mem::take(&mut self.outline.chapters);
        self.emit_outline(outline_root, root_count, &chapters, &pages)?;

        let catalog = self.alloc();
        self.open_object(catalog, Some("Catalog"))?;
        self.put_ref(Some("Outlines"), outline_root)?;
        self.put_ref(Some("Pages"), page_root)?;
        self.put_raw("/PageMode/UseOutlines")?;
        self.close_object(catalog)?;

        let xref_offset = self.out.position();
        let size = self.table.len() + 1;
        write!(self.out, "xref\n0 {}\n", size)?;
        self.out.write_all(b"0000000000 65535 f \n")?;
        self.table.write_xref(&mut self.out)?;
        self.put_raw("trailer\n<<")?;
        self.put_int("Size", size as i64)?;
        self.put_ref(Some("Root"), catalog)?;
        if let Some(info) = self.info {
            self.put_ref(Some("Info"), info)?;
        }
        write!(self.out, ">>\nstartxref\n{}\n%%EOF\n", xref_offset)?;
        self.out.flush()?;
        Ok(self.out.into_inner())
    }

    /// Emit one orientation group as a page tree node.
    fn emit_group(
        &mut self,
        group: &PageGroup,
        parent: Option<ObjectId>,
        pages: &[PageRecord],
    ) -> Result<()> {
        self.open_object(group.id, Some("Pages"))?;
        if let Some(parent) = parent {
            self.put_ref(Some("Parent"), parent)?;
        }
        self.put_raw(group.orientation.media_box())?;
        self.put_raw("/Rotate 0\n")?;
        let kids: Vec<ObjectId> = group.pages.iter().map(|&i| pages[i].id).collect();
        self.put_ref_list(Some("Kids"), &kids)?;
        self.close_object(group.id)
    }

    /// Emit the outline: per-chapter page destination entries, chapter
    /// nodes for titled chapters, then the shared root.
    fn emit_outline(
        &mut self,
        root: ObjectId,
        root_count: i64,
        chapters: &[Chapter],
        pages: &[PageRecord],
    ) -> Result<()> {
        // The last entry emitted for the final chapter; the root's Last
        // points here when that chapter is untitled.
        let mut last_entry = root;

        for (ci, chapter) in chapters.iter().enumerate() {
            let titled = chapter.title.is_some();

            // Destination entries are allocated up front so forward Next
            // references are plain numbers.
            let mut entries: Vec<ObjectId> = Vec::with_capacity(chapter.pages.len());
            for k in 0..chapter.pages.len() {
                if !titled && k == 0 {
                    entries.push(chapter.id);
                } else {
                    entries.push(self.alloc_array());
                }
            }

            let parent = if titled { chapter.id } else { root };
            for (k, &page_index) in chapter.pages.iter().enumerate() {
                let entry = entries[k];
                let page = &pages[page_index];
                self.open_object(entry, None)?;
                self.put_raw("/Dest [")?;
                self.put_ref(None, page.id)?;
                self.put_raw(" /XYZ null null null]")?;
                write!(self.out, "/Title (Page {})", page.number)?;
                self.put_ref(Some("Parent"), parent)?;
                if k > 0 {
                    self.put_ref(Some("Prev"), entries[k - 1])?;
                }
                if k + 1 < entries.len() {
                    self.put_ref(Some("Next"), entries[k + 1])?;
                }
                self.close_object(entry)?;
            }

            match &chapter.title {
                Some(title) => {
                    self.open_object(chapter.id, None)?;
                    self.put_str("Title", title)?;
                    self.put_ref(Some("Parent"), root)?;
                    if ci > 0 {
                        self.put_ref(Some("Prev"), chapters[ci - 1].id)?;
                    }
                    if ci + 1 < chapters.len() {
                        self.put_ref(Some("Next"), chapters[ci + 1].id)?;
                    }
                    if let (Some(&first), Some(&last)) = (entries.first(), entries.last()) {
                        self.put_ref(Some("First"), first)?;
                        self.put_ref(Some("Last"), last)?;
                    }
                    self.put_int("Count", chapter.pages.len() as i64)?;
                    self.close_object(chapter.id)?;
                    last_entry = chapter.id;
                },
                None => {
                    if chapter.pages.is_empty() {
                        // Close the reserved id as an empty object so no
                        // allocated number dangles.
                        self.open_object(chapter.id, None)?;
                        self.close_object(chapter.id)?;
                        last_entry = chapter.id;
                    } else {
                        last_entry = *entries.last().expect("entries nonempty");
                    }
                },
            }
        }

        self.open_object(root, Some("Outlines"))?;
        if let Some(first) = chapters.first() {
            self.put_ref(Some("First"), first.id)?;
            self.put_ref(Some("Last"), last_entry)?;
        }
        self.put_int("Count", root_count)?;
        self.close_object(root)
    }
}

/// Escape the string-literal delimiters in text destined for `( )`.
fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '(' || c == ')' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Format a date the way the file format expects, `D:YYYYMMDDHHMMSS`
/// plus the UTC offset with primes.
fn pdf_date(date: DateTime<Local>) -> String {
    let stamp = date.format("D:%Y%m%d%H%M%S").to_string();
    let offset = date.format("%z").to_string();
    format!("{}{}'{}'", stamp, &offset[..3], &offset[3..])
}
