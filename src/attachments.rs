//! Embedded files and file-attachment annotations.
//!
//! An attachment is embedded the moment it is declared: the file's bytes
//! become an embedded-file stream and a file specification dictionary
//! referencing it. Placement happens later, when an anchor in the text
//! names the attachment and fixes its rectangle; placed attachments turn
//! into annotations on the page being flushed.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};

use chrono::{DateTime, Local};

use crate::document::DocumentWriter;
use crate::error::{Error, Result};
use crate::object::ObjectId;
use crate::page::PageHandle;

/// An embedded file waiting for a page anchor.
#[derive(Debug)]
pub(crate) struct Attachment {
    filespec: ObjectId,
    name: String,
    kind: Option<String>,
    pos: Option<(i32, i32)>,
}

impl Attachment {
    /// Embed a file and its file specification.
    ///
    /// Text mode re-terminates every line with CRLF. The input is opened
    /// before any object is allocated, so a missing file leaves nothing
    /// dangling.
    pub fn load<W: Write>(
        doc: &mut DocumentWriter<W>,
        path: &str,
        name: &str,
        kind: Option<&str>,
        binary: bool,
    ) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::SourceFile {
            path: path.to_string(),
            source,
        })?;
        let modified: DateTime<Local> = file
            .metadata()
            .and_then(|meta| meta.modified())
            .map(DateTime::from)
            .unwrap_or_else(|_| Local::now());

        log::debug!("embedding {} ({})", path, kind.unwrap_or("untyped"));

        let mut strm = doc.new_stream();
        strm.open(doc, Some("EmbeddedFile"))?;
        if binary {
            doc.put_raw("/Subtype/Application#2Foctet-stream")?;
        } else {
            doc.put_raw("/Subtype/Text#2Fplain#20charset=us-ascii")?;
        }

        let mut reader = BufReader::new(file);
        if binary {
            let mut buf = [0u8; 1024];
            loop {
                let n = reader.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                strm.append_data(&buf[..n]);
            }
        } else {
            for line in reader.lines() {
                let line = line?;
                strm.append_cmd(&line);
                strm.append_cmd("\r\n");
            }
        }

        doc.put_raw("/Params <<")?;
        doc.put_int("Size", strm.len() as i64)?;
        doc.put_date("CreationDate", modified)?;
        doc.put_raw(">> ")?;
        let embedded = strm.close(doc)?;

        let filespec = doc.alloc();
        doc.open_object(filespec, Some("Filespec"))?;
        doc.put_str("F", path)?;
        doc.put_raw("/EF<<")?;
        doc.put_ref(Some("F"), embedded)?;
        doc.put_raw(">> ")?;
        doc.close_object(filespec)?;

        Ok(Self {
            filespec,
            name: name.to_string(),
            kind: kind.map(str::to_string),
            pos: None,
        })
    }

    /// Emit the file-attachment annotation at the placed position.
    fn emit<W: Write>(&self, doc: &mut DocumentWriter<W>, x: i32, y: i32) -> Result<ObjectId> {
        let id = doc.alloc();
        doc.open_object(id, Some("Annot"))?;
        doc.put_raw("/Subtype/FileAttachment/F 0/Name/Tag")?;
        doc.put_raw(&format!("/Rect [{} {} {} {}]", x, y, x + 20, y + 20))?;
        doc.put_str("T", &self.name)?;
        let contents = match &self.kind {
            Some(kind) => format!("{} {}", self.name, kind),
            None => self.name.clone(),
        };
        doc.put_str("Contents", &contents)?;
        doc.put_ref(Some("FS"), self.filespec)?;
        doc.close_object(id)?;
        Ok(id)
    }
}

/// Attachments declared so far and not yet placed on a page.
#[derive(Debug, Default)]
pub(crate) struct AttachmentList {
    pending: Vec<Attachment>,
}

impl AttachmentList {
    pub fn push(&mut self, attachment: Attachment) {
        self.pending.push(attachment);
    }

    /// Fix the rectangle of the named attachment. Unknown names are
    /// ignored.
    pub fn place(&mut self, name: &str, x: i32, y: i32) {
        if let Some(attachment) = self.pending.iter_mut().find(|a| a.name == name) {
            attachment.pos = Some((x, y));
        }
    }

    /// Turn every placed attachment into an annotation on the given page.
    /// Unplaced attachments stay pending.
    pub fn flush<W: Write>(&mut self, doc: &mut DocumentWriter<W>, page: PageHandle) -> Result<()> {
        let mut keep = Vec::new();
        for attachment in self.pending.drain(..) {
            match attachment.pos {
                Some((x, y)) => {
                    let id = attachment.emit(doc, x, y)?;
                    doc.add_page_annotation(page, id);
                },
                None => keep.push(attachment),
            }
        }
        self.pending = keep;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::WriterConfig;
    use std::io::Write as _;

    fn writer() -> DocumentWriter<Vec<u8>> {
        DocumentWriter::from_writer(Vec::new(), WriterConfig::default()).unwrap()
    }

    #[test]
    fn test_missing_file_allocates_nothing() {
        let mut doc = writer();
        let before = doc.object_count();
        let err = doc.attach_file("/no/such/file", "x", None, true);
        assert!(matches!(err, Err(Error::SourceFile { .. })));
        assert_eq!(doc.object_count(), before);
    }

    #[test]
    fn test_text_mode_reterminates_lines() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"alpha\nbeta\r\ngamma").unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let config = WriterConfig::default().with_compress(false);
        let mut doc = DocumentWriter::from_writer(Vec::new(), config).unwrap();
        doc.attach_file(&path, "notes", Some("text"), false).unwrap();
        let bytes = doc.finalize().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("alpha\r\nbeta\r\ngamma\r\n"));
        assert!(text.contains("/Type/EmbeddedFile"));
        assert!(text.contains("/Type/Filespec"));
        // Size covers the re-terminated bytes: 5+2 + 4+2 + 5+2.
        assert!(text.contains("/Size 20"));
    }

    #[test]
    fn test_placed_attachment_becomes_annotation() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"payload").unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let config = WriterConfig::default().with_compress(false);
        let mut doc = DocumentWriter::from_writer(Vec::new(), config).unwrap();
        doc.attach_file(&path, "tape1", Some("tape image"), true).unwrap();
        doc.place_attachment("tape1", 30, 500);

        let page = doc.new_page(crate::page::Orientation::Portrait);
        let mut strm = doc.new_stream();
        strm.append_cmd("BT ET\n");
        let contents = strm.close(&mut doc).unwrap();
        let resources = doc.resources(&crate::resources::ResourceSpec::new()).unwrap();
        doc.set_page_contents(page, contents);
        doc.set_page_resources(page, resources);
        doc.flush_attachments(page).unwrap();
        doc.finish_page(page).unwrap();

        let bytes = doc.finalize().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Subtype/FileAttachment"));
        assert!(text.contains("/Rect [30 500 50 520]"));
        assert!(text.contains("/Contents (tape1 tape image)"));
        assert!(text.contains("/Annots"));
    }

    #[test]
    fn test_unplaced_attachment_stays_pending() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"payload").unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let mut doc = writer();
        doc.attach_file(&path, "tape2", None, true).unwrap();
        let page = doc.new_page(crate::page::Orientation::Portrait);
        let before = doc.object_count();
        doc.flush_attachments(page).unwrap();
        // No annotation objects were created.
        assert_eq!(doc.object_count(), before);
    }
}
