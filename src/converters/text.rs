//! Formatted text conversion with inline markup.
//!
//! Plain text with a small escape language: parentheses are escaped, tabs
//! expand to 8-column stops, `<nnn>` switches to the symbol font for one
//! octal character code, and backslash directives control underlining,
//! attachment anchors, inline images, line spacing, super/subscript, and
//! the skip to the last line. A form feed flushes the page, drawing the
//! deferred underlines and images and emitting any placed attachment
//! annotations.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};

use crate::document::DocumentWriter;
use crate::error::{Error, Result};
use crate::image::ImageSource;
use crate::page::{Orientation, PageHandle};
use crate::resources::ResourceSpec;
use crate::stream::StreamBuilder;

/// Depth of a full text page in points, 58 lines at normal spacing.
const PAGE_DEPTH: i32 = 58 * 12;

/// An underline segment deferred until the page flushes.
struct Underline {
    sx: i32,
    sy: i32,
    ex: i32,
    ey: i32,
}

/// An inline image placement deferred until the page flushes.
struct PlacedImage {
    width: i32,
    height: i32,
    x: i32,
    y: i32,
    number: u32,
}

/// What a backslash directive is currently collecting.
enum Collecting {
    Anchor,
    Image,
}

struct Converter<'a, W: Write> {
    doc: &'a mut DocumentWriter<W>,
    source: &'a mut dyn ImageSource,
    res: ResourceSpec,
    current: Option<(PageHandle, StreamBuilder)>,
    /// Pending text run, already escaped.
    out: Vec<u8>,
    collecting: Option<(Collecting, Vec<u8>)>,
    pos: i32,
    line: i32,
    spacing: i32,
    rise: i32,
    underlines: Vec<Underline>,
    open_underline: Option<(i32, i32)>,
    placed: Vec<PlacedImage>,
}

impl<'a, W: Write> Converter<'a, W> {
    fn new(doc: &'a mut DocumentWriter<W>, source: &'a mut dyn ImageSource) -> Result<Self> {
        let font = doc.body_font()?;
        let mut res = ResourceSpec::new();
        res.set_body_font(font);
        let mut conv = Self {
            doc,
            source,
            res,
            current: None,
            out: Vec::new(),
            collecting: None,
            pos: 0,
            line: 0,
            spacing: 12,
            rise: 0,
            underlines: Vec::new(),
            open_underline: None,
            placed: Vec::new(),
        };
        conv.start_page();
        Ok(conv)
    }

    fn start_page(&mut self) {
        let page = self.doc.new_page(Orientation::Portrait);
        let mut strm = self.doc.new_stream();
        strm.append_cmd("BT\n/FF 10 Tf 12 TL 1 0 0 1 10 752 Tm");
        self.current = Some((page, strm));
        self.spacing = 12;
        self.pos = 0;
        self.line = 0;
    }

    fn cmd(&mut self, text: &str) {
        if let Some((_, strm)) = self.current.as_mut() {
            strm.append_cmd(text);
        }
    }

    /// Show the pending text run, if any.
    fn flush_text(&mut self) {
        if self.out.is_empty() {
            return;
        }
        if let Some((_, strm)) = self.current.as_mut() {
            strm.append_cmd(" (");
            strm.append_data(&self.out);
            strm.append_cmd(") Tj ");
        }
        self.out.clear();
    }

    fn set_spacing(&mut self, leading: i32) {
        self.flush_text();
        self.pos = 0;
        self.cmd(&format!("{} TL ", leading));
        self.spacing = leading;
    }

    /// Draw the deferred underlines and images after text mode ends.
    fn draw_deferred(strm: &mut StreamBuilder, underlines: &mut Vec<Underline>, placed: &mut Vec<PlacedImage>) {
        if !underlines.is_empty() {
            strm.append_cmd("0 g q 1 0 0 1 0 0 cm\n");
            for u in underlines.drain(..) {
                strm.append_point(u.sx, u.sy);
                strm.append_cmd("m ");
                strm.append_point(u.ex, u.ey);
                strm.append_cmd("l S\n");
            }
            strm.append_cmd("Q\n");
        }
        if !placed.is_empty() {
            strm.append_cmd("0 g\n");
            for img in placed.drain(..) {
                strm.append_cmd(&format!(
                    "q {} 0 0 {} {} {} cm /Im{} Do Q\n",
                    img.width, img.height, img.x, img.y, img.number
                ));
            }
        }
    }

    /// Close out the current page: end text, draw deferred marks, emit
    /// the content stream, placed attachments, resources and the page.
    fn close_page(&mut self) -> Result<()> {
        self.flush_text();
        let (page, mut strm) = self.current.take().expect("page open");
        strm.append_cmd("ET\n");
        Self::draw_deferred(&mut strm, &mut self.underlines, &mut self.placed);
        let contents = strm.close(self.doc)?;
        self.doc.flush_attachments(page)?;
        let resources = self.doc.resources(&self.res)?;
        self.doc.set_page_contents(page, contents);
        self.doc.set_page_resources(page, resources);
        self.doc.finish_page(page)?;
        self.res.clear();
        let font = self.doc.body_font()?;
        self.res.set_body_font(font);
        Ok(())
    }

    /// Resolve an inline image directive through the image collaborator.
    /// A failing load skips only this directive.
    fn place_image(&mut self, name: &str, more_text: bool) -> Result<()> {
        let image = match self.source.load(name) {
            Ok(image) => image,
            Err(err) => {
                log::warn!("skipping image {}: {}", name, err);
                return Ok(());
            },
        };
        let id = self.doc.add_image(&image)?;
        self.res.add_image(id);
        let width = image.display_width();
        let height = image.display_height();
        self.placed.push(PlacedImage {
            width,
            height,
            x: 10 + self.pos * 6,
            y: 750 - self.line - height,
            number: id.number(),
        });
        self.line += height;
        self.cmd(&format!("{} TL T* {} TL ", height, self.spacing));
        if more_text {
            // Kern past the image so following text clears it.
            self.cmd(&format!("[( ) {} ] TJ ", width / 6));
        }
        Ok(())
    }

    fn process_line(&mut self, text: &str) -> Result<()> {
        self.cmd("\nT* ");
        self.line += self.spacing;
        self.pos = 0;
        let text = text.trim_end_matches(' ');
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            if let Some((kind, buf)) = self.collecting.as_mut() {
                let terminator = match kind {
                    Collecting::Anchor => b'a',
                    Collecting::Image => b'i',
                };
                if !(c == b'\\' && bytes.get(i + 1) == Some(&terminator)) {
                    buf.push(c);
                    i += 1;
                    continue;
                }
                // Fall through so the backslash handler sees the
                // terminating directive.
            }
            match c {
                b'(' | b')' => {
                    self.out.push(b'\\');
                    self.out.push(c);
                    self.pos += 1;
                    i += 1;
                },
                b'\t' => {
                    let stop = (self.pos | 7) + 1;
                    while self.pos < stop {
                        self.pos += 1;
                        self.out.push(b' ');
                    }
                    i += 1;
                },
                b'<' => {
                    self.flush_text();
                    i += 1;
                    let mut code: u32 = 0;
                    while i < bytes.len() && bytes[i] != b'>' {
                        code = (code << 3) + bytes[i].wrapping_sub(b'0') as u32;
                        i += 1;
                    }
                    i += 1;
                    self.cmd(&format!("/FS 10 Tf (\\{:03o}) Tj /FF 10 Tf", code));
                    let symbol = self.doc.symbol_font()?;
                    self.res.set_symbol_font(symbol);
                },
                b'\\' => {
                    i += 1;
                    let code = bytes.get(i).copied().unwrap_or(0);
                    i += 1;
                    self.directive(code, i < bytes.len())?;
                },
                0x0C => {
                    self.close_page()?;
                    self.start_page();
                    i += 1;
                },
                _ => {
                    self.out.push(c);
                    self.pos += 1;
                    i += 1;
                },
            }
        }
        self.flush_text();
        // Text rise is neutralized at every line end, but the toggle
        // state carries over.
        if self.rise != 0 {
            self.cmd("0 Ts ");
        }
        Ok(())
    }

    fn directive(&mut self, code: u8, more_text: bool) -> Result<()> {
        match code {
            b'A' => {
                self.flush_text();
                self.collecting = Some((Collecting::Anchor, Vec::new()));
            },
            b'a' => {
                if let Some((_, name)) = self.collecting.take() {
                    if !name.is_empty() {
                        let name = String::from_utf8_lossy(&name).into_owned();
                        self.doc
                            .place_attachment(&name, 10 + self.pos * 6, 740 - self.line);
                        if more_text {
                            // Leave a gap where the attachment icon sits.
                            self.out.extend_from_slice(b"    ");
                            self.pos += 4;
                        }
                    }
                }
            },
            b'U' => {
                self.open_underline = Some((10 + self.pos * 6, 750 - self.line));
            },
            b'u' => {
                if let Some((sx, sy)) = self.open_underline.take() {
                    self.underlines.push(Underline {
                        sx,
                        sy,
                        ex: 10 + self.pos * 6,
                        ey: 750 - self.line,
                    });
                }
            },
            b'l' => {
                self.flush_text();
                self.pos = 0;
                if self.line < PAGE_DEPTH {
                    self.cmd(&format!("{} TL T* {} TL ", PAGE_DEPTH - self.line, self.spacing));
                    self.line = PAGE_DEPTH;
                }
            },
            b'H' => self.set_spacing(6),
            b'h' => self.set_spacing(18),
            b'D' => self.set_spacing(24),
            b'N' => self.set_spacing(12),
            b'S' => {
                self.flush_text();
                if self.rise == 0 {
                    self.cmd("5 Ts");
                    self.rise = 5;
                } else if self.rise == -5 {
                    self.cmd("0 Ts");
                    self.rise = 0;
                }
            },
            b's' => {
                self.flush_text();
                if self.rise == 0 {
                    self.cmd("-5 Ts");
                    self.rise = -5;
                } else if self.rise == 5 {
                    self.cmd("0 Ts");
                    self.rise = 0;
                }
            },
            b'I' => {
                self.flush_text();
                self.collecting = Some((Collecting::Image, Vec::new()));
            },
            b'i' => {
                if let Some((_, name)) = self.collecting.take() {
                    if !name.is_empty() {
                        let name = String::from_utf8_lossy(&name).into_owned();
                        self.place_image(&name, more_text)?;
                    }
                }
            },
            b'\'' | b'>' | b'<' => {
                self.out.push(code);
                self.pos += 1;
            },
            _ => {},
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.close_page()
    }
}

/// Convert a formatted text file into portrait pages.
///
/// A missing input is reported as [`Error::SourceFile`]; the caller skips
/// the directive and the document continues.
pub fn write_text<W: Write>(
    doc: &mut DocumentWriter<W>,
    path: &str,
    images: &mut dyn ImageSource,
) -> Result<()> {
    let file = File::open(path).map_err(|source| Error::SourceFile {
        path: path.to_string(),
        source,
    })?;
    log::debug!("processing text {}", path);
    let mut conv = Converter::new(doc, images)?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        conv.process_line(&line)?;
    }
    conv.finish()
}
