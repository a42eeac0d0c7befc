//! Line-printer listing conversion with column-1 carriage control.
//!
//! The first character of every line is a carriage control code: `1`
//! ejects to a new page, `0` double spaces, `2` triple spaces, anything
//! else single spaces. Reading stops at the first empty line, and a
//! lines-per-page ceiling forces an eject when a page overruns.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};

use crate::document::DocumentWriter;
use crate::error::{Error, Result};
use crate::page::{Orientation, PageHandle};
use crate::resources::ResourceSpec;
use crate::stream::StreamBuilder;

/// Text-matrix prologue for a fresh listing page.
fn prologue(strm: &mut StreamBuilder, orientation: Orientation) {
    strm.append_cmd("BT\n/FF 10 Tf ");
    match orientation {
        Orientation::Landscape => strm.append_cmd("10 TL 1 0 0 1 10 600 Tm\n"),
        Orientation::Portrait => strm.append_cmd("12 TL 1 0 0 1 10 752 Tm\n"),
    }
}

/// Close out a finished listing page.
fn flush_page<W: Write>(
    doc: &mut DocumentWriter<W>,
    page: PageHandle,
    mut strm: StreamBuilder,
    res: &ResourceSpec,
) -> Result<()> {
    strm.append_cmd("ET\n");
    let contents = strm.close(doc)?;
    let resources = doc.resources(res)?;
    doc.set_page_contents(page, contents);
    doc.set_page_resources(page, resources);
    doc.finish_page(page)
}

/// Convert a listing file into pages, honoring carriage control.
///
/// A missing input is reported as [`Error::SourceFile`]; the caller skips
/// the directive and the document continues.
pub fn write_listing<W: Write>(
    doc: &mut DocumentWriter<W>,
    path: &str,
    lines_per_page: u32,
    orientation: Orientation,
) -> Result<()> {
    let file = File::open(path).map_err(|source| Error::SourceFile {
        path: path.to_string(),
        source,
    })?;
    log::debug!(
        "including {} listing {}",
        match orientation {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        },
        path
    );

    let font = doc.body_font()?;
    let mut res = ResourceSpec::new();
    res.set_body_font(font);

    let mut current: Option<(PageHandle, StreamBuilder)> = None;
    let mut line_count: u32 = 0;
    let mut first = true;
    let mut blank_title = false;

    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim_end_matches(' ');
        if line.is_empty() {
            break;
        }

        let mut bytes = line.as_bytes().to_vec();
        if line_count > lines_per_page {
            bytes[0] = b'1';
        }
        let control = bytes[0];
        let rest = String::from_utf8_lossy(&bytes[1..]).into_owned();

        if blank_title {
            let (_, strm) = current.get_or_insert_with(|| {
                let page = doc.new_page(orientation);
                let mut strm = doc.new_stream();
                prologue(&mut strm, orientation);
                (page, strm)
            });
            strm.append_cmd("T*\n");
            blank_title = false;
        }

        if control == b'1' {
            if let Some((page, strm)) = current.take() {
                flush_page(doc, page, strm, &res)?;
            }
            if rest.is_empty() {
                // A bare page eject becomes a skipped title line, except
                // at the very start of the listing.
                blank_title = !first;
                continue;
            }
        }

        let (_, strm) = current.get_or_insert_with(|| {
            line_count = 0;
            let page = doc.new_page(orientation);
            let mut strm = doc.new_stream();
            prologue(&mut strm, orientation);
            (page, strm)
        });

        match control {
            b'2' => {
                strm.append_cmd("T*\nT*\n");
                line_count += 2;
            },
            b'0' => {
                strm.append_cmd("T*\n");
                line_count += 1;
            },
            _ => {},
        }
        if rest.is_empty() {
            strm.append_cmd("T*\n");
        } else {
            strm.append_cmd("T* (");
            strm.append_text(&rest);
            strm.append_cmd(") Tj\n");
        }
        line_count += 1;
        first = false;
    }

    if let Some((page, strm)) = current.take() {
        flush_page(doc, page, strm, &res)?;
    }
    Ok(())
}
