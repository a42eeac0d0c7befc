//! Input converters driving the document writer.
//!
//! Each converter consumes one input and issues the high-level document
//! operations: pages, streams, resources, attachments. Recovery is per
//! input: a converter that cannot open its source returns
//! [`Error::SourceFile`](crate::error::Error::SourceFile) and the caller
//! moves on to the next directive.

use std::io::Write;

use crate::document::DocumentWriter;
use crate::error::Result;
use crate::image::ImageData;
use crate::page::Orientation;
use crate::resources::ResourceSpec;

mod listing;
mod text;

pub use listing::write_listing;
pub use text::write_text;

/// Compose one image scaled to a full page, with an optional caption.
pub fn write_image_page<W: Write>(
    doc: &mut DocumentWriter<W>,
    image: &ImageData,
    caption: Option<&str>,
    orientation: Orientation,
) -> Result<()> {
    let img = doc.add_image(image)?;
    let page = doc.new_page(orientation);
    let mut res = ResourceSpec::new();
    res.add_image(img);

    let mut strm = doc.new_stream();
    match orientation {
        Orientation::Landscape => {
            strm.append_cmd(&format!("q 792 0 0 612 0 0 cm /Im{} Do Q\n", img.number()));
        },
        Orientation::Portrait => {
            strm.append_cmd(&format!("q 612 0 0 792 0 0 cm /Im{} Do Q\n", img.number()));
        },
    }
    if let Some(caption) = caption {
        let font = doc.body_font()?;
        res.set_body_font(font);
        strm.append_cmd("BT\n/FF 10 Tf ");
        match orientation {
            Orientation::Landscape => strm.append_cmd("10 TL 1 0 0 1 10 600 Tm\n"),
            Orientation::Portrait => strm.append_cmd("12 TL 1 0 0 1 10 752 Tm\n"),
        }
        strm.append_cmd("T* (");
        strm.append_text(caption);
        strm.append_cmd(") Tj\nET\n");
    }
    let contents = strm.close(doc)?;
    let resources = doc.resources(&res)?;
    doc.set_page_resources(page, resources);
    doc.set_page_contents(page, contents);
    doc.finish_page(page)
}
