//! # pdf_forge
//!
//! Generate PDF documents from program listings, formatted text, and
//! scanned images.
//!
//! The crate is built around a strictly forward, single-pass writer:
//! object numbers are handed out before content exists, byte offsets are
//! captured the moment an object's header hits the output, and the file
//! ends with a cross-reference table that lets readers jump straight to
//! any object. Stream payloads are buffered and compressed, falling back
//! to the raw bytes whenever compression does not win.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_forge::{DocumentWriter, Orientation, WriterConfig};
//!
//! # fn main() -> pdf_forge::Result<()> {
//! let mut doc = DocumentWriter::create("listing.pdf", WriterConfig::default())?;
//! doc.set_title("Build log")?;
//! doc.start_chapter(Some("Compiler output"));
//! pdf_forge::converters::write_listing(&mut doc, "build.log", 60, Orientation::Portrait)?;
//! doc.finalize()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! listing / text / image input
//!     |
//! [converters]  (pages, content streams, resource sets)
//!     |
//! [DocumentWriter]  (object table, outline, page groups, attachments)
//!     |
//! [StreamBuilder / put family]  (buffered payloads, dictionary entries)
//!     |
//! PDF bytes
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Object identities and the cross-reference table
pub mod object;

// Buffered stream payloads
pub mod stream;

// Interned resource dictionaries
pub mod resources;

// Pages and orientation groups
pub mod page;

// Image data from the decode pipeline
pub mod image;

// The document writer
pub mod document;

// Input converters
pub mod converters;

mod attachments;
mod outline;

// Re-exports
pub use document::{DocumentWriter, WriterConfig};
pub use error::{Error, Result};
pub use image::{ImageData, ImageSource};
pub use object::ObjectId;
pub use page::{Orientation, PageHandle};
pub use resources::ResourceSpec;
pub use stream::StreamBuilder;

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
