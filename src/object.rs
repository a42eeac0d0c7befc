//! Indirect object identities and the cross-reference table.
//!
//! Every addressable unit of the document is an indirect object with a
//! strictly increasing number assigned at allocation time, before any of
//! its content exists. The table records the byte offset of each object
//! the moment its header is written and later serializes the fixed-width
//! cross-reference section that makes direct lookup possible.

use std::fmt;
use std::io::{self, Write};

/// The number of an indirect object.
///
/// Numbers start at 1 and are never reused; number 0 is reserved for the
/// head of the cross-reference free list. The generation number is always
/// zero because the file is written in a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u32);

impl ObjectId {
    /// The object number.
    pub fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} 0 R", self.0)
    }
}

/// Lifecycle of a table entry.
///
/// An object moves from `Unopened` to `Open` when its header is emitted
/// and to `Closed` when its terminator is emitted. After `Closed` it is
/// immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObjectState {
    Unopened,
    Open,
    Closed,
}

#[derive(Debug)]
pub(crate) struct ObjectEntry {
    pub id: ObjectId,
    /// Byte offset of the object header, captured exactly once.
    pub offset: Option<u64>,
    /// Array-shaped objects suppress the `/Type` header entry.
    pub array: bool,
    pub state: ObjectState,
}

/// Registry of every allocated object, in allocation order.
#[derive(Debug, Default)]
pub struct ObjectTable {
    entries: Vec<ObjectEntry>,
}

impl ObjectTable {
    /// Reserve the next object number. No bytes are emitted.
    pub(crate) fn alloc(&mut self, array: bool) -> ObjectId {
        let id = ObjectId(self.entries.len() as u32 + 1);
        self.entries.push(ObjectEntry {
            id,
            offset: None,
            array,
            state: ObjectState::Unopened,
        });
        id
    }

    /// Number of allocated objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been allocated.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entry(&self, id: ObjectId) -> &ObjectEntry {
        &self.entries[(id.0 - 1) as usize]
    }

    pub(crate) fn entry_mut(&mut self, id: ObjectId) -> &mut ObjectEntry {
        &mut self.entries[(id.0 - 1) as usize]
    }

    /// Write one fixed-width cross-reference record per entry, in
    /// allocation order.
    ///
    /// Objects that were closed report their recorded offset with flag
    /// `n`. An object that was allocated but never closed becomes a free
    /// record, its offset field chaining to the previously seen free id.
    /// A well-behaved driver closes everything, so the free path also
    /// logs a warning.
    pub(crate) fn write_xref<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut free_link: u32 = 0;
        for entry in &self.entries {
            match entry.offset {
                Some(offset) => write!(w, "{:010} 00000 n \n", offset)?,
                None => {
                    log::warn!(
                        "object {} was allocated but never written",
                        entry.id.number()
                    );
                    write!(w, "{:010} 00000 f \n", free_link)?;
                    free_link = entry.id.number();
                },
            }
        }
        Ok(())
    }
}
