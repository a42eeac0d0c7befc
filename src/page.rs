//! Page records and orientation grouping.
//!
//! Pages are partitioned into at most two flat groups, one per
//! orientation, each with a fixed default page size. A page's group is
//! chosen at creation and never changes.

use crate::object::ObjectId;

/// Page orientation, selecting the default media box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// 612 x 792 point portrait page
    Portrait,
    /// 792 x 612 point landscape page
    Landscape,
}

impl Orientation {
    /// The fixed media box entry for this orientation.
    pub(crate) fn media_box(self) -> &'static str {
        match self {
            Orientation::Portrait => "/MediaBox[0 0 612 792]",
            Orientation::Landscape => "/MediaBox[0 0 792 612]",
        }
    }
}

/// Handle to a page under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle(pub(crate) usize);

/// A page leaf record.
///
/// The resource and content ids are bound late, once the page's input has
/// been fully consumed; the sequence number is assigned by the owning
/// chapter.
#[derive(Debug)]
pub(crate) struct PageRecord {
    pub id: ObjectId,
    pub orientation: Orientation,
    pub number: u32,
    pub resources: Option<ObjectId>,
    pub contents: Option<ObjectId>,
    pub annotations: Vec<ObjectId>,
}

/// A flat group of pages sharing one orientation.
///
/// Page indices accumulate in arrival order and become the group's Kids
/// array at finalize time.
#[derive(Debug)]
pub(crate) struct PageGroup {
    pub id: ObjectId,
    pub orientation: Orientation,
    pub pages: Vec<usize>,
}

impl PageGroup {
    pub fn new(id: ObjectId, orientation: Orientation) -> Self {
        Self {
            id,
            orientation,
            pages: Vec::new(),
        }
    }
}
