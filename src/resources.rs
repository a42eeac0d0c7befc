//! Per-page resource dictionaries, interned by structural equality.
//!
//! Pages that use the same fonts and images share one resource object.
//! The cache lives for the whole document and is never evicted; document
//! resource counts are small, so lookup is a linear scan.

use crate::object::ObjectId;

/// The set of fonts and images a page may reference.
#[derive(Debug, Clone, Default)]
pub struct ResourceSpec {
    body_font: Option<ObjectId>,
    symbol_font: Option<ObjectId>,
    images: Vec<ObjectId>,
}

impl ResourceSpec {
    /// Create an empty resource set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the body text font.
    pub fn set_body_font(&mut self, font: ObjectId) {
        self.body_font = Some(font);
    }

    /// Set the symbol font.
    pub fn set_symbol_font(&mut self, font: ObjectId) {
        self.symbol_font = Some(font);
    }

    /// Add an image to the set.
    pub fn add_image(&mut self, image: ObjectId) {
        self.images.push(image);
    }

    /// Forget all fonts and images.
    pub fn clear(&mut self) {
        self.body_font = None;
        self.symbol_font = None;
        self.images.clear();
    }

    pub(crate) fn body_font(&self) -> Option<ObjectId> {
        self.body_font
    }

    pub(crate) fn symbol_font(&self) -> Option<ObjectId> {
        self.symbol_font
    }

    pub(crate) fn images(&self) -> &[ObjectId] {
        &self.images
    }

    pub(crate) fn has_font(&self) -> bool {
        self.body_font.is_some() || self.symbol_font.is_some()
    }
}

impl PartialEq for ResourceSpec {
    /// Structural equality: fonts must match exactly, images as an
    /// unordered set.
    fn eq(&self, other: &Self) -> bool {
        self.body_font == other.body_font
            && self.symbol_font == other.symbol_font
            && self.images.len() == other.images.len()
            && self.images.iter().all(|img| other.images.contains(img))
    }
}

/// Interned resource dictionaries for one document.
#[derive(Debug, Default)]
pub(crate) struct ResourceCache {
    entries: Vec<(ResourceSpec, ObjectId)>,
}

impl ResourceCache {
    /// Return the object id of an already interned structural match.
    pub fn lookup(&self, spec: &ResourceSpec) -> Option<ObjectId> {
        self.entries
            .iter()
            .find(|(cached, _)| cached == spec)
            .map(|&(_, id)| id)
    }

    /// Remember a freshly serialized resource dictionary.
    pub fn insert(&mut self, spec: ResourceSpec, id: ObjectId) {
        self.entries.push((spec, id));
    }
}
