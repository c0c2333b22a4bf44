//! Object tables and the same-process handle registry
//!
//! Object-table indices are stream-local: the encoder hands them out in
//! first-use order starting at 1 and the decoder expects definitions to
//! arrive in exactly that order. Index 0 always means "no reference".

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::constants::{MAX_INLINE_DATA, NULL_INDEX};
use crate::error::DecodeError;
use crate::objects::{PaintObject, Typeface};

/// Encoder-side index assignment keyed by object identity
///
/// Keeps every assigned object alive so an address cannot be reused by a
/// different object while the session runs.
#[derive(Debug)]
pub(crate) struct IndexAssigner<T> {
    by_identity: HashMap<usize, u32>,
    retained: Vec<T>,
}

impl<T> Default for IndexAssigner<T> {
    fn default() -> Self {
        Self {
            by_identity: HashMap::new(),
            retained: Vec::new(),
        }
    }
}

impl<T> IndexAssigner<T> {
    pub fn get(&self, identity: usize) -> Option<u32> {
        self.by_identity.get(&identity).copied()
    }

    /// Index the next insert will receive, `None` once the inline field is exhausted
    pub fn next_index(&self) -> Option<u32> {
        let next = self.retained.len() as u32 + 1;
        (next <= MAX_INLINE_DATA).then_some(next)
    }

    /// Record `value` under `identity` at [`Self::next_index`]
    pub fn insert(&mut self, identity: usize, value: T) -> u32 {
        self.retained.push(value);
        let index = self.retained.len() as u32;
        self.by_identity.insert(identity, index);
        index
    }

    pub fn len(&self) -> usize {
        self.retained.len()
    }
}

/// Decoder-side table populated by define opcodes
#[derive(Debug)]
pub(crate) struct ObjectTable<T> {
    name: &'static str,
    entries: Vec<T>,
}

impl<T> ObjectTable<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    /// Check that `index` is the next one to be defined
    pub fn check_define(&self, index: u32) -> Result<(), DecodeError> {
        let expected = self.entries.len() as u32 + 1;
        if index != expected {
            return Err(DecodeError::OutOfOrderDefine {
                table: self.name,
                expected,
                got: index,
            });
        }
        Ok(())
    }

    pub fn define(&mut self, index: u32, value: T) -> Result<(), DecodeError> {
        self.check_define(index)?;
        self.entries.push(value);
        Ok(())
    }

    /// Look up a defined entry; index 0 and unknown indices are errors
    pub fn get(&self, index: u32) -> Result<&T, DecodeError> {
        if index == NULL_INDEX {
            return Err(self.undefined(index));
        }
        self.entries
            .get(index as usize - 1)
            .ok_or_else(|| self.undefined(index))
    }

    /// Look up an optional reference where index 0 means none
    pub fn get_optional(&self, index: u32) -> Result<Option<&T>, DecodeError> {
        if index == NULL_INDEX {
            return Ok(None);
        }
        self.get(index).map(Some)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn undefined(&self, index: u32) -> DecodeError {
        DecodeError::UndefinedIndex {
            table: self.name,
            index,
        }
    }
}

/// Same-process side table for handing objects across by handle
///
/// An encoder and the decoders replaying its stream in the same process
/// share one registry. The stream then carries only slot numbers. Slots
/// are append-only; registering never invalidates an earlier slot.
pub struct HandleRegistry {
    objects: RwLock<Vec<PaintObject>>,
    typefaces: RwLock<Vec<Arc<Typeface>>>,
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("object_count", &self.object_count())
            .field("typeface_count", &self.typeface_count())
            .finish()
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self {
            objects: RwLock::new(Vec::new()),
            typefaces: RwLock::new(Vec::new()),
        }
    }
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for the common shared case
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Store an object and return its slot
    pub fn register_object(&self, object: &PaintObject) -> u32 {
        let mut objects = self.objects.write().expect("HandleRegistry lock poisoned");
        objects.push(object.clone());
        (objects.len() - 1) as u32
    }

    pub fn object(&self, slot: u32) -> Option<PaintObject> {
        let objects = self.objects.read().expect("HandleRegistry lock poisoned");
        objects.get(slot as usize).cloned()
    }

    /// Store a typeface and return its slot
    pub fn register_typeface(&self, typeface: &Arc<Typeface>) -> u32 {
        let mut typefaces = self.typefaces.write().expect("HandleRegistry lock poisoned");
        typefaces.push(Arc::clone(typeface));
        (typefaces.len() - 1) as u32
    }

    pub fn typeface(&self, slot: u32) -> Option<Arc<Typeface>> {
        let typefaces = self.typefaces.read().expect("HandleRegistry lock poisoned");
        typefaces.get(slot as usize).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn typeface_count(&self) -> usize {
        self.typefaces.read().map(|t| t.len()).unwrap_or(0)
    }
}
