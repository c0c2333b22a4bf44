//! Shared bitmap heap
//!
//! Large raster images can be shared out-of-band instead of being inlined
//! in every stream that uses them. The encoder inserts images into a
//! [`BitmapHeap`] and writes only heap indices; decoders resolve the
//! indices through a reader handle.
//!
//! There are two reader handles, matching the two heap modes:
//!
//! - [`ExclusiveHeap`]: hands out the heap's own `Arc`s. At most one may
//!   exist at a time and it releases its claim when dropped.
//! - [`CopyOnReadHeap`]: deep-copies each image on first touch and caches
//!   the copy, so any number of readers on any threads can coexist.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use canvas_pipe_config::HeapMode;
use image::RgbaImage;
use tracing::debug;

use crate::error::HeapError;

#[derive(Debug, Default)]
struct HeapEntries {
    images: Vec<Arc<RgbaImage>>,
    by_identity: HashMap<usize, u32>,
}

/// Index-keyed image store shared by an encoder and its decoders
///
/// Append-only. Indices start at 1 and an image inserted twice (same
/// allocation) keeps its first index.
#[derive(Debug, Default)]
pub struct BitmapHeap {
    entries: RwLock<HeapEntries>,
    claimed: AtomicBool,
}

impl BitmapHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert an image, returning its index
    pub fn insert(&self, image: &Arc<RgbaImage>) -> u32 {
        let identity = Arc::as_ptr(image) as usize;
        let mut entries = self.entries.write().expect("BitmapHeap lock poisoned");
        if let Some(&index) = entries.by_identity.get(&identity) {
            return index;
        }
        entries.images.push(Arc::clone(image));
        let index = entries.images.len() as u32;
        entries.by_identity.insert(identity, index);
        index
    }

    /// Look up an image without claiming the heap
    pub fn get(&self, index: u32) -> Option<Arc<RgbaImage>> {
        if index == 0 {
            return None;
        }
        let entries = self.entries.read().expect("BitmapHeap lock poisoned");
        entries.images.get(index as usize - 1).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.images.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an [`ExclusiveHeap`] handle is currently outstanding
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Claim the single exclusive reader handle
    pub fn exclusive(self: &Arc<Self>) -> Result<ExclusiveHeap, HeapError> {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| HeapError::AlreadyClaimed)?;
        debug!("Exclusive bitmap heap handle claimed");
        Ok(ExclusiveHeap {
            heap: Arc::clone(self),
        })
    }

    /// Create a copy-on-read handle; never fails
    pub fn copy_on_read(self: &Arc<Self>) -> CopyOnReadHeap {
        CopyOnReadHeap {
            heap: Arc::clone(self),
            cache: HashMap::new(),
        }
    }

    /// Create the reader handle for `mode`
    pub fn reader(self: &Arc<Self>, mode: HeapMode) -> Result<Box<dyn HeapReader>, HeapError> {
        match mode {
            HeapMode::Exclusive => Ok(Box::new(self.exclusive()?)),
            HeapMode::CopyOnRead => Ok(Box::new(self.copy_on_read())),
            HeapMode::None => Err(HeapError::WrongMode(mode)),
        }
    }
}

/// Decoder-side access to a [`BitmapHeap`]
pub trait HeapReader: Send {
    /// Resolve a heap index, `None` if the heap has no such entry
    fn fetch(&mut self, index: u32) -> Option<Arc<RgbaImage>>;

    fn mode(&self) -> HeapMode;
}

/// The single reader holding a reference into the heap
///
/// Dropping the handle releases the claim.
#[derive(Debug)]
pub struct ExclusiveHeap {
    heap: Arc<BitmapHeap>,
}

impl HeapReader for ExclusiveHeap {
    fn fetch(&mut self, index: u32) -> Option<Arc<RgbaImage>> {
        self.heap.get(index)
    }

    fn mode(&self) -> HeapMode {
        HeapMode::Exclusive
    }
}

impl Drop for ExclusiveHeap {
    fn drop(&mut self) {
        self.heap.claimed.store(false, Ordering::Release);
        debug!("Exclusive bitmap heap handle released");
    }
}

/// Reader that owns a private copy of every image it touches
#[derive(Debug)]
pub struct CopyOnReadHeap {
    heap: Arc<BitmapHeap>,
    cache: HashMap<u32, Arc<RgbaImage>>,
}

impl CopyOnReadHeap {
    /// Number of images copied so far
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl HeapReader for CopyOnReadHeap {
    fn fetch(&mut self, index: u32) -> Option<Arc<RgbaImage>> {
        if let Some(image) = self.cache.get(&index) {
            return Some(Arc::clone(image));
        }
        let shared = self.heap.get(index)?;
        let copy = Arc::new(RgbaImage::clone(&shared));
        self.cache.insert(index, Arc::clone(&copy));
        Some(copy)
    }

    fn mode(&self) -> HeapMode {
        HeapMode::CopyOnRead
    }
}
