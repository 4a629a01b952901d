use std::{borrow::Cow, collections::HashMap, num::NonZeroUsize};

use crate::{
    font_system::{FontBackend, RasterMetrics},
    text::GlyphId,
};

#[derive(Default, Clone, Copy)]
struct LruNode {
    newer: Option<usize>,
    older: Option<usize>,
}

/// Fixed-size blocks of coverage data with least-recently-used eviction.
struct CoverageAtlas {
    capacity: usize,
    block_size: usize,
    data: Vec<u8>,

    nodes: Vec<LruNode>,
    head: Option<usize>,
    tail: Option<usize>,
    slots: HashMap<GlyphId, (usize, RasterMetrics), fxhash::FxBuildHasher>,
    free: Vec<usize>,
    keys: Vec<Option<GlyphId>>,
}

impl CoverageAtlas {
    fn new(capacity: NonZeroUsize, block_size: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        let block_size = block_size.get();

        Self {
            capacity,
            block_size,
            data: vec![0; capacity * block_size],
            nodes: vec![LruNode::default(); capacity],
            head: None,
            tail: None,
            slots: HashMap::with_capacity_and_hasher(capacity, fxhash::FxBuildHasher::default()),
            free: (0..capacity).collect(),
            keys: vec![None; capacity],
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free = (0..self.capacity).collect();
        self.keys.fill(None);
        self.nodes.fill(LruNode::default());
        self.head = None;
        self.tail = None;
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn block(&self, slot: usize, len: usize) -> &[u8] {
        let from = slot * self.block_size;
        &self.data[from..from + len.min(self.block_size)]
    }

    fn get(&mut self, key: &GlyphId) -> Option<(RasterMetrics, &[u8])> {
        let (slot, metrics) = *self.slots.get(key)?;
        self.touch(slot);
        Some((metrics, self.block(slot, metrics.width * metrics.height)))
    }

    fn insert(&mut self, key: GlyphId, metrics: RasterMetrics, coverage: &[u8]) -> &[u8] {
        let slot = match self.slots.get(&key) {
            Some(&(slot, _)) => {
                self.touch(slot);
                slot
            }
            None => self.claim_slot(),
        };
        self.slots.insert(key, (slot, metrics));
        self.keys[slot] = Some(key);

        let from = slot * self.block_size;
        let len = coverage.len().min(self.block_size);
        self.data[from..from + len].copy_from_slice(&coverage[..len]);
        self.block(slot, len)
    }

    /// Takes a free slot, or evicts the least recently used one, and makes
    /// it the most recent.
    fn claim_slot(&mut self) -> usize {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                // `capacity` is non-zero, so a full atlas always has a tail.
                let tail = self.tail.unwrap_or(0);
                self.unlink(tail);
                if let Some(old_key) = self.keys[tail].take() {
                    self.slots.remove(&old_key);
                }
                tail
            }
        };
        self.attach_to_head(slot);
        slot
    }

    fn touch(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.attach_to_head(slot);
    }

    fn unlink(&mut self, slot: usize) {
        let LruNode { newer, older } = self.nodes[slot];
        match newer {
            Some(newer) => self.nodes[newer].older = older,
            None => self.head = older,
        }
        match older {
            Some(older) => self.nodes[older].newer = newer,
            None => self.tail = newer,
        }
        self.nodes[slot] = LruNode::default();
    }

    fn attach_to_head(&mut self, slot: usize) {
        self.nodes[slot] = LruNode {
            newer: None,
            older: self.head,
        };
        if let Some(old_head) = self.head {
            self.nodes[old_head].newer = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }
}

/// A rasterized glyph ready for blending.
pub struct GlyphCacheItem<'a> {
    pub metrics: RasterMetrics,
    /// Row-major coverage, `metrics.width * metrics.height` bytes.
    pub data: Cow<'a, [u8]>,
}

/// Coverage cache for rasterized glyphs, bucketed by bitmap size.
///
/// Each bucket holds blocks of one size; a glyph goes to the smallest bucket
/// its bitmap fits in. Glyphs larger than every bucket are rasterized on each
/// request.
pub struct GlyphCache {
    /// Sorted by block size.
    atlases: Vec<CoverageAtlas>,
}

impl GlyphCache {
    pub fn new(blocksize_capacity: &[(NonZeroUsize, NonZeroUsize)]) -> Self {
        let mut sorted = blocksize_capacity.to_vec();
        sorted.sort_by_key(|(block_size, _)| *block_size);

        let atlases = sorted
            .into_iter()
            .map(|(block_size, capacity)| CoverageAtlas::new(capacity, block_size))
            .collect();

        Self { atlases }
    }

    pub fn clear(&mut self) {
        for atlas in &mut self.atlases {
            atlas.clear();
        }
    }

    /// Number of glyphs currently cached.
    pub fn len(&self) -> usize {
        self.atlases.iter().map(CoverageAtlas::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(
        &'_ mut self,
        glyph_id: &GlyphId,
        backend: &dyn FontBackend,
    ) -> Option<GlyphCacheItem<'_>> {
        let metrics = backend.raster_metrics(*glyph_id)?;
        let bitmap_size = metrics.width * metrics.height;
        if bitmap_size == 0 {
            return Some(GlyphCacheItem {
                metrics,
                data: Cow::Borrowed(&[]),
            });
        }

        let Some(index) = self
            .atlases
            .iter()
            .position(|atlas| atlas.block_size >= bitmap_size)
        else {
            let (metrics, coverage) = backend.rasterize(*glyph_id)?;
            return Some(GlyphCacheItem {
                metrics,
                data: Cow::Owned(coverage),
            });
        };

        let atlas = &mut self.atlases[index];
        if atlas.slots.contains_key(glyph_id) {
            let (metrics, data) = atlas.get(glyph_id)?;
            return Some(GlyphCacheItem {
                metrics,
                data: Cow::Borrowed(data),
            });
        }

        let (metrics, coverage) = backend.rasterize(*glyph_id)?;
        let data = atlas.insert(*glyph_id, metrics, &coverage);
        Some(GlyphCacheItem {
            metrics,
            data: Cow::Borrowed(data),
        })
    }
}
