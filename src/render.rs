//! Per-tile "color data modified" bits for the external renderer.
//!
//! The grid is split into TILE_SIZE^3 tiles; every create, kill, swap and
//! move marks the tiles it touched so the renderer can refresh color data
//! incrementally instead of re-uploading the whole volume.

use crate::defs::SimDims;

pub const TILE_SIZE: usize = 8;

pub struct DirtyTiles {
    tx: usize,
    ty: usize,
    tz: usize,
    color_data_modified: Vec<bool>,
    dirty_list: Vec<u32>,
}

impl DirtyTiles {
    pub fn new(dims: SimDims) -> Self {
        let tx = dims.x.div_ceil(TILE_SIZE);
        let ty = dims.y.div_ceil(TILE_SIZE);
        let tz = dims.z.div_ceil(TILE_SIZE);
        Self {
            tx,
            ty,
            tz,
            color_data_modified: vec![false; tx * ty * tz],
            dirty_list: Vec::with_capacity(64),
        }
    }

    #[inline]
    fn tile_index(&self, x: i32, y: i32, z: i32) -> usize {
        let cx = x as usize / TILE_SIZE;
        let cy = y as usize / TILE_SIZE;
        let cz = z as usize / TILE_SIZE;
        debug_assert!(cx < self.tx && cy < self.ty && cz < self.tz);
        cx + cy * self.tx + cz * self.tx * self.ty
    }

    /// Mark the tile containing this voxel.
    #[inline]
    pub fn mark(&mut self, x: i32, y: i32, z: i32) {
        let idx = self.tile_index(x, y, z);
        self.color_data_modified[idx] = true;
    }

    #[inline]
    pub fn is_modified(&self, x: i32, y: i32, z: i32) -> bool {
        self.color_data_modified[self.tile_index(x, y, z)]
    }

    /// Collect the modified tile indices into the internal list, clearing
    /// the bits. Returns how many tiles need a refresh.
    pub fn collect_modified(&mut self) -> usize {
        self.dirty_list.clear();
        for (idx, modified) in self.color_data_modified.iter_mut().enumerate() {
            if *modified {
                self.dirty_list.push(idx as u32);
                *modified = false;
            }
        }
        self.dirty_list.len()
    }

    #[inline]
    pub fn dirty_list(&self) -> &[u32] {
        &self.dirty_list
    }

    pub fn total_tiles(&self) -> usize {
        self.color_data_modified.len()
    }

    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.tx, self.ty, self.tz)
    }

    pub fn clear(&mut self) {
        self.color_data_modified.fill(false);
        self.dirty_list.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marking_and_collecting_clears_the_bits() {
        let mut tiles = DirtyTiles::new(SimDims::new(32, 32, 32));
        assert_eq!(tiles.total_tiles(), 64);

        tiles.mark(0, 0, 0);
        tiles.mark(7, 7, 7); // same tile
        tiles.mark(8, 0, 0); // next tile on x
        assert!(tiles.is_modified(3, 3, 3));

        assert_eq!(tiles.collect_modified(), 2);
        assert_eq!(tiles.dirty_list(), &[0, 1]);
        assert_eq!(tiles.collect_modified(), 0);
    }
}
