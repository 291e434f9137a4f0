//! A position map: the voxel -> packed (type, id) index.
//!
//! Two of these exist per engine, one for matter and one for energy, so a
//! cell can hold one of each. Maps are a secondary index over the particle
//! store, never owners; only create/kill/swap/occupy writes touch them.

use crate::defs::SimDims;

pub struct PosMap {
    dims: SimDims,
    cells: Vec<u32>,
}

impl PosMap {
    pub fn new(dims: SimDims) -> Self {
        Self {
            dims,
            cells: vec![0; dims.cells()],
        }
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> u32 {
        self.cells[self.dims.idx(x, y, z)]
    }

    #[inline]
    pub fn set(&mut self, x: i32, y: i32, z: i32, word: u32) {
        let idx = self.dims.idx(x, y, z);
        self.cells[idx] = word;
    }

    #[inline]
    pub fn swap_cells(&mut self, a: (i32, i32, i32), b: (i32, i32, i32)) {
        let ia = self.dims.idx(a.0, a.1, a.2);
        let ib = self.dims.idx(b.0, b.1, b.2);
        self.cells.swap(ia, ib);
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }
}
