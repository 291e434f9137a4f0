//! Core definitions shared by the whole engine: coordinate handling, the
//! packed position-map word, swap behaviors and error codes.
//!
//! A position map stores `0` for an empty cell, otherwise a packed word:
//!   [TYP 10 bits][ID 22 bits]
//! so a single u32 resolves both the occupant's element and its slot in the
//! particle store.

use thiserror::Error;

/// Element type id. Up to 2^10 element types fit in a packed map word.
pub type ElementType = u16;

/// Particle store index. Must be signed: negative values encode the free
/// list inside dead slots and error codes on the embedder ABI.
pub type PartId = i32;

pub const PMAP_ID_BITS: u32 = 22;
pub const PMAP_ID_MASK: u32 = (1 << PMAP_ID_BITS) - 1;

/// Largest particle index a map word can address.
pub const PMAP_MAX_PARTS: usize = PMAP_ID_MASK as usize;

/// The empty element. Maps unpack to `PT_NONE` on empty cells and dead
/// particle slots carry it as their type.
pub const PT_NONE: ElementType = 0;

/// Per-axis velocity clamp applied before raycasting. Keeps ray lengths
/// bounded and excludes NaN/infinity from the traversal math.
pub const MAX_VELOCITY: f32 = 50.0;

/// Side length of one coarse air cell, in voxels.
pub const AIR_CELL_SIZE: i32 = 4;

pub const MIN_RES: usize = 4;
pub const MAX_RES: usize = 256;

#[inline]
pub const fn pmap_id(word: u32) -> PartId {
    (word & PMAP_ID_MASK) as PartId
}

#[inline]
pub const fn pmap_typ(word: u32) -> ElementType {
    (word >> PMAP_ID_BITS) as ElementType
}

#[inline]
pub const fn pmap_pack(typ: ElementType, id: PartId) -> u32 {
    ((typ as u32) << PMAP_ID_BITS) | (id as u32 & PMAP_ID_MASK)
}

/// What happens when a particle tries to enter an occupied (or empty) cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PartSwapBehavior {
    /// The move is dropped; the target blocks.
    #[default]
    Noop = 0,
    /// Mover and occupant exchange cells (occupant may be the empty slot).
    Swap = 1,
    /// Both particles end up in the same voxel (energy-on-energy).
    OccupySame = 2,
    /// Needs runtime context; must be resolved before `try_move` dispatch.
    Special = 3,
    /// Sentinel: `try_move` evaluates the behavior itself.
    NotEvaledYet = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GravityMode {
    ZeroG,
    #[default]
    Vertical,
    Radial,
}

impl GravityMode {
    /// Next mode in the VERTICAL -> ZERO_G -> RADIAL -> VERTICAL cycle.
    pub fn cycled(self) -> Self {
        match self {
            GravityMode::Vertical => GravityMode::ZeroG,
            GravityMode::ZeroG => GravityMode::Radial,
            GravityMode::Radial => GravityMode::Vertical,
        }
    }
}

/// Why `create_part` refused to allocate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CreateError {
    #[error("target cell is already occupied")]
    AlreadyOccupied,
    #[error("particle store is full")]
    PartsFull,
}

impl CreateError {
    /// Negative code used on the embedder ABI.
    pub const fn code(self) -> i32 {
        match self {
            CreateError::AlreadyOccupied => -1,
            CreateError::PartsFull => -3,
        }
    }
}

/// Fixed grid resolution of one engine instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimDims {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl SimDims {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        assert!(
            (MIN_RES..=MAX_RES).contains(&x)
                && (MIN_RES..=MAX_RES).contains(&y)
                && (MIN_RES..=MAX_RES).contains(&z),
            "grid resolution must be within {}..={} per axis, got {}x{}x{}",
            MIN_RES,
            MAX_RES,
            x,
            y,
            z
        );
        Self { x, y, z }
    }

    #[inline]
    pub const fn cells(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Flat index of a voxel. Callers must pass in-grid coordinates.
    #[inline]
    pub fn idx(&self, x: i32, y: i32, z: i32) -> usize {
        debug_assert!(self.contains(x, y, z));
        x as usize + y as usize * self.x + z as usize * self.x * self.y
    }

    /// Anywhere in the grid, border included.
    #[inline]
    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0 && (x as usize) < self.x && y >= 0 && (y as usize) < self.y && z >= 0 && (z as usize) < self.z
    }

    /// Strictly inside the border. Border cells are permanently occupied,
    /// so every particle position must satisfy this.
    #[inline]
    pub fn interior(&self, x: i32, y: i32, z: i32) -> bool {
        x > 0 && (x as usize) < self.x - 1 && y > 0 && (y as usize) < self.y - 1 && z > 0 && (z as usize) < self.z - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pmap_word_round_trips_type_and_id() {
        let word = pmap_pack(513, 1_000_000);
        assert_eq!(pmap_typ(word), 513);
        assert_eq!(pmap_id(word), 1_000_000);
        assert_eq!(pmap_pack(PT_NONE, 0), 0);
    }

    #[test]
    fn gravity_mode_cycles_through_all_three() {
        let mut mode = GravityMode::Vertical;
        mode = mode.cycled();
        assert_eq!(mode, GravityMode::ZeroG);
        mode = mode.cycled();
        assert_eq!(mode, GravityMode::Radial);
        mode = mode.cycled();
        assert_eq!(mode, GravityMode::Vertical);
    }

    #[test]
    fn interior_excludes_the_border() {
        let dims = SimDims::new(10, 10, 10);
        assert!(dims.interior(1, 1, 1));
        assert!(dims.interior(8, 8, 8));
        assert!(!dims.interior(0, 5, 5));
        assert!(!dims.interior(9, 5, 5));
        assert!(!dims.interior(5, 0, 5));
        assert!(!dims.interior(5, 5, 9));
        assert!(dims.contains(0, 0, 0));
        assert!(!dims.contains(-1, 0, 0));
    }

    #[test]
    fn create_error_codes_match_the_abi() {
        assert_eq!(CreateError::AlreadyOccupied.code(), -1);
        assert_eq!(CreateError::PartsFull.code(), -3);
    }
}
