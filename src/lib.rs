//! Voxula Engine - 3D falling-sand voxel particle simulation
//!
//! Architecture:
//! - defs.rs         - grid constants and the packed position-map word
//! - elements.rs     - element descriptors, table and swap matrix
//! - element_data.rs - builtin element set and hooks
//! - particle.rs     - particle record and frame-parity flags
//! - pmap.rs         - matter / energy position maps
//! - air.rs          - coarse air grid consumed by advection
//! - raycast.rs      - Amanatides-Woo voxel traversal
//! - world.rs        - engine state, scheduler and frame driver
//! - motion.rs       - gravity, advection, state-of-matter movement
//! - render.rs       - dirty color tiles for incremental rendering
//! - facade.rs       - wasm embedder ABI

mod defs;
mod utils;
mod rng;
mod particle;
mod elements;
mod element_data;
mod air;
mod pmap;
mod raycast;
mod render;
mod world;
mod motion;
mod facade;

use wasm_bindgen::prelude::*;

pub use crate::air::{AirCell, AirGrid, PRESSURE_IDX, VX_IDX, VY_IDX, VZ_IDX};
pub use crate::defs::{
    pmap_id, pmap_pack, pmap_typ, CreateError, ElementType, GravityMode, PartId, PartSwapBehavior,
    SimDims, AIR_CELL_SIZE, MAX_RES, MAX_VELOCITY, MIN_RES, PMAP_ID_BITS, PMAP_MAX_PARTS, PT_NONE,
};
pub use crate::element_data::{
    ELEMENT_COUNT, PT_DUST, PT_GAS, PT_GOL, PT_OIL, PT_PHOT, PT_STNE, PT_WATR,
};
pub use crate::elements::{
    BundleError, Element, ElementState, ElementTable, GraphicsFlags, GraphicsFn, UpdateFn,
    UpdateOutcome, MAX_ELEMENT_TYPES,
};
pub use crate::facade::Engine;
pub use crate::particle::{PartFlags, Particle};
pub use crate::raycast::{raycast, HitFaces, RaycastInput, RaycastOutput};
pub use crate::render::{DirtyTiles, TILE_SIZE};
pub use crate::rng::{with_thread_rng, Rng};
pub use crate::utils::{IVec3, Vec3};
pub use crate::world::Simulation;

// Browser thread-pool bootstrap for the parallel feature.
#[cfg(all(target_arch = "wasm32", feature = "parallel"))]
pub use wasm_bindgen_rayon::init_thread_pool;

// Better error messages in debug mode
#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Initialize the engine
#[wasm_bindgen]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    set_panic_hook();

    #[cfg(target_arch = "wasm32")]
    web_sys::console::log_1(&"voxula engine initialized".into());
}

/// Get engine version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// Export element constants for JS
#[wasm_bindgen]
pub fn el_none() -> u16 {
    defs::PT_NONE
}
#[wasm_bindgen]
pub fn el_dust() -> u16 {
    element_data::PT_DUST
}
#[wasm_bindgen]
pub fn el_stne() -> u16 {
    element_data::PT_STNE
}
#[wasm_bindgen]
pub fn el_watr() -> u16 {
    element_data::PT_WATR
}
#[wasm_bindgen]
pub fn el_oil() -> u16 {
    element_data::PT_OIL
}
#[wasm_bindgen]
pub fn el_gas() -> u16 {
    element_data::PT_GAS
}
#[wasm_bindgen]
pub fn el_phot() -> u16 {
    element_data::PT_PHOT
}
#[wasm_bindgen]
pub fn el_gol() -> u16 {
    element_data::PT_GOL
}
