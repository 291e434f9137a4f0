//! Wasm embedder ABI.
//!
//! Thin wrapper over `Simulation` with wasm-bindgen-friendly signatures:
//! creation errors become the negative integer codes of the ABI and the
//! dirty-tile list is exposed as a pointer + length pair for zero-copy
//! readback from the wasm heap.

use wasm_bindgen::prelude::*;

use crate::defs::SimDims;
use crate::world::Simulation;

#[wasm_bindgen]
pub struct Engine {
    core: Simulation,
}

#[wasm_bindgen]
impl Engine {
    /// Create an engine with the given grid resolution.
    #[wasm_bindgen(constructor)]
    pub fn new(xres: usize, yres: usize, zres: usize) -> Self {
        Self {
            core: Simulation::new(SimDims::new(xres, yres, zres)),
        }
    }

    #[wasm_bindgen(getter)]
    pub fn xres(&self) -> usize {
        self.core.dims().x
    }

    #[wasm_bindgen(getter)]
    pub fn yres(&self) -> usize {
        self.core.dims().y
    }

    #[wasm_bindgen(getter)]
    pub fn zres(&self) -> usize {
        self.core.dims().z
    }

    #[wasm_bindgen(getter)]
    pub fn frame_count(&self) -> u32 {
        self.core.frame_count()
    }

    #[wasm_bindgen(getter)]
    pub fn parts_count(&self) -> u32 {
        self.core.parts_count()
    }

    #[wasm_bindgen(getter)]
    pub fn max_id(&self) -> i32 {
        self.core.max_id()
    }

    /// Wall-clock duration of the last completed tick.
    #[wasm_bindgen(getter)]
    pub fn last_tick_ms(&self) -> f64 {
        self.core.last_tick_ms()
    }

    #[wasm_bindgen(getter)]
    pub fn paused(&self) -> bool {
        self.core.paused
    }

    #[wasm_bindgen(setter)]
    pub fn set_paused(&mut self, paused: bool) {
        self.core.paused = paused;
    }

    /// Returns the new particle id, or a negative error code
    /// (-1 occupied, -3 store full).
    pub fn create_part(&mut self, x: i32, y: i32, z: i32, ptype: u16) -> i32 {
        match self.core.create_part(x, y, z, ptype) {
            Ok(id) => id,
            Err(err) => err.code(),
        }
    }

    pub fn kill_part(&mut self, id: i32) {
        self.core.kill_part(id);
    }

    /// Advance one tick.
    pub fn update(&mut self) {
        self.core.update();
    }

    pub fn cycle_gravity_mode(&mut self) {
        self.core.cycle_gravity_mode();
    }

    pub fn clear(&mut self) {
        self.core.clear();
    }

    /// Replace the element table from a JSON content bundle.
    pub fn load_content_bundle_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.core
            .install_content_bundle(json)
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    /// Write one coarse air cell's velocity (cell coordinates).
    pub fn set_air_velocity(&mut self, cx: usize, cy: usize, cz: usize, vx: f32, vy: f32, vz: f32) {
        self.core.air.set_velocity(cx, cy, cz, vx, vy, vz);
    }

    pub fn set_velocity(&mut self, id: i32, vx: f32, vy: f32, vz: f32) -> bool {
        self.core.set_velocity(id, vx, vy, vz)
    }

    // === Particle readback ===

    pub fn particle_type(&self, id: i32) -> u16 {
        self.core.part(id).map(|p| p.ptype).unwrap_or(0)
    }

    pub fn particle_x(&self, id: i32) -> f32 {
        self.core.part(id).map(|p| p.x).unwrap_or(0.0)
    }

    pub fn particle_y(&self, id: i32) -> f32 {
        self.core.part(id).map(|p| p.y).unwrap_or(0.0)
    }

    pub fn particle_z(&self, id: i32) -> f32 {
        self.core.part(id).map(|p| p.z).unwrap_or(0.0)
    }

    /// Color with the element's graphics hook applied.
    pub fn particle_color(&self, id: i32) -> u32 {
        self.core.particle_color(id)
    }

    pub fn pmap_at(&self, x: i32, y: i32, z: i32) -> u32 {
        self.core.pmap_at(x, y, z)
    }

    pub fn photons_at(&self, x: i32, y: i32, z: i32) -> u32 {
        self.core.photons_at(x, y, z)
    }

    // === Incremental rendering ===

    /// Collect tiles whose color data changed since the last collection.
    /// Returns the count; read them via `dirty_tiles_ptr`.
    pub fn collect_modified_tiles(&mut self) -> usize {
        self.core.tiles.collect_modified()
    }

    pub fn dirty_tiles_ptr(&self) -> *const u32 {
        self.core.tiles.dirty_list().as_ptr()
    }

    pub fn dirty_tiles_len(&self) -> usize {
        self.core.tiles.dirty_list().len()
    }

    pub fn total_tiles(&self) -> usize {
        self.core.tiles.total_tiles()
    }
}

impl Engine {
    /// Direct access for native embedders; the wasm ABI above stays flat.
    pub fn core(&self) -> &Simulation {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut Simulation {
        &mut self.core
    }
}
