//! Engine state and the per-tick frame driver.
//!
//! `Simulation` owns the particle store, both position maps, the free list
//! and the per-slice scan bounds. A tick walks every interior Z-slice in
//! two slab passes (even slabs, barrier, odd slabs) so no two workers ever
//! touch adjacent Z-columns at the same time, then a sequential
//! reconciliation pass recounts the store and flushes particles the
//! parallel region deferred for causality.

use std::sync::Arc;

use crate::air::AirGrid;
use crate::defs::{
    pmap_id, pmap_pack, CreateError, ElementType, GravityMode, PartId, SimDims, PMAP_MAX_PARTS,
    PT_NONE,
};
use crate::elements::{BundleError, ElementState, ElementTable, GraphicsFlags};
use crate::particle::{PartFlags, Particle};
use crate::pmap::PosMap;
use crate::render::DirtyTiles;

/// Minimum safe causality radius per slab half; bounds how many worker
/// threads a grid can sustain.
pub(crate) const MIN_CAUSALITY_RADIUS: usize = 4;

// Wall-clock timer that works both in wasm and native builds.
#[derive(Clone, Copy)]
struct TickTimer {
    #[cfg(target_arch = "wasm32")]
    start_ms: f64,
    #[cfg(not(target_arch = "wasm32"))]
    start: std::time::Instant,
}

impl TickTimer {
    fn start() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            TickTimer {
                start_ms: js_sys::Date::now(),
            }
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            TickTimer {
                start: std::time::Instant::now(),
            }
        }
    }

    fn elapsed_ms(&self) -> f64 {
        #[cfg(target_arch = "wasm32")]
        {
            js_sys::Date::now() - self.start_ms
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.start.elapsed().as_secs_f64() * 1000.0
        }
    }
}

pub struct Simulation {
    /// Checked at the top of `update` only; a running tick completes.
    pub paused: bool,

    dims: SimDims,
    elements: Arc<ElementTable>,

    pub(crate) parts: Vec<Particle>,
    pub(crate) pmap: PosMap,
    pub(crate) photons: PosMap,

    /// Head of the free list threaded through dead slots' negative ids.
    pub(crate) pfree: PartId,
    /// One past the largest live index; transiently stale during a tick,
    /// recomputed by the reconciliation pass.
    pub(crate) max_id: PartId,
    parts_count: u32,
    frame_count: u32,

    pub(crate) gravity_mode: GravityMode,

    /// Vertical AABB of live particles per interior Z-slice (index z-1),
    /// used to skip empty bands during the slice scan.
    min_y_per_zslice: Vec<i32>,
    max_y_per_zslice: Vec<i32>,

    /// Output of the external pressure solver, sampled by advection.
    pub air: AirGrid,
    /// Color-modified bits for the renderer.
    pub tiles: DirtyTiles,

    sim_thread_count: usize,
    /// Particle capacity: grid volume, capped by the map word's id field.
    nparts: usize,

    last_tick_ms: f64,
}

impl Simulation {
    pub fn new(dims: SimDims) -> Self {
        Self::with_elements(dims, Arc::new(ElementTable::builtin()))
    }

    pub fn with_elements(dims: SimDims, elements: Arc<ElementTable>) -> Self {
        let nparts = dims.cells().min(PMAP_MAX_PARTS);
        let max_threads = (dims.z / (4 * MIN_CAUSALITY_RADIUS)).max(1);
        #[cfg(feature = "parallel")]
        let sim_thread_count = rayon::current_num_threads().clamp(1, max_threads);
        #[cfg(not(feature = "parallel"))]
        let sim_thread_count = 1.min(max_threads);

        log::debug!(
            "engine: {}x{}x{} grid, {} worker threads, slab width {}",
            dims.x,
            dims.y,
            dims.z,
            sim_thread_count,
            (dims.z - 2) / (2 * sim_thread_count) + 1
        );

        Self {
            paused: false,
            elements,
            // Slot 0 is a permanently dead sentinel: map words pack id 0
            // for empty cells, and swapping against it is harmless.
            parts: vec![Particle::default()],
            pmap: PosMap::new(dims),
            photons: PosMap::new(dims),
            pfree: 1,
            max_id: 0,
            parts_count: 0,
            frame_count: 0,
            gravity_mode: GravityMode::Vertical,
            min_y_per_zslice: vec![1; dims.z - 2],
            max_y_per_zslice: vec![dims.y as i32 - 2; dims.z - 2],
            air: AirGrid::new(dims),
            tiles: DirtyTiles::new(dims),
            sim_thread_count,
            nparts,
            last_tick_ms: 0.0,
            dims,
        }
    }

    #[inline]
    pub fn dims(&self) -> SimDims {
        self.dims
    }

    #[inline]
    pub fn elements(&self) -> &ElementTable {
        &self.elements
    }

    #[inline]
    pub(crate) fn elements_arc(&self) -> Arc<ElementTable> {
        self.elements.clone()
    }

    #[inline]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    #[inline]
    pub fn parts_count(&self) -> u32 {
        self.parts_count
    }

    #[inline]
    pub fn max_id(&self) -> PartId {
        self.max_id
    }

    #[inline]
    pub fn pfree(&self) -> PartId {
        self.pfree
    }

    #[inline]
    pub fn gravity_mode(&self) -> GravityMode {
        self.gravity_mode
    }

    pub fn cycle_gravity_mode(&mut self) {
        self.gravity_mode = self.gravity_mode.cycled();
    }

    #[inline]
    pub fn thread_count(&self) -> usize {
        self.sim_thread_count
    }

    /// Pin the worker count, clamped to what the grid depth can sustain.
    pub fn set_thread_count(&mut self, threads: usize) {
        let max_threads = (self.dims.z / (4 * MIN_CAUSALITY_RADIUS)).max(1);
        self.sim_thread_count = threads.clamp(1, max_threads);
    }

    /// Read-only particle store, sentinel slot included.
    #[inline]
    pub fn parts(&self) -> &[Particle] {
        &self.parts
    }

    #[inline]
    pub fn part(&self, i: PartId) -> Option<&Particle> {
        self.parts.get(i as usize).filter(|p| p.alive())
    }

    /// Mutable particle access for element hooks and embedder setup.
    #[inline]
    pub fn part_mut(&mut self, i: PartId) -> Option<&mut Particle> {
        self.parts.get_mut(i as usize).filter(|p| p.alive())
    }

    /// Give a particle an initial velocity, e.g. when spawning projectiles.
    pub fn set_velocity(&mut self, i: PartId, vx: f32, vy: f32, vz: f32) -> bool {
        match self.part_mut(i) {
            Some(part) => {
                part.vx = vx;
                part.vy = vy;
                part.vz = vz;
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn pmap_at(&self, x: i32, y: i32, z: i32) -> u32 {
        self.pmap.get(x, y, z)
    }

    #[inline]
    pub fn photons_at(&self, x: i32, y: i32, z: i32) -> u32 {
        self.photons.get(x, y, z)
    }

    /// Element type of the matter occupant, PT_NONE when empty or outside
    /// the grid. Convenient for element hooks scanning their neighborhood.
    #[inline]
    pub fn matter_type_at(&self, x: i32, y: i32, z: i32) -> ElementType {
        if !self.dims.contains(x, y, z) {
            return PT_NONE;
        }
        crate::defs::pmap_typ(self.pmap.get(x, y, z))
    }

    #[inline]
    pub fn energy_type_at(&self, x: i32, y: i32, z: i32) -> ElementType {
        if !self.dims.contains(x, y, z) {
            return PT_NONE;
        }
        crate::defs::pmap_typ(self.photons.get(x, y, z))
    }

    /// Per-particle color with the element's graphics hook applied.
    pub fn particle_color(&self, i: PartId) -> u32 {
        self.particle_graphics(i).0
    }

    pub fn particle_graphics(&self, i: PartId) -> (u32, GraphicsFlags) {
        let Some(part) = self.part(i) else {
            return (0, GraphicsFlags::empty());
        };
        let el = self.elements.element(part.ptype);
        let mut color = el.color;
        let mut flags = el.graphics_flags;
        if let Some(graphics) = el.graphics {
            graphics(self, i, &mut color, &mut flags);
        }
        (color, flags)
    }

    /// Allocate and place a particle. The new particle's parity flags are
    /// set opposite to the current frame so the next scan visits it.
    pub fn create_part(
        &mut self,
        x: i32,
        y: i32,
        z: i32,
        ptype: ElementType,
    ) -> Result<PartId, CreateError> {
        debug_assert!(
            self.dims.interior(x, y, z),
            "create_part target must be inside the border, got ({x}, {y}, {z})"
        );
        // The border is permanently occupied; refuse invalid and disabled
        // types the same way.
        if !self.dims.interior(x, y, z) {
            return Err(CreateError::AlreadyOccupied);
        }
        if ptype == PT_NONE || !self.elements.is_valid_type(ptype) {
            return Err(CreateError::AlreadyOccupied);
        }
        let el = self.elements.element(ptype);
        if !el.enabled {
            return Err(CreateError::AlreadyOccupied);
        }
        let is_energy = el.state == ElementState::Energy;

        let occupied = if is_energy {
            self.photons.get(x, y, z)
        } else {
            self.pmap.get(x, y, z)
        };
        if occupied != 0 {
            return Err(CreateError::AlreadyOccupied);
        }
        if self.pfree as usize >= self.nparts {
            return Err(CreateError::PartsFull);
        }
        if self.pfree as usize == self.parts.len() {
            self.parts.push(Particle::default());
        }

        let slot = self.pfree as usize;
        // Dead slots link to the next free one; fresh slots fall through
        // to "the one after me has never been used either".
        let next_pfree = if self.parts[slot].id < 0 {
            -self.parts[slot].id
        } else {
            self.pfree + 1
        };

        let opposite_parity = (self.frame_count & 1) == 0;
        let part = &mut self.parts[slot];
        part.id = self.pfree;
        part.ptype = ptype;
        part.x = x as f32;
        part.y = y as f32;
        part.z = z as f32;
        part.rx = x;
        part.ry = y;
        part.rz = z;
        part.vx = 0.0;
        part.vy = 0.0;
        part.vz = 0.0;
        part.life = 0;
        part.flag = PartFlags::empty();
        part.set_parity(PartFlags::UPDATE_FRAME, opposite_parity);
        part.set_parity(PartFlags::MOVE_FRAME, opposite_parity);
        part.flag.set(PartFlags::IS_ENERGY, is_energy);

        let word = pmap_pack(ptype, self.pfree);
        if is_energy {
            self.photons.set(x, y, z, word);
        } else {
            self.pmap.set(x, y, z, word);
        }
        self.tiles.mark(x, y, z);

        let id = self.pfree;
        self.max_id = self.max_id.max(id + 1);
        self.pfree = next_pfree;
        self.parts_count += 1;
        Ok(id)
    }

    /// Release a particle back to the free list. Dead ids are ignored.
    pub fn kill_part(&mut self, i: PartId) {
        if i <= 0 || i as usize >= self.parts.len() {
            return;
        }
        if !self.parts[i as usize].alive() {
            return;
        }

        let (x, y, z) = {
            let part = &self.parts[i as usize];
            (part.rx, part.ry, part.rz)
        };
        if self.pmap.get(x, y, z) != 0 && pmap_id(self.pmap.get(x, y, z)) == i {
            self.pmap.set(x, y, z, 0);
        } else if self.photons.get(x, y, z) != 0 && pmap_id(self.photons.get(x, y, z)) == i {
            self.photons.set(x, y, z, 0);
        }

        let part = &mut self.parts[i as usize];
        part.ptype = PT_NONE;
        part.flag.remove(PartFlags::IS_ENERGY);
        if i + 1 == self.max_id {
            self.max_id -= 1;
        }
        part.id = -self.pfree;
        self.pfree = i;
        self.parts_count = self.parts_count.saturating_sub(1);
        self.tiles.mark(x, y, z);
    }

    /// Drop every particle and reset counters. The element table stays.
    pub fn clear(&mut self) {
        self.parts.clear();
        self.parts.push(Particle::default());
        self.pmap.clear();
        self.photons.clear();
        self.pfree = 1;
        self.max_id = 0;
        self.parts_count = 0;
        self.frame_count = 0;
        self.min_y_per_zslice.fill(1);
        self.max_y_per_zslice.fill(self.dims.y as i32 - 2);
        self.air.clear();
        self.tiles.clear();
    }

    /// Replace the element table from a JSON content bundle. Existing
    /// particles would carry stale type ids, so the grid is cleared.
    pub fn install_content_bundle(&mut self, json: &str) -> Result<(), BundleError> {
        let table = ElementTable::from_bundle_json(json)?;
        self.elements = Arc::new(table);
        self.clear();
        Ok(())
    }

    /// Wall-clock duration of the last completed tick.
    #[inline]
    pub fn last_tick_ms(&self) -> f64 {
        self.last_tick_ms
    }

    /// Advance one tick.
    pub fn update(&mut self) {
        if self.paused {
            return;
        }
        let timer = TickTimer::start();

        #[cfg(feature = "parallel")]
        {
            if self.sim_thread_count > 1 {
                self.update_parallel();
            } else {
                self.update_all_slices();
            }
        }
        #[cfg(not(feature = "parallel"))]
        self.update_all_slices();

        self.recalc_free_particles();
        self.frame_count = self.frame_count.wrapping_add(1);
        self.last_tick_ms = timer.elapsed_ms();
    }

    fn update_all_slices(&mut self) {
        for z in 1..self.dims.z as i32 - 1 {
            self.update_zslice(z, true);
        }
    }

    /// Fork-join slab passes. Each worker owns two disjoint slabs per
    /// tick; the scope boundary between the passes is the global barrier
    /// that keeps adjacent Z-columns from ever being touched concurrently.
    #[cfg(feature = "parallel")]
    fn update_parallel(&mut self) {
        let threads = self.sim_thread_count;
        let slab_width = (self.dims.z - 2) / (2 * threads) + 1;
        let shared = SlabShared(self as *mut Simulation);

        rayon::scope(|scope| {
            for tid in 0..threads {
                let shared = &shared;
                scope.spawn(move |_| {
                    // SAFETY: worker `tid` only visits particles whose rz
                    // lies in its own slab, and the causality cutoff in
                    // update_part keeps every read and write within it.
                    // Slabs of one pass are disjoint and separated by the
                    // other pass's slabs.
                    let sim = unsafe { shared.get() };
                    let start = (slab_width * 2 * tid) as i32;
                    for z in start..start + slab_width as i32 {
                        sim.update_zslice(z, true);
                    }
                });
            }
        });
        // Pass barrier: the scope above joined every even-slab worker.
        rayon::scope(|scope| {
            for tid in 0..threads {
                let shared = &shared;
                scope.spawn(move |_| {
                    // SAFETY: as above, for the odd slabs.
                    let sim = unsafe { shared.get() };
                    let start = (slab_width * (2 * tid + 1)) as i32;
                    for z in start..start + slab_width as i32 {
                        sim.update_zslice(z, true);
                    }
                });
            }
        });
    }

    /// Visit every mapped particle of one interior Z-slice in (y, x)
    /// order, bounded by the slice's vertical AABB.
    pub(crate) fn update_zslice(&mut self, pz: i32, consider_causality: bool) {
        if pz < 1 || pz >= self.dims.z as i32 - 1 {
            return;
        }
        let min_y = self.min_y_per_zslice[(pz - 1) as usize];
        let max_y = self.max_y_per_zslice[(pz - 1) as usize];

        for py in min_y..=max_y {
            for px in 1..self.dims.x as i32 - 1 {
                let word = self.pmap.get(px, py, pz);
                if word != 0 {
                    self.update_part(pmap_id(word), consider_causality);
                }
                let word = self.photons.get(px, py, pz);
                if word != 0 {
                    self.update_part(pmap_id(word), consider_causality);
                }
            }
        }
    }

    /// Sequential reconciliation after the parallel region: recount live
    /// particles, rebuild the slice AABBs, restore missing map entries
    /// (energy-on-energy co-occupation can orphan one) and flush the
    /// particles the slab passes deferred.
    pub(crate) fn recalc_free_particles(&mut self) {
        self.parts_count = 0;
        let mut new_max_id: PartId = 0;
        self.min_y_per_zslice.fill(self.dims.y as i32 - 1);
        self.max_y_per_zslice.fill(0);

        let upper = (self.max_id as usize).min(self.parts.len().saturating_sub(1));
        for i in 1..=upper {
            if !self.parts[i].alive() {
                continue;
            }
            self.parts_count += 1;
            new_max_id = i as PartId;

            let (x, y, z, is_energy, ptype) = {
                let part = &self.parts[i];
                (part.rx, part.ry, part.rz, part.is_energy(), part.ptype)
            };

            let slice = (z - 1) as usize;
            self.min_y_per_zslice[slice] = self.min_y_per_zslice[slice].min(y);
            self.max_y_per_zslice[slice] = self.max_y_per_zslice[slice].max(y);

            let map = if is_energy {
                &mut self.photons
            } else {
                &mut self.pmap
            };
            if map.get(x, y, z) == 0 {
                map.set(x, y, z, pmap_pack(ptype, i as PartId));
            }

            self.update_part(i as PartId, false);
        }
        self.max_id = new_max_id + 1;
    }
}

/// Shared handle for the slab passes. The raw pointer is only ever turned
/// back into a reference inside a worker that respects the slab partition.
#[cfg(feature = "parallel")]
struct SlabShared(*mut Simulation);

#[cfg(feature = "parallel")]
unsafe impl Send for SlabShared {}
#[cfg(feature = "parallel")]
unsafe impl Sync for SlabShared {}

#[cfg(feature = "parallel")]
impl SlabShared {
    /// SAFETY: callers must confine reads and writes to their own slab
    /// per the scheduler's partition and causality discipline.
    #[allow(clippy::mut_from_ref)]
    unsafe fn get(&self) -> &mut Simulation {
        &mut *self.0
    }
}

#[cfg(test)]
#[path = "world_tests.rs"]
mod tests;
