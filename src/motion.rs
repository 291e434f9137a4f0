//! The per-particle motion pipeline.
//!
//! Order per tick and particle: velocity loss, air advection, the element
//! update hook, state-of-matter default movement, then resolution of the
//! accumulated velocity into displacement by voxel raycast. Frame-parity
//! flags make each section run at most once per tick even when the slice
//! scan revisits a particle after it moved.

use crate::air::{VX_IDX, VY_IDX, VZ_IDX};
use crate::defs::{pmap_id, pmap_typ, GravityMode, PartId, PartSwapBehavior, MAX_VELOCITY, PT_NONE};
use crate::elements::{ElementState, UpdateOutcome};
use crate::particle::PartFlags;
use crate::raycast::{raycast, HitFaces, RaycastInput, RaycastOutput};
use crate::rng::with_thread_rng;
use crate::utils::{clampf, roundf, sign, Vec3};
use crate::world::Simulation;

impl Simulation {
    /// Maximum distance a particle may influence per tick without risking
    /// a reach into a neighboring worker's slab.
    #[inline]
    pub fn max_ok_causality_range(&self) -> f32 {
        (self.dims().z / (4 * self.thread_count())) as f32
    }

    /// Advance one particle. With `consider_causality` set (the parallel
    /// slice scan), particles whose element causality or |vz| exceeds the
    /// safe range are left untouched; the sequential reconciliation pass
    /// calls back with it unset and picks them up.
    pub(crate) fn update_part(&mut self, i: PartId, consider_causality: bool) {
        let idx = i as usize;
        if idx == 0 || idx >= self.parts.len() || !self.parts[idx].alive() {
            return;
        }

        let elements = self.elements_arc();
        let el = elements.element(self.parts[idx].ptype);
        let range = self.max_ok_causality_range();
        if consider_causality && el.causality as f32 > range {
            return;
        }

        let parity = (self.frame_count() & 1) != 0;

        if self.parts[idx].parity(PartFlags::UPDATE_FRAME) != parity {
            // Flip before running the section: a post-move revisit by the
            // same scan must see the particle as already handled.
            self.parts[idx].set_parity(PartFlags::UPDATE_FRAME, parity);

            let (x, y, z) = {
                let part = &self.parts[idx];
                (part.rx, part.ry, part.rz)
            };

            {
                let cell = self.air.cell(x, y, z);
                let (ax, ay, az) = (cell.data[VX_IDX], cell.data[VY_IDX], cell.data[VZ_IDX]);
                let part = &mut self.parts[idx];
                part.vx *= el.loss;
                part.vy *= el.loss;
                part.vz *= el.loss;
                if el.advection != 0.0 {
                    part.vx += el.advection * ax;
                    part.vy += el.advection * ay;
                    part.vz += el.advection * az;
                }
            }

            if let Some(update) = el.update {
                if update(self, i, x, y, z) == UpdateOutcome::Handled {
                    // The hook owned this tick's motion as well.
                    if self.parts[idx].alive() {
                        self.parts[idx].set_parity(PartFlags::MOVE_FRAME, parity);
                    }
                    return;
                }
                if !self.parts[idx].alive() {
                    return;
                }
            }

            self.move_behavior(i);
        }

        if self.parts[idx].parity(PartFlags::MOVE_FRAME) != parity {
            if consider_causality && self.parts[idx].vz.abs() > range {
                return;
            }
            self.parts[idx].set_parity(PartFlags::MOVE_FRAME, parity);

            let (x, y, z, moving) = {
                let part = &self.parts[idx];
                (part.rx, part.ry, part.rz, part.has_velocity())
            };
            if moving {
                self.raycast_movement(i, x, y, z);
            }
        }
    }

    /// State-of-matter default movement: gravity coupling, powder piling,
    /// liquid spread, gas diffusion. Solids and energy have none.
    pub(crate) fn move_behavior(&mut self, i: PartId) {
        let elements = self.elements_arc();
        let idx = i as usize;
        let el = elements.element(self.parts[idx].ptype);
        if el.state == ElementState::Solid || el.state == ElementState::Energy {
            return;
        }

        let dims = self.dims();
        let (x, y, z) = {
            let part = &self.parts[idx];
            (part.rx, part.ry, part.rz)
        };

        let mut gravity_force = Vec3::ZERO;
        if el.gravity != 0.0 {
            match self.gravity_mode {
                GravityMode::ZeroG => {}
                GravityMode::Vertical => {
                    // Only pull while the cell below can actually be
                    // entered; grounded particles don't accumulate vy.
                    if self.eval_move(i, x, y - 1, z) != PartSwapBehavior::Noop {
                        self.parts[idx].vy -= el.gravity;
                    }
                }
                GravityMode::Radial => {
                    let part = &self.parts[idx];
                    gravity_force = Vec3::new(
                        dims.x as f32 / 2.0 - part.x,
                        dims.y as f32 / 2.0 - part.y,
                        dims.z as f32 / 2.0 - part.z,
                    )
                    .normalized();
                    let part = &mut self.parts[idx];
                    part.vx += gravity_force.x * el.gravity;
                    part.vy += gravity_force.y * el.gravity;
                    part.vz += gravity_force.z * el.gravity;
                }
            }
        }

        match el.state {
            ElementState::Powder | ElementState::Liquid => {
                let is_liquid = el.state == ElementState::Liquid;
                match self.gravity_mode {
                    GravityMode::ZeroG => {}
                    GravityMode::Vertical => {
                        if y > 1 && self.eval_move(i, x, y - 1, z) != PartSwapBehavior::Noop {
                            return; // free fall, no sideways jitter
                        }
                        if el.diffusion <= 0.0 {
                            return; // the rejection loop below cannot end
                        }
                        let (dx, dz) = with_thread_rng(|rng| loop {
                            let dx = rng.uniform(-el.diffusion, el.diffusion);
                            let dz = rng.uniform(-el.diffusion, el.diffusion);
                            if dx != 0.0 || dz != 0.0 {
                                break (dx, dz);
                            }
                        });

                        // Powder drops one level while rolling; liquid
                        // spreads on its own level.
                        let new_y = if is_liquid { y } else { y - 1 };
                        if !dims.interior(x + roundf(dx), new_y, z + roundf(dz)) {
                            return;
                        }
                        let new_yf = if is_liquid {
                            self.parts[idx].y
                        } else {
                            self.parts[idx].y - 1.0
                        };
                        let can_move_y = is_liquid
                            || self.eval_move(i, x + roundf(dx), y, z + roundf(dz))
                                != PartSwapBehavior::Noop;
                        if !can_move_y {
                            return;
                        }

                        let mut hit = false;
                        if dx.abs() > 1.0 || dz.abs() > 1.0 {
                            // Long jitter must not tunnel; raycast along
                            // the horizontal step. Cells of our own kind
                            // don't stop the ray, which lets piles flow.
                            let ptype = self.parts[idx].ptype;
                            let mut out = RaycastOutput::default();
                            hit = raycast(
                                &RaycastInput {
                                    x,
                                    y,
                                    z,
                                    vx: dx,
                                    vy: 0.0,
                                    vz: dz,
                                    compute_faces: false,
                                },
                                &mut out,
                                |lx, ly, lz| {
                                    if !dims.interior(lx, ly, lz) {
                                        return PartSwapBehavior::Noop;
                                    }
                                    if pmap_typ(self.pmap.get(lx, ly, lz)) == ptype {
                                        return PartSwapBehavior::Swap;
                                    }
                                    self.eval_move(i, lx, ly, lz)
                                },
                            );
                            if hit {
                                self.try_move(i, out.x as f32, new_yf, out.z as f32, out.behavior);
                            }
                        }
                        if !hit {
                            let (px, pz) = {
                                let part = &self.parts[idx];
                                (part.x, part.z)
                            };
                            self.try_move(
                                i,
                                px + dx,
                                new_yf,
                                pz + dz,
                                PartSwapBehavior::NotEvaledYet,
                            );
                        }
                    }
                    GravityMode::Radial => {
                        // Wiggle orthogonally to gravity: always for
                        // liquids, for powders only while unsupported in
                        // the gravity direction.
                        let supported = self.eval_move(
                            i,
                            x + sign(gravity_force.x),
                            y + sign(gravity_force.y),
                            z + sign(gravity_force.z),
                        ) == PartSwapBehavior::Noop;
                        if is_liquid || !supported {
                            let randv =
                                with_thread_rng(|rng| rng.rand_perpendicular_vector(gravity_force))
                                    .scaled(el.diffusion);
                            let nx = x as f32 + randv.x;
                            let ny = y as f32 + randv.y;
                            let nz = z as f32 + randv.z;
                            if nx >= 0.0 && ny >= 0.0 && nz >= 0.0 {
                                self.try_move(i, nx, ny, nz, PartSwapBehavior::NotEvaledYet);
                            }
                        }
                    }
                }
            }
            ElementState::Gas => {
                let randv = with_thread_rng(|rng| rng.rand_norm_vector());
                let nx = x as f32 + el.diffusion * randv.x;
                let ny = y as f32 + el.diffusion * randv.y;
                let nz = z as f32 + el.diffusion * randv.z;
                if nx >= 0.0 && ny >= 0.0 && nz >= 0.0 {
                    self.try_move(i, nx, ny, nz, PartSwapBehavior::NotEvaledYet);
                }
            }
            _ => {}
        }
    }

    /// Resolve the accumulated velocity into displacement. One cast per
    /// tick: a miss flies the whole clamped velocity, a hit pins the
    /// particle to the last free voxel and bounces the velocity component
    /// along each hit face for the next tick.
    pub(crate) fn raycast_movement(&mut self, i: PartId, x: i32, y: i32, z: i32) {
        let idx = i as usize;
        let dims = self.dims();
        {
            let part = &mut self.parts[idx];
            part.vx = clampf(part.vx, -MAX_VELOCITY, MAX_VELOCITY);
            part.vy = clampf(part.vy, -MAX_VELOCITY, MAX_VELOCITY);
            part.vz = clampf(part.vz, -MAX_VELOCITY, MAX_VELOCITY);
        }
        let collision = {
            let elements = self.elements_arc();
            elements.element(self.parts[idx].ptype).collision
        };

        let (vx, vy, vz) = {
            let part = &self.parts[idx];
            (part.vx, part.vy, part.vz)
        };
        let mut out = RaycastOutput::default();
        let hit = raycast(
            &RaycastInput {
                x,
                y,
                z,
                vx,
                vy,
                vz,
                compute_faces: true,
            },
            &mut out,
            |lx, ly, lz| {
                if !dims.interior(lx, ly, lz) {
                    return PartSwapBehavior::Noop;
                }
                self.eval_move(i, lx, ly, lz)
            },
        );

        let mut no_move = false;
        if hit {
            no_move = out.x == x && out.y == y && out.z == z;
            let part = &mut self.parts[idx];
            if out.faces.contains(HitFaces::X) {
                part.vx *= collision;
            }
            if out.faces.contains(HitFaces::Y) {
                part.vy *= collision;
            }
            if out.faces.contains(HitFaces::Z) {
                part.vz *= collision;
            }
            if part.vx.abs() < 0.1 && part.vy.abs() < 0.1 && part.vz.abs() < 0.1 {
                // Residual velocity cannot leave the voxel anyway.
                no_move = true;
            }
        }

        if !hit || no_move {
            // Step to the clamped float destination; the blocked particle
            // case lets diagonal residual velocity slide along the face.
            let (px, py, pz, vx, vy, vz) = {
                let part = &self.parts[idx];
                (part.x, part.y, part.z, part.vx, part.vy, part.vz)
            };
            self.try_move(
                i,
                clampf(px + vx, 1.0, dims.x as f32 - 1.0),
                clampf(py + vy, 1.0, dims.y as f32 - 1.0),
                clampf(pz + vz, 1.0, dims.z as f32 - 1.0),
                PartSwapBehavior::NotEvaledYet,
            );
        } else {
            self.try_move(i, out.x as f32, out.y as f32, out.z as f32, out.behavior);
        }
    }

    /// Try to move a particle to a (sub-voxel) target, updating its map.
    /// `behavior` is evaluated here when the caller passes the sentinel.
    pub(crate) fn try_move(
        &mut self,
        i: PartId,
        tx: f32,
        ty: f32,
        tz: f32,
        behavior: PartSwapBehavior,
    ) {
        let x = roundf(tx);
        let y = roundf(ty);
        let z = roundf(tz);
        if !self.dims().interior(x, y, z) {
            return;
        }

        let idx = i as usize;
        let (oldx, oldy, oldz) = {
            let part = &self.parts[idx];
            (part.rx, part.ry, part.rz)
        };

        if x == oldx && y == oldy && z == oldz {
            // Same voxel: keep the sub-voxel drift, nothing else moves.
            let part = &mut self.parts[idx];
            part.x = tx;
            part.y = ty;
            part.z = tz;
            part.rx = x;
            part.ry = y;
            part.rz = z;
            return;
        }

        let is_energy = self.parts[idx].is_energy();
        let old_map_val = if is_energy {
            self.photons.get(oldx, oldy, oldz)
        } else {
            self.pmap.get(oldx, oldy, oldz)
        };

        let behavior = if behavior == PartSwapBehavior::NotEvaledYet {
            self.eval_move(i, x, y, z)
        } else {
            behavior
        };

        match behavior {
            PartSwapBehavior::Noop => return,
            PartSwapBehavior::Swap => {
                let dest_val = if is_energy {
                    self.photons.get(x, y, z)
                } else {
                    self.pmap.get(x, y, z)
                };
                self.swap_part(x, y, z, oldx, oldy, oldz, pmap_id(dest_val), i);
            }
            PartSwapBehavior::OccupySame => {
                let map = if is_energy {
                    &mut self.photons
                } else {
                    &mut self.pmap
                };
                map.set(oldx, oldy, oldz, 0);
                map.set(x, y, z, old_map_val);
            }
            PartSwapBehavior::Special | PartSwapBehavior::NotEvaledYet => {
                // Specials are resolved by eval_move before dispatch.
                debug_assert!(false, "unresolved swap behavior in try_move");
                return;
            }
        }

        let part = &mut self.parts[idx];
        part.x = tx;
        part.y = ty;
        part.z = tz;
        part.rx = x;
        part.ry = y;
        part.rz = z;

        self.tiles.mark(oldx, oldy, oldz);
        self.tiles.mark(x, y, z);
    }

    /// Exchange the positions and map entries of two particles. `id1` may
    /// be the dead sentinel (slot 0) when the destination cell is empty;
    /// the position garbage it collects is never read.
    pub(crate) fn swap_part(
        &mut self,
        x1: i32,
        y1: i32,
        z1: i32,
        x2: i32,
        y2: i32,
        z2: i32,
        id1: PartId,
        id2: PartId,
    ) {
        let (i1, i2) = (id1 as usize, id2 as usize);
        if i1 == i2 {
            return;
        }

        {
            let (a, b) = if i1 < i2 {
                let (left, right) = self.parts.split_at_mut(i2);
                (&mut left[i1], &mut right[0])
            } else {
                let (left, right) = self.parts.split_at_mut(i1);
                (&mut right[0], &mut left[i2])
            };
            std::mem::swap(&mut a.x, &mut b.x);
            std::mem::swap(&mut a.y, &mut b.y);
            std::mem::swap(&mut a.z, &mut b.z);
            std::mem::swap(&mut a.rx, &mut b.rx);
            std::mem::swap(&mut a.ry, &mut b.ry);
            std::mem::swap(&mut a.rz, &mut b.rz);
        }

        let part1_energy = self.parts[i1].is_energy();
        let part2_energy = self.parts[i2].is_energy();

        if !part1_energy && !part2_energy {
            self.pmap.swap_cells((x1, y1, z1), (x2, y2, z2));
        } else if part1_energy && part2_energy {
            self.photons.swap_cells((x1, y1, z1), (x2, y2, z2));
        } else {
            // Energy trading places with matter moves both map entries.
            self.pmap.swap_cells((x1, y1, z1), (x2, y2, z2));
            self.photons.swap_cells((x1, y1, z1), (x2, y2, z2));
        }

        self.tiles.mark(x1, y1, z1);
        self.tiles.mark(x2, y2, z2);
    }

    /// Behavior of particle `i` entering `(nx, ny, nz)`: empty cells swap
    /// freely, otherwise the swap matrix decides. SPECIAL falls back to
    /// NOOP until a runtime resolver exists.
    pub(crate) fn eval_move(&self, i: PartId, nx: i32, ny: i32, nz: i32) -> PartSwapBehavior {
        debug_assert!(self.dims().contains(nx, ny, nz));
        let mut other_type = pmap_typ(self.pmap.get(nx, ny, nz));
        if other_type == PT_NONE {
            other_type = pmap_typ(self.photons.get(nx, ny, nz));
        }
        if other_type == PT_NONE {
            return PartSwapBehavior::Swap;
        }

        let this_type = self.parts[i as usize].ptype;
        match self.elements().can_move(this_type, other_type) {
            PartSwapBehavior::Special => PartSwapBehavior::Noop,
            behavior => behavior,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::SimDims;
    use crate::element_data::{PT_DUST, PT_STNE, PT_WATR};
    use crate::utils::hypot3;

    #[test]
    fn eval_move_uses_weight_order_and_swaps_into_empty() {
        let mut sim = Simulation::new(SimDims::new(12, 12, 12));
        let dust = sim.create_part(5, 5, 5, PT_DUST).unwrap();
        sim.create_part(5, 4, 5, PT_WATR).unwrap();
        // Dust over water swaps by weight.
        assert_eq!(sim.eval_move(dust, 5, 4, 5), PartSwapBehavior::Swap);
        // Dust cannot displace stone.
        sim.create_part(6, 5, 5, PT_STNE).unwrap();
        assert_eq!(sim.eval_move(dust, 6, 5, 5), PartSwapBehavior::Noop);
        // Empty cells always swap.
        assert_eq!(sim.eval_move(dust, 4, 5, 5), PartSwapBehavior::Swap);
    }

    #[test]
    fn try_move_same_voxel_only_updates_subvoxel_position() {
        let mut sim = Simulation::new(SimDims::new(12, 12, 12));
        let id = sim.create_part(5, 5, 5, PT_STNE).unwrap();
        sim.try_move(id, 5.3, 4.8, 5.1, PartSwapBehavior::NotEvaledYet);
        let part = sim.part(id).unwrap();
        assert_eq!((part.rx, part.ry, part.rz), (5, 5, 5));
        assert!((part.x - 5.3).abs() < 1e-6);
        assert_eq!(crate::defs::pmap_id(sim.pmap_at(5, 5, 5)), id);
    }

    #[test]
    fn try_move_swap_exchanges_positions_and_map_entries() {
        let mut sim = Simulation::new(SimDims::new(12, 12, 12));
        let dust = sim.create_part(5, 6, 5, PT_DUST).unwrap();
        let watr = sim.create_part(5, 5, 5, PT_WATR).unwrap();

        sim.try_move(dust, 5.0, 5.0, 5.0, PartSwapBehavior::NotEvaledYet);

        assert_eq!(crate::defs::pmap_id(sim.pmap_at(5, 5, 5)), dust);
        assert_eq!(crate::defs::pmap_id(sim.pmap_at(5, 6, 5)), watr);
        assert_eq!(sim.part(dust).unwrap().ry, 5);
        assert_eq!(sim.part(watr).unwrap().ry, 6);
    }

    #[test]
    fn try_move_out_of_bounds_is_dropped() {
        let mut sim = Simulation::new(SimDims::new(12, 12, 12));
        let id = sim.create_part(5, 5, 5, PT_DUST).unwrap();
        sim.try_move(id, 0.2, 5.0, 5.0, PartSwapBehavior::NotEvaledYet);
        let part = sim.part(id).unwrap();
        assert_eq!((part.rx, part.ry, part.rz), (5, 5, 5));
    }

    #[test]
    fn raycast_movement_bounces_off_the_floor_border() {
        let mut sim = Simulation::new(SimDims::new(12, 12, 12));
        let id = sim.create_part(5, 1, 5, PT_DUST).unwrap();
        sim.set_velocity(id, 0.0, -3.0, 0.0);
        sim.raycast_movement(id, 5, 1, 5);
        let part = sim.part(id).unwrap();
        assert_eq!((part.rx, part.ry, part.rz), (5, 1, 5));
        // Dust restitution is -0.1, so the bounce leaves a small upward vy.
        assert!(part.vy > 0.0);
        assert!(hypot3(part.vx, part.vy, part.vz) < 1.0);
    }
}
