//! Voxel ray traversal.
//!
//! Amanatides-Woo 3-D DDA over an occupancy predicate supplied by the
//! caller. The traversal is pure: it never touches engine state, it only
//! asks "what happens if something enters this voxel" and stops on the
//! first blocked cell, reporting the last free voxel and the faces hit.

use bitflags::bitflags;

use crate::defs::PartSwapBehavior;
use crate::utils::{argmax3, ceil_proper, IVec3};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct HitFaces: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RaycastInput {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    /// Face computation costs extra occupancy probes; callers that only
    /// need the end voxel skip it.
    pub compute_faces: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RaycastOutput {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub faces: HitFaces,
    pub behavior: PartSwapBehavior,
}

/// Which faces block between `prev` and the colliding voxel `fin`. When
/// exactly one axis changed, that axis' face; otherwise probe the three
/// axis-aligned candidates and report each blocked one.
fn hit_faces<F>(occupied: &F, prev: IVec3, fin: IVec3) -> HitFaces
where
    F: Fn(i32, i32, i32) -> PartSwapBehavior,
{
    let changed =
        (prev.x != fin.x) as u32 + (prev.y != fin.y) as u32 + (prev.z != fin.z) as u32;
    let mut faces = HitFaces::empty();
    if changed == 1 {
        if prev.x != fin.x {
            faces |= HitFaces::X;
        }
        if prev.y != fin.y {
            faces |= HitFaces::Y;
        }
        if prev.z != fin.z {
            faces |= HitFaces::Z;
        }
    } else {
        if occupied(fin.x, prev.y, prev.z) == PartSwapBehavior::Noop {
            faces |= HitFaces::X;
        }
        if occupied(prev.x, fin.y, prev.z) == PartSwapBehavior::Noop {
            faces |= HitFaces::Y;
        }
        if occupied(prev.x, prev.y, fin.z) == PartSwapBehavior::Noop {
            faces |= HitFaces::Z;
        }
    }
    faces
}

/// Cast from `(x, y, z)` along `(vx, vy, vz)`. The last free voxel before
/// a collision is written to `out`. Returns whether the ray terminated by
/// hitting a blocked voxel.
pub fn raycast<F>(input: &RaycastInput, out: &mut RaycastOutput, occupied: F) -> bool
where
    F: Fn(i32, i32, i32) -> PartSwapBehavior,
{
    // Fast path: on a dense grid most particles cannot move at all, so
    // check the neighbor along the dominant velocity axis before setting
    // up a full traversal.
    let largest_axis = argmax3(input.vx, input.vy, input.vz);
    let blocked_axis = match largest_axis {
        0 => {
            let nx = input.x + if input.vx < 0.0 { -1 } else { 1 };
            (occupied(nx, input.y, input.z) == PartSwapBehavior::Noop).then_some(HitFaces::X)
        }
        1 => {
            let ny = input.y + if input.vy < 0.0 { -1 } else { 1 };
            (occupied(input.x, ny, input.z) == PartSwapBehavior::Noop).then_some(HitFaces::Y)
        }
        _ => {
            let nz = input.z + if input.vz < 0.0 { -1 } else { 1 };
            (occupied(input.x, input.y, nz) == PartSwapBehavior::Noop).then_some(HitFaces::Z)
        }
    };
    if let Some(face) = blocked_axis {
        out.x = input.x;
        out.y = input.y;
        out.z = input.z;
        out.faces = face;
        out.behavior = PartSwapBehavior::Noop;
        return true;
    }

    let mut current = IVec3::new(input.x, input.y, input.z);
    let last = IVec3::new(
        input.x + ceil_proper(input.vx),
        input.y + ceil_proper(input.vy),
        input.z + ceil_proper(input.vz),
    );
    let mut previous = current;

    let ray = IVec3::new(last.x - current.x, last.y - current.y, last.z - current.z);

    // Step per axis, +-1.
    let dx: i32 = if ray.x >= 0 { 1 } else { -1 };
    let dy: i32 = if ray.y >= 0 { 1 } else { -1 };
    let dz: i32 = if ray.z >= 0 { 1 } else { -1 };

    // Parametric distance to the first boundary crossing per axis, and the
    // distance between crossings. Axes the ray never travels stay at MAX.
    let mut t_max_x = if ray.x != 0 { dx as f32 / ray.x as f32 } else { f32::MAX };
    let mut t_max_y = if ray.y != 0 { dy as f32 / ray.y as f32 } else { f32::MAX };
    let mut t_max_z = if ray.z != 0 { dz as f32 / ray.z as f32 } else { f32::MAX };
    let t_delta_x = if ray.x != 0 { (1.0 / ray.x as f32) * dx as f32 } else { f32::MAX };
    let t_delta_y = if ray.y != 0 { (1.0 / ray.y as f32) * dy as f32 } else { f32::MAX };
    let t_delta_z = if ray.z != 0 { (1.0 / ray.z as f32) * dz as f32 } else { f32::MAX };

    // Negative components start on the far side of their first boundary:
    // pre-step those axes once and re-check occupancy so every later
    // t_max update lands on a real crossing.
    let mut diff = IVec3::new(0, 0, 0);
    let mut neg_ray = false;
    if ray.x < 0 && current.x != last.x {
        diff.x -= 1;
        neg_ray = true;
    }
    if ray.y < 0 && current.y != last.y {
        diff.y -= 1;
        neg_ray = true;
    }
    if ray.z < 0 && current.z != last.z {
        diff.z -= 1;
        neg_ray = true;
    }
    if neg_ray {
        current.x += diff.x;
        current.y += diff.y;
        current.z += diff.z;
        if occupied(current.x, current.y, current.z) == PartSwapBehavior::Noop {
            out.x = previous.x;
            out.y = previous.y;
            out.z = previous.z;
            out.behavior = PartSwapBehavior::Swap;
            if input.compute_faces {
                out.faces = hit_faces(&occupied, previous, current);
            }
            return true;
        }
    }

    while current != last {
        previous = current;

        if t_max_x < t_max_y {
            if t_max_x < t_max_z {
                current.x += dx;
                t_max_x += t_delta_x;
            } else {
                current.z += dz;
                t_max_z += t_delta_z;
            }
        } else if t_max_y < t_max_z {
            current.y += dy;
            t_max_y += t_delta_y;
        } else {
            current.z += dz;
            t_max_z += t_delta_z;
        }

        if occupied(current.x, current.y, current.z) == PartSwapBehavior::Noop {
            out.x = previous.x;
            out.y = previous.y;
            out.z = previous.z;
            out.behavior = PartSwapBehavior::Swap;
            if input.compute_faces {
                out.faces = hit_faces(&occupied, previous, current);
            }
            return true;
        }
    }

    out.x = current.x;
    out.y = current.y;
    out.z = current.z;
    out.faces = HitFaces::empty();
    out.behavior = PartSwapBehavior::Swap;
    false
}
