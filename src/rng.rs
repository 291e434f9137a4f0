//! Per-thread random number generation for particle jitter.
//!
//! Each worker thread owns an independent xorshift32 state seeded from a
//! process-wide counter, so the parallel slab passes never contend on a
//! shared generator. Not cryptographic, and does not need to be.

use std::cell::RefCell;
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::utils::Vec3;

static NEXT_SEED: AtomicU32 = AtomicU32::new(0x9e37_79b9);

pub struct Rng {
    state: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        // xorshift has a single absorbing state at zero.
        Self {
            state: if seed == 0 { 0xbad5_eed5 } else { seed },
        }
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform float in [0, 1).
    #[inline]
    pub fn unit_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform float in [a, b).
    #[inline]
    pub fn uniform(&mut self, a: f32, b: f32) -> f32 {
        a + self.unit_f32() * (b - a)
    }

    /// Uniform unit vector on the sphere (Archimedes: z uniform, angle
    /// uniform).
    pub fn rand_norm_vector(&mut self) -> Vec3 {
        let z = self.uniform(-1.0, 1.0);
        let theta = self.uniform(0.0, TAU);
        let r = (1.0 - z * z).max(0.0).sqrt();
        Vec3::new(r * theta.cos(), r * theta.sin(), z)
    }

    /// Uniform unit vector in the plane normal to `g`. Falls back to a
    /// free unit vector when `g` is degenerate.
    pub fn rand_perpendicular_vector(&mut self, g: Vec3) -> Vec3 {
        let n = g.normalized();
        if n == Vec3::ZERO {
            return self.rand_norm_vector();
        }
        // Build an orthonormal basis of the normal plane from whichever
        // axis is least aligned with g.
        let helper = if n.x.abs() < 0.9 {
            Vec3::new(1.0, 0.0, 0.0)
        } else {
            Vec3::new(0.0, 1.0, 0.0)
        };
        let u = n.cross(&helper).normalized();
        let v = n.cross(&u);
        let theta = self.uniform(0.0, TAU);
        Vec3::new(
            u.x * theta.cos() + v.x * theta.sin(),
            u.y * theta.cos() + v.y * theta.sin(),
            u.z * theta.cos() + v.z * theta.sin(),
        )
    }
}

thread_local! {
    static THREAD_RNG: RefCell<Rng> = RefCell::new(Rng::new(
        NEXT_SEED.fetch_add(0x6d2b_79f5, Ordering::Relaxed),
    ));
}

/// Run `f` with this thread's generator.
#[inline]
pub fn with_thread_rng<R>(f: impl FnOnce(&mut Rng) -> R) -> R {
    THREAD_RNG.with(|rng| f(&mut rng.borrow_mut()))
}
