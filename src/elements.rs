//! Element descriptors, the element table and the swap matrix.
//!
//! Descriptors are flat, immutable data hit on every particle visit; the
//! optional per-element hooks are plain function pointers so dispatch stays
//! a branch on `Option`. A content bundle (JSON array of descriptors) can
//! replace the builtin set at startup; hooks are re-attached by element
//! identifier since function pointers do not serialize.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defs::{ElementType, PartId, PartSwapBehavior, PT_NONE};
use crate::element_data;
use crate::world::Simulation;

/// Hard cap from the packed map word: type ids must fit in 10 bits.
pub const MAX_ELEMENT_TYPES: usize = 1 << 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementState {
    #[default]
    Solid,
    Powder,
    Liquid,
    Gas,
    Energy,
}

bitflags! {
    // Serialize/Deserialize come from the bitflags serde feature.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct GraphicsFlags: u8 {
        const GLOW = 1 << 0;
        const NO_LIGHTING = 1 << 1;
        const REFRACT = 1 << 2;
    }
}

/// Result of an element update hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Run the rest of the per-particle pipeline as usual.
    Continue,
    /// The hook dealt with motion itself; skip the rest of the pipeline
    /// for this tick.
    Handled,
}

pub type UpdateFn = fn(&mut Simulation, PartId, i32, i32, i32) -> UpdateOutcome;
pub type GraphicsFn = fn(&Simulation, PartId, &mut u32, &mut GraphicsFlags);

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Element {
    /// Stable short id, like DUST. Keys hook re-attachment for bundles.
    pub identifier: String,
    pub name: String,
    pub description: String,

    pub state: ElementState,
    /// Disabled elements cannot be created.
    pub enabled: bool,

    /// Maximum distance in voxels this element's per-tick behavior may
    /// read or write. The scheduler defers anything that could reach past
    /// its slab.
    pub causality: u32,

    /// How strongly moving air accelerates the particle, generally -1..1.
    pub advection: f32,
    /// How much air the particle produces in its direction of travel.
    pub air_drag: f32,
    /// How much the particle slows moving air, 1 = none, 0 = stops it.
    pub air_loss: f32,
    /// Velocity multiplier per frame.
    pub loss: f32,
    /// Velocity multiplier on collision; negative values bounce.
    pub collision: f32,
    pub gravity: f32,
    pub newtonian_gravity: f32,
    /// Random wiggle amplitude for the state-of-matter defaults.
    pub diffusion: f32,
    /// Pressure the particle adds per tick.
    pub hot_air: f32,

    /// Susceptibility to corrosion, 0 = immune.
    pub hardness: i32,
    /// Drives the default swap order: heavier movers displace lighter
    /// occupants.
    pub weight: i32,
    pub heat_conduct: u8,
    pub latent_heat: u32,

    pub low_pressure: f32,
    pub low_pressure_transition: i32,
    pub high_pressure: f32,
    pub high_pressure_transition: i32,
    pub low_temperature: f32,
    pub low_temperature_transition: i32,
    pub high_temperature: f32,
    pub high_temperature_transition: i32,

    /// Base ABGR color; graphics hooks may override per particle.
    pub color: u32,
    pub graphics_flags: GraphicsFlags,

    pub menu_visible: bool,
    pub menu_section: i32,

    #[serde(skip)]
    pub update: Option<UpdateFn>,
    #[serde(skip)]
    pub graphics: Option<GraphicsFn>,
    /// Swap-matrix cells this element forces, e.g. to SPECIAL for pairs
    /// resolved at motion time.
    #[serde(skip)]
    pub swap_overrides: Vec<(ElementType, PartSwapBehavior)>,
}

impl Default for Element {
    fn default() -> Self {
        Self {
            identifier: String::new(),
            name: String::new(),
            description: String::new(),
            state: ElementState::Solid,
            enabled: true,
            causality: 1,
            advection: 0.0,
            air_drag: 0.0,
            air_loss: 0.0,
            loss: 0.0,
            collision: 0.0,
            gravity: 0.0,
            newtonian_gravity: 0.0,
            diffusion: 0.0,
            hot_air: 0.0,
            hardness: 0,
            weight: 0,
            heat_conduct: 0,
            latent_heat: 0,
            low_pressure: 0.0,
            low_pressure_transition: 0,
            high_pressure: 0.0,
            high_pressure_transition: 0,
            low_temperature: 0.0,
            low_temperature_transition: 0,
            high_temperature: 0.0,
            high_temperature_transition: 0,
            color: 0,
            graphics_flags: GraphicsFlags::empty(),
            menu_visible: false,
            menu_section: 0,
            update: None,
            graphics: None,
            swap_overrides: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("malformed element bundle: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("bundle declares {0} elements, at most {max} fit in the map word", max = MAX_ELEMENT_TYPES - 1)]
    TooManyElements(usize),
}

/// The immutable element table plus the precomputed swap matrix.
pub struct ElementTable {
    elements: Vec<Element>,
    /// `can_move[mover * n + dest]`, n = elements.len().
    can_move: Vec<PartSwapBehavior>,
}

impl ElementTable {
    /// Compiled-in element set.
    pub fn builtin() -> Self {
        Self::from_elements(element_data::builtin_elements())
    }

    /// Build a table from descriptors for types 1.. (the empty element is
    /// prepended automatically).
    pub fn from_elements(elements: Vec<Element>) -> Self {
        assert!(
            elements.len() < MAX_ELEMENT_TYPES,
            "too many element types for the packed map word"
        );
        let mut all = Vec::with_capacity(elements.len() + 1);
        all.push(element_data::none());
        all.extend(elements);
        let mut table = Self {
            can_move: vec![PartSwapBehavior::Noop; all.len() * all.len()],
            elements: all,
        };
        table.init_can_move();
        table
    }

    /// Parse a content bundle and re-attach hooks by identifier.
    pub fn from_bundle_json(json: &str) -> Result<Self, BundleError> {
        let mut elements: Vec<Element> = serde_json::from_str(json)?;
        if elements.len() >= MAX_ELEMENT_TYPES {
            return Err(BundleError::TooManyElements(elements.len()));
        }
        for el in &mut elements {
            let (update, graphics) = element_data::hooks_for(&el.identifier);
            el.update = update;
            el.graphics = graphics;
        }
        log::debug!("installed content bundle with {} elements", elements.len());
        Ok(Self::from_elements(elements))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false // the empty element is always present
    }

    #[inline]
    pub fn is_valid_type(&self, t: ElementType) -> bool {
        (t as usize) < self.elements.len()
    }

    #[inline]
    pub fn element(&self, t: ElementType) -> &Element {
        &self.elements[t as usize]
    }

    #[inline]
    pub fn can_move(&self, mover: ElementType, dest: ElementType) -> PartSwapBehavior {
        self.can_move[mover as usize * self.elements.len() + dest as usize]
    }

    fn set_can_move(&mut self, mover: ElementType, dest: ElementType, behavior: PartSwapBehavior) {
        let n = self.elements.len();
        self.can_move[mover as usize * n + dest as usize] = behavior;
    }

    /// Default swap order: anything exchanges with the empty cell, heavier
    /// movers displace lighter occupants, energy co-occupies with energy.
    /// Element overrides are applied last.
    fn init_can_move(&mut self) {
        let n = self.elements.len() as ElementType;
        for mover in 1..n {
            self.set_can_move(mover, PT_NONE, PartSwapBehavior::Swap);
            self.set_can_move(PT_NONE, mover, PartSwapBehavior::Swap);

            for dest in 1..n {
                if self.elements[mover as usize].weight > self.elements[dest as usize].weight {
                    self.set_can_move(mover, dest, PartSwapBehavior::Swap);
                }
                if self.elements[mover as usize].state == ElementState::Energy
                    && self.elements[dest as usize].state == ElementState::Energy
                {
                    self.set_can_move(mover, dest, PartSwapBehavior::OccupySame);
                }
            }
        }
        for mover in 1..n {
            let overrides = self.elements[mover as usize].swap_overrides.clone();
            for (dest, behavior) in overrides {
                if (dest as usize) < n as usize {
                    self.set_can_move(mover, dest, behavior);
                }
            }
        }
    }
}
