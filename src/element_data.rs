//! The builtin element set and its hooks.
//!
//! Type ids are stable and exported to the embedder; the table itself is
//! assembled by `ElementTable::builtin`. Bundle-loaded elements reuse the
//! hooks registered here via `hooks_for`.

use crate::defs::{ElementType, PartId};
use crate::elements::{
    Element, ElementState, GraphicsFlags, GraphicsFn, UpdateFn, UpdateOutcome,
};
use crate::world::Simulation;

pub const PT_DUST: ElementType = 1;
pub const PT_STNE: ElementType = 2;
pub const PT_WATR: ElementType = 3;
pub const PT_OIL: ElementType = 4;
pub const PT_GAS: ElementType = 5;
pub const PT_PHOT: ElementType = 6;
pub const PT_GOL: ElementType = 7;

pub const ELEMENT_COUNT: usize = 7;

/// Placeholder descriptor for the empty element at type id 0.
pub fn none() -> Element {
    Element {
        identifier: "NONE".into(),
        name: "NONE".into(),
        enabled: false,
        ..Element::default()
    }
}

pub fn builtin_elements() -> Vec<Element> {
    vec![dust(), stne(), watr(), oil(), gas(), phot(), gol()]
}

/// Hooks for a known element identifier, used when a content bundle
/// replaces the builtin table.
pub fn hooks_for(identifier: &str) -> (Option<UpdateFn>, Option<GraphicsFn>) {
    match identifier {
        "GOL" => (Some(gol_update), Some(gol_graphics)),
        _ => (None, None),
    }
}

fn dust() -> Element {
    Element {
        identifier: "DUST".into(),
        name: "DUST".into(),
        description: "Fine powder, piles up and slides off ledges.".into(),
        state: ElementState::Powder,
        causality: 2,
        advection: 0.4,
        air_drag: 0.01,
        air_loss: 0.96,
        loss: 0.95,
        collision: -0.1,
        gravity: 0.1,
        diffusion: 0.8,
        hardness: 30,
        weight: 85,
        heat_conduct: 70,
        color: 0xFF70C0E0,
        menu_visible: true,
        ..Element::default()
    }
}

fn stne() -> Element {
    Element {
        identifier: "STNE".into(),
        name: "STNE".into(),
        description: "Inert solid wall.".into(),
        state: ElementState::Solid,
        hardness: 1,
        weight: 100,
        heat_conduct: 150,
        color: 0xFF909090,
        menu_visible: true,
        ..Element::default()
    }
}

fn watr() -> Element {
    Element {
        identifier: "WATR".into(),
        name: "WATR".into(),
        description: "Liquid, spreads along surfaces.".into(),
        state: ElementState::Liquid,
        causality: 2,
        advection: 0.6,
        air_drag: 0.02,
        air_loss: 0.94,
        loss: 0.98,
        collision: -0.05,
        gravity: 0.1,
        diffusion: 1.5,
        weight: 30,
        heat_conduct: 29,
        color: 0xFFD06020,
        menu_visible: true,
        ..Element::default()
    }
}

fn oil() -> Element {
    Element {
        identifier: "OIL".into(),
        name: "OIL".into(),
        description: "Light liquid, floats on water.".into(),
        state: ElementState::Liquid,
        causality: 2,
        advection: 0.6,
        air_drag: 0.02,
        air_loss: 0.94,
        loss: 0.98,
        collision: -0.05,
        gravity: 0.1,
        diffusion: 1.2,
        weight: 20,
        heat_conduct: 42,
        color: 0xFF203040,
        menu_visible: true,
        ..Element::default()
    }
}

fn gas() -> Element {
    Element {
        identifier: "GAS".into(),
        name: "GAS".into(),
        description: "Diffuses freely in all directions.".into(),
        state: ElementState::Gas,
        causality: 2,
        advection: 1.0,
        air_drag: 0.01,
        air_loss: 0.99,
        loss: 0.99,
        diffusion: 1.0,
        hot_air: 0.001,
        weight: 5,
        heat_conduct: 42,
        color: 0xFF30D0D0,
        menu_visible: true,
        ..Element::default()
    }
}

fn phot() -> Element {
    Element {
        identifier: "PHOT".into(),
        name: "PHOT".into(),
        description: "Massless energy particle, reflects off surfaces.".into(),
        state: ElementState::Energy,
        loss: 1.0,
        collision: -1.0,
        weight: -1,
        color: 0xFFFFFFFF,
        graphics_flags: GraphicsFlags::GLOW.union(GraphicsFlags::NO_LIGHTING),
        menu_visible: true,
        ..Element::default()
    }
}

fn gol() -> Element {
    Element {
        identifier: "GOL".into(),
        name: "GOL".into(),
        description: "Cellular automaton block.".into(),
        state: ElementState::Solid,
        weight: 100,
        color: 0xFFAA0000,
        menu_visible: true,
        update: Some(gol_update),
        graphics: Some(gol_graphics),
        ..Element::default()
    }
}

/// Two-phase automaton: even frames collect the 1-ring neighbor count into
/// `life`, odd frames are the compute phase reading it. Only touches the
/// moore neighborhood, so causality 1 holds.
fn gol_update(sim: &mut Simulation, i: PartId, x: i32, y: i32, z: i32) -> UpdateOutcome {
    if sim.frame_count() % 2 == 0 {
        let mut neighbors = 0;
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    if sim.matter_type_at(x + dx, y + dy, z + dz) == PT_GOL {
                        neighbors += 1;
                    }
                }
            }
        }
        if let Some(part) = sim.part_mut(i) {
            part.life = neighbors;
        }
    }
    UpdateOutcome::Continue
}

fn gol_graphics(sim: &Simulation, _i: PartId, color: &mut u32, flags: &mut GraphicsFlags) {
    flags.insert(GraphicsFlags::GLOW);
    *color = 0xFF0000FF | ((sim.frame_count() % 256) << 8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ids_line_up_with_table_order() {
        let elements = builtin_elements();
        assert_eq!(elements.len(), ELEMENT_COUNT);
        assert_eq!(elements[(PT_DUST - 1) as usize].identifier, "DUST");
        assert_eq!(elements[(PT_PHOT - 1) as usize].identifier, "PHOT");
        assert_eq!(elements[(PT_GOL - 1) as usize].identifier, "GOL");
    }

    #[test]
    fn phot_is_energy_with_full_reflection() {
        let p = phot();
        assert_eq!(p.state, ElementState::Energy);
        assert_eq!(p.collision, -1.0);
        assert!(p.graphics_flags.contains(GraphicsFlags::GLOW));
    }
}
