use super::*;
use crate::element_data::{PT_DUST, PT_GOL, PT_PHOT, PT_STNE};
use crate::elements::Element;

fn small() -> Simulation {
    Simulation::new(SimDims::new(12, 12, 12))
}

#[test]
fn create_part_writes_the_map_and_counts() {
    let mut sim = small();
    let id = sim.create_part(5, 5, 5, PT_DUST).unwrap();
    assert!(id >= 1);
    assert_eq!(sim.parts_count(), 1);
    assert_eq!(sim.max_id(), id + 1);

    let word = sim.pmap_at(5, 5, 5);
    assert_eq!(pmap_id(word), id);
    assert_eq!(crate::defs::pmap_typ(word), PT_DUST);

    let part = sim.part(id).unwrap();
    assert_eq!((part.rx, part.ry, part.rz), (5, 5, 5));
    assert!(!part.is_energy());
}

#[test]
fn create_part_refuses_occupied_cells_and_bad_types() {
    let mut sim = small();
    sim.create_part(5, 5, 5, PT_DUST).unwrap();
    assert_eq!(
        sim.create_part(5, 5, 5, PT_STNE),
        Err(CreateError::AlreadyOccupied)
    );
    assert_eq!(
        sim.create_part(5, 6, 5, PT_NONE),
        Err(CreateError::AlreadyOccupied)
    );
    assert_eq!(
        sim.create_part(5, 6, 5, 999),
        Err(CreateError::AlreadyOccupied)
    );
}

#[test]
fn matter_and_energy_share_a_cell() {
    let mut sim = small();
    let matter = sim.create_part(5, 5, 5, PT_DUST).unwrap();
    let energy = sim.create_part(5, 5, 5, PT_PHOT).unwrap();

    assert_eq!(pmap_id(sim.pmap_at(5, 5, 5)), matter);
    assert_eq!(pmap_id(sim.photons_at(5, 5, 5)), energy);
    assert!(sim.part(energy).unwrap().is_energy());

    // A second matter particle is still refused.
    assert_eq!(
        sim.create_part(5, 5, 5, PT_STNE),
        Err(CreateError::AlreadyOccupied)
    );
}

#[test]
fn kill_part_recycles_the_slot_through_the_free_list() {
    let mut sim = small();
    let a = sim.create_part(3, 3, 3, PT_STNE).unwrap();
    let b = sim.create_part(4, 3, 3, PT_STNE).unwrap();
    let c = sim.create_part(5, 3, 3, PT_STNE).unwrap();
    assert_eq!((a, b, c), (1, 2, 3));

    sim.kill_part(b);
    assert_eq!(sim.parts_count(), 2);
    assert_eq!(sim.pfree(), b);
    assert_eq!(sim.pmap_at(4, 3, 3), 0);
    // The dead slot links to the previous free-list head.
    assert_eq!(sim.parts()[b as usize].id, -4);

    let d = sim.create_part(6, 3, 3, PT_STNE).unwrap();
    assert_eq!(d, b);
    assert_eq!(sim.pfree(), 4);

    // Killing twice is a no-op.
    sim.kill_part(b);
    sim.kill_part(b);
    assert_eq!(sim.parts_count(), 2);
}

#[test]
fn kill_at_the_tip_retracts_max_id() {
    let mut sim = small();
    sim.create_part(3, 3, 3, PT_STNE).unwrap();
    let tip = sim.create_part(4, 3, 3, PT_STNE).unwrap();
    assert_eq!(sim.max_id(), tip + 1);
    sim.kill_part(tip);
    assert_eq!(sim.max_id(), tip);
}

#[test]
fn paused_update_is_a_noop() {
    let mut sim = small();
    sim.create_part(5, 5, 5, PT_DUST).unwrap();
    sim.paused = true;
    sim.update();
    assert_eq!(sim.frame_count(), 0);
    assert_eq!(sim.part(1).unwrap().ry, 5);
}

#[test]
fn parity_flags_settle_to_the_completed_frame() {
    let mut sim = small();
    let id = sim.create_part(5, 5, 5, PT_DUST).unwrap();
    sim.update();
    // The tick that just ran had parity frame_count - 1.
    let completed_parity = ((sim.frame_count() - 1) & 1) != 0;
    let part = sim.part(id).unwrap();
    assert_eq!(part.parity(PartFlags::UPDATE_FRAME), completed_parity);
    assert_eq!(part.parity(PartFlags::MOVE_FRAME), completed_parity);

    sim.update();
    let completed_parity = ((sim.frame_count() - 1) & 1) != 0;
    let part = sim.part(id).unwrap();
    assert_eq!(part.parity(PartFlags::UPDATE_FRAME), completed_parity);
}

#[test]
fn gol_hook_counts_its_neighbors() {
    let mut sim = small();
    let center = sim.create_part(5, 5, 5, PT_GOL).unwrap();
    sim.create_part(4, 5, 5, PT_GOL).unwrap();
    sim.create_part(6, 5, 5, PT_GOL).unwrap();
    sim.create_part(5, 5, 6, PT_GOL).unwrap();

    // Frame 0 is the collect phase.
    sim.update();
    assert_eq!(sim.part(center).unwrap().life, 3);
}

#[test]
fn set_thread_count_is_clamped_by_grid_depth() {
    let mut sim = small();
    sim.set_thread_count(64);
    assert_eq!(sim.thread_count(), 1); // 12 voxels of depth sustain one worker

    let mut deep = Simulation::new(SimDims::new(12, 12, 128));
    deep.set_thread_count(64);
    assert_eq!(deep.thread_count(), 8);
    deep.set_thread_count(0);
    assert_eq!(deep.thread_count(), 1);
}

#[test]
fn high_vz_particles_are_deferred_but_still_move_once() {
    // A solid that keeps its velocity: motion comes only from the raycast.
    let mover = Element {
        identifier: "BLLT".into(),
        state: crate::elements::ElementState::Solid,
        loss: 1.0,
        weight: 100,
        ..Element::default()
    };
    let table = ElementTable::from_elements(vec![mover]);
    let mut sim = Simulation::with_elements(SimDims::new(16, 16, 64), Arc::new(table));
    sim.set_thread_count(4); // causality range = 64 / (4*4) = 4

    let id = sim.create_part(8, 8, 20, 1).unwrap();
    sim.set_velocity(id, 0.0, 0.0, 10.0);
    assert!(sim.part(id).unwrap().vz > sim.max_ok_causality_range());

    sim.update();
    // Deferred in the slab scan, flushed exactly once by reconciliation.
    assert_eq!(sim.part(id).unwrap().rz, 30);

    sim.update();
    assert_eq!(sim.part(id).unwrap().rz, 40);
}

#[test]
fn clear_resets_the_store_but_keeps_elements() {
    let mut sim = small();
    sim.create_part(5, 5, 5, PT_DUST).unwrap();
    sim.update();
    sim.clear();
    assert_eq!(sim.parts_count(), 0);
    assert_eq!(sim.frame_count(), 0);
    assert_eq!(sim.pmap_at(5, 5, 5), 0);
    assert_eq!(sim.pmap_at(5, 4, 5), 0);
    // The table is untouched, so creation still works.
    assert!(sim.create_part(5, 5, 5, PT_DUST).is_ok());
}

#[test]
fn install_content_bundle_swaps_the_table_and_clears() {
    let mut sim = small();
    sim.create_part(5, 5, 5, PT_DUST).unwrap();
    sim.install_content_bundle(r#"[{"identifier": "ROCK", "state": "solid", "weight": 50}]"#)
        .unwrap();
    assert_eq!(sim.parts_count(), 0);
    assert_eq!(sim.elements().len(), 2);
    assert!(sim.create_part(5, 5, 5, 1).is_ok());
    assert!(sim.install_content_bundle("not json").is_err());
}
