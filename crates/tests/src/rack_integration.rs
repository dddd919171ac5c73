//! Integration tests for the effect rack
//!
//! These tests drive the rack the way a controller mapping or the console
//! does: through commands, published controls and slot events, and check what
//! an audio-thread reader would observe.

use fxrack_core::domain::{
    Command, CommandExecutor, CommandResult, DocumentFormat, EffectCatalog, EffectDocument,
    EffectRack, EffectSlotEvent, EffectSlotState, LinkType, RackConfig, RackDocument, StateStore,
    MAX_PARAMETER_SLOTS,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const ECHO: &str = "org.fxrack.effects.echo";
const FILTER: &str = "org.fxrack.effects.filter";
const FLANGER: &str = "org.fxrack.effects.flanger";
const REVERB: &str = "org.fxrack.effects.reverb";

const SLOT: &str = "[EffectRack1_EffectUnit1_Effect1]";

fn create_rack() -> EffectRack {
    EffectRack::new(
        RackConfig {
            chains: 2,
            slots_per_chain: 3,
            ..RackConfig::default()
        },
        EffectCatalog::builtin(),
    )
}

fn load(rack: &mut EffectRack, chain: usize, slot: usize, effect_id: &str) {
    let result = rack.execute(Command::LoadEffect {
        chain,
        slot,
        effect_id: effect_id.to_string(),
    });
    assert!(matches!(result, CommandResult::EffectLoaded { .. }), "{result:?}");
}

fn knob(rack: &EffectRack, chain: usize, slot: usize, index: usize) -> f64 {
    rack.slot(chain, slot)
        .unwrap()
        .engine_slot()
        .knob_value(index)
        .unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

// ============================================================================
// LOADING AND CLEARING
// ============================================================================

#[test]
fn test_every_builtin_effect_binds_in_order() {
    let mut rack = create_rack();
    let manifests: Vec<_> = rack.catalog().manifests().cloned().collect();

    for manifest in manifests {
        load(&mut rack, 0, 0, &manifest.id);
        let slot = rack.slot(0, 0).unwrap();
        let knobs = manifest.knob_parameters.len();
        let buttons = manifest.button_parameters.len();

        assert!(slot.num_parameter_slots() >= knobs);
        assert!(slot.num_button_parameter_slots() >= buttons);
        for (index, parameter) in slot.parameter_slots().enumerate() {
            assert_eq!(parameter.is_loaded(), index < knobs, "{} knob {index}", manifest.id);
        }
        for (index, parameter) in slot.button_parameter_slots().enumerate() {
            assert_eq!(parameter.is_loaded(), index < buttons);
        }
        assert_eq!(
            rack.registry().value(SLOT, "num_parameters"),
            Some(knobs as f64)
        );
    }
}

#[test]
fn test_clear_twice_matches_clear_once() {
    let mut rack = create_rack();
    load(&mut rack, 0, 0, ECHO);
    rack.execute(Command::SetMetaParameter {
        chain: 0,
        slot: 0,
        value: 0.3,
    });

    rack.execute(Command::ClearEffect { chain: 0, slot: 0 });
    let once = rack.to_document();
    rack.execute(Command::ClearEffect { chain: 0, slot: 0 });
    assert_eq!(rack.to_document(), once);

    let slot = rack.slot(0, 0).unwrap();
    assert_eq!(slot.state(), EffectSlotState::Empty);
    assert!(slot.parameter_slots().all(|parameter| !parameter.is_loaded()));
    assert_eq!(slot.meta_parameter(), 0.3);
    assert_eq!(rack.registry().value(SLOT, "loaded"), Some(0.0));
}

#[test]
fn test_slot_pool_is_capped() {
    let mut rack = create_rack();
    let slot = rack.slot_mut(0, 0).unwrap();
    assert_eq!(slot.num_parameter_slots(), MAX_PARAMETER_SLOTS);
    assert!(slot.add_effect_parameter_slot().is_none());
    assert!(slot.parameter_slot(MAX_PARAMETER_SLOTS).is_none());
}

// ============================================================================
// META PARAMETER AND SOFT TAKEOVER
// ============================================================================

#[test]
fn test_meta_jump_is_held_back_on_enabled_slot() {
    let mut rack = create_rack();
    load(&mut rack, 0, 0, ECHO);
    rack.execute(Command::SetEnabled {
        chain: 0,
        slot: 0,
        enabled: true,
    });

    // Loading applied meta 0, feedback (linked) sits at 0
    assert_eq!(knob(&rack, 0, 0, 1), 0.0);

    rack.execute(Command::SetMetaParameter {
        chain: 0,
        slot: 0,
        value: 0.5,
    });
    assert_eq!(knob(&rack, 0, 0, 1), 0.0);

    rack.execute(Command::SetMetaParameter {
        chain: 0,
        slot: 0,
        value: 0.51,
    });
    assert!(approx(knob(&rack, 0, 0, 1), 0.51));

    // Unlinked parameters never follow
    assert_eq!(knob(&rack, 0, 0, 0), 0.25);
}

#[test]
fn test_disabled_slot_always_follows_meta() {
    let mut rack = create_rack();
    load(&mut rack, 0, 0, ECHO);

    rack.execute(Command::SetMetaParameter {
        chain: 0,
        slot: 0,
        value: 0.9,
    });
    assert!(approx(knob(&rack, 0, 0, 1), 0.9));
    assert!(approx(knob(&rack, 0, 0, 2), 0.9));
}

#[test]
fn test_meta_out_of_range_is_clamped_and_published() {
    let mut rack = create_rack();
    rack.slot_mut(0, 0).unwrap().set_meta_parameter(1.5, false);

    assert_eq!(rack.slot(0, 0).unwrap().meta_parameter(), 1.0);
    assert_eq!(rack.registry().value(SLOT, "meta"), Some(1.0));
}

#[test]
fn test_meta_set_while_empty_applies_on_load() {
    let mut rack = create_rack();
    rack.slot_mut(0, 0).unwrap().set_meta_parameter(0.7, false);
    assert_eq!(rack.slot(0, 0).unwrap().meta_parameter(), 0.7);

    load(&mut rack, 0, 0, ECHO);
    assert!(approx(knob(&rack, 0, 0, 1), 0.7));
}

#[test]
fn test_superknob_reaches_every_slot() {
    let mut rack = create_rack();
    load(&mut rack, 1, 0, ECHO);
    load(&mut rack, 1, 2, REVERB);

    let result = rack.execute(Command::SetSuperParameter {
        chain: 1,
        value: 0.4,
    });
    assert_eq!(
        result,
        CommandResult::SuperParameterChanged {
            chain: 1,
            value: 0.4
        }
    );
    assert!(approx(knob(&rack, 1, 0, 1), 0.4));
    assert!(approx(knob(&rack, 1, 2, 0), 0.4));
    assert_eq!(rack.slot(1, 1).unwrap().meta_parameter(), 0.4);
    assert_eq!(rack.slot(0, 0).unwrap().meta_parameter(), 0.0);
}

#[test]
fn test_split_links_on_filter() {
    let mut rack = create_rack();
    load(&mut rack, 0, 0, FILTER);

    // Low pass is linked left and inverted, high pass linked right
    let set_meta = |rack: &mut EffectRack, value: f64| {
        rack.slot_mut(0, 0).unwrap().set_meta_parameter(value, true);
    };

    set_meta(&mut rack, 0.5);
    assert!(approx(knob(&rack, 0, 0, 0), 22050.0));
    assert!(approx(knob(&rack, 0, 0, 2), 16.0));

    set_meta(&mut rack, 1.0);
    assert!(approx(knob(&rack, 0, 0, 0), 22050.0));
    assert!(approx(knob(&rack, 0, 0, 2), 22050.0));

    set_meta(&mut rack, 0.0);
    assert!(approx(knob(&rack, 0, 0, 0), 16.0));
    assert!(approx(knob(&rack, 0, 0, 2), 16.0));

    // Resonance is not linked
    assert!(approx(knob(&rack, 0, 0, 1), 0.707));
}

#[test]
fn test_relinking_changes_what_meta_drives() {
    let mut rack = create_rack();
    load(&mut rack, 0, 0, ECHO);

    rack.execute(Command::SetLink {
        chain: 0,
        slot: 0,
        index: 0,
        link_type: LinkType::LinkedLeftRight,
        inversed: false,
    });
    rack.execute(Command::SetLink {
        chain: 0,
        slot: 0,
        index: 1,
        link_type: LinkType::None,
        inversed: false,
    });
    rack.slot_mut(0, 0).unwrap().set_meta_parameter(0.25, true);

    // Left half of LinkedLeftRight: 1 - 2 * 0.25 = 0.5 of a 0..2 range
    assert!(approx(knob(&rack, 0, 0, 0), 1.0));
    assert_eq!(knob(&rack, 0, 0, 1), 0.0);
}

// ============================================================================
// CONTROLS, EVENTS AND NAVIGATION
// ============================================================================

#[test]
fn test_controls_drive_navigation() {
    let mut rack = create_rack();

    rack.slot_mut(0, 1).unwrap().on_next_effect_control(1.0);
    let events = rack.pump();
    let slot = rack.slot(0, 1).unwrap();
    assert_eq!(slot.effect().unwrap().id(), FILTER);
    assert!(matches!(events.last(), Some(EffectSlotEvent::Updated { .. })));

    rack.slot_mut(0, 1).unwrap().on_effect_selector_control(2.0);
    rack.pump();
    assert_eq!(rack.slot(0, 1).unwrap().effect().unwrap().id(), ECHO);

    rack.slot_mut(0, 1).unwrap().on_effect_selector_control(2.0);
    rack.pump();
    assert_eq!(rack.slot(0, 1).unwrap().effect().unwrap().id(), FLANGER);

    rack.slot_mut(0, 1).unwrap().on_prev_effect_control(1.0);
    rack.slot_mut(0, 1).unwrap().on_prev_effect_control(0.0);
    rack.pump();
    assert_eq!(rack.slot(0, 1).unwrap().effect().unwrap().id(), ECHO);

    rack.slot_mut(0, 1).unwrap().on_clear_control(1.0);
    let events = rack.pump();
    assert!(rack.slot(0, 1).unwrap().effect().is_none());
    assert!(matches!(
        events.first(),
        Some(EffectSlotEvent::EffectLoaded { effect: None, .. })
    ));
}

#[test]
fn test_navigation_wraps_both_ways() {
    let mut rack = create_rack();
    load(&mut rack, 0, 0, REVERB);
    rack.execute(Command::NextEffect { chain: 0, slot: 0 });
    assert_eq!(rack.slot(0, 0).unwrap().effect().unwrap().id(), FILTER);
    rack.execute(Command::PrevEffect { chain: 0, slot: 0 });
    assert_eq!(rack.slot(0, 0).unwrap().effect().unwrap().id(), REVERB);
}

#[test]
fn test_every_mutation_ends_with_updated() {
    let mut rack = create_rack();
    let commands = [
        Command::LoadEffect {
            chain: 0,
            slot: 2,
            effect_id: ECHO.to_string(),
        },
        Command::NextEffect { chain: 0, slot: 2 },
        Command::ClearEffect { chain: 0, slot: 2 },
        Command::ClearEffect { chain: 0, slot: 2 },
    ];

    for command in commands {
        rack.execute(command);
        let events = rack.pump();
        assert!(!events.is_empty());
        assert!(matches!(
            events.last(),
            Some(EffectSlotEvent::Updated {
                chain_number: 0,
                slot_index: 2
            })
        ));
    }
}

#[test]
fn test_enabled_survives_effect_swap() {
    let mut rack = create_rack();
    rack.execute(Command::SetEnabled {
        chain: 0,
        slot: 0,
        enabled: true,
    });
    load(&mut rack, 0, 0, ECHO);
    assert!(rack.slot(0, 0).unwrap().engine_slot().is_active());

    rack.execute(Command::NextEffect { chain: 0, slot: 0 });
    let effect = rack.slot(0, 0).unwrap().effect().unwrap();
    assert!(effect.is_enabled());

    // Disabling from the effect side shows up on the control after a pump
    effect.set_enabled(false);
    rack.pump();
    assert_eq!(rack.registry().value(SLOT, "enabled"), Some(0.0));
}

#[test]
fn test_audio_reader_sees_consistent_effects() {
    let mut rack = create_rack();
    let engine = rack.slot(0, 0).unwrap().engine_slot();
    let stop = Arc::new(AtomicBool::new(false));

    let reader = {
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            let mut reads = 0usize;
            while !stop.load(Ordering::Relaxed) {
                if let Some(effect) = engine.effect() {
                    // Every parameter of a published effect is readable
                    for index in 0..effect.num_knob_parameters() {
                        assert!(effect.knob_parameter(index).is_some());
                    }
                }
                reads += 1;
            }
            reads
        })
    };

    for _ in 0..200 {
        rack.execute(Command::NextEffect { chain: 0, slot: 0 });
        rack.execute(Command::SetMetaParameter {
            chain: 0,
            slot: 0,
            value: 0.5,
        });
        rack.pump();
    }
    rack.execute(Command::ClearEffect { chain: 0, slot: 0 });
    stop.store(true, Ordering::Relaxed);

    assert!(reader.join().unwrap() > 0);
    assert!(rack.slot(0, 0).unwrap().engine_slot().effect().is_none());
}

// ============================================================================
// PERSISTENCE
// ============================================================================

fn configured_rack() -> EffectRack {
    let mut rack = create_rack();
    load(&mut rack, 0, 0, ECHO);
    rack.execute(Command::SetEnabled {
        chain: 0,
        slot: 0,
        enabled: true,
    });
    rack.execute(Command::SetParameter {
        chain: 0,
        slot: 0,
        index: 0,
        value: 0.75,
    });
    rack.execute(Command::SetButtonParameter {
        chain: 0,
        slot: 0,
        index: 1,
        value: 1.0,
    });
    load(&mut rack, 1, 2, FILTER);
    rack.execute(Command::SetSuperParameter {
        chain: 1,
        value: 0.2,
    });
    rack.pump();
    rack
}

#[test]
fn test_effect_document_restores_same_identity_only() {
    let mut rack = configured_rack();
    let document = rack.slot(0, 0).unwrap().to_document().unwrap();
    let text = DocumentFormat::Toml.render(&document).unwrap();
    let parsed: EffectDocument = DocumentFormat::Toml.parse(&text).unwrap();

    load(&mut rack, 0, 1, ECHO);
    rack.slot_mut(0, 1).unwrap().load_from_document(&parsed);
    assert_eq!(knob(&rack, 0, 1, 0), 0.75);
    assert_eq!(
        rack.slot(0, 1).unwrap().engine_slot().button_value(1),
        Some(1.0)
    );

    load(&mut rack, 0, 2, REVERB);
    rack.slot_mut(0, 2).unwrap().load_from_document(&parsed);
    assert_eq!(knob(&rack, 0, 2, 0), 0.0);
}

#[test]
fn test_rack_document_as_json() {
    let rack = configured_rack();
    let text = DocumentFormat::Json.render(&rack.to_document()).unwrap();
    assert!(text.contains("\"Chains\""));
    assert!(text.contains("\"SuperParameter\": 0.2"));

    let parsed: RackDocument = DocumentFormat::Json.parse(&text).unwrap();
    let slot = &parsed.chains[0].slots[0];
    assert!(slot.enabled);
    let effect = slot.effect.as_ref().unwrap();
    assert_eq!(effect.id, ECHO);
    assert_eq!(effect.parameters.knob_parameters[0].value, Some(0.75));
    assert!(parsed.chains[1].slots[0].effect.is_none());
}

#[tokio::test]
async fn test_rack_state_file_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let store = StateStore::new(temp_dir.path().join("rack.toml"));

    let rack = configured_rack();
    store.save(&rack.to_document()).await.unwrap();

    let mut restored = create_rack();
    let document = store.load().await.unwrap();
    assert_eq!(restored.restore(&document), 6);
    restored.pump();

    assert_eq!(restored.to_document(), rack.to_document());
    assert_eq!(knob(&restored, 0, 0, 0), 0.75);
    assert!(restored.slot(0, 0).unwrap().is_enabled());
    assert_eq!(restored.chain(1).unwrap().super_parameter(), 0.2);
}

#[tokio::test]
async fn test_malformed_state_file_restores_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("rack.toml");
    tokio::fs::write(&path, "Chains = \"not a list\"\n").await.unwrap();

    let store = StateStore::new(path);
    assert!(store.load().await.is_none());
}

#[test]
fn test_restore_into_smaller_rack() {
    let document = configured_rack().to_document();
    let mut small = EffectRack::new(
        RackConfig {
            chains: 1,
            slots_per_chain: 1,
            ..RackConfig::default()
        },
        EffectCatalog::builtin(),
    );

    assert_eq!(small.restore(&document), 1);
    assert_eq!(small.slot(0, 0).unwrap().effect().unwrap().id(), ECHO);
}
