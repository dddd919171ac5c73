//! Example driving an effect rack and saving its state
//!
//! Run with: cargo run --package fxrack-core --example rack_demo

use fxrack_core::domain::{
    Command, CommandExecutor, EffectCatalog, EffectRack, EffectSlotEvent, RackConfig, StateStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("fxrack_core=debug,info")
        .init();

    println!("=== fxrack Rack Demo ===\n");

    let mut rack = EffectRack::new(RackConfig::default(), EffectCatalog::builtin());
    println!(
        "1. Rack with {} chains, {} controls published",
        rack.chains().len(),
        rack.registry().len()
    );

    println!("\n2. Loading effects:");
    for command in [
        Command::LoadEffect {
            chain: 0,
            slot: 0,
            effect_id: "org.fxrack.effects.filter".to_string(),
        },
        Command::NextEffect { chain: 0, slot: 1 },
        Command::SetEnabled {
            chain: 0,
            slot: 1,
            enabled: true,
        },
    ] {
        println!("   {:?}", rack.execute(command));
    }

    println!("\n3. Turning the superknob of unit 1:");
    for value in [0.25, 0.5, 0.75] {
        rack.execute(Command::SetSuperParameter { chain: 0, value });
        let engine = rack.slot(0, 0)?.engine_slot();
        println!(
            "   super={value:.2} low pass={:.1} Hz high pass={:.1} Hz",
            engine.knob_value(0).unwrap_or_default(),
            engine.knob_value(2).unwrap_or_default()
        );
    }

    println!("\n4. Slot events:");
    for event in rack.pump() {
        if let EffectSlotEvent::EffectLoaded { effect: Some(effect), .. } = &event {
            let (chain, slot) = event.slot();
            println!("   unit {} slot {} loaded {}", chain + 1, slot + 1, effect.id());
        }
    }

    println!("\n5. Saving rack state...");
    let dir = tempfile::tempdir()?;
    let store = StateStore::new(dir.path().join("rack.toml"));
    store.save(&rack.to_document()).await?;
    let restored = store.load().await.map(|document| {
        let mut copy = EffectRack::new(RackConfig::default(), EffectCatalog::builtin());
        copy.restore(&document)
    });
    println!("   ✓ Restored {} slots into a fresh rack", restored.unwrap_or(0));

    println!("\n=== Demo Complete ===");
    Ok(())
}
