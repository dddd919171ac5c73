//! fxrack CLI Application

mod console;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::{ConsoleInput, HELP};
use fxrack_core::domain::{
    Command, CommandExecutor, CommandResult, ConfigManager, DocumentFormat, EffectCatalog,
    EffectRack, EffectSlotEvent, FxRackConfig, StateStore,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fxrack")]
#[command(about = "Effect rack parameter console", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// List the available effects
    Effects,
    /// Interactive control console on stdin
    Console,
    /// Print the saved rack state
    Dump {
        /// Print JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("fxrack starting");

    let manager = match cli.config {
        Some(path) => ConfigManager::with_file(path),
        None => ConfigManager::new(ConfigManager::default_config_dir()?),
    };
    let config = manager.load().await;
    let store = StateStore::new(manager.resolve(&config.app.state_file));

    match cli.command.unwrap_or(Mode::Console) {
        Mode::Effects => list_effects(&EffectCatalog::builtin()),
        Mode::Dump { json } => {
            let rack = open_rack(&config, &store).await;
            let format = if json {
                DocumentFormat::Json
            } else {
                DocumentFormat::Toml
            };
            let text = format
                .render(&rack.to_document())
                .context("Failed to render rack state")?;
            println!("{text}");
        }
        Mode::Console => {
            let mut rack = open_rack(&config, &store).await;
            run_console(&mut rack, &store).await?;
            if config.app.auto_save_on_exit {
                store.save(&rack.to_document()).await?;
            }
        }
    }

    Ok(())
}

fn list_effects(catalog: &EffectCatalog) {
    for manifest in catalog.manifests() {
        println!(
            "{:<32} {:<6} {:<12} knobs={} buttons={}",
            manifest.id,
            manifest.version,
            manifest.name,
            manifest.knob_parameters.len(),
            manifest.button_parameters.len()
        );
    }
}

async fn open_rack(config: &FxRackConfig, store: &StateStore) -> EffectRack {
    let mut rack = EffectRack::new(config.rack.clone(), EffectCatalog::builtin());
    if let Some(document) = store.load().await {
        rack.restore(&document);
    }
    // Restoring queues slot events nobody needs to see
    rack.pump();
    rack
}

async fn run_console(rack: &mut EffectRack, store: &StateStore) -> anyhow::Result<()> {
    println!("fxrack console, type `help` for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = match console::parse_line(&line) {
            Ok(input) => input,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match input {
            ConsoleInput::Empty => {}
            ConsoleInput::Help => println!("{HELP}"),
            ConsoleInput::Show => print!("{}", console::render_rack(rack)),
            ConsoleInput::Save => {
                store.save(&rack.to_document()).await?;
                println!("saved {}", store.path().display());
            }
            ConsoleInput::Quit => break,
            ConsoleInput::Command(command) => {
                let command = match command {
                    Command::LoadEffect {
                        chain,
                        slot,
                        effect_id,
                    } => Command::LoadEffect {
                        chain,
                        slot,
                        effect_id: console::resolve_effect_id(rack.catalog(), &effect_id),
                    },
                    other => other,
                };
                match rack.execute(command) {
                    CommandResult::Error(message) => println!("error: {message}"),
                    result => println!("{result:?}"),
                }
                for event in rack.pump() {
                    if let EffectSlotEvent::EffectLoaded { effect, .. } = &event {
                        let (chain, slot) = event.slot();
                        let name = effect
                            .as_ref()
                            .map(|effect| effect.manifest().name.as_str())
                            .unwrap_or("(empty)");
                        println!("  unit {} slot {}: {}", chain + 1, slot + 1, name);
                    }
                }
            }
        }
    }

    Ok(())
}
