//! Effect rack and chains
//!
//! The rack owns every chain, the control registry and the effect catalog.
//! It is the listener for slot events: [`EffectRack::pump`] resolves the
//! next/previous/clear intents raised by slot controls and hands the state
//! events back to the caller.

use crate::domain::catalog::EffectCatalog;
use crate::domain::config::RackConfig;
use crate::domain::control::{ConfigKey, ControlObject, ControlOptions, ControlRegistry};
use crate::domain::document::{ChainDocument, RackDocument, SlotDocument};
use crate::domain::effect::{EffectPointer, LinkType};
use crate::domain::effect_slot::{EffectSlot, EffectSlotEvent};
use crossbeam::channel::{self, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

pub type Result<T> = std::result::Result<T, RackError>;

/// Errors addressing the rack
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RackError {
    #[error("Chain not found: {0}")]
    ChainNotFound(usize),

    #[error("Slot {slot} not found in chain {chain}")]
    SlotNotFound { chain: usize, slot: usize },

    #[error("Effect not found: {0}")]
    EffectNotFound(String),

    #[error("Parameter {index} not available in chain {chain} slot {slot}")]
    ParameterNotFound {
        chain: usize,
        slot: usize,
        index: usize,
    },
}

/// One effect unit: a row of effect slots sharing a superknob
#[derive(Debug)]
pub struct EffectChain {
    number: usize,
    group: String,
    super_parameter: ControlObject,
    slots: Vec<EffectSlot>,
}

impl EffectChain {
    fn new(
        number: usize,
        config: &RackConfig,
        registry: &ControlRegistry,
        events: &Sender<EffectSlotEvent>,
    ) -> Self {
        let group = format!("[EffectRack1_EffectUnit{}]", number + 1);
        let super_parameter = ControlObject::new(
            ConfigKey::new(group.as_str(), "super1"),
            ControlOptions::default(),
            registry,
        );
        let slots = (0..config.slots_per_chain)
            .map(|index| EffectSlot::new(number, index, config, registry, events.clone()))
            .collect();
        Self {
            number,
            group,
            super_parameter,
            slots,
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn slots(&self) -> &[EffectSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&EffectSlot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut EffectSlot> {
        self.slots.get_mut(index)
    }

    pub fn super_parameter(&self) -> f64 {
        self.super_parameter.get()
    }

    /// Superknob: drive the meta parameter of every slot in the chain.
    ///
    /// Each slot applies its own soft takeover.
    pub fn set_super_parameter(&mut self, value: f64) {
        if value.is_nan() {
            warn!(group = %self.group, "Ignoring NaN super parameter");
            return;
        }
        let value = value.clamp(0.0, 1.0);
        self.super_parameter.force_set(value);
        for slot in &mut self.slots {
            slot.set_meta_parameter(value, false);
        }
        debug!(group = %self.group, value, "Super parameter changed");
    }
}

/// Command types for runtime rack control
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadEffect {
        chain: usize,
        slot: usize,
        effect_id: String,
    },
    ClearEffect {
        chain: usize,
        slot: usize,
    },
    NextEffect {
        chain: usize,
        slot: usize,
    },
    PrevEffect {
        chain: usize,
        slot: usize,
    },
    SetEnabled {
        chain: usize,
        slot: usize,
        enabled: bool,
    },
    SetMetaParameter {
        chain: usize,
        slot: usize,
        value: f64,
    },
    SetSuperParameter {
        chain: usize,
        value: f64,
    },
    SetParameter {
        chain: usize,
        slot: usize,
        index: usize,
        value: f64,
    },
    SetLink {
        chain: usize,
        slot: usize,
        index: usize,
        link_type: LinkType,
        inversed: bool,
    },
    SetButtonParameter {
        chain: usize,
        slot: usize,
        index: usize,
        value: f64,
    },
}

/// Result of command execution
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Ok,
    EffectLoaded {
        chain: usize,
        slot: usize,
        effect_id: String,
    },
    EffectCleared {
        chain: usize,
        slot: usize,
    },
    EnabledChanged {
        chain: usize,
        slot: usize,
        enabled: bool,
    },
    MetaParameterChanged {
        chain: usize,
        slot: usize,
        value: f64,
    },
    SuperParameterChanged {
        chain: usize,
        value: f64,
    },
    ParameterChanged {
        chain: usize,
        slot: usize,
        index: usize,
        value: f64,
    },
    LinkChanged {
        chain: usize,
        slot: usize,
        index: usize,
        link_type: LinkType,
        inversed: bool,
    },
    ButtonParameterChanged {
        chain: usize,
        slot: usize,
        index: usize,
        value: f64,
    },
    Error(String),
}

/// Trait for command execution
///
/// Commands run on the control thread, which owns the rack.
pub trait CommandExecutor {
    fn execute(&mut self, command: Command) -> CommandResult;
}

#[derive(Debug)]
pub struct EffectRack {
    config: RackConfig,
    registry: ControlRegistry,
    catalog: EffectCatalog,
    chains: Vec<EffectChain>,
    events: Receiver<EffectSlotEvent>,
}

impl EffectRack {
    pub fn new(config: RackConfig, catalog: EffectCatalog) -> Self {
        let config = config.validated();
        let registry = ControlRegistry::new();
        let (tx, rx) = channel::unbounded();
        let chains = (0..config.chains)
            .map(|number| EffectChain::new(number, &config, &registry, &tx))
            .collect();
        info!(
            chains = config.chains,
            slots_per_chain = config.slots_per_chain,
            effects = catalog.len(),
            "Effect rack created"
        );
        Self {
            config,
            registry,
            catalog,
            chains,
            events: rx,
        }
    }

    pub fn config(&self) -> &RackConfig {
        &self.config
    }

    pub fn registry(&self) -> &ControlRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &EffectCatalog {
        &self.catalog
    }

    pub fn chains(&self) -> &[EffectChain] {
        &self.chains
    }

    pub fn chain(&self, chain: usize) -> Result<&EffectChain> {
        self.chains.get(chain).ok_or(RackError::ChainNotFound(chain))
    }

    pub fn chain_mut(&mut self, chain: usize) -> Result<&mut EffectChain> {
        self.chains
            .get_mut(chain)
            .ok_or(RackError::ChainNotFound(chain))
    }

    pub fn slot(&self, chain: usize, slot: usize) -> Result<&EffectSlot> {
        self.chain(chain)?
            .slot(slot)
            .ok_or(RackError::SlotNotFound { chain, slot })
    }

    pub fn slot_mut(&mut self, chain: usize, slot: usize) -> Result<&mut EffectSlot> {
        self.chain_mut(chain)?
            .slot_mut(slot)
            .ok_or(RackError::SlotNotFound { chain, slot })
    }

    /// Instantiate `effect_id` from the catalog into a slot
    pub fn load_effect(&mut self, chain: usize, slot: usize, effect_id: &str) -> Result<EffectPointer> {
        let effect = self
            .catalog
            .instantiate(effect_id)
            .ok_or_else(|| RackError::EffectNotFound(effect_id.to_string()))?;
        self.slot_mut(chain, slot)?
            .load_effect(Some(EffectPointer::clone(&effect)));
        Ok(effect)
    }

    pub fn clear_effect(&mut self, chain: usize, slot: usize) -> Result<()> {
        self.slot_mut(chain, slot)?.load_effect(None);
        Ok(())
    }

    /// Load the catalog entry after `current`. Returns `None` for an empty catalog.
    pub fn load_next_effect(
        &mut self,
        chain: usize,
        slot: usize,
        current: Option<&EffectPointer>,
    ) -> Result<Option<EffectPointer>> {
        let next = self
            .catalog
            .next_after(current.map(|effect| effect.id()))
            .map(|manifest| manifest.id.clone());
        match next {
            Some(id) => self.load_effect(chain, slot, &id).map(Some),
            None => {
                debug!("Catalog is empty, nothing to load");
                Ok(None)
            }
        }
    }

    /// Load the catalog entry before `current`. Returns `None` for an empty catalog.
    pub fn load_prev_effect(
        &mut self,
        chain: usize,
        slot: usize,
        current: Option<&EffectPointer>,
    ) -> Result<Option<EffectPointer>> {
        let previous = self
            .catalog
            .previous_before(current.map(|effect| effect.id()))
            .map(|manifest| manifest.id.clone());
        match previous {
            Some(id) => self.load_effect(chain, slot, &id).map(Some),
            None => {
                debug!("Catalog is empty, nothing to load");
                Ok(None)
            }
        }
    }

    /// Process everything pending on the control thread.
    ///
    /// Mirrors enabled changes made on loaded effects, resolves the intents
    /// raised by slot controls, and returns the state events in the order
    /// they were emitted, including those caused by resolving intents.
    pub fn pump(&mut self) -> Vec<EffectSlotEvent> {
        for chain in &mut self.chains {
            for slot in &mut chain.slots {
                slot.process_effect_notifications();
            }
        }

        let mut observed = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if event.is_intent() {
                self.resolve_intent(event);
            } else {
                observed.push(event);
            }
        }
        observed
    }

    fn resolve_intent(&mut self, event: EffectSlotEvent) {
        let result = match event {
            EffectSlotEvent::NextEffectRequested {
                chain_number,
                slot_index,
                current,
            } => self
                .load_next_effect(chain_number, slot_index, current.as_ref())
                .map(drop),
            EffectSlotEvent::PrevEffectRequested {
                chain_number,
                slot_index,
                current,
            } => self
                .load_prev_effect(chain_number, slot_index, current.as_ref())
                .map(drop),
            EffectSlotEvent::ClearEffectRequested {
                chain_number,
                slot_index,
            } => self.clear_effect(chain_number, slot_index),
            EffectSlotEvent::EffectLoaded { .. } | EffectSlotEvent::Updated { .. } => Ok(()),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to resolve slot request");
        }
    }

    /// Snapshot of every chain and slot
    pub fn to_document(&self) -> RackDocument {
        RackDocument {
            chains: self
                .chains
                .iter()
                .map(|chain| ChainDocument {
                    number: chain.number(),
                    super_parameter: chain.super_parameter(),
                    slots: chain
                        .slots()
                        .iter()
                        .map(|slot| SlotDocument {
                            number: slot.effect_number(),
                            enabled: slot.is_enabled(),
                            meta_parameter: slot.meta_parameter(),
                            effect: slot.to_document(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Apply a saved rack document as far as it fits this rack.
    ///
    /// Positions outside the rack and unknown effect ids are skipped with a
    /// warning. Returns the number of slots restored.
    pub fn restore(&mut self, document: &RackDocument) -> usize {
        let mut restored = 0;
        for chain_document in &document.chains {
            let Some(chain) = self.chains.get_mut(chain_document.number) else {
                warn!(chain = chain_document.number, "Saved chain does not exist, skipping");
                continue;
            };
            if chain_document.super_parameter.is_nan() {
                warn!(chain = chain_document.number, "Ignoring NaN saved super parameter");
            } else {
                chain
                    .super_parameter
                    .force_set(chain_document.super_parameter.clamp(0.0, 1.0));
            }

            for slot_document in &chain_document.slots {
                let Some(slot) = chain.slots.get_mut(slot_document.number) else {
                    warn!(
                        chain = chain_document.number,
                        slot = slot_document.number,
                        "Saved slot does not exist, skipping"
                    );
                    continue;
                };

                let effect = match &slot_document.effect {
                    Some(effect_document) => match self.catalog.instantiate(&effect_document.id) {
                        Some(effect) => Some(effect),
                        None => {
                            warn!(effect = %effect_document.id, "Unknown saved effect, skipping slot");
                            continue;
                        }
                    },
                    None => None,
                };

                slot.on_enabled_control(if slot_document.enabled { 1.0 } else { 0.0 });
                slot.set_meta_parameter(slot_document.meta_parameter, true);
                match (effect, &slot_document.effect) {
                    (Some(effect), Some(effect_document)) => {
                        slot.load_effect(Some(effect));
                        slot.load_from_document(effect_document);
                    }
                    _ => slot.clear(),
                }
                restored += 1;
            }
        }
        info!(slots = restored, "Rack state restored");
        restored
    }

    fn try_execute(&mut self, command: Command) -> Result<CommandResult> {
        Ok(match command {
            Command::LoadEffect {
                chain,
                slot,
                effect_id,
            } => {
                self.load_effect(chain, slot, &effect_id)?;
                CommandResult::EffectLoaded {
                    chain,
                    slot,
                    effect_id,
                }
            }
            Command::ClearEffect { chain, slot } => {
                self.clear_effect(chain, slot)?;
                CommandResult::EffectCleared { chain, slot }
            }
            Command::NextEffect { chain, slot } => {
                let current = self.slot(chain, slot)?.effect();
                let next = self.load_next_effect(chain, slot, current.as_ref())?;
                moved(chain, slot, next)
            }
            Command::PrevEffect { chain, slot } => {
                let current = self.slot(chain, slot)?.effect();
                let previous = self.load_prev_effect(chain, slot, current.as_ref())?;
                moved(chain, slot, previous)
            }
            Command::SetEnabled {
                chain,
                slot,
                enabled,
            } => {
                let effect_slot = self.slot_mut(chain, slot)?;
                effect_slot.on_enabled_control(if enabled { 1.0 } else { 0.0 });
                CommandResult::EnabledChanged {
                    chain,
                    slot,
                    enabled: effect_slot.is_enabled(),
                }
            }
            Command::SetMetaParameter { chain, slot, value } => {
                let effect_slot = self.slot_mut(chain, slot)?;
                effect_slot.on_meta_control(value);
                CommandResult::MetaParameterChanged {
                    chain,
                    slot,
                    value: effect_slot.meta_parameter(),
                }
            }
            Command::SetSuperParameter { chain, value } => {
                let effect_chain = self.chain_mut(chain)?;
                effect_chain.set_super_parameter(value);
                CommandResult::SuperParameterChanged {
                    chain,
                    value: effect_chain.super_parameter(),
                }
            }
            Command::SetParameter {
                chain,
                slot,
                index,
                value,
            } => {
                let not_found = RackError::ParameterNotFound { chain, slot, index };
                let value = self
                    .slot_mut(chain, slot)?
                    .parameter_slot_mut(index)
                    .and_then(|parameter| parameter.set_value(value))
                    .ok_or(not_found)?;
                CommandResult::ParameterChanged {
                    chain,
                    slot,
                    index,
                    value,
                }
            }
            Command::SetLink {
                chain,
                slot,
                index,
                link_type,
                inversed,
            } => {
                let parameter = self
                    .slot_mut(chain, slot)?
                    .parameter_slot_mut(index)
                    .filter(|parameter| parameter.is_loaded())
                    .ok_or(RackError::ParameterNotFound { chain, slot, index })?;
                parameter.set_link_type(link_type);
                parameter.set_link_inversion(inversed);
                CommandResult::LinkChanged {
                    chain,
                    slot,
                    index,
                    link_type,
                    inversed,
                }
            }
            Command::SetButtonParameter {
                chain,
                slot,
                index,
                value,
            } => {
                let not_found = RackError::ParameterNotFound { chain, slot, index };
                let value = self
                    .slot_mut(chain, slot)?
                    .button_parameter_slot_mut(index)
                    .and_then(|parameter| parameter.set_value(value))
                    .ok_or(not_found)?;
                CommandResult::ButtonParameterChanged {
                    chain,
                    slot,
                    index,
                    value,
                }
            }
        })
    }

}

fn moved(chain: usize, slot: usize, effect: Option<EffectPointer>) -> CommandResult {
    match effect {
        Some(effect) => CommandResult::EffectLoaded {
            chain,
            slot,
            effect_id: effect.id().to_string(),
        },
        None => CommandResult::Ok,
    }
}

impl CommandExecutor for EffectRack {
    fn execute(&mut self, command: Command) -> CommandResult {
        debug!(?command, "Executing command");
        match self.try_execute(command) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Command failed");
                CommandResult::Error(e.to_string())
            }
        }
    }
}
