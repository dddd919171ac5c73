//! Effect slots
//!
//! An [`EffectSlot`] is one position in an effect chain. It owns the slot's
//! published controls, a fixed arena of knob and button parameter slots, and
//! the meta parameter fanned out across the bound knobs.
//!
//! The loaded effect is published through an [`ArcSwapOption`] so the audio
//! thread can pick up the current instance through an [`EngineEffectSlot`]
//! without taking a lock. Everything else is mutated on the control thread.
//!
//! Requests that need the chain (next/previous effect, clear) and state
//! changes are reported as [`EffectSlotEvent`]s on a channel. Every mutating
//! call ends with [`EffectSlotEvent::Updated`].

pub mod button_parameter;
pub mod parameter;

pub use button_parameter::EffectButtonParameterSlot;
pub use parameter::EffectParameterSlot;

use crate::domain::config::RackConfig;
use crate::domain::control::{ButtonMode, ConfigKey, ControlObject, ControlOptions, ControlRegistry};
use crate::domain::document::{EffectDocument, ParametersDocument};
use crate::domain::effect::{Effect, EffectPointer};
use crate::domain::soft_takeover::SoftTakeover;
use crate::domain::MAX_PARAMETER_SLOTS;
use arc_swap::ArcSwapOption;
use crossbeam::channel::{Receiver, Sender};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Control group of the slot at `effect_number` in chain `chain_number`.
/// Both indices are zero-based, the group name counts from one.
pub fn group_name(chain_number: usize, effect_number: usize) -> String {
    format!(
        "[EffectRack1_EffectUnit{}_Effect{}]",
        chain_number + 1,
        effect_number + 1
    )
}

/// Notifications emitted by an effect slot
#[derive(Debug, Clone)]
pub enum EffectSlotEvent {
    /// A new effect was bound, or the slot was emptied (`effect: None`)
    EffectLoaded {
        chain_number: usize,
        slot_index: usize,
        effect: Option<EffectPointer>,
    },
    /// The slot's observable state changed
    Updated { chain_number: usize, slot_index: usize },
    NextEffectRequested {
        chain_number: usize,
        slot_index: usize,
        current: Option<EffectPointer>,
    },
    PrevEffectRequested {
        chain_number: usize,
        slot_index: usize,
        current: Option<EffectPointer>,
    },
    ClearEffectRequested { chain_number: usize, slot_index: usize },
}

impl EffectSlotEvent {
    /// Position of the slot that emitted the event
    pub fn slot(&self) -> (usize, usize) {
        match *self {
            EffectSlotEvent::EffectLoaded {
                chain_number,
                slot_index,
                ..
            }
            | EffectSlotEvent::Updated {
                chain_number,
                slot_index,
            }
            | EffectSlotEvent::NextEffectRequested {
                chain_number,
                slot_index,
                ..
            }
            | EffectSlotEvent::PrevEffectRequested {
                chain_number,
                slot_index,
                ..
            }
            | EffectSlotEvent::ClearEffectRequested {
                chain_number,
                slot_index,
            } => (chain_number, slot_index),
        }
    }

    /// Intents are requests for the chain, not state changes
    pub fn is_intent(&self) -> bool {
        matches!(
            self,
            EffectSlotEvent::NextEffectRequested { .. }
                | EffectSlotEvent::PrevEffectRequested { .. }
                | EffectSlotEvent::ClearEffectRequested { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectSlotState {
    Empty,
    Loaded,
}

/// Audio-thread view of an effect slot
///
/// Loading never blocks and never allocates.
#[derive(Debug, Clone)]
pub struct EngineEffectSlot {
    effect: Arc<ArcSwapOption<Effect>>,
}

impl EngineEffectSlot {
    pub fn effect(&self) -> Option<EffectPointer> {
        self.effect.load_full()
    }

    /// Whether an effect is loaded and enabled
    pub fn is_active(&self) -> bool {
        let guard = self.effect.load();
        let effect: &Option<EffectPointer> = &guard;
        effect.as_ref().is_some_and(|effect| effect.is_enabled())
    }

    pub fn knob_value(&self, index: usize) -> Option<f64> {
        let guard = self.effect.load();
        let effect: &Option<EffectPointer> = &guard;
        effect
            .as_ref()
            .and_then(|effect| effect.knob_parameter(index))
            .map(|parameter| parameter.value())
    }

    pub fn button_value(&self, index: usize) -> Option<f64> {
        let guard = self.effect.load();
        let effect: &Option<EffectPointer> = &guard;
        effect
            .as_ref()
            .and_then(|effect| effect.button_parameter(index))
            .map(|parameter| parameter.value())
    }
}

#[derive(Debug)]
pub struct EffectSlot {
    chain_number: usize,
    effect_number: usize,
    group: String,
    effect: Arc<ArcSwapOption<Effect>>,
    enabled_changes: Option<Receiver<bool>>,

    parameters: Vec<EffectParameterSlot>,
    num_parameter_slots: usize,
    button_parameters: Vec<EffectButtonParameterSlot>,
    num_button_parameter_slots: usize,

    soft_takeover: SoftTakeover,
    events: Sender<EffectSlotEvent>,

    control_loaded: ControlObject,
    control_num_parameters: ControlObject,
    control_num_parameter_slots: ControlObject,
    control_num_button_parameters: ControlObject,
    control_num_button_parameter_slots: ControlObject,
    control_enabled: ControlObject,
    control_next_effect: ControlObject,
    control_prev_effect: ControlObject,
    control_effect_selector: ControlObject,
    control_clear: ControlObject,
    control_meta: ControlObject,
}

impl EffectSlot {
    /// Create an empty slot and publish its controls.
    ///
    /// The whole parameter arena is allocated here; only
    /// `config.initial_parameter_slots` of each kind start active.
    pub fn new(
        chain_number: usize,
        effect_number: usize,
        config: &RackConfig,
        registry: &ControlRegistry,
        events: Sender<EffectSlotEvent>,
    ) -> Self {
        let group = group_name(chain_number, effect_number);
        let key = |item: &str| ConfigKey::new(group.as_str(), item);
        let threshold = config.soft_takeover_threshold;

        let parameters = (0..MAX_PARAMETER_SLOTS)
            .map(|index| EffectParameterSlot::new(&group, index, threshold, registry))
            .collect();
        let button_parameters = (0..MAX_PARAMETER_SLOTS)
            .map(|index| EffectButtonParameterSlot::new(&group, index, registry))
            .collect();
        let initial_slots = config.initial_parameter_slots.min(MAX_PARAMETER_SLOTS);

        let slot = Self {
            chain_number,
            effect_number,
            effect: Arc::new(ArcSwapOption::empty()),
            enabled_changes: None,
            parameters,
            num_parameter_slots: initial_slots,
            button_parameters,
            num_button_parameter_slots: initial_slots,
            soft_takeover: SoftTakeover::new(threshold),
            events,
            control_loaded: ControlObject::new(key("loaded"), ControlOptions::read_only(), registry),
            control_num_parameters: ControlObject::new(
                key("num_parameters"),
                ControlOptions::read_only(),
                registry,
            ),
            control_num_parameter_slots: ControlObject::new(
                key("num_parameterslots"),
                ControlOptions::read_only(),
                registry,
            ),
            control_num_button_parameters: ControlObject::new(
                key("num_button_parameters"),
                ControlOptions::read_only(),
                registry,
            ),
            control_num_button_parameter_slots: ControlObject::new(
                key("num_button_parameterslots"),
                ControlOptions::read_only(),
                registry,
            ),
            // Off by default so nothing is audible by accident
            control_enabled: ControlObject::new(
                key("enabled"),
                ControlOptions::button(ButtonMode::PowerWindow),
                registry,
            ),
            control_next_effect: ControlObject::new(
                key("next_effect"),
                ControlOptions::button(ButtonMode::Push),
                registry,
            ),
            control_prev_effect: ControlObject::new(
                key("prev_effect"),
                ControlOptions::button(ButtonMode::Push),
                registry,
            ),
            control_effect_selector: ControlObject::new(
                key("effect_selector"),
                ControlOptions::ticker(),
                registry,
            ),
            control_clear: ControlObject::new(
                key("clear"),
                ControlOptions::button(ButtonMode::Push),
                registry,
            ),
            control_meta: ControlObject::new(
                key("meta"),
                ControlOptions::default().with_default(0.0),
                registry,
            ),
            group,
        };
        slot.control_num_parameter_slots.force_set(initial_slots as f64);
        slot.control_num_button_parameter_slots
            .force_set(initial_slots as f64);
        debug!(group = %slot.group, "Effect slot created");
        slot
    }

    pub fn chain_number(&self) -> usize {
        self.chain_number
    }

    pub fn effect_number(&self) -> usize {
        self.effect_number
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// The loaded effect
    pub fn effect(&self) -> Option<EffectPointer> {
        self.effect.load_full()
    }

    /// A lock-free reader for the audio thread
    pub fn engine_slot(&self) -> EngineEffectSlot {
        EngineEffectSlot {
            effect: Arc::clone(&self.effect),
        }
    }

    pub fn state(&self) -> EffectSlotState {
        if self.is_loaded() {
            EffectSlotState::Loaded
        } else {
            EffectSlotState::Empty
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.effect.load().is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.control_enabled.to_bool()
    }

    pub fn meta_parameter(&self) -> f64 {
        self.control_meta.get()
    }

    pub fn num_parameter_slots(&self) -> usize {
        self.num_parameter_slots
    }

    pub fn num_button_parameter_slots(&self) -> usize {
        self.num_button_parameter_slots
    }

    /// Bind `effect` to this slot, or empty the slot with `None`.
    ///
    /// The slot's enabled state carries over onto the new effect and the
    /// current meta value is applied to it with force.
    pub fn load_effect(&mut self, effect: Option<EffectPointer>) {
        match effect {
            Some(effect) => {
                debug!(group = %self.group, effect = %effect.id(), "Loading effect");
                self.enabled_changes = None;
                self.effect.store(Some(EffectPointer::clone(&effect)));

                let num_knobs = effect.num_knob_parameters();
                let num_buttons = effect.num_button_parameters();
                self.control_loaded.force_set(1.0);
                self.control_num_parameters.force_set(num_knobs as f64);
                self.control_num_button_parameters
                    .force_set(num_buttons as f64);

                effect.set_enabled(self.is_enabled());
                self.enabled_changes = Some(effect.subscribe_enabled());

                while self.num_parameter_slots < num_knobs {
                    if self.add_effect_parameter_slot().is_none() {
                        break;
                    }
                }
                while self.num_button_parameter_slots < num_buttons {
                    if self.add_effect_button_parameter_slot().is_none() {
                        break;
                    }
                }

                for slot in &mut self.parameters[..self.num_parameter_slots] {
                    slot.load_effect(&effect);
                }
                for slot in &mut self.button_parameters[..self.num_button_parameter_slots] {
                    slot.load_effect(&effect);
                }

                self.apply_meta_parameter(self.control_meta.get(), true);
                self.emit(EffectSlotEvent::EffectLoaded {
                    chain_number: self.chain_number,
                    slot_index: self.effect_number,
                    effect: Some(effect),
                });
            }
            None => {
                self.clear_state();
                self.emit(EffectSlotEvent::EffectLoaded {
                    chain_number: self.chain_number,
                    slot_index: self.effect_number,
                    effect: None,
                });
            }
        }
        self.emit_updated();
    }

    /// Release the loaded effect. The meta parameter is kept.
    pub fn clear(&mut self) {
        self.clear_state();
        self.emit_updated();
    }

    fn clear_state(&mut self) {
        if self.is_loaded() {
            debug!(group = %self.group, "Clearing effect slot");
        }
        self.enabled_changes = None;
        self.control_loaded.force_set(0.0);
        self.control_num_parameters.force_set(0.0);
        self.control_num_button_parameters.force_set(0.0);
        for slot in &mut self.parameters[..self.num_parameter_slots] {
            slot.clear();
        }
        for slot in &mut self.button_parameters[..self.num_button_parameter_slots] {
            slot.clear();
        }
        self.effect.store(None);
    }

    /// Activate one more knob slot. `None` once the arena is exhausted.
    pub fn add_effect_parameter_slot(&mut self) -> Option<usize> {
        if self.num_parameter_slots >= MAX_PARAMETER_SLOTS {
            warn!(
                group = %self.group,
                max = MAX_PARAMETER_SLOTS,
                "No parameter slot left, extra parameters stay unbound"
            );
            return None;
        }
        let index = self.num_parameter_slots;
        self.num_parameter_slots += 1;
        self.control_num_parameter_slots
            .force_set(self.num_parameter_slots as f64);
        Some(index)
    }

    /// Activate one more button slot. `None` once the arena is exhausted.
    pub fn add_effect_button_parameter_slot(&mut self) -> Option<usize> {
        if self.num_button_parameter_slots >= MAX_PARAMETER_SLOTS {
            warn!(
                group = %self.group,
                max = MAX_PARAMETER_SLOTS,
                "No button parameter slot left, extra parameters stay unbound"
            );
            return None;
        }
        let index = self.num_button_parameter_slots;
        self.num_button_parameter_slots += 1;
        self.control_num_button_parameter_slots
            .force_set(self.num_button_parameter_slots as f64);
        Some(index)
    }

    pub fn parameter_slot(&self, index: usize) -> Option<&EffectParameterSlot> {
        if index >= self.num_parameter_slots {
            warn!(group = %self.group, index, "Parameter slot index out of range");
            return None;
        }
        self.parameters.get(index)
    }

    pub fn parameter_slot_mut(&mut self, index: usize) -> Option<&mut EffectParameterSlot> {
        if index >= self.num_parameter_slots {
            warn!(group = %self.group, index, "Parameter slot index out of range");
            return None;
        }
        self.parameters.get_mut(index)
    }

    pub fn button_parameter_slot(&self, index: usize) -> Option<&EffectButtonParameterSlot> {
        if index >= self.num_button_parameter_slots {
            warn!(group = %self.group, index, "Button parameter slot index out of range");
            return None;
        }
        self.button_parameters.get(index)
    }

    pub fn button_parameter_slot_mut(
        &mut self,
        index: usize,
    ) -> Option<&mut EffectButtonParameterSlot> {
        if index >= self.num_button_parameter_slots {
            warn!(group = %self.group, index, "Button parameter slot index out of range");
            return None;
        }
        self.button_parameters.get_mut(index)
    }

    /// Active knob slots, bound or not
    pub fn parameter_slots(&self) -> impl Iterator<Item = &EffectParameterSlot> {
        self.parameters[..self.num_parameter_slots].iter()
    }

    /// Active button slots, bound or not
    pub fn button_parameter_slots(&self) -> impl Iterator<Item = &EffectButtonParameterSlot> {
        self.button_parameters[..self.num_button_parameter_slots].iter()
    }

    /// Programmatic meta write, used by the chain's superknob.
    ///
    /// Subject to the slot's own soft takeover while the slot is enabled and
    /// the write is not forced.
    pub fn set_meta_parameter(&mut self, value: f64, force: bool) {
        if value.is_nan() {
            warn!(group = %self.group, "Ignoring NaN meta parameter");
            return;
        }
        let ignored = self.soft_takeover.ignore(value);
        if !ignored || !self.is_enabled() || force {
            self.apply_meta_parameter(value, force);
        } else {
            trace!(group = %self.group, value, "Meta parameter write suppressed");
        }
    }

    /// External write to the `meta` control
    pub fn on_meta_control(&mut self, value: f64) {
        if value.is_nan() {
            warn!(group = %self.group, "Ignoring NaN meta parameter");
            return;
        }
        let mut value = value;
        if !(0.0..=1.0).contains(&value) {
            warn!(group = %self.group, value, "Meta parameter out of range, clamping");
            value = value.clamp(0.0, 1.0);
        }
        if self.control_meta.set(value) {
            self.soft_takeover.sync(value);
            self.apply_meta_parameter(value, false);
        }
    }

    fn apply_meta_parameter(&mut self, value: f64, force: bool) {
        if value.is_nan() {
            warn!(group = %self.group, "Ignoring NaN meta parameter");
            return;
        }
        let mut value = value;
        if !(0.0..=1.0).contains(&value) {
            warn!(group = %self.group, value, "Meta parameter out of range, clamping");
            value = value.clamp(0.0, 1.0);
        }
        self.control_meta.force_set(value);

        let force = force || !self.is_enabled();
        for slot in &mut self.parameters[..self.num_parameter_slots] {
            slot.on_effect_meta_parameter_changed(value, force);
        }
        trace!(group = %self.group, value, force, "Meta parameter fanned out");
    }

    /// External write to the `enabled` control
    pub fn on_enabled_control(&mut self, value: f64) {
        if !self.control_enabled.set(value) {
            return;
        }
        if let Some(effect) = self.effect() {
            effect.set_enabled(value > 0.0);
        }
    }

    /// Press the `enabled` button
    pub fn toggle_enabled(&mut self) {
        if let Some(value) = self.control_enabled.press() {
            if let Some(effect) = self.effect() {
                effect.set_enabled(value > 0.0);
            }
        }
    }

    /// Mirror enabled changes made on the effect itself into the `enabled`
    /// control. Returns the number of notifications drained.
    pub fn process_effect_notifications(&mut self) -> usize {
        let Some(changes) = self.enabled_changes.as_ref() else {
            return 0;
        };
        let mut count = 0;
        let mut latest = None;
        for enabled in changes.try_iter() {
            count += 1;
            latest = Some(enabled);
        }
        if let Some(enabled) = latest {
            trace!(group = %self.group, enabled, "Effect enabled notification");
            self.control_enabled
                .force_set(if enabled { 1.0 } else { 0.0 });
        }
        count
    }

    pub fn on_next_effect_control(&mut self, value: f64) {
        if self.control_next_effect.set(value) && value > 0.0 {
            self.on_effect_selector_control(1.0);
        }
    }

    pub fn on_prev_effect_control(&mut self, value: f64) {
        if self.control_prev_effect.set(value) && value > 0.0 {
            self.on_effect_selector_control(-1.0);
        }
    }

    /// Relative selection: positive ticks move forward, negative backward
    pub fn on_effect_selector_control(&mut self, delta: f64) {
        if !self.control_effect_selector.set(delta) {
            return;
        }
        let chain_number = self.chain_number;
        let slot_index = self.effect_number;
        if delta > 0.0 {
            self.emit(EffectSlotEvent::NextEffectRequested {
                chain_number,
                slot_index,
                current: self.effect(),
            });
        } else if delta < 0.0 {
            self.emit(EffectSlotEvent::PrevEffectRequested {
                chain_number,
                slot_index,
                current: self.effect(),
            });
        }
    }

    pub fn on_clear_control(&mut self, value: f64) {
        if self.control_clear.set(value) && value > 0.0 {
            self.emit(EffectSlotEvent::ClearEffectRequested {
                chain_number: self.chain_number,
                slot_index: self.effect_number,
            });
        }
    }

    /// Re-prime soft takeover on every knob slot
    pub fn sync_soft_takeover(&mut self) {
        for slot in &mut self.parameters[..self.num_parameter_slots] {
            slot.sync_soft_takeover();
        }
    }

    /// Snapshot the loaded effect's parameters. `None` for an empty slot.
    pub fn to_document(&self) -> Option<EffectDocument> {
        let effect = self.effect()?;
        let knob_parameters = self
            .parameter_slots()
            .take(effect.num_knob_parameters())
            .map(EffectParameterSlot::to_document)
            .collect();
        let button_parameters = self
            .button_parameter_slots()
            .take(effect.num_button_parameters())
            .map(EffectButtonParameterSlot::to_document)
            .collect();
        Some(EffectDocument {
            id: effect.id().to_string(),
            version: effect.version().to_string(),
            parameters: ParametersDocument {
                knob_parameters,
                button_parameters,
            },
        })
    }

    /// Restore parameter values saved by [`Self::to_document`].
    ///
    /// Only applies when the loaded effect has the same id and version.
    pub fn load_from_document(&mut self, document: &EffectDocument) {
        let Some(effect) = self.effect() else {
            debug!(group = %self.group, "No effect loaded, nothing to restore");
            return;
        };
        if effect.id() != document.id || effect.version() != document.version {
            debug!(
                group = %self.group,
                loaded = %effect.id(),
                saved = %document.id,
                "Saved parameters belong to another effect"
            );
            return;
        }

        let knobs = &document.parameters.knob_parameters;
        for (slot, entry) in self.parameters[..self.num_parameter_slots]
            .iter_mut()
            .zip(knobs)
        {
            slot.load_from_document(entry);
        }
        let buttons = &document.parameters.button_parameters;
        for (slot, entry) in self.button_parameters[..self.num_button_parameter_slots]
            .iter_mut()
            .zip(buttons)
        {
            slot.load_from_document(entry);
        }
        debug!(group = %self.group, effect = %document.id, "Parameters restored");
        self.emit_updated();
    }

    fn emit_updated(&self) {
        self.emit(EffectSlotEvent::Updated {
            chain_number: self.chain_number,
            slot_index: self.effect_number,
        });
    }

    fn emit(&self, event: EffectSlotEvent) {
        if self.events.send(event).is_err() {
            trace!(group = %self.group, "No listener for slot events");
        }
    }
}
