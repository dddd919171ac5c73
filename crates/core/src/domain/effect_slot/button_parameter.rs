//! Button parameter slots
//!
//! Discrete counterpart of [`super::parameter::EffectParameterSlot`]. No meta
//! mapping and no soft takeover.

use crate::domain::control::{ConfigKey, ControlObject, ControlOptions, ControlRegistry};
use crate::domain::document::ButtonParameterDocument;
use crate::domain::effect::{EffectButtonParameter, EffectPointer};
use tracing::trace;

#[derive(Debug)]
pub struct EffectButtonParameterSlot {
    index: usize,
    effect: Option<EffectPointer>,
    control_loaded: ControlObject,
    control_value: ControlObject,
    control_type: ControlObject,
}

impl EffectButtonParameterSlot {
    pub fn new(group: &str, index: usize, registry: &ControlRegistry) -> Self {
        let item = format!("button_parameter{}", index + 1);
        let key = |suffix: &str| ConfigKey::new(group, format!("{item}{suffix}"));
        Self {
            index,
            effect: None,
            control_loaded: ControlObject::new(key("_loaded"), ControlOptions::read_only(), registry),
            control_value: ControlObject::new(key(""), ControlOptions::default(), registry),
            control_type: ControlObject::new(key("_type"), ControlOptions::read_only(), registry),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_loaded(&self) -> bool {
        self.parameter().is_some()
    }

    pub fn parameter(&self) -> Option<&EffectButtonParameter> {
        self.effect
            .as_ref()
            .and_then(|effect| effect.button_parameter(self.index))
    }

    pub fn name(&self) -> Option<&str> {
        self.parameter().map(|parameter| parameter.manifest().name.as_str())
    }

    pub fn value(&self) -> Option<f64> {
        self.is_loaded().then(|| self.control_value.get())
    }

    pub fn load_effect(&mut self, effect: &EffectPointer) {
        self.clear();
        let Some(parameter) = effect.button_parameter(self.index) else {
            return;
        };
        self.control_loaded.force_set(1.0);
        self.control_type.force_set(f64::from(parameter.steps()));
        self.control_value.force_set(parameter.value());
        trace!(index = self.index, parameter = %parameter.manifest().id, "Button slot bound");
        self.effect = Some(EffectPointer::clone(effect));
    }

    pub fn clear(&mut self) {
        self.effect = None;
        self.control_loaded.force_set(0.0);
        self.control_type.force_set(0.0);
        self.control_value.reset();
    }

    /// Operator write. Returns the stored step.
    pub fn set_value(&mut self, value: f64) -> Option<f64> {
        let parameter = self.parameter()?;
        let stored = parameter.set_value(value);
        self.control_value.force_set(stored);
        Some(stored)
    }

    /// Advance to the next step, wrapping to 0
    pub fn press(&mut self) -> Option<f64> {
        let parameter = self.parameter()?;
        let next = (parameter.value() + 1.0) % f64::from(parameter.steps());
        self.set_value(next)
    }

    pub fn to_document(&self) -> ButtonParameterDocument {
        ButtonParameterDocument {
            value: self.value(),
        }
    }

    pub fn load_from_document(&mut self, document: &ButtonParameterDocument) {
        if let Some(value) = document.value {
            self.set_value(value);
        }
    }
}
