//! Knob parameter slots
//!
//! A slot binds the controls `parameterN*` of an effect slot to the N-th knob
//! parameter of whatever effect is loaded. The controls outlive the binding.

use crate::domain::control::{ConfigKey, ControlObject, ControlOptions, ControlRegistry};
use crate::domain::document::KnobParameterDocument;
use crate::domain::effect::{EffectKnobParameter, EffectPointer, LinkType, ValueScaler};
use crate::domain::soft_takeover::SoftTakeover;
use tracing::{debug, trace, warn};

#[derive(Debug)]
pub struct EffectParameterSlot {
    index: usize,
    effect: Option<EffectPointer>,
    soft_takeover: SoftTakeover,
    meta_value: f64,
    control_loaded: ControlObject,
    control_value: ControlObject,
    control_link_type: ControlObject,
    control_link_inverse: ControlObject,
    control_type: ControlObject,
}

impl EffectParameterSlot {
    pub fn new(group: &str, index: usize, takeover_threshold: f64, registry: &ControlRegistry) -> Self {
        let item = format!("parameter{}", index + 1);
        let key = |suffix: &str| ConfigKey::new(group, format!("{item}{suffix}"));
        Self {
            index,
            effect: None,
            soft_takeover: SoftTakeover::new(takeover_threshold),
            meta_value: 0.0,
            control_loaded: ControlObject::new(key("_loaded"), ControlOptions::read_only(), registry),
            control_value: ControlObject::new(key(""), ControlOptions::default(), registry),
            control_link_type: ControlObject::new(key("_link_type"), ControlOptions::default(), registry),
            control_link_inverse: ControlObject::new(
                key("_link_inverse"),
                ControlOptions::default(),
                registry,
            ),
            control_type: ControlObject::new(key("_type"), ControlOptions::read_only(), registry),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_loaded(&self) -> bool {
        self.parameter().is_some()
    }

    /// The bound parameter, if any
    pub fn parameter(&self) -> Option<&EffectKnobParameter> {
        self.effect
            .as_ref()
            .and_then(|effect| effect.knob_parameter(self.index))
    }

    pub fn name(&self) -> Option<&str> {
        self.parameter().map(|parameter| parameter.manifest().name.as_str())
    }

    /// Published value, `None` when unbound
    pub fn value(&self) -> Option<f64> {
        self.is_loaded().then(|| self.control_value.get())
    }

    pub fn link_type(&self) -> LinkType {
        LinkType::from_f64(self.control_link_type.get()).unwrap_or_default()
    }

    pub fn link_inversed(&self) -> bool {
        self.control_link_inverse.to_bool()
    }

    /// Last meta value received, bound or not
    pub fn meta_value(&self) -> f64 {
        self.meta_value
    }

    pub fn soft_takeover(&self) -> &SoftTakeover {
        &self.soft_takeover
    }

    /// Bind to the effect's parameter at this slot's index. Slots past the
    /// effect's parameter count stay unbound.
    pub fn load_effect(&mut self, effect: &EffectPointer) {
        self.clear();
        let Some(parameter) = effect.knob_parameter(self.index) else {
            return;
        };
        let manifest = parameter.manifest();
        self.control_loaded.force_set(1.0);
        self.control_type.force_set(scaler_code(manifest.scaler));
        self.control_value.force_set(parameter.value());
        self.control_link_type.force_set(manifest.default_link_type.as_f64());
        self.control_link_inverse
            .force_set(bool_value(manifest.default_link_inversion));
        self.soft_takeover.sync(parameter.normalized());
        trace!(index = self.index, parameter = %manifest.id, "Parameter slot bound");
        self.effect = Some(EffectPointer::clone(effect));
    }

    /// Unbind and reset every control to its default
    pub fn clear(&mut self) {
        self.effect = None;
        self.soft_takeover.reset();
        self.control_loaded.force_set(0.0);
        self.control_type.force_set(0.0);
        self.control_value.reset();
        self.control_link_type.force_set(LinkType::None.as_f64());
        self.control_link_inverse.force_set(0.0);
    }

    /// Follow the effect slot's meta parameter.
    ///
    /// The meta value goes through the link mapping first. Unforced writes
    /// are subject to soft takeover; forced writes go through and re-sync
    /// the tracker.
    pub fn on_effect_meta_parameter_changed(&mut self, meta: f64, force: bool) {
        self.meta_value = meta;
        let link_type = self.link_type();
        let inversed = self.link_inversed();
        let Some(parameter) = self
            .effect
            .as_ref()
            .and_then(|effect| effect.knob_parameter(self.index))
        else {
            return;
        };
        let Some(position) = link_type.map(meta, parameter.neutral_point_on_scale(), inversed) else {
            return;
        };

        if force {
            self.soft_takeover.sync(position);
        } else if self.soft_takeover.ignore(position) {
            return;
        }

        let value = parameter.set_normalized(position);
        self.control_value.force_set(value);
        trace!(index = self.index, meta, position, value, "Meta parameter applied");
    }

    /// Operator write to the parameter value. Returns the stored value.
    pub fn set_value(&mut self, value: f64) -> Option<f64> {
        let parameter = self
            .effect
            .as_ref()
            .and_then(|effect| effect.knob_parameter(self.index))?;
        if !value.is_finite() {
            warn!(index = self.index, value, "Ignoring non-finite parameter value");
            return None;
        }
        let stored = parameter.set_value(value);
        self.soft_takeover.sync(parameter.normalized());
        self.control_value.force_set(stored);
        Some(stored)
    }

    pub fn set_link_type(&mut self, link_type: LinkType) {
        if self.is_loaded() {
            debug!(index = self.index, %link_type, "Link type changed");
            self.control_link_type.force_set(link_type.as_f64());
        }
    }

    pub fn set_link_inversion(&mut self, inversed: bool) {
        if self.is_loaded() {
            self.control_link_inverse.force_set(bool_value(inversed));
        }
    }

    /// Re-prime soft takeover at the value currently published on the control
    pub fn sync_soft_takeover(&mut self) {
        if let Some(parameter) = self.parameter() {
            let position = parameter.to_normalized(self.control_value.get());
            self.soft_takeover.sync(position);
        }
    }

    pub fn to_document(&self) -> KnobParameterDocument {
        if !self.is_loaded() {
            return KnobParameterDocument::default();
        }
        KnobParameterDocument {
            value: Some(self.control_value.get()),
            link_type: Some(self.link_type()),
            link_inversed: Some(self.link_inversed()),
        }
    }

    /// Restore saved values. Unbound slots and empty fields are skipped.
    pub fn load_from_document(&mut self, document: &KnobParameterDocument) {
        if !self.is_loaded() {
            return;
        }
        if let Some(value) = document.value {
            self.set_value(value);
        }
        if let Some(link_type) = document.link_type {
            self.set_link_type(link_type);
        }
        if let Some(inversed) = document.link_inversed {
            self.set_link_inversion(inversed);
        }
    }
}

fn scaler_code(scaler: ValueScaler) -> f64 {
    match scaler {
        ValueScaler::Linear => 1.0,
        ValueScaler::Logarithmic => 2.0,
        ValueScaler::Integral => 3.0,
    }
}

fn bool_value(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
