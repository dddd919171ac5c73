//! Effect manifests and shared effect instances
//!
//! An [`Effect`] is the parameter-side face of a loaded DSP unit: its
//! manifest plus atomic storage for every knob and button value. The control
//! thread writes, the audio thread reads. Processing itself lives elsewhere.

use crate::domain::control::AtomicValue;
use crossbeam::channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Shared handle to a loaded effect
pub type EffectPointer = Arc<Effect>;

/// How a normalized [0, 1] position maps onto a parameter's range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValueScaler {
    #[default]
    Linear,
    /// Equal ratios per step. Falls back to linear when the range touches zero.
    Logarithmic,
    /// Linear, rounded to whole numbers
    Integral,
}

impl ValueScaler {
    pub fn denormalize(self, normalized: f64, minimum: f64, maximum: f64) -> f64 {
        let normalized = normalized.clamp(0.0, 1.0);
        match self {
            ValueScaler::Logarithmic if minimum > 0.0 && maximum > minimum => {
                minimum * (maximum / minimum).powf(normalized)
            }
            ValueScaler::Integral => (minimum + normalized * (maximum - minimum)).round(),
            _ => minimum + normalized * (maximum - minimum),
        }
    }

    pub fn normalize(self, value: f64, minimum: f64, maximum: f64) -> f64 {
        if maximum <= minimum {
            return 0.0;
        }
        let value = value.clamp(minimum, maximum);
        let normalized = match self {
            ValueScaler::Logarithmic if minimum > 0.0 => {
                (value / minimum).ln() / (maximum / minimum).ln()
            }
            _ => (value - minimum) / (maximum - minimum),
        };
        normalized.clamp(0.0, 1.0)
    }
}

/// How a knob parameter follows its slot's meta parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkType {
    /// Not linked, the meta parameter leaves it alone
    #[default]
    None,
    /// Follows the whole meta range, split at the neutral point
    Linked,
    /// Sweeps on the left half of the meta range only
    LinkedLeft,
    /// Sweeps on the right half of the meta range only
    LinkedRight,
    /// Sweeps away from the center on both halves
    LinkedLeftRight,
}

impl LinkType {
    pub const ALL: [LinkType; 5] = [
        LinkType::None,
        LinkType::Linked,
        LinkType::LinkedLeft,
        LinkType::LinkedRight,
        LinkType::LinkedLeftRight,
    ];

    /// Value published on the `_link_type` control
    pub fn as_f64(self) -> f64 {
        match self {
            LinkType::None => 0.0,
            LinkType::Linked => 1.0,
            LinkType::LinkedLeft => 2.0,
            LinkType::LinkedRight => 3.0,
            LinkType::LinkedLeftRight => 4.0,
        }
    }

    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        Self::ALL.get(value.round() as usize).copied()
    }

    /// Map a meta position in [0, 1] to the linked parameter's normalized
    /// position. `neutral` is the parameter's neutral point on its scale.
    /// Returns `None` when the parameter is not linked.
    pub fn map(self, meta: f64, neutral: f64, inverted: bool) -> Option<f64> {
        let meta = meta.clamp(0.0, 1.0);
        let position = match self {
            LinkType::None => return None,
            LinkType::Linked => {
                // The neutral point stays put under inversion
                let neutral = if inverted { 1.0 - neutral } else { neutral };
                if neutral > 0.0 && neutral < 1.0 {
                    if meta <= 0.5 {
                        meta / 0.5 * neutral
                    } else {
                        neutral + (meta - 0.5) / 0.5 * (1.0 - neutral)
                    }
                } else {
                    meta
                }
            }
            LinkType::LinkedLeft => {
                if meta >= 0.5 {
                    0.0
                } else {
                    1.0 - meta * 2.0
                }
            }
            LinkType::LinkedRight => {
                if meta >= 0.5 {
                    (meta - 0.5) * 2.0
                } else {
                    0.0
                }
            }
            LinkType::LinkedLeftRight => {
                if meta >= 0.5 {
                    (meta - 0.5) * 2.0
                } else {
                    1.0 - meta * 2.0
                }
            }
        };
        Some(if inverted { 1.0 - position } else { position })
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkType::None => "none",
            LinkType::Linked => "linked",
            LinkType::LinkedLeft => "linked-left",
            LinkType::LinkedRight => "linked-right",
            LinkType::LinkedLeftRight => "linked-left-right",
        };
        f.write_str(name)
    }
}

/// Description of a continuous parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectKnobParameterManifest {
    pub id: String,
    pub name: String,
    pub minimum: f64,
    pub maximum: f64,
    pub default: f64,
    #[serde(default)]
    pub scaler: ValueScaler,
    /// Position in [0, 1] where the parameter has no audible effect
    #[serde(default)]
    pub neutral_point_on_scale: f64,
    #[serde(default)]
    pub default_link_type: LinkType,
    #[serde(default)]
    pub default_link_inversion: bool,
}

impl EffectKnobParameterManifest {
    pub fn new(id: &str, name: &str, minimum: f64, maximum: f64, default: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            minimum,
            maximum,
            default: default.clamp(minimum, maximum),
            scaler: ValueScaler::Linear,
            neutral_point_on_scale: 0.0,
            default_link_type: LinkType::None,
            default_link_inversion: false,
        }
    }

    pub fn with_scaler(mut self, scaler: ValueScaler) -> Self {
        self.scaler = scaler;
        self
    }

    pub fn with_neutral_point(mut self, neutral: f64) -> Self {
        self.neutral_point_on_scale = neutral.clamp(0.0, 1.0);
        self
    }

    pub fn with_link(mut self, link_type: LinkType, inverted: bool) -> Self {
        self.default_link_type = link_type;
        self.default_link_inversion = inverted;
        self
    }
}

/// Description of a discrete parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectButtonParameterManifest {
    pub id: String,
    pub name: String,
    /// Number of positions, 2 for an on/off switch
    pub steps: u32,
    pub default: f64,
}

impl EffectButtonParameterManifest {
    pub fn new(id: &str, name: &str, steps: u32, default: f64) -> Self {
        let steps = steps.max(2);
        Self {
            id: id.to_string(),
            name: name.to_string(),
            steps,
            default: default.clamp(0.0, f64::from(steps - 1)).round(),
        }
    }

    pub fn toggle(id: &str, name: &str, default_on: bool) -> Self {
        Self::new(id, name, 2, if default_on { 1.0 } else { 0.0 })
    }
}

/// Identity and parameter layout of an effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectManifest {
    pub id: String,
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub knob_parameters: Vec<EffectKnobParameterManifest>,
    #[serde(default)]
    pub button_parameters: Vec<EffectButtonParameterManifest>,
}

impl EffectManifest {
    pub fn new(id: &str, version: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            name: name.to_string(),
            knob_parameters: Vec::new(),
            button_parameters: Vec::new(),
        }
    }

    pub fn with_knob(mut self, parameter: EffectKnobParameterManifest) -> Self {
        self.knob_parameters.push(parameter);
        self
    }

    pub fn with_button(mut self, parameter: EffectButtonParameterManifest) -> Self {
        self.button_parameters.push(parameter);
        self
    }
}

/// Live storage for one continuous parameter
#[derive(Debug)]
pub struct EffectKnobParameter {
    manifest: EffectKnobParameterManifest,
    value: AtomicValue,
}

impl EffectKnobParameter {
    fn new(manifest: EffectKnobParameterManifest) -> Self {
        let value = AtomicValue::new(manifest.default);
        Self { manifest, value }
    }

    pub fn manifest(&self) -> &EffectKnobParameterManifest {
        &self.manifest
    }

    pub fn minimum(&self) -> f64 {
        self.manifest.minimum
    }

    pub fn maximum(&self) -> f64 {
        self.manifest.maximum
    }

    pub fn neutral_point_on_scale(&self) -> f64 {
        self.manifest.neutral_point_on_scale
    }

    /// Current value, read by the audio thread
    #[inline]
    pub fn value(&self) -> f64 {
        self.value.load()
    }

    /// Store a value, clamped to the parameter range. Returns the stored value.
    pub fn set_value(&self, value: f64) -> f64 {
        let value = value.clamp(self.manifest.minimum, self.manifest.maximum);
        if self.manifest.scaler == ValueScaler::Integral {
            self.value.store(value.round());
        } else {
            self.value.store(value);
        }
        self.value()
    }

    /// Current position in [0, 1]
    pub fn normalized(&self) -> f64 {
        self.manifest
            .scaler
            .normalize(self.value(), self.manifest.minimum, self.manifest.maximum)
    }

    pub fn to_normalized(&self, value: f64) -> f64 {
        self.manifest
            .scaler
            .normalize(value, self.manifest.minimum, self.manifest.maximum)
    }

    /// Store a position in [0, 1]. Returns the stored value.
    pub fn set_normalized(&self, normalized: f64) -> f64 {
        let value =
            self.manifest
                .scaler
                .denormalize(normalized, self.manifest.minimum, self.manifest.maximum);
        self.set_value(value)
    }
}

/// Live storage for one discrete parameter
#[derive(Debug)]
pub struct EffectButtonParameter {
    manifest: EffectButtonParameterManifest,
    value: AtomicValue,
}

impl EffectButtonParameter {
    fn new(manifest: EffectButtonParameterManifest) -> Self {
        let value = AtomicValue::new(manifest.default);
        Self { manifest, value }
    }

    pub fn manifest(&self) -> &EffectButtonParameterManifest {
        &self.manifest
    }

    pub fn steps(&self) -> u32 {
        self.manifest.steps
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value.load()
    }

    /// Store a step, rounded and clamped to `0..steps`. Returns the stored value.
    pub fn set_value(&self, value: f64) -> f64 {
        let max_step = f64::from(self.manifest.steps - 1);
        let value = if value.is_finite() {
            value.round().clamp(0.0, max_step)
        } else {
            self.manifest.default
        };
        self.value.store(value);
        value
    }
}

/// A loaded effect instance
///
/// Shared between the control thread and the audio thread. All mutation goes
/// through atomics, so `&self` methods are enough.
#[derive(Debug)]
pub struct Effect {
    manifest: Arc<EffectManifest>,
    enabled: AtomicBool,
    knob_parameters: Vec<EffectKnobParameter>,
    button_parameters: Vec<EffectButtonParameter>,
    enabled_listeners: Mutex<Vec<Sender<bool>>>,
}

impl Effect {
    /// Instantiate an effect from its manifest. Effects start disabled.
    pub fn new(manifest: Arc<EffectManifest>) -> Self {
        let knob_parameters = manifest
            .knob_parameters
            .iter()
            .cloned()
            .map(EffectKnobParameter::new)
            .collect();
        let button_parameters = manifest
            .button_parameters
            .iter()
            .cloned()
            .map(EffectButtonParameter::new)
            .collect();
        Self {
            manifest,
            enabled: AtomicBool::new(false),
            knob_parameters,
            button_parameters,
            enabled_listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn shared(manifest: Arc<EffectManifest>) -> EffectPointer {
        Arc::new(Self::new(manifest))
    }

    pub fn manifest(&self) -> &EffectManifest {
        &self.manifest
    }

    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn num_knob_parameters(&self) -> usize {
        self.knob_parameters.len()
    }

    pub fn num_button_parameters(&self) -> usize {
        self.button_parameters.len()
    }

    pub fn knob_parameter(&self, index: usize) -> Option<&EffectKnobParameter> {
        self.knob_parameters.get(index)
    }

    pub fn button_parameter(&self, index: usize) -> Option<&EffectButtonParameter> {
        self.button_parameters.get(index)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enable or disable processing, notifying subscribers on change
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::AcqRel);
        if previous == enabled {
            return;
        }
        debug!(effect = %self.manifest.id, enabled, "Effect enabled changed");
        let mut listeners = self
            .enabled_listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Dropped receivers unsubscribe themselves
        listeners.retain(|listener| listener.send(enabled).is_ok());
        trace!(listeners = listeners.len(), "Enabled change delivered");
    }

    /// Subscribe to enabled changes. Dropping the receiver unsubscribes.
    pub fn subscribe_enabled(&self) -> Receiver<bool> {
        let (tx, rx) = channel::unbounded();
        self.enabled_listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        rx
    }
}
