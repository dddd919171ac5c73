//! Published control values
//!
//! A control is a named scalar written by the control thread and read by
//! anyone else (audio thread, UI, controller mappings). Values live in
//! cache-padded atomics so readers never take a lock.

use crossbeam::utils::CachePadded;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{trace, warn};

/// Address of a control: the group it belongs to plus its item name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    pub group: String,
    pub item: String,
}

impl ConfigKey {
    pub fn new(group: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            item: item.into(),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.group, self.item)
    }
}

/// Press semantics for button-like controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonMode {
    /// Momentary: value follows the press
    #[default]
    Push,
    /// Each press flips the value
    Toggle,
    /// Short press toggles, long press acts momentarily
    PowerWindow,
}

/// Behavior flags of a control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlOptions {
    /// External writes are rejected; only the owner can `force_set`
    pub read_only: bool,
    /// Writes equal to the current value do not count as a change
    pub ignore_no_ops: bool,
    pub button_mode: Option<ButtonMode>,
    pub default_value: f64,
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            ignore_no_ops: true,
            button_mode: None,
            default_value: 0.0,
        }
    }
}

impl ControlOptions {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    /// Buttons report every press, including repeated ones
    pub fn button(mode: ButtonMode) -> Self {
        Self {
            ignore_no_ops: false,
            button_mode: Some(mode),
            ..Self::default()
        }
    }

    /// Every write is reported, even when the value does not change
    pub fn ticker() -> Self {
        Self {
            ignore_no_ops: false,
            ..Self::default()
        }
    }

    pub fn with_default(mut self, default_value: f64) -> Self {
        self.default_value = default_value;
        self
    }
}

/// Lock-free f64 cell
///
/// Stores the bit pattern in an `AtomicU64`. Single writer, many readers.
#[derive(Debug)]
pub struct AtomicValue(CachePadded<AtomicU64>);

impl AtomicValue {
    pub fn new(value: f64) -> Self {
        Self(CachePadded::new(AtomicU64::new(value.to_bits())))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Read side of a control, cheap to clone and safe to share across threads
#[derive(Debug, Clone)]
pub struct ControlHandle {
    key: Arc<ConfigKey>,
    value: Arc<AtomicValue>,
}

impl ControlHandle {
    pub fn key(&self) -> &ConfigKey {
        &self.key
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.value.load()
    }

    pub fn to_bool(&self) -> bool {
        self.get() > 0.0
    }
}

/// Write side of a control, owned by the component that created it
#[derive(Debug)]
pub struct ControlObject {
    handle: ControlHandle,
    options: ControlOptions,
}

impl ControlObject {
    /// Create a control and publish it in `registry`
    pub fn new(key: ConfigKey, options: ControlOptions, registry: &ControlRegistry) -> Self {
        let handle = ControlHandle {
            key: Arc::new(key),
            value: Arc::new(AtomicValue::new(options.default_value)),
        };
        registry.register(handle.clone());
        Self { handle, options }
    }

    pub fn key(&self) -> &ConfigKey {
        self.handle.key()
    }

    pub fn options(&self) -> &ControlOptions {
        &self.options
    }

    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.handle.get()
    }

    pub fn to_bool(&self) -> bool {
        self.handle.to_bool()
    }

    pub fn default_value(&self) -> f64 {
        self.options.default_value
    }

    /// External write. Returns whether the write counts as a change that the
    /// owner should react to.
    pub fn set(&self, value: f64) -> bool {
        if self.options.read_only {
            warn!(control = %self.key(), value, "Rejected write to read-only control");
            return false;
        }
        if self.options.ignore_no_ops && self.get() == value {
            return false;
        }
        self.publish(value);
        true
    }

    /// Button press from a controller or UI. Toggle-like buttons flip their
    /// value, momentary buttons go to 1. Returns the resulting value.
    pub fn press(&self) -> Option<f64> {
        let value = match self.options.button_mode {
            Some(ButtonMode::Toggle) | Some(ButtonMode::PowerWindow) => {
                if self.to_bool() {
                    0.0
                } else {
                    1.0
                }
            }
            Some(ButtonMode::Push) | None => 1.0,
        };
        self.set(value).then_some(value)
    }

    /// Owner write, bypasses read-only
    pub fn force_set(&self, value: f64) {
        self.publish(value);
    }

    pub fn reset(&self) {
        self.publish(self.options.default_value);
    }

    fn publish(&self, value: f64) {
        trace!(control = %self.key(), value, "Publish");
        self.handle.value.store(value);
    }
}

/// Directory of every published control, keyed by group and item
///
/// Cloning shares the same directory. Registration happens on the control
/// thread at construction time; lookups hand out read handles.
#[derive(Debug, Clone, Default)]
pub struct ControlRegistry {
    controls: Arc<Mutex<HashMap<ConfigKey, ControlHandle>>>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, handle: ControlHandle) {
        let mut controls = self
            .controls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if controls.insert(handle.key().clone(), handle).is_some() {
            warn!("Control registered twice, previous handle replaced");
        }
    }

    /// Look up a control by address
    pub fn get(&self, group: &str, item: &str) -> Option<ControlHandle> {
        let controls = self
            .controls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        controls.get(&ConfigKey::new(group, item)).cloned()
    }

    /// Current value of a control, if it exists
    pub fn value(&self, group: &str, item: &str) -> Option<f64> {
        self.get(group, item).map(|handle| handle.get())
    }

    pub fn len(&self) -> usize {
        self.controls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
