//! Domain entities and business rules

pub mod catalog;
pub mod config;
pub mod control;
pub mod document;
pub mod effect;
pub mod effect_slot;
pub mod rack;
pub mod soft_takeover;

/// Hard cap on the knob and button parameter slots of one effect slot
pub const MAX_PARAMETER_SLOTS: usize = 16;

// Re-export specific items to avoid ambiguous glob imports
pub use catalog::EffectCatalog;
pub use config::{AppConfig, ConfigError, ConfigManager, FxRackConfig, RackConfig, StateStore};
pub use control::{ButtonMode, ConfigKey, ControlHandle, ControlObject, ControlOptions, ControlRegistry};
pub use document::{
    ButtonParameterDocument, ChainDocument, DocumentError, DocumentFormat, EffectDocument,
    KnobParameterDocument, ParametersDocument, RackDocument, SlotDocument,
};
pub use effect::{
    Effect, EffectButtonParameterManifest, EffectKnobParameterManifest, EffectManifest,
    EffectPointer, LinkType, ValueScaler,
};
pub use effect_slot::{
    EffectButtonParameterSlot, EffectParameterSlot, EffectSlot, EffectSlotEvent, EffectSlotState,
    EngineEffectSlot,
};
pub use rack::{Command, CommandExecutor, CommandResult, EffectChain, EffectRack, RackError};
pub use soft_takeover::{SoftTakeover, DEFAULT_TAKEOVER_THRESHOLD};
