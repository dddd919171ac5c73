//! Catalog of available effects
//!
//! Ordered list of manifests. Navigation wraps around in both directions.

use crate::domain::effect::{
    Effect, EffectButtonParameterManifest, EffectKnobParameterManifest, EffectManifest,
    EffectPointer, LinkType, ValueScaler,
};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct EffectCatalog {
    manifests: Vec<Arc<EffectManifest>>,
}

impl EffectCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the effects shipped with fxrack
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(filter_manifest());
        catalog.register(echo_manifest());
        catalog.register(flanger_manifest());
        catalog.register(bitcrusher_manifest());
        catalog.register(reverb_manifest());
        catalog
    }

    /// Add a manifest. A manifest with the same id replaces the old one in place.
    pub fn register(&mut self, manifest: EffectManifest) {
        let manifest = Arc::new(manifest);
        match self.position(&manifest.id) {
            Some(index) => self.manifests[index] = manifest,
            None => {
                debug!(effect = %manifest.id, "Registered effect");
                self.manifests.push(manifest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    pub fn manifests(&self) -> impl Iterator<Item = &Arc<EffectManifest>> {
        self.manifests.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<EffectManifest>> {
        self.manifests.iter().find(|manifest| manifest.id == id)
    }

    /// Create a fresh instance of `id`
    pub fn instantiate(&self, id: &str) -> Option<EffectPointer> {
        self.get(id).map(|manifest| Effect::shared(Arc::clone(manifest)))
    }

    /// Manifest after `current`, or the first one when nothing is loaded
    pub fn next_after(&self, current: Option<&str>) -> Option<&Arc<EffectManifest>> {
        if self.manifests.is_empty() {
            return None;
        }
        let index = match current.and_then(|id| self.position(id)) {
            Some(index) => (index + 1) % self.manifests.len(),
            None => 0,
        };
        self.manifests.get(index)
    }

    /// Manifest before `current`, or the last one when nothing is loaded
    pub fn previous_before(&self, current: Option<&str>) -> Option<&Arc<EffectManifest>> {
        if self.manifests.is_empty() {
            return None;
        }
        let len = self.manifests.len();
        let index = match current.and_then(|id| self.position(id)) {
            Some(index) => (index + len - 1) % len,
            None => len - 1,
        };
        self.manifests.get(index)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.manifests.iter().position(|manifest| manifest.id == id)
    }
}

fn filter_manifest() -> EffectManifest {
    EffectManifest::new("org.fxrack.effects.filter", "1.0", "Filter")
        .with_knob(
            EffectKnobParameterManifest::new("lpf", "Low Pass Cutoff", 16.0, 22050.0, 22050.0)
                .with_scaler(ValueScaler::Logarithmic)
                .with_link(LinkType::LinkedLeft, true),
        )
        .with_knob(EffectKnobParameterManifest::new("q", "Resonance", 0.4, 4.0, 0.707))
        .with_knob(
            EffectKnobParameterManifest::new("hpf", "High Pass Cutoff", 16.0, 22050.0, 16.0)
                .with_scaler(ValueScaler::Logarithmic)
                .with_link(LinkType::LinkedRight, false),
        )
}

fn echo_manifest() -> EffectManifest {
    EffectManifest::new("org.fxrack.effects.echo", "1.1", "Echo")
        .with_knob(
            EffectKnobParameterManifest::new("delay_time", "Time", 0.0, 2.0, 0.25)
                .with_link(LinkType::None, false),
        )
        .with_knob(
            EffectKnobParameterManifest::new("feedback", "Feedback", 0.0, 1.0, 0.5)
                .with_link(LinkType::Linked, false),
        )
        .with_knob(
            EffectKnobParameterManifest::new("send", "Send", 0.0, 1.0, 1.0)
                .with_link(LinkType::Linked, false),
        )
        .with_knob(EffectKnobParameterManifest::new("pingpong", "Ping Pong", 0.0, 1.0, 0.0))
        .with_button(EffectButtonParameterManifest::toggle("quantize", "Quantize", true))
        .with_button(EffectButtonParameterManifest::toggle("triplet", "Triplets", false))
}

fn flanger_manifest() -> EffectManifest {
    EffectManifest::new("org.fxrack.effects.flanger", "1.0", "Flanger")
        .with_knob(
            EffectKnobParameterManifest::new("speed", "Speed", 0.05, 10.0, 0.5)
                .with_scaler(ValueScaler::Logarithmic),
        )
        .with_knob(
            EffectKnobParameterManifest::new("width", "Width", 0.0, 1.0, 0.5)
                .with_link(LinkType::Linked, false),
        )
        .with_knob(
            EffectKnobParameterManifest::new("regen", "Regeneration", 0.0, 1.0, 0.25)
                .with_link(LinkType::Linked, false),
        )
        .with_knob(EffectKnobParameterManifest::new("mix", "Mix", 0.0, 1.0, 1.0))
        .with_button(EffectButtonParameterManifest::toggle("tripletize", "Triplets", false))
}

fn bitcrusher_manifest() -> EffectManifest {
    EffectManifest::new("org.fxrack.effects.bitcrusher", "1.0", "Bitcrusher")
        .with_knob(
            EffectKnobParameterManifest::new("bit_depth", "Bit Depth", 1.0, 16.0, 16.0)
                .with_scaler(ValueScaler::Integral)
                .with_link(LinkType::Linked, true),
        )
        .with_knob(
            EffectKnobParameterManifest::new("downsample", "Downsampling", 0.0, 0.9999, 1.0)
                .with_link(LinkType::Linked, true),
        )
}

fn reverb_manifest() -> EffectManifest {
    EffectManifest::new("org.fxrack.effects.reverb", "1.0", "Reverb")
        .with_knob(
            EffectKnobParameterManifest::new("decay", "Decay", 0.0, 1.0, 0.5)
                .with_link(LinkType::Linked, false),
        )
        .with_knob(EffectKnobParameterManifest::new("bandwidth", "Bandwidth", 0.0, 1.0, 0.5))
        .with_knob(EffectKnobParameterManifest::new("damping", "Damping", 0.0, 1.0, 0.5))
        .with_knob(
            EffectKnobParameterManifest::new("send", "Send", 0.0, 1.0, 0.0)
                .with_link(LinkType::Linked, false),
        )
}
