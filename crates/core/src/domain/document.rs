//! Persisted parameter state
//!
//! An `Effect` record carries the effect identity and one entry per slot,
//! positional by slot index. Entries and their fields are optional: a missing
//! or malformed field leaves the corresponding slot untouched on restore.

use crate::domain::effect::LinkType;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocumentError>;

/// Errors at the text boundary of a document
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Text encodings understood for documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Toml,
    Json,
}

impl DocumentFormat {
    pub fn render<T: Serialize>(self, document: &T) -> Result<String> {
        Ok(match self {
            DocumentFormat::Toml => toml::to_string_pretty(document)?,
            DocumentFormat::Json => serde_json::to_string_pretty(document)?,
        })
    }

    pub fn parse<T: for<'de> Deserialize<'de>>(self, text: &str) -> Result<T> {
        Ok(match self {
            DocumentFormat::Toml => toml::from_str(text)?,
            DocumentFormat::Json => serde_json::from_str(text)?,
        })
    }
}

/// Saved state of one effect slot's parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "Effect", rename_all = "PascalCase")]
pub struct EffectDocument {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub parameters: ParametersDocument,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParametersDocument {
    #[serde(default)]
    pub knob_parameters: Vec<KnobParameterDocument>,
    #[serde(default)]
    pub button_parameters: Vec<ButtonParameterDocument>,
}

/// One knob slot. All fields empty for an unbound slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KnobParameterDocument {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub link_type: Option<LinkType>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub link_inversed: Option<bool>,
}

impl KnobParameterDocument {
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.link_type.is_none() && self.link_inversed.is_none()
    }
}

/// One button slot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ButtonParameterDocument {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// Saved state of a whole rack
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RackDocument {
    #[serde(default)]
    pub chains: Vec<ChainDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChainDocument {
    pub number: usize,
    #[serde(default)]
    pub super_parameter: f64,
    #[serde(default)]
    pub slots: Vec<SlotDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SlotDocument {
    pub number: usize,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub meta_parameter: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<EffectDocument>,
}

/// Accept a field of the wrong shape as absent instead of failing the document
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient<T> {
        Valid(T),
        Invalid(serde::de::IgnoredAny),
    }

    Ok(match Lenient::<T>::deserialize(deserializer)? {
        Lenient::Valid(value) => Some(value),
        Lenient::Invalid(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EffectDocument {
        EffectDocument {
            id: "org.fxrack.effects.echo".to_string(),
            version: "1.1".to_string(),
            parameters: ParametersDocument {
                knob_parameters: vec![
                    KnobParameterDocument {
                        value: Some(0.5),
                        link_type: Some(LinkType::LinkedLeft),
                        link_inversed: Some(true),
                    },
                    KnobParameterDocument::default(),
                ],
                button_parameters: vec![ButtonParameterDocument { value: Some(1.0) }],
            },
        }
    }

    #[test]
    fn test_toml_field_names() {
        let text = DocumentFormat::Toml.render(&sample()).unwrap();
        assert!(text.contains("Id = \"org.fxrack.effects.echo\""));
        assert!(text.contains("Version = \"1.1\""));
        assert!(text.contains("KnobParameters"));
        assert!(text.contains("ButtonParameters"));
        assert!(text.contains("LinkType = \"LinkedLeft\""));

        let parsed: EffectDocument = DocumentFormat::Toml.parse(&text).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_json_parse() {
        let text = r#"{
            "Id": "org.fxrack.effects.filter",
            "Version": "1.0",
            "Parameters": {
                "KnobParameters": [{ "Value": 440 }, {}],
                "ButtonParameters": []
            }
        }"#;
        let parsed: EffectDocument = DocumentFormat::Json.parse(text).unwrap();
        assert_eq!(parsed.parameters.knob_parameters[0].value, Some(440.0));
        assert!(parsed.parameters.knob_parameters[1].is_empty());
    }

    #[test]
    fn test_missing_parameters_block() {
        let text = "Id = \"a\"\nVersion = \"1\"\n";
        let parsed: EffectDocument = DocumentFormat::Toml.parse(text).unwrap();
        assert!(parsed.parameters.knob_parameters.is_empty());
        assert!(parsed.parameters.button_parameters.is_empty());
    }

    #[test]
    fn test_malformed_fields_are_dropped() {
        let text = r#"{
            "Id": "a",
            "Version": "1",
            "Parameters": {
                "KnobParameters": [
                    { "Value": "loud", "LinkType": "Sideways", "LinkInversed": true }
                ]
            }
        }"#;
        let parsed: EffectDocument = DocumentFormat::Json.parse(text).unwrap();
        let knob = &parsed.parameters.knob_parameters[0];
        assert_eq!(knob.value, None);
        assert_eq!(knob.link_type, None);
        assert_eq!(knob.link_inversed, Some(true));
    }

    #[test]
    fn test_truncated_text_is_an_error() {
        let result: Result<RackDocument> = DocumentFormat::Toml.parse("[[Chains]\nNumber = ");
        assert!(matches!(result, Err(DocumentError::TomlParse(_))));
    }

    #[test]
    fn test_rack_document_toml_round_trip() {
        let rack = RackDocument {
            chains: vec![ChainDocument {
                number: 0,
                super_parameter: 0.25,
                slots: vec![
                    SlotDocument {
                        number: 0,
                        enabled: true,
                        meta_parameter: 0.75,
                        effect: Some(sample()),
                    },
                    SlotDocument {
                        number: 1,
                        enabled: false,
                        meta_parameter: 0.0,
                        effect: None,
                    },
                ],
            }],
        };

        let text = DocumentFormat::Toml.render(&rack).unwrap();
        let parsed: RackDocument = DocumentFormat::Toml.parse(&text).unwrap();
        assert_eq!(parsed, rack);
    }
}
