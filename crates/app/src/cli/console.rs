//! Line-oriented control console
//!
//! Positions typed by the user count from 1, like the control group names.

use fxrack_core::domain::{Command, EffectCatalog, EffectRack, LinkType};
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Unknown command: {0} (try `help`)")]
    UnknownCommand(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Positions count from 1")]
    ZeroPosition,

    #[error("Unknown link type: {0}")]
    UnknownLinkType(String),
}

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Command(Command),
    Show,
    Save,
    Help,
    Quit,
    Empty,
}

pub const HELP: &str = "\
Commands (chain, slot and parameter positions count from 1):
  load <chain> <slot> <effect>         load an effect by id or short name
  clear <chain> <slot>                 empty a slot
  next <chain> <slot>                  load the next effect of the catalog
  prev <chain> <slot>                  load the previous effect of the catalog
  enable <chain> <slot> on|off         enable or disable a slot
  meta <chain> <slot> <0..1>           set a slot's meta parameter
  super <chain> <0..1>                 set a chain's superknob
  param <chain> <slot> <n> <value>     set a knob parameter
  link <chain> <slot> <n> <type> [inverse]
                                       none, linked, linked-left, linked-right, linked-left-right
  button <chain> <slot> <n> <value>    set a button parameter
  show                                 print the rack
  save                                 write the rack state
  quit                                 leave the console";

pub fn parse_line(line: &str) -> Result<ConsoleInput, ParseError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&name, args)) = words.split_first() else {
        return Ok(ConsoleInput::Empty);
    };

    let command = match name {
        "show" => return Ok(ConsoleInput::Show),
        "save" => return Ok(ConsoleInput::Save),
        "help" | "?" => return Ok(ConsoleInput::Help),
        "quit" | "exit" => return Ok(ConsoleInput::Quit),
        "load" => {
            let [chain, slot, effect_id] = exact::<3>(args, "load <chain> <slot> <effect>")?;
            Command::LoadEffect {
                chain: position(chain)?,
                slot: position(slot)?,
                effect_id: effect_id.to_string(),
            }
        }
        "clear" => {
            let [chain, slot] = exact::<2>(args, "clear <chain> <slot>")?;
            Command::ClearEffect {
                chain: position(chain)?,
                slot: position(slot)?,
            }
        }
        "next" => {
            let [chain, slot] = exact::<2>(args, "next <chain> <slot>")?;
            Command::NextEffect {
                chain: position(chain)?,
                slot: position(slot)?,
            }
        }
        "prev" => {
            let [chain, slot] = exact::<2>(args, "prev <chain> <slot>")?;
            Command::PrevEffect {
                chain: position(chain)?,
                slot: position(slot)?,
            }
        }
        "enable" => {
            let usage = "enable <chain> <slot> on|off";
            let [chain, slot, state] = exact::<3>(args, usage)?;
            let enabled = match state {
                "on" | "1" | "true" => true,
                "off" | "0" | "false" => false,
                _ => return Err(ParseError::Usage(usage)),
            };
            Command::SetEnabled {
                chain: position(chain)?,
                slot: position(slot)?,
                enabled,
            }
        }
        "meta" => {
            let [chain, slot, value] = exact::<3>(args, "meta <chain> <slot> <0..1>")?;
            Command::SetMetaParameter {
                chain: position(chain)?,
                slot: position(slot)?,
                value: number(value)?,
            }
        }
        "super" => {
            let [chain, value] = exact::<2>(args, "super <chain> <0..1>")?;
            Command::SetSuperParameter {
                chain: position(chain)?,
                value: number(value)?,
            }
        }
        "param" => {
            let [chain, slot, index, value] = exact::<4>(args, "param <chain> <slot> <n> <value>")?;
            Command::SetParameter {
                chain: position(chain)?,
                slot: position(slot)?,
                index: position(index)?,
                value: number(value)?,
            }
        }
        "link" => {
            let usage = "link <chain> <slot> <n> <type> [inverse]";
            let (chain, slot, index, link_type, inversed) = match args {
                [chain, slot, index, link_type] => (chain, slot, index, link_type, false),
                [chain, slot, index, link_type, "inverse"] => (chain, slot, index, link_type, true),
                _ => return Err(ParseError::Usage(usage)),
            };
            Command::SetLink {
                chain: position(chain)?,
                slot: position(slot)?,
                index: position(index)?,
                link_type: parse_link_type(link_type)?,
                inversed,
            }
        }
        "button" => {
            let [chain, slot, index, value] = exact::<4>(args, "button <chain> <slot> <n> <value>")?;
            Command::SetButtonParameter {
                chain: position(chain)?,
                slot: position(slot)?,
                index: position(index)?,
                value: number(value)?,
            }
        }
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(ConsoleInput::Command(command))
}

/// Accept a full effect id or the last segment of one
pub fn resolve_effect_id(catalog: &EffectCatalog, name: &str) -> String {
    if catalog.get(name).is_some() {
        return name.to_string();
    }
    catalog
        .manifests()
        .find(|manifest| manifest.id.rsplit('.').next() == Some(name))
        .map(|manifest| manifest.id.clone())
        .unwrap_or_else(|| name.to_string())
}

/// Human-readable view of every chain and slot
pub fn render_rack(rack: &EffectRack) -> String {
    let mut out = String::new();
    for chain in rack.chains() {
        let _ = writeln!(
            out,
            "{} super={:.3}",
            chain.group(),
            chain.super_parameter()
        );
        for slot in chain.slots() {
            let name = slot
                .effect()
                .map(|effect| effect.manifest().name.clone())
                .unwrap_or_else(|| "(empty)".to_string());
            let _ = writeln!(
                out,
                "  {} {} enabled={} meta={:.3}",
                slot.group(),
                name,
                if slot.is_enabled() { "on" } else { "off" },
                slot.meta_parameter()
            );
            for parameter in slot.parameter_slots() {
                if let (Some(name), Some(value)) = (parameter.name(), parameter.value()) {
                    let inverse = if parameter.link_inversed() { " inverse" } else { "" };
                    let _ = writeln!(
                        out,
                        "    parameter{} {}={:.4} link={}{}",
                        parameter.index() + 1,
                        name,
                        value,
                        parameter.link_type(),
                        inverse
                    );
                }
            }
            for parameter in slot.button_parameter_slots() {
                if let (Some(name), Some(value)) = (parameter.name(), parameter.value()) {
                    let _ = writeln!(
                        out,
                        "    button_parameter{} {}={}",
                        parameter.index() + 1,
                        name,
                        value
                    );
                }
            }
        }
    }
    out
}

fn exact<'a, const N: usize>(
    args: &[&'a str],
    usage: &'static str,
) -> Result<[&'a str; N], ParseError> {
    <[&str; N]>::try_from(args).map_err(|_| ParseError::Usage(usage))
}

fn position(word: &str) -> Result<usize, ParseError> {
    let value: usize = word
        .parse()
        .map_err(|_| ParseError::InvalidNumber(word.to_string()))?;
    value.checked_sub(1).ok_or(ParseError::ZeroPosition)
}

fn number(word: &str) -> Result<f64, ParseError> {
    word.parse()
        .ok()
        .filter(|value: &f64| value.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber(word.to_string()))
}

fn parse_link_type(word: &str) -> Result<LinkType, ParseError> {
    LinkType::ALL
        .iter()
        .copied()
        .find(|link_type| link_type.to_string() == word)
        .ok_or_else(|| ParseError::UnknownLinkType(word.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxrack_core::domain::RackConfig;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_line("load 1 2 echo"),
            Ok(ConsoleInput::Command(Command::LoadEffect {
                chain: 0,
                slot: 1,
                effect_id: "echo".to_string()
            }))
        );
        assert_eq!(
            parse_line("  param 2 1 3 0.25 "),
            Ok(ConsoleInput::Command(Command::SetParameter {
                chain: 1,
                slot: 0,
                index: 2,
                value: 0.25
            }))
        );
        assert_eq!(
            parse_line("link 1 1 1 linked-left inverse"),
            Ok(ConsoleInput::Command(Command::SetLink {
                chain: 0,
                slot: 0,
                index: 0,
                link_type: LinkType::LinkedLeft,
                inversed: true
            }))
        );
        assert_eq!(
            parse_line("enable 1 1 on"),
            Ok(ConsoleInput::Command(Command::SetEnabled {
                chain: 0,
                slot: 0,
                enabled: true
            }))
        );
        assert_eq!(parse_line(""), Ok(ConsoleInput::Empty));
        assert_eq!(parse_line("quit"), Ok(ConsoleInput::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_line("jump"),
            Err(ParseError::UnknownCommand("jump".to_string()))
        );
        assert!(matches!(parse_line("clear 1"), Err(ParseError::Usage(_))));
        assert_eq!(parse_line("clear 0 1"), Err(ParseError::ZeroPosition));
        assert_eq!(
            parse_line("meta 1 1 loud"),
            Err(ParseError::InvalidNumber("loud".to_string()))
        );
        assert_eq!(
            parse_line("meta 1 1 NaN"),
            Err(ParseError::InvalidNumber("NaN".to_string()))
        );
        assert_eq!(
            parse_line("link 1 1 1 sideways"),
            Err(ParseError::UnknownLinkType("sideways".to_string()))
        );
    }

    #[test]
    fn test_resolve_effect_id() {
        let catalog = EffectCatalog::builtin();
        assert_eq!(resolve_effect_id(&catalog, "echo"), "org.fxrack.effects.echo");
        assert_eq!(
            resolve_effect_id(&catalog, "org.fxrack.effects.filter"),
            "org.fxrack.effects.filter"
        );
        assert_eq!(resolve_effect_id(&catalog, "missing"), "missing");
    }

    #[test]
    fn test_render_rack() {
        let mut rack = EffectRack::new(
            RackConfig {
                chains: 1,
                slots_per_chain: 2,
                ..RackConfig::default()
            },
            EffectCatalog::builtin(),
        );
        rack.load_effect(0, 0, "org.fxrack.effects.echo").unwrap();

        let text = render_rack(&rack);
        assert!(text.contains("[EffectRack1_EffectUnit1]"));
        assert!(text.contains("Echo enabled=off"));
        assert!(text.contains("parameter1 Time="));
        assert!(text.contains("button_parameter1 Quantize=1"));
        assert!(text.contains("(empty)"));
    }
}
