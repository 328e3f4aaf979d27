use serde_json::{Map, Value};

use crate::types::MissionCommand;

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Command(MissionCommand),
    Ping { t: f64 },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "command" => parse_command(object).map(ParsedClientMessage::Command),
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_command(object: &Map<String, Value>) -> Option<MissionCommand> {
    let command = object.get("command")?.as_str()?;
    match command {
        "select" => {
            let operative = parse_non_negative(object.get("operative")?)?;
            Some(MissionCommand::Select {
                operative: usize::try_from(operative).ok()?,
            })
        }
        "waypoint" => {
            let x = i32::try_from(object.get("x")?.as_i64()?).ok()?;
            let y = i32::try_from(object.get("y")?.as_i64()?).ok()?;
            Some(MissionCommand::Waypoint { x, y })
        }
        "clear_waypoint" => Some(MissionCommand::ClearWaypoint),
        "toggle_pause" => Some(MissionCommand::TogglePause),
        "retreat" => Some(MissionCommand::Retreat),
        "regenerate" => {
            let seed = match object.get("seed") {
                None | Some(Value::Null) => None,
                Some(value) => Some(parse_non_negative(value)?),
            };
            Some(MissionCommand::Regenerate { seed })
        }
        "toggle_fog" => Some(MissionCommand::ToggleFog),
        "toggle_debug" => Some(MissionCommand::ToggleDebug),
        _ => None,
    }
}

/// Browsers send every number as f64; whole floats within the safe integer
/// range are floored and accepted.
fn parse_non_negative(value: &Value) -> Option<u64> {
    const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_991.0;

    if let Some(number) = value.as_u64() {
        return Some(number);
    }
    let number = value.as_f64()?;
    if !number.is_finite() {
        return None;
    }
    let floored = number.floor();
    if !(0.0..=MAX_SAFE_INTEGER_F64).contains(&floored) {
        return None;
    }
    Some(floored as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_waypoint_command() {
        let parsed = parse_client_message(r#"{"type":"command","command":"waypoint","x":12,"y":7}"#);
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::Command(MissionCommand::Waypoint {
                x: 12,
                y: 7
            }))
        );
    }

    #[test]
    fn parse_unit_commands() {
        for (raw, expected) in [
            ("clear_waypoint", MissionCommand::ClearWaypoint),
            ("toggle_pause", MissionCommand::TogglePause),
            ("retreat", MissionCommand::Retreat),
            ("toggle_fog", MissionCommand::ToggleFog),
            ("toggle_debug", MissionCommand::ToggleDebug),
        ] {
            let json = format!(r#"{{"type":"command","command":"{raw}"}}"#);
            assert_eq!(
                parse_client_message(&json),
                Some(ParsedClientMessage::Command(expected))
            );
        }
    }

    #[test]
    fn parse_select_accepts_float_index() {
        let parsed = parse_client_message(r#"{"type":"command","command":"select","operative":2.0}"#);
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::Command(MissionCommand::Select { operative: 2 }))
        );
        let parsed = parse_client_message(r#"{"type":"command","command":"select","operative":-1}"#);
        assert!(parsed.is_none());
    }

    #[test]
    fn parse_regenerate_seed_is_optional() {
        let parsed = parse_client_message(r#"{"type":"command","command":"regenerate"}"#);
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::Command(MissionCommand::Regenerate { seed: None }))
        );
        let parsed =
            parse_client_message(r#"{"type":"command","command":"regenerate","seed":null}"#);
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::Command(MissionCommand::Regenerate { seed: None }))
        );
        let parsed =
            parse_client_message(r#"{"type":"command","command":"regenerate","seed":1234}"#);
        assert_eq!(
            parsed,
            Some(ParsedClientMessage::Command(MissionCommand::Regenerate {
                seed: Some(1234)
            }))
        );
        let parsed = parse_client_message(r#"{"type":"command","command":"regenerate","seed":1e300}"#);
        assert!(parsed.is_none());
    }

    #[test]
    fn parse_rejects_malformed_commands() {
        assert!(parse_client_message("not json").is_none());
        assert!(parse_client_message(r#"{"type":"command"}"#).is_none());
        assert!(parse_client_message(r#"{"type":"command","command":"launch"}"#).is_none());
        assert!(
            parse_client_message(r#"{"type":"command","command":"waypoint","x":"3","y":1}"#)
                .is_none()
        );
        assert!(parse_client_message(
            r#"{"type":"command","command":"waypoint","x":9999999999,"y":1}"#
        )
        .is_none());
        assert!(parse_client_message(r#"{"type":"hello"}"#).is_none());
    }

    #[test]
    fn parse_ping_requires_finite_number() {
        let parsed = parse_client_message(r#"{"type":"ping","t":12.5}"#);
        assert_eq!(parsed, Some(ParsedClientMessage::Ping { t: 12.5 }));
        assert!(parse_client_message(r#"{"type":"ping","t":"soon"}"#).is_none());
    }
}
