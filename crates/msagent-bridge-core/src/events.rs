//! Game events and their mapping to assistant commands.
//!
//! Payloads are untyped JSON objects from the game mod. Every field is read
//! with a default, so a sparse or odd payload produces a vaguer prompt rather
//! than an error.

use crate::command::Command;
use serde_json::Value;
use std::fmt;

/// Default for missing name-like fields.
pub const UNKNOWN: &str = "Unknown";

/// Event kinds accepted from the game, one per HTTP route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Health,
    Vehicle,
    Crash,
    Dent,
    Scratch,
    Surroundings,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Health,
        EventKind::Vehicle,
        EventKind::Crash,
        EventKind::Dent,
        EventKind::Scratch,
        EventKind::Surroundings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Health => "health",
            EventKind::Vehicle => "vehicle",
            EventKind::Crash => "crash",
            EventKind::Dent => "dent",
            EventKind::Scratch => "scratch",
            EventKind::Surroundings => "surroundings",
        }
    }

    /// HTTP route serving this event.
    pub fn route(&self) -> &'static str {
        match self {
            EventKind::Health => "/health",
            EventKind::Vehicle => "/vehicle",
            EventKind::Crash => "/crash",
            EventKind::Dent => "/dent",
            EventKind::Scratch => "/scratch",
            EventKind::Surroundings => "/surroundings",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the command for an event. Never fails.
pub fn format_command(kind: EventKind, payload: &Value) -> Command {
    match kind {
        EventKind::Health => Command::ping(),
        EventKind::Vehicle => Command::chat(vehicle_prompt(payload)),
        EventKind::Crash => Command::chat(crash_prompt(payload)),
        EventKind::Dent => Command::chat(dent_prompt(payload)),
        EventKind::Scratch => Command::chat(scratch_prompt(payload)),
        EventKind::Surroundings => Command::chat(surroundings_prompt(payload)),
    }
}

fn vehicle_prompt(payload: &Value) -> String {
    let name = text_field(payload, "vehicle_name", "vehicleName", UNKNOWN);
    let model = text_field(payload, "vehicle_model", "vehicleModel", "");
    format!(
        "I just spawned a {} {} in BeamNG! Make an excited comment about this vehicle.",
        name, model
    )
}

fn crash_prompt(payload: &Value) -> String {
    let name = text_field(payload, "vehicle_name", "vehicleName", UNKNOWN);
    let speed = number_field(payload, "speed_before", "speedBefore");
    let damage = number_field(payload, "damage_level", "damageLevel");
    format!(
        "I just crashed my {} at {:.0} km/h! The damage is pretty bad ({:.1}). React dramatically!",
        name, speed, damage
    )
}

fn dent_prompt(payload: &Value) -> String {
    let name = text_field(payload, "vehicle_name", "vehicleName", UNKNOWN);
    let amount = number_field(payload, "damage_amount", "damageAmount");
    tracing::debug!("Dent on {} (damage_amount={})", name, amount);
    format!(
        "My {} just got a big dent! Make a comment about the damage.",
        name
    )
}

fn scratch_prompt(payload: &Value) -> String {
    let name = text_field(payload, "vehicle_name", "vehicleName", UNKNOWN);
    format!(
        "Just scratched the paint on my {}. Make a light comment.",
        name
    )
}

fn surroundings_prompt(payload: &Value) -> String {
    let name = text_field(payload, "vehicle_name", "vehicleName", UNKNOWN);
    let location = text_field(payload, "location", "location", UNKNOWN);
    let speed = number_field(payload, "speed", "speed");
    format!(
        "I'm driving my {} at {:.0} km/h in {}. Comment on the scene!",
        name, speed, location
    )
}

// ============================================================================
// Field extraction
// ============================================================================

/// Look up a field, supporting both snake_case and camelCase.
fn field<'a>(payload: &'a Value, snake: &str, camel: &str) -> Option<&'a Value> {
    payload.get(snake).or_else(|| payload.get(camel))
}

/// Read a text field. Numbers and bools render as their JSON text; null,
/// arrays and objects fall back to the default.
pub fn text_field(payload: &Value, snake: &str, camel: &str, default: &str) -> String {
    match field(payload, snake, camel) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => default.to_string(),
    }
}

/// Read a numeric field. Numeric strings are accepted; anything else is 0.
pub fn number_field(payload: &Value, snake: &str, camel: &str) -> f64 {
    let value = match field(payload, snake, camel) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn line(kind: EventKind, payload: Value) -> String {
        format_command(kind, &payload).to_line()
    }

    #[test]
    fn test_health_is_ping() {
        assert_eq!(line(EventKind::Health, json!({"anything": 1})), "PING");
    }

    #[test]
    fn test_vehicle_prompt() {
        assert_eq!(
            line(
                EventKind::Vehicle,
                json!({"vehicle_name": "ETK 800-Series", "vehicle_model": "2.0T"})
            ),
            "CHAT:I just spawned a ETK 800-Series 2.0T in BeamNG! Make an excited comment about this vehicle."
        );
    }

    #[test]
    fn test_crash_prompt_precision() {
        assert_eq!(
            line(
                EventKind::Crash,
                json!({"vehicle_name": "D-Series", "speed_before": 80, "damage_level": 0.5})
            ),
            "CHAT:I just crashed my D-Series at 80 km/h! The damage is pretty bad (0.5). React dramatically!"
        );
        assert_eq!(
            line(
                EventKind::Crash,
                json!({"vehicle_name": "Pessima", "speed_before": 123.7, "damage_level": 0.26})
            ),
            "CHAT:I just crashed my Pessima at 124 km/h! The damage is pretty bad (0.3). React dramatically!"
        );
    }

    #[test]
    fn test_dent_and_scratch_prompts() {
        assert_eq!(
            line(EventKind::Dent, json!({"vehicle_name": "Pessima", "damage_amount": 0.2})),
            "CHAT:My Pessima just got a big dent! Make a comment about the damage."
        );
        assert_eq!(
            line(EventKind::Scratch, json!({"vehicle_name": "Covet"})),
            "CHAT:Just scratched the paint on my Covet. Make a light comment."
        );
    }

    #[test]
    fn test_surroundings_prompt() {
        assert_eq!(
            line(
                EventKind::Surroundings,
                json!({"vehicle_name": "ETK K-Series", "location": "Italy", "speed": 75})
            ),
            "CHAT:I'm driving my ETK K-Series at 75 km/h in Italy. Comment on the scene!"
        );
    }

    #[test]
    fn test_empty_payload_uses_defaults() {
        let empty = json!({});
        assert_eq!(
            line(EventKind::Vehicle, empty.clone()),
            "CHAT:I just spawned a Unknown  in BeamNG! Make an excited comment about this vehicle."
        );
        assert_eq!(
            line(EventKind::Crash, empty.clone()),
            "CHAT:I just crashed my Unknown at 0 km/h! The damage is pretty bad (0.0). React dramatically!"
        );
        assert_eq!(
            line(EventKind::Dent, empty.clone()),
            "CHAT:My Unknown just got a big dent! Make a comment about the damage."
        );
        assert_eq!(
            line(EventKind::Scratch, empty.clone()),
            "CHAT:Just scratched the paint on my Unknown. Make a light comment."
        );
        assert_eq!(
            line(EventKind::Surroundings, empty),
            "CHAT:I'm driving my Unknown at 0 km/h in Unknown. Comment on the scene!"
        );
    }

    #[test]
    fn test_non_object_payload_degrades() {
        for kind in EventKind::ALL {
            let cmd = format_command(kind, &json!([1, 2, 3]));
            assert!(!cmd.to_line().is_empty());
        }
        assert_eq!(
            line(EventKind::Scratch, Value::Null),
            "CHAT:Just scratched the paint on my Unknown. Make a light comment."
        );
    }

    #[test]
    fn test_odd_field_types() {
        assert_eq!(
            line(
                EventKind::Crash,
                json!({"vehicle_name": 42, "speed_before": "61.2", "damage_level": "bad"})
            ),
            "CHAT:I just crashed my 42 at 61 km/h! The damage is pretty bad (0.0). React dramatically!"
        );
        assert_eq!(
            line(EventKind::Scratch, json!({"vehicle_name": null})),
            "CHAT:Just scratched the paint on my Unknown. Make a light comment."
        );
    }

    #[test]
    fn test_camel_case_fallback() {
        assert_eq!(
            line(EventKind::Crash, json!({"vehicleName": "Covet", "speedBefore": 40})),
            "CHAT:I just crashed my Covet at 40 km/h! The damage is pretty bad (0.0). React dramatically!"
        );
    }

    #[test]
    fn test_newline_in_field_stays_single_line() {
        let cmd = format_command(EventKind::Surroundings, &json!({"location": "West\nCoast"}));
        assert!(cmd.to_line().contains("in West Coast."));
    }

    #[test]
    fn test_event_kind_routes() {
        assert_eq!(EventKind::from_str("crash"), Some(EventKind::Crash));
        assert_eq!(EventKind::Surroundings.route(), "/surroundings");
        assert_eq!(EventKind::from_str("explode"), None);
    }
}
