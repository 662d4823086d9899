//! Turn-by-turn instruction text and maneuver icons.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Street name used when the provider gives none.
pub const UNNAMED_STREET: &str = "the road";

/// Formats the instruction for an OSRM maneuver.
///
/// Unknown maneuver types read as "Continue on ...".
#[must_use]
pub fn format_instruction(maneuver_type: &str, modifier: Option<&str>, street_name: &str) -> String {
    let street = if street_name.trim().is_empty() {
        UNNAMED_STREET
    } else {
        street_name.trim()
    };
    let with_modifier = |prefix: &str, rest: &str| match modifier.filter(|m| !m.is_empty()) {
        Some(m) => format!("{prefix} {m} {rest}"),
        None => format!("{prefix} {rest}"),
    };

    match maneuver_type {
        "depart" => format!("Start on {street}"),
        "arrive" => "Arrive at your destination".to_string(),
        "turn" => with_modifier("Turn", &format!("onto {street}")),
        "merge" => with_modifier("Merge", &format!("onto {street}")),
        "on ramp" => format!("Take the ramp onto {street}"),
        "off ramp" => format!("Take the exit onto {street}"),
        "fork" => with_modifier("Take the", &format!("fork onto {street}")),
        "end of road" => with_modifier("At the end, turn", &format!("onto {street}")),
        "roundabout" => format!("At the roundabout, take the exit onto {street}"),
        "rotary" => format!("At the rotary, take the exit onto {street}"),
        "new name" => format!("Continue onto {street}"),
        _ => format!("Continue on {street}"),
    }
}

/// Direction symbol for a maneuver, for turn-by-turn display.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ManeuverIcon {
    Depart,
    Arrive,
    Straight,
    Left,
    Right,
    SlightLeft,
    SlightRight,
    SharpLeft,
    SharpRight,
    Roundabout,
}

impl ManeuverIcon {
    /// Picks the icon for an OSRM maneuver type and modifier.
    #[must_use]
    pub fn for_maneuver(maneuver_type: &str, modifier: Option<&str>) -> Self {
        match maneuver_type {
            "depart" => return Self::Depart,
            "arrive" => return Self::Arrive,
            "roundabout" | "rotary" => return Self::Roundabout,
            "continue" => return Self::Straight,
            _ => {}
        }

        let is_turn = maneuver_type == "turn";
        let full_turns = is_turn || maneuver_type == "end of road";

        match modifier {
            Some("left") if full_turns => Self::Left,
            Some("right") if full_turns => Self::Right,
            Some("left" | "slight left") => Self::SlightLeft,
            Some("right" | "slight right") => Self::SlightRight,
            Some("sharp left") if is_turn => Self::SharpLeft,
            Some("sharp right") if is_turn => Self::SharpRight,
            _ => Self::Right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_known_maneuvers() {
        assert_eq!(format_instruction("depart", None, "MG Road"), "Start on MG Road");
        assert_eq!(
            format_instruction("turn", Some("left"), "Necklace Road"),
            "Turn left onto Necklace Road"
        );
        assert_eq!(
            format_instruction("arrive", Some("right"), ""),
            "Arrive at your destination"
        );
        assert_eq!(
            format_instruction("fork", Some("slight right"), "NH 44"),
            "Take the slight right fork onto NH 44"
        );
        assert_eq!(
            format_instruction("end of road", Some("left"), "Station Road"),
            "At the end, turn left onto Station Road"
        );
        assert_eq!(
            format_instruction("roundabout", None, "Ring Road"),
            "At the roundabout, take the exit onto Ring Road"
        );
    }

    #[test]
    fn missing_street_and_modifier_read_naturally() {
        assert_eq!(format_instruction("turn", None, "  "), "Turn onto the road");
        assert_eq!(
            format_instruction("use lane", Some("straight"), ""),
            "Continue on the road"
        );
    }

    #[test]
    fn icons_follow_type_then_modifier() {
        assert_eq!(ManeuverIcon::for_maneuver("depart", Some("left")), ManeuverIcon::Depart);
        assert_eq!(ManeuverIcon::for_maneuver("turn", Some("left")), ManeuverIcon::Left);
        assert_eq!(
            ManeuverIcon::for_maneuver("turn", Some("sharp right")),
            ManeuverIcon::SharpRight
        );
        assert_eq!(
            ManeuverIcon::for_maneuver("fork", Some("left")),
            ManeuverIcon::SlightLeft
        );
        assert_eq!(
            ManeuverIcon::for_maneuver("end of road", Some("right")),
            ManeuverIcon::Right
        );
        assert_eq!(ManeuverIcon::for_maneuver("rotary", None), ManeuverIcon::Roundabout);
        assert_eq!(ManeuverIcon::for_maneuver("new name", None), ManeuverIcon::Right);
        assert_eq!(ManeuverIcon::SlightLeft.to_string(), "SLIGHT_LEFT");
    }
}
