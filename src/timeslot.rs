//! Display time-of-day selection.
//!
//! Each selectable label maps to a fixed index of the six-step prediction
//! sequence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayTime {
    #[default]
    #[serde(rename = "00:00")]
    Midnight,
    #[serde(rename = "06:00")]
    Morning,
    #[serde(rename = "12:00")]
    Noon,
    #[serde(rename = "18:00")]
    Evening,
}

impl DisplayTime {
    pub const ALL: [DisplayTime; 4] = [
        DisplayTime::Midnight,
        DisplayTime::Morning,
        DisplayTime::Noon,
        DisplayTime::Evening,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DisplayTime::Midnight => "00:00",
            DisplayTime::Morning => "06:00",
            DisplayTime::Noon => "12:00",
            DisplayTime::Evening => "18:00",
        }
    }

    /// Index into the prediction sequence.
    pub fn step_index(&self) -> usize {
        match self {
            DisplayTime::Midnight => 2,
            DisplayTime::Morning => 3,
            DisplayTime::Noon => 4,
            DisplayTime::Evening => 5,
        }
    }
}

impl fmt::Display for DisplayTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DisplayTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DisplayTime::ALL
            .into_iter()
            .find(|t| t.label() == s.trim())
            .ok_or_else(|| {
                format!("Invalid display time '{}'. Valid times: 00:00, 06:00, 12:00, 18:00", s)
            })
    }
}

/// Maps a time label to its prediction index.
pub fn step_for_label(label: &str) -> Result<usize, String> {
    label.parse::<DisplayTime>().map(|t| t.step_index())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_to_index() {
        assert_eq!(step_for_label("00:00"), Ok(2));
        assert_eq!(step_for_label("06:00"), Ok(3));
        assert_eq!(step_for_label("12:00"), Ok(4));
        assert_eq!(step_for_label("18:00"), Ok(5));
    }

    #[test]
    fn test_rejects_other_labels() {
        assert!(step_for_label("03:00").is_err());
        assert!(step_for_label("24:00").is_err());
        assert!(step_for_label("").is_err());
    }

    #[test]
    fn test_display_round_trip_and_default() {
        for t in DisplayTime::ALL {
            assert_eq!(t.to_string().parse::<DisplayTime>(), Ok(t));
        }
        assert_eq!(DisplayTime::default(), DisplayTime::Midnight);
        assert_eq!(serde_json::to_string(&DisplayTime::Evening).unwrap(), "\"18:00\"");
    }
}
