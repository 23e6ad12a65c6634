//! JSON protocol for headless placement sessions.
//!
//! The headless runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Pointer events and board commands from the controller
//! **Output (stdout):** Responses, notifications and state snapshots
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","scenario":"..."}`
//! 2. Controller sends commands as JSON lines
//! 3. Every gesture command answers with the notifications it produced
//! 4. `quit` answers `{"type":"bye"}` and ends the session
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","scenario":"Meadow"}
//! -> {"cmd":"select_building","type_id":1}
//! <- {"type":"ack","cmd":"select_building"}
//! -> {"cmd":"pointer_up","x":0.0,"y":0.0}
//! <- {"type":"events","cmd":"pointer_up","events":[{"event":"building_placed",...}]}
//! -> {"cmd":"hash"}
//! <- {"type":"state_hash","hash":1234567890}
//! ```

use serde::{Deserialize, Serialize};
use td_core::collaborators::PlacementEvent;
use td_core::interaction::GamePhase;

/// Protocol version reported in the ready message.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Enter build mode for a building type.
    SelectBuilding { type_id: u32 },

    /// Leave build mode.
    CancelBuild,

    /// Pointer pressed at a world position.
    PointerDown { x: f64, y: f64 },

    /// Pointer moved to a world position.
    PointerMove { x: f64, y: f64 },

    /// Pointer released at a world position.
    PointerUp { x: f64, y: f64 },

    /// Advance gesture timers by `count` frames of `dt_ms` each.
    Tick {
        #[serde(default = "default_frame_ms")]
        dt_ms: u32,
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Damage a building.
    Damage { entity_id: u64, amount: i32 },

    /// Kill a building outside the placement engine.
    Kill { entity_id: u64 },

    /// Sell a building.
    Sell { entity_id: u64 },

    /// Change the game phase.
    SetPhase { phase: GamePhase },

    /// Clear the board and restore the starting economy.
    Reset,

    /// Query the current state.
    Query,

    /// Report the board state hash (for determinism verification).
    Hash,

    /// End the session.
    Quit,
}

fn default_frame_ms() -> u32 {
    16
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready { version: String, scenario: String },

    /// Acknowledgment of a command that produced no notifications.
    Ack { cmd: String },

    /// Notifications produced by a command, in order.
    Events {
        cmd: String,
        events: Vec<PlacementEvent>,
    },

    /// Error processing a command.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
        /// Machine-readable rejection reason, for placement failures.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Current state.
    State(Box<StateSnapshot>),

    /// State hash for determinism verification.
    StateHash { hash: u64 },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// Full observable state of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub phase: GamePhase,
    pub economy: EconomyState,
    pub buildings: Vec<BuildingState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<HighlightState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicator: Option<IndicatorState>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub selected: Vec<u64>,
    pub hash: u64,
}

/// Currency and population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyState {
    pub currency: i32,
    pub population: u32,
    pub population_cap: u32,
}

/// One placed building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingState {
    pub id: u64,
    pub type_id: u32,
    pub name: String,
    pub grid: String,
    /// Anchor cell, absent for lifted or off-grid buildings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<(u32, u32)>,
    pub x: f64,
    pub y: f64,
    pub health: i32,
    pub max_health: i32,
    pub alive: bool,
}

/// Build-mode preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewState {
    pub type_id: u32,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<(u32, u32)>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<(u32, u32)>,
}

/// Drop-target highlight while dragging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightState {
    pub grid: String,
    pub cell: (u32, u32),
    pub available: bool,
}

/// Long-press progress ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorState {
    pub entity_id: u64,
    pub x: f64,
    pub y: f64,
    /// Progress in `[0, 1]`.
    pub progress: f64,
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    pub fn ready(scenario: &str) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            scenario: scenario.to_string(),
        }
    }

    /// Create an acknowledgment.
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Acknowledge with notifications, or plainly if there were none.
    pub fn events(cmd: &str, events: Vec<PlacementEvent>) -> Self {
        if events.is_empty() {
            Self::ack(cmd)
        } else {
            Self::Events {
                cmd: cmd.to_string(),
                events,
            }
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
            code: None,
        }
    }

    /// Create an error response for a rejected placement or gesture.
    pub fn rejected(error: &td_core::error::PlacementError, cmd: &str) -> Self {
        Self::Error {
            message: error.to_string(),
            cmd: Some(cmd.to_string()),
            code: Some(error.code().to_string()),
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","message":"Serialization failed: {}"}}"#,
                e
            )
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectBuilding { .. } => "select_building",
            Self::CancelBuild => "cancel_build",
            Self::PointerDown { .. } => "pointer_down",
            Self::PointerMove { .. } => "pointer_move",
            Self::PointerUp { .. } => "pointer_up",
            Self::Tick { .. } => "tick",
            Self::Damage { .. } => "damage",
            Self::Kill { .. } => "kill",
            Self::Sell { .. } => "sell",
            Self::SetPhase { .. } => "set_phase",
            Self::Reset => "reset",
            Self::Query => "query",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use td_core::catalog::BuildingTypeId;

    #[test]
    fn test_parse_pointer_command() {
        let json = r#"{"cmd":"pointer_down","x":100.0,"y":-50.5}"#;
        let cmd = Command::from_json(json).unwrap();
        assert_eq!(cmd, Command::PointerDown { x: 100.0, y: -50.5 });
        assert_eq!(cmd.name(), "pointer_down");
    }

    #[test]
    fn test_default_tick() {
        let cmd = Command::from_json(r#"{"cmd":"tick"}"#).unwrap();
        assert_eq!(cmd, Command::Tick { dt_ms: 16, count: 1 });
    }

    #[test]
    fn test_parse_set_phase() {
        let cmd = Command::from_json(r#"{"cmd":"set_phase","phase":"game_over"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::SetPhase {
                phase: GamePhase::GameOver
            }
        );
    }

    #[test]
    fn test_unknown_command_fails() {
        assert!(Command::from_json(r#"{"cmd":"teleport"}"#).is_err());
    }

    #[test]
    fn test_events_response_line() {
        let resp = Response::events(
            "cancel_build",
            vec![PlacementEvent::BuildModeCancelled {
                type_id: BuildingTypeId::new(2),
            }],
        );
        let json = resp.to_json_line();
        assert!(json.ends_with('\n'));
        assert!(json.contains(r#""type":"events""#));
        assert!(json.contains(r#""event":"build_mode_cancelled""#));
    }

    #[test]
    fn test_empty_events_is_ack() {
        assert_eq!(Response::events("tick", Vec::new()), Response::ack("tick"));
    }

    #[test]
    fn test_rejected_carries_code() {
        let resp = Response::rejected(&td_core::error::PlacementError::OutOfBounds, "pointer_up");
        let json = resp.to_json_line();
        assert!(json.contains(r#""code":"out_of_bounds""#));
    }

    #[test]
    fn test_state_hash_line() {
        let json = Response::StateHash { hash: 42 }.to_json_line();
        assert_eq!(json, "{\"type\":\"state_hash\",\"hash\":42}\n");
    }
}
