//! Wire messages exchanged between the host and its peers
//!
//! Every frame carries one [`Message`]: either `{"question": "<text>"}` or
//! `{"answer": {<field>: <value>, ...}}`. An answer may carry several fields
//! at once; receivers apply each present field independently and ignore
//! fields they do not know.

use crate::bullet::BulletSnapshot;
use crate::powerup::PowerupDescriptor;
use crate::shape::{CombatRecord, Facing, Shape};
use crate::stats::StatBlock;
use crate::Bounds;
use serde::{Deserialize, Serialize};

pub const HELLO_QUESTION: &str = "hello?";
pub const HELLO_ANSWER: &str = "hello!";
pub const STARTING_INFO_QUESTION: &str = "send_starting_info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    Question(String),
    Answer(Answer),
}

impl Message {
    pub fn question(text: &str) -> Self {
        Message::Question(text.to_string())
    }
}

impl From<Answer> for Message {
    fn from(answer: Answer) -> Self {
        Message::Answer(answer)
    }
}

/// One roster entry dealt at match start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub x: f32,
    pub y: f32,
    pub index: usize,
    pub shape_name: String,
    pub is_player: bool,
    pub player_name: String,
}

impl RosterEntry {
    pub fn of(shape: &Shape) -> Self {
        Self {
            x: shape.x,
            y: shape.y,
            index: shape.index,
            shape_name: shape.shape_name.clone(),
            is_player: shape.is_player,
            player_name: shape.player_name.clone(),
        }
    }
}

/// Full per-tick state of one combatant as the host sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub rotation: Facing,
    pub hp: f32,
    pub shield: f32,
    pub stats: StatBlock,
}

impl PlayerSnapshot {
    pub fn of(shape: &Shape) -> Self {
        Self {
            index: shape.index,
            x: shape.x,
            y: shape.y,
            rotation: shape.rotation,
            hp: shape.hp,
            shield: shape.shield,
            stats: shape.stats.clone(),
        }
    }
}

/// A peer's latest position for the combatant it controls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PosUpdate {
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub rotation: Facing,
}

impl PosUpdate {
    pub fn of(shape: &Shape) -> Self {
        Self {
            index: shape.index,
            x: shape.x,
            y: shape.y,
            rotation: shape.rotation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerupSet {
    pub seed: u64,
    pub stage: u8,
    /// Only known once the stage actually spawns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_index: Option<u32>,
    /// Spawn rectangle, fixed by the host when the stage spawns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingInfo {
    pub shape_name: String,
    pub player_name: String,
}

/// End-of-match summary for the sole survivor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerStats {
    pub index: usize,
    pub player_name: String,
    #[serde(flatten)]
    pub record: CombatRecord,
    /// Percentage of fired shots that hit
    pub accuracy: f32,
}

impl WinnerStats {
    pub fn of(shape: &Shape) -> Self {
        let record = shape.record.clone();
        let accuracy = if record.shots_fired > 0 {
            record.shots_hit as f32 / record.shots_fired as f32 * 100.0
        } else {
            0.0
        };

        Self {
            index: shape.index,
            player_name: shape.player_name.clone(),
            record,
            accuracy,
        }
    }
}

/// How a match ended
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Winner(WinnerStats),
    Tie,
}

impl MatchOutcome {
    pub fn to_answer(&self) -> Answer {
        match self {
            MatchOutcome::Winner(stats) => Answer {
                winner: Some(stats.clone()),
                ..Default::default()
            },
            MatchOutcome::Tie => Answer {
                tie: Some(true),
                ..Default::default()
            },
        }
    }

    /// Reads the end-of-match fields of an answer, if it carries any
    pub fn from_answer(answer: &Answer) -> Option<Self> {
        if let Some(stats) = &answer.winner {
            return Some(MatchOutcome::Winner(stats.clone()));
        }
        match answer.tie {
            Some(true) => Some(MatchOutcome::Tie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hello: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_set: Option<Vec<RosterEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_update: Option<Vec<PlayerSnapshot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_pos_update: Option<PosUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_shoot: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_remove: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_bullets: Option<Vec<BulletSnapshot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub powerup_set: Option<PowerupSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub powerup_add: Option<PowerupDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub powerup_remove: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<WinnerStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tie: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_starting_info: Option<StartingInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safezone_set: Option<u64>,
}

impl Answer {
    pub fn is_empty(&self) -> bool {
        *self == Answer::default()
    }
}
