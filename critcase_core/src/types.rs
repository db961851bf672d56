//! Core domain types for the Critical Case game.
//!
//! This module defines the fundamental types used throughout the system:
//! - Treatments and difficulty levels
//! - Case definitions and their distractor database entries
//! - Session vocabulary (phases, clues, patient state, action log entries)
//! - Score records handed to the leaderboard

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Treatment and Difficulty
// ============================================================================

/// A treatment the player can administer
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentKind {
    Scan,
    InjectionA,
    InjectionB,
    Oral,
    Iv,
}

impl TreatmentKind {
    /// Every treatment, in action panel order
    pub const ALL: [TreatmentKind; 5] = [
        TreatmentKind::Scan,
        TreatmentKind::InjectionA,
        TreatmentKind::InjectionB,
        TreatmentKind::Oral,
        TreatmentKind::Iv,
    ];

    /// Wire token (`scan`, `injection_a`, ...)
    pub fn token(self) -> &'static str {
        match self {
            TreatmentKind::Scan => "scan",
            TreatmentKind::InjectionA => "injection_a",
            TreatmentKind::InjectionB => "injection_b",
            TreatmentKind::Oral => "oral",
            TreatmentKind::Iv => "iv",
        }
    }

    /// Name shown on the action button and in the action log
    pub fn display_name(self) -> &'static str {
        match self {
            TreatmentKind::Scan => "Run Diagnostic Scan",
            TreatmentKind::InjectionA => "Injection A (Standard)",
            TreatmentKind::InjectionB => "Injection B (Epinephrine)",
            TreatmentKind::Oral => "Administer Oral Treatment",
            TreatmentKind::Iv => "IV Drip Treatment",
        }
    }

    /// Short label used by the protocol tracker
    pub fn step_label(self) -> &'static str {
        match self {
            TreatmentKind::Scan => "Diagnostic Scan",
            TreatmentKind::InjectionA => "Injection A",
            TreatmentKind::InjectionB => "Injection B",
            TreatmentKind::Oral => "Oral Meds",
            TreatmentKind::Iv => "IV Drip",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TreatmentKind::Scan => "Analyze patient vitals and symptoms",
            TreatmentKind::InjectionA => "Standard metallic needle delivery",
            TreatmentKind::InjectionB => "Alternative metallic needle delivery",
            TreatmentKind::Oral => "Pill-based delivery method",
            TreatmentKind::Iv => "Continuous intravenous delivery",
        }
    }
}

impl fmt::Display for TreatmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for TreatmentKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "scan" => Ok(TreatmentKind::Scan),
            "injection_a" | "inj-a" | "inj_a" | "a" => Ok(TreatmentKind::InjectionA),
            "injection_b" | "inj-b" | "inj_b" | "b" => Ok(TreatmentKind::InjectionB),
            "oral" => Ok(TreatmentKind::Oral),
            "iv" => Ok(TreatmentKind::Iv),
            other => Err(crate::Error::Validation(format!(
                "Unknown treatment '{}'",
                other
            ))),
        }
    }
}

/// Difficulty setting, chosen before a case starts
///
/// Only affects the probabilities shown in the database panel.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(crate::Error::Validation(format!(
                "Unknown difficulty '{}' (expected easy, medium or hard)",
                other
            ))),
        }
    }
}

// ============================================================================
// Case Definitions
// ============================================================================

/// One candidate diagnosis shown in the database panel
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DistractorEntry {
    pub disease: String,
    pub symptoms: Vec<String>,
    pub cure: String,
    pub notes: String,
    /// Marks the true diagnosis
    #[serde(default)]
    pub highlighted: bool,
}

/// A rare-disease scenario and the protocol that cures it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaseDefinition {
    pub id: String,
    pub name: String,
    pub required_sequence: Vec<TreatmentKind>,
    pub scan_clue: String,
    pub failure_message: String,
    pub databases: Vec<DistractorEntry>,
}

impl CaseDefinition {
    /// Protocol rendered as "Scan -> IV -> IV -> Oral"
    pub fn protocol_summary(&self) -> String {
        self.required_sequence
            .iter()
            .map(|k| k.step_label())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// The complete case catalog
///
/// Cases are kept in a `Vec` so that a seeded draw picks the same case on
/// every run.
#[derive(Clone, Debug)]
pub struct Catalog {
    pub cases: Vec<CaseDefinition>,
}

// ============================================================================
// Session Vocabulary
// ============================================================================

/// Phase of a game session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[default]
    Start,
    Playing,
    Win,
    Lose,
}

impl GamePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, GamePhase::Win | GamePhase::Lose)
    }
}

/// Patient condition derived from health
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatientState {
    Stable,
    Deteriorating,
    Critical,
}

impl PatientState {
    pub fn from_health(health: u8) -> Self {
        if health >= 90 {
            PatientState::Stable
        } else if health >= 50 {
            PatientState::Deteriorating
        } else {
            PatientState::Critical
        }
    }
}

/// A discovered fact that gates what the UI reveals
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Clue {
    ScanComplete,
    TreatmentFailed,
    AcknowledgedMistake,
}

impl Clue {
    /// Text shown in the discovered clues list
    pub fn describe(self) -> &'static str {
        match self {
            Clue::ScanComplete => {
                "Diagnostic scan completed - Database now accessible with possible diagnoses"
            }
            Clue::TreatmentFailed => "Treatment failed - review the highlighted diagnosis",
            Clue::AcknowledgedMistake => "Medical incident report filed and acknowledged",
        }
    }
}

/// Category of an action log entry
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    StepComplete,
    TreatmentSuccess,
    TreatmentFailed,
    Accountability,
}

/// One immutable entry in the session's action history
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionEntry {
    pub kind: ActionKind,
    pub label: String,
    pub result: String,
    pub health_delta: Option<i32>,
    /// Seconds into the case when the action happened
    pub elapsed_secs: u32,
    pub timestamp: DateTime<Utc>,
}

/// Terminal outcome of a case
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Lose,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => f.write_str("win"),
            Outcome::Lose => f.write_str("lose"),
        }
    }
}

/// Time and error count of a finished case
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinalScore {
    pub outcome: Outcome,
    pub time_secs: u32,
    pub errors: u32,
}

// ============================================================================
// Leaderboard Record
// ============================================================================

/// A winning result submitted to the leaderboard
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScoreRecord {
    pub id: Uuid,
    pub name: String,
    /// Seconds taken to cure the patient
    pub time: u32,
    pub errors: u32,
    pub case_name: String,
    pub difficulty: Difficulty,
    pub handbook_used: bool,
    pub recorded_at: DateTime<Utc>,
}
