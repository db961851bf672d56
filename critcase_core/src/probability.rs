//! Display probabilities for the database panel.
//!
//! Probabilities are cosmetic: they bias the player toward (or, in a
//! deceptive hard case, away from) the true diagnosis but never change the
//! protocol that cures the patient.
//!
//! Bands per difficulty (inclusive):
//!
//! | Difficulty       | Correct entry | Other entries |
//! |------------------|---------------|---------------|
//! | easy             | 75-94         | 10-29         |
//! | medium           | 55-64         | 30-49         |
//! | hard             | 40-49         | 30-39         |
//! | hard, deceptive  | 25-34         | 50-64         |

use crate::rng::GameRng;
use crate::{CaseDefinition, Difficulty};

/// Default chance that a hard case is deceptive
pub const DEFAULT_DECEPTIVE_CHANCE: f64 = 0.3;

/// Compute the percentage shown next to one database entry
pub fn display_probability(
    is_correct: bool,
    difficulty: Difficulty,
    deceptive: bool,
    rng: &mut GameRng,
) -> u8 {
    let (base, spread) = match (difficulty, deceptive, is_correct) {
        (Difficulty::Easy, _, true) => (75, 20),
        (Difficulty::Easy, _, false) => (10, 20),
        (Difficulty::Medium, _, true) => (55, 10),
        (Difficulty::Medium, _, false) => (30, 20),
        (Difficulty::Hard, true, true) => (25, 10),
        (Difficulty::Hard, true, false) => (50, 15),
        (Difficulty::Hard, false, true) => (40, 10),
        (Difficulty::Hard, false, false) => (30, 10),
    };

    (base + rng.gen_range(0..spread)).min(100) as u8
}

/// Decides deception per session and fills in a case's probabilities
#[derive(Clone, Debug)]
pub struct ProbabilityGenerator {
    deceptive_chance: f64,
}

impl Default for ProbabilityGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_DECEPTIVE_CHANCE)
    }
}

impl ProbabilityGenerator {
    pub fn new(deceptive_chance: f64) -> Self {
        Self {
            deceptive_chance: deceptive_chance.clamp(0.0, 1.0),
        }
    }

    pub fn deceptive_chance(&self) -> f64 {
        self.deceptive_chance
    }

    /// Roll whether this session's case misleads the player
    ///
    /// Only hard cases can be deceptive.
    pub fn roll_deception(&self, difficulty: Difficulty, rng: &mut GameRng) -> bool {
        difficulty == Difficulty::Hard && rng.gen_bool(self.deceptive_chance)
    }

    /// Generate one probability per database entry, in catalog order
    pub fn generate_for_case(
        &self,
        case: &CaseDefinition,
        difficulty: Difficulty,
        deceptive: bool,
        rng: &mut GameRng,
    ) -> Vec<u8> {
        case.databases
            .iter()
            .map(|entry| display_probability(entry.highlighted, difficulty, deceptive, rng))
            .collect()
    }
}
