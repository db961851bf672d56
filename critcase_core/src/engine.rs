//! Protocol engine: the game state machine.
//!
//! A [`GameEngine`] owns exactly one [`GameSession`] and is the only thing
//! that mutates it. Phases move `Start -> Playing -> {Win, Lose}`; a terminal
//! phase holds until [`GameEngine::start_game`] replaces the session.
//!
//! Two external triggers drive every mutation:
//! - [`GameEngine::tick`], once per second of the case timer
//! - player actions ([`GameEngine::apply_treatment`],
//!   [`GameEngine::acknowledge_failure`], [`GameEngine::consult_handbook`])
//!
//! All of them take `&mut self`, so no two mutations can interleave.

use crate::config::GameConfig;
use crate::handbook::{self, HandbookEntry};
use crate::notify::{NotificationKind, NotificationQueue, DEFAULT_NOTIFICATION_TTL_SECS};
use crate::probability::ProbabilityGenerator;
use crate::rng::GameRng;
use crate::{
    ActionEntry, ActionKind, CaseDefinition, Catalog, Clue, Difficulty, DistractorEntry, Error,
    FinalScore, GamePhase, Outcome, PatientState, Result, ScoreRecord, TreatmentKind,
};
use chrono::{Duration, Utc};
use std::collections::BTreeSet;

/// Health lost on a protocol deviation that has not been reflected on yet
pub const FIRST_OFFENSE_PENALTY: u8 = 30;
/// Health lost on a deviation after the player already filed a reflection
pub const REPEAT_OFFENSE_PENALTY: u8 = 5;
/// Health restored by a correct intermediate (non-scan) step
pub const STEP_HEAL: u8 = 10;
/// Health delta reported when the final step cures the patient
pub const CURE_HEALTH_DELTA: i32 = 40;
pub const MAX_HEALTH: u8 = 100;
/// Minimum length of a reflection, after trimming
pub const MIN_REFLECTION_CHARS: usize = 10;

/// Result of one treatment attempt
#[derive(Clone, Debug, PartialEq)]
pub struct TreatmentOutcome {
    pub treatment: TreatmentKind,
    pub success: bool,
    /// Text recorded in the action log
    pub result: String,
    /// Signed change actually applied to health
    pub health_delta: i32,
    pub phase: GamePhase,
}

/// One database panel row as currently visible to the player
#[derive(Clone, Debug)]
pub struct DatabaseRow<'a> {
    pub entry: &'a DistractorEntry,
    /// Hidden until the diagnostic scan is complete
    pub probability: Option<u8>,
    /// The true diagnosis is flagged only after a failed treatment
    pub flagged: bool,
}

/// State of one case, from start until it is replaced
#[derive(Clone, Debug)]
pub struct GameSession {
    pub case: Option<CaseDefinition>,
    pub difficulty: Difficulty,
    pub health: u8,
    pub time_budget: u32,
    pub time_left: u32,
    pub sequence_progress: usize,
    pub discovered_clues: BTreeSet<Clue>,
    pub has_acknowledged_failure: bool,
    pub failure_reason: Option<String>,
    pub action_history: Vec<ActionEntry>,
    pub notifications: NotificationQueue,
    pub phase: GamePhase,
    /// Display probability per database entry, in catalog order
    pub probabilities: Vec<u8>,
    pub deceptive: bool,
    pub handbook_used: bool,
}

impl GameSession {
    fn idle(time_budget: u32, difficulty: Difficulty) -> Self {
        Self {
            case: None,
            difficulty,
            health: MAX_HEALTH,
            time_budget,
            time_left: time_budget,
            sequence_progress: 0,
            discovered_clues: BTreeSet::new(),
            has_acknowledged_failure: false,
            failure_reason: None,
            action_history: Vec::new(),
            notifications: NotificationQueue::new(),
            phase: GamePhase::Start,
            probabilities: Vec::new(),
            deceptive: false,
            handbook_used: false,
        }
    }

    pub fn patient_state(&self) -> PatientState {
        PatientState::from_health(self.health)
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.time_budget.saturating_sub(self.time_left)
    }

    /// The step the protocol expects next, if any remain
    pub fn expected_step(&self) -> Option<TreatmentKind> {
        self.case
            .as_ref()
            .and_then(|c| c.required_sequence.get(self.sequence_progress).copied())
    }

    /// Every failed treatment attempt, first and repeat offenses alike
    pub fn errors(&self) -> u32 {
        self.action_history
            .iter()
            .filter(|a| a.kind == ActionKind::TreatmentFailed)
            .count() as u32
    }

    /// True while a failure is waiting for the player's reflection
    pub fn requires_accountability(&self) -> bool {
        self.failure_reason.is_some() && !self.has_acknowledged_failure
    }

    pub fn has_clue(&self, clue: Clue) -> bool {
        self.discovered_clues.contains(&clue)
    }
}

/// The protocol state machine
pub struct GameEngine {
    catalog: Catalog,
    rng: GameRng,
    probabilities: ProbabilityGenerator,
    settings: GameConfig,
    session: GameSession,
}

impl GameEngine {
    pub fn new(catalog: Catalog, settings: GameConfig, rng: GameRng) -> Self {
        let session = GameSession::idle(settings.time_budget_secs, settings.difficulty);
        Self {
            catalog,
            rng,
            probabilities: ProbabilityGenerator::new(settings.deceptive_chance),
            settings,
            session,
        }
    }

    /// Engine over the built-in catalog
    pub fn with_default_catalog(settings: GameConfig, rng: GameRng) -> Self {
        Self::new(crate::catalog::get_default_catalog().clone(), settings, rng)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn phase(&self) -> GamePhase {
        self.session.phase
    }

    pub fn difficulty(&self) -> Difficulty {
        self.settings.difficulty
    }

    /// Choose the difficulty used by the next `start_game`
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.settings.difficulty = difficulty;
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Draw a random case and start playing it
    pub fn start_game(&mut self) -> Result<()> {
        let case = self.catalog.select_random_case(&mut self.rng)?.clone();
        self.begin(case);
        Ok(())
    }

    /// Start a specific case from the catalog
    pub fn start_game_with_case(&mut self, case_id: &str) -> Result<()> {
        let case = self
            .catalog
            .get(case_id)
            .cloned()
            .ok_or_else(|| Error::UnknownCase(case_id.to_string()))?;
        self.begin(case);
        Ok(())
    }

    fn begin(&mut self, case: CaseDefinition) {
        let difficulty = self.settings.difficulty;
        let deceptive = self.probabilities.roll_deception(difficulty, &mut self.rng);
        let probabilities =
            self.probabilities
                .generate_for_case(&case, difficulty, deceptive, &mut self.rng);

        tracing::info!(
            "Starting case '{}' on {} difficulty{}",
            case.id,
            difficulty,
            if deceptive { " (deceptive)" } else { "" }
        );

        // Replacing the whole session drops the previous timer, history and
        // notifications in one step.
        let mut session = GameSession::idle(self.settings.time_budget_secs, difficulty);
        session.case = Some(case);
        session.probabilities = probabilities;
        session.deceptive = deceptive;
        session.phase = GamePhase::Playing;
        self.session = session;
    }

    /// Advance the case timer by one second
    ///
    /// Reaching zero loses the case regardless of health or progress.
    pub fn tick(&mut self) -> Result<GamePhase> {
        self.ensure_playing("tick")?;

        self.session.time_left = self.session.time_left.saturating_sub(1);
        if self.session.time_left == 0 {
            tracing::info!("Time expired, patient lost");
            self.session.phase = GamePhase::Lose;
        }
        Ok(self.session.phase)
    }

    // ------------------------------------------------------------------
    // Player actions
    // ------------------------------------------------------------------

    /// Administer a treatment and score it against the protocol
    ///
    /// Wrong steps are ordinary outcomes (`success == false`), never errors.
    /// Only calling outside the `Playing` phase is rejected.
    pub fn apply_treatment(&mut self, kind: TreatmentKind) -> Result<TreatmentOutcome> {
        self.ensure_playing("apply_treatment")?;

        let (expected, total, scan_clue, failure_message) = {
            let case = self.case()?;
            let expected = case
                .required_sequence
                .get(self.session.sequence_progress)
                .copied()
                .ok_or_else(|| Error::Precondition("protocol already complete".into()))?;
            (
                expected,
                case.required_sequence.len(),
                case.scan_clue.clone(),
                case.failure_message.clone(),
            )
        };

        let outcome = if kind == expected {
            self.correct_step(kind, total, &scan_clue)
        } else {
            self.wrong_step(kind, expected, &failure_message)
        };

        tracing::debug!(
            "Treatment {} -> success={} health={} progress={}/{}",
            kind,
            outcome.success,
            self.session.health,
            self.session.sequence_progress,
            total
        );
        Ok(outcome)
    }

    fn correct_step(&mut self, kind: TreatmentKind, total: usize, scan_clue: &str) -> TreatmentOutcome {
        let s = &mut self.session;
        s.sequence_progress += 1;
        s.has_acknowledged_failure = false;
        s.failure_reason = None;

        if s.sequence_progress == total {
            let before = s.health;
            s.health = MAX_HEALTH;
            let result = "Protocol complete. Patient responds well and is stabilizing.".to_string();
            self.record(ActionKind::TreatmentSuccess, kind, &result, Some(CURE_HEALTH_DELTA));
            self.session.notifications.push(
                "Patient Stabilized!",
                Some(CURE_HEALTH_DELTA),
                NotificationKind::Success,
            );
            self.session.phase = GamePhase::Win;
            tracing::info!(
                "Patient cured after {}s with {} error(s)",
                self.session.elapsed_secs(),
                self.session.errors()
            );
            return self.outcome(kind, true, result, i32::from(MAX_HEALTH - before));
        }

        if kind == TreatmentKind::Scan {
            s.discovered_clues.insert(Clue::ScanComplete);
            let result = format!("Scan complete. {}", scan_clue);
            self.record(ActionKind::StepComplete, kind, &result, None);
            self.session
                .notifications
                .push("Scan Complete", None, NotificationKind::Neutral);
            return self.outcome(kind, true, result, 0);
        }

        let before = s.health;
        s.health = s.health.saturating_add(STEP_HEAL).min(MAX_HEALTH);
        let applied = i32::from(s.health - before);
        let result = format!(
            "Step {} of {} verified. Patient responding.",
            s.sequence_progress, total
        );
        self.record(ActionKind::StepComplete, kind, &result, Some(i32::from(STEP_HEAL)));
        self.session.notifications.push(
            "Step Verified",
            Some(i32::from(STEP_HEAL)),
            NotificationKind::Success,
        );
        self.outcome(kind, true, result, applied)
    }

    fn wrong_step(
        &mut self,
        kind: TreatmentKind,
        expected: TreatmentKind,
        failure_message: &str,
    ) -> TreatmentOutcome {
        let hint = format!("Expected next step: {}.", expected.step_label());

        let (penalty, result) = if !self.session.has_acknowledged_failure {
            let reason = if self.session.sequence_progress == 0 {
                format!("Diagnostic scan required before any treatment. {}", hint)
            } else {
                format!("{} {}", failure_message, hint)
            };
            self.session.failure_reason = Some(reason.clone());
            self.session.discovered_clues.insert(Clue::TreatmentFailed);
            (FIRST_OFFENSE_PENALTY, format!("Treatment failed! {}", reason))
        } else {
            (
                REPEAT_OFFENSE_PENALTY,
                format!("Protocol deviation repeated. {}", hint),
            )
        };

        let before = self.session.health;
        self.session.health = before.saturating_sub(penalty);
        let applied = i32::from(self.session.health) - i32::from(before);

        self.record(ActionKind::TreatmentFailed, kind, &result, Some(-i32::from(penalty)));
        self.session.notifications.push(
            "Treatment Failed!",
            Some(-i32::from(penalty)),
            NotificationKind::Failure,
        );

        if self.session.health == 0 {
            tracing::info!("Patient health reached zero, patient lost");
            self.session.phase = GamePhase::Lose;
        }

        self.outcome(kind, false, result, applied)
    }

    /// File the reflection that unblocks play after a first offense
    ///
    /// Does not advance the protocol; the player still has to perform the
    /// correct next step.
    pub fn acknowledge_failure(&mut self, reflection: &str) -> Result<()> {
        self.ensure_playing("acknowledge_failure")?;

        if !self.session.requires_accountability() {
            return Err(Error::NothingToAcknowledge);
        }

        let reflection = reflection.trim();
        if reflection.chars().count() < MIN_REFLECTION_CHARS {
            return Err(Error::Validation(format!(
                "Please provide a meaningful reflection (at least {} characters)",
                MIN_REFLECTION_CHARS
            )));
        }

        self.session.has_acknowledged_failure = true;
        self.session.failure_reason = None;
        let elapsed_secs = self.session.elapsed_secs();
        self.session.action_history.push(ActionEntry {
            kind: ActionKind::Accountability,
            label: "Medical Report".into(),
            result: reflection.to_string(),
            health_delta: None,
            elapsed_secs,
            timestamp: Utc::now(),
        });
        self.session.discovered_clues.insert(Clue::AcknowledgedMistake);
        tracing::debug!("Failure acknowledged");
        Ok(())
    }

    /// Search the handbook; consulting it during a case is recorded in the score
    pub fn consult_handbook(&mut self, query: &str) -> Vec<&'static HandbookEntry> {
        if self.session.phase == GamePhase::Playing {
            self.session.handbook_used = true;
        }
        handbook::search(query)
    }

    /// Drop notifications older than the configured display time
    ///
    /// A display time chrono cannot represent falls back to the default.
    pub fn prune_notifications(&mut self) -> usize {
        let ttl = Duration::try_seconds(self.settings.notification_ttl_secs)
            .unwrap_or_else(|| Duration::seconds(DEFAULT_NOTIFICATION_TTL_SECS));
        self.session.notifications.prune(Utc::now(), ttl)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Database rows with whatever the player has unlocked so far
    pub fn database_view(&self) -> Vec<DatabaseRow<'_>> {
        let Some(case) = self.session.case.as_ref() else {
            return Vec::new();
        };
        let revealed = self.session.has_clue(Clue::ScanComplete);
        let failed = self.session.has_clue(Clue::TreatmentFailed);

        case.databases
            .iter()
            .zip(self.session.probabilities.iter())
            .map(|(entry, p)| DatabaseRow {
                entry,
                probability: revealed.then_some(*p),
                flagged: failed && entry.highlighted,
            })
            .collect()
    }

    /// Time and errors of a finished case
    pub fn final_score(&self) -> Option<FinalScore> {
        let outcome = match self.session.phase {
            GamePhase::Win => Outcome::Win,
            GamePhase::Lose => Outcome::Lose,
            GamePhase::Start | GamePhase::Playing => return None,
        };
        Some(FinalScore {
            outcome,
            time_secs: self.session.elapsed_secs(),
            errors: self.session.errors(),
        })
    }

    /// Leaderboard record for a won case
    pub fn score_record(&self, player_name: &str) -> Result<ScoreRecord> {
        if self.session.phase != GamePhase::Win {
            return Err(Error::Precondition(
                "score records are only produced for won cases".into(),
            ));
        }
        let name = crate::leaderboard::validate_player_name(player_name)?;
        let case = self.case()?;
        Ok(ScoreRecord {
            id: uuid::Uuid::new_v4(),
            name,
            time: self.session.elapsed_secs(),
            errors: self.session.errors(),
            case_name: case.name.clone(),
            difficulty: self.session.difficulty,
            handbook_used: self.session.handbook_used,
            recorded_at: Utc::now(),
        })
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn ensure_playing(&self, operation: &str) -> Result<()> {
        if self.session.phase != GamePhase::Playing {
            return Err(Error::Precondition(format!(
                "{} called in {:?} phase",
                operation, self.session.phase
            )));
        }
        Ok(())
    }

    fn case(&self) -> Result<&CaseDefinition> {
        self.session
            .case
            .as_ref()
            .ok_or_else(|| Error::Precondition("no case loaded".into()))
    }

    fn record(&mut self, kind: ActionKind, treatment: TreatmentKind, result: &str, delta: Option<i32>) {
        let elapsed_secs = self.session.elapsed_secs();
        self.session.action_history.push(ActionEntry {
            kind,
            label: treatment.display_name().to_string(),
            result: result.to_string(),
            health_delta: delta,
            elapsed_secs,
            timestamp: Utc::now(),
        });
    }

    fn outcome(
        &self,
        treatment: TreatmentKind,
        success: bool,
        result: String,
        health_delta: i32,
    ) -> TreatmentOutcome {
        TreatmentOutcome {
            treatment,
            success,
            result,
            health_delta,
            phase: self.session.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_default_catalog;
    use crate::TreatmentKind::*;

    const HYPERTHERMIA: &str = "malignant_hyperthermia";

    fn engine_with(settings: GameConfig) -> GameEngine {
        GameEngine::new(build_default_catalog(), settings, GameRng::new(42))
    }

    fn playing(case_id: &str) -> GameEngine {
        let mut engine = engine_with(GameConfig::default());
        engine.start_game_with_case(case_id).unwrap();
        engine
    }

    #[test]
    fn test_new_engine_waits_in_start_phase() {
        let mut engine = engine_with(GameConfig::default());
        assert_eq!(engine.phase(), GamePhase::Start);
        assert!(matches!(engine.apply_treatment(Scan), Err(Error::Precondition(_))));
        assert!(matches!(engine.tick(), Err(Error::Precondition(_))));
        assert!(engine.final_score().is_none());
    }

    #[test]
    fn test_start_game_initializes_session() {
        let mut engine = engine_with(GameConfig::default());
        engine.start_game().unwrap();

        let s = engine.session();
        assert_eq!(s.phase, GamePhase::Playing);
        assert_eq!(s.health, 100);
        assert_eq!(s.time_left, 300);
        assert_eq!(s.sequence_progress, 0);
        assert!(s.discovered_clues.is_empty());
        assert!(!s.has_acknowledged_failure);
        assert!(s.failure_reason.is_none());
        assert!(s.action_history.is_empty());
        assert_eq!(s.probabilities.len(), s.case.as_ref().unwrap().databases.len());
    }

    #[test]
    fn test_seeded_engines_draw_same_case() {
        let mut a = engine_with(GameConfig::default());
        let mut b = engine_with(GameConfig::default());
        a.start_game().unwrap();
        b.start_game().unwrap();
        assert_eq!(
            a.session().case.as_ref().unwrap().id,
            b.session().case.as_ref().unwrap().id
        );
        assert_eq!(a.session().probabilities, b.session().probabilities);
    }

    #[test]
    fn test_unknown_case_rejected() {
        let mut engine = engine_with(GameConfig::default());
        assert!(matches!(
            engine.start_game_with_case("broken_arm"),
            Err(Error::UnknownCase(_))
        ));
        assert_eq!(engine.phase(), GamePhase::Start);
    }

    // Scenario A: the full protocol in order wins.
    #[test]
    fn test_correct_protocol_wins() {
        crate::logging::init_test();
        let mut engine = playing(HYPERTHERMIA);

        let scan = engine.apply_treatment(Scan).unwrap();
        assert!(scan.success);
        assert_eq!(engine.session().sequence_progress, 1);
        assert_eq!(engine.session().health, 100);
        assert!(engine.session().has_clue(Clue::ScanComplete));

        engine.apply_treatment(Iv).unwrap();
        assert_eq!(engine.session().sequence_progress, 2);
        assert_eq!(engine.session().health, 100);

        engine.apply_treatment(Iv).unwrap();
        assert_eq!(engine.session().sequence_progress, 3);
        assert_eq!(engine.session().health, 100);

        let last = engine.apply_treatment(Oral).unwrap();
        assert!(last.success);
        assert_eq!(last.phase, GamePhase::Win);
        assert_eq!(engine.phase(), GamePhase::Win);
        assert_eq!(engine.session().health, 100);

        let final_entry = engine.session().action_history.last().unwrap();
        assert_eq!(final_entry.kind, ActionKind::TreatmentSuccess);
        assert_eq!(final_entry.health_delta, Some(40));
    }

    // Scenario B: first offense, rejected and accepted reflections, repeat offense.
    #[test]
    fn test_accountability_flow() {
        let mut engine = playing(HYPERTHERMIA);

        let wrong = engine.apply_treatment(Oral).unwrap();
        assert!(!wrong.success);
        assert_eq!(wrong.health_delta, -30);
        assert_eq!(engine.session().health, 70);
        assert_eq!(engine.session().sequence_progress, 0);
        let reason = engine.session().failure_reason.clone().unwrap();
        assert!(reason.contains("Diagnostic Scan"), "{}", reason);
        assert!(engine.session().requires_accountability());
        assert!(engine.session().has_clue(Clue::TreatmentFailed));

        let history_len = engine.session().action_history.len();
        assert!(matches!(
            engine.acknowledge_failure("sorry"),
            Err(Error::Validation(_))
        ));
        assert!(!engine.session().has_acknowledged_failure);
        assert_eq!(engine.session().action_history.len(), history_len);
        assert!(engine.session().failure_reason.is_some());

        engine
            .acknowledge_failure("I should have scanned first")
            .unwrap();
        assert!(engine.session().has_acknowledged_failure);
        assert!(engine.session().failure_reason.is_none());
        assert!(engine.session().has_clue(Clue::AcknowledgedMistake));
        assert_eq!(engine.session().sequence_progress, 0);
        let report = engine.session().action_history.last().unwrap();
        assert_eq!(report.kind, ActionKind::Accountability);
        assert_eq!(report.result, "I should have scanned first");

        let again = engine.apply_treatment(Oral).unwrap();
        assert!(!again.success);
        assert_eq!(engine.session().health, 65);
        assert!(engine.session().failure_reason.is_none());
        assert!(!engine.session().requires_accountability());
    }

    #[test]
    fn test_reflection_length_ignores_surrounding_whitespace() {
        let mut engine = playing(HYPERTHERMIA);
        engine.apply_treatment(Iv).unwrap();
        assert!(engine.acknowledge_failure("   short     ").is_err());
        assert!(engine.acknowledge_failure("  ten chars!  ").is_ok());
    }

    #[test]
    fn test_acknowledge_without_pending_failure_rejected() {
        let mut engine = playing(HYPERTHERMIA);
        assert!(matches!(
            engine.acknowledge_failure("I reflected on nothing at all"),
            Err(Error::NothingToAcknowledge)
        ));
        assert!(!engine.session().has_acknowledged_failure);
        assert!(engine.session().action_history.is_empty());

        // A second acknowledgement of the same failure is also rejected
        engine.apply_treatment(Oral).unwrap();
        engine.acknowledge_failure("Scan before treating").unwrap();
        assert!(matches!(
            engine.acknowledge_failure("Scan before treating"),
            Err(Error::NothingToAcknowledge)
        ));
    }

    #[test]
    fn test_mid_protocol_failure_uses_case_message() {
        let mut engine = playing(HYPERTHERMIA);
        engine.apply_treatment(Scan).unwrap();
        engine.apply_treatment(InjectionA).unwrap();

        let reason = engine.session().failure_reason.clone().unwrap();
        assert!(reason.starts_with("Protocol deviation. Patient temperature uncontrolled."));
        assert!(reason.ends_with("Expected next step: IV Drip."));
        assert_eq!(engine.session().sequence_progress, 1);
    }

    #[test]
    fn test_correct_step_clears_acknowledgement() {
        let mut engine = playing(HYPERTHERMIA);
        engine.apply_treatment(Oral).unwrap();
        engine.acknowledge_failure("Run the scan before anything").unwrap();
        engine.apply_treatment(Scan).unwrap();
        assert!(!engine.session().has_acknowledged_failure);

        // Next deviation is a first offense again
        engine.apply_treatment(Oral).unwrap();
        assert_eq!(engine.session().health, 40);
        assert!(engine.session().requires_accountability());
    }

    #[test]
    fn test_intermediate_step_heals_capped() {
        let mut engine = playing(HYPERTHERMIA);
        engine.apply_treatment(Scan).unwrap();
        engine.apply_treatment(Oral).unwrap(); // 100 -> 70
        engine.acknowledge_failure("IV comes before oral here").unwrap();

        let step = engine.apply_treatment(Iv).unwrap();
        assert_eq!(step.health_delta, 10);
        assert_eq!(engine.session().health, 80);

        let entry = engine.session().action_history.last().unwrap();
        assert_eq!(entry.kind, ActionKind::StepComplete);
        assert_eq!(entry.health_delta, Some(10));
    }

    #[test]
    fn test_scan_step_does_not_change_health() {
        let mut engine = playing(HYPERTHERMIA);
        engine.apply_treatment(Iv).unwrap(); // 100 -> 70
        engine.acknowledge_failure("Always scan the patient first").unwrap();

        let scan = engine.apply_treatment(Scan).unwrap();
        assert_eq!(scan.health_delta, 0);
        assert_eq!(engine.session().health, 70);
        assert!(scan.result.contains("Muscle rigidity"));
    }

    #[test]
    fn test_first_offense_always_costs_thirty_and_never_advances() {
        for case in build_default_catalog().cases {
            let mut engine = playing(&case.id);
            for kind in TreatmentKind::ALL.into_iter().filter(|k| *k != Scan) {
                engine.start_game_with_case(&case.id).unwrap();
                engine.apply_treatment(kind).unwrap();
                assert_eq!(engine.session().health, 70);
                assert_eq!(engine.session().sequence_progress, 0);
            }
        }
    }

    #[test]
    fn test_health_zero_loses_in_same_call() {
        let mut engine = playing(HYPERTHERMIA);
        for expected_health in [70, 40, 10] {
            let outcome = engine.apply_treatment(Oral).unwrap();
            assert_eq!(outcome.phase, GamePhase::Playing);
            assert_eq!(engine.session().health, expected_health);
        }

        let fatal = engine.apply_treatment(Oral).unwrap();
        assert_eq!(fatal.health_delta, -10);
        assert_eq!(fatal.phase, GamePhase::Lose);
        assert_eq!(engine.session().health, 0);
        assert_eq!(engine.phase(), GamePhase::Lose);
        assert!(matches!(engine.apply_treatment(Scan), Err(Error::Precondition(_))));
    }

    #[test]
    fn test_progress_is_monotonic_and_bounded() {
        let mut engine = playing("thyroid_storm");
        let plan = [Scan, Iv, Oral, InjectionB, Iv, Iv, InjectionA];
        let mut last = 0;

        for kind in plan {
            if engine.phase() != GamePhase::Playing {
                break;
            }
            if engine.session().requires_accountability() {
                engine.acknowledge_failure("Follow the handbook protocol").unwrap();
            }
            engine.apply_treatment(kind).unwrap();
            let progress = engine.session().sequence_progress;
            assert!(progress == last || progress == last + 1);
            assert!(progress <= 4);
            last = progress;
        }

        assert_eq!(engine.phase(), GamePhase::Win);
        assert_eq!(last, 4);
    }

    // Scenario C: the timer alone can lose the case.
    #[test]
    fn test_timer_expiry_loses() {
        let settings = GameConfig {
            time_budget_secs: 3,
            ..GameConfig::default()
        };
        let mut engine = engine_with(settings);
        engine.start_game_with_case(HYPERTHERMIA).unwrap();
        engine.apply_treatment(Scan).unwrap();

        assert_eq!(engine.tick().unwrap(), GamePhase::Playing);
        assert_eq!(engine.tick().unwrap(), GamePhase::Playing);
        assert_eq!(engine.tick().unwrap(), GamePhase::Lose);
        assert_eq!(engine.session().time_left, 0);
        assert_eq!(engine.session().health, 100);
        assert!(matches!(engine.tick(), Err(Error::Precondition(_))));

        let score = engine.final_score().unwrap();
        assert_eq!(score.outcome, Outcome::Lose);
        assert_eq!(score.time_secs, 3);
    }

    // Scenario D: a forced deceptive hard case ranks a distractor above the truth.
    #[test]
    fn test_forced_deception_misleads_database() {
        let settings = GameConfig {
            difficulty: Difficulty::Hard,
            deceptive_chance: 1.0,
            ..GameConfig::default()
        };
        let mut engine = engine_with(settings);
        engine.start_game_with_case(HYPERTHERMIA).unwrap();
        assert!(engine.session().deceptive);

        engine.apply_treatment(Scan).unwrap();
        let rows = engine.database_view();
        let correct = rows.iter().find(|r| r.entry.highlighted).unwrap();
        let best_wrong = rows
            .iter()
            .filter(|r| !r.entry.highlighted)
            .filter_map(|r| r.probability)
            .max()
            .unwrap();
        assert!(best_wrong > correct.probability.unwrap());
    }

    #[test]
    fn test_database_hidden_until_scan() {
        let mut engine = playing(HYPERTHERMIA);
        assert!(engine.database_view().iter().all(|r| r.probability.is_none()));
        assert!(engine.database_view().iter().all(|r| !r.flagged));

        engine.apply_treatment(Oral).unwrap();
        assert!(engine.database_view().iter().any(|r| r.flagged));

        engine.acknowledge_failure("Scan first, then treat").unwrap();
        engine.apply_treatment(Scan).unwrap();
        assert!(engine.database_view().iter().all(|r| r.probability.is_some()));
    }

    #[test]
    fn test_score_record_only_after_win() {
        let mut engine = playing("anaphylaxis");
        assert!(matches!(engine.score_record("Grey"), Err(Error::Precondition(_))));

        engine.apply_treatment(Oral).unwrap();
        engine.acknowledge_failure("Scan before giving anything").unwrap();
        engine.apply_treatment(Iv).unwrap();
        engine.consult_handbook("airway");
        for kind in [Scan, InjectionB, InjectionB, Oral] {
            engine.apply_treatment(kind).unwrap();
        }
        for _ in 0..12 {
            // Terminal phase: ticks are rejected and do not change the time
            assert!(engine.tick().is_err());
        }

        let record = engine.score_record("  Grey ").unwrap();
        assert_eq!(record.name, "Grey");
        assert_eq!(record.errors, 2);
        assert_eq!(record.time, 0);
        assert_eq!(record.case_name, "Anaphylaxis");
        assert_eq!(record.difficulty, Difficulty::Medium);
        assert!(record.handbook_used);
        assert!(engine.score_record("   ").is_err());
    }

    #[test]
    fn test_elapsed_time_recorded_in_log() {
        let mut engine = playing(HYPERTHERMIA);
        for _ in 0..7 {
            engine.tick().unwrap();
        }
        engine.apply_treatment(Scan).unwrap();
        assert_eq!(engine.session().action_history[0].elapsed_secs, 7);
    }

    #[test]
    fn test_one_log_entry_per_mutation() {
        let mut engine = playing(HYPERTHERMIA);
        engine.apply_treatment(Oral).unwrap();
        engine.acknowledge_failure("Protocol says scan first").unwrap();
        engine.apply_treatment(Oral).unwrap();
        engine.apply_treatment(Scan).unwrap();
        engine.consult_handbook("fever");
        assert_eq!(engine.session().action_history.len(), 4);
        assert_eq!(engine.session().notifications.items().len(), 3);
    }

    #[test]
    fn test_unrepresentable_ttl_prunes_with_default() {
        let settings = GameConfig {
            notification_ttl_secs: i64::MAX,
            ..GameConfig::default()
        };
        let mut engine = engine_with(settings);
        engine.start_game_with_case(HYPERTHERMIA).unwrap();
        engine.apply_treatment(Oral).unwrap();

        assert_eq!(engine.prune_notifications(), 0);
        assert_eq!(engine.session().notifications.items().len(), 1);
    }

    #[test]
    fn test_restart_discards_previous_session() {
        let mut engine = playing(HYPERTHERMIA);
        engine.apply_treatment(Oral).unwrap();
        engine.tick().unwrap();
        engine.consult_handbook("");

        engine.start_game_with_case("warfarin_toxicity").unwrap();
        let s = engine.session();
        assert_eq!(s.health, 100);
        assert_eq!(s.time_left, s.time_budget);
        assert!(s.action_history.is_empty());
        assert!(s.notifications.is_empty());
        assert!(s.failure_reason.is_none());
        assert!(!s.handbook_used);
        assert_eq!(s.case.as_ref().unwrap().id, "warfarin_toxicity");
    }

    #[test]
    fn test_patient_state_tracks_health() {
        let mut engine = playing(HYPERTHERMIA);
        assert_eq!(engine.session().patient_state(), PatientState::Stable);
        engine.apply_treatment(Oral).unwrap();
        assert_eq!(engine.session().patient_state(), PatientState::Deteriorating);
        engine.apply_treatment(Oral).unwrap();
        assert_eq!(engine.session().patient_state(), PatientState::Critical);
    }

    #[test]
    fn test_difficulty_applies_to_next_case() {
        let mut engine = engine_with(GameConfig::default());
        engine.set_difficulty(Difficulty::Easy);
        engine.start_game_with_case(HYPERTHERMIA).unwrap();
        assert_eq!(engine.session().difficulty, Difficulty::Easy);
        assert!(!engine.session().deceptive);
    }
}
