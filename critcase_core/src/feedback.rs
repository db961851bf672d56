//! Post-game feedback collaborator.
//!
//! A finished case is summarized into a prompt and handed to a configured
//! external program (for example a local LLM CLI). When no program is
//! configured, or every provider fails, a templated message is used instead.

use crate::engine::GameSession;
use crate::{Error, FinalScore, Outcome, Result};
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// How long an external generator may run when no timeout is configured
pub const DEFAULT_FEEDBACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a feedback generator may look at
#[derive(Clone, Debug)]
pub struct FeedbackRequest {
    pub player_name: String,
    pub case_name: String,
    pub scan_clue: String,
    pub score: FinalScore,
    /// One line per action: `(elapsed_secs, label, result)`
    pub actions: Vec<(u32, String, String)>,
}

impl FeedbackRequest {
    /// Build a request from a finished session
    pub fn from_session(
        player_name: &str,
        session: &GameSession,
        score: FinalScore,
    ) -> Result<Self> {
        let case = session
            .case
            .as_ref()
            .ok_or_else(|| Error::Precondition("feedback requested without a case".into()))?;
        Ok(Self {
            player_name: player_name.to_string(),
            case_name: case.name.clone(),
            scan_clue: case.scan_clue.clone(),
            score,
            actions: session
                .action_history
                .iter()
                .map(|a| (a.elapsed_secs, a.label.clone(), a.result.clone()))
                .collect(),
        })
    }
}

/// Produces free-text feedback for a finished case
pub trait FeedbackProvider {
    fn generate(&self, request: &FeedbackRequest) -> Result<String>;
}

/// Prompt sent to external generators
pub fn build_prompt(request: &FeedbackRequest) -> String {
    let actions = request
        .actions
        .iter()
        .map(|(secs, label, result)| format!("- {}s: {} ({})", secs, label, result))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a Senior Medical Resident Supervisor giving feedback to a junior doctor named {name}.\n\
         \n\
         Context:\n\
         - Case: {case}\n\
         - Outcome: {outcome}\n\
         - Final Score: {errors} Errors, {time}s Time\n\
         \n\
         Key Findings: {clue}\n\
         \n\
         Player's Actions Log:\n\
         {actions}\n\
         \n\
         Task:\n\
         Provide brief, constructive, and professional feedback (max 3 sentences).\n\
         If they won, congratulate them but point out any minor errors if present.\n\
         If they lost, explain the critical mistake in a firm but educational tone.\n\
         Focus on clinical reasoning. Do not use emojis.",
        name = request.player_name,
        case = request.case_name,
        outcome = request.score.outcome,
        errors = request.score.errors,
        time = request.score.time_secs,
        clue = request.scan_clue,
        actions = actions,
    )
}

/// Templated feedback, used whenever no generator produced text
pub fn fallback_feedback(player_name: &str, score: &FinalScore) -> String {
    match score.outcome {
        Outcome::Win if score.errors == 0 => format!(
            "Excellent work, Dr. {}. Perfect execution of the protocol in {} seconds. Your clinical reasoning was flawless.",
            player_name, score.time_secs
        ),
        Outcome::Win => format!(
            "Good job, Dr. {}. You saved the patient in {} seconds, though {} protocol deviation(s) were noted. Review your approach for improvement.",
            player_name, score.time_secs, score.errors
        ),
        Outcome::Lose => format!(
            "Dr. {}, the patient was lost. {} critical error(s) led to this outcome. Please review the handbook and study the correct protocols before your next case.",
            player_name, score.errors
        ),
    }
}

/// Runs an external program with the prompt on stdin and reads its stdout
///
/// A program that outlives its timeout is killed and reported as a failure.
#[derive(Clone, Debug)]
pub struct CommandFeedback {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandFeedback {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_FEEDBACK_TIMEOUT,
        }
    }

    /// Build from a config command line (`["program", "arg", ...]`)
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn expire(&self, child: &mut Child) -> Error {
        if let Err(e) = child.kill() {
            tracing::debug!("Failed to kill {}: {}", self.program, e);
        }
        let _ = child.wait();
        Error::Feedback(format!(
            "{} did not answer within {}s",
            self.program,
            self.timeout.as_secs_f32()
        ))
    }

    /// Wait for the exit status without going past `deadline`
    fn wait_until(&self, child: &mut Child, deadline: Instant) -> Result<ExitStatus> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                return Err(self.expire(child));
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl FeedbackProvider for CommandFeedback {
    fn generate(&self, request: &FeedbackRequest) -> Result<String> {
        let prompt = build_prompt(request);
        let deadline = Instant::now() + self.timeout;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Feedback(format!("failed to start {}: {}", self.program, e)))?;

        // A stalled child may block these threads, never the caller.
        if let Some(mut stdin) = child.stdin.take() {
            std::thread::spawn(move || {
                if let Err(e) = stdin.write_all(prompt.as_bytes()) {
                    tracing::debug!("Feedback program closed stdin early: {}", e);
                }
            });
        }

        let (tx, rx) = mpsc::channel();
        if let Some(mut stdout) = child.stdout.take() {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = tx.send(stdout.read_to_end(&mut buf).map(|_| buf));
            });
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let stdout = match rx.recv_timeout(remaining) {
            Ok(read) => read?,
            Err(mpsc::RecvTimeoutError::Timeout) => return Err(self.expire(&mut child)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                let _ = self.expire(&mut child);
                return Err(Error::Feedback("stdout reader stopped".into()));
            }
        };

        let status = self.wait_until(&mut child, deadline)?;
        if !status.success() {
            return Err(Error::Feedback(format!(
                "{} exited with {}",
                self.program, status
            )));
        }

        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }
}

/// Try each provider in turn, falling back to the template
///
/// Never fails: provider errors and empty responses are logged and skipped.
pub fn feedback_or_fallback(
    providers: &[Box<dyn FeedbackProvider>],
    request: &FeedbackRequest,
) -> String {
    for (idx, provider) in providers.iter().enumerate() {
        match provider.generate(request) {
            Ok(text) if !text.trim().is_empty() => return text,
            Ok(_) => tracing::warn!("Feedback provider {} returned no text", idx),
            Err(e) => tracing::warn!("Feedback provider {} failed: {}", idx, e),
        }
    }
    fallback_feedback(&request.player_name, &request.score)
}
