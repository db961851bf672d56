use clap::{Parser, Subcommand};
use critcase_core::engine::MIN_REFLECTION_CHARS;
use critcase_core::feedback::{self, FeedbackRequest};
use critcase_core::leaderboard::{self, JsonlLeaderboard, Leaderboard};
use critcase_core::*;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

const LEADERBOARD_FILE: &str = "leaderboard.jsonl";
const PROFILE_FILE: &str = "profile.json";
const DEFAULT_PLAYER: &str = "Anonymous";
/// How often the clock is checked while waiting for input
const INPUT_POLL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "critcase")]
#[command(about = "Critical Case: an emergency-room protocol training game", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a case (default)
    Play(PlayArgs),

    /// Show the best scores
    Leaderboard {
        /// Number of scores to show
        #[arg(long)]
        top: Option<usize>,

        /// Also write the ranked scores to this CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Search the medical handbook
    Handbook {
        /// Disease name or symptom to look for
        query: Option<String>,
    },

    /// List the cases in the catalog
    Cases,
}

#[derive(clap::Args, Default)]
struct PlayArgs {
    /// Difficulty (easy, medium, hard)
    #[arg(long)]
    difficulty: Option<String>,

    /// Seed for a reproducible case draw
    #[arg(long)]
    seed: Option<u64>,

    /// Play a specific case by id
    #[arg(long = "case")]
    case_id: Option<String>,

    /// Player name for the leaderboard
    #[arg(long)]
    name: Option<String>,

    /// Run a comma-separated command script instead of reading stdin
    #[arg(long, value_delimiter = ',')]
    actions: Option<Vec<String>>,

    /// Reflection used whenever a scripted run hits the accountability gate
    #[arg(long)]
    reflection: Option<String>,

    /// Do not submit a winning score
    #[arg(long)]
    no_submit: bool,
}

fn main() -> Result<()> {
    critcase_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Some(Commands::Play(args)) => cmd_play(data_dir, args, &config),
        Some(Commands::Leaderboard { top, export }) => {
            cmd_leaderboard(&data_dir, top.unwrap_or(config.leaderboard.top_n), export)
        }
        Some(Commands::Handbook { query }) => cmd_handbook(query.as_deref().unwrap_or("")),
        Some(Commands::Cases) => cmd_cases(),
        None => cmd_play(data_dir, PlayArgs::default(), &config),
    }
}

// ============================================================================
// play
// ============================================================================

fn cmd_play(data_dir: PathBuf, args: PlayArgs, config: &Config) -> Result<()> {
    let catalog = build_default_catalog();
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid catalog".into()));
    }

    let profile_path = data_dir.join(PROFILE_FILE);
    let profile = PlayerProfile::load(&profile_path)?;

    let mut settings = config.game.clone();
    if let Some(difficulty) = &args.difficulty {
        settings.difficulty = difficulty.parse()?;
    }

    let rng = match args.seed {
        Some(seed) => GameRng::new(seed),
        None => GameRng::from_entropy(),
    };

    let scripted = args.actions.is_some();
    let player_name = match args.name.as_deref().or(profile.name.as_deref()) {
        Some(name) => leaderboard::validate_player_name(name)?,
        None if scripted => DEFAULT_PLAYER.to_string(),
        None => prompt_player_name()?,
    };

    let mut engine = GameEngine::new(catalog, settings, rng);
    match &args.case_id {
        Some(id) => engine.start_game_with_case(id)?,
        None => engine.start_game()?,
    }

    print_briefing(&engine, &player_name);

    match &args.actions {
        Some(actions) => run_scripted(&mut engine, actions, args.reflection.as_deref())?,
        None => run_interactive(&mut engine)?,
    }

    let Some(score) = engine.final_score() else {
        println!("\nCase abandoned. No score recorded.");
        return Ok(());
    };

    finish_case(&engine, &score, &player_name, &data_dir, &args, config)?;

    let difficulty = engine.session().difficulty;
    if let Err(e) = PlayerProfile::update(&profile_path, |p| {
        p.name = Some(player_name.clone());
        p.record_result(score.outcome, score.time_secs, difficulty);
        Ok(())
    }) {
        tracing::warn!("Failed to update player profile: {}", e);
    }

    Ok(())
}

fn finish_case(
    engine: &GameEngine,
    score: &FinalScore,
    player_name: &str,
    data_dir: &Path,
    args: &PlayArgs,
    config: &Config,
) -> Result<()> {
    let session = engine.session();
    let case_name = session.case.as_ref().map(|c| c.name.as_str()).unwrap_or("");

    println!();
    match score.outcome {
        Outcome::Win => println!("PATIENT STABILIZED: {}", case_name),
        Outcome::Lose => println!("PATIENT LOST: {}", case_name),
    }
    if let Some(case) = &session.case {
        println!("  Protocol: {}", case.protocol_summary());
    }
    println!("  Score: {}s, {} error(s)", score.time_secs, score.errors);

    if score.outcome == Outcome::Win {
        if args.no_submit {
            println!("  Score not submitted (--no-submit)");
        } else {
            let mut board = JsonlLeaderboard::new(data_dir.join(LEADERBOARD_FILE));
            match engine
                .score_record(player_name)
                .and_then(|record| board.submit(&record))
            {
                Ok(()) => println!("  Score submitted to leaderboard"),
                Err(e) => {
                    tracing::warn!("Leaderboard submission failed: {}", e);
                    println!("  Leaderboard unavailable, score not saved");
                }
            }
        }
    }

    let providers: Vec<Box<dyn FeedbackProvider>> =
        CommandFeedback::from_command_line(&config.feedback.command)
            .map(|p| p.with_timeout(Duration::from_secs(config.feedback.timeout_secs)))
            .map(|p| Box::new(p) as Box<dyn FeedbackProvider>)
            .into_iter()
            .collect();
    let request = FeedbackRequest::from_session(player_name, session, *score)?;
    println!();
    println!("Supervisor feedback:");
    println!("  {}", feedback::feedback_or_fallback(&providers, &request));

    Ok(())
}

fn run_scripted(engine: &mut GameEngine, actions: &[String], reflection: Option<&str>) -> Result<()> {
    for action in actions {
        if engine.phase().is_terminal() {
            break;
        }
        println!("> {}", action);
        if let Flow::Quit = run_command(engine, action)? {
            break;
        }

        if engine.session().requires_accountability() {
            let Some(text) = reflection else {
                return Err(Error::Validation(
                    "Accountability report required; pass --reflection to continue".into(),
                ));
            };
            engine.acknowledge_failure(text)?;
            println!("Medical report filed.");
        }
    }

    if !engine.phase().is_terminal() {
        println!("\nScript finished with the case still in progress.");
        print_status(engine);
    }
    Ok(())
}

fn run_interactive(engine: &mut GameEngine) -> Result<()> {
    let lines = spawn_stdin_reader();
    let mut clock = TickClock::start();

    print_help();

    while !engine.phase().is_terminal() {
        print!("[{} | {}] > ", format_clock(engine.session().time_left), engine.session().health);
        io::stdout().flush()?;

        let line = match next_input(&lines, &mut clock, engine)? {
            Input::Line(line) => line,
            Input::TimeUp => {
                println!("\nTime is up!");
                break;
            }
            Input::Eof => break,
        };

        if let Flow::Quit = run_command(engine, &line)? {
            break;
        }

        while engine.session().requires_accountability() {
            if let Some(reason) = &engine.session().failure_reason {
                println!();
                println!("MEDICAL INCIDENT REPORT");
                println!("  {}", reason);
            }
            println!(
                "  Explain what went wrong (at least {} characters):",
                MIN_REFLECTION_CHARS
            );
            print!("report> ");
            io::stdout().flush()?;

            let text = match next_input(&lines, &mut clock, engine)? {
                Input::Line(text) => text,
                Input::TimeUp => {
                    println!("\nTime is up!");
                    return Ok(());
                }
                Input::Eof => return Ok(()),
            };
            match engine.acknowledge_failure(&text) {
                Ok(()) => println!("Report filed. Continue the protocol."),
                Err(Error::Validation(msg)) => println!("  {}", msg),
                Err(e) => return Err(e),
            }
        }
    }

    Ok(())
}

enum Input {
    Line(String),
    Eof,
    TimeUp,
}

/// Read stdin on a background thread so the clock keeps running between lines
fn spawn_stdin_reader() -> mpsc::Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        loop {
            let mut line = String::new();
            match stdin.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let line = line.trim_end_matches(&['\r', '\n'][..]).to_string();
                    if tx.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });
    rx
}

/// Wait for the next line, ending the wait early if the case runs out of time
fn next_input(
    lines: &mpsc::Receiver<io::Result<String>>,
    clock: &mut TickClock,
    engine: &mut GameEngine,
) -> Result<Input> {
    loop {
        match lines.recv_timeout(INPUT_POLL) {
            Ok(line) => {
                let line = line?;
                if clock.catch_up(engine)?.is_terminal() {
                    return Ok(Input::TimeUp);
                }
                return Ok(Input::Line(line));
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if clock.catch_up(engine)?.is_terminal() {
                    return Ok(Input::TimeUp);
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(Input::Eof),
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Execute one player command against a running case
fn run_command(engine: &mut GameEngine, line: &str) -> Result<Flow> {
    let line = line.trim();
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

    match command.to_lowercase().as_str() {
        "" => {}
        "quit" | "exit" => return Ok(Flow::Quit),
        "help" | "?" => print_help(),
        "status" => print_status(engine),
        "db" | "database" => print_database(engine),
        "log" => print_log(engine.session()),
        "handbook" => {
            let hits = engine.consult_handbook(rest);
            print_handbook(&hits);
        }
        other => match other.parse::<TreatmentKind>() {
            Ok(_) if engine.session().requires_accountability() => {
                println!("Accountability report required before further treatment.");
            }
            Ok(kind) => {
                let outcome = engine.apply_treatment(kind)?;
                let marker = if outcome.success { "OK" } else { "FAILED" };
                println!("{} {}: {}", marker, kind.display_name(), outcome.result);
                if outcome.health_delta != 0 {
                    println!("  Health {:+} -> {}", outcome.health_delta, engine.session().health);
                }
            }
            Err(_) => println!("Unknown command '{}'. Type 'help' for options.", other),
        },
    }

    Ok(Flow::Continue)
}

/// Converts wall-clock time into whole engine ticks
struct TickClock {
    last: Instant,
}

impl TickClock {
    fn start() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(last: Instant) -> Self {
        Self { last }
    }

    fn catch_up(&mut self, engine: &mut GameEngine) -> Result<GamePhase> {
        self.catch_up_at(Instant::now(), engine)
    }

    /// Apply every whole second between the last tick and `now`
    ///
    /// The fractional remainder carries over to the next call.
    fn catch_up_at(&mut self, now: Instant, engine: &mut GameEngine) -> Result<GamePhase> {
        let due = due_ticks(now.saturating_duration_since(self.last));
        self.last += Duration::from_secs(due);

        for _ in 0..due {
            if engine.phase() != GamePhase::Playing {
                break;
            }
            engine.tick()?;
        }
        Ok(engine.phase())
    }
}

fn due_ticks(elapsed: Duration) -> u64 {
    elapsed.as_secs()
}

fn prompt_player_name() -> Result<String> {
    let stdin = io::stdin();
    loop {
        print!("Doctor, enter your name: ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            return Ok(DEFAULT_PLAYER.to_string());
        }
        match leaderboard::validate_player_name(&input) {
            Ok(name) => return Ok(name),
            Err(e) => println!("  {}", e),
        }
    }
}

// ============================================================================
// Display
// ============================================================================

fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn print_briefing(engine: &GameEngine, player_name: &str) {
    let session = engine.session();
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  INCOMING PATIENT");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Attending: Dr. {}", player_name);
    println!("  Difficulty: {}", session.difficulty);
    println!("  Time limit: {}", format_clock(session.time_budget));
    println!("  Protocol steps: {}", session.case.as_ref().map_or(0, |c| c.required_sequence.len()));
    println!();
}

fn print_help() {
    println!("Treatments: scan, injection_a, injection_b, oral, iv");
    println!("Other: db, handbook <query>, status, log, help, quit");
}

fn print_status(engine: &mut GameEngine) {
    engine.prune_notifications();
    let session = engine.session();
    let total = session.case.as_ref().map_or(0, |c| c.required_sequence.len());

    println!("  Health: {} ({:?})", session.health, session.patient_state());
    println!("  Time left: {}", format_clock(session.time_left));
    println!("  Protocol progress: {}/{}", session.sequence_progress, total);
    for clue in &session.discovered_clues {
        println!("  Clue: {}", clue.describe());
    }
    if let Some(reason) = &session.failure_reason {
        println!("  Pending report: {}", reason);
    }
    for n in session.notifications.items() {
        match n.health_delta {
            Some(delta) => println!("  [{} {:+}]", n.message, delta),
            None => println!("  [{}]", n.message),
        }
    }
}

fn print_database(engine: &GameEngine) {
    let rows = engine.database_view();
    if !engine.session().has_clue(Clue::ScanComplete) {
        println!("Database locked. Run a diagnostic scan first.");
        return;
    }

    println!("Possible diagnoses:");
    for row in rows {
        let probability = row
            .probability
            .map_or_else(|| "--".to_string(), |p| format!("{}%", p));
        let flag = if row.flagged { "  <- review" } else { "" };
        println!("  {:>4}  {}{}", probability, row.entry.disease, flag);
        println!("        Symptoms: {}", row.entry.symptoms.join(", "));
        println!("        Cure: {}", row.entry.cure);
        println!("        Notes: {}", row.entry.notes);
    }
}

fn print_log(session: &GameSession) {
    if session.action_history.is_empty() {
        println!("No actions yet.");
        return;
    }
    for entry in &session.action_history {
        let delta = entry
            .health_delta
            .map(|d| format!(" ({:+})", d))
            .unwrap_or_default();
        println!(
            "  {}s  {}: {}{}",
            entry.elapsed_secs, entry.label, entry.result, delta
        );
    }
}

fn print_handbook(entries: &[&handbook::HandbookEntry]) {
    if entries.is_empty() {
        println!("No handbook entries match.");
        return;
    }
    for entry in entries {
        println!("{}", entry.name);
        println!("  Symptoms: {}", entry.symptoms);
        println!("  Protocol: {}", entry.protocol);
        println!("  Medications: {}", entry.medications);
        println!("  Alert: {}", entry.alert);
    }
}

// ============================================================================
// Other commands
// ============================================================================

fn cmd_leaderboard(data_dir: &Path, top: usize, export: Option<PathBuf>) -> Result<()> {
    let board = JsonlLeaderboard::new(data_dir.join(LEADERBOARD_FILE));
    let scores = board.top(top)?;

    if scores.is_empty() {
        println!("No scores yet.");
    } else {
        println!("{:<4} {:<20} {:>8} {:>6}  {:<24} {:<8}", "#", "Name", "Time", "Errors", "Case", "Level");
        for (rank, s) in scores.iter().enumerate() {
            let handbook = if s.handbook_used { " (handbook)" } else { "" };
            println!(
                "{:<4} {:<20} {:>7}s {:>6}  {:<24} {:<8}{}",
                rank + 1,
                s.name,
                s.time,
                s.errors,
                s.case_name,
                s.difficulty.as_str(),
                handbook
            );
        }
    }

    if let Some(path) = export {
        let count = leaderboard::export_csv(&scores, &path)?;
        println!("✓ Exported {} scores to {}", count, path.display());
    }

    Ok(())
}

fn cmd_handbook(query: &str) -> Result<()> {
    print_handbook(&handbook::search(query));
    Ok(())
}

fn cmd_cases() -> Result<()> {
    for case in &get_default_catalog().cases {
        println!("{:<24} {}", case.id, case.name);
    }
    Ok(())
}
