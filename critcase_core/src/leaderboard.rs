//! Leaderboard collaborator.
//!
//! Winning scores are appended to a JSONL file with file locking, so several
//! terminals can share one board. Ranking is fewest errors first, then
//! fastest time.

use crate::{Error, Result, ScoreRecord};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Longest accepted player name, in characters
pub const MAX_PLAYER_NAME_CHARS: usize = 20;

/// Score sink and ranking source
pub trait Leaderboard {
    fn submit(&mut self, record: &ScoreRecord) -> Result<()>;

    /// Best `n` scores, already ranked
    fn top(&self, n: usize) -> Result<Vec<ScoreRecord>>;
}

/// Trim a player name and check it fits on the board
pub fn validate_player_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("Player name must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_PLAYER_NAME_CHARS {
        return Err(Error::Validation(format!(
            "Player name must be at most {} characters",
            MAX_PLAYER_NAME_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

/// Sort by errors ascending, then time ascending
///
/// Ties keep submission order.
pub fn rank_scores(scores: &mut [ScoreRecord]) {
    scores.sort_by_key(|s| (s.errors, s.time));
}

/// JSONL-backed leaderboard with file locking
pub struct JsonlLeaderboard {
    path: PathBuf,
}

impl JsonlLeaderboard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl Leaderboard for JsonlLeaderboard {
    fn submit(&mut self, record: &ScoreRecord) -> Result<()> {
        let name = validate_player_name(&record.name)?;
        if name != record.name {
            return Err(Error::Leaderboard(
                "score record name was not normalized".into(),
            ));
        }
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Submitted score {} for {}", record.id, record.name);
        Ok(())
    }

    fn top(&self, n: usize) -> Result<Vec<ScoreRecord>> {
        let mut scores = read_scores(&self.path)?;
        rank_scores(&mut scores);
        scores.truncate(n);
        Ok(scores)
    }
}

/// Read every score from a leaderboard file, skipping malformed lines
pub fn read_scores(path: &Path) -> Result<Vec<ScoreRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut scores = Vec::new();

    // Split on raw bytes so one line of bad UTF-8 costs only that line
    for (line_num, line_result) in reader.split(b'\n').enumerate() {
        let line = match String::from_utf8(line_result?) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Skipping non-UTF-8 score at line {}: {}", line_num + 1, e);
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ScoreRecord>(&line) {
            Ok(score) => scores.push(score),
            Err(e) => {
                tracing::warn!("Failed to parse score at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} scores from {:?}", scores.len(), path);
    Ok(scores)
}

/// In-process leaderboard, used when nothing should touch the disk
#[derive(Debug, Default)]
pub struct MemoryLeaderboard {
    scores: Vec<ScoreRecord>,
}

impl MemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl Leaderboard for MemoryLeaderboard {
    fn submit(&mut self, record: &ScoreRecord) -> Result<()> {
        validate_player_name(&record.name)?;
        self.scores.push(record.clone());
        Ok(())
    }

    fn top(&self, n: usize) -> Result<Vec<ScoreRecord>> {
        let mut scores = self.scores.clone();
        rank_scores(&mut scores);
        scores.truncate(n);
        Ok(scores)
    }
}

/// A row in the CSV export
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Time (s)")]
    time: u32,
    #[serde(rename = "Errors")]
    errors: u32,
    #[serde(rename = "Case")]
    case_name: &'a str,
    #[serde(rename = "Difficulty")]
    difficulty: &'static str,
    #[serde(rename = "Handbook")]
    handbook: &'static str,
    #[serde(rename = "Timestamp")]
    timestamp: String,
}

impl<'a> From<&'a ScoreRecord> for CsvRow<'a> {
    fn from(score: &'a ScoreRecord) -> Self {
        CsvRow {
            name: &score.name,
            time: score.time,
            errors: score.errors,
            case_name: &score.case_name,
            difficulty: score.difficulty.as_str(),
            handbook: if score.handbook_used { "yes" } else { "no" },
            timestamp: score.recorded_at.to_rfc3339(),
        }
    }
}

/// Write ranked scores to a CSV file, replacing any existing export
pub fn export_csv(scores: &[ScoreRecord], csv_path: &Path) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(csv_path)?;
    for score in scores {
        writer.serialize(CsvRow::from(score))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Exported {} scores to {:?}", scores.len(), csv_path);
    Ok(scores.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Difficulty;
    use chrono::Utc;
    use uuid::Uuid;

    fn score(name: &str, time: u32, errors: u32) -> ScoreRecord {
        ScoreRecord {
            id: Uuid::new_v4(),
            name: name.into(),
            time,
            errors,
            case_name: "Anaphylaxis".into(),
            difficulty: Difficulty::Medium,
            handbook_used: false,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_rank_by_errors_then_time() {
        let mut scores = vec![
            score("slow", 200, 0),
            score("sloppy", 30, 2),
            score("fast", 45, 0),
            score("middle", 60, 1),
        ];
        rank_scores(&mut scores);
        let names: Vec<_> = scores.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["fast", "slow", "middle", "sloppy"]);
    }

    #[test]
    fn test_player_name_validation() {
        assert_eq!(validate_player_name("  House ").unwrap(), "House");
        assert!(validate_player_name("   ").is_err());
        assert!(validate_player_name(&"x".repeat(21)).is_err());
        assert!(validate_player_name(&"x".repeat(20)).is_ok());
    }

    #[test]
    fn test_jsonl_submit_and_top() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("leaderboard.jsonl");
        let mut board = JsonlLeaderboard::new(&path);

        board.submit(&score("b", 90, 1)).unwrap();
        board.submit(&score("a", 120, 0)).unwrap();
        board.submit(&score("c", 60, 3)).unwrap();

        let top = board.top(2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "a");
        assert_eq!(top[1].name, "b");
    }

    #[test]
    fn test_jsonl_rejects_unnormalized_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut board = JsonlLeaderboard::new(temp_dir.path().join("board.jsonl"));
        assert!(board.submit(&score(" padded ", 10, 0)).is_err());
        assert!(board.submit(&score("", 10, 0)).is_err());
        assert!(!board.path().exists());
    }

    #[test]
    fn test_missing_file_is_empty_board() {
        let temp_dir = tempfile::tempdir().unwrap();
        let board = JsonlLeaderboard::new(temp_dir.path().join("none.jsonl"));
        assert!(board.top(10).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("board.jsonl");
        let mut board = JsonlLeaderboard::new(&path);
        board.submit(&score("kept", 10, 0)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
        board.submit(&score("also kept", 20, 0)).unwrap();

        assert_eq!(read_scores(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("board.jsonl");
        let mut board = JsonlLeaderboard::new(&path);
        board.submit(&score("before", 30, 0)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"name\":\"\xff\xfe\"}\r\n").unwrap();
        board.submit(&score("after", 15, 0)).unwrap();

        let names: Vec<_> = board.top(10).unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["after", "before"]);
    }

    #[test]
    fn test_memory_leaderboard() {
        let mut board = MemoryLeaderboard::new();
        assert!(board.is_empty());
        board.submit(&score("x", 50, 1)).unwrap();
        board.submit(&score("y", 40, 1)).unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board.top(1).unwrap()[0].name, "y");
    }

    #[test]
    fn test_export_csv_headers_and_rows() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("export.csv");

        let mut used = score("Grey", 75, 1);
        used.handbook_used = true;
        let written = export_csv(&[used, score("Shep", 90, 2)], &csv_path).unwrap();
        assert_eq!(written, 2);

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Name,Time (s),Errors,Case,Difficulty,Handbook,Timestamp"
        );
        assert!(lines.next().unwrap().starts_with("Grey,75,1,Anaphylaxis,medium,yes,"));
        assert!(lines.next().unwrap().starts_with("Shep,90,2,Anaphylaxis,medium,no,"));
    }
}
