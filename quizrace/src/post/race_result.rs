use std::fmt;
use std::fmt::Write;
use std::io::Write as IoWrite;

use serde::{Deserialize, Serialize};

/// fmt_time_ms formats a race time in milliseconds as M:SS.ss.
pub fn fmt_time_ms(time_ms: f64) -> String {
    let total_s = time_ms / 1000.0;
    let minutes = (total_s / 60.0).floor() as u32;
    let seconds = total_s - f64::from(minutes) * 60.0;

    format!("{}:{:05.2}", minutes, seconds)
}

/// QuizTally counts the quiz outcomes of a single race. Timeouts are graded like any
/// other wrong answer, so they are a subset of the incorrect count.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default)]
pub struct QuizTally {
    pub asked: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub timeouts: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum RaceEventKind {
    CheckpointHit,
    AnswerCorrect,
    AnswerIncorrect,
    QuestionTimeout,
    PlayerFinish,
    BotFinish,
    SpectatorMode,
}

impl fmt::Display for RaceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RaceEventKind::CheckpointHit => write!(f, "checkpoint hit"),
            RaceEventKind::AnswerCorrect => write!(f, "answer correct"),
            RaceEventKind::AnswerIncorrect => write!(f, "answer incorrect"),
            RaceEventKind::QuestionTimeout => write!(f, "question timeout"),
            RaceEventKind::PlayerFinish => write!(f, "player finish"),
            RaceEventKind::BotFinish => write!(f, "bot finish"),
            RaceEventKind::SpectatorMode => write!(f, "spectator mode"),
        }
    }
}

/// RaceEvent is a single timestamped entry of the race event log.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RaceEvent {
    pub kind: RaceEventKind,
    pub time_ms: f64,
    pub detail: String,
}

/// ProgressSample stores the track progress of every car at one point in time. The
/// order of the progress values matches RaceResult::trace_names.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProgressSample {
    pub time_ms: f64,
    pub progress: Vec<f64>,
}

/// StandingEntry is one row of the final standings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StandingEntry {
    pub rank: u32,
    pub name: String,
    pub tier: Option<String>,
    pub finish_time_ms: Option<u32>,
    pub progress: f64,
}

/// RaceResult contains all race information that is required for post-processing the
/// results (summary printing, file export and progress plotting).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RaceResult {
    pub player_name: String,
    pub standings: Vec<StandingEntry>,
    pub player_finished: bool,
    pub player_spectating: bool,
    pub final_time_ms: Option<u32>,
    pub lives_used: u32,
    pub max_lives: u32,
    pub best_streak: u32,
    pub tally: QuizTally,
    pub events: Vec<RaceEvent>,
    pub trace_names: Vec<String>,
    pub progress_trace: Vec<ProgressSample>,
}

impl RaceResult {
    /// build_summary renders the final standings, the player outcome, the question
    /// tally and the event log into a single string.
    pub fn build_summary(&self) -> String {
        let mut content = String::new();

        writeln!(&mut content, "RESULT: Final standings").unwrap();
        for entry in self.standings.iter() {
            let tier = entry
                .tier
                .as_ref()
                .map_or(String::new(), |tier| format!(" ({})", tier));

            match entry.finish_time_ms {
                Some(time_ms) => writeln!(
                    &mut content,
                    "{:3}. {}{} - {}",
                    entry.rank,
                    entry.name,
                    tier,
                    fmt_time_ms(f64::from(time_ms))
                )
                .unwrap(),
                None => writeln!(
                    &mut content,
                    "{:3}. {}{} - DNF ({:.0}% of the track)",
                    entry.rank,
                    entry.name,
                    tier,
                    entry.progress * 100.0
                )
                .unwrap(),
            }
        }

        let outcome = match (self.player_finished, self.final_time_ms) {
            (true, Some(time_ms)) => format!("finished in {}", fmt_time_ms(f64::from(time_ms))),
            _ if self.player_spectating => "out of lives".to_owned(),
            _ => "did not finish".to_owned(),
        };

        writeln!(&mut content, "RESULT: Player").unwrap();
        writeln!(
            &mut content,
            "{}, lives used {} of {}, best streak {}",
            outcome, self.lives_used, self.max_lives, self.best_streak
        )
        .unwrap();

        writeln!(&mut content, "RESULT: Questions").unwrap();
        writeln!(
            &mut content,
            "asked {}, correct {}, incorrect {} ({} timed out)",
            self.tally.asked, self.tally.correct, self.tally.incorrect, self.tally.timeouts
        )
        .unwrap();

        writeln!(&mut content, "RESULT: Event log").unwrap();
        for event in self.events.iter() {
            writeln!(
                &mut content,
                "[{}] {} - {}",
                fmt_time_ms(event.time_ms),
                event.kind,
                event.detail
            )
            .unwrap();
        }

        content
    }

    /// print_summary prints the race summary to the console output.
    pub fn print_summary(&self) {
        print!("{}", self.build_summary());
    }

    /// write_summary_to_file writes the race summary to a text file in output/.
    /// Returns the path to the written file.
    pub fn write_summary_to_file(&self, path: Option<&std::path::Path>) -> anyhow::Result<String> {
        let content = self.build_summary();

        let out_dir = std::path::Path::new("output");
        std::fs::create_dir_all(out_dir)?;
        let out_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            out_dir.join("last_race.txt")
        };

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&out_path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;

        Ok(out_path.to_string_lossy().into_owned())
    }
}
