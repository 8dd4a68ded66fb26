use crate::core::autopilot::AutoPilotPars;
use crate::core::bot::{default_bot_roster, BotPars};
use crate::core::car::PhysicsPars;
use crate::core::game::RacePars;
use crate::core::quiz::QuizPars;
use crate::core::track::TrackPars;
use crate::services::question_bank::Question;
use anyhow::Context;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;

/// GamePars is used to store all other parameter structs. Every section is optional in
/// the JSON file and falls back to its default.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GamePars {
    pub race_pars: RacePars,
    pub phys_pars: PhysicsPars,
    pub track_pars: TrackPars,
    pub quiz_pars: QuizPars,
    pub autopilot_pars: AutoPilotPars,
    pub bot_pars_all: Vec<BotPars>,
}

impl Default for GamePars {
    fn default() -> GamePars {
        GamePars {
            race_pars: RacePars::default(),
            phys_pars: PhysicsPars::default(),
            track_pars: TrackPars::default(),
            quiz_pars: QuizPars::default(),
            autopilot_pars: AutoPilotPars::default(),
            bot_pars_all: default_bot_roster(),
        }
    }
}

/// read_game_pars reads the JSON file and decodes the JSON string into the game
/// parameters struct.
pub fn read_game_pars(filepath: &Path) -> anyhow::Result<GamePars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.to_str().unwrap_or("unknown")
        ))?;
    let pars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.to_str().unwrap_or("unknown")
    ))?;
    Ok(pars)
}

/// read_question_bank reads a JSON array of questions for the local question bank.
/// Unlike questions served over HTTP, locally stored questions must carry their
/// correct option, otherwise grading would mark every answer as wrong.
pub fn read_question_bank(filepath: &Path) -> anyhow::Result<Vec<Question>> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open question bank file {}!",
            filepath.to_str().unwrap_or("unknown")
        ))?;
    let questions: Vec<Question> = serde_json::from_reader(&fh).context(format!(
        "Failed to parse question bank file {}!",
        filepath.to_str().unwrap_or("unknown")
    ))?;

    if questions.is_empty() {
        anyhow::bail!(
            "Question bank file {} contains no questions!",
            filepath.to_str().unwrap_or("unknown")
        );
    }

    for question in questions.iter() {
        if question.correct_option.is_empty() {
            anyhow::bail!(
                "Question {} in bank file {} has no correct option!",
                question.question_id,
                filepath.to_str().unwrap_or("unknown")
            );
        }
    }

    Ok(questions)
}
