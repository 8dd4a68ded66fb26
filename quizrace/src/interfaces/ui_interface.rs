use crate::core::game::GameMode;
use crate::core::quiz::QuizPhase;
use crate::post::race_result::RaceResult;
use crate::services::question_bank::QuestionOptions;

pub const MAX_UI_UPDATE_FREQUENCY: f64 = 20.0;

#[derive(Debug, Clone, Default)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, Default)]
pub struct CarFrame {
    pub name: String,
    pub color: RgbColor,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub speed: f64,
    pub progress: f64,
    pub is_player: bool,
    pub has_finished: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CheckpointFrame {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub difficulty: u8,
    pub color: RgbColor,
    pub completed: bool,
}

/// Aktywne pytanie w klatce UI. Poprawna opcja celowo nie wchodzi do klatki,
/// ocena odpowiedzi należy do rejestru sesji.
#[derive(Debug, Clone)]
pub struct QuizFrame {
    pub question_id: i32,
    pub topic: String,
    pub difficulty: u8,
    pub body_markup: String,
    pub options: QuestionOptions,
    pub phase: QuizPhase,
    pub remaining_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct UiFrame {
    pub clock_ms: f64,
    pub mode: GameMode,
    pub lives_used: u32,
    pub max_lives: u32,
    pub streak: u32,
    pub car_frames: Vec<CarFrame>,
    pub checkpoint_frames: Vec<CheckpointFrame>,
    pub quiz: Option<QuizFrame>,

    // final results payload (sent once when the race is over)
    pub final_result: Option<RaceResult>,
}
