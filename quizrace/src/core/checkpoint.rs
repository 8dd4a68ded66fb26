use crate::core::track::Track;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;

/// Domyślny układ checkpointów, zaprojektowany dla świata 1600x2400 (wąski slalom w górę
/// mapy). Dla innych wymiarów świata pozycje są skalowane proporcjonalnie.
const DEFAULT_LAYOUT: [(f64, f64, u8); 14] = [
    (1200.0, 1800.0, 2),
    (1250.0, 1400.0, 4),
    (1200.0, 1000.0, 3),
    (1250.0, 600.0, 6),
    (1000.0, 400.0, 5),
    (800.0, 350.0, 8),
    (600.0, 400.0, 7),
    (350.0, 600.0, 4),
    (400.0, 1000.0, 6),
    (350.0, 1400.0, 3),
    (400.0, 1800.0, 5),
    (600.0, 2000.0, 2),
    (800.0, 2050.0, 9),
    (1200.0, 2000.0, 7),
];

const DEFAULT_LAYOUT_WIDTH: f64 = 1600.0;
const DEFAULT_LAYOUT_HEIGHT: f64 = 2400.0;

/// Checkpoint quizowy na planszy. Trudność 1-10 przekłada się liniowo na mnożnik boost
/// (1.0 + 0.1 * trudność) oraz na kolor wyświetlania.
#[derive(Debug, Clone)]
pub struct DifficultyCheckpoint {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub difficulty: u8,
    pub speed_boost: f64,
    pub color: String,
    pub completed: bool,
}

impl DifficultyCheckpoint {
    pub fn new(id: u32, x: f64, y: f64, difficulty: u8) -> DifficultyCheckpoint {
        if !x.is_finite() || !y.is_finite() {
            panic!("Checkpoint {} position ({}, {}) is not finite!", id, x, y);
        }

        if !(1..=10).contains(&difficulty) {
            panic!(
                "Checkpoint {} difficulty must be in [1, 10], but is {}!",
                id, difficulty
            );
        }

        DifficultyCheckpoint {
            id,
            x,
            y,
            difficulty,
            speed_boost: 1.0 + 0.1 * f64::from(difficulty),
            color: color_for_difficulty(difficulty).to_owned(),
            completed: false,
        }
    }
}

/// Kolor checkpointu zależy od pasma trudności (zielony dla 1-2 aż po fiolet dla 9-10).
pub fn color_for_difficulty(difficulty: u8) -> &'static str {
    const BAND_COLORS: [&str; 5] = ["#00ff00", "#ffff00", "#ffa500", "#ff0000", "#800080"];

    let band = ((usize::from(difficulty).saturating_sub(1)) / 2).min(BAND_COLORS.len() - 1);
    BAND_COLORS[band]
}

/// Funkcja buduje domyślny układ checkpointów przeskalowany do wymiarów świata.
pub fn default_layout(track: &Track) -> Vec<DifficultyCheckpoint> {
    let scale_x = track.world_width / DEFAULT_LAYOUT_WIDTH;
    let scale_y = track.world_height / DEFAULT_LAYOUT_HEIGHT;

    DEFAULT_LAYOUT
        .iter()
        .enumerate()
        .map(|(idx, &(x, y, difficulty))| {
            DifficultyCheckpoint::new(idx as u32, x * scale_x, y * scale_y, difficulty)
        })
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CsvCheckpointEl {
    pub x: f64,
    pub y: f64,
    pub difficulty: u8,
}

/// Funkcja wczytuje własny układ checkpointów z pliku CSV (kolumny x, y, difficulty).
pub fn read_checkpoint_layout(layout_path: &Path) -> Result<Vec<DifficultyCheckpoint>> {
    let fh = OpenOptions::new()
        .read(true)
        .open(layout_path)
        .context(format!(
            "Failed to open checkpoint layout file {}!",
            layout_path.to_str().unwrap_or("unknown")
        ))?;

    let mut csv_reader = csv::Reader::from_reader(&fh);
    let mut checkpoints: Vec<DifficultyCheckpoint> = vec![];

    for (idx, result) in csv_reader.deserialize().enumerate() {
        let csv_el: CsvCheckpointEl = result.context(format!(
            "Failed to parse checkpoint layout file {}!",
            layout_path.to_str().unwrap_or("unknown")
        ))?;
        checkpoints.push(DifficultyCheckpoint::new(
            idx as u32,
            csv_el.x,
            csv_el.y,
            csv_el.difficulty,
        ));
    }

    if checkpoints.is_empty() {
        anyhow::bail!(
            "Checkpoint layout file {} contains no checkpoints!",
            layout_path.to_str().unwrap_or("unknown")
        );
    }

    Ok(checkpoints)
}
