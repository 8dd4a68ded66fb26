use crate::core::car::{BoostState, CarState, PhysicsPars};
use crate::core::checkpoint::DifficultyCheckpoint;
use crate::core::track::Track;
use helpers::general::{dist_2d, wrap_to_pi};
use log::debug;
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

/// Górny limit szansy bota na poprawną odpowiedź, nawet Master czasem się myli.
const BOT_ANSWER_CAP: f64 = 0.95;

/// (px) Jak daleko przed siebie bot wyznacza punkt celu na osi toru.
const BOT_LOOKAHEAD: f64 = 200.0;

/// (px) Rozrzut boczny punktu celu przy zerowej spójności.
const BOT_JITTER_SIGMA: f64 = 120.0;

/// (-) Odchylenie szumu prędkości przy zerowej spójności.
const BOT_SPEED_NOISE: f64 = 0.15;

const BOT_NAME_ADJECTIVES: [&str; 8] = [
    "Speedy", "Turbo", "Nitro", "Flash", "Rocket", "Blazing", "Swift", "Rapid",
];
const BOT_NAME_COLORS: [&str; 8] = [
    "Red", "Blue", "Green", "Gold", "Silver", "Neon", "Cyber", "Shadow",
];
const BOT_NAME_ANIMALS: [&str; 8] = [
    "Falcon", "Cheetah", "Viper", "Phoenix", "Dragon", "Hawk", "Panther", "Wolf",
];

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Expert,
    Master,
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SkillLevel::Beginner => write!(f, "Beginner"),
            SkillLevel::Intermediate => write!(f, "Intermediate"),
            SkillLevel::Expert => write!(f, "Expert"),
            SkillLevel::Master => write!(f, "Master"),
        }
    }
}

/// * `base_speed` - (px/klatkę) prędkość bazowa jazdy danego poziomu
/// * `skill_bonus` - (-) dodatek do szansy na poprawną odpowiedź przy checkpointach
#[derive(Debug, Clone, Copy)]
pub struct SkillTraits {
    pub base_speed: f64,
    pub skill_bonus: f64,
}

impl SkillTraits {
    pub fn for_level(level: SkillLevel) -> SkillTraits {
        match level {
            SkillLevel::Beginner => SkillTraits {
                base_speed: 5.0,
                skill_bonus: 0.00,
            },
            SkillLevel::Intermediate => SkillTraits {
                base_speed: 6.5,
                skill_bonus: 0.05,
            },
            SkillLevel::Expert => SkillTraits {
                base_speed: 8.0,
                skill_bonus: 0.10,
            },
            SkillLevel::Master => SkillTraits {
                base_speed: 9.5,
                skill_bonus: 0.15,
            },
        }
    }
}

/// Cechy osobowości bota, wszystkie w [0.0, 1.0].
/// * `aggressiveness` - jak ostro bot koryguje kierunek jazdy
/// * `accuracy` - bazowa szansa na poprawną odpowiedź przy checkpoincie
/// * `consistency` - tłumi szum prędkości i rozrzut toru jazdy
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct BotPersonality {
    pub aggressiveness: f64,
    pub accuracy: f64,
    pub consistency: f64,
}

/// Domyślna osobowość wynikająca z poziomu umiejętności.
pub fn default_personality(level: SkillLevel) -> BotPersonality {
    match level {
        SkillLevel::Beginner => BotPersonality {
            aggressiveness: 0.2,
            accuracy: 0.3,
            consistency: 0.40,
        },
        SkillLevel::Intermediate => BotPersonality {
            aggressiveness: 0.4,
            accuracy: 0.5,
            consistency: 0.55,
        },
        SkillLevel::Expert => BotPersonality {
            aggressiveness: 0.6,
            accuracy: 0.7,
            consistency: 0.70,
        },
        SkillLevel::Master => BotPersonality {
            aggressiveness: 0.8,
            accuracy: 0.9,
            consistency: 0.85,
        },
    }
}

/// Szansa bota na poprawną odpowiedź, ścięta do BOT_ANSWER_CAP.
pub fn answer_probability(personality: &BotPersonality, traits: &SkillTraits) -> f64 {
    (personality.accuracy + traits.skill_bonus).min(BOT_ANSWER_CAP)
}

/// * `skill_level` - poziom umiejętności bota (Beginner/Intermediate/Expert/Master)
/// * `name` - (opcjonalny) nazwa bota, brak = losowa nazwa z list słów
/// * `color` - kolor wyświetlania w notacji CSS
/// * `personality` - (opcjonalna) osobowość, brak = domyślna dla poziomu
#[derive(Debug, Deserialize, Clone)]
pub struct BotPars {
    pub skill_level: SkillLevel,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_bot_color")]
    pub color: String,
    #[serde(default)]
    pub personality: Option<BotPersonality>,
}

fn default_bot_color() -> String {
    "#ff6b6b".to_owned()
}

/// Domyślna stawka czterech botów, po jednym z każdego poziomu.
pub fn default_bot_roster() -> Vec<BotPars> {
    let colors = ["#ff6b6b", "#4ecdc4", "#45b7d1", "#96ceb4"];
    let levels = [
        SkillLevel::Beginner,
        SkillLevel::Intermediate,
        SkillLevel::Expert,
        SkillLevel::Master,
    ];

    levels
        .iter()
        .zip(colors.iter())
        .map(|(&skill_level, &color)| BotPars {
            skill_level,
            name: None,
            color: color.to_owned(),
            personality: None,
        })
        .collect()
}

/// Funkcja skleja losową nazwę bota z trzech list słów.
pub fn generate_bot_name(rng: &mut StdRng) -> String {
    let adjective = BOT_NAME_ADJECTIVES.choose(rng).unwrap();
    let color_word = BOT_NAME_COLORS.choose(rng).unwrap();
    let animal = BOT_NAME_ANIMALS.choose(rng).unwrap();

    format!("{} {} {}", adjective, color_word, animal)
}

#[derive(Debug)]
pub struct BotCar {
    pub id: u32,
    pub name: String,
    pub skill_level: SkillLevel,
    pub color: String,
    pub personality: BotPersonality,
    pub traits: SkillTraits,
    pub state: CarState,
    pub boost: BoostState,
    pub progress: f64,
    pub has_finished: bool,
    pub finish_time_ms: Option<u32>,
    rolled_checkpoints: HashSet<u32>,
}

impl BotCar {
    pub fn new(id: u32, bot_pars: &BotPars, track: &Track, rng: &mut StdRng) -> BotCar {
        let personality = bot_pars
            .personality
            .unwrap_or_else(|| default_personality(bot_pars.skill_level));

        for (trait_name, value) in [
            ("aggressiveness", personality.aggressiveness),
            ("accuracy", personality.accuracy),
            ("consistency", personality.consistency),
        ]
        .iter()
        {
            if !(0.0..=1.0).contains(value) {
                panic!(
                    "Bot {} personality trait {} must be in [0.0, 1.0], but is {}!",
                    id, trait_name, value
                );
            }
        }

        BotCar {
            id,
            name: bot_pars
                .name
                .to_owned()
                .unwrap_or_else(|| generate_bot_name(rng)),
            skill_level: bot_pars.skill_level,
            color: bot_pars.color.to_owned(),
            personality,
            traits: SkillTraits::for_level(bot_pars.skill_level),
            state: track.bot_start(id as usize),
            boost: BoostState::new(),
            progress: 0.0,
            has_finished: false,
            finish_time_ms: None,
            rolled_checkpoints: HashSet::new(),
        }
    }

    /// Metoda wykonuje jedną klatkę jazdy bota. Zwraca true, jeśli bot właśnie ukończył
    /// wyścig (po ukończeniu kolejne klatki nic nie zmieniają).
    pub fn simulate_tick(
        &mut self,
        track: &Track,
        phys_pars: &PhysicsPars,
        checkpoints: &[DifficultyCheckpoint],
        rng: &mut StdRng,
        now_ms: f64,
    ) -> bool {
        if self.has_finished {
            return false;
        }

        self.boost.update(now_ms, phys_pars);

        // punkt celu: oś toru z bocznym rozrzutem zależnym od spójności
        let jitter = sample_noise(rng, BOT_JITTER_SIGMA * (1.0 - self.personality.consistency));
        let target_x = (track.centerline_x + jitter).clamp(track.min_x, track.max_x);
        let target_y = self.state.y - BOT_LOOKAHEAD;

        // korekta kierunku ograniczona agresywnością
        let desired = (target_y - self.state.y).atan2(target_x - self.state.x);
        let heading_err = wrap_to_pi(desired - self.state.rotation);
        let max_turn = phys_pars.turn_rate * (0.5 + self.personality.aggressiveness);
        self.state.rotation += heading_err.clamp(-max_turn, max_turn);

        // prędkość bazowa poziomu z szumem spójności
        let noise = sample_noise(rng, BOT_SPEED_NOISE * (1.0 - self.personality.consistency));
        self.state.speed = (self.traits.base_speed * (1.0 + noise)).max(0.0);

        self.state.integrate(self.boost.factor);

        if track.clamp_to_bounds(&mut self.state) {
            self.state.speed *= phys_pars.collision_damping;
        }

        // rzut na odpowiedź przy każdym checkpoincie dokładnie raz
        for checkpoint in checkpoints {
            if self.rolled_checkpoints.contains(&checkpoint.id) {
                continue;
            }

            if dist_2d(self.state.x, self.state.y, checkpoint.x, checkpoint.y)
                < phys_pars.hit_radius
            {
                self.rolled_checkpoints.insert(checkpoint.id);

                let p_correct = answer_probability(&self.personality, &self.traits);
                if rng.gen::<f64>() < p_correct {
                    self.boost.apply(checkpoint.speed_boost, now_ms);
                    debug!(
                        "Bot {} answered checkpoint {} correctly, boost {:.1}x",
                        self.name, checkpoint.id, checkpoint.speed_boost
                    );
                } else {
                    debug!(
                        "Bot {} answered checkpoint {} incorrectly",
                        self.name, checkpoint.id
                    );
                }
            }
        }

        self.progress = track.progress_of(self.state.y);

        if track.crossed_finish(&self.state) {
            self.has_finished = true;
            self.finish_time_ms = Some(now_ms.round() as u32);
            self.state.speed = 0.0;
            self.progress = 1.0;
            return true;
        }

        false
    }
}

/// Próbka szumu normalnego o zadanym odchyleniu (0.0 przy zerowym odchyleniu).
fn sample_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev > 0.0 {
        Normal::new(0.0, std_dev).unwrap().sample(rng)
    } else {
        0.0
    }
}
