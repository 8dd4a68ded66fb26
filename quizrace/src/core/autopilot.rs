use crate::core::bot::{answer_probability, default_personality, SkillLevel, SkillTraits};
use crate::core::car::InputState;
use crate::core::game::Game;
use crate::core::quiz::QuizPhase;
use helpers::general::wrap_to_pi;
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

/// (px) Jak daleko przed siebie autopilot wyznacza punkt celu na osi toru.
const AUTOPILOT_LOOKAHEAD: f64 = 200.0;

/// (rad) Martwa strefa korekty kierunku, poniżej niej autopilot jedzie prosto.
const STEER_DEADBAND: f64 = 0.02;

/// * `skill_level` - poziom umiejętności, określa celność odpowiedzi autopilota
/// * `think_time_ms` - (ms) czas namysłu przed udzieleniem odpowiedzi
/// * `accuracy` - (opcjonalna) celność w [0.0, 1.0] wymuszona zamiast wynikającej
///   z poziomu umiejętności
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AutoPilotPars {
    pub skill_level: SkillLevel,
    pub think_time_ms: f64,
    pub accuracy: Option<f64>,
}

impl Default for AutoPilotPars {
    fn default() -> AutoPilotPars {
        AutoPilotPars {
            skill_level: SkillLevel::Expert,
            think_time_ms: 2500.0,
            accuracy: None,
        }
    }
}

/// Autopilot prowadzi samochód gracza w przebiegach bez renderera: trzyma gaz,
/// koryguje kierunek ku osi toru i odpowiada na pytania po czasie namysłu.
#[derive(Debug)]
pub struct AutoPilot {
    pars: AutoPilotPars,
    p_correct: f64,
    rng: StdRng,
}

impl AutoPilot {
    pub fn new(pars: &AutoPilotPars, seed: u64) -> AutoPilot {
        if let Some(accuracy) = pars.accuracy {
            if !(0.0..=1.0).contains(&accuracy) {
                panic!(
                    "Autopilot accuracy must be in [0.0, 1.0], but is {}!",
                    accuracy
                );
            }
        }

        let p_correct = pars.accuracy.unwrap_or_else(|| {
            let personality = default_personality(pars.skill_level);
            let traits = SkillTraits::for_level(pars.skill_level);
            answer_probability(&personality, &traits)
        });

        AutoPilot {
            pars: pars.to_owned(),
            p_correct,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Metoda wykonuje jedną klatkę autopilota: ustawia klawisze na nadchodzącą klatkę
    /// i odpowiada na aktywne pytanie, gdy minął czas namysłu.
    pub fn act(&mut self, game: &mut Game) {
        let input = self.steer(game);
        game.set_input(input);
        self.maybe_answer(game);
    }

    /// Wyznacza klawisze jazdy: zawsze gaz, skręt gdy odchył od punktu celu przekracza
    /// martwą strefę.
    fn steer(&self, game: &Game) -> InputState {
        let target_x = game.track.centerline_x;
        let target_y = game.player.y - AUTOPILOT_LOOKAHEAD;

        let desired = (target_y - game.player.y).atan2(target_x - game.player.x);
        let heading_err = wrap_to_pi(desired - game.player.rotation);

        InputState {
            forward: true,
            reverse: false,
            left: heading_err < -STEER_DEADBAND,
            right: heading_err > STEER_DEADBAND,
        }
    }

    fn maybe_answer(&mut self, game: &mut Game) {
        if !matches!(game.quiz.get_phase(), QuizPhase::QuestionActive) {
            return;
        }

        if game.clock_ms < game.quiz.get_question_start_ms() + self.pars.think_time_ms {
            return;
        }

        let correct_option = match game.quiz.get_question() {
            Some(question) => question.correct_option.to_owned(),
            None => return,
        };

        let user_answer = if self.rng.gen::<f64>() < self.p_correct {
            correct_option
        } else {
            wrong_option(&correct_option, &mut self.rng)
        };

        game.answer_question(&user_answer);
    }
}

/// Losowa błędna opcja, jednostajnie spośród opcji różnych od poprawnej.
fn wrong_option(correct_option: &str, rng: &mut StdRng) -> String {
    let wrong: Vec<&str> = ["A", "B", "C"]
        .iter()
        .filter(|option| !option.eq_ignore_ascii_case(correct_option))
        .map(|&option| option)
        .collect();

    (*wrong.choose(rng).unwrap()).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::car::PhysicsPars;
    use crate::core::checkpoint::DifficultyCheckpoint;
    use crate::core::game::RacePars;
    use crate::core::quiz::QuizPars;
    use crate::core::track::TrackPars;
    use crate::services::controller::{GameAction, ServiceEvent};
    use crate::services::question_bank::{Question, QuestionOptions};

    fn question(correct_option: &str) -> Question {
        Question {
            question_id: 1,
            topic: "TypeScript".to_owned(),
            difficulty: 4,
            body_markup: "Which keyword declares a type alias?".to_owned(),
            options: QuestionOptions {
                a: "type".to_owned(),
                b: "alias".to_owned(),
                c: "typedef".to_owned(),
            },
            correct_option: correct_option.to_owned(),
            time_limit: 10,
        }
    }

    fn game_with_question(correct_option: &str) -> Game {
        let track_pars = TrackPars::default();
        let mut game = Game::new(
            &RacePars::default(),
            &PhysicsPars::default(),
            &track_pars,
            &QuizPars::default(),
            &[],
            vec![DifficultyCheckpoint::new(
                0,
                track_pars.start_x,
                track_pars.start_y,
                5,
            )],
        );

        game.simulate_tick();
        let generation = match game.take_actions().first() {
            Some(GameAction::FetchQuestion { generation, .. }) => *generation,
            _ => panic!("Expected a FetchQuestion action"),
        };

        game.apply_event(ServiceEvent::QuestionFetched {
            generation,
            result: Ok(question(correct_option)),
        });

        game
    }

    fn submitted_answer(game: &mut Game) -> Option<String> {
        game.take_actions().into_iter().find_map(|action| match action {
            GameAction::SubmitAnswer { user_answer, .. } => Some(user_answer),
            _ => None,
        })
    }

    #[test]
    fn autopilot_steers_toward_the_centerline() {
        let mut game = Game::new(
            &RacePars::default(),
            &PhysicsPars::default(),
            &TrackPars::default(),
            &QuizPars::default(),
            &[],
            vec![],
        );
        let mut autopilot = AutoPilot::new(&AutoPilotPars::default(), 1);

        autopilot.act(&mut game);
        assert!(game.input.forward);
        assert!(game.input.right);
        assert!(!game.input.left);

        let start_offset = (game.player.x - game.track.centerline_x).abs();
        let start_y = game.player.y;

        for _ in 0..600 {
            autopilot.act(&mut game);
            game.simulate_tick();
        }

        assert!((game.player.x - game.track.centerline_x).abs() < start_offset);
        assert!(game.player.y < start_y);
    }

    #[test]
    fn full_accuracy_always_picks_the_correct_option() {
        let mut autopilot = AutoPilot::new(
            &AutoPilotPars {
                think_time_ms: 0.0,
                accuracy: Some(1.0),
                ..Default::default()
            },
            3,
        );

        for correct_option in ["A", "B", "C"].iter() {
            let mut game = game_with_question(correct_option);
            autopilot.act(&mut game);

            assert_eq!(submitted_answer(&mut game).as_deref(), Some(*correct_option));
        }
    }

    #[test]
    fn zero_accuracy_always_picks_a_wrong_option() {
        let mut autopilot = AutoPilot::new(
            &AutoPilotPars {
                think_time_ms: 0.0,
                accuracy: Some(0.0),
                ..Default::default()
            },
            3,
        );

        for _ in 0..10 {
            let mut game = game_with_question("B");
            autopilot.act(&mut game);

            let answer = submitted_answer(&mut game).expect("autopilot should answer");
            assert_ne!(answer, "B");
            assert!(answer == "A" || answer == "C");
        }
    }

    #[test]
    fn autopilot_waits_out_the_think_time() {
        let mut autopilot = AutoPilot::new(
            &AutoPilotPars {
                think_time_ms: 1_000.0,
                accuracy: Some(1.0),
                ..Default::default()
            },
            9,
        );

        let mut game = game_with_question("A");

        autopilot.act(&mut game);
        assert!(submitted_answer(&mut game).is_none());

        // 70 klatek po 16.7 ms pokrywa sekundę namysłu
        for _ in 0..70 {
            game.simulate_tick();
            autopilot.act(&mut game);
        }

        assert_eq!(submitted_answer(&mut game).as_deref(), Some("A"));
    }

    #[test]
    #[should_panic]
    fn forced_accuracy_outside_the_unit_range_is_rejected() {
        AutoPilot::new(
            &AutoPilotPars {
                accuracy: Some(1.2),
                ..Default::default()
            },
            1,
        );
    }
}
