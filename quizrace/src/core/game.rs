use crate::core::bot::{BotCar, BotPars};
use crate::core::car::{BoostState, CarState, InputState, PhysicsPars};
use crate::core::checkpoint::DifficultyCheckpoint;
use crate::core::quiz::{QuizMachine, QuizPars, QuizSubmission};
use crate::core::track::{Track, TrackPars};
use crate::post::race_result::{
    fmt_time_ms, ProgressSample, QuizTally, RaceEvent, RaceEventKind, RaceResult, StandingEntry,
};
use crate::services::controller::{GameAction, ServiceEvent};
use crate::services::session_ledger::AnswerOutcome;
use helpers::general::{argsort, dist_2d, SortOrder};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;

/// Co ile klatek zapisywana jest próbka postępu do wykresu (30 klatek = 0.5 s przy 60/s).
const TRACE_SAMPLE_TICKS: u64 = 30;

/// * `seed` - ziarno generatora losowego (powtarzalne przebiegi botów)
/// * `tick_rate` - (klatki/s) częstotliwość dyskretyzacji symulacji
/// * `max_race_time_ms` - (ms) twardy limit długości wyścigu
/// * `player_name` - nazwa gracza w wynikach
/// * `player_color` - kolor gracza w notacji CSS
/// * `topic` - (opcjonalny) filtr tematu pobieranych pytań
/// * `difficulty` - (opcjonalny) filtr trudności pobieranych pytań, 1-10
/// * `user_id` - (opcjonalny) identyfikator gracza w rejestrze sesji
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RacePars {
    pub seed: u64,
    pub tick_rate: f64,
    pub max_race_time_ms: u32,
    pub player_name: String,
    pub player_color: String,
    pub topic: Option<String>,
    pub difficulty: Option<u8>,
    pub user_id: Option<String>,
}

impl Default for RacePars {
    fn default() -> RacePars {
        RacePars {
            seed: 42,
            tick_rate: 60.0,
            max_race_time_ms: 300_000,
            player_name: "You".to_owned(),
            player_color: "#0000ff".to_owned(),
            topic: None,
            difficulty: None,
            user_id: None,
        }
    }
}

/// Tryb gry. Spectating oznacza utratę wszystkich żyć: wejście gracza jest ignorowane,
/// a boty jadą do mety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Racing,
    Spectating,
    Finished,
}

impl Default for GameMode {
    fn default() -> Self {
        GameMode::Racing
    }
}

#[derive(Debug)]
pub struct Game {
    pub tick: u64,
    pub clock_ms: f64,
    tick_ms: f64,
    paused: bool,
    mode: GameMode,
    race_pars: RacePars,
    phys_pars: PhysicsPars,
    pub track: Track,
    pub checkpoints: Vec<DifficultyCheckpoint>,
    pub input: InputState,
    pub player: CarState,
    pub player_boost: BoostState,
    pub player_progress: f64,
    player_final_time_ms: Option<u32>,
    pub bots: Vec<BotCar>,
    rng: StdRng,
    pub quiz: QuizMachine,
    lives_used: u32,
    max_lives: u32,
    streak: u32,
    best_streak: u32,
    tally: QuizTally,
    events: Vec<RaceEvent>,
    progress_trace: Vec<ProgressSample>,
    actions: Vec<GameAction>,
}

impl Game {
    pub fn new(
        race_pars: &RacePars,
        phys_pars: &PhysicsPars,
        track_pars: &TrackPars,
        quiz_pars: &QuizPars,
        bot_pars_all: &[BotPars],
        checkpoints: Vec<DifficultyCheckpoint>,
    ) -> Game {
        if race_pars.tick_rate <= 0.0 {
            panic!(
                "Tick rate must be positive, but is {}!",
                race_pars.tick_rate
            );
        }

        let track = Track::new(track_pars);
        let mut rng = StdRng::seed_from_u64(race_pars.seed);

        // create bots
        let mut bots = Vec::with_capacity(bot_pars_all.len());

        for (idx, bot_pars) in bot_pars_all.iter().enumerate() {
            bots.push(BotCar::new(idx as u32, bot_pars, &track, &mut rng));
        }

        // create game
        Game {
            tick: 0,
            clock_ms: 0.0,
            tick_ms: 1000.0 / race_pars.tick_rate,
            paused: false,
            mode: GameMode::Racing,
            race_pars: race_pars.to_owned(),
            phys_pars: phys_pars.to_owned(),
            player: track.player_start(),
            track,
            checkpoints,
            input: InputState::default(),
            player_boost: BoostState::new(),
            player_progress: 0.0,
            player_final_time_ms: None,
            bots,
            rng,
            quiz: QuizMachine::new(quiz_pars),
            lives_used: 0,
            max_lives: quiz_pars.max_lives,
            streak: 0,
            best_streak: 0,
            tally: QuizTally::default(),
            events: vec![],
            progress_trace: vec![],
            actions: vec![],
        }
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// Metoda symuluje jedną klatkę gry. Pauza zamraża zegar i cały świat, więc
    /// zamraża też odliczanie pytania.
    pub fn simulate_tick(&mut self) {
        if self.paused {
            return;
        }

        // increment discretization variables
        self.tick += 1;
        self.clock_ms += self.tick_ms;

        self.handle_quiz_countdown();
        self.handle_player_car();
        self.handle_bots();
        self.sample_progress();
    }

    // ---------------------------------------------------------------------------------------------
    // GAME SIMULATOR PARTS ------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// Obsługuje odliczanie pytania i zamykanie ekranu wyniku. Timeout zgłasza pustą
    /// odpowiedź dokładnie raz.
    fn handle_quiz_countdown(&mut self) {
        if let Some(submission) = self.quiz.poll(self.clock_ms) {
            self.push_submission(submission);
        }
    }

    /// Jedna klatka jazdy gracza. Pomijana całkowicie poza trybem Racing, więc w trybie
    /// Spectating wejście nie zmienia stanu samochodu.
    fn handle_player_car(&mut self) {
        if !matches!(self.mode, GameMode::Racing) {
            return;
        }

        self.player_boost.update(self.clock_ms, &self.phys_pars);

        // while a question is open the racing keys are ignored and the car coasts
        let input = if self.quiz.is_idle() {
            self.input
        } else {
            InputState::default()
        };

        self.player
            .apply_driving(&input, &self.phys_pars, self.player_boost.factor);
        self.player.integrate(self.player_boost.factor);

        if self.track.clamp_to_bounds(&mut self.player) {
            self.player.speed *= self.phys_pars.collision_damping;
        }

        self.handle_checkpoint_collisions();

        self.player_progress = self.track.progress_of(self.player.y);

        if self.track.crossed_finish(&self.player) {
            self.finish_player();
        }
    }

    /// Kolizje gracza z checkpointami. Najwyżej jedno trafienie na klatkę, tylko gdy
    /// quiz jest zamknięty. Boost nakładany jest od razu przy trafieniu, ocena
    /// odpowiedzi rozstrzyga potem o życiach i serii.
    fn handle_checkpoint_collisions(&mut self) {
        if !self.quiz.is_idle() {
            return;
        }

        for checkpoint in self.checkpoints.iter_mut() {
            if checkpoint.completed {
                continue;
            }

            if dist_2d(self.player.x, self.player.y, checkpoint.x, checkpoint.y)
                >= self.phys_pars.hit_radius
            {
                continue;
            }

            checkpoint.completed = true;
            self.player_boost
                .apply(checkpoint.speed_boost, self.clock_ms);

            if let Some(generation) = self.quiz.trigger(self.clock_ms) {
                self.actions.push(GameAction::FetchQuestion {
                    generation,
                    topic: self.race_pars.topic.to_owned(),
                    difficulty: self.race_pars.difficulty,
                });

                self.events.push(RaceEvent {
                    kind: RaceEventKind::CheckpointHit,
                    time_ms: self.clock_ms,
                    detail: format!(
                        "checkpoint {} (difficulty {}, boost {:.1}x)",
                        checkpoint.id, checkpoint.difficulty, checkpoint.speed_boost
                    ),
                });
                info!(
                    "Checkpoint {} hit, difficulty {}, boost {:.1}x",
                    checkpoint.id, checkpoint.difficulty, checkpoint.speed_boost
                );
            }

            break;
        }
    }

    /// Jedna klatka jazdy wszystkich botów.
    fn handle_bots(&mut self) {
        for bot in self.bots.iter_mut() {
            let finished_now = bot.simulate_tick(
                &self.track,
                &self.phys_pars,
                &self.checkpoints,
                &mut self.rng,
                self.clock_ms,
            );

            if finished_now {
                self.events.push(RaceEvent {
                    kind: RaceEventKind::BotFinish,
                    time_ms: self.clock_ms,
                    detail: format!("{} ({})", bot.name, bot.skill_level),
                });
                info!("Bot {} finished the race", bot.name);
            }
        }
    }

    /// Zapisuje próbkę postępu wszystkich samochodów do późniejszego wykresu.
    fn sample_progress(&mut self) {
        if self.tick % TRACE_SAMPLE_TICKS != 0 {
            return;
        }

        let mut progress = Vec::with_capacity(1 + self.bots.len());
        progress.push(self.player_progress);
        progress.extend(self.bots.iter().map(|bot| bot.progress));

        self.progress_trace.push(ProgressSample {
            time_ms: self.clock_ms,
            progress,
        });
    }

    /// Przejście na metę: zatrzymuje gracza, unieważnia zlecenia quizu w locie
    /// i kolejkuje domknięcie sesji w rejestrze.
    fn finish_player(&mut self) {
        self.mode = GameMode::Finished;
        self.player.speed = 0.0;
        self.player_progress = 1.0;

        let final_time_ms = self.clock_ms.round() as u32;
        self.player_final_time_ms = Some(final_time_ms);

        self.quiz.reset();
        self.actions
            .push(GameAction::CompleteSession { final_time_ms });

        self.events.push(RaceEvent {
            kind: RaceEventKind::PlayerFinish,
            time_ms: self.clock_ms,
            detail: fmt_time_ms(f64::from(final_time_ms)),
        });
        info!(
            "Player finished the race in {}",
            fmt_time_ms(f64::from(final_time_ms))
        );
    }

    /// Utrata ostatniego życia: gracz staje w miejscu i ogląda resztę wyścigu.
    fn enter_spectating(&mut self) {
        self.mode = GameMode::Spectating;
        self.player.speed = 0.0;
        self.quiz.reset();

        self.events.push(RaceEvent {
            kind: RaceEventKind::SpectatorMode,
            time_ms: self.clock_ms,
            detail: format!("{} lives used", self.lives_used),
        });
        info!("Out of lives, switching to spectator mode");
    }

    /// Rejestruje zgłoszenie odpowiedzi i kolejkuje ją do oceny.
    fn push_submission(&mut self, submission: QuizSubmission) {
        if submission.user_answer.is_empty() {
            self.tally.timeouts += 1;
            self.events.push(RaceEvent {
                kind: RaceEventKind::QuestionTimeout,
                time_ms: self.clock_ms,
                detail: format!("question {}", submission.question_id),
            });
            info!("Question {} timed out", submission.question_id);
        }

        self.actions.push(GameAction::SubmitAnswer {
            generation: submission.generation,
            question_id: submission.question_id,
            user_answer: submission.user_answer,
            response_ms: submission.response_ms,
        });
    }

    /// Nakłada ocenę odpowiedzi na stan gry (seria, życia, tryb Spectating).
    fn apply_answer_outcome(&mut self, generation: u64, outcome: &AnswerOutcome) {
        if generation != self.quiz.get_generation() {
            debug!(
                "Discarding stale answer outcome (generation {}, current {})",
                generation,
                self.quiz.get_generation()
            );
            return;
        }

        if outcome.is_correct {
            self.streak += 1;
            self.best_streak = self.best_streak.max(self.streak);
            self.tally.correct += 1;

            self.events.push(RaceEvent {
                kind: RaceEventKind::AnswerCorrect,
                time_ms: self.clock_ms,
                detail: format!("streak {}", self.streak),
            });
            info!("Answer correct, streak {}", self.streak);
        } else {
            self.streak = 0;
            self.tally.incorrect += 1;
            self.lives_used = outcome.lives_used;

            self.events.push(RaceEvent {
                kind: RaceEventKind::AnswerIncorrect,
                time_ms: self.clock_ms,
                detail: format!("{} of {} lives used", self.lives_used, self.max_lives),
            });
            info!(
                "Answer incorrect, {} of {} lives used",
                self.lives_used, self.max_lives
            );

            if self.lives_used >= self.max_lives && matches!(self.mode, GameMode::Racing) {
                self.enter_spectating();
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// Metoda podmienia stan klawiszy na kolejne klatki (wejście spoza symulacji).
    pub fn set_input(&mut self, input: InputState) {
        self.input = input;
    }

    /// Metoda wstrzymuje lub wznawia symulację.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Metoda przyjmuje odpowiedź gracza na aktywne pytanie. Spóźnione odpowiedzi
    /// (po timeoucie lub po zamknięciu quizu) są ignorowane.
    pub fn answer_question(&mut self, user_answer: &str) {
        if let Some(submission) = self.quiz.submit_answer(user_answer, self.clock_ms) {
            self.push_submission(submission);
        }
    }

    /// Metoda nakłada wynik serwisu na stan gry. Wywoływana tylko między klatkami,
    /// spóźnione wyniki ze starych pytań są odrzucane po numerze generation.
    pub fn apply_event(&mut self, event: ServiceEvent) {
        match event {
            ServiceEvent::QuestionFetched { generation, result } => match result {
                Ok(question) => {
                    if self.quiz.question_loaded(generation, question, self.clock_ms) {
                        self.tally.asked += 1;
                    }
                }
                Err(message) => {
                    warn!("Question fetch failed, racing on: {}", message);
                    self.quiz.load_failed(generation);
                }
            },

            ServiceEvent::AnswerGraded { generation, result } => match result {
                Ok(outcome) => self.apply_answer_outcome(generation, &outcome),
                Err(message) => {
                    // fail-open: quiz znika, życia i seria zostają nietknięte
                    warn!(
                        "Answer grading failed, closing the quiz without a penalty: {}",
                        message
                    );
                    if generation == self.quiz.get_generation() {
                        self.quiz.dismiss();
                    }
                }
            },

            ServiceEvent::SessionCompleted { result } => {
                if let Err(message) = result {
                    warn!("Session completion was not recorded: {}", message);
                }
            }
        }
    }

    /// Metoda zwraca zakolejkowane akcje serwisów i czyści kolejkę.
    pub fn take_actions(&mut self) -> Vec<GameAction> {
        std::mem::take(&mut self.actions)
    }

    /// Metoda sprawdza, czy wyścig jest rozstrzygnięty: gracz skończył (albo ogląda)
    /// i wszystkie boty dojechały, albo minął twardy limit czasu.
    pub fn race_over(&self) -> bool {
        if self.clock_ms >= f64::from(self.race_pars.max_race_time_ms) {
            return true;
        }

        !matches!(self.mode, GameMode::Racing) && self.bots.iter().all(|bot| bot.has_finished)
    }

    /// Metoda buduje końcowy wynik wyścigu: ukończone samochody według czasu, reszta
    /// według postępu.
    pub fn get_race_result(&self) -> RaceResult {
        let mut names = vec![self.race_pars.player_name.to_owned()];
        let mut tiers: Vec<Option<String>> = vec![None];
        let mut finish_times = vec![self.player_final_time_ms];
        let mut progresses = vec![self.player_progress];

        for bot in self.bots.iter() {
            names.push(bot.name.to_owned());
            tiers.push(Some(bot.skill_level.to_string()));
            finish_times.push(bot.finish_time_ms);
            progresses.push(bot.progress);
        }

        let finished_idxs: Vec<usize> = (0..names.len())
            .filter(|&idx| finish_times[idx].is_some())
            .collect();
        let dnf_idxs: Vec<usize> = (0..names.len())
            .filter(|&idx| finish_times[idx].is_none())
            .collect();

        let finished_times: Vec<f64> = finished_idxs
            .iter()
            .map(|&idx| f64::from(finish_times[idx].unwrap_or(u32::MAX)))
            .collect();
        let dnf_progresses: Vec<f64> = dnf_idxs.iter().map(|&idx| progresses[idx]).collect();

        let mut standings = Vec::with_capacity(names.len());

        for &order_idx in argsort(&finished_times, SortOrder::Ascending).iter() {
            let idx = finished_idxs[order_idx];
            standings.push(StandingEntry {
                rank: standings.len() as u32 + 1,
                name: names[idx].to_owned(),
                tier: tiers[idx].to_owned(),
                finish_time_ms: finish_times[idx],
                progress: progresses[idx],
            });
        }

        for &order_idx in argsort(&dnf_progresses, SortOrder::Descending).iter() {
            let idx = dnf_idxs[order_idx];
            standings.push(StandingEntry {
                rank: standings.len() as u32 + 1,
                name: names[idx].to_owned(),
                tier: tiers[idx].to_owned(),
                finish_time_ms: None,
                progress: progresses[idx],
            });
        }

        RaceResult {
            player_name: self.race_pars.player_name.to_owned(),
            standings,
            player_finished: matches!(self.mode, GameMode::Finished),
            player_spectating: matches!(self.mode, GameMode::Spectating),
            final_time_ms: self.player_final_time_ms,
            lives_used: self.lives_used,
            max_lives: self.max_lives,
            best_streak: self.best_streak,
            tally: self.tally,
            events: self.events.to_owned(),
            trace_names: names,
            progress_trace: self.progress_trace.to_owned(),
        }
    }

    /// get_mode zwraca bieżący tryb gry.
    pub fn get_mode(&self) -> GameMode {
        self.mode
    }

    /// get_tick_ms zwraca długość jednej klatki w milisekundach.
    pub fn get_tick_ms(&self) -> f64 {
        self.tick_ms
    }

    /// get_race_pars zwraca parametry wyścigu.
    pub fn get_race_pars(&self) -> &RacePars {
        &self.race_pars
    }

    /// get_lives_used zwraca liczbę zużytych żyć.
    pub fn get_lives_used(&self) -> u32 {
        self.lives_used
    }

    /// get_max_lives zwraca limit żyć na wyścig.
    pub fn get_max_lives(&self) -> u32 {
        self.max_lives
    }

    /// get_streak zwraca bieżącą serię poprawnych odpowiedzi.
    pub fn get_streak(&self) -> u32 {
        self.streak
    }

    /// get_tally zwraca bilans pytań w tym wyścigu.
    pub fn get_tally(&self) -> QuizTally {
        self.tally
    }

    /// is_paused sprawdza, czy symulacja stoi.
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bot::SkillLevel;
    use crate::services::question_bank::{Question, QuestionOptions};
    use approx::assert_relative_eq;

    fn question(question_id: i32) -> Question {
        Question {
            question_id,
            topic: "JavaScript".to_owned(),
            difficulty: 5,
            body_markup: "Which array method returns a new array?".to_owned(),
            options: QuestionOptions {
                a: "map".to_owned(),
                b: "forEach".to_owned(),
                c: "sort".to_owned(),
            },
            correct_option: "A".to_owned(),
            time_limit: 10,
        }
    }

    fn game_with(checkpoints: Vec<DifficultyCheckpoint>, quiz_pars: QuizPars) -> Game {
        Game::new(
            &RacePars::default(),
            &PhysicsPars::default(),
            &TrackPars::default(),
            &quiz_pars,
            &[],
            checkpoints,
        )
    }

    fn checkpoint_at_start() -> DifficultyCheckpoint {
        let track_pars = TrackPars::default();
        DifficultyCheckpoint::new(0, track_pars.start_x, track_pars.start_y, 5)
    }

    fn fetch_generation(actions: &[GameAction]) -> u64 {
        match actions
            .iter()
            .find(|action| matches!(action, GameAction::FetchQuestion { .. }))
        {
            Some(GameAction::FetchQuestion { generation, .. }) => *generation,
            _ => panic!("Expected a FetchQuestion action"),
        }
    }

    #[test]
    fn checkpoint_hit_boosts_and_triggers_exactly_once() {
        let mut game = game_with(vec![checkpoint_at_start()], QuizPars::default());

        game.simulate_tick();

        assert!(game.checkpoints[0].completed);
        assert_relative_eq!(game.player_boost.factor, 1.5);

        let actions = game.take_actions();
        assert_eq!(fetch_generation(&actions), 1);

        // completed checkpoint must not retrigger, even after the quiz is gone
        game.apply_event(ServiceEvent::QuestionFetched {
            generation: 1,
            result: Err("bank down".to_owned()),
        });
        assert!(game.quiz.is_idle());

        for _ in 0..20 {
            game.simulate_tick();
        }
        assert!(game.take_actions().is_empty());
        assert_eq!(game.quiz.get_generation(), 1);
    }

    #[test]
    fn racing_input_is_suspended_while_a_question_is_open() {
        let mut game = game_with(
            vec![checkpoint_at_start()],
            QuizPars {
                resolved_display_ms: 0.0,
                ..Default::default()
            },
        );

        game.simulate_tick();
        let generation = fetch_generation(&game.take_actions());

        game.apply_event(ServiceEvent::QuestionFetched {
            generation,
            result: Ok(question(7)),
        });

        game.set_input(InputState {
            forward: true,
            ..Default::default()
        });

        let speed_before = game.player.speed;
        let rotation_before = game.player.rotation;

        for _ in 0..10 {
            game.simulate_tick();
        }

        // gas is ignored, the car coasts under friction
        assert!(game.player.speed < speed_before);
        assert_relative_eq!(game.player.rotation, rotation_before);

        // answering reopens the controls
        game.answer_question("A");
        game.simulate_tick();
        assert!(game.quiz.is_idle());

        let speed_resumed = game.player.speed;
        game.simulate_tick();
        assert!(game.player.speed > speed_resumed);
    }

    #[test]
    fn third_wrong_answer_switches_to_spectating_and_freezes_the_car() {
        let track_pars = TrackPars::default();
        let checkpoints = vec![
            DifficultyCheckpoint::new(0, track_pars.start_x, track_pars.start_y, 2),
            DifficultyCheckpoint::new(1, track_pars.start_x, track_pars.start_y, 3),
            DifficultyCheckpoint::new(2, track_pars.start_x, track_pars.start_y, 4),
        ];
        let mut game = game_with(
            checkpoints,
            QuizPars {
                resolved_display_ms: 0.0,
                ..Default::default()
            },
        );

        for lives_used in 1..=3 {
            // ticks until the next checkpoint at the start position triggers
            let mut generation = None;
            for _ in 0..5 {
                game.simulate_tick();
                let actions = game.take_actions();
                if !actions.is_empty() {
                    generation = Some(fetch_generation(&actions));
                    break;
                }
            }
            let generation = generation.expect("checkpoint should trigger");

            game.apply_event(ServiceEvent::QuestionFetched {
                generation,
                result: Ok(question(lives_used as i32)),
            });
            game.answer_question("B");

            assert_eq!(game.get_mode(), GameMode::Racing);
            game.apply_event(ServiceEvent::AnswerGraded {
                generation,
                result: Ok(AnswerOutcome {
                    is_correct: false,
                    lives_used,
                }),
            });

            // quiz closes on the next tick (no display delay)
            game.simulate_tick();
        }

        assert_eq!(game.get_mode(), GameMode::Spectating);
        assert_eq!(game.get_lives_used(), 3);
        assert_relative_eq!(game.player.speed, 0.0);

        // player input must not mutate the car state anymore
        game.set_input(InputState {
            forward: true,
            right: true,
            ..Default::default()
        });
        let frozen = game.player;

        for _ in 0..30 {
            game.simulate_tick();
        }

        assert_relative_eq!(game.player.x, frozen.x);
        assert_relative_eq!(game.player.y, frozen.y);
        assert_relative_eq!(game.player.speed, frozen.speed);
        assert_relative_eq!(game.player.rotation, frozen.rotation);
    }

    #[test]
    fn correct_answers_grow_the_streak_until_a_miss() {
        let mut game = game_with(vec![checkpoint_at_start()], QuizPars::default());

        game.simulate_tick();
        let generation = fetch_generation(&game.take_actions());

        game.apply_event(ServiceEvent::AnswerGraded {
            generation,
            result: Ok(AnswerOutcome {
                is_correct: true,
                lives_used: 0,
            }),
        });
        game.apply_event(ServiceEvent::AnswerGraded {
            generation,
            result: Ok(AnswerOutcome {
                is_correct: true,
                lives_used: 0,
            }),
        });
        assert_eq!(game.get_streak(), 2);

        game.apply_event(ServiceEvent::AnswerGraded {
            generation,
            result: Ok(AnswerOutcome {
                is_correct: false,
                lives_used: 1,
            }),
        });
        assert_eq!(game.get_streak(), 0);
        assert_eq!(game.get_race_result().best_streak, 2);
    }

    #[test]
    fn finishing_completes_the_session_and_invalidates_late_grades() {
        let mut game = game_with(vec![checkpoint_at_start()], QuizPars::default());

        game.simulate_tick();
        let generation = fetch_generation(&game.take_actions());
        game.apply_event(ServiceEvent::QuestionFetched {
            generation,
            result: Ok(question(3)),
        });
        game.answer_question("C");
        game.take_actions();

        // teleport right above the finish line and let one tick cross it
        game.player.x = game.track.centerline_x;
        game.player.y = game.track.finish_y + 0.5;
        game.simulate_tick();

        assert_eq!(game.get_mode(), GameMode::Finished);
        assert_relative_eq!(game.player_progress, 1.0);

        let actions = game.take_actions();
        assert!(actions
            .iter()
            .any(|action| matches!(action, GameAction::CompleteSession { .. })));

        // the in-flight grade arrives after the reset and must be discarded
        game.apply_event(ServiceEvent::AnswerGraded {
            generation,
            result: Ok(AnswerOutcome {
                is_correct: false,
                lives_used: 3,
            }),
        });
        assert_eq!(game.get_lives_used(), 0);
        assert_eq!(game.get_mode(), GameMode::Finished);
    }

    #[test]
    fn countdown_timeout_submits_an_empty_answer_once() {
        let mut game = game_with(vec![checkpoint_at_start()], QuizPars::default());

        game.simulate_tick();
        let generation = fetch_generation(&game.take_actions());
        game.apply_event(ServiceEvent::QuestionFetched {
            generation,
            result: Ok(question(5)),
        });

        // 11 s of simulated time at 60 ticks/s covers the 10 s limit
        let mut submissions = vec![];
        for _ in 0..660 {
            game.simulate_tick();
            submissions.extend(game.take_actions().into_iter().filter(|action| {
                matches!(action, GameAction::SubmitAnswer { .. })
            }));
        }

        assert_eq!(submissions.len(), 1);
        match &submissions[0] {
            GameAction::SubmitAnswer {
                user_answer,
                response_ms,
                question_id,
                ..
            } => {
                assert!(user_answer.is_empty());
                assert_eq!(*question_id, 5);
                assert_eq!(*response_ms, 10_000);
            }
            _ => panic!("Expected a SubmitAnswer action"),
        }
        assert_eq!(game.get_tally().timeouts, 1);
    }

    #[test]
    fn pause_freezes_the_clock_and_the_countdown() {
        let mut game = game_with(vec![checkpoint_at_start()], QuizPars::default());

        game.simulate_tick();
        let generation = fetch_generation(&game.take_actions());
        game.apply_event(ServiceEvent::QuestionFetched {
            generation,
            result: Ok(question(2)),
        });

        let clock_before = game.clock_ms;
        let remaining_before = game.quiz.remaining_ms(game.clock_ms);

        game.set_paused(true);
        for _ in 0..600 {
            game.simulate_tick();
        }

        assert_relative_eq!(game.clock_ms, clock_before);
        assert_relative_eq!(game.quiz.remaining_ms(game.clock_ms), remaining_before);
        assert!(game.take_actions().is_empty());

        game.set_paused(false);
        game.simulate_tick();
        assert!(game.clock_ms > clock_before);
    }

    #[test]
    fn standings_rank_finishers_by_time_then_dnf_by_progress() {
        let mut game = Game::new(
            &RacePars::default(),
            &PhysicsPars::default(),
            &TrackPars::default(),
            &QuizPars::default(),
            &crate::core::bot::default_bot_roster(),
            vec![],
        );

        game.bots[0].finish_time_ms = Some(50_000);
        game.bots[1].finish_time_ms = Some(40_000);
        game.bots[2].progress = 0.8;
        game.bots[3].progress = 0.9;
        game.player_progress = 0.3;

        let result = game.get_race_result();
        let ranked: Vec<&str> = result
            .standings
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();

        assert_eq!(ranked[0], game.bots[1].name);
        assert_eq!(ranked[1], game.bots[0].name);
        assert_eq!(ranked[2], game.bots[3].name);
        assert_eq!(ranked[3], game.bots[2].name);
        assert_eq!(ranked[4], "You");

        assert_eq!(result.standings[0].rank, 1);
        assert_eq!(result.standings[4].rank, 5);
        assert_eq!(result.standings[0].finish_time_ms, Some(40_000));
        assert_eq!(
            result.standings[1].tier.as_deref(),
            Some(game.bots[0].skill_level.to_string().as_str())
        );
    }

    #[test]
    fn race_is_over_once_bots_and_player_are_done_or_time_runs_out() {
        let mut game = Game::new(
            &RacePars {
                max_race_time_ms: 1_000,
                ..Default::default()
            },
            &PhysicsPars::default(),
            &TrackPars::default(),
            &QuizPars::default(),
            &[BotPars {
                skill_level: SkillLevel::Master,
                name: Some("Solo".to_owned()),
                color: "#ff6b6b".to_owned(),
                personality: None,
            }],
            vec![],
        );

        assert!(!game.race_over());

        for _ in 0..61 {
            game.simulate_tick();
        }
        assert!(game.race_over());
    }

    #[test]
    fn grading_failure_closes_the_quiz_without_a_penalty() {
        let mut game = game_with(vec![checkpoint_at_start()], QuizPars::default());

        game.simulate_tick();
        let generation = fetch_generation(&game.take_actions());
        game.apply_event(ServiceEvent::QuestionFetched {
            generation,
            result: Ok(question(4)),
        });
        game.answer_question("B");

        game.apply_event(ServiceEvent::AnswerGraded {
            generation,
            result: Err("ledger down".to_owned()),
        });

        assert!(game.quiz.is_idle());
        assert_eq!(game.get_lives_used(), 0);
        assert_eq!(game.get_streak(), 0);
        assert_eq!(game.get_mode(), GameMode::Racing);
    }
}
