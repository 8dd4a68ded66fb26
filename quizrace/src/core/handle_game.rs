use crate::core::autopilot::AutoPilot;
use crate::core::checkpoint::DifficultyCheckpoint;
use crate::core::game::{Game, GameMode};
use crate::interfaces::ui_interface::{
    CarFrame, CheckpointFrame, QuizFrame, RgbColor, UiFrame, MAX_UI_UPDATE_FREQUENCY,
};
use crate::post::race_result::RaceResult;
use crate::pre::read_game_pars::GamePars;
use crate::services::controller::SessionController;
use anyhow::Context;
use css_color_parser;
use flume::Sender;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// handle_game creates and simulates a race on the basis of the inserted parameters, relays
/// service traffic between the game and the session controller, and returns the results for
/// post-processing.
pub fn handle_game(
    game_pars: &GamePars,
    checkpoints: Vec<DifficultyCheckpoint>,
    controller: &SessionController,
    mut autopilot: Option<AutoPilot>,
    print_debug: bool,
    tx: Option<&Sender<UiFrame>>,
    realtime_factor: f64,
) -> anyhow::Result<RaceResult> {
    let mut game = Game::new(
        &game_pars.race_pars,
        &game_pars.phys_pars,
        &game_pars.track_pars,
        &game_pars.quiz_pars,
        &game_pars.bot_pars_all,
        checkpoints,
    );

    // check if sender was inserted -> in that case use real-time simulation for the HUD
    let sim_realtime = tx.is_some();
    if !sim_realtime {
        let mut t_game_update_print = 0.0;
        while !game.race_over() {
            for event in controller.try_drain() {
                game.apply_event(event);
            }
            if let Some(pilot) = autopilot.as_mut() {
                pilot.act(&mut game);
            }
            game.simulate_tick();
            for action in game.take_actions() {
                controller.dispatch(action);
            }
            if print_debug && game.clock_ms > t_game_update_print + 999.9 {
                println!(
                    "INFO: Simulating... Current race time is {:.3}s, player progress is {:.0}%",
                    game.clock_ms / 1000.0,
                    game.player_progress * 100.0
                );
                t_game_update_print = game.clock_ms;
            }
        }
    } else {
        let mut t_game_update_print = 0.0;
        let mut t_game_update_ui = 0.0;

        while !game.race_over() {
            let t_start = Instant::now();
            for event in controller.try_drain() {
                game.apply_event(event);
            }
            if let Some(pilot) = autopilot.as_mut() {
                pilot.act(&mut game);
            }
            game.simulate_tick();
            for action in game.take_actions() {
                controller.dispatch(action);
            }
            if game.clock_ms > t_game_update_print + 999.9 {
                println!(
                    "INFO: Simulating... Current race time is {:.3}s, player progress is {:.0}%",
                    game.clock_ms / 1000.0,
                    game.player_progress * 100.0
                );
                t_game_update_print = game.clock_ms;
            }
            if game.clock_ms > t_game_update_ui + 1000.0 / MAX_UI_UPDATE_FREQUENCY - 0.001 {
                let mut ui_frame = UiFrame {
                    clock_ms: game.clock_ms,
                    mode: game.get_mode(),
                    lives_used: game.get_lives_used(),
                    max_lives: game.get_max_lives(),
                    streak: game.get_streak(),
                    car_frames: Vec::with_capacity(game.bots.len() + 1),
                    checkpoint_frames: Vec::with_capacity(game.checkpoints.len()),
                    quiz: None,
                    final_result: None,
                };

                let tmp_color = game
                    .get_race_pars()
                    .player_color
                    .parse::<css_color_parser::Color>()
                    .context("Could not parse hex color!")?;
                ui_frame.car_frames.push(CarFrame {
                    name: game.get_race_pars().player_name.to_owned(),
                    color: RgbColor {
                        r: tmp_color.r,
                        g: tmp_color.g,
                        b: tmp_color.b,
                    },
                    x: game.player.x,
                    y: game.player.y,
                    rotation: game.player.rotation,
                    speed: game.player.speed * game.player_boost.factor,
                    progress: game.player_progress,
                    is_player: true,
                    has_finished: matches!(game.get_mode(), GameMode::Finished),
                });

                for bot in game.bots.iter() {
                    let tmp_color = bot
                        .color
                        .parse::<css_color_parser::Color>()
                        .context("Could not parse hex color!")?;
                    ui_frame.car_frames.push(CarFrame {
                        name: bot.name.to_owned(),
                        color: RgbColor {
                            r: tmp_color.r,
                            g: tmp_color.g,
                            b: tmp_color.b,
                        },
                        x: bot.state.x,
                        y: bot.state.y,
                        rotation: bot.state.rotation,
                        speed: bot.state.speed * bot.boost.factor,
                        progress: bot.progress,
                        is_player: false,
                        has_finished: bot.has_finished,
                    });
                }

                for checkpoint in game.checkpoints.iter() {
                    let tmp_color = checkpoint
                        .color
                        .parse::<css_color_parser::Color>()
                        .context("Could not parse hex color!")?;
                    ui_frame.checkpoint_frames.push(CheckpointFrame {
                        id: checkpoint.id,
                        x: checkpoint.x,
                        y: checkpoint.y,
                        difficulty: checkpoint.difficulty,
                        color: RgbColor {
                            r: tmp_color.r,
                            g: tmp_color.g,
                            b: tmp_color.b,
                        },
                        completed: checkpoint.completed,
                    });
                }

                ui_frame.quiz = game.quiz.get_question().map(|question| QuizFrame {
                    question_id: question.question_id,
                    topic: question.topic.to_owned(),
                    difficulty: question.difficulty,
                    body_markup: question.body_markup.to_owned(),
                    options: question.options.clone(),
                    phase: game.quiz.get_phase(),
                    remaining_ms: game.quiz.remaining_ms(game.clock_ms),
                });

                // send current game state
                tx.unwrap()
                    .send(ui_frame)
                    .context("Failed to send game state to the HUD!")?;
                t_game_update_ui = game.clock_ms;
            }

            // sleep until the tick is finished in real-time as well (calculation in ms)
            let t_sleep = (game.get_tick_ms() / realtime_factor) as i64
                - t_start.elapsed().as_millis() as i64;

            if t_sleep > 0 {
                sleep(Duration::from_millis(t_sleep as u64));
            } else {
                println!("WARNING: Could not keep up with real-time!")
            }
        }
    }

    // give in-flight service calls a moment to land before reading the final tally (500 ms cap)
    let t_drain_deadline = Instant::now() + Duration::from_millis(500);
    while controller.get_pending() > 0 && Instant::now() < t_drain_deadline {
        for event in controller.drain_timeout(Duration::from_millis(50)) {
            game.apply_event(event);
        }
    }

    // after the real-time loop finishes, send the final result once
    if let Some(tx) = tx {
        let final_frame = UiFrame {
            clock_ms: game.clock_ms,
            mode: game.get_mode(),
            lives_used: game.get_lives_used(),
            max_lives: game.get_max_lives(),
            streak: game.get_streak(),
            car_frames: Vec::new(),
            checkpoint_frames: Vec::new(),
            quiz: None,
            final_result: Some(game.get_race_result()),
        };
        tx.send(final_frame)
            .context("Failed to send the final race result to the HUD!")?;
    }

    // return race result
    Ok(game.get_race_result())
}
