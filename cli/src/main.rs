use clap::Parser;
use flume;
use helpers::general::{argsort, SortOrder};
use plotters::prelude::*;
use quizrace::core::autopilot::AutoPilot;
use quizrace::core::checkpoint::{default_layout, read_checkpoint_layout, DifficultyCheckpoint};
use quizrace::core::handle_game::handle_game;
use quizrace::core::track::Track;
use quizrace::post::race_result::{fmt_time_ms, RaceEventKind, RaceResult};
use quizrace::pre::game_opts::GameOpts;
use quizrace::pre::read_game_pars::{read_game_pars, read_question_bank, GamePars};
use quizrace::services::controller::SessionController;
use quizrace::services::question_bank::{
    HttpQuestionBank, LocalQuestionBank, QuestionBank, QuestionFilters,
};
use quizrace::services::session_ledger::{
    HttpSessionLedger, LeaderboardEntry, LeaderboardPeriod, LocalSessionLedger, SessionLedger,
};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

mod logging;

fn export_progress_plot(result: &RaceResult) -> anyhow::Result<String> {
    let out_dir = Path::new("output");
    std::fs::create_dir_all(out_dir)?;
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let filename = format!("progress_plot_{}.png", ts);
    let out_path = out_dir.join(filename);

    let t_max = result
        .progress_trace
        .last()
        .map(|sample| sample.time_ms / 1000.0)
        .unwrap_or(1.0)
        .max(1.0);

    let root = BitMapBackend::new(out_path.to_str().unwrap(), (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Postęp wyścigu", ("sans-serif", 24).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..t_max, 0.0..100.0f64)?;

    chart
        .configure_mesh()
        .x_desc("Czas (s)")
        .y_desc("Postęp (%)")
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 16))
        .draw()?;

    let palette = Palette99::pick;
    for (i, name) in result.trace_names.iter().enumerate() {
        let series: Vec<(f64, f64)> = result
            .progress_trace
            .iter()
            .map(|sample| (sample.time_ms / 1000.0, sample.progress[i] * 100.0))
            .collect();
        chart
            .draw_series(LineSeries::new(series.into_iter(), palette(i)))?
            .label(name.to_owned())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], palette(i)));
    }

    // Vertical markers for the quiz and finish events
    for event in result.events.iter() {
        let x = event.time_ms / 1000.0;
        let (color, width) = match event.kind {
            RaceEventKind::CheckpointHit => (RGBColor(80, 160, 80), 1),
            RaceEventKind::AnswerIncorrect | RaceEventKind::QuestionTimeout => (RED, 2),
            RaceEventKind::PlayerFinish => (BLACK, 2),
            _ => (RGBColor(150, 150, 150), 1),
        };
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x, 0.0), (x, 100.0)],
            color.stroke_width(width),
        )))?;
    }

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .label_font(("sans-serif", 16))
        .position(plotters::chart::SeriesLabelPosition::UpperLeft)
        .draw()?;

    root.present()?;
    Ok(out_path.to_string_lossy().into_owned())
}

/// load_checkpoints builds the checkpoint layout for a run, either from a CSV file or from
/// the built-in classic layout scaled to the track.
fn load_checkpoints(
    game_pars: &GamePars,
    checkpoints_path: Option<&Path>,
) -> anyhow::Result<Vec<DifficultyCheckpoint>> {
    match checkpoints_path {
        Some(path) => read_checkpoint_layout(path),
        None => {
            let track = Track::new(&game_pars.track_pars);
            Ok(default_layout(&track))
        }
    }
}

/// parse_period maps the command line period name onto a leaderboard period.
fn parse_period(period: &str) -> anyhow::Result<LeaderboardPeriod> {
    match period {
        "daily" => Ok(LeaderboardPeriod::Daily),
        "weekly" => Ok(LeaderboardPeriod::Weekly),
        "monthly" => Ok(LeaderboardPeriod::Monthly),
        "all" => Ok(LeaderboardPeriod::AllTime),
        _ => anyhow::bail!(
            "Unknown leaderboard period {}! Use daily, weekly, monthly or all.",
            period
        ),
    }
}

/// print_leaderboard prints the fastest completed races of the chosen period.
fn print_leaderboard(entries: &[LeaderboardEntry], period: LeaderboardPeriod) {
    println!("RESULT: Leaderboard ({})", period.as_str());

    if entries.is_empty() {
        println!("No completed races in this period.");
        return;
    }

    for (idx, entry) in entries.iter().enumerate() {
        println!(
            "{:3}. {} - {} ({} completed races)",
            idx + 1,
            entry.display_name,
            fmt_time_ms(entry.best_time as f64),
            entry.completed_races
        );
    }
}

/// print_question_preview prints one random question per topic, then returns.
fn print_question_preview(question_bank: &dyn QuestionBank) -> anyhow::Result<()> {
    let topics = question_bank.list_topics()?;
    println!("INFO: The question bank covers {} topics", topics.len());

    for topic in topics.iter() {
        let filters = QuestionFilters {
            topic: Some(topic.to_owned()),
            difficulty: None,
            session_id: None,
        };
        let question = question_bank.random_question(&filters)?;
        println!(
            "QUESTION: [{}] ({}/10) {}",
            question.topic, question.difficulty, question.body_markup
        );
        println!(
            "  A) {}  B) {}  C) {}",
            question.options.a, question.options.b, question.options.c
        );
    }

    Ok(())
}

/// print_run_statistics aggregates the outcomes of a multi-run simulation.
fn print_run_statistics(results: &[RaceResult]) {
    // count race wins per car over all runs, a DNF winner does not count
    let mut names: Vec<String> = vec![];
    let mut wins: Vec<u32> = vec![];

    for result in results.iter() {
        if let Some(winner) = result.standings.first() {
            if winner.finish_time_ms.is_none() {
                continue;
            }
            match names.iter().position(|name| name == &winner.name) {
                Some(idx) => wins[idx] += 1,
                None => {
                    names.push(winner.name.to_owned());
                    wins.push(1);
                }
            }
        }
    }

    println!("RESULT: Race wins over {} runs", results.len());
    for idx in argsort(&wins, SortOrder::Descending) {
        println!("{:3} wins - {}", wins[idx], names[idx]);
    }

    let finished_runs = results.iter().filter(|result| result.player_finished).count();
    println!(
        "RESULT: Player finished {} of {} runs",
        finished_runs,
        results.len()
    );

    let player_times: Vec<f64> = results
        .iter()
        .filter_map(|result| result.final_time_ms)
        .map(|time_ms| time_ms as f64)
        .collect();

    if !player_times.is_empty() {
        let order = argsort(&player_times, SortOrder::Ascending);
        let avg_time = player_times.iter().sum::<f64>() / player_times.len() as f64;
        println!(
            "RESULT: Player finish times: best {}, average {}",
            fmt_time_ms(player_times[order[0]]),
            fmt_time_ms(avg_time)
        );
    }
}

/// post_process_run prints and stores everything a finished single race produces.
fn post_process_run(
    race_result: &RaceResult,
    game_opts: &GameOpts,
    controller: &SessionController,
) -> anyhow::Result<()> {
    // Wyświetl wyniki
    race_result.print_summary();

    // Zapisz podsumowanie wyścigu do pliku
    let summary_path = race_result.write_summary_to_file(game_opts.outfile_path.as_deref())?;
    println!("INFO: Podsumowanie zapisane: {}", summary_path);

    // Zapisz wykres postępu do PNG
    if game_opts.plot {
        match export_progress_plot(race_result) {
            Ok(path) => println!("INFO: Wykres zapisany: {}", path),
            Err(e) => eprintln!("WARNING: Nie udało się zapisać wykresu: {}", e),
        }
    }

    if game_opts.leaderboard {
        let period = parse_period(&game_opts.period)?;
        match controller.leaderboard(period) {
            Ok(entries) => print_leaderboard(&entries, period),
            Err(e) => eprintln!("WARNING: Nie udało się pobrać rankingu: {}", e),
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get game options from the command line arguments
    let game_opts: GameOpts = GameOpts::parse();

    // set up logging before anything else produces records
    logging::setup_logging(game_opts.debug)?;

    // get game parameters
    let mut game_pars = if let Some(parfile_path) = &game_opts.parfile_path {
        println!("INFO: Reading game parameters from {:?}", parfile_path);
        read_game_pars(parfile_path)?
    } else {
        GamePars::default()
    };

    if let Some(seed) = game_opts.seed {
        game_pars.race_pars.seed = seed;
    }
    if let Some(user) = &game_opts.user {
        game_pars.race_pars.user_id = Some(user.to_owned());
    }

    // build the question and session services
    let (question_bank, session_ledger): (Arc<dyn QuestionBank>, Arc<dyn SessionLedger>) =
        if let Some(api_url) = &game_opts.api_url {
            println!("INFO: Using the quiz API at {}", api_url);
            (
                Arc::new(HttpQuestionBank::new(api_url)),
                Arc::new(HttpSessionLedger::new(api_url)),
            )
        } else {
            let questions_path = game_opts
                .questions_path
                .clone()
                .unwrap_or_else(|| std::path::PathBuf::from("game_pars/questions_starter.json"));
            println!("INFO: Reading the question bank from {:?}", questions_path);
            let questions = read_question_bank(&questions_path)?;
            (
                Arc::new(LocalQuestionBank::new(
                    questions.clone(),
                    game_pars.race_pars.seed,
                )),
                Arc::new(LocalSessionLedger::new(&questions)),
            )
        };

    if game_opts.preview_questions {
        return print_question_preview(question_bank.as_ref());
    }

    // print race details
    println!(
        "INFO: Simulating a {:.0}x{:.0} track with {} bots at {:.0} ticks/s",
        game_pars.track_pars.world_width,
        game_pars.track_pars.world_height,
        game_pars.bot_pars_all.len(),
        game_pars.race_pars.tick_rate
    );

    // EXECUTION -----------------------------------------------------------------------------------
    if !game_opts.realtime {
        // NON-HUD CASE - headless simulation, optionally many runs in parallel
        if game_opts.no_sim_runs <= 1 {
            println!("INFO: Running a single simulation without the HUD...");
            let t_start = Instant::now();

            let checkpoints =
                load_checkpoints(&game_pars, game_opts.checkpoints_path.as_deref())?;
            let mut controller =
                SessionController::new(Arc::clone(&question_bank), Arc::clone(&session_ledger));
            let session = controller.start_session(game_pars.race_pars.user_id.clone())?;
            println!("INFO: Started race session {}", session.session_id);

            let autopilot = AutoPilot::new(
                &game_pars.autopilot_pars,
                game_pars.race_pars.seed.wrapping_add(1),
            );
            let race_result = handle_game(
                &game_pars,
                checkpoints,
                &controller,
                Some(autopilot),
                game_opts.debug,
                None,
                1.0,
            )?;

            println!("INFO: Execution time: {}ms", t_start.elapsed().as_millis());

            post_process_run(&race_result, &game_opts, &controller)?;
        } else {
            // MULTI-RUN CASE - rayon worker pool, one race session per run
            println!(
                "INFO: Running {} simulations without the HUD...",
                game_opts.no_sim_runs
            );
            let t_start = Instant::now();

            let results = (0..game_opts.no_sim_runs)
                .into_par_iter()
                .map(|run_idx| {
                    let mut run_pars = game_pars.clone();
                    run_pars.race_pars.seed =
                        game_pars.race_pars.seed.wrapping_add(run_idx as u64);

                    let checkpoints =
                        load_checkpoints(&run_pars, game_opts.checkpoints_path.as_deref())?;
                    let mut controller = SessionController::new(
                        Arc::clone(&question_bank),
                        Arc::clone(&session_ledger),
                    );
                    controller.start_session(run_pars.race_pars.user_id.clone())?;

                    let autopilot = AutoPilot::new(
                        &run_pars.autopilot_pars,
                        run_pars.race_pars.seed.wrapping_add(1),
                    );
                    handle_game(
                        &run_pars,
                        checkpoints,
                        &controller,
                        Some(autopilot),
                        false,
                        None,
                        1.0,
                    )
                })
                .collect::<anyhow::Result<Vec<RaceResult>>>()?;

            println!("INFO: Execution time: {}ms", t_start.elapsed().as_millis());

            print_run_statistics(&results);

            if game_opts.leaderboard {
                let period = parse_period(&game_opts.period)?;
                let controller = SessionController::new(
                    Arc::clone(&question_bank),
                    Arc::clone(&session_ledger),
                );
                match controller.leaderboard(period) {
                    Ok(entries) => print_leaderboard(&entries, period),
                    Err(e) => eprintln!("WARNING: Nie udało się pobrać rankingu: {}", e),
                }
            }
        }
    } else {
        // HUD CASE - symulacja w czasie rzeczywistym z tekstowym HUD
        println!("INFO: Starting the real-time simulation...");

        let checkpoints = load_checkpoints(&game_pars, game_opts.checkpoints_path.as_deref())?;
        let mut controller =
            SessionController::new(Arc::clone(&question_bank), Arc::clone(&session_ledger));
        let session = controller.start_session(game_pars.race_pars.user_id.clone())?;
        println!("INFO: Started race session {}", session.session_id);

        // Utwórz kanał komunikacji między HUD a symulatorem
        let (tx, rx) = flume::unbounded();

        // Uruchom symulator w osobnym wątku
        let game_pars_thread = game_pars.clone();
        let realtime_factor = game_opts.realtime_factor;
        let autopilot = AutoPilot::new(
            &game_pars.autopilot_pars,
            game_pars.race_pars.seed.wrapping_add(1),
        );

        let sim_handle = thread::spawn(move || {
            let race_result = handle_game(
                &game_pars_thread,
                checkpoints,
                &controller,
                Some(autopilot),
                false, // debug wyłączony w trybie HUD
                Some(&tx),
                realtime_factor,
            );
            (race_result, controller)
        });

        // Konsumuj klatki HUD w głównym wątku
        let mut last_question_id = None;
        let mut t_hud_update_print = 0.0;

        for ui_frame in rx.iter() {
            if ui_frame.final_result.is_some() {
                println!("INFO: Race finished, collecting the results...");
                continue;
            }

            if let Some(quiz) = &ui_frame.quiz {
                if last_question_id != Some(quiz.question_id) {
                    println!(
                        "QUIZ: [{}] ({}/10) {}",
                        quiz.topic, quiz.difficulty, quiz.body_markup
                    );
                    println!(
                        "  A) {}  B) {}  C) {}",
                        quiz.options.a, quiz.options.b, quiz.options.c
                    );
                    last_question_id = Some(quiz.question_id);
                }
            }

            if ui_frame.clock_ms > t_hud_update_print + 999.9 {
                if let Some(player_frame) =
                    ui_frame.car_frames.iter().find(|frame| frame.is_player)
                {
                    println!(
                        "HUD: {} | progress {:.0}% | speed {:.1} | lives left {} | streak {}",
                        fmt_time_ms(ui_frame.clock_ms),
                        player_frame.progress * 100.0,
                        player_frame.speed,
                        ui_frame.max_lives.saturating_sub(ui_frame.lives_used),
                        ui_frame.streak
                    );
                }
                t_hud_update_print = ui_frame.clock_ms;
            }
        }

        let (race_result, controller) = match sim_handle.join() {
            Ok((race_result, controller)) => (race_result?, controller),
            Err(_) => anyhow::bail!("The simulation thread panicked!"),
        };

        post_process_run(&race_result, &game_opts, &controller)?;
    }

    Ok(())
}
