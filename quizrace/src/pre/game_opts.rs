use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "code-racer",
    about = "A frame-discrete quiz-racing game written in Rust"
)]
pub struct GameOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug printing (only for non-HUD mode)
    #[clap(short, long)]
    pub debug: bool,

    /// Activate the terminal HUD - the race will be simulated in real-time with an autopilot
    #[clap(short, long)]
    pub realtime: bool,

    /// Print the leaderboard for the chosen period after the race
    #[clap(short, long)]
    pub leaderboard: bool,

    /// Plot the progress traces of all cars after the race (written to output/)
    #[clap(long)]
    pub plot: bool,

    /// Print a sample of the loaded question bank and exit
    #[clap(long)]
    pub preview_questions: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs (only for non-HUD mode, ignored in HUD mode)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the game parameter file (OPTIONAL: if not set, uses the default parameters)
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set path to a local question bank file (OPTIONAL: ignored when an API URL is set)
    #[clap(short, long)]
    pub questions_path: Option<PathBuf>,

    /// Set path to a checkpoint layout file (OPTIONAL: if not set, uses the classic layout)
    #[clap(short, long)]
    pub checkpoints_path: Option<PathBuf>,

    /// Set base URL of the quiz API (OPTIONAL: if not set, a built-in question bank is used)
    #[clap(short, long)]
    pub api_url: Option<String>,

    /// Override the random seed from the parameter file
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// Set user id for the race session (OPTIONAL: if not set, plays as a guest)
    #[clap(short, long)]
    pub user: Option<String>,

    /// Set path for the race summary file (OPTIONAL: defaults to output/last_race.txt)
    #[clap(short, long)]
    pub outfile_path: Option<PathBuf>,

    /// Set real-time factor (only relevant in HUD mode)
    #[clap(long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set leaderboard period (daily/weekly/monthly/all)
    #[clap(long, default_value = "weekly")]
    pub period: String,
}
