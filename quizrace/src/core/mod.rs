pub mod autopilot;
pub mod bot;
pub mod car;
pub mod checkpoint;
pub mod game;
pub mod handle_game;
pub mod quiz;
pub mod track;
