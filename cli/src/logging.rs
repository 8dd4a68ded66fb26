use fern::Dispatch;

/// setup_logging configures the global logger. Library records go to stdout and to
/// output/game.log, the verbosity is controlled by the debug flag.
pub fn setup_logging(debug: bool) -> Result<(), fern::InitError> {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    std::fs::create_dir_all("output")?;

    let file_logger_config = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(fern::log_file("output/game.log")?);

    let stdout_logger_config = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}: {}", record.level(), message))
        })
        .chain(std::io::stdout());

    Dispatch::new()
        .level(level)
        .chain(file_logger_config)
        .chain(stdout_logger_config)
        .apply()?;

    Ok(())
}
