/// Installs a `fern` logger on stderr. Each `-v` raises the level by one
/// step, starting from warnings only.
pub fn init(verbosity: u64) -> Result<(), log::SetLoggerError> {
    let level = match verbosity {
    | 0 => log::LevelFilter::Warn,
    | 1 => log::LevelFilter::Info,
    | 2 => log::LevelFilter::Debug,
    | _ => log::LevelFilter::Trace,
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message,
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
}
