use log::LevelFilter;
use simplelog::*;
use std::fs::{self, OpenOptions};
use std::io::{Error, ErrorKind};
use std::path::PathBuf;
use std::sync::OnceLock;

static INIT: OnceLock<Result<PathBuf, String>> = OnceLock::new();

/// `$HOME/.local/share/playmidi/logs`
pub fn log_dir() -> Result<PathBuf, Error> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::new(ErrorKind::NotFound, "HOME environment variable not set"))?;

    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("playmidi")
        .join("logs"))
}

fn init_file_logger(level: LevelFilter) -> Result<PathBuf, Error> {
    let log_dir = log_dir()?;

    // Create the log directory if it doesn't exist
    fs::create_dir_all(&log_dir)?;

    let path = log_dir.join("playmidi.log");
    let log_file = OpenOptions::new().create(true).append(true).open(&path)?;

    CombinedLogger::init(vec![WriteLogger::new(level, Config::default(), log_file)])
        .map_err(|e| Error::new(ErrorKind::Other, e))?;
    Ok(path)
}

/// Logs to the playmidi log file, or to stderr through env_logger when the
/// file cannot be opened. Only the first call has any effect.
pub fn init_logger(level: LevelFilter) -> Result<PathBuf, Error> {
    let outcome = INIT.get_or_init(|| match init_file_logger(level) {
        Ok(path) => Ok(path),
        Err(e) => {
            let _ = env_logger::Builder::from_default_env().try_init();
            Err(e.to_string())
        }
    });

    match outcome {
        Ok(path) => {
            log::info!(
                "playmidi session started {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            );
            Ok(path.clone())
        }
        Err(msg) => Err(Error::new(ErrorKind::Other, msg.clone())),
    }
}
