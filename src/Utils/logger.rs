use chrono::Local;
use csv::Writer;
use log::{LevelFilter, info};
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum OutputError {
    Io { path: String, message: String },
    Csv(String),
    InvalidLogLevel(String),
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputError::Io { path, message } => write!(f, "Cannot write {}: {}", path, message),
            OutputError::Csv(msg) => write!(f, "CSV error: {}", msg),
            OutputError::InvalidLogLevel(level) => write!(
                f,
                "loglevel must be debug, info, warn, error or off, got {}",
                level
            ),
        }
    }
}

impl std::error::Error for OutputError {}

impl From<csv::Error> for OutputError {
    fn from(e: csv::Error) -> Self {
        OutputError::Csv(e.to_string())
    }
}

fn io_error(path: &Path, e: std::io::Error) -> OutputError {
    OutputError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// None means info
pub fn level_filter(loglevel: Option<&str>) -> Result<LevelFilter, OutputError> {
    match loglevel.map(|l| l.trim().to_lowercase()) {
        None => Ok(LevelFilter::Info),
        Some(level) => match level.as_str() {
            "debug" => Ok(LevelFilter::Debug),
            "info" => Ok(LevelFilter::Info),
            "warn" => Ok(LevelFilter::Warn),
            "error" => Ok(LevelFilter::Error),
            "off" | "none" => Ok(LevelFilter::Off),
            _ => Err(OutputError::InvalidLogLevel(level)),
        },
    }
}

/// Terminal logger plus an optional file logger. When `log_file` is a directory the file
/// is named after the current date and time. A logger installed earlier stays in place.
/// Returns the path of the log file, if any.
pub fn init_logger(
    loglevel: Option<&str>,
    log_file: Option<&Path>,
) -> Result<Option<PathBuf>, OutputError> {
    let level = level_filter(loglevel)?;
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    let path = match log_file {
        Some(p) if p.is_dir() => {
            let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
            Some(p.join(format!("log_{}.txt", date_and_time)))
        }
        Some(p) => Some(p.to_path_buf()),
        None => None,
    };
    if let Some(ref path) = path {
        let file = File::create(path).map_err(|e| io_error(path, e))?;
        loggers.push(WriteLogger::new(level, Config::default(), file));
    }
    if CombinedLogger::init(loggers).is_ok() {
        info!("logger initialised at level {}", level);
    }
    Ok(path)
}

/// One header row, then one row per record
pub fn save_table_to_csv(
    path: &Path,
    headers: &[String],
    rows: &[Vec<f64>],
) -> Result<(), OutputError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        }
    }
    let mut writer = Writer::from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush().map_err(|e| io_error(path, e))?;
    Ok(())
}

/// Number format of the second column of a two-column table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFormat {
    Fixed,
    Scientific,
}

/// `x<TAB>y` lines, x with six decimals
pub fn save_columns_to_file(
    path: &Path,
    rows: &[(f64, f64)],
    format: ColumnFormat,
) -> Result<(), OutputError> {
    let mut file = File::create(path).map_err(|e| io_error(path, e))?;
    for (x, y) in rows {
        let line = match format {
            ColumnFormat::Fixed => format!("{:.6}\t{:.6}", x, y),
            ColumnFormat::Scientific => format!("{:.6}\t{:.6e}", x, y),
        };
        writeln!(file, "{}", line).map_err(|e| io_error(path, e))?;
    }
    Ok(())
}
