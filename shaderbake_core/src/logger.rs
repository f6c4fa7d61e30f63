use ansi_term::Colour;
use chrono::Local;
use err_derive::Error;
use log::{error, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fmt::Display;
use std::io::{self, Write};
use std::process;

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error(display = "Failed to set logger: {}", err)]
    SetLogger { err: SetLoggerError },
}

/// Console logger, warnings and errors go to stderr.
pub struct Logger {
    color: bool,
    level: LevelFilter,
}

impl Logger {
    pub fn init(color: bool, level: LevelFilter) -> Result<(), LoggerInitError> {
        #[cfg(windows)]
        let color = color && ansi_term::enable_ansi_support().is_ok();

        log::set_boxed_logger(Box::new(Logger { color, level }))
            .map_err(|err| LoggerInitError::SetLogger { err })?;
        log::set_max_level(level);

        Ok(())
    }

    fn format(&self, record: &Record) -> String {
        let level = format!("{:<5}", record.level());
        let level = if self.color {
            let colour = match record.level() {
                Level::Error => Colour::Red,
                Level::Warn => Colour::Yellow,
                Level::Info => Colour::Green,
                Level::Debug => Colour::Cyan,
                Level::Trace => Colour::Purple,
            };
            colour.bold().paint(level).to_string()
        } else {
            level
        };

        format!(
            "[{} {}] {}",
            Local::now().format("%H:%M:%S"),
            level,
            record.args()
        )
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = self.format(record);

        // nowhere left to report a failed console write
        let _ = match record.level() {
            Level::Error | Level::Warn => writeln!(io::stderr(), "{}", line),
            _ => writeln!(io::stdout(), "{}", line),
        };
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }
}

pub trait UnwrapOrLog<T> {
    /// Logs the error and exits with status 2.
    fn unwrap_or_log(self, context: &str) -> T;
}

impl<T, E: Display> UnwrapOrLog<T> for Result<T, E> {
    fn unwrap_or_log(self, context: &str) -> T {
        match self {
            Ok(val) => val,
            Err(err) => {
                error!("{}: {}", context, err);
                log::logger().flush();
                process::exit(2);
            }
        }
    }
}
