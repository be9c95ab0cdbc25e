use std::fmt::{self, Display, Write};
use std::io::{self, IsTerminal};

use anyhow::{bail, Context, Result};
use fern::colors::{Color, ColoredLevelConfig};
use log::{Level, LevelFilter};

pub fn init(level: &str) -> Result<()> {
    let level = parse_level(level)?;

    let stderr = io::stderr();
    let is_terminal = stderr.is_terminal();

    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .debug(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            if is_terminal {
                out.finish(format_args!(
                    "{} [{}] {}",
                    humantime::format_rfc3339_millis(std::time::SystemTime::now()),
                    colors.color(record.level()),
                    message
                ))
            } else {
                out.finish(format_args!(
                    "{} [{}] {}",
                    humantime::format_rfc3339_millis(std::time::SystemTime::now()),
                    record.level(),
                    message
                ))
            }
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .context("init logger")?;

    Ok(())
}

pub fn parse_level(level: &str) -> Result<LevelFilter> {
    let level = match level {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "off" => LevelFilter::Off,
        _ => bail!("unknown log level '{}'", level),
    };
    Ok(level)
}

/// Per-call structured logger handle.
///
/// Carries ordered `key=value` fields that are appended to every message, so
/// a repository call can tag its logs with the entities it touches:
///
/// ```
/// use warden::logs::Logger;
///
/// let log = Logger::new().with("request", "r-42");
/// let log = log.with("role", "writer");
/// log.info("role created");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Logger {
    fields: Vec<(&'static str, String)>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(&self, key: &'static str, value: impl Display) -> Self {
        let mut fields = self.fields.clone();
        fields.push((key, value.to_string()));
        Self { fields }
    }

    pub fn fields(&self) -> &[(&'static str, String)] {
        &self.fields
    }

    pub fn error(&self, msg: impl Display) {
        self.log(Level::Error, msg);
    }

    pub fn warn(&self, msg: impl Display) {
        self.log(Level::Warn, msg);
    }

    pub fn info(&self, msg: impl Display) {
        self.log(Level::Info, msg);
    }

    pub fn debug(&self, msg: impl Display) {
        self.log(Level::Debug, msg);
    }

    fn log(&self, level: Level, msg: impl Display) {
        if !log::log_enabled!(level) {
            return;
        }
        log::log!(level, "{msg}{}", Fields(&self.fields));
    }
}

struct Fields<'a>(&'a [(&'static str, String)]);

impl Display for Fields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.0 {
            f.write_char(' ')?;
            f.write_str(key)?;
            f.write_char('=')?;
            if needs_quote(value) {
                write!(f, "{value:?}")?;
            } else {
                f.write_str(value)?;
            }
        }
        Ok(())
    }
}

/// Values that would otherwise be ambiguous in `key=value` output.
fn needs_quote(value: &str) -> bool {
    value.is_empty() || value.contains(|c: char| c.is_whitespace() || c == '=' || c == '"')
}
