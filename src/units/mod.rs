//! Unit files describing command-backed services
//!
//! ```text
//! [Unit]
//! Description=Web frontend
//!
//! [Service]
//! Name=web
//! ExecStart=/usr/bin/web --port 8080
//! ExecStop=/usr/bin/web-ctl stop
//! ExecPause=/usr/bin/web-ctl drain
//! ExecContinue=/usr/bin/web-ctl undrain
//! Environment=PORT=8080 MODE="read only"
//! TimeoutStopSec=30s
//! ```
//!
//! `Name=` defaults to the file stem. Only `ExecStart=` is required.
//! `TimeoutStopSec=` defaults to [`DEFAULT_TIMEOUT_STOP`].

mod command;
mod parser;

pub use command::{CommandError, CommandService};
pub use parser::{
    parse_command, parse_duration, parse_environment, parse_file, parse_unit_file, ParseError,
    ParsedFile,
};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordinator::{from_fn, BoxError, ServiceBuilder, ServiceFactory, ServiceHandle};

/// Extension of unit files picked up by [`load_dir`]
pub const UNIT_EXTENSION: &str = "service";

/// How long a stopping process gets after SIGTERM before it is killed
pub const DEFAULT_TIMEOUT_STOP: Duration = Duration::from_secs(10);

/// A service described by a unit file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandUnit {
    pub name: String,
    pub description: Option<String>,
    pub exec_start: Option<String>,
    pub exec_stop: Option<String>,
    pub exec_pause: Option<String>,
    pub exec_continue: Option<String>,
    pub environment: Vec<(String, String)>,
    pub timeout_stop: Option<Duration>,
    /// File the unit was loaded from, if any
    pub path: Option<PathBuf>,
}

impl CommandUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder for a handle that resolves to a [`CommandService`] on first use
    pub fn into_builder(self) -> ServiceBuilder<CommandService> {
        let name = self.name.clone();
        let description = self.description.clone();

        let builder = ServiceHandle::<CommandService>::builder(
            name,
            from_fn(move |_| CommandService::from_unit(&self).map_err(BoxError::from)),
        )
        .on_start(|svc| svc.start().map_err(BoxError::from))
        .on_stop(|svc| svc.stop().map_err(BoxError::from))
        .on_pause(|svc| svc.pause().map_err(BoxError::from))
        .on_continue(|svc| svc.resume().map_err(BoxError::from));

        match description {
            Some(description) => builder.description(description),
            None => builder,
        }
    }

    pub fn into_factory(self) -> ServiceFactory {
        self.into_builder().into_factory()
    }
}

fn first_value(parsed: &ParsedFile, section: &str, key: &str) -> Option<String> {
    parsed
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|vals| vals.first())
        .map(|(_, v)| v.clone())
}

/// Convert parsed INI data into a typed unit
pub fn parse_unit(name: &str, parsed: &ParsedFile) -> Result<CommandUnit, ParseError> {
    let name = first_value(parsed, "[Service]", "NAME").unwrap_or_else(|| name.to_string());
    let mut unit = CommandUnit::new(name);

    unit.description = first_value(parsed, "[Unit]", "DESCRIPTION");
    unit.exec_start = first_value(parsed, "[Service]", "EXECSTART");
    unit.exec_stop = first_value(parsed, "[Service]", "EXECSTOP");
    unit.exec_pause = first_value(parsed, "[Service]", "EXECPAUSE");
    unit.exec_continue = first_value(parsed, "[Service]", "EXECCONTINUE");

    if let Some(raw) = first_value(parsed, "[Service]", "TIMEOUTSTOPSEC") {
        let timeout = parse_duration(&raw)
            .ok_or_else(|| ParseError::InvalidValue("TimeoutStopSec".into(), raw))?;
        unit.timeout_stop = Some(timeout);
    }

    if unit.exec_start.is_none() {
        return Err(ParseError::MissingSetting(unit.name, "ExecStart".into()));
    }

    if let Some(vals) = parsed.get("[Service]").and_then(|s| s.get("ENVIRONMENT")) {
        let mut vals = vals.clone();
        vals.sort_by_key(|(order, _)| *order);
        for (_, v) in vals {
            unit.environment.extend(parse_environment(&v)?);
        }
    }

    Ok(unit)
}

/// Load a unit from a file
pub async fn load_unit(path: &Path) -> Result<CommandUnit, ParseError> {
    let name = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    let parsed = parse_unit_file(path).await?;
    let mut unit = parse_unit(name, &parsed)?;
    unit.path = Some(path.to_path_buf());
    Ok(unit)
}

/// Unit files in `dir`, sorted by file name
pub async fn unit_files(dir: &Path) -> Result<Vec<PathBuf>, ParseError> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(UNIT_EXTENSION) && path.is_file() {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

/// Load every unit in `dir`, in file name order
pub async fn load_dir(dir: &Path) -> Result<Vec<CommandUnit>, ParseError> {
    let mut units = Vec::new();
    for path in unit_files(dir).await? {
        log::debug!("Loading unit {}", path.display());
        units.push(load_unit(&path).await?);
    }
    Ok(units)
}

/// Default unit directory: `$SVCD_DIR`, else `<config dir>/svcd/services`
pub fn default_unit_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("SVCD_DIR") {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("svcd/services")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_unit() {
        let content = r#"
[Unit]
Description=Web frontend

[Service]
Name=frontend
ExecStart=/usr/bin/web --port 8080
ExecStop=/usr/bin/web-ctl stop
ExecPause=/usr/bin/web-ctl drain
ExecContinue=/usr/bin/web-ctl undrain
Environment=PORT=8080 MODE="read only"
Environment=DEBUG=1
"#;
        let parsed = parse_file(content).unwrap();
        let unit = parse_unit("web", &parsed).unwrap();

        assert_eq!(unit.name, "frontend");
        assert_eq!(unit.description.as_deref(), Some("Web frontend"));
        assert_eq!(unit.exec_start.as_deref(), Some("/usr/bin/web --port 8080"));
        assert_eq!(unit.exec_stop.as_deref(), Some("/usr/bin/web-ctl stop"));
        assert_eq!(unit.exec_pause.as_deref(), Some("/usr/bin/web-ctl drain"));
        assert_eq!(unit.exec_continue.as_deref(), Some("/usr/bin/web-ctl undrain"));
        assert_eq!(
            unit.environment,
            vec![
                ("PORT".into(), "8080".into()),
                ("MODE".into(), "read only".into()),
                ("DEBUG".into(), "1".into()),
            ]
        );
    }

    #[test]
    fn test_name_defaults_to_file_stem() {
        let parsed = parse_file("[Service]\nExecStart=/bin/sleep 10\n").unwrap();
        let unit = parse_unit("sleeper", &parsed).unwrap();
        assert_eq!(unit.name, "sleeper");
        assert!(unit.exec_stop.is_none());
        assert!(unit.description.is_none());
        assert!(unit.timeout_stop.is_none());
    }

    #[test]
    fn test_timeout_stop_sec() {
        let with_timeout = |timeout: &str| {
            let content = format!(
                "[Service]\nExecStart=/bin/sleep 10\nTimeoutStopSec={}\n",
                timeout
            );
            parse_unit("sleeper", &parse_file(&content).unwrap())
        };

        let unit = with_timeout("500ms").unwrap();
        assert_eq!(unit.timeout_stop, Some(Duration::from_millis(500)));

        let err = with_timeout("later").unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue(ref key, _) if key == "TimeoutStopSec"));
    }

    #[test]
    fn test_missing_exec_start() {
        let parsed = parse_file("[Unit]\nDescription=Nothing to run\n").unwrap();
        let err = parse_unit("empty", &parsed).unwrap_err();
        assert!(matches!(err, ParseError::MissingSetting(ref n, _) if n == "empty"));
    }
}
