//! Command line options.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use shellpane_core::TerminalSettings;

/// Runs a shell in a headless terminal, types each COMMAND followed by
/// Enter, then prints the resulting screen.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "shellpane")]
#[command(about = "Run a shell in a headless terminal and print its screen", long_about = None)]
#[command(version)]
pub struct RunOptions {
    /// Lines typed into the shell, each followed by Enter
    #[arg(value_name = "COMMAND")]
    pub commands: Vec<String>,

    /// Load terminal settings from a YAML file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Shell to run (default: $SHELL, then /bin/sh)
    #[arg(long, value_name = "PATH")]
    pub shell: Option<String>,

    /// Terminal columns
    #[arg(long, value_name = "N")]
    pub cols: Option<u16>,

    /// Terminal rows
    #[arg(long, value_name = "N")]
    pub rows: Option<u16>,

    /// Maximum time to wait for output, in milliseconds
    #[arg(long, value_name = "MS", default_value = "5000", value_parser = parse_millis)]
    pub timeout: Duration,

    /// Stop once the screen is unchanged this long, in milliseconds
    #[arg(long, value_name = "MS", default_value = "300", value_parser = parse_millis)]
    pub idle: Duration,

    /// Wait until TEXT appears instead of waiting for an idle screen
    #[arg(long = "wait", value_name = "TEXT")]
    pub wait_for: Option<String>,

    /// Include the scrollback window in text output
    #[arg(long)]
    pub scrollback: bool,

    /// Print the final screen as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the JSON schema of the --json output and exit
    #[arg(long)]
    pub schema: bool,
}

impl RunOptions {
    /// Load settings and apply command line overrides.
    pub fn settings(&self) -> Result<TerminalSettings> {
        let mut settings = match &self.config {
            Some(path) => TerminalSettings::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => TerminalSettings::default(),
        };

        if let Some(shell) = &self.shell {
            settings.shell = Some(shell.clone());
        }
        if let Some(cols) = self.cols {
            settings.default_cols = cols;
        }
        if let Some(rows) = self.rows {
            settings.default_rows = rows;
        }

        settings.validate().context("invalid terminal settings")?;
        Ok(settings)
    }
}

fn parse_millis(raw: &str) -> std::result::Result<Duration, String> {
    raw.parse()
        .map(Duration::from_millis)
        .map_err(|_| format!("expected milliseconds, got {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> RunOptions {
        RunOptions::try_parse_from(std::iter::once("shellpane").chain(args.iter().copied()))
            .unwrap()
    }

    fn parse_err(args: &[&str]) -> ErrorKind {
        RunOptions::try_parse_from(std::iter::once("shellpane").chain(args.iter().copied()))
            .unwrap_err()
            .kind()
    }

    #[test]
    fn test_command_definition() {
        RunOptions::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let options = parse(&[]);
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.idle, Duration::from_millis(300));
        assert_eq!(options.config, None);
        assert_eq!(options.wait_for, None);
        assert!(!options.json && !options.scrollback && !options.schema);
        assert!(options.commands.is_empty());
    }

    #[test]
    fn test_flags_and_commands() {
        let options = parse(&[
            "--cols", "100", "--rows", "30", "--json", "--wait", "done", "--timeout", "750", "ls",
            "echo done",
        ]);
        assert_eq!(options.cols, Some(100));
        assert_eq!(options.rows, Some(30));
        assert!(options.json);
        assert_eq!(options.wait_for.as_deref(), Some("done"));
        assert_eq!(options.timeout, Duration::from_millis(750));
        assert_eq!(options.commands, vec!["ls".to_string(), "echo done".to_string()]);
    }

    #[test]
    fn test_double_dash_ends_options() {
        let options = parse(&["--", "--json", "ls"]);
        assert!(!options.json);
        assert_eq!(options.commands, vec!["--json".to_string(), "ls".to_string()]);
    }

    #[test]
    fn test_help_and_schema() {
        assert_eq!(parse_err(&["--help"]), ErrorKind::DisplayHelp);
        assert_eq!(parse_err(&["-h"]), ErrorKind::DisplayHelp);
        assert!(parse(&["--schema"]).schema);
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_err(&["--cols"]), ErrorKind::InvalidValue);
        assert_eq!(parse_err(&["--cols", "wide"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["--rows", "70000"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["--idle", "soon"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["--frobnicate"]), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_settings_overrides() {
        let options = parse(&["--shell", "/bin/sh", "--cols", "120"]);
        let settings = options.settings().unwrap();
        assert_eq!(settings.shell.as_deref(), Some("/bin/sh"));
        assert_eq!(settings.default_cols, 120);
        assert_eq!(settings.default_rows, 24);
    }

    #[test]
    fn test_settings_rejects_zero_size() {
        let options = parse(&["--rows", "0"]);
        assert!(options.settings().is_err());
    }

    #[test]
    fn test_settings_missing_config() {
        let options = parse(&["--config", "/no/such/config.yaml"]);
        let err = options.settings().unwrap_err();
        assert!(err.to_string().contains("/no/such/config.yaml"));
    }
}
