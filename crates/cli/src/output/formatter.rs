//! Output formatter for human-readable and JSON output
//!
//! Every command prints through a [`Formatter`] so that `--json`, `--quiet`
//! and `--no-color` behave the same everywhere.

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use console::{Term, style};
use serde::Serialize;

use super::OutputConfig;

/// Formatter for CLI output
///
/// In JSON mode all output is strict JSON without colors or progress.
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn is_quiet(&self) -> bool {
        self.config.quiet
    }

    /// Check if colors are enabled
    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    /// Output a value
    ///
    /// In JSON mode, serializes the value to JSON.
    /// In human mode, uses the Display implementation.
    pub fn output<T: Serialize + std::fmt::Display>(&self, value: &T) {
        if self.config.quiet {
            return;
        }

        if self.config.json {
            self.json(value);
        } else {
            println!("{value}");
        }
    }

    /// Output a success message (human mode only)
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        println!("{} {message}", self.paint("✓", Tone::Good));
    }

    /// Output an error message
    ///
    /// Errors are always printed, even in quiet mode.
    pub fn error(&self, message: &str) {
        if self.config.json {
            let error = serde_json::json!({ "error": message });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&error).unwrap_or_else(|_| message.to_string())
            );
        } else {
            eprintln!("{} {message}", self.paint("✗", Tone::Bad));
        }
    }

    /// Output a warning message
    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        eprintln!("{} {message}", self.paint("⚠", Tone::Warn));
    }

    /// Output JSON directly
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Print a line of text (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        println!("{message}");
    }

    /// Print a table with the given header and rows
    pub fn table(&self, header: &[&str], rows: Vec<Vec<String>>) {
        if self.config.quiet {
            return;
        }
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(header.to_vec());
        if !self.colors_enabled() {
            table.force_no_tty();
        }
        for row in rows {
            table.add_row(row);
        }
        println!("{table}");
    }

    /// Highlight a container name in listings
    pub fn container_name(&self, name: &str) -> String {
        self.paint(name, Tone::Container)
    }

    /// Ask a yes/no question on stderr
    ///
    /// Returns false without asking when stderr is not attended or JSON
    /// output is enabled.
    pub fn confirm(&self, question: &str) -> bool {
        if self.config.json || !console::user_attended_stderr() {
            return false;
        }
        let term = Term::stderr();
        if term.write_str(&format!("{question} [y/N] ")).is_err() {
            return false;
        }
        matches!(
            term.read_line().map(|answer| answer.trim().to_ascii_lowercase()),
            Ok(answer) if answer == "y" || answer == "yes"
        )
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        if !self.colors_enabled() {
            return text.to_string();
        }
        let styled = style(text).force_styling(true);
        match tone {
            Tone::Good => styled.green(),
            Tone::Bad => styled.red(),
            Tone::Warn => styled.yellow(),
            Tone::Container => styled.blue().bold(),
        }
        .to_string()
    }
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Good,
    Bad,
    Warn,
    Container,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatter_default() {
        let formatter = Formatter::default();
        assert!(!formatter.is_json());
        assert!(!formatter.is_quiet());
        assert!(formatter.colors_enabled());
    }

    #[test]
    fn test_formatter_json_mode() {
        let config = OutputConfig {
            json: true,
            ..Default::default()
        };
        let formatter = Formatter::new(config);
        assert!(formatter.is_json());
        assert!(!formatter.colors_enabled());
        assert!(!formatter.confirm("remove?"));
    }

    #[test]
    fn test_no_color_leaves_names_plain() {
        let config = OutputConfig {
            no_color: true,
            ..Default::default()
        };
        let formatter = Formatter::new(config);
        assert!(!formatter.colors_enabled());
        assert_eq!(formatter.container_name("releases"), "releases");
    }

    #[test]
    fn test_colored_names_carry_escape_codes() {
        let formatter = Formatter::default();
        let painted = formatter.container_name("releases");
        assert!(painted.contains("releases"));
        assert!(painted.contains('\u{1b}'));
    }
}
