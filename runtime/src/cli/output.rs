//! Output flags and terminal styling shared by all commands.
//!
//! The global `--json`, `--quiet`, `--verbose` and `--no-color` flags are
//! exported as environment variables by `main` so any module can check them.

use serde::Serialize;
use std::io::IsTerminal;

pub const JSON_ENV: &str = "PIXMIRROR_JSON";
pub const QUIET_ENV: &str = "PIXMIRROR_QUIET";
pub const VERBOSE_ENV: &str = "PIXMIRROR_VERBOSE";
pub const NO_COLOR_ENV: &str = "PIXMIRROR_NO_COLOR";

fn flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1").unwrap_or(false)
}

pub fn is_json() -> bool {
    flag(JSON_ENV)
}

pub fn is_quiet() -> bool {
    flag(QUIET_ENV)
}

pub fn is_verbose() -> bool {
    flag(VERBOSE_ENV)
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// ANSI styling that switches itself off for `--no-color`, `NO_COLOR` and
/// output that is not a terminal.
pub struct Styled {
    color: bool,
}

/// Whether styled output should carry ANSI codes.
fn use_color(is_terminal: bool, no_color_flag: bool, no_color_env: bool) -> bool {
    is_terminal && !no_color_flag && !no_color_env
}

impl Styled {
    /// Styling for text printed on stdout.
    pub fn new() -> Self {
        Self::for_stream(std::io::stdout().is_terminal())
    }

    /// Styling for text printed on stderr.
    pub fn stderr() -> Self {
        Self::for_stream(std::io::stderr().is_terminal())
    }

    fn for_stream(is_terminal: bool) -> Self {
        Self {
            color: use_color(
                is_terminal,
                flag(NO_COLOR_ENV),
                std::env::var_os("NO_COLOR").is_some(),
            ),
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn ok_sym(&self) -> String {
        self.paint("32", "✓")
    }

    pub fn warn_sym(&self) -> String {
        self.paint("33", "!")
    }

    pub fn fail_sym(&self) -> String {
        self.paint("31", "✗")
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}
