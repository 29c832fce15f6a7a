//! Terminal status output
//!
//! Status lines go to stderr so stdout stays clean for the generated
//! document. Color is applied only when stderr is a terminal.

use is_terminal::IsTerminal;

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

fn color_enabled() -> bool {
    std::io::stderr().is_terminal()
}

/// Progress/status line.
pub fn status(message: &str) {
    if color_enabled() {
        eprintln!("{GREEN}{message}{RESET}");
    } else {
        eprintln!("{message}");
    }
}

/// Non-fatal warning.
pub fn warn(message: &str) {
    if color_enabled() {
        eprintln!("{YELLOW}warning:{RESET} {message}");
    } else {
        eprintln!("warning: {message}");
    }
}
