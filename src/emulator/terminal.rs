//! Terminal IO: colors, keyboard modes and the console abstraction.
//!
//! The interpreter talks to the outside world through the [`Console`]
//! trait so tests can script keyboard input and capture rendered output.
//! [`StdConsole`] is the real thing: stdout for display, raw-mode reads
//! for single keys, no-echo reads for silent input.

use std::io::{self, BufRead, Write};

/// Foreground/background color selectors, as stored in `DISPLAY_COLOR` and
/// `DISPLAY_BACKGROUND`. The ANSI code is `30 + c` (foreground) or
/// `40 + c` (background).
pub const COLOR_BLACK: u8 = 0;
pub const COLOR_RED: u8 = 1;
pub const COLOR_GREEN: u8 = 2;
pub const COLOR_YELLOW: u8 = 3;
pub const COLOR_BLUE: u8 = 4;
pub const COLOR_MAGENTA: u8 = 5;
pub const COLOR_CYAN: u8 = 6;
pub const COLOR_WHITE: u8 = 7;

/// Keyboard modes for `OP_READ_INPUT`.
pub const KEYBOARD_READ_CHAR: u8 = 0;
pub const KEYBOARD_READ_CHAR_SILENTLY: u8 = 1;
pub const KEYBOARD_READ_LINE: u8 = 2;
pub const KEYBOARD_READ_LINE_SILENTLY: u8 = 3;

/// Resolves a `COLOR_*` name, for the assembler.
pub fn color_symbol(name: &str) -> Option<u8> {
    match name {
        "COLOR_BLACK" => Some(COLOR_BLACK),
        "COLOR_RED" => Some(COLOR_RED),
        "COLOR_GREEN" => Some(COLOR_GREEN),
        "COLOR_YELLOW" => Some(COLOR_YELLOW),
        "COLOR_BLUE" => Some(COLOR_BLUE),
        "COLOR_MAGENTA" => Some(COLOR_MAGENTA),
        "COLOR_CYAN" => Some(COLOR_CYAN),
        "COLOR_WHITE" => Some(COLOR_WHITE),
        _ => None,
    }
}

/// Resolves a `KEYBOARD_*` name, for the assembler.
pub fn keyboard_symbol(name: &str) -> Option<u8> {
    match name {
        "KEYBOARD_READ_CHAR" => Some(KEYBOARD_READ_CHAR),
        "KEYBOARD_READ_CHAR_SILENTLY" => Some(KEYBOARD_READ_CHAR_SILENTLY),
        "KEYBOARD_READ_LINE" => Some(KEYBOARD_READ_LINE),
        "KEYBOARD_READ_LINE_SILENTLY" => Some(KEYBOARD_READ_LINE_SILENTLY),
        _ => None,
    }
}

/// Parses a color cell into a selector. Empty or unparseable cells mean
/// "no color": text renders unstyled.
fn color_code(cell: &str) -> Option<u8> {
    let code: u8 = cell.trim().parse().ok()?;
    if code <= COLOR_WHITE { Some(code) } else { None }
}

/// Wraps `text` in the ANSI foreground sequence selected by `color_cell`.
pub fn paint(text: &str, color_cell: &str) -> String {
    match color_code(color_cell) {
        Some(code) => format!("\x1b[{}m{}\x1b[0m", 30 + code, text),
        None => text.to_string(),
    }
}

/// The ANSI sequence for `OP_SET_BACKGROUND_COLOR`: background on, clear
/// screen, cursor home.
pub fn background_clear(color_cell: &str) -> String {
    match color_code(color_cell) {
        Some(code) => format!("\x1b[{}m\x1b[2J\x1b[1;1H", 40 + code),
        None => "\x1b[0m\x1b[2J\x1b[1;1H".to_string(),
    }
}

/// One bitmap cell for `OP_RENDER_BITMAP`: two spaces on the palette
/// background. Unknown characters fall back to the active background.
pub fn bitmap_cell(ch: char, background_cell: &str) -> String {
    let code = match ch {
        'm' => Some(COLOR_MAGENTA),
        'g' => Some(COLOR_GREEN),
        'y' => Some(COLOR_YELLOW),
        'r' => Some(COLOR_RED),
        'B' => Some(COLOR_BLACK),
        'b' => Some(COLOR_BLUE),
        'c' => Some(COLOR_CYAN),
        'w' => Some(COLOR_WHITE),
        _ => color_code(background_cell),
    };
    match code {
        Some(code) => format!("\x1b[{}m  ", 40 + code),
        None => "\x1b[0m  ".to_string(),
    }
}

/// Terminal interface used by the interpreter.
///
/// The emulator is single-threaded; both methods may block.
pub trait Console {
    /// Writes already-styled text to the display.
    fn print(&mut self, text: &str);

    /// Reads keyboard input in one of the `KEYBOARD_*` modes.
    fn read_input(&mut self, mode: u8) -> io::Result<String>;
}

/// The process terminal.
pub struct StdConsole;

impl StdConsole {
    fn read_char(echo: bool) -> io::Result<String> {
        use crossterm::event::{read, Event, KeyCode, KeyEventKind};
        use crossterm::terminal;

        terminal::enable_raw_mode()?;
        let result: io::Result<String> = (|| loop {
            if let Event::Key(key) = read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char(c) => return Ok(c.to_string()),
                    KeyCode::Enter => return Ok("\n".to_string()),
                    _ => {}
                }
            }
        })();
        terminal::disable_raw_mode()?;

        let key = result?;
        if echo {
            print!("{key}");
            io::stdout().flush()?;
        }
        Ok(key)
    }

    fn read_line() -> io::Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

impl Console for StdConsole {
    fn print(&mut self, text: &str) {
        let mut out = io::stdout();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn read_input(&mut self, mode: u8) -> io::Result<String> {
        match mode {
            KEYBOARD_READ_CHAR => Self::read_char(true),
            KEYBOARD_READ_CHAR_SILENTLY => Self::read_char(false),
            KEYBOARD_READ_LINE => Self::read_line(),
            KEYBOARD_READ_LINE_SILENTLY => rpassword::read_password(),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unknown keyboard mode {other}"),
            )),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Console double for interpreter tests: captures everything printed
    /// and serves scripted input.
    pub struct TestConsole {
        pub output: String,
        pub input: VecDeque<String>,
    }

    impl TestConsole {
        pub fn new() -> Self {
            Self {
                output: String::new(),
                input: VecDeque::new(),
            }
        }

        pub fn with_input(lines: &[&str]) -> Self {
            Self {
                output: String::new(),
                input: lines.iter().map(|l| l.to_string()).collect(),
            }
        }
    }

    impl Console for TestConsole {
        fn print(&mut self, text: &str) {
            self.output.push_str(text);
        }

        fn read_input(&mut self, _mode: u8) -> io::Result<String> {
            self.input
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted input"))
        }
    }

    #[test]
    fn paint_wraps_in_ansi_color() {
        assert_eq!(paint("hi", "1"), "\x1b[31mhi\x1b[0m");
        assert_eq!(paint("hi", "7"), "\x1b[37mhi\x1b[0m");
    }

    #[test]
    fn paint_without_color_is_plain() {
        assert_eq!(paint("hi", ""), "hi");
        assert_eq!(paint("hi", "12"), "hi");
        assert_eq!(paint("hi", "red"), "hi");
    }

    #[test]
    fn background_clear_sequence() {
        assert_eq!(background_clear("4"), "\x1b[44m\x1b[2J\x1b[1;1H");
        assert_eq!(background_clear(""), "\x1b[0m\x1b[2J\x1b[1;1H");
    }

    #[test]
    fn bitmap_palette() {
        assert_eq!(bitmap_cell('r', ""), "\x1b[41m  ");
        assert_eq!(bitmap_cell('B', ""), "\x1b[40m  ");
        assert_eq!(bitmap_cell('w', ""), "\x1b[47m  ");
        // Unknown characters use the active background.
        assert_eq!(bitmap_cell('?', "4"), "\x1b[44m  ");
        assert_eq!(bitmap_cell('?', ""), "\x1b[0m  ");
    }

    #[test]
    fn symbols_resolve() {
        assert_eq!(color_symbol("COLOR_RED"), Some(1));
        assert_eq!(color_symbol("COLOR_WHITE"), Some(7));
        assert_eq!(color_symbol("COLOR_PINK"), None);
        assert_eq!(keyboard_symbol("KEYBOARD_READ_LINE"), Some(2));
        assert_eq!(keyboard_symbol("KEYBOARD_READ_CHAR_SILENTLY"), Some(1));
        assert_eq!(keyboard_symbol("KEYBOARD_EJECT"), None);
    }

    #[test]
    fn test_console_scripts_input() {
        let mut console = TestConsole::with_input(&["first", "second"]);
        assert_eq!(console.read_input(KEYBOARD_READ_LINE).unwrap(), "first");
        assert_eq!(console.read_input(KEYBOARD_READ_LINE).unwrap(), "second");
        assert!(console.read_input(KEYBOARD_READ_LINE).is_err());
    }
}
