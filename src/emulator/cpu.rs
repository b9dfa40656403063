//! The ALU/IO unit: `cpu_exec` and its opcode handlers.
//!
//! `cpu_exec` clears `REG_ERROR`, decodes the opcode in `REG_OP`, reads the
//! operand values from `REG_A..REG_D`, runs the handler and writes the
//! result registers. Guest-visible failures (disk errors, division by
//! zero, keyboard failures) land in `REG_ERROR`; everything else that goes
//! wrong here is emulator-fatal.

use crate::emulator::errors::EmuError;
use crate::emulator::isa::Opcode;
use crate::emulator::machine::{Flow, Machine};
use crate::emulator::numeric;
use crate::emulator::ram::Addr;
use crate::emulator::registers::{
    DISPLAY_BACKGROUND, DISPLAY_BUFFER, DISPLAY_COLOR, KEYBOARD_BUFFER, REG_A, REG_B,
    REG_BOOL_RES, REG_C, REG_D, REG_ERROR, REG_OP, REG_RES,
};
use crate::emulator::terminal::{self, Console};
use std::thread;
use std::time::Duration;

impl<C: Console> Machine<C> {
    /// Executes one `cpu_exec` instruction.
    pub(crate) fn cpu_exec(&mut self) -> Result<Flow, EmuError> {
        // REG_ERROR reflects exactly the last cpu_exec.
        self.ram.write(REG_ERROR, "")?;

        let opcode = Opcode::decode(self.ram.read(REG_OP)?)?;
        let a = self.ram.read(REG_A)?.to_string();
        let b = self.ram.read(REG_B)?.to_string();
        let c = self.ram.read(REG_C)?.to_string();
        let d = self.ram.read(REG_D)?.to_string();

        match opcode {
            // Arithmetic
            Opcode::Add => self.set_res(numeric::add(&a, &b)?)?,
            Opcode::Sub => self.set_res(numeric::sub(&a, &b)?)?,
            Opcode::Incr => self.set_res(numeric::incr(&a)?)?,
            Opcode::Decr => self.set_res(numeric::decr(&a)?)?,
            Opcode::Mul => self.set_res(numeric::mul(&a, &b)?)?,
            Opcode::Div => self.op_div_mod(&a, &b, false)?,
            Opcode::Mod => self.op_div_mod(&a, &b, true)?,

            // Predicates
            Opcode::IsNum => self.set_bool(numeric::is_number(&a))?,
            Opcode::CmpEq => self.set_bool(a == b)?,
            Opcode::CmpNeq => self.set_bool(a != b)?,
            Opcode::CmpLt => {
                let (x, y) = (numeric::parse_integer(&a)?, numeric::parse_integer(&b)?);
                self.set_bool(x < y)?;
            }
            Opcode::CmpLe => {
                let (x, y) = (numeric::parse_integer(&a)?, numeric::parse_integer(&b)?);
                self.set_bool(x <= y)?;
            }
            Opcode::Contains => self.set_bool(a.contains(&b))?,
            Opcode::StartsWith => {
                let matched = a.starts_with(&b);
                self.set_bool(matched)?;
                let res = a.strip_prefix(&b).unwrap_or(&a).to_string();
                self.set_res(res)?;
            }

            // String operations
            Opcode::GetLength => self.set_res(a.chars().count().to_string())?,
            Opcode::GetColumn => {
                let res = op_get_column(&a, &b, &c)?;
                self.set_res(res)?;
            }
            Opcode::ReplaceColumn => {
                let res = op_replace_column(&a, &b, &c, &d)?;
                self.set_res(res)?;
            }
            Opcode::ConcatWith => self.set_res(format!("{a}{c}{b}"))?,

            // Terminal IO
            Opcode::ReadInput => self.op_read_input(&a)?,
            Opcode::Display => self.op_display(false)?,
            Opcode::DisplayLn => self.op_display(true)?,
            Opcode::SetBackgroundColor => {
                let background = self.ram.read(DISPLAY_BACKGROUND)?.to_string();
                self.console.print(&terminal::background_clear(&background));
            }
            Opcode::RenderBitmap => self.op_render_bitmap(&a, &b)?,

            // Disk IO
            Opcode::ReadBlock => match self.disks.read_block(&a, &b) {
                Ok(contents) => self.set_res(contents)?,
                Err(err) => self.set_error(err.to_string())?,
            },
            Opcode::WriteBlock => {
                if let Err(err) = self.disks.write_block(&a, &b, &c) {
                    self.set_error(err.to_string())?;
                }
            }

            // Placeholders: identity, by contract.
            Opcode::EncryptData | Opcode::DecryptData => self.set_res(a)?,

            // Control
            Opcode::Nop => {
                let seconds: f64 = a.trim().parse().map_err(|_| EmuError::NotANumber {
                    token: a.clone(),
                })?;
                if seconds > 0.0 {
                    thread::sleep(Duration::from_secs_f64(seconds));
                }
            }
            Opcode::Halt => return Ok(Flow::Halt),
        }

        Ok(Flow::Continue)
    }

    fn set_res(&mut self, value: impl Into<String>) -> Result<(), EmuError> {
        self.ram.write(REG_RES, value)
    }

    fn set_bool(&mut self, value: bool) -> Result<(), EmuError> {
        self.ram.write(REG_BOOL_RES, if value { "1" } else { "0" })
    }

    fn set_error(&mut self, reason: impl Into<String>) -> Result<(), EmuError> {
        self.ram.write(REG_ERROR, reason)
    }

    fn op_div_mod(&mut self, a: &str, b: &str, modulus: bool) -> Result<(), EmuError> {
        let x = numeric::parse_truncated(a)?;
        let y = numeric::parse_truncated(b)?;
        if y == 0 {
            // REG_RES is left unchanged.
            return self.set_error("division by zero");
        }
        let result = if modulus { x % y } else { x / y };
        self.set_res(result.to_string())
    }

    fn op_read_input(&mut self, mode_cell: &str) -> Result<(), EmuError> {
        let mode: u8 = mode_cell.trim().parse().unwrap_or(u8::MAX);
        match self.console.read_input(mode) {
            Ok(input) => self.ram.write(KEYBOARD_BUFFER, input),
            Err(err) => self.set_error(format!("Keyboard read failed: {err}")),
        }
    }

    fn op_display(&mut self, newline: bool) -> Result<(), EmuError> {
        let text = self.ram.read(DISPLAY_BUFFER)?.to_string();
        let color = self.ram.read(DISPLAY_COLOR)?.to_string();
        let mut rendered = terminal::paint(&text, &color);
        if newline {
            rendered.push('\n');
        }
        self.console.print(&rendered);
        Ok(())
    }

    /// Draws the cells in `[start, end)` as bitmap rows.
    fn op_render_bitmap(&mut self, start: &str, end: &str) -> Result<(), EmuError> {
        let start = Addr::parse(start)?;
        let end = Addr::parse(end)?;
        let background = self.ram.read(DISPLAY_BACKGROUND)?.to_string();

        let mut frame = String::new();
        for cell in start.0..end.0 {
            let row = self.ram.read(Addr(cell))?.to_string();
            for ch in row.chars() {
                frame.push_str(&terminal::bitmap_cell(ch, &background));
            }
            frame.push_str("\x1b[0m\n");
        }
        self.console.print(&frame);
        Ok(())
    }
}

/// `OP_GET_COLUMN`: field `b` of `a` split on `c`, or character `b` when
/// `c` is empty. Indices are 1-based; anything out of range yields the
/// empty string.
fn op_get_column(a: &str, b: &str, c: &str) -> Result<String, EmuError> {
    let index = numeric::parse_integer(b)?;
    if index < 1 {
        return Ok(String::new());
    }
    let index = (index - 1) as usize;

    if c.is_empty() {
        Ok(a.chars().nth(index).map(String::from).unwrap_or_default())
    } else {
        Ok(a.split(c).nth(index).unwrap_or_default().to_string())
    }
}

/// `OP_REPLACE_COLUMN`: `a` with field `b` replaced by `d`, reconstructed
/// with separator `c`; with empty `c` the single character at that
/// position is substituted. Out-of-range indices leave `a` unchanged.
fn op_replace_column(a: &str, b: &str, c: &str, d: &str) -> Result<String, EmuError> {
    let index = numeric::parse_integer(b)?;
    if index < 1 {
        return Ok(a.to_string());
    }
    let index = (index - 1) as usize;

    if c.is_empty() {
        let mut chars: Vec<char> = a.chars().collect();
        if index >= chars.len() {
            return Ok(a.to_string());
        }
        chars.splice(index..=index, d.chars());
        Ok(chars.into_iter().collect())
    } else {
        let mut fields: Vec<&str> = a.split(c).collect();
        if index >= fields.len() {
            return Ok(a.to_string());
        }
        fields[index] = d;
        Ok(fields.join(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::machine::tests::test_machine;
    use crate::emulator::terminal::tests::TestConsole;
    use std::fs;

    /// Sets up operands and opcode, runs one cpu_exec, returns the machine.
    fn exec(op: Opcode, a: &str, b: &str, c: &str, d: &str) -> Machine<TestConsole> {
        let mut machine = test_machine();
        machine.ram.write(REG_A, a).unwrap();
        machine.ram.write(REG_B, b).unwrap();
        machine.ram.write(REG_C, c).unwrap();
        machine.ram.write(REG_D, d).unwrap();
        machine.ram.write(REG_OP, op.code().to_string()).unwrap();
        machine.cpu_exec().unwrap();
        machine
    }

    fn exec_res(op: Opcode, a: &str, b: &str, c: &str, d: &str) -> String {
        let machine = exec(op, a, b, c, d);
        machine.ram.read(REG_RES).unwrap().to_string()
    }

    fn exec_bool(op: Opcode, a: &str, b: &str) -> String {
        let machine = exec(op, a, b, "", "");
        machine.ram.read(REG_BOOL_RES).unwrap().to_string()
    }

    // ==================== Arithmetic ====================

    #[test]
    fn add() {
        assert_eq!(exec_res(Opcode::Add, "3", "4", "", ""), "7");
        assert_eq!(exec_res(Opcode::Add, "-3", "1.5", "", ""), "-1.5");
    }

    #[test]
    fn sub() {
        assert_eq!(exec_res(Opcode::Sub, "10", "4", "", ""), "6");
        assert_eq!(exec_res(Opcode::Sub, "0.25", "0.75", "", ""), "-0.50");
    }

    #[test]
    fn incr_decr() {
        assert_eq!(exec_res(Opcode::Incr, "41", "", "", ""), "42");
        assert_eq!(exec_res(Opcode::Decr, "0", "", "", ""), "-1");
    }

    #[test]
    fn mul() {
        assert_eq!(exec_res(Opcode::Mul, "6", "7", "", ""), "42");
        assert_eq!(exec_res(Opcode::Mul, "1.25", "2.0", "", ""), "2.50");
    }

    #[test]
    fn div_and_mod() {
        assert_eq!(exec_res(Opcode::Div, "17", "5", "", ""), "3");
        assert_eq!(exec_res(Opcode::Mod, "17", "5", "", ""), "2");
        assert_eq!(exec_res(Opcode::Div, "-17", "5", "", ""), "-3");
    }

    #[test]
    fn division_by_zero_sets_error_and_preserves_res() {
        let mut machine = test_machine();
        machine.ram.write(REG_RES, "kept").unwrap();
        machine.ram.write(REG_A, "10").unwrap();
        machine.ram.write(REG_B, "0").unwrap();
        machine
            .ram
            .write(REG_OP, Opcode::Div.code().to_string())
            .unwrap();
        machine.cpu_exec().unwrap();

        assert_eq!(machine.ram.read(REG_ERROR).unwrap(), "division by zero");
        assert_eq!(machine.ram.read(REG_RES).unwrap(), "kept");
    }

    #[test]
    fn error_register_is_cleared_on_entry() {
        let mut machine = test_machine();
        machine.ram.write(REG_ERROR, "stale failure").unwrap();
        machine.ram.write(REG_A, "1").unwrap();
        machine.ram.write(REG_B, "1").unwrap();
        machine
            .ram
            .write(REG_OP, Opcode::Add.code().to_string())
            .unwrap();
        machine.cpu_exec().unwrap();
        assert_eq!(machine.ram.read(REG_ERROR).unwrap(), "");
    }

    #[test]
    fn arithmetic_on_garbage_is_fatal() {
        let mut machine = test_machine();
        machine.ram.write(REG_A, "pear").unwrap();
        machine.ram.write(REG_B, "1").unwrap();
        machine
            .ram
            .write(REG_OP, Opcode::Add.code().to_string())
            .unwrap();
        assert!(matches!(
            machine.cpu_exec(),
            Err(EmuError::NotANumber { .. })
        ));
    }

    // ==================== Predicates ====================

    #[test]
    fn is_num() {
        assert_eq!(exec_bool(Opcode::IsNum, "42", ""), "1");
        assert_eq!(exec_bool(Opcode::IsNum, "-4.25", ""), "1");
        assert_eq!(exec_bool(Opcode::IsNum, "x42", ""), "0");
        assert_eq!(exec_bool(Opcode::IsNum, "", ""), "0");
    }

    #[test]
    fn string_equality() {
        assert_eq!(exec_bool(Opcode::CmpEq, "abc", "abc"), "1");
        assert_eq!(exec_bool(Opcode::CmpEq, "abc", "abd"), "0");
        assert_eq!(exec_bool(Opcode::CmpNeq, "abc", "abd"), "1");
        assert_eq!(exec_bool(Opcode::CmpNeq, "", ""), "0");
    }

    #[test]
    fn integer_comparisons() {
        assert_eq!(exec_bool(Opcode::CmpLt, "3", "5"), "1");
        assert_eq!(exec_bool(Opcode::CmpLt, "5", "3"), "0");
        assert_eq!(exec_bool(Opcode::CmpLe, "5", "5"), "1");
        assert_eq!(exec_bool(Opcode::CmpLe, "6", "5"), "0");
        assert_eq!(exec_bool(Opcode::CmpLt, "-10", "1"), "1");
    }

    #[test]
    fn integer_comparison_on_non_integer_is_fatal() {
        let mut machine = test_machine();
        machine.ram.write(REG_A, "3.5").unwrap();
        machine.ram.write(REG_B, "5").unwrap();
        machine
            .ram
            .write(REG_OP, Opcode::CmpLt.code().to_string())
            .unwrap();
        assert!(matches!(
            machine.cpu_exec(),
            Err(EmuError::NotAnInteger { .. })
        ));
    }

    #[test]
    fn contains() {
        assert_eq!(exec_bool(Opcode::Contains, "hello world", "lo w"), "1");
        assert_eq!(exec_bool(Opcode::Contains, "hello", "world"), "0");
        assert_eq!(exec_bool(Opcode::Contains, "hello", ""), "1");
    }

    #[test]
    fn starts_with_strips_the_prefix() {
        let machine = exec(Opcode::StartsWith, "/dev/disk0", "/dev/", "", "");
        assert_eq!(machine.ram.read(REG_BOOL_RES).unwrap(), "1");
        assert_eq!(machine.ram.read(REG_RES).unwrap(), "disk0");
    }

    #[test]
    fn starts_with_mismatch_keeps_a() {
        let machine = exec(Opcode::StartsWith, "/dev/disk0", "/sys/", "", "");
        assert_eq!(machine.ram.read(REG_BOOL_RES).unwrap(), "0");
        assert_eq!(machine.ram.read(REG_RES).unwrap(), "/dev/disk0");
    }

    #[test]
    fn starts_with_empty_prefix() {
        let machine = exec(Opcode::StartsWith, "abc", "", "", "");
        assert_eq!(machine.ram.read(REG_BOOL_RES).unwrap(), "1");
        assert_eq!(machine.ram.read(REG_RES).unwrap(), "abc");
    }

    // ==================== String operations ====================

    #[test]
    fn get_length() {
        assert_eq!(exec_res(Opcode::GetLength, "hello", "", "", ""), "5");
        assert_eq!(exec_res(Opcode::GetLength, "", "", "", ""), "0");
    }

    #[test]
    fn get_column_by_character() {
        assert_eq!(exec_res(Opcode::GetColumn, "hello", "2", "", ""), "e");
        assert_eq!(exec_res(Opcode::GetColumn, "hello", "9", "", ""), "");
        assert_eq!(exec_res(Opcode::GetColumn, "hello", "0", "", ""), "");
    }

    #[test]
    fn get_column_by_field() {
        assert_eq!(exec_res(Opcode::GetColumn, "a:b:c", "2", ":", ""), "b");
        assert_eq!(exec_res(Opcode::GetColumn, "a:b:c", "3", ":", ""), "c");
        assert_eq!(exec_res(Opcode::GetColumn, "a:b:c", "4", ":", ""), "");
    }

    #[test]
    fn replace_column_by_field() {
        assert_eq!(
            exec_res(Opcode::ReplaceColumn, "a:b:c", "2", ":", "X"),
            "a:X:c"
        );
        assert_eq!(
            exec_res(Opcode::ReplaceColumn, "a:b:c", "4", ":", "X"),
            "a:b:c"
        );
    }

    #[test]
    fn replace_column_by_character() {
        assert_eq!(
            exec_res(Opcode::ReplaceColumn, "hello", "1", "", "J"),
            "Jello"
        );
        assert_eq!(
            exec_res(Opcode::ReplaceColumn, "hello", "9", "", "J"),
            "hello"
        );
    }

    #[test]
    fn concat_with() {
        assert_eq!(exec_res(Opcode::ConcatWith, "a", "b", ":", ""), "a:b");
        assert_eq!(exec_res(Opcode::ConcatWith, "", "", "", ""), "");
        assert_eq!(exec_res(Opcode::ConcatWith, "x", "z", "--", ""), "x--z");
    }

    // ==================== Terminal ====================

    #[test]
    fn display_paints_the_buffer() {
        let mut machine = test_machine();
        machine.ram.write(DISPLAY_BUFFER, "alert").unwrap();
        machine.ram.write(DISPLAY_COLOR, "1").unwrap();
        machine
            .ram
            .write(REG_OP, Opcode::Display.code().to_string())
            .unwrap();
        machine.cpu_exec().unwrap();
        assert_eq!(machine.console.output, "\x1b[31malert\x1b[0m");
    }

    #[test]
    fn display_ln_appends_newline() {
        let mut machine = test_machine();
        machine.ram.write(DISPLAY_BUFFER, "done").unwrap();
        machine
            .ram
            .write(REG_OP, Opcode::DisplayLn.code().to_string())
            .unwrap();
        machine.cpu_exec().unwrap();
        assert_eq!(machine.console.output, "done\n");
    }

    #[test]
    fn set_background_clears_screen() {
        let mut machine = test_machine();
        machine.ram.write(DISPLAY_BACKGROUND, "4").unwrap();
        machine
            .ram
            .write(REG_OP, Opcode::SetBackgroundColor.code().to_string())
            .unwrap();
        machine.cpu_exec().unwrap();
        assert_eq!(machine.console.output, "\x1b[44m\x1b[2J\x1b[1;1H");
    }

    #[test]
    fn render_bitmap_draws_rows() {
        let mut machine = test_machine();
        machine.ram.write(Addr(100), "rg").unwrap();
        machine.ram.write(Addr(101), "Bw").unwrap();
        machine.ram.write(REG_A, "100").unwrap();
        machine.ram.write(REG_B, "102").unwrap();
        machine
            .ram
            .write(REG_OP, Opcode::RenderBitmap.code().to_string())
            .unwrap();
        machine.cpu_exec().unwrap();
        assert_eq!(
            machine.console.output,
            "\x1b[41m  \x1b[42m  \x1b[0m\n\x1b[40m  \x1b[47m  \x1b[0m\n"
        );
    }

    #[test]
    fn read_input_failure_is_guest_visible() {
        let mut machine = test_machine();
        machine.ram.write(REG_A, "2").unwrap();
        machine
            .ram
            .write(REG_OP, Opcode::ReadInput.code().to_string())
            .unwrap();
        machine.cpu_exec().unwrap();
        assert!(machine
            .ram
            .read(REG_ERROR)
            .unwrap()
            .starts_with("Keyboard read failed"));
    }

    // ==================== Disk ====================

    fn with_disk(machine: &Machine<TestConsole>, name: &str, blocks: u64) {
        let mut image = format!("{blocks}\n");
        for _ in 1..blocks {
            image.push('\n');
        }
        fs::write(machine.disks.dir().join(name), image).unwrap();
    }

    #[test]
    fn disk_round_trip() {
        let mut machine = test_machine();
        with_disk(&machine, "cpu-d1", 4);

        machine.ram.write(REG_A, "cpu-d1").unwrap();
        machine.ram.write(REG_B, "3").unwrap();
        machine.ram.write(REG_C, "hello").unwrap();
        machine
            .ram
            .write(REG_OP, Opcode::WriteBlock.code().to_string())
            .unwrap();
        machine.cpu_exec().unwrap();
        assert_eq!(machine.ram.read(REG_ERROR).unwrap(), "");

        machine
            .ram
            .write(REG_OP, Opcode::ReadBlock.code().to_string())
            .unwrap();
        machine.cpu_exec().unwrap();
        assert_eq!(machine.ram.read(REG_ERROR).unwrap(), "");
        assert_eq!(machine.ram.read(REG_RES).unwrap(), "hello");
    }

    #[test]
    fn disk_block_one_write_is_guest_error() {
        let mut machine = test_machine();
        with_disk(&machine, "cpu-d2", 4);

        machine.ram.write(REG_A, "cpu-d2").unwrap();
        machine.ram.write(REG_B, "1").unwrap();
        machine.ram.write(REG_C, "anything").unwrap();
        machine
            .ram
            .write(REG_OP, Opcode::WriteBlock.code().to_string())
            .unwrap();
        machine.cpu_exec().unwrap();
        assert_eq!(
            machine.ram.read(REG_ERROR).unwrap(),
            "Block 1 is read-only"
        );
    }

    #[test]
    fn missing_disk_is_guest_error() {
        let mut machine = test_machine();
        machine.ram.write(REG_A, "cpu-missing").unwrap();
        machine.ram.write(REG_B, "2").unwrap();
        machine
            .ram
            .write(REG_OP, Opcode::ReadBlock.code().to_string())
            .unwrap();
        machine.cpu_exec().unwrap();
        assert_eq!(
            machine.ram.read(REG_ERROR).unwrap(),
            "Disk cpu-missing not found"
        );
    }

    // ==================== Placeholders and control ====================

    #[test]
    fn encrypt_decrypt_are_identity() {
        assert_eq!(exec_res(Opcode::EncryptData, "secret", "", "", ""), "secret");
        assert_eq!(exec_res(Opcode::DecryptData, "secret", "", "", ""), "secret");
    }

    #[test]
    fn nop_accepts_zero_and_rejects_garbage() {
        let machine = exec(Opcode::Nop, "0", "", "", "");
        assert_eq!(machine.ram.read(REG_ERROR).unwrap(), "");

        let mut machine = test_machine();
        machine.ram.write(REG_A, "soon").unwrap();
        machine
            .ram
            .write(REG_OP, Opcode::Nop.code().to_string())
            .unwrap();
        assert!(matches!(
            machine.cpu_exec(),
            Err(EmuError::NotANumber { .. })
        ));
    }

    #[test]
    fn halt_stops_the_flow() {
        let mut machine = test_machine();
        machine
            .ram
            .write(REG_OP, Opcode::Halt.code().to_string())
            .unwrap();
        assert_eq!(machine.cpu_exec().unwrap(), Flow::Halt);
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let mut machine = test_machine();
        machine.ram.write(REG_OP, "99").unwrap();
        assert!(matches!(
            machine.cpu_exec(),
            Err(EmuError::UnknownOpcode { .. })
        ));
    }

    #[test]
    fn predicates_always_leave_zero_or_one() {
        for (op, a, b) in [
            (Opcode::IsNum, "x", ""),
            (Opcode::CmpEq, "p", "q"),
            (Opcode::CmpNeq, "p", "q"),
            (Opcode::Contains, "p", "q"),
            (Opcode::StartsWith, "p", "q"),
        ] {
            let result = exec_bool(op, a, b);
            assert!(result == "0" || result == "1", "{op:?} produced {result:?}");
        }
    }
}
