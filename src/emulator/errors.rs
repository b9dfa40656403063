//! Error types for the emulator core and the assembler.
//!
//! [`EmuError`] covers emulator-fatal conditions: the process reports them on
//! stderr and exits non-zero, and guest programs cannot observe them.
//! Guest-visible failures (disk errors, division by zero) never appear here;
//! they are written as text into `REG_ERROR` instead.

use cellbox_derive::Error;

/// Fatal emulator conditions.
#[derive(Debug, Error)]
pub enum EmuError {
    /// RAM access outside `[1, size]`.
    #[error("invalid RAM address {addr} (valid range 1..={size})")]
    InvalidAddress { addr: u32, size: u32 },
    /// A token that should denote a RAM address does not parse as one.
    #[error("not a valid address: {token:?}")]
    NotAnAddress { token: String },
    /// An instruction cell that does not parse as a control primitive.
    #[error("malformed instruction at {addr}: {text:?}")]
    MalformedInstruction { addr: u32, text: String },
    /// `REG_OP` holds something that is not a known opcode.
    #[error("unknown opcode {code:?}")]
    UnknownOpcode { code: String },
    /// A numeric opcode received a non-numeric operand.
    #[error("operand is not a number: {token:?}")]
    NotANumber { token: String },
    /// An integer-only opcode received a non-integer operand.
    #[error("operand is not an integer: {token:?}")]
    NotAnInteger { token: String },
    /// Arithmetic exceeded the representable range.
    #[error("numeric overflow in {op}")]
    NumericOverflow { op: &'static str },
    /// An immediate operand used where an address is required.
    #[error("an immediate operand cannot be used as a destination")]
    ImmediateDestination,
    /// `GLOBAL_RAM_SIZE` too small to hold the register file.
    #[error("RAM size {size} cannot hold the register file (need at least {min})")]
    InvalidRamSize { size: u32, min: u32 },
    /// The program image holds more cells than RAM.
    #[error("program image has {lines} cells but RAM holds {size}")]
    ImageTooLarge { lines: usize, size: u32 },
    /// I/O failure on the program image or the RAM dump.
    #[error("{path}: {reason}")]
    Io { path: String, reason: String },
}

/// Assembly-time failures.
///
/// The assembler wraps the specific failure into [`AsmError::AtLine`] so the
/// CLI can render a compiler-style diagnostic with a caret.
#[derive(Debug, Error)]
pub enum AsmError {
    /// Unrecognized command word.
    #[error("unknown command {name:?}")]
    UnknownCommand { name: String },
    /// A name that is neither a register, opcode, color nor keyboard symbol.
    #[error("unknown symbol {name:?}")]
    UnknownSymbol { name: String },
    /// Wrong number of operands for a command.
    #[error("operand count mismatch for {command}: expected {expected}, got {actual}")]
    ArityMismatch {
        command: String,
        expected: usize,
        actual: usize,
    },
    /// Label defined more than once.
    #[error("duplicate label {name:?}")]
    DuplicateLabel { name: String },
    /// Reference to a label that is never defined.
    #[error("undefined label {name:?}")]
    UndefinedLabel { name: String },
    /// Reference to a variable that is never declared.
    #[error("undefined variable {name:?}")]
    UndefinedVariable { name: String },
    /// Label or variable name with invalid characters.
    #[error("invalid name {name:?}")]
    InvalidName { name: String },
    /// String literal missing its closing quote.
    #[error("unterminated string literal")]
    UnterminatedString,
    /// `@` operand in destination position.
    #[error("an immediate value cannot be a destination")]
    ImmediateDestination,
    /// Operand token that fits no addressing mode.
    #[error("invalid operand {token:?}")]
    InvalidOperand { token: String },
    /// A failure with source location attached.
    #[error("{file}:{line}:{column}: {reason}")]
    AtLine {
        file: String,
        line: usize,
        column: usize,
        reason: String,
    },
    /// I/O failure on a source or output file.
    #[error("{path}: {reason}")]
    Io { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emu_error_display() {
        let err = EmuError::InvalidAddress { addr: 0, size: 64 };
        assert_eq!(err.to_string(), "invalid RAM address 0 (valid range 1..=64)");

        let err = EmuError::UnknownOpcode {
            code: "99".to_string(),
        };
        assert_eq!(err.to_string(), "unknown opcode \"99\"");
    }

    #[test]
    fn asm_error_display() {
        let err = AsmError::AtLine {
            file: "boot.asm".to_string(),
            line: 3,
            column: 7,
            reason: "unknown symbol \"REG_Q\"".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "boot.asm:3:7: unknown symbol \"REG_Q\""
        );
    }
}
