//! The register file.
//!
//! Registers are ordinary RAM cells at fixed, well-known addresses. The
//! table is compile-time constant; nothing is allocated at run time. Guest
//! programs reference registers by name and the assembler resolves the
//! names through [`symbol`].
//!
//! Addresses 1..=16 are reserved; loaded programs begin at
//! [`PROGRAM_START`].

use crate::emulator::ram::Addr;

/// Opcode selector for the next `cpu_exec`.
pub const REG_OP: Addr = Addr(1);
/// First operand cell.
pub const REG_A: Addr = Addr(2);
/// Second operand cell.
pub const REG_B: Addr = Addr(3);
/// Third operand cell.
pub const REG_C: Addr = Addr(4);
/// Fourth operand cell.
pub const REG_D: Addr = Addr(5);
/// Primary result.
pub const REG_RES: Addr = Addr(6);
/// `"1"` or `"0"` after any predicate opcode.
pub const REG_BOOL_RES: Addr = Addr(7);
/// Empty on success, textual reason on failure. Cleared by every
/// `cpu_exec` entry.
pub const REG_ERROR: Addr = Addr(8);
/// 1-based index of the next instruction cell.
pub const PROGRAM_COUNTER: Addr = Addr(9);
/// Text staged for `OP_DISPLAY` / `OP_DISPLAY_LN`.
pub const DISPLAY_BUFFER: Addr = Addr(10);
/// Foreground color selector for display opcodes.
pub const DISPLAY_COLOR: Addr = Addr(11);
/// Background color selector.
pub const DISPLAY_BACKGROUND: Addr = Addr(12);
/// Last keyboard input, written by `OP_READ_INPUT`.
pub const KEYBOARD_BUFFER: Addr = Addr(13);
/// Heap bound maintained by guest programs, not by the core.
pub const FREE_MEMORY_START: Addr = Addr(14);
/// Heap bound maintained by guest programs, not by the core.
pub const FREE_MEMORY_END: Addr = Addr(15);
/// Target of the `read` diagnostic primitive.
pub const REG_SCRATCH: Addr = Addr(16);

/// Number of reserved cells at the bottom of RAM.
pub const RESERVED_CELLS: u32 = 16;

/// First cell available to loaded programs.
pub const PROGRAM_START: Addr = Addr(RESERVED_CELLS + 1);

/// All registers with their symbolic names, in address order.
pub const REGISTER_TABLE: &[(&str, Addr)] = &[
    ("REG_OP", REG_OP),
    ("REG_A", REG_A),
    ("REG_B", REG_B),
    ("REG_C", REG_C),
    ("REG_D", REG_D),
    ("REG_RES", REG_RES),
    ("REG_BOOL_RES", REG_BOOL_RES),
    ("REG_ERROR", REG_ERROR),
    ("PROGRAM_COUNTER", PROGRAM_COUNTER),
    ("DISPLAY_BUFFER", DISPLAY_BUFFER),
    ("DISPLAY_COLOR", DISPLAY_COLOR),
    ("DISPLAY_BACKGROUND", DISPLAY_BACKGROUND),
    ("KEYBOARD_BUFFER", KEYBOARD_BUFFER),
    ("FREE_MEMORY_START", FREE_MEMORY_START),
    ("FREE_MEMORY_END", FREE_MEMORY_END),
    ("REG_SCRATCH", REG_SCRATCH),
];

/// Resolves a register name to its address.
pub fn symbol(name: &str) -> Option<Addr> {
    REGISTER_TABLE
        .iter()
        .find(|(sym, _)| *sym == name)
        .map(|(_, addr)| *addr)
}
