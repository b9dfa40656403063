//! Opcode set for the ALU/IO unit.
//!
//! The [`for_each_opcode!`](crate::for_each_opcode) macro holds the
//! canonical opcode list and invokes a callback macro for code generation,
//! so the enum, the numeric codes and the assembler-facing symbol table all
//! come from one definition.
//!
//! `REG_OP` holds the decimal text of the numeric code; the assembler
//! resolves `OP_*` names to these codes at build time, and [`Opcode::decode`]
//! turns the cell text back into the enum once per `cpu_exec`.

use crate::emulator::errors::EmuError;

/// Invokes a callback macro with the complete opcode definition list.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Arithmetic
            // =========================
            /// OP_ADD ; REG_RES = A + B
            Add = 1, "OP_ADD",
            /// OP_SUB ; REG_RES = A - B
            Sub = 2, "OP_SUB",
            /// OP_INCR ; REG_RES = A + 1
            Incr = 3, "OP_INCR",
            /// OP_DECR ; REG_RES = A - 1
            Decr = 4, "OP_DECR",
            /// OP_MUL ; REG_RES = A * B (two-decimal scale)
            Mul = 5, "OP_MUL",
            /// OP_DIV ; REG_RES = A / B (integer; B = 0 sets REG_ERROR)
            Div = 6, "OP_DIV",
            /// OP_MOD ; REG_RES = A % B (integer; B = 0 sets REG_ERROR)
            Mod = 7, "OP_MOD",
            // =========================
            // Predicates
            // =========================
            /// OP_IS_NUM ; REG_BOOL_RES = A is a signed decimal number
            IsNum = 10, "OP_IS_NUM",
            /// OP_CMP_EQ ; REG_BOOL_RES = (A == B), string equality
            CmpEq = 11, "OP_CMP_EQ",
            /// OP_CMP_NEQ ; REG_BOOL_RES = (A != B), string equality
            CmpNeq = 12, "OP_CMP_NEQ",
            /// OP_CMP_LT ; REG_BOOL_RES = (A < B), integer comparison
            CmpLt = 13, "OP_CMP_LT",
            /// OP_CMP_LE ; REG_BOOL_RES = (A <= B), integer comparison
            CmpLe = 14, "OP_CMP_LE",
            /// OP_CONTAINS ; REG_BOOL_RES = B is a substring of A
            Contains = 15, "OP_CONTAINS",
            /// OP_STARTS_WITH ; REG_BOOL_RES = B is a prefix of A, REG_RES = A with B stripped
            StartsWith = 16, "OP_STARTS_WITH",
            // =========================
            // String operations
            // =========================
            /// OP_GET_LENGTH ; REG_RES = length of A in characters
            GetLength = 20, "OP_GET_LENGTH",
            /// OP_GET_COLUMN ; REG_RES = field B of A split on C (character B when C is empty)
            GetColumn = 21, "OP_GET_COLUMN",
            /// OP_REPLACE_COLUMN ; REG_RES = A with field B replaced by D
            ReplaceColumn = 22, "OP_REPLACE_COLUMN",
            /// OP_CONCAT_WITH ; REG_RES = A, C, B concatenated
            ConcatWith = 23, "OP_CONCAT_WITH",
            // =========================
            // Terminal IO
            // =========================
            /// OP_READ_INPUT ; KEYBOARD_BUFFER = input read in mode A
            ReadInput = 30, "OP_READ_INPUT",
            /// OP_DISPLAY ; render DISPLAY_BUFFER with DISPLAY_COLOR
            Display = 31, "OP_DISPLAY",
            /// OP_DISPLAY_LN ; like OP_DISPLAY, with a trailing newline
            DisplayLn = 32, "OP_DISPLAY_LN",
            /// OP_SET_BACKGROUND_COLOR ; apply DISPLAY_BACKGROUND, clear screen
            SetBackgroundColor = 33, "OP_SET_BACKGROUND_COLOR",
            /// OP_RENDER_BITMAP ; draw cells [A, B) as colored bitmap rows
            RenderBitmap = 34, "OP_RENDER_BITMAP",
            // =========================
            // Disk IO
            // =========================
            /// OP_READ_BLOCK ; REG_RES = block B of disk A
            ReadBlock = 40, "OP_READ_BLOCK",
            /// OP_WRITE_BLOCK ; write C to block B of disk A
            WriteBlock = 41, "OP_WRITE_BLOCK",
            // =========================
            // Placeholders
            // =========================
            /// OP_ENCRYPT_DATA ; identity placeholder, REG_RES = A
            EncryptData = 50, "OP_ENCRYPT_DATA",
            /// OP_DECRYPT_DATA ; identity placeholder, REG_RES = A
            DecryptData = 51, "OP_DECRYPT_DATA",
            // =========================
            // Control
            // =========================
            /// OP_NOP ; sleep A seconds (may be fractional)
            Nop = 60, "OP_NOP",
            /// OP_HALT ; terminate the emulator with exit code 0
            Halt = 61, "OP_HALT",
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $code:expr, $symbol:literal,
        )*
    ) => {
        /// The closed opcode enumeration, decoded once per `cpu_exec`.
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $code,
            )*
        }

        impl Opcode {
            /// Returns the symbolic `OP_*` name for this opcode.
            pub const fn symbol(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $symbol, )*
                }
            }

            /// Returns the numeric code stored in `REG_OP`.
            pub const fn code(&self) -> u8 {
                *self as u8
            }

            /// Resolves a symbolic `OP_*` name, for the assembler.
            pub fn from_symbol(name: &str) -> Option<Opcode> {
                match name {
                    $( $symbol => Some(Opcode::$name), )*
                    _ => None,
                }
            }

            /// Decodes the text of the `REG_OP` cell.
            ///
            /// Anything that is not the decimal code of a known opcode is an
            /// unknown opcode, which the driver treats as emulator-fatal.
            pub fn decode(cell: &str) -> Result<Opcode, EmuError> {
                let unknown = || EmuError::UnknownOpcode {
                    code: cell.to_string(),
                };
                let code: u8 = cell.trim().parse().map_err(|_| unknown())?;
                $(
                    if code == $code {
                        return Ok(Opcode::$name);
                    }
                )*
                Err(unknown())
            }
        }
    };
}

for_each_opcode!(define_opcodes);
