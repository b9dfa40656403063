//! Parsing of instruction cells into control primitives.
//!
//! Each RAM cell executed by the driver holds one textual instruction.
//! The grammar after assembly is fully resolved: operands are numeric
//! addresses, `@` immediates or `*` indirections, never symbolic names.

use crate::emulator::errors::EmuError;
use crate::emulator::operand::Operand;
use crate::emulator::ram::Addr;

/// Condition attached to a jump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JumpCond {
    /// `jump` - always taken.
    Always,
    /// `jump_if` - taken iff `REG_BOOL_RES == "1"`.
    IfTrue,
    /// `jump_if_not` - taken iff `REG_BOOL_RES == "0"`.
    IfFalse,
    /// `jump_err` - taken iff `REG_ERROR` is non-empty.
    OnError,
}

/// One decoded control primitive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlOp {
    /// `copy SRC to DST` (also the lowered form of `write V to DST`).
    Copy { src: Operand, dst: Operand },
    /// `jump T` and its conditional variants.
    Jump { target: Operand, cond: JumpCond },
    /// `read ADDR` - diagnostic copy of a cell into `REG_SCRATCH`.
    Read { src: Operand },
    /// `cpu_exec` - hand control to the ALU/IO unit.
    CpuExec,
    /// `label NAME` - consumed at load time; a no-op when executed.
    Label,
    /// `DEBUG_ON` - enable the tracer.
    DebugOn,
    /// `DEBUG_OFF` - disable the tracer.
    DebugOff,
}

impl ControlOp {
    /// Parses the instruction text stored at `addr`.
    ///
    /// Anything that does not match the grammar is emulator-fatal; guest
    /// programs cannot trap a malformed cell.
    pub fn parse(text: &str, addr: Addr) -> Result<ControlOp, EmuError> {
        let malformed = || EmuError::MalformedInstruction {
            addr: addr.0,
            text: text.to_string(),
        };

        let tokens: Vec<&str> = text.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return Err(malformed());
        };

        match command {
            "copy" | "write" => {
                if tokens.len() != 4 || tokens[2] != "to" {
                    return Err(malformed());
                }
                // `write V to A` is sugar for `copy @V to A`.
                let src = if command == "write" {
                    Operand::Immediate(tokens[1].to_string())
                } else {
                    Operand::parse(tokens[1])?
                };
                let dst = Operand::parse(tokens[3])?;
                if matches!(dst, Operand::Immediate(_)) {
                    return Err(EmuError::ImmediateDestination);
                }
                Ok(ControlOp::Copy { src, dst })
            }
            "read" => {
                if tokens.len() != 2 {
                    return Err(malformed());
                }
                Ok(ControlOp::Read {
                    src: Operand::parse(tokens[1])?,
                })
            }
            "jump" | "jump_if" | "jump_if_not" | "jump_err" => {
                if tokens.len() != 2 {
                    return Err(malformed());
                }
                let cond = match command {
                    "jump" => JumpCond::Always,
                    "jump_if" => JumpCond::IfTrue,
                    "jump_if_not" => JumpCond::IfFalse,
                    _ => JumpCond::OnError,
                };
                Ok(ControlOp::Jump {
                    target: Operand::parse(tokens[1])?,
                    cond,
                })
            }
            "cpu_exec" => {
                if tokens.len() != 1 {
                    return Err(malformed());
                }
                Ok(ControlOp::CpuExec)
            }
            "label" => {
                if tokens.len() != 2 {
                    return Err(malformed());
                }
                Ok(ControlOp::Label)
            }
            "DEBUG_ON" => {
                if tokens.len() != 1 {
                    return Err(malformed());
                }
                Ok(ControlOp::DebugOn)
            }
            "DEBUG_OFF" => {
                if tokens.len() != 1 {
                    return Err(malformed());
                }
                Ok(ControlOp::DebugOff)
            }
            _ => Err(malformed()),
        }
    }
}
