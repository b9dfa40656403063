//! The emulator driver.
//!
//! [`Machine`] owns the RAM, the block device and the console, and runs the
//! fetch/parse/execute loop: read the instruction text at `PROGRAM_COUNTER`,
//! execute the control primitive, then increment the counter. Jumps store
//! `target - 1` so the increment lands exactly on the target.
//!
//! The console is injected through the [`Console`] trait so the whole
//! interpreter runs in-process under test.

use crate::emulator::config::Config;
use crate::emulator::disk::BlockDevice;
use crate::emulator::errors::EmuError;
use crate::emulator::instruction::{ControlOp, JumpCond};
use crate::emulator::operand;
use crate::emulator::ram::{Addr, Ram};
use crate::emulator::registers::{PROGRAM_COUNTER, PROGRAM_START, REG_BOOL_RES, REG_ERROR, REG_SCRATCH};
use crate::emulator::terminal::Console;
use std::fs;
use std::path::Path;

/// Outcome of one driver step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep stepping.
    Continue,
    /// `OP_HALT` executed; the emulator stops with exit code 0.
    Halt,
}

/// One emulator instance.
pub struct Machine<C: Console> {
    pub(crate) ram: Ram,
    pub(crate) disks: BlockDevice,
    pub(crate) console: C,
    pub(crate) tracing: bool,
}

impl<C: Console> Machine<C> {
    /// Creates a machine with zeroed RAM.
    pub fn new(config: &Config, console: C) -> Self {
        Self {
            ram: Ram::new(config.ram_size),
            disks: BlockDevice::new(config.hw_dir.clone()),
            console,
            tracing: false,
        }
    }

    /// Enables or disables the instruction tracer.
    pub fn set_tracing(&mut self, enabled: bool) {
        self.tracing = enabled;
    }

    /// The machine's RAM.
    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    /// Mutable access to RAM, for loaders and tests.
    pub fn ram_mut(&mut self) -> &mut Ram {
        &mut self.ram
    }

    /// Loads a program image: file line `N` becomes `RAM[N]`.
    pub fn load_image_file(&mut self, path: &Path) -> Result<(), EmuError> {
        let text = fs::read_to_string(path).map_err(|e| EmuError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.load_cells(text.lines())
    }

    /// Loads an image from an iterator of cell values, starting at address
    /// 1. If the image leaves `PROGRAM_COUNTER` empty, execution starts at
    /// [`PROGRAM_START`].
    pub fn load_cells<'a, I>(&mut self, cells: I) -> Result<(), EmuError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut count = 0usize;
        for (index, cell) in cells.into_iter().enumerate() {
            count = index + 1;
            if count as u32 > self.ram.size() {
                return Err(EmuError::ImageTooLarge {
                    lines: count,
                    size: self.ram.size(),
                });
            }
            self.ram.write(Addr(count as u32), cell)?;
        }

        if self.ram.read(PROGRAM_COUNTER)?.is_empty() {
            self.ram
                .write(PROGRAM_COUNTER, PROGRAM_START.0.to_string())?;
        }
        Ok(())
    }

    /// Current program counter.
    fn pc(&self) -> Result<Addr, EmuError> {
        Addr::parse(self.ram.read(PROGRAM_COUNTER)?)
    }

    /// Runs until `OP_HALT` or a fatal error.
    pub fn run(&mut self) -> Result<(), EmuError> {
        loop {
            if self.step()? == Flow::Halt {
                return Ok(());
            }
        }
    }

    /// Executes one instruction and advances the program counter.
    pub fn step(&mut self) -> Result<Flow, EmuError> {
        let pc = self.pc()?;
        let text = self.ram.read(pc)?.to_string();
        if self.tracing {
            eprintln!("\x1b[33m[DEBUG] Command {pc}: {text}\x1b[0m");
        }

        let op = ControlOp::parse(&text, pc)?;
        if self.exec(op)? == Flow::Halt {
            return Ok(Flow::Halt);
        }

        let pc = self.pc()?;
        self.ram.write(PROGRAM_COUNTER, (pc.0 + 1).to_string())?;
        Ok(Flow::Continue)
    }

    fn exec(&mut self, op: ControlOp) -> Result<Flow, EmuError> {
        match op {
            ControlOp::Copy { src, dst } => {
                let value = operand::source_value(&self.ram, &src)?;
                let addr = operand::dest_address(&self.ram, &dst)?;
                self.ram.write(addr, value)?;
            }
            ControlOp::Read { src } => {
                let value = operand::source_value(&self.ram, &src)?;
                self.ram.write(REG_SCRATCH, value)?;
            }
            ControlOp::Jump { target, cond } => {
                if self.jump_taken(cond)? {
                    let target = operand::jump_target(&self.ram, &target)?;
                    if target.0 == 0 {
                        return Err(EmuError::InvalidAddress {
                            addr: 0,
                            size: self.ram.size(),
                        });
                    }
                    // The post-step increment lands exactly on the target.
                    self.ram
                        .write(PROGRAM_COUNTER, (target.0 - 1).to_string())?;
                }
            }
            ControlOp::CpuExec => return self.cpu_exec(),
            ControlOp::Label => {}
            ControlOp::DebugOn => self.tracing = true,
            ControlOp::DebugOff => self.tracing = false,
        }
        Ok(Flow::Continue)
    }

    fn jump_taken(&self, cond: JumpCond) -> Result<bool, EmuError> {
        Ok(match cond {
            JumpCond::Always => true,
            JumpCond::IfTrue => self.ram.read(REG_BOOL_RES)? == "1",
            JumpCond::IfFalse => self.ram.read(REG_BOOL_RES)? == "0",
            JumpCond::OnError => !self.ram.read(REG_ERROR)?.is_empty(),
        })
    }
}
