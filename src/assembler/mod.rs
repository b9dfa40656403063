//! Assembly source to RAM image compiler.
//!
//! Converts human-readable guest assembly into an executable RAM image:
//! one cell per line, loaded so that file line N becomes `RAM[N]`.
//!
//! # Syntax
//!
//! ```text
//! // comments run to the end of the line
//! label main              // defines `main` at the next instruction cell
//! var counter             // declares a one-cell variable
//! write "hi there" to DISPLAY_BUFFER
//! write OP_DISPLAY_LN to REG_OP
//! copy var:counter to REG_A
//! copy @0 to var:counter
//! jump_if label:main
//! cpu_exec
//! ```
//!
//! - Operands are `@v` (immediate), `N` (direct) and `*N` (indirect);
//!   `@` and `*` compose with register names and `var:` references.
//! - Registers (`REG_A`, `DISPLAY_BUFFER`, ...), opcodes (`OP_*`), colors
//!   (`COLOR_*`) and keyboard modes (`KEYBOARD_*`) resolve through the
//!   symbol table.
//! - `write` with a quoted string interns the text into a constant cell
//!   placed after the instructions and lowers to a `copy` from it; any
//!   other `write` lowers to `copy @<resolved> to <addr>`.
//! - Two passes: the first collects labels, variables and constants, the
//!   second resolves and emits cells.
//!
//! The emitted image starts with a 16-line register prelude in which only
//! the `PROGRAM_COUNTER` cell is set, carrying the entry address.

use crate::emulator::errors::AsmError;
use crate::emulator::isa::Opcode;
use crate::emulator::registers::{self, PROGRAM_COUNTER, PROGRAM_START, RESERVED_CELLS};
use crate::emulator::terminal;
use std::collections::HashMap;
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const COMMENT_MARKER: &[u8; 2] = b"//";

/// One assembly input, named for diagnostics.
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

/// An assembled RAM image: `cells[0]` loads into `RAM[1]`.
#[derive(Debug)]
pub struct Program {
    pub cells: Vec<String>,
}

impl Program {
    /// Renders the image as text, one cell per line, trailing newline
    /// included.
    pub fn to_image(&self) -> String {
        let mut out = String::new();
        for cell in &self.cells {
            out.push_str(cell);
            out.push('\n');
        }
        out
    }

    /// Writes the image to `path`.
    pub fn write_to(&self, path: &Path) -> Result<(), AsmError> {
        fs::write(path, self.to_image()).map_err(|e| AsmError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
struct Token<'a> {
    text: &'a str,
    /// 1-based column offset in the line.
    column: usize,
}

/// One non-blank source line.
struct Line<'a> {
    file: usize,
    no: usize,
    tokens: Vec<Token<'a>>,
}

/// Tokenize a single line of assembly.
///
/// Rules:
/// - `//` starts a comment
/// - double quotes group a token and may contain whitespace
/// - tokens are otherwise whitespace-separated
fn tokenize<'a>(file: &str, line_no: usize, line: &'a str) -> Result<Vec<Token<'a>>, AsmError> {
    let mut out = Vec::new();

    let mut start: Option<usize> = None;
    let mut start_col: usize = 0;
    let mut in_str = false;

    let bytes = line.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if !in_str && bytes[i..].starts_with(COMMENT_MARKER) {
            break;
        }

        match bytes[i] {
            b'"' => {
                if start.is_none() {
                    start = Some(i);
                    start_col = i + 1;
                }
                in_str = !in_str;
                i += 1;
            }

            b' ' | b'\t' if !in_str => {
                if let Some(s) = start {
                    out.push(Token {
                        text: &line[s..i],
                        column: start_col,
                    });
                    start = None;
                }
                i += 1;
            }

            _ => {
                if start.is_none() {
                    start = Some(i);
                    start_col = i + 1;
                }
                i += 1;
            }
        }
    }

    if in_str {
        return Err(located(
            file,
            line_no,
            start_col,
            AsmError::UnterminatedString,
        ));
    }

    if let Some(s) = start {
        out.push(Token {
            text: &line[s..i],
            column: start_col,
        });
    }

    Ok(out)
}

/// Wraps a failure with its source location.
fn located(file: &str, line: usize, column: usize, err: AsmError) -> AsmError {
    AsmError::AtLine {
        file: file.to_string(),
        line,
        column,
        reason: err.to_string(),
    }
}

/// True for `[A-Za-z][A-Za-z0-9_]*`.
fn valid_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Resolves a register, opcode, color or keyboard symbol to its numeric
/// cell value.
fn symbol_value(name: &str) -> Option<String> {
    if let Some(addr) = registers::symbol(name) {
        return Some(addr.0.to_string());
    }
    if let Some(op) = Opcode::from_symbol(name) {
        return Some(op.code().to_string());
    }
    if let Some(color) = terminal::color_symbol(name) {
        return Some(color.to_string());
    }
    terminal::keyboard_symbol(name).map(|mode| mode.to_string())
}

#[derive(Clone, Copy)]
struct VarInfo {
    slot: usize,
    declared_at: usize,
}

/// Symbol state accumulated across the two passes.
#[derive(Default)]
struct AsmContext {
    /// Interned string constants, deduplicated, in first-use order.
    constants: Vec<String>,
    /// Label name to absolute cell address.
    labels: HashMap<String, u32>,
    /// Variable name to slot and declaration order.
    vars: HashMap<String, VarInfo>,
    var_count: usize,
    /// First cell after the instructions; constants live here.
    const_base: u32,
    /// First cell after the constants; variables live here.
    var_base: u32,
}

impl AsmContext {
    /// Adds a string to the constant pool, returning its slot.
    fn intern_constant(&mut self, value: &str) -> usize {
        if let Some(slot) = self.constants.iter().position(|c| c == value) {
            return slot;
        }
        self.constants.push(value.to_string());
        self.constants.len() - 1
    }

    fn define_label(&mut self, name: &str, addr: u32) -> Result<(), AsmError> {
        if self.labels.contains_key(name) {
            return Err(AsmError::DuplicateLabel {
                name: name.to_string(),
            });
        }
        self.labels.insert(name.to_string(), addr);
        Ok(())
    }

    fn resolve_label(&self, name: &str) -> Result<u32, AsmError> {
        self.labels
            .get(name)
            .copied()
            .ok_or_else(|| AsmError::UndefinedLabel {
                name: name.to_string(),
            })
    }

    fn declare_var(&mut self, name: &str, seq: usize) {
        // Re-declaration keeps the first slot.
        if !self.vars.contains_key(name) {
            self.vars.insert(
                name.to_string(),
                VarInfo {
                    slot: self.var_count,
                    declared_at: seq,
                },
            );
            self.var_count += 1;
        }
    }

    /// Resolves `var:NAME` to its cell address; the declaration must
    /// appear on an earlier line than the use.
    fn resolve_var(&self, name: &str, use_seq: usize) -> Result<u32, AsmError> {
        let info = self
            .vars
            .get(name)
            .filter(|info| info.declared_at < use_seq)
            .ok_or_else(|| AsmError::UndefinedVariable {
                name: name.to_string(),
            })?;
        Ok(self.var_base + info.slot as u32)
    }

    fn constant_addr(&self, slot: usize) -> u32 {
        self.const_base + slot as u32
    }
}

/// Resolves the value operand of `write` (everything except quoted
/// strings, which the caller interns).
fn resolve_value(ctx: &AsmContext, token: &str) -> Result<String, AsmError> {
    if let Some(name) = token.strip_prefix("label:") {
        return Ok(ctx.resolve_label(name)?.to_string());
    }
    if let Some(value) = symbol_value(token) {
        return Ok(value);
    }
    if crate::emulator::numeric::is_number(token) {
        return Ok(token.to_string());
    }
    Err(AsmError::UnknownSymbol {
        name: token.to_string(),
    })
}

/// Resolves a place operand (`copy` source or destination, `read`
/// argument): an optional `@`/`*` prefix over a number, register or
/// `var:` reference.
fn resolve_place(
    ctx: &AsmContext,
    token: &str,
    use_seq: usize,
    immediate_ok: bool,
) -> Result<String, AsmError> {
    if let Some(base) = token.strip_prefix('@') {
        if !immediate_ok {
            return Err(AsmError::ImmediateDestination);
        }
        // Immediates take the wider value symbol set: `@OP_ADD` is the
        // opcode number itself, `@var:x` the variable's address.
        if let Some(name) = base.strip_prefix("var:") {
            return Ok(format!("@{}", ctx.resolve_var(name, use_seq)?));
        }
        return Ok(format!("@{}", resolve_value(ctx, base)?));
    }

    let (prefix, base) = match token.strip_prefix('*') {
        Some(rest) => ("*", rest),
        None => ("", token),
    };

    if let Some(name) = base.strip_prefix("var:") {
        return Ok(format!("{prefix}{}", ctx.resolve_var(name, use_seq)?));
    }
    if let Some(addr) = registers::symbol(base) {
        return Ok(format!("{prefix}{}", addr.0));
    }
    if base.parse::<u32>().is_ok() {
        return Ok(format!("{prefix}{base}"));
    }
    if symbol_value(base).is_some() {
        // A known symbol that is not an address (e.g. an opcode name).
        return Err(AsmError::InvalidOperand {
            token: token.to_string(),
        });
    }
    Err(AsmError::UnknownSymbol {
        name: base.to_string(),
    })
}

/// Resolves a jump target: a number, `label:NAME`, or an indirect place.
fn resolve_jump_target(ctx: &AsmContext, token: &str, use_seq: usize) -> Result<String, AsmError> {
    if let Some(name) = token.strip_prefix("label:") {
        return Ok(ctx.resolve_label(name)?.to_string());
    }
    if token.starts_with('@') {
        return Err(AsmError::InvalidOperand {
            token: token.to_string(),
        });
    }
    resolve_place(ctx, token, use_seq, false)
}

fn expect_arity(file: &str, line: &Line, expected: usize) -> Result<(), AsmError> {
    if line.tokens.len() != expected {
        return Err(located(
            file,
            line.no,
            line.tokens[0].column,
            AsmError::ArityMismatch {
                command: line.tokens[0].text.to_string(),
                expected: expected - 1,
                actual: line.tokens.len() - 1,
            },
        ));
    }
    Ok(())
}

/// Unwraps a quoted token to its contents, if it is one.
fn quoted(token: &str) -> Option<&str> {
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        Some(&token[1..token.len() - 1])
    } else {
        None
    }
}

/// Assembles a single in-memory source.
pub fn assemble_source(source: impl Into<String>) -> Result<Program, AsmError> {
    assemble(&[SourceFile {
        name: "<source>".to_string(),
        text: source.into(),
    }])
}

/// Assembles one or more source files, concatenated in argument order.
pub fn assemble_files(paths: &[PathBuf]) -> Result<Program, AsmError> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(path).map_err(|e| AsmError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        sources.push(SourceFile {
            name: path.display().to_string(),
            text,
        });
    }
    assemble(&sources)
}

/// Runs both passes over the given sources.
///
/// On failure a compiler-style diagnostic in the
/// `error: ... --> file:line:column` shape is printed to stderr and the
/// error is returned.
pub fn assemble(sources: &[SourceFile]) -> Result<Program, AsmError> {
    let result = assemble_inner(sources);
    if let Err(err) = &result {
        log_assembly_error(sources, err);
    }
    result
}

fn assemble_inner(sources: &[SourceFile]) -> Result<Program, AsmError> {
    // Tokenize every line up front.
    let mut lines: Vec<Line> = Vec::new();
    for (file, source) in sources.iter().enumerate() {
        for (idx, raw) in source.text.lines().enumerate() {
            let tokens = tokenize(&source.name, idx + 1, raw)?;
            if tokens.is_empty() {
                continue;
            }
            lines.push(Line {
                file,
                no: idx + 1,
                tokens,
            });
        }
    }

    let mut ctx = AsmContext::default();

    // First pass: command validation, label addresses, variable
    // declarations and constant interning.
    let mut instr_count: u32 = 0;
    for (seq, line) in lines.iter().enumerate() {
        let file = &sources[line.file].name;
        let head = &line.tokens[0];
        match head.text {
            "label" => {
                expect_arity(file, line, 2)?;
                let name = line.tokens[1].text;
                if !valid_name(name) {
                    return Err(located(
                        file,
                        line.no,
                        line.tokens[1].column,
                        AsmError::InvalidName {
                            name: name.to_string(),
                        },
                    ));
                }
                ctx.define_label(name, PROGRAM_START.0 + instr_count)
                    .map_err(|e| located(file, line.no, line.tokens[1].column, e))?;
            }
            "var" => {
                expect_arity(file, line, 2)?;
                let name = line.tokens[1].text;
                if !valid_name(name) {
                    return Err(located(
                        file,
                        line.no,
                        line.tokens[1].column,
                        AsmError::InvalidName {
                            name: name.to_string(),
                        },
                    ));
                }
                ctx.declare_var(name, seq);
            }
            "write" => {
                if let Some(token) = line.tokens.get(1) {
                    if let Some(text) = quoted(token.text) {
                        ctx.intern_constant(text);
                    }
                }
                instr_count += 1;
            }
            "copy" | "read" | "jump" | "jump_if" | "jump_if_not" | "jump_err" | "cpu_exec"
            | "DEBUG_ON" | "DEBUG_OFF" => {
                instr_count += 1;
            }
            other => {
                return Err(located(
                    file,
                    line.no,
                    head.column,
                    AsmError::UnknownCommand {
                        name: other.to_string(),
                    },
                ));
            }
        }
    }

    ctx.const_base = PROGRAM_START.0 + instr_count;
    ctx.var_base = ctx.const_base + ctx.constants.len() as u32;

    // Second pass: resolve operands and emit instruction cells.
    let mut body: Vec<String> = Vec::with_capacity(instr_count as usize);
    for (seq, line) in lines.iter().enumerate() {
        let file = &sources[line.file].name;
        let command = line.tokens[0].text;
        match command {
            "label" | "var" => {}
            "write" | "copy" => {
                expect_arity(file, line, 4)?;
                if line.tokens[2].text != "to" {
                    return Err(located(
                        file,
                        line.no,
                        line.tokens[2].column,
                        AsmError::InvalidOperand {
                            token: line.tokens[2].text.to_string(),
                        },
                    ));
                }

                let value_token = &line.tokens[1];
                let src = if command == "write" {
                    match quoted(value_token.text) {
                        Some(text) => {
                            let slot = ctx.intern_constant(text);
                            ctx.constant_addr(slot).to_string()
                        }
                        None => format!("@{}", resolve_value(&ctx, value_token.text).map_err(
                            |e| located(file, line.no, value_token.column, e),
                        )?),
                    }
                } else {
                    resolve_place(&ctx, value_token.text, seq, true)
                        .map_err(|e| located(file, line.no, value_token.column, e))?
                };

                let dst_token = &line.tokens[3];
                let dst = resolve_place(&ctx, dst_token.text, seq, false)
                    .map_err(|e| located(file, line.no, dst_token.column, e))?;

                body.push(format!("copy {src} to {dst}"));
            }
            "read" => {
                expect_arity(file, line, 2)?;
                let token = &line.tokens[1];
                let place = resolve_place(&ctx, token.text, seq, false)
                    .map_err(|e| located(file, line.no, token.column, e))?;
                body.push(format!("read {place}"));
            }
            "jump" | "jump_if" | "jump_if_not" | "jump_err" => {
                expect_arity(file, line, 2)?;
                let token = &line.tokens[1];
                let target = resolve_jump_target(&ctx, token.text, seq)
                    .map_err(|e| located(file, line.no, token.column, e))?;
                body.push(format!("{command} {target}"));
            }
            "cpu_exec" | "DEBUG_ON" | "DEBUG_OFF" => {
                expect_arity(file, line, 1)?;
                body.push(command.to_string());
            }
            _ => unreachable!("commands are validated in the first pass"),
        }
    }

    // Image: register prelude, instructions, constants, variable cells.
    let mut cells = vec![String::new(); RESERVED_CELLS as usize];
    cells[(PROGRAM_COUNTER.0 - 1) as usize] = PROGRAM_START.0.to_string();
    cells.extend(body);
    cells.extend(ctx.constants.iter().cloned());
    cells.extend(std::iter::repeat(String::new()).take(ctx.var_count));

    let ram_size = env::var("GLOBAL_RAM_SIZE")
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .unwrap_or(crate::emulator::config::DEFAULT_RAM_SIZE as usize);
    if cells.len() > ram_size {
        crate::warn!(
            "program needs {} cells but RAM holds {}",
            cells.len(),
            ram_size
        );
    }

    Ok(Program { cells })
}

/// Formats a compiler-style diagnostic for an assembly failure.
fn render_diagnostic(sources: &[SourceFile], err: &AsmError) -> String {
    let AsmError::AtLine {
        file,
        line,
        column,
        reason,
    } = err
    else {
        return format!("error: {err}\n");
    };

    let mut diag = String::new();
    let _ = writeln!(diag, "error: {reason}");
    let _ = writeln!(diag, " --> {file}:{line}:{column}");

    let text = sources
        .iter()
        .find(|s| s.name == *file)
        .and_then(|s| s.text.lines().nth(line.saturating_sub(1)));
    if let Some(text) = text {
        let underline = " ".repeat(column.saturating_sub(1));
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, text.trim_end_matches('\r'));
        let _ = writeln!(diag, "  | {underline}^");
    }

    diag
}

/// Emits the diagnostic to stderr.
fn log_assembly_error(sources: &[SourceFile], err: &AsmError) {
    eprint!("{}", render_diagnostic(sources, err));
}
