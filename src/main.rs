//! The emulator CLI.
//!
//! Loads an assembled RAM image and runs it until `OP_HALT` or a fatal
//! emulator error.
//!
//! # Usage
//! ```text
//! cellbox <image> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `image`: program image (one cell per line, loaded from address 1)
//!
//! # Options
//! - `-j, --debug`: trace each instruction before executing it
//! - `-r, --ram-dump <file>`: dump RAM to `<file>` on exit
//!
//! # Environment
//! - `GLOBAL_RAM_SIZE`: cell count of RAM (default 1024)
//! - `SYSTEM_HW_DIR`: directory holding disk files (default `hw`)
//! - `GLOBAL_RAM_FILE`: default RAM-dump path when `-r` is not given
//!
//! Exit codes: 0 on a normal halt, 1 on a fatal emulator error.

use cellbox::emulator::config::Config;
use cellbox::emulator::machine::Machine;
use cellbox::emulator::terminal::StdConsole;
use cellbox::utils::log::{init, Level};
use cellbox::{error, info};
use std::env;
use std::path::PathBuf;
use std::process;

fn main() {
    init(Level::Info);

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let image_path = PathBuf::from(&args[1]);
    let mut debug = false;
    let mut ram_dump: Option<PathBuf> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--debug" | "-j" => {
                debug = true;
                i += 1;
            }
            k @ ("--ram-dump" | "-r") => {
                i += 1;
                if i >= args.len() {
                    eprintln!("{k} requires an argument");
                    process::exit(1);
                }
                ram_dump = Some(PathBuf::from(&args[i]));
                i += 1;
            }
            other => {
                eprintln!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };
    let ram_dump = ram_dump.or_else(|| config.ram_dump.clone());

    let mut machine = Machine::new(&config, StdConsole);
    machine.set_tracing(debug);

    if let Err(e) = machine.load_image_file(&image_path) {
        error!("{e}");
        process::exit(1);
    }
    info!("loaded {} into {} cells of RAM", image_path.display(), config.ram_size);

    let result = machine.run();

    if let Some(path) = &ram_dump {
        if let Err(e) = machine.ram().dump(path) {
            error!("RAM dump failed: {e}");
        }
    }

    if let Err(e) = result {
        error!("{e}");
        process::exit(1);
    }
}

const USAGE: &str = "\
Cellbox Emulator

USAGE:
    {program} <image> [OPTIONS]

ARGS:
    <image>    Assembled program image (one cell per line)

OPTIONS:
    -j, --debug              Trace each instruction before executing it
    -r, --ram-dump <file>    Dump RAM to <file> on exit
    -h, --help               Print this help message

ENVIRONMENT:
    GLOBAL_RAM_SIZE    Cell count of RAM (default 1024)
    SYSTEM_HW_DIR      Directory holding disk files (default hw)
    GLOBAL_RAM_FILE    Default RAM-dump path when -r is not given

EXAMPLES:
    # Assemble and run a program
    assembler boot.asm -o boot.img
    {program} boot.img

    # Run with instruction tracing and a RAM dump
    {program} boot.img -j -r ram.dump
";

/// Prints usage information to stderr.
fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
