//! Assembly to RAM image compiler CLI.
//!
//! Reads assembly source files and compiles them to an executable image.
//!
//! # Usage
//! ```text
//! assembler <input.asm>... [OPTIONS]
//! ```
//!
//! # Arguments
//! - `input.asm`: assembly source files, concatenated in argument order
//!
//! # Options
//! - `-o, --output <file>`: output image path (defaults to `<input>.img`)
//!
//! # Examples
//! ```text
//! assembler boot.asm
//! assembler lib.asm boot.asm -o boot.img
//! ```

use cellbox::assembler::assemble_files;
use std::env;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let mut inputs: Vec<PathBuf> = Vec::new();
    let mut output_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--output" | "-o") => {
                i += 1;
                if i >= args.len() {
                    eprintln!("{k} requires an argument");
                    process::exit(1);
                }
                output_path = Some(args[i].clone());
                i += 1;
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other => {
                inputs.push(PathBuf::from(other));
                i += 1;
            }
        }
    }

    if inputs.is_empty() {
        eprintln!("No input files\n");
        print_usage(&args[0]);
        process::exit(1);
    }

    for input in &inputs {
        if !input.exists() {
            eprintln!("Input file does not exist: {}", input.display());
            process::exit(1);
        }
    }

    let output_path = output_path.unwrap_or_else(|| {
        let first = &inputs[0];
        let stem = first.file_stem().unwrap_or_default().to_string_lossy();
        let parent = first.parent().unwrap_or(Path::new("."));
        parent
            .join(format!("{}.img", stem))
            .to_string_lossy()
            .into_owned()
    });

    let program = match assemble_files(&inputs) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Assembly failed: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = program.write_to(Path::new(&output_path)) {
        eprintln!("Failed to write output file: {}", e);
        process::exit(1);
    }

    println!(
        "Assembled {} -> {} ({} cells)",
        inputs
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
        output_path,
        program.cells.len()
    );
}

const USAGE: &str = "\
Cellbox Assembler

USAGE:
    {program} <input.asm>... [OPTIONS]

ARGS:
    <input.asm>    Assembly source files, concatenated in argument order

OPTIONS:
    -o, --output <file>    Output image path (defaults to <input>.img)
    -h, --help             Print this help message

EXAMPLES:
    # Assemble to the default output name
    {program} boot.asm

    # Assemble multiple sources with an explicit output
    {program} lib.asm boot.asm -o boot.img
";

fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
