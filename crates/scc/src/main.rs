//! scc - subset-C compiler for x86-64 (NASM) and AArch64
//!
//! Usage: scc [--output OUTFILE] [--target nasm|aarch64] [--dump-ast] [--dump-ast-compacted] INFILE

use clap::error::ErrorKind;
use clap::{Parser as ClapParser, ValueEnum};
use scc::common::DiagnosticReporter;
use scc::{compile, CompileOptions, DumpMode, TargetKind};
use std::fs;
use std::path::PathBuf;
use std::process;

/// Code generation target
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Default)]
enum Target {
    /// NASM-flavored x86-64 assembly
    #[default]
    Nasm,
    /// AArch64 GNU as-style assembly
    Aarch64,
}

impl From<Target> for TargetKind {
    fn from(target: Target) -> Self {
        match target {
            Target::Nasm => TargetKind::Nasm,
            Target::Aarch64 => TargetKind::Aarch64,
        }
    }
}

#[derive(ClapParser, Debug)]
#[command(name = "scc")]
#[command(version)]
#[command(about = "Subset-C compiler producing x86-64 (NASM) or AArch64 assembly", long_about = None)]
struct Args {
    /// Input source file
    #[arg(required = true)]
    input: PathBuf,

    /// Output assembly file
    #[arg(short, long, default_value = "out.s")]
    output: PathBuf,

    /// Code generation target
    #[arg(short = 't', long, value_enum, default_value = "nasm")]
    target: Target,

    /// Dump each function's AST before emitting it
    #[arg(short = 'a', long)]
    dump_ast: bool,

    /// Dump each function's AST in compacted one-line form
    #[arg(short = 'A', long)]
    dump_ast_compacted: bool,
}

const USAGE: &str =
    "usage: scc [--output|-o OUTFILE] [--target|-t nasm|aarch64] [--dump-ast|-a] [--dump-ast-compacted|-A] INFILE";

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err)
            if err.kind() == ErrorKind::DisplayHelp
                || err.kind() == ErrorKind::DisplayVersion =>
        {
            let _ = err.print();
            return;
        }
        Err(_) => {
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    };

    if let Err(code) = run(&args) {
        process::exit(code);
    }
}

fn run(args: &Args) -> Result<(), i32> {
    let source = match fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("scc: cannot read {}: {}", args.input.display(), err);
            return Err(1);
        }
    };

    let mut reporter = DiagnosticReporter::new();
    let file_id = reporter.add_file(args.input.display().to_string(), source.clone());

    let dump_ast = if args.dump_ast_compacted {
        DumpMode::Compact
    } else if args.dump_ast {
        DumpMode::Tree
    } else {
        DumpMode::None
    };

    let options = CompileOptions {
        target: args.target.into(),
        dump_ast,
    };

    let assembly = match compile(&source, &options) {
        Ok(assembly) => assembly,
        Err(err) => {
            reporter.report_error(file_id, &err);
            return Err(1);
        }
    };

    if let Err(err) = fs::write(&args.output, assembly) {
        eprintln!("scc: cannot write {}: {}", args.output.display(), err);
        return Err(1);
    }

    Ok(())
}
