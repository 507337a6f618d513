//! DCPU-16 Emulator - CLI Entry Point
//!
//! Commands:
//! - `dcpu16-emu run <program>` - Run a binary image or assembly file
//! - `dcpu16-emu asm <source>` - Assemble to a binary image
//! - `dcpu16-emu disasm <image>` - Disassemble a binary image
//! - `dcpu16-emu test` - Built-in self-test

use clap::{ArgAction, Parser, Subcommand};
use dcpu::{Cpu, CpuState, Registers, Word};
use serde::Serialize;
use std::io;
use std::path::Path;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

const NOTCH_SAMPLE: &str = include_str!("../programs/notch_sample.asm");

#[derive(Parser)]
#[command(name = "dcpu16-emu")]
#[command(version)]
#[command(about = "An emulator and assembler for the DCPU-16")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to a binary image, or an .asm/.dasm/.dasm16 source file
        program: String,
        /// Maximum number of instructions to run
        #[arg(short, long, default_value = "100000")]
        max_cycles: u64,
        /// Print every executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Assemble source to a binary image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image (defaults to the source name with a .bin extension)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a binary image to readable text
    Disasm {
        /// Path to the binary image
        image: String,
    },
    /// Run the built-in self-test
    Test,
}

#[derive(Serialize)]
struct Report<'a> {
    state: CpuState,
    cycles: u64,
    skip_pending: bool,
    registers: &'a Registers,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Run { program, max_cycles, trace, json }) => {
            run_program(&program, max_cycles, trace, json);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image }) => {
            disassemble_file(&image);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("DCPU-16 Emulator v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let stderr_format = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    tracing_subscriber::registry().with(stderr_format).with(level).init();
}

fn fail(message: String) -> ! {
    eprintln!("error: {}", message);
    std::process::exit(1);
}

fn is_source(path: &str) -> bool {
    matches!(
        Path::new(path).extension().and_then(|e| e.to_str()),
        Some("asm" | "dasm" | "dasm16")
    )
}

/// Load a program, assembling it first when given a source file.
fn load_words(path: &str) -> Vec<Word> {
    if is_source(path) {
        let source = std::fs::read_to_string(path)
            .unwrap_or_else(|e| fail(format!("failed to read {}: {}", path, e)));
        let words = dcpu::assemble(&source).unwrap_or_else(|e| fail(format!("assembly error: {}", e)));
        tracing::info!(words = words.len(), "assembled {}", path);
        words
    } else {
        let words = dcpu::load_program_file(path)
            .unwrap_or_else(|e| fail(format!("failed to load {}: {}", path, e)));
        tracing::info!(words = words.len(), "loaded {}", path);
        words
    }
}

fn run_program(path: &str, max_cycles: u64, trace: bool, json: bool) {
    let program = load_words(path);

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&program) {
        fail(format!("failed to load program: {}", e));
    }

    while cpu.cycles < max_cycles {
        let pc = cpu.pc();
        let skipping = cpu.skip_pending();
        match cpu.step() {
            Ok(Some(instr)) => {
                if trace {
                    let mark = if skipping { "skip" } else { "    " };
                    println!("{:04x}: {} {:<24} O={:04x} SP={:04x}", pc, mark, instr.to_string(), cpu.overflow(), cpu.sp());
                }
            }
            Ok(None) => break,
            Err(e) => fail(format!("cpu error at PC={:04x}: {}", pc, e)),
        }
    }

    if json {
        let report = Report {
            state: cpu.state,
            cycles: cpu.cycles,
            skip_pending: cpu.skip_pending(),
            registers: &cpu.regs,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(format!("failed to serialize state: {}", e)),
        }
        return;
    }

    println!("Cycles: {}", cpu.cycles);
    println!("State:  {:?}", cpu.state);
    for (register, value) in cpu.regs.snapshot() {
        println!("{:>2}: 0x{:04x}", register, value);
    }

    if cpu.is_running() {
        println!();
        println!("Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
    }
}

fn assemble_file(source_path: &str, output: Option<String>) {
    let out_path = output.unwrap_or_else(|| {
        Path::new(source_path).with_extension("bin").to_string_lossy().into_owned()
    });

    let source = std::fs::read_to_string(source_path)
        .unwrap_or_else(|e| fail(format!("failed to read {}: {}", source_path, e)));
    let words = dcpu::assemble(&source).unwrap_or_else(|e| fail(format!("assembly error: {}", e)));

    if let Err(e) = dcpu::save_program_file(&out_path, &words) {
        fail(format!("failed to save {}: {}", out_path, e));
    }

    println!("Assembled {} words: {} -> {}", words.len(), source_path, out_path);
}

fn disassemble_file(path: &str) {
    let words = dcpu::load_program_file(path).unwrap_or_else(|e| fail(format!("failed to load {}: {}", path, e)));
    println!("{}", dcpu::disassemble(&words));
}

fn run_self_test() {
    println!("━━━ DCPU-16 Emulator Self-Test ━━━");
    println!();

    let checks: [(&str, fn() -> Result<bool, String>); 5] = [
        ("SET I, 10 assembles to a861", || {
            Ok(dcpu::assemble("SET I, 10").map_err(|e| e.to_string())? == vec![0xA861])
        }),
        ("ADD sets overflow", || {
            let cpu = run_source("SET A, 0x4\nADD A, 0xFFFF")?;
            Ok(cpu.overflow() == 0x0001)
        }),
        ("SUB sets underflow", || {
            let cpu = run_source("SET A, 0x4\nSUB A, 0xFFFF")?;
            Ok(cpu.overflow() == 0xFFFF)
        }),
        ("stack round-trip", || {
            let cpu = run_source("SET PUSH, 0x10\nSET I, POP")?;
            Ok(cpu.sp() == 0 && cpu.read_register(6) == 0x10)
        }),
        ("Notch sample leaves X = 0x40", || {
            let cpu = run_source(NOTCH_SAMPLE)?;
            Ok(cpu.read_register(3) == 0x40)
        }),
    ];

    let mut passed = 0;
    let mut failed = 0;
    for (name, check) in checks {
        match check() {
            Ok(true) => {
                println!("{}... ✓", name);
                passed += 1;
            }
            Ok(false) => {
                println!("{}... ✗", name);
                failed += 1;
            }
            Err(e) => {
                println!("{}... ✗ ({})", name, e);
                failed += 1;
            }
        }
    }

    println!();
    println!("Results: {} passed, {} failed", passed, failed);

    if failed != 0 {
        std::process::exit(1);
    }
}

fn run_source(source: &str) -> Result<Cpu, String> {
    let program = dcpu::assemble(source).map_err(|e| e.to_string())?;
    let mut cpu = Cpu::new();
    cpu.load_program(&program).map_err(|e| e.to_string())?;
    cpu.run_limited(10_000).map_err(|e| e.to_string())?;
    Ok(cpu)
}
