// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// main.rs
//
// This file contains the main entry point for the Tomasulo/ROB simulator.
// It provides a command-line interface for running the engine to completion
// or stepping it one cycle at a time.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use rob_tomasulo_sim::engine::EngineConfig;
use rob_tomasulo_sim::utils::logger::{LogLevel, Logger};
use rob_tomasulo_sim::{Engine, Program, Seed};

#[derive(Parser)]
#[command(name = "tomasulo-cli")]
#[command(about = "A cycle-accurate Tomasulo/ROB pipeline simulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct EngineArgs {
    /// Instruction trace file (see README for the text format)
    #[arg(short, long)]
    trace: PathBuf,

    /// Optional seed file of `reg NAME VALUE` / `mem ADDRESS VALUE` lines;
    /// defaults to the built-in seed contract
    #[arg(short, long)]
    seed: Option<PathBuf>,

    /// Number of MEM-class reservation stations
    #[arg(long, default_value_t = 2)]
    mem_rs: usize,

    /// Number of ADD-class reservation stations
    #[arg(long, default_value_t = 3)]
    add_rs: usize,

    /// Number of BRANCH-class reservation stations (also covers OR/AND/shifts)
    #[arg(long, default_value_t = 2)]
    logic_rs: usize,

    /// Number of MUL-class reservation stations
    #[arg(long, default_value_t = 1)]
    mult_rs: usize,

    /// Reorder buffer capacity
    #[arg(long, default_value_t = 8)]
    rob_size: usize,

    /// Log level (error, warn, info, debug)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional transcript log file; defaults to tomasulo.log
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl EngineArgs {
    fn config(&self) -> EngineConfig {
        EngineConfig {
            num_mem_rs: self.mem_rs,
            num_add_rs: self.add_rs,
            num_logic_rs: self.logic_rs,
            num_mult_rs: self.mult_rs,
            rob_size: self.rob_size,
        }
    }

    fn parsed_log_level(&self) -> LogLevel {
        match self.log_level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warning,
            "debug" => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine to completion (or until --max-cycles) and print the
    /// final register file, touched memory, and metrics
    Run {
        #[command(flatten)]
        engine: EngineArgs,

        /// Stop after this many cycles even if the program has not finished
        #[arg(long, default_value_t = 100_000)]
        max_cycles: usize,

        /// Print metrics as JSON instead of the default text table
        #[arg(long)]
        json: bool,
    },
    /// Step the engine interactively: n=tick, b=step back, d=dump state, q=quit
    Step {
        #[command(flatten)]
        engine: EngineArgs,
    },
}

fn load_engine(args: &EngineArgs, logger: &mut Logger) -> Result<Engine, i32> {
    let text = match std::fs::read_to_string(&args.trace) {
        Ok(t) => t,
        Err(e) => {
            logger.error(&format!("failed to read trace {}: {}", args.trace.display(), e));
            eprintln!("Failed to read trace {}: {}", args.trace.display(), e);
            return Err(1);
        },
    };
    let program = Program::parse(&text);
    if program.skipped_lines > 0 {
        logger.warning(&format!("skipped {} unrecognized trace line(s)", program.skipped_lines));
    }

    let seed = match &args.seed {
        Some(path) => match Seed::load(path) {
            Ok(s) => s,
            Err(e) => {
                logger.error(&format!("failed to load seed {}: {}", path.display(), e));
                eprintln!("Failed to load seed {}: {}", path.display(), e);
                return Err(1);
            },
        },
        None => Seed::default_contract(),
    };

    Engine::new(args.config(), program, seed).map_err(|e| {
        logger.error(&format!("invalid configuration: {}", e));
        eprintln!("Invalid configuration: {}", e);
        1
    })
}

fn run_to_completion(engine: &mut Engine, max_cycles: usize) {
    while !engine.is_finished() && engine.metrics().total_cycles < max_cycles {
        engine.tick();
    }
}

fn print_final_state(engine: &Engine, json: bool) {
    let metrics = engine.metrics();
    if json {
        match serde_json::to_string_pretty(&metrics) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("failed to serialize metrics: {}", e),
        }
        return;
    }

    println!("{}", "=== Registers ===".bold());
    let mut names: Vec<&String> = engine.state().regfile.names().collect();
    names.sort();
    for name in names {
        let reg = engine.state().regfile.get(name);
        println!("{:<6} = {}", name, reg.value);
    }

    println!("\n{}", "=== Touched Memory ===".bold());
    let mut cells: Vec<(&i64, &i64)> = engine.state().memory.touched().collect();
    cells.sort_by_key(|(addr, _)| **addr);
    for (addr, value) in cells {
        println!("mem[{:<4}] = {}", addr, value);
    }

    println!("\n{}", "=== Metrics ===".bold());
    println!("total_cycles          = {}", metrics.total_cycles);
    println!("committed_instructions= {}", metrics.committed_instructions);
    println!("ipc                   = {:.3}", metrics.ipc);
    println!("bubble_cycles         = {}", metrics.bubble_cycles);
    println!("program_counter       = {}", metrics.program_counter);
}

fn dump_state(engine: &Engine) {
    let state = engine.state();
    println!("{}", format!("-- cycle {} --", state.cycle).cyan());

    println!("{}", "ROB:".bold());
    for entry in &state.rob.entries {
        if entry.busy {
            let marker = if entry.index == state.rob.head { "HEAD" } else { "    " };
            let opcode = entry.instruction.as_ref().map(|i| i.opcode.mnemonic()).unwrap_or("?");
            println!(
                "  [{}] {} {:<5} state={:?} dest={:?} value={:?}",
                entry.index, marker, opcode, entry.state, entry.dest_register, entry.value
            );
        }
    }

    println!("{}", "Reservation stations:".bold());
    for class in rob_tomasulo_sim::decode::RsClass::ALL {
        let pool = state.rs.pool(class);
        for (i, rs) in pool.stations.iter().enumerate() {
            if rs.busy {
                println!(
                    "  {:?}[{}] op={:?} op1={:?} op2={:?} dest_rob={:?}",
                    class, i, rs.opcode, rs.op1, rs.op2, rs.dest_rob
                );
            }
        }
    }

    let finished = if engine.is_finished() { "yes".green() } else { "no".yellow() };
    println!("finished: {}", finished);
}

fn interactive_step(engine: &mut Engine) {
    let stdin = io::stdin();
    println!("commands: n=tick  b=step back  d=dump  q=quit");
    dump_state(engine);
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        match line.trim() {
            "n" => {
                engine.tick();
                dump_state(engine);
            },
            "b" => {
                if !engine.step_back() {
                    println!("no history to step back through");
                } else {
                    dump_state(engine);
                }
            },
            "d" => dump_state(engine),
            "q" => break,
            other if other.is_empty() => continue,
            other => println!("unrecognized command: {}", other),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { engine: engine_args, max_cycles, json } => {
            let log_file = engine_args
                .output
                .as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .or_else(|| Some("tomasulo.log".to_string()));
            let mut logger = Logger::new(log_file.as_deref(), engine_args.parsed_log_level());
            logger.info("starting tomasulo-cli run");

            match load_engine(&engine_args, &mut logger) {
                Ok(mut engine) => {
                    run_to_completion(&mut engine, max_cycles);
                    print_final_state(&engine, json);
                    ExitCode::SUCCESS
                },
                Err(code) => ExitCode::from(code as u8),
            }
        },
        Commands::Step { engine: engine_args } => {
            let log_file = engine_args
                .output
                .as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .or_else(|| Some("tomasulo.log".to_string()));
            let mut logger = Logger::new(log_file.as_deref(), engine_args.parsed_log_level());
            logger.info("starting tomasulo-cli step session");

            match load_engine(&engine_args, &mut logger) {
                Ok(mut engine) => {
                    interactive_step(&mut engine);
                    ExitCode::SUCCESS
                },
                Err(code) => ExitCode::from(code as u8),
            }
        },
    }
}
