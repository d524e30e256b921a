//! The fibreg CLI tool

mod util;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::{CommandFactory, Parser, Subcommand};
use env_logger::fmt::Color;
use env_logger::{Builder, Target};
use itertools::Itertools;
use log::{Level, LevelFilter};
use strum::{Display, EnumString, EnumVariantNames};

use fibreg_core::{
    FibonacciState, SmokeTest, Word, DELAY_COUNT, FIB_REGISTERS, MAX_DELAY_COUNT,
};
use fibreg_riscv_executor::{disassemble, execute, verify, ExecutionOptions, Program};

/// How register values are rendered in the log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, EnumVariantNames, Display)]
pub enum RenderMode {
    #[strum(serialize = "i")]
    Signed,
    #[strum(serialize = "ui")]
    Unsigned,
    #[strum(serialize = "hex")]
    Hex,
}

impl RenderMode {
    fn word(self, value: Word) -> String {
        match self {
            RenderMode::Signed => value.to_string(),
            RenderMode::Unsigned => (value as u32).to_string(),
            RenderMode::Hex => format!("{:#010x}", value as u32),
        }
    }

    fn state(self, state: FibonacciState) -> String {
        format!(
            "current={} previous={}",
            self.word(state.current),
            self.word(state.previous)
        )
    }
}

#[derive(Parser)]
#[command(name = "fibreg", author, version, about, long_about = None)]
struct Cli {
    #[arg(long, hide = true)]
    markdown_help: bool,

    /// Set log filter value [ off, error, warn, info, debug, trace ]
    #[arg(long)]
    #[arg(default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the host model on the process-wide pinned registers.
    Model {
        /// Number of delay/compute iterations to run.
        #[arg(short, long)]
        #[arg(default_value_t = 10)]
        iterations: u64,

        /// Busy-wait iterations between two steps.
        #[arg(short, long)]
        #[arg(default_value_t = DELAY_COUNT)]
        #[arg(value_parser = clap::value_parser!(u32).range(..=MAX_DELAY_COUNT as i64))]
        delay_count: u32,

        /// How to render register values
        #[arg(long)]
        #[arg(default_value_t = RenderMode::Signed)]
        #[arg(value_parser = clap_enum_variants!(RenderMode))]
        render: RenderMode,
    },
    /// Runs the smoke test in the RV32I executor, samples the pinned
    /// registers after every step and checks them against the host model.
    Simulate {
        /// RISC-V ELF executable to run instead of the built-in image.
        #[arg(long)]
        elf: Option<PathBuf>,

        /// Number of samples to take, including the seed.
        #[arg(short, long)]
        #[arg(default_value_t = ExecutionOptions::default().samples)]
        samples: usize,

        /// Delay count baked into the built-in image.
        #[arg(short, long)]
        #[arg(conflicts_with = "elf")]
        #[arg(value_parser = clap::value_parser!(u32).range(..=MAX_DELAY_COUNT as i64))]
        delay_count: Option<u32>,

        /// Give up after this many instructions.
        #[arg(long)]
        max_cycles: Option<u64>,

        /// How to render register values
        #[arg(long)]
        #[arg(default_value_t = RenderMode::Signed)]
        #[arg(value_parser = clap_enum_variants!(RenderMode))]
        render: RenderMode,
    },
    /// Logs the decoded instructions of the built-in image or an ELF file.
    Disassemble {
        /// RISC-V ELF executable to decode instead of the built-in image.
        #[arg(long)]
        elf: Option<PathBuf>,

        /// Delay count baked into the built-in image.
        #[arg(short, long)]
        #[arg(conflicts_with = "elf")]
        #[arg(value_parser = clap::value_parser!(u32).range(..=MAX_DELAY_COUNT as i64))]
        delay_count: Option<u32>,
    },
}

fn main() -> Result<(), io::Error> {
    let args = Cli::parse();

    let mut builder = Builder::new();
    builder
        .filter_level(args.log_level)
        .parse_default_env()
        .target(Target::Stdout)
        .format(|buf, record| {
            let mut style = buf.style();
            match record.level() {
                Level::Error => {
                    style.set_color(Color::Red);
                }
                Level::Warn => {
                    style.set_color(Color::Yellow);
                }
                _ => {}
            }
            writeln!(buf, "{}", style.value(record.args()))
        })
        .init();

    if args.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        Ok(())
    } else if let Some(command) = args.command {
        run_command(command);
        Ok(())
    } else {
        Cli::command().print_help()
    }
}

fn run_command(command: Commands) {
    let result = match command {
        Commands::Model {
            iterations,
            delay_count,
            render,
        } => run_model(iterations, delay_count, render),
        Commands::Simulate {
            elf,
            samples,
            delay_count,
            max_cycles,
            render,
        } => simulate(
            elf.as_deref(),
            delay_count,
            ExecutionOptions {
                samples,
                max_cycles,
            },
            render,
        ),
        Commands::Disassemble { elf, delay_count } => {
            print_disassembly(elf.as_deref(), delay_count)
        }
    };
    if let Err(errors) = result {
        for error in errors {
            log::error!("{error}");
        }
        process::exit(1);
    }
}

fn run_model(iterations: u64, delay_count: u32, render: RenderMode) -> Result<(), Vec<String>> {
    let mut smoke_test = SmokeTest::new(&FIB_REGISTERS, delay_count);
    log::info!("Seed: {}", render.state(smoke_test.state()));
    smoke_test.run_until(&mut |completed: u64, state: FibonacciState| {
        if completed > 0 {
            log::info!("Iteration {completed}: {}", render.state(state));
        }
        completed >= iterations
    });
    Ok(())
}

fn load_program(elf: Option<&Path>, delay_count: Option<u32>) -> Result<Program, Vec<String>> {
    match elf {
        Some(path) => {
            let buffer = fs::read(path).map_err(|e| {
                vec![format!("Failed to read ELF file {}: {e}", path.display())]
            })?;
            Program::from_elf(&buffer).map_err(|e| vec![format!("{}: {e}", path.display())])
        }
        None => {
            let delay_count = delay_count.unwrap_or(DELAY_COUNT);
            log::debug!("Using the built-in image with delay count {delay_count}");
            Program::smoke_test(delay_count).map_err(|e| vec![e.to_string()])
        }
    }
}

fn simulate(
    elf: Option<&Path>,
    delay_count: Option<u32>,
    options: ExecutionOptions,
    render: RenderMode,
) -> Result<(), Vec<String>> {
    let program = load_program(elf, delay_count)?;
    let execution = execute(&program, options).map_err(|e| vec![e.to_string()])?;

    for sample in &execution.samples {
        log::info!("cycle {:>12}: {}", sample.cycle, render.state(sample.state));
    }
    if let Some(cycles) = execution.cycles_per_iteration() {
        log::info!("{cycles} cycles per iteration");
    }
    log::debug!(
        "Registers after {} cycles: {}",
        execution.cycles,
        execution
            .final_registers
            .iter()
            .filter(|(_, value)| *value != 0)
            .map(|(reg, value)| format!("{reg}={value:#010x}"))
            .join(" ")
    );

    verify(&execution.samples).map_err(|e| vec![e.to_string()])?;
    log::info!(
        "All {} samples match the host model.",
        execution.samples.len()
    );
    Ok(())
}

fn print_disassembly(elf: Option<&Path>, delay_count: Option<u32>) -> Result<(), Vec<String>> {
    let program = load_program(elf, delay_count)?;
    let labels = program
        .symbols
        .iter()
        .map(|(name, addr)| (*addr, name.as_str()))
        .into_group_map();

    for (addr, line) in disassemble(&program) {
        if let Some(names) = labels.get(&addr) {
            log::info!("{}:", names.iter().join(", "));
        }
        match line {
            Ok(text) => log::info!("  {addr:#010x}: {text}"),
            Err(e) => log::info!("  {addr:#010x}: <{e}>"),
        }
    }
    Ok(())
}
