use clap::Parser;
use colored::Colorize;
use log::{error, info};

mod cli;
mod cpu;
mod error;
mod loader;
mod memory;
mod opcodes;
mod port;

use cli::CliArguments;
use cpu::Cpu;
use error::EmuError;

const BANNER: &str = "
        d8b          d8b
        Y8P          Y8P

888d888 888 888  888 888  .d88b.  888d888 8888b.
888P    888 888  888 888 d8P  Y8b 888P       88b
888     888 Y88  88P 888 88888888 888    .d888888
888     888  Y8bd8P  888 Y8b.     888    888  888
888     888   Y88P   888   Y8888  888     Y888888";

/// Print welcome banner
fn welcome() {
    println!("{}\n", BANNER.bright_cyan());
    println!(
        "{} is a small register-machine emulator",
        "tetracore".bright_cyan()
    );
}

/// Exit codes: 0 normal halt; 1 invalid argument count; 2 failure while
/// loading the image or parsing RAM size; 3 CPU initialisation or
/// run-time fault.
fn run() -> i32 {
    welcome();

    let args = match CliArguments::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{} {}", "[!]".red(), e);
            return 1;
        }
    };

    let ram_size: usize = match args.ram_size.parse() {
        Ok(n) => n,
        Err(source) => {
            let err = EmuError::RamSizeParse {
                raw: args.ram_size.clone(),
                source,
            };
            error!("{}", err);
            eprintln!("{} {}", "[!]".red(), err);
            return 2;
        }
    };

    let image = match loader::load_image(&args.image) {
        Ok(image) => image,
        Err(e) => {
            error!("{}", e);
            eprintln!("{} {}", "[!]".red(), e);
            return 2;
        }
    };
    info!("loaded {} cells from {}", image.len(), args.image);

    let mut cpu = match Cpu::new(image, ram_size) {
        Ok(cpu) => cpu,
        Err(e) => {
            error!("{}", e);
            eprintln!("{} {}", "[!]".red(), e);
            return 3;
        }
    };

    if args.debug_requested() {
        cpu.enable_debug();
    }

    let start = std::time::Instant::now();
    match cpu.run() {
        Ok(instr_count) => {
            let elapsed = start.elapsed();
            info!(
                "halted after {} instructions in {:.2?} (ERR={})",
                instr_count,
                elapsed,
                cpu.err()
            );
            println!(
                "{} halted after {} instructions in {:.2?}",
                "[*]".green(),
                instr_count,
                elapsed
            );
            0
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("{} {}", "[!]".red(), e);
            3
        }
    }
}

fn main() {
    env_logger::init();
    std::process::exit(run());
}
