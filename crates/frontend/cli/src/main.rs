mod capture;
mod debugger;

use anyhow::{bail, Context, Result};
use clap::Parser;
use emu_atari2600::{Atari2600Config, Atari2600System, Quirks};
use emu_core::logging::{LogCategory, LogConfig, LogLevel};
use emu_core::types::Frame;
use emu_core::System;
use log::{info, warn};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hemu2600", about = "Headless Atari 2600 emulator")]
struct Args {
    /// Cartridge image (up to 4096 bytes)
    rom: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 1)]
    frames: u32,

    /// Write the last frame to this PNG file
    #[arg(long)]
    png: Option<PathBuf>,

    /// Dump save-state to this file as JSON
    #[arg(long)]
    save: Option<PathBuf>,

    /// Start in the line debugger instead of running frames
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Set the console to black and white
    #[arg(long, default_value_t = false)]
    bw: bool,

    /// Gate missile 0 on missile 1's reset latch
    #[arg(long, default_value_t = false)]
    missile0_quirk: bool,

    /// Read every ORA operand as immediate
    #[arg(long, default_value_t = false)]
    ora_quirk: bool,

    /// Emulator log level: off, error, warn, info, debug or trace
    #[arg(long, default_value = "warn")]
    log_level: LogLevel,

    /// Per-category level, e.g. `--log cpu=trace` (repeatable)
    #[arg(long = "log", value_parser = parse_category_level)]
    log_categories: Vec<(LogCategory, LogLevel)>,

    /// Write emulator log lines to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Suppress per-frame output
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn parse_category(name: &str) -> Option<LogCategory> {
    match name.to_ascii_lowercase().as_str() {
        "cpu" => Some(LogCategory::CPU),
        "bus" => Some(LogCategory::Bus),
        "video" | "tia" => Some(LogCategory::Video),
        "timer" | "riot" => Some(LogCategory::Timer),
        "interrupts" => Some(LogCategory::Interrupts),
        "stubs" => Some(LogCategory::Stubs),
        _ => None,
    }
}

fn parse_category_level(arg: &str) -> Result<(LogCategory, LogLevel)> {
    let Some((name, level)) = arg.split_once('=') else {
        bail!("expected CATEGORY=LEVEL, got '{}'", arg);
    };
    let Some(category) = parse_category(name) else {
        bail!("unknown log category '{}'", name);
    };
    Ok((category, level.parse()?))
}

fn configure_logging(args: &Args) -> Result<()> {
    let config = LogConfig::global();
    config.set_global_level(args.log_level);
    for &(category, level) in &args.log_categories {
        config.set_level(category, level);
    }
    if let Some(path) = &args.log_file {
        config
            .set_log_file(path.clone())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    configure_logging(&args)?;

    let config = Atari2600Config {
        quirks: Quirks {
            missile0_uses_missile1_latch: args.missile0_quirk,
            ora_always_immediate: args.ora_quirk,
        },
        color_mode: !args.bw,
    };
    let mut sys = Atari2600System::with_config(config);

    // A bad image is reported, not fatal: the console runs a blank ROM
    if let Err(e) = sys.load_cartridge_or_blank(&args.rom) {
        warn!("{}: {}; running blank ROM", args.rom.display(), e);
    } else {
        info!("Loaded {}", args.rom.display());
    }

    let mut last: Option<Frame> = None;
    if args.debug {
        let stdin = io::stdin();
        debugger::Debugger::new().run(&mut sys, stdin.lock(), io::stdout())?;
        last = sys.last_frame().map(|f| f.to_frame());
    } else {
        for n in 1..=args.frames {
            let frame = sys.step_frame()?;
            if !args.quiet {
                let regs = sys.registers();
                println!(
                    "Frame {}: {}x{} PC={:04X} cycles={}",
                    n, frame.width, frame.height, regs.pc, sys.cycles()
                );
            }
            last = Some(frame);
        }
    }

    if let Some(path) = &args.png {
        match &last {
            Some(frame) => {
                capture::save_png(frame, path)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!("Wrote {}", path.display());
            }
            None => warn!("No completed frame to write to {}", path.display()),
        }
    }

    if let Some(path) = &args.save {
        let state = sys.save_state();
        let mut f = File::create(path)?;
        write!(f, "{}", serde_json::to_string_pretty(&state)?)?;
        info!("Saved state to {}", path.display());
    }

    Ok(())
}
