//! Atari 2600 system implementation
//!
//! [`Atari2600System`] owns the 6507, and through it the bus with the TIA,
//! RIOT and cartridge. Each driver iteration runs one instruction and then
//! lets the rest of the machine catch up:
//!
//! 1. the CPU executes one instruction (1 idle cycle while halted)
//! 2. the TIA runs three colour clocks per CPU cycle
//! 3. the RIOT timer advances by the same cycles
//! 4. the bus commits the instruction's write
//!
//! Committing last means every colour clock of the instruction sees the
//! registers as they were before the write. A WSYNC commit halts the CPU
//! and the TIA resumes it at the end of the line.

#![allow(clippy::upper_case_acronyms)]

mod bus;
mod cartridge;
mod cpu;
mod frame;
pub mod registers;
mod riot;
mod serde_helpers;
mod tia;

pub use bus::{Atari2600Bus, PendingWrite};
pub use cartridge::{Cartridge, CartridgeError, ROM_SIZE};
pub use cpu::{Atari2600Cpu, BOOT_VECTOR};
pub use emu_core::cpu_6502::Cpu6502State;
pub use frame::{ObjectTag, Pixel, TvFrame, FRAME_HEIGHT, FRAME_WIDTH};
pub use registers::switches;
pub use tia::palette::{resolve as resolve_color, NTSC_PALETTE};
pub use tia::{TiaSignals, FRAME_LINES, HBLANK_CLOCKS, LINE_CLOCKS};

use emu_core::cpu_6502::CpuQuirks;
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::{types::Frame, MountPointInfo, System};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

const CARTRIDGE_MOUNT: &str = "Cartridge";
const STATE_VERSION: u64 = 1;
const STATE_SYSTEM: &str = "atari2600";

/// CPU cycles in one 228x262 frame
pub const CYCLES_PER_FRAME: u64 = (LINE_CLOCKS as u64 * FRAME_LINES as u64) / 3;

/// `step_frame` gives up on a frame after this many CPU cycles
const FRAME_CYCLE_LIMIT: u64 = CYCLES_PER_FRAME * 4;
/// Guards against programs that only execute 0-cycle opcodes
const FRAME_ITERATION_LIMIT: u64 = CYCLES_PER_FRAME * 8;

#[derive(Debug, Error)]
pub enum Atari2600Error {
    #[error("Cartridge error: {0}")]
    Cartridge(#[from] CartridgeError),
    #[error("No cartridge loaded")]
    NoCartridge,
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
    #[error("Incompatible save state: {0}")]
    IncompatibleState(String),
}

/// Hardware behaviours that deviate from the documented chips. All off by
/// default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quirks {
    /// Missile 0 is gated on missile 1's reset latch
    pub missile0_uses_missile1_latch: bool,
    /// Every ORA opcode takes an immediate operand
    pub ora_always_immediate: bool,
}

/// Construction options for [`Atari2600System`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Atari2600Config {
    pub quirks: Quirks,
    /// Initial position of the colour / black and white switch
    pub color_mode: bool,
}

impl Default for Atari2600Config {
    fn default() -> Self {
        Self {
            quirks: Quirks::default(),
            color_mode: true,
        }
    }
}

/// Result of one driver iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// CPU cycles consumed (1 while halted)
    pub cycles: u32,
    /// The TIA finished a frame during this iteration
    pub frame_complete: bool,
}

/// Atari 2600 system
#[derive(Debug)]
pub struct Atari2600System {
    cpu: Atari2600Cpu,
    config: Atari2600Config,
    cycles: u64,
    last_frame: Option<TvFrame>,
}

impl Default for Atari2600System {
    fn default() -> Self {
        Self::new()
    }
}

impl Atari2600System {
    /// Create a new Atari 2600 system
    pub fn new() -> Self {
        Self::with_config(Atari2600Config::default())
    }

    pub fn with_config(config: Atari2600Config) -> Self {
        let mut bus = Atari2600Bus::new();
        bus.tia
            .set_missile0_shares_missile1_latch(config.quirks.missile0_uses_missile1_latch);
        bus.riot.set_color_mode(config.color_mode);
        let cpu_quirks = CpuQuirks {
            ora_always_immediate: config.quirks.ora_always_immediate,
        };

        Self {
            cpu: Atari2600Cpu::new(bus, cpu_quirks),
            config,
            cycles: 0,
            last_frame: None,
        }
    }

    pub fn config(&self) -> Atari2600Config {
        self.config
    }

    /// Insert a cartridge and reset
    pub fn load_cartridge(&mut self, cartridge: Cartridge) {
        self.cpu.bus_mut().load_cartridge(cartridge);
        self.reset();
    }

    /// Load a ROM file. When it cannot be loaded an all-zero ROM is
    /// inserted instead and the error is returned for reporting.
    pub fn load_cartridge_or_blank(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<(), CartridgeError> {
        let path = path.as_ref();
        match Cartridge::from_path(path) {
            Ok(cartridge) => {
                self.load_cartridge(cartridge);
                Ok(())
            }
            Err(e) => {
                log(LogCategory::Bus, LogLevel::Error, || {
                    format!("Cartridge: {} ({}), running blank ROM", e, path.display())
                });
                self.load_cartridge(Cartridge::blank());
                Err(e)
            }
        }
    }

    /// One driver iteration
    pub fn step_instruction(&mut self) -> StepOutcome {
        let cycles = self.cpu.execute_next();
        let mut frame_complete = false;

        for _ in 0..cycles * 3 {
            let signals = self.cpu.bus_mut().step_video();
            if signals.resume_cpu && self.cpu.is_halted() {
                self.cpu.resume();
                log(LogCategory::Interrupts, LogLevel::Trace, || {
                    "CPU: resumed at end of line".to_string()
                });
            }
            if signals.frame_complete {
                frame_complete = true;
                self.last_frame = self.cpu.bus_mut().tia.take_completed_frame();
            }
        }

        let bus = self.cpu.bus_mut();
        bus.riot.update_timer(cycles);
        if bus.commit_write().halt_cpu {
            self.cpu.halt();
        }

        self.cycles += cycles as u64;
        StepOutcome {
            cycles,
            frame_complete,
        }
    }

    /// Run until `stop(pc)` returns true before an instruction, or until
    /// `limit` iterations have run. The instruction at the starting PC always
    /// executes, so a breakpoint there does not stop the run immediately.
    /// Returns the PC that stopped the run.
    pub fn run_until<F>(&mut self, mut stop: F, limit: u64) -> Option<u16>
    where
        F: FnMut(u16) -> bool,
    {
        for i in 0..limit {
            let pc = self.cpu.pc();
            if i > 0 && !self.cpu.is_halted() && stop(pc) {
                return Some(pc);
            }
            self.step_instruction();
        }
        None
    }

    /// CPU registers
    pub fn registers(&self) -> Cpu6502State {
        self.cpu.snapshot()
    }

    /// Read a bus address without side effects
    pub fn peek(&self, addr: u16) -> u8 {
        self.cpu.bus().peek(addr)
    }

    /// TIA beam position as (h, v)
    pub fn beam(&self) -> (u16, u16) {
        self.cpu.bus().tia.beam()
    }

    /// Emulated CPU cycles since reset
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn frame_count(&self) -> u64 {
        self.cpu.bus().tia.frame_count()
    }

    /// The most recent completed frame
    pub fn last_frame(&self) -> Option<&TvFrame> {
        self.last_frame.as_ref()
    }

    pub fn set_joystick(&mut self, player: u8, direction: u8, pressed: bool) {
        self.cpu.bus_mut().riot.set_joystick(player, direction, pressed);
    }

    pub fn set_console_switch(&mut self, bit: u8, pressed: bool) {
        self.cpu.bus_mut().riot.set_console_switch(bit, pressed);
    }

    pub fn set_fire_button(&mut self, player: u8, pressed: bool) {
        self.cpu.bus_mut().tia.set_fire_button(player, pressed);
    }

    pub fn set_color_mode(&mut self, color: bool) {
        self.cpu.bus_mut().riot.set_color_mode(color);
    }

    fn incompatible(reason: String) -> serde_json::Error {
        serde::de::Error::custom(Atari2600Error::IncompatibleState(reason))
    }
}

impl System for Atari2600System {
    type Error = Atari2600Error;

    fn reset(&mut self) {
        self.cpu.bus_mut().reset();
        self.cpu.reset();
        self.cycles = 0;
        self.last_frame = None;
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        if self.cpu.bus().cartridge.is_none() {
            return Err(Atari2600Error::NoCartridge);
        }

        let start = self.cycles;
        let mut iterations = 0u64;
        loop {
            if self.step_instruction().frame_complete {
                if let Some(frame) = &self.last_frame {
                    return Ok(frame.to_frame());
                }
            }
            iterations += 1;
            if self.cycles - start >= FRAME_CYCLE_LIMIT || iterations >= FRAME_ITERATION_LIMIT {
                log(LogCategory::Video, LogLevel::Warn, || {
                    format!(
                        "No frame after {} cycles, beam at {:?}; returning partial frame",
                        self.cycles - start,
                        self.beam()
                    )
                });
                return Ok(self.cpu.bus().tia.frame().to_frame());
            }
        }
    }

    fn save_state(&self) -> Value {
        serde_json::json!({
            "version": STATE_VERSION,
            "system": STATE_SYSTEM,
            "cycles": self.cycles,
            "cpu": self.cpu.snapshot(),
            "bus": self.cpu.bus(),
        })
    }

    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        let version = v["version"].as_u64().unwrap_or(0);
        if version != STATE_VERSION {
            return Err(Self::incompatible(format!("version {}", version)));
        }
        let system = v["system"].as_str().unwrap_or("");
        if system != STATE_SYSTEM {
            return Err(Self::incompatible(format!("system '{}'", system)));
        }

        let cpu: Cpu6502State = serde_json::from_value(v["cpu"].clone())?;
        let mut bus: Atari2600Bus = serde_json::from_value(v["bus"].clone())?;
        let cycles = v["cycles"].as_u64().unwrap_or(0);

        let current = self.cpu.bus_mut();
        bus.cartridge = current.cartridge.take();
        bus.tia
            .set_missile0_shares_missile1_latch(self.config.quirks.missile0_uses_missile1_latch);
        *current = bus;

        self.cpu.restore(&cpu);
        self.cycles = cycles;
        self.last_frame = None;
        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![MountPointInfo {
            id: CARTRIDGE_MOUNT.to_string(),
            name: "Cartridge Slot".to_string(),
            extensions: vec!["a26".to_string(), "bin".to_string()],
            required: true,
        }]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE_MOUNT {
            return Err(Atari2600Error::InvalidMountPoint(
                mount_point_id.to_string(),
            ));
        }

        let cartridge = Cartridge::new(data)?;
        self.load_cartridge(cartridge);
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE_MOUNT {
            return Err(Atari2600Error::InvalidMountPoint(
                mount_point_id.to_string(),
            ));
        }

        self.cpu.bus_mut().cartridge = None;
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == CARTRIDGE_MOUNT && self.cpu.bus().cartridge.is_some()
    }
}
