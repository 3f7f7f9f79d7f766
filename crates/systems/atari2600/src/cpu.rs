//! CPU wrapper for Atari 2600 (6507 variant of 6502)
//!
//! The 6507 is a 6502 in a smaller package: 13 address lines and no
//! interrupt pins. The reset vector is read through the cartridge window at
//! $17FC/$17FD.

use emu_core::cpu_6502::{Cpu6502, Cpu6502State, CpuQuirks};

use crate::bus::Atari2600Bus;

/// Bus address of the reset vector low byte (cartridge offset $7FC)
pub const BOOT_VECTOR: u16 = 0x17FC;

/// Atari 2600 CPU (6507 - 6502 variant with 13-bit address bus)
#[derive(Debug)]
pub struct Atari2600Cpu {
    cpu: Cpu6502<Atari2600Bus>,
}

impl Atari2600Cpu {
    /// Create a new CPU with the given bus
    pub fn new(bus: Atari2600Bus, quirks: CpuQuirks) -> Self {
        Self {
            cpu: Cpu6502::with_quirks(bus, quirks),
        }
    }

    /// Clear the registers and start from the cartridge's reset vector
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.boot();
    }

    pub fn boot(&mut self) {
        self.cpu.boot(BOOT_VECTOR);
    }

    /// Execute one instruction, or idle one cycle while halted
    pub fn execute_next(&mut self) -> u32 {
        self.cpu.execute_next()
    }

    pub fn halt(&mut self) {
        self.cpu.halt();
    }

    pub fn resume(&mut self) {
        self.cpu.resume();
    }

    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    pub fn pc(&self) -> u16 {
        self.cpu.pc
    }

    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    pub fn snapshot(&self) -> Cpu6502State {
        self.cpu.snapshot()
    }

    pub fn restore(&mut self, state: &Cpu6502State) {
        self.cpu.restore(state);
    }

    /// Get a reference to the bus
    pub fn bus(&self) -> &Atari2600Bus {
        &self.cpu.memory
    }

    /// Get a mutable reference to the bus
    pub fn bus_mut(&mut self) -> &mut Atari2600Bus {
        &mut self.cpu.memory
    }
}
