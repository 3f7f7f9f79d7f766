//! Atari 2600 memory bus implementation
//!
//! The 6507 drives 13 address lines and the chips decode only a few of them:
//!
//! ```text
//! A12 set                  Cartridge ROM   (addr & $FFF)
//! A12 clear, A7 clear      TIA             (addr & $3F)
//! A12 clear, A7 set, A9=0  RIOT RAM        (addr & $7F)
//! A12 clear, A7 set, A9=1  RIOT I/O, timer (reads addr & $1F, writes addr & $7F)
//! ```
//!
//! Every 16-bit address lands somewhere, so decoding never fails.
//!
//! Writes do not reach a chip immediately. [`Memory6502::write`] records a
//! single pending write and the driver loop applies it with
//! [`Atari2600Bus::commit_write`] after the TIA has run for the instruction's
//! cycles. A second write before the commit replaces the first; the CPU
//! commits earlier writes of a multi-write instruction itself through
//! [`Memory6502::commit`].

use emu_core::cpu_6502::Memory6502;
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

use crate::cartridge::Cartridge;
use crate::riot::Riot;
use crate::tia::{Tia, TiaSignals};

const CARTRIDGE_SELECT: u16 = 0x1000;
const RIOT_SELECT: u16 = 0x0080;

/// A write waiting for the next commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    pub addr: u16,
    pub value: u8,
}

/// Atari 2600 memory bus
#[derive(Debug, Serialize, Deserialize)]
pub struct Atari2600Bus {
    pub tia: Tia,
    pub riot: Riot,
    #[serde(skip)]
    pub cartridge: Option<Cartridge>,
    #[serde(skip)]
    pending: Option<PendingWrite>,
    /// Signals raised by writes the CPU committed mid-instruction
    #[serde(skip)]
    carried: TiaSignals,
}

impl Default for Atari2600Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Atari2600Bus {
    /// Create a new bus
    pub fn new() -> Self {
        Self {
            tia: Tia::new(),
            riot: Riot::new(),
            cartridge: None,
            pending: None,
            carried: TiaSignals::default(),
        }
    }

    /// Load a cartridge
    pub fn load_cartridge(&mut self, cartridge: Cartridge) {
        self.cartridge = Some(cartridge);
    }

    /// Reset the chips. The cartridge stays mounted.
    pub fn reset(&mut self) {
        self.tia.reset();
        self.riot.reset();
        self.pending = None;
        self.carried = TiaSignals::default();
    }

    pub fn pending(&self) -> Option<PendingWrite> {
        self.pending
    }

    /// Decode like a CPU read, without read side effects
    pub fn peek(&self, addr: u16) -> u8 {
        if addr & CARTRIDGE_SELECT != 0 {
            self.cartridge.as_ref().map_or(0, |cart| cart.read(addr & 0x0FFF))
        } else if addr & RIOT_SELECT == 0 {
            self.tia.read((addr & 0x3F) as u8)
        } else {
            self.riot.peek(addr)
        }
    }

    /// Run the TIA for one colour clock
    pub fn step_video(&mut self) -> TiaSignals {
        let color_mode = self.riot.color_mode();
        self.tia.step(color_mode)
    }

    /// Apply the pending write, if any. Returns the TIA requests raised by
    /// this write and by any committed earlier in the same instruction.
    pub fn commit_write(&mut self) -> TiaSignals {
        let signals = self.apply_pending();
        std::mem::take(&mut self.carried).merge(signals)
    }

    fn apply_pending(&mut self) -> TiaSignals {
        let Some(PendingWrite { addr, value }) = self.pending.take() else {
            return TiaSignals::default();
        };

        if addr & CARTRIDGE_SELECT != 0 {
            log(LogCategory::Bus, LogLevel::Debug, || {
                format!("Bus: write {:02X} to ROM at {:04X} dropped", value, addr)
            });
            TiaSignals::default()
        } else if addr & RIOT_SELECT == 0 {
            self.tia.write((addr & 0x3F) as u8, value)
        } else {
            self.riot.write(addr, value);
            TiaSignals::default()
        }
    }
}

impl Memory6502 for Atari2600Bus {
    fn read(&self, addr: u16) -> u8 {
        if addr & CARTRIDGE_SELECT == 0 && addr & RIOT_SELECT != 0 {
            self.riot.read(addr)
        } else {
            self.peek(addr)
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.pending = Some(PendingWrite { addr, value: val });
    }

    fn commit(&mut self) {
        let signals = self.apply_pending();
        self.carried = self.carried.merge(signals);
    }
}
