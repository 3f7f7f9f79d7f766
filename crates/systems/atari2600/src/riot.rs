//! RIOT (6532) - RAM, I/O, and Timer chip for Atari 2600
//!
//! # Components
//!
//! ## RAM
//! 128 bytes, the only read/write memory in the system. Selected whenever
//! address bit 9 is clear, so the same bytes answer at $80-$FF (zero page)
//! and $180-$1FF (stack page).
//!
//! ## I/O Ports
//!
//! **SWCHA** (joysticks, active low):
//! - Bits 0-3: Player 0 up, down, left, right
//! - Bits 4-7: Player 1 up, down, left, right
//!
//! **SWCHB** (console switches, active low):
//! - Bit 0: Reset
//! - Bit 1: Select
//! - Bit 3: Colour (1) / black and white (0)
//! - Bit 6-7: Difficulty for player 0 and 1 (0 = B, 1 = A)
//!
//! Both ports have a data direction register that is stored but not
//! enforced. Program writes to SWCHA and SWCHB land in output latches;
//! reads always return the physical switch and joystick lines.
//!
//! ## Interval timer
//!
//! Writing TIM1T, TIM8T, TIM64T or T1024T selects a divisor and loads INTIM.
//! The counter ticks once on the write itself, so INTIM reads back one less
//! than the value written. After that it decrements once per divisor cycles.
//! When a tick finds INTIM already at zero, the timer underflows:
//!
//! - INSTAT bit 7 is raised
//! - INTIM jumps to $FF and counts down once per cycle
//! - counting stops when INTIM reaches zero again
//!
//! Reading INTIM clears INSTAT bit 7. Reading INSTAT clears bit 6.
//!
//! # Memory Map (within RIOT, bit 9 set)
//!
//! ```text
//! $280:      SWCHA (Port A data)
//! $281:      SWACNT (Port A direction)
//! $282:      SWCHB (Port B data)
//! $283:      SWBCNT (Port B direction)
//! $284:      INTIM (Read timer, mirrored at $286)
//! $285:      INSTAT (Read timer status, mirrored at $287)
//! $294:      TIM1T (Set timer, 1 clock interval)
//! $295:      TIM8T (Set timer, 8 clock interval)
//! $296:      TIM64T (Set timer, 64 clock interval)
//! $297:      T1024T (Set timer, 1024 clock interval)
//! ```

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};
use std::cell::Cell;

use crate::registers::{riot as reg, switches};

const RAM_SELECT: u16 = 0x0200;
const TIMER_SELECT: u16 = 0x0010;
const PORT_SELECT: u16 = 0x0004;

const INSTAT_TIMER: u8 = 0x80;
const INSTAT_EDGE: u8 = 0x40;

/// Console switches at power on: reset and select released, colour on,
/// both difficulties on B.
const SWCHB_DEFAULT: u8 = 0x3F;

/// Interval timer state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct IntervalTimer {
    /// CPU cycles per INTIM decrement (1, 8, 64 or 1024)
    interval: u16,
    /// Cycles since the last decrement
    elapsed: u16,
    /// Counting at `interval`
    enabled: bool,
    /// Counting down from $FF once per cycle after an underflow
    free_running: bool,
}

/// RIOT chip state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Riot {
    /// 128 bytes of RAM
    #[serde(with = "crate::serde_helpers::byte_array")]
    ram: [u8; 128],

    /// Port and timer registers, indexed by the low three address bits
    #[serde(with = "crate::serde_helpers::byte_array")]
    io: [u8; 8],

    /// Values the program wrote to SWCHA and SWCHB
    #[serde(default)]
    port_out: [u8; 2],

    /// INSTAT, cleared piecewise by reads
    #[serde(with = "crate::serde_helpers::cell")]
    instat: Cell<u8>,

    timer: IntervalTimer,
}

impl Default for Riot {
    fn default() -> Self {
        Self::new()
    }
}

impl Riot {
    /// Create a new RIOT chip
    pub fn new() -> Self {
        let mut io = [0u8; 8];
        io[reg::SWCHA as usize] = 0xFF;
        io[reg::SWCHB as usize] = SWCHB_DEFAULT;
        Self {
            ram: [0; 128],
            io,
            port_out: [0; 2],
            instat: Cell::new(0),
            timer: IntervalTimer {
                interval: 1,
                ..IntervalTimer::default()
            },
        }
    }

    /// Reset to power-on state. Switch positions are physical and survive.
    pub fn reset(&mut self) {
        let swcha = self.io[reg::SWCHA as usize];
        let swchb = self.io[reg::SWCHB as usize];
        *self = Self::new();
        self.io[reg::SWCHA as usize] = swcha;
        self.io[reg::SWCHB as usize] = swchb;
    }

    /// Read from RIOT address space
    pub fn read(&self, addr: u16) -> u8 {
        let value = self.peek(addr);
        if addr & RAM_SELECT != 0 {
            // Only the primary addresses clear status bits
            match (addr & 0x1F) as u8 {
                reg::INTIM => self.instat.set(self.instat.get() & !INSTAT_TIMER),
                reg::INSTAT => self.instat.set(self.instat.get() & !INSTAT_EDGE),
                _ => {}
            }
        }
        value
    }

    /// Read without clearing any status bits
    pub fn peek(&self, addr: u16) -> u8 {
        if addr & RAM_SELECT == 0 {
            return self.ram[(addr & 0x7F) as usize];
        }
        match addr & 0x07 {
            0x05 | 0x07 => self.instat.get(),
            0x06 => self.io[reg::INTIM as usize],
            i => self.io[i as usize],
        }
    }

    /// Write to RIOT address space
    pub fn write(&mut self, addr: u16, val: u8) {
        if addr & RAM_SELECT == 0 {
            self.ram[(addr & 0x7F) as usize] = val;
            return;
        }

        let offset = (addr & 0x7F) as u8;
        if u16::from(offset) & PORT_SELECT == 0 {
            match offset & 0x03 {
                reg::SWCHA => self.port_out[0] = val,
                reg::SWCHB => self.port_out[1] = val,
                ddr => self.io[ddr as usize] = val,
            }
        } else if u16::from(offset) & TIMER_SELECT != 0 {
            self.set_timer(offset & 0x03, val);
        } else {
            log(LogCategory::Bus, LogLevel::Debug, || {
                format!("RIOT: write {:02X} to undecoded offset {:02X}", val, offset)
            });
        }
    }

    fn set_timer(&mut self, select: u8, val: u8) {
        self.timer = IntervalTimer {
            interval: match select {
                0 => 1,
                1 => 8,
                2 => 64,
                _ => 1024,
            },
            elapsed: 0,
            enabled: true,
            free_running: false,
        };
        self.io[reg::INTIM as usize] = val.wrapping_sub(1);
    }

    /// Advance the timer by `cycles` CPU cycles
    pub fn update_timer(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.tick();
        }
    }

    fn tick(&mut self) {
        let intim = &mut self.io[reg::INTIM as usize];
        if self.timer.enabled {
            self.timer.elapsed += 1;
            if self.timer.elapsed >= self.timer.interval {
                self.timer.elapsed = 0;
                if *intim == 0 {
                    self.timer.enabled = false;
                    self.timer.free_running = true;
                    *intim = 0xFF;
                    self.instat.set(self.instat.get() | INSTAT_TIMER);
                    log(LogCategory::Timer, LogLevel::Trace, || {
                        "RIOT: timer underflow".to_string()
                    });
                } else {
                    *intim -= 1;
                }
            }
        } else if self.timer.free_running {
            if *intim != 0 {
                *intim -= 1;
            } else {
                self.timer.free_running = false;
            }
        }
    }

    /// Current INTIM value, without the read side effect
    pub fn intim(&self) -> u8 {
        self.io[reg::INTIM as usize]
    }

    /// Current INSTAT value, without the read side effect
    pub fn instat(&self) -> u8 {
        self.instat.get()
    }

    /// SWCHB colour switch
    pub fn color_mode(&self) -> bool {
        self.io[reg::SWCHB as usize] & (1 << switches::COLOR) != 0
    }

    pub fn set_color_mode(&mut self, color: bool) {
        // The switch reads low in black and white
        self.set_console_switch(switches::COLOR, !color);
    }

    /// Set joystick state (Port A)
    /// `direction` is 0 = up, 1 = down, 2 = left, 3 = right
    pub fn set_joystick(&mut self, player: u8, direction: u8, pressed: bool) {
        let bit = if player == 0 {
            direction & 0x03
        } else {
            (direction & 0x03) + 4
        };
        let swcha = &mut self.io[reg::SWCHA as usize];
        if pressed {
            *swcha &= !(1 << bit);
        } else {
            *swcha |= 1 << bit;
        }
    }

    /// Set console switch state (Port B). `pressed` drives the bit low.
    pub fn set_console_switch(&mut self, bit: u8, pressed: bool) {
        let swchb = &mut self.io[reg::SWCHB as usize];
        if pressed {
            *swchb &= !(1 << (bit & 0x07));
        } else {
            *swchb |= 1 << (bit & 0x07);
        }
    }
}
