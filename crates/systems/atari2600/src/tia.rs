//! TIA (Television Interface Adapter) video chip
//!
//! The TIA has no frame buffer of its own in hardware. It produces the
//! picture one colour clock at a time while the CPU races the beam. This
//! model steps one colour clock per call to [`Tia::step`] (three per CPU
//! cycle) and records every clock into a [`TvFrame`]:
//!
//! - 228 clocks per line, of which the first 68 are horizontal blank
//! - 262 lines per frame. The finished frame is handed off after line 261
//! - VSYNC and VBLANK (bit 1) black out whole lines
//!
//! # Objects
//!
//! Two groups are overlaid on the background every visible clock: the
//! playfield group (playfield, then ball) and the player group (missile 1,
//! player 1, missile 0, player 0). CTRLPF bit 2 selects which group is drawn
//! first. A pixel's final owner comes from the fixed object ranking in
//! [`ObjectTag::rank`], so an object only paints over lower-ranked ones.
//! Every meeting of two objects sets a collision latch, whichever one wins.
//!
//! A RESxx strobe arms the object's latch and loads its size counter. Each
//! drawn clock decrements the counter; at zero the latch is released.
//!
//! # Signals
//!
//! The TIA never touches the CPU directly. [`Tia::write`] and [`Tia::step`]
//! return [`TiaSignals`] for the driver loop to apply: WSYNC asks for a halt,
//! the end of every line asks for a resume, and the end of line 261 reports a
//! completed frame.

mod collision;
pub mod palette;
mod playfield;

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

use crate::frame::{ObjectTag, Pixel, TvFrame};
use crate::registers::tia::*;
use collision::CollisionBit;

/// Colour clocks of horizontal blank at the start of each line
pub const HBLANK_CLOCKS: u16 = 68;
/// Colour clocks per line
pub const LINE_CLOCKS: u16 = 228;
/// Lines per frame
pub const FRAME_LINES: u16 = 262;

/// Column that objects strobed during horizontal blank are painted at
const HBLANK_PARK_COLUMN: usize = HBLANK_CLOCKS as usize + 2;

const VERTICAL_SYNC: u8 = 0x02;
const VERTICAL_BLANK: u8 = 0x02;
const CTRLPF_REFLECT: u8 = 0x01;
const CTRLPF_SCORE: u8 = 0x02;
const CTRLPF_PRIORITY: u8 = 0x04;
const CTRLPF_BALL_SIZE: u8 = 0x30;
const OBJECT_ENABLE: u8 = 0x02;
const REFLECT_PLAYER: u8 = 0x08;

/// Requests for the driver loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TiaSignals {
    /// WSYNC: stop the CPU until the end of the line
    pub halt_cpu: bool,
    /// A line finished; a halted CPU may continue
    pub resume_cpu: bool,
    /// Line 261 finished; the frame is ready in [`Tia::take_completed_frame`]
    pub frame_complete: bool,
}

impl TiaSignals {
    pub fn merge(self, other: TiaSignals) -> TiaSignals {
        TiaSignals {
            halt_cpu: self.halt_cpu || other.halt_cpu,
            resume_cpu: self.resume_cpu || other.resume_cpu,
            frame_complete: self.frame_complete || other.frame_complete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sprite {
    Player0,
    Player1,
    Missile0,
    Missile1,
    Ball,
}

impl Sprite {
    /// Player group, lowest rank first
    const PLAYER_GROUP: [Sprite; 4] = [
        Sprite::Missile1,
        Sprite::Player1,
        Sprite::Missile0,
        Sprite::Player0,
    ];

    const fn slot(self) -> usize {
        match self {
            Sprite::Player0 => 0,
            Sprite::Player1 => 1,
            Sprite::Missile0 => 2,
            Sprite::Missile1 => 3,
            Sprite::Ball => 4,
        }
    }

    const fn tag(self) -> ObjectTag {
        match self {
            Sprite::Player0 => ObjectTag::Player0,
            Sprite::Player1 => ObjectTag::Player1,
            Sprite::Missile0 => ObjectTag::Missile0,
            Sprite::Missile1 => ObjectTag::Missile1,
            Sprite::Ball => ObjectTag::Ball,
        }
    }

    const fn motion_register(self) -> u8 {
        match self {
            Sprite::Player0 => HMP0,
            Sprite::Player1 => HMP1,
            Sprite::Missile0 => HMM0,
            Sprite::Missile1 => HMM1,
            Sprite::Ball => HMBL,
        }
    }
}

/// Reset latch and size counter of one movable object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ObjectCounter {
    armed: bool,
    remaining: u16,
    width: u16,
}

/// Vertical delay flags and the writes they hold back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct VerticalDelay {
    p0: bool,
    p1: bool,
    ball: bool,
    held_p0: Option<u8>,
    held_p1: Option<u8>,
    held_ball: Option<u8>,
}

/// Signed horizontal motion from bits 7-4 of an HMxx register (-8..=7)
fn motion(reg: u8) -> i32 {
    ((reg as i8) >> 4) as i32
}

fn player_width(nusiz: u8) -> u16 {
    match nusiz & 0x07 {
        5 => 16,
        7 => 32,
        _ => 8,
    }
}

fn missile_width(nusiz: u8) -> u16 {
    1 << ((nusiz >> 4) & 0x03)
}

/// Paint `tag` over `target` unless the occupant outranks it.
fn overlay(target: &mut Pixel, tag: ObjectTag, color: u32) -> Option<CollisionBit> {
    let hit = collision::between(target.tag, tag);
    if !target.tag.outranks(tag) {
        *target = Pixel::new(color, tag);
    }
    hit
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tia {
    #[serde(with = "crate::serde_helpers::byte_array")]
    regs: [u8; 64],
    h: u16,
    v: u16,
    counters: [ObjectCounter; 5],
    /// HMOVE was strobed this frame
    hmove_pending: bool,
    delay: VerticalDelay,
    frames: u64,
    #[serde(skip)]
    missile0_shares_missile1_latch: bool,
    #[serde(skip)]
    frame: TvFrame,
    /// Columns on this line already painted by a moved or parked object
    #[serde(skip)]
    painted_ahead: Vec<u16>,
    #[serde(skip)]
    completed: Option<TvFrame>,
}

impl Default for Tia {
    fn default() -> Self {
        Self::new()
    }
}

impl Tia {
    pub fn new() -> Self {
        let mut regs = [0u8; 64];
        // Fire buttons read high when released
        regs[INPT4 as usize] = 0x80;
        regs[INPT5 as usize] = 0x80;
        Self {
            regs,
            h: 0,
            v: 0,
            counters: [ObjectCounter::default(); 5],
            hmove_pending: false,
            delay: VerticalDelay::default(),
            frames: 0,
            missile0_shares_missile1_latch: false,
            frame: TvFrame::new(),
            painted_ahead: Vec::new(),
            completed: None,
        }
    }

    /// Power-on state. The missile latch setting is kept.
    pub fn reset(&mut self) {
        let shared = self.missile0_shares_missile1_latch;
        *self = Self::new();
        self.missile0_shares_missile1_latch = shared;
    }

    /// Gate missile 0 on missile 1's reset latch instead of its own.
    pub fn set_missile0_shares_missile1_latch(&mut self, shared: bool) {
        self.missile0_shares_missile1_latch = shared;
    }

    /// Current beam position as (h, v)
    pub fn beam(&self) -> (u16, u16) {
        (self.h, self.v)
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// The frame being drawn
    pub fn frame(&self) -> &TvFrame {
        &self.frame
    }

    pub fn take_completed_frame(&mut self) -> Option<TvFrame> {
        self.completed.take()
    }

    /// Fire button for player 0 or 1 (INPT4/INPT5 bit 7, low when pressed)
    pub fn set_fire_button(&mut self, player: u8, pressed: bool) {
        let reg = if player == 0 { INPT4 } else { INPT5 } as usize;
        if pressed {
            self.regs[reg] &= !0x80;
        } else {
            self.regs[reg] |= 0x80;
        }
    }

    pub fn read(&self, addr: u8) -> u8 {
        self.regs[(addr & 0x3F) as usize]
    }

    pub fn write(&mut self, addr: u8, value: u8) -> TiaSignals {
        let addr = addr & 0x3F;
        let mut signals = TiaSignals::default();

        match addr {
            VSYNC => {
                self.regs[VSYNC as usize] = value;
                if value & VERTICAL_SYNC != 0 {
                    self.h = 0;
                    self.v = 0;
                    self.painted_ahead.clear();
                }
            }
            WSYNC => {
                signals.halt_cpu = true;
                log(LogCategory::Interrupts, LogLevel::Trace, || {
                    format!("TIA: WSYNC at h={} v={}", self.h, self.v)
                });
            }
            RSYNC => {
                self.h = 0;
                self.painted_ahead.clear();
            }
            RESP0 => self.arm(Sprite::Player0),
            RESP1 => self.arm(Sprite::Player1),
            RESM0 => self.arm(Sprite::Missile0),
            RESM1 => self.arm(Sprite::Missile1),
            RESBL => self.arm(Sprite::Ball),
            HMOVE => self.hmove_pending = true,
            HMCLR => self.regs[HMP0 as usize..=HMBL as usize].fill(0),
            CXCLR => self.regs[CXM0P as usize..=CXPPMM as usize].fill(0),
            VDELP0 => {
                self.regs[VDELP0 as usize] = value;
                self.delay.p0 = value & 0x01 != 0;
                if !self.delay.p0 {
                    self.delay.held_p0 = None;
                }
            }
            VDELP1 => {
                self.regs[VDELP1 as usize] = value;
                self.delay.p1 = value & 0x01 != 0;
                if !self.delay.p1 {
                    self.delay.held_p1 = None;
                }
            }
            VDELBL => {
                self.regs[VDELBL as usize] = value;
                self.delay.ball = value & 0x01 != 0;
                if !self.delay.ball {
                    self.delay.held_ball = None;
                }
            }
            GRP0 => {
                if let Some(held) = self.delay.held_p1.take() {
                    self.regs[GRP1 as usize] = held;
                }
                if self.delay.p0 {
                    self.delay.held_p0 = Some(value);
                } else {
                    self.regs[GRP0 as usize] = value;
                }
            }
            GRP1 => {
                if let Some(held) = self.delay.held_p0.take() {
                    self.regs[GRP0 as usize] = held;
                }
                if let Some(held) = self.delay.held_ball.take() {
                    self.regs[ENABL as usize] = held;
                }
                if self.delay.p1 {
                    self.delay.held_p1 = Some(value);
                } else {
                    self.regs[GRP1 as usize] = value;
                }
            }
            ENABL => {
                if self.delay.ball {
                    self.delay.held_ball = Some(value);
                } else {
                    self.regs[ENABL as usize] = value;
                }
            }
            0x2D..=0x3F => {
                log(LogCategory::Stubs, LogLevel::Debug, || {
                    format!("TIA: write {:02X} to read-only offset {:02X}", value, addr)
                });
            }
            _ => self.regs[addr as usize] = value,
        }

        signals
    }

    /// Advance one colour clock.
    pub fn step(&mut self, color_mode: bool) -> TiaSignals {
        let blanked = self.regs[VSYNC as usize] & VERTICAL_SYNC != 0
            || self.regs[VBLANK as usize] & VERTICAL_BLANK != 0;

        let pixel = if blanked {
            Pixel::BLACK
        } else {
            let mut pixel = if self.h < HBLANK_CLOCKS {
                Pixel::BLACK
            } else {
                Pixel::new(self.color(COLUBK, color_mode), ObjectTag::Background)
            };
            if self.regs[CTRLPF as usize] & CTRLPF_PRIORITY == 0 {
                self.draw_playfield_group(&mut pixel, color_mode);
                self.draw_player_group(&mut pixel, color_mode);
            } else {
                self.draw_player_group(&mut pixel, color_mode);
                self.draw_playfield_group(&mut pixel, color_mode);
            }
            pixel
        };

        self.emit(pixel);
        self.advance_beam()
    }

    /// Store the pixel at the beam. A cell painted ahead by a higher-ranked
    /// object keeps its owner.
    fn emit(&mut self, pixel: Pixel) {
        let (x, y) = (self.h as usize, self.v as usize);
        if let Some(i) = self.painted_ahead.iter().position(|&col| col == self.h) {
            self.painted_ahead.swap_remove(i);
            if let Some(cell) = self.frame.get_mut(x, y) {
                if let Some(hit) = collision::between(cell.tag, pixel.tag) {
                    self.regs[hit.register as usize] |= hit.mask;
                }
                if !cell.tag.outranks(pixel.tag) {
                    *cell = pixel;
                }
            }
            return;
        }
        self.frame.set(x, y, pixel);
    }

    fn advance_beam(&mut self) -> TiaSignals {
        let mut signals = TiaSignals::default();
        if self.h >= LINE_CLOCKS - 1 {
            self.h = 0;
            self.painted_ahead.clear();
            signals.resume_cpu = true;
            if self.v >= FRAME_LINES - 1 {
                self.v = 0;
                self.hmove_pending = false;
                self.completed = Some(std::mem::take(&mut self.frame));
                self.frames += 1;
                signals.frame_complete = true;
                log(LogCategory::Video, LogLevel::Debug, || {
                    format!("TIA: frame {} complete", self.frames)
                });
            } else {
                self.v += 1;
            }
        } else {
            self.h += 1;
        }
        signals
    }

    fn color(&self, register: u8, color_mode: bool) -> u32 {
        palette::resolve(self.regs[register as usize], color_mode)
    }

    fn sprite_color(&self, sprite: Sprite, color_mode: bool) -> u32 {
        let register = match sprite {
            Sprite::Player0 | Sprite::Missile0 => COLUP0,
            Sprite::Player1 | Sprite::Missile1 => COLUP1,
            Sprite::Ball => COLUPF,
        };
        self.color(register, color_mode)
    }

    fn arm(&mut self, sprite: Sprite) {
        let width = match sprite {
            Sprite::Player0 => player_width(self.regs[NUSIZ0 as usize]),
            Sprite::Player1 => player_width(self.regs[NUSIZ1 as usize]),
            Sprite::Missile0 => missile_width(self.regs[NUSIZ0 as usize]),
            Sprite::Missile1 => missile_width(self.regs[NUSIZ1 as usize]),
            Sprite::Ball => 1 << ((self.regs[CTRLPF as usize] & CTRLPF_BALL_SIZE) >> 4),
        };
        self.counters[sprite.slot()] = ObjectCounter {
            armed: true,
            remaining: width,
            width,
        };
    }

    fn latch_collision(&mut self, hit: Option<CollisionBit>) {
        if let Some(bit) = hit {
            self.regs[bit.register as usize] |= bit.mask;
        }
    }

    fn draw_playfield_group(&mut self, pixel: &mut Pixel, color_mode: bool) {
        let ctrl = self.regs[CTRLPF as usize];
        if let Some(pf) = playfield::locate(self.h, ctrl & CTRLPF_REFLECT != 0) {
            if self.regs[pf.register as usize] & pf.mask != 0 {
                let score = ctrl & CTRLPF_PRIORITY == 0 && ctrl & CTRLPF_SCORE != 0;
                let register = match (score, pf.left_half) {
                    (true, true) => COLUP0,
                    (true, false) => COLUP1,
                    (false, _) => COLUPF,
                };
                let color = self.color(register, color_mode);
                let hit = overlay(pixel, ObjectTag::Playfield, color);
                self.latch_collision(hit);
            }
        }
        self.draw_sprite(Sprite::Ball, pixel, color_mode);
    }

    fn draw_player_group(&mut self, pixel: &mut Pixel, color_mode: bool) {
        for sprite in Sprite::PLAYER_GROUP {
            self.draw_sprite(sprite, pixel, color_mode);
        }
    }

    fn enabled(&self, sprite: Sprite) -> bool {
        match sprite {
            Sprite::Player0 => self.regs[GRP0 as usize] != 0,
            Sprite::Player1 => self.regs[GRP1 as usize] != 0,
            Sprite::Missile0 => self.regs[ENAM0 as usize] & OBJECT_ENABLE != 0,
            Sprite::Missile1 => self.regs[ENAM1 as usize] & OBJECT_ENABLE != 0,
            Sprite::Ball => self.regs[ENABL as usize] & OBJECT_ENABLE != 0,
        }
    }

    /// Whether the object shows at the current counter position
    fn visible(&self, sprite: Sprite, counter: ObjectCounter) -> bool {
        let (grp, refp) = match sprite {
            Sprite::Player0 => (GRP0, REFP0),
            Sprite::Player1 => (GRP1, REFP1),
            _ => return true,
        };
        let scale = (counter.width / 8).max(1);
        let bit = ((counter.width - counter.remaining) / scale).min(7) as u32;
        let mask = if self.regs[refp as usize] & REFLECT_PLAYER != 0 {
            1u8 << bit
        } else {
            0x80u8 >> bit
        };
        self.regs[grp as usize] & mask != 0
    }

    fn draw_sprite(&mut self, sprite: Sprite, pixel: &mut Pixel, color_mode: bool) {
        let slot = sprite.slot();
        let armed = if sprite == Sprite::Missile0 && self.missile0_shares_missile1_latch {
            self.counters[Sprite::Missile1.slot()].armed
        } else {
            self.counters[slot].armed
        };
        if !armed || !self.enabled(sprite) {
            return;
        }

        let counter = self.counters[slot];
        if counter.remaining == 0 {
            self.counters[slot].armed = false;
            return;
        }

        if self.visible(sprite, counter) {
            let tag = sprite.tag();
            let color = self.sprite_color(sprite, color_mode);
            let hit = if self.h < HBLANK_CLOCKS {
                self.overlay_frame(HBLANK_PARK_COLUMN as i32, tag, color)
            } else {
                let hm = if self.hmove_pending {
                    motion(self.regs[sprite.motion_register() as usize])
                } else {
                    0
                };
                if hm == 0 {
                    overlay(pixel, tag, color)
                } else {
                    self.overlay_frame(self.h as i32 + hm, tag, color)
                }
            };
            self.latch_collision(hit);
        }

        self.counters[slot].remaining -= 1;
    }

    /// Paint a frame pixel other than the one being produced. Columns off
    /// the line are dropped.
    fn overlay_frame(&mut self, x: i32, tag: ObjectTag, color: u32) -> Option<CollisionBit> {
        if !(0..LINE_CLOCKS as i32).contains(&x) {
            return None;
        }
        if x > self.h as i32 && !self.painted_ahead.contains(&(x as u16)) {
            self.painted_ahead.push(x as u16);
        }
        let target = self.frame.get_mut(x as usize, self.v as usize)?;
        overlay(target, tag, color)
    }
}
