//! MOS 6502 CPU core
//!
//! A table-driven NMOS 6502 usable by any system that implements
//! [`Memory6502`]. Each opcode byte is looked up in [`table::OPCODES`], the
//! operand is resolved for its addressing mode, the operation runs, and the
//! documented base cycle count plus any page-crossing or branch penalty is
//! returned from [`Cpu6502::step`].
//!
//! # Deferred writes
//!
//! A bus may record a write instead of applying it, and apply it later from
//! [`Memory6502::commit`]. The system driving the CPU commits once per
//! instruction. Instructions that write more than one byte (JSR, BRK and the
//! stack pushes they perform) commit every write but the last one here, so a
//! single-slot bus never loses data.

pub mod table;

use serde::{Deserialize, Serialize};

use crate::logging::{log, LogCategory, LogLevel};
pub use table::{AddrMode, ExtraCycle, Opcode, Operation, OPCODES};

/// Memory interface trait for the 6502 CPU
pub trait Memory6502 {
    fn read(&self, addr: u16) -> u8;

    /// Store a byte. May be recorded and applied on the next [`commit`](Memory6502::commit).
    fn write(&mut self, addr: u16, val: u8);

    /// Apply a recorded write. Buses that write through keep the default.
    fn commit(&mut self) {}
}

/// Status register bits (NV-BDIZC)
pub mod flags {
    pub const CARRY: u8 = 0x01;
    pub const ZERO: u8 = 0x02;
    pub const INTERRUPT: u8 = 0x04;
    pub const DECIMAL: u8 = 0x08;
    pub const BREAK: u8 = 0x10;
    pub const UNUSED: u8 = 0x20;
    pub const OVERFLOW: u8 = 0x40;
    pub const NEGATIVE: u8 = 0x80;
}

pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;
const STACK_PAGE: u16 = 0x0100;

/// Opt-in deviations from documented 6502 behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuQuirks {
    /// Every ORA opcode reads its operand as an immediate byte, whatever its
    /// documented addressing mode. Only one operand byte is consumed.
    pub ora_always_immediate: bool,
}

/// Register file snapshot, used for save states and debugger queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu6502State {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub status: u8,
    pub pc: u16,
    pub cycles: u64,
    pub halted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Implied,
    Accumulator,
    Memory { addr: u16, page_crossed: bool },
}

impl Operand {
    fn at(addr: u16) -> Self {
        Operand::Memory {
            addr,
            page_crossed: false,
        }
    }

    fn indexed(base: u16, index: u8) -> Self {
        let addr = base.wrapping_add(index as u16);
        Operand::Memory {
            addr,
            page_crossed: crosses_page(base, addr),
        }
    }

    fn page_crossed(self) -> bool {
        matches!(
            self,
            Operand::Memory {
                page_crossed: true,
                ..
            }
        )
    }
}

#[inline]
fn crosses_page(a: u16, b: u16) -> bool {
    (a ^ b) & 0xFF00 != 0
}

fn bcd_to_binary(v: u8) -> i16 {
    ((v >> 4) as i16) * 10 + (v & 0x0F) as i16
}

fn binary_to_bcd(v: i16) -> u8 {
    let v = v.rem_euclid(100) as u8;
    ((v / 10) << 4) | (v % 10)
}

/// MOS 6502 CPU state and execution engine
#[derive(Debug)]
pub struct Cpu6502<M: Memory6502> {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    /// Stack pointer (stack lives at 0x0100 + sp)
    pub sp: u8,
    /// Status register (NV-BDIZC)
    pub status: u8,
    pub pc: u16,
    /// Total cycles executed
    pub cycles: u64,
    pub memory: M,
    halted: bool,
    quirks: CpuQuirks,
    /// Set once the current instruction has issued a write
    write_in_flight: bool,
}

impl<M: Memory6502> Cpu6502<M> {
    pub fn new(memory: M) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0,
            status: 0,
            pc: 0,
            cycles: 0,
            memory,
            halted: false,
            quirks: CpuQuirks::default(),
            write_in_flight: false,
        }
    }

    pub fn with_quirks(memory: M, quirks: CpuQuirks) -> Self {
        let mut cpu = Self::new(memory);
        cpu.quirks = quirks;
        cpu
    }

    /// Clear every register, the cycle counter and the halt latch. Memory is untouched.
    pub fn reset(&mut self) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0;
        self.status = 0;
        self.pc = 0;
        self.cycles = 0;
        self.halted = false;
        self.write_in_flight = false;
    }

    /// Load the program counter from the little-endian vector at `vector`.
    pub fn boot(&mut self, vector: u16) {
        self.pc = self.read_u16(vector);
        log(LogCategory::CPU, LogLevel::Info, || {
            format!("CPU: boot via {:04X}, PC={:04X}", vector, self.pc)
        });
    }

    /// Stop executing until [`resume`](Self::resume). Used for TIA WSYNC.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn resume(&mut self) {
        self.halted = false;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn flag(&self, mask: u8) -> bool {
        self.status & mask != 0
    }

    pub fn set_flag(&mut self, mask: u8, on: bool) {
        if on {
            self.status |= mask;
        } else {
            self.status &= !mask;
        }
    }

    pub fn snapshot(&self) -> Cpu6502State {
        Cpu6502State {
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            status: self.status,
            pc: self.pc,
            cycles: self.cycles,
            halted: self.halted,
        }
    }

    pub fn restore(&mut self, state: &Cpu6502State) {
        self.a = state.a;
        self.x = state.x;
        self.y = state.y;
        self.sp = state.sp;
        self.status = state.status;
        self.pc = state.pc;
        self.cycles = state.cycles;
        self.halted = state.halted;
        self.write_in_flight = false;
    }

    /// Run one instruction, or idle one cycle while halted.
    ///
    /// A halted CPU changes no state and reports 1 cycle so the rest of the
    /// machine keeps advancing.
    pub fn execute_next(&mut self) -> u32 {
        if self.halted {
            return 1;
        }
        self.step()
    }

    /// Execute one instruction and return the cycles it took.
    ///
    /// Undocumented opcodes do nothing beyond the opcode fetch and cost 0 cycles.
    pub fn step(&mut self) -> u32 {
        self.write_in_flight = false;

        let at = self.pc;
        let opcode = self.fetch_u8();
        let entry = OPCODES[opcode as usize];

        if !entry.is_documented() {
            log(LogCategory::Stubs, LogLevel::Warn, || {
                format!("CPU: undocumented opcode {:02X} at {:04X}", opcode, at)
            });
            return 0;
        }

        let mode = if self.quirks.ora_always_immediate && entry.operation == Operation::Ora {
            AddrMode::Immediate
        } else {
            entry.mode
        };

        let operand = self.resolve(mode);
        let branch_taken = self.execute(entry.operation, operand);

        let mut cycles = entry.cycles as u32;
        match entry.extra {
            ExtraCycle::Never => {}
            ExtraCycle::PageCross => {
                if operand.page_crossed() {
                    cycles += 1;
                }
            }
            ExtraCycle::Branch => {
                if branch_taken {
                    cycles += 1 + operand.page_crossed() as u32;
                }
            }
        }

        log(LogCategory::CPU, LogLevel::Trace, || {
            format!(
                "CPU: {:04X} {} {:?} A={:02X} X={:02X} Y={:02X} SP={:02X} P={:02X} +{}",
                at,
                entry.operation.mnemonic(),
                mode,
                self.a,
                self.x,
                self.y,
                self.sp,
                self.status,
                cycles
            )
        });

        self.cycles = self.cycles.wrapping_add(cycles as u64);
        cycles
    }

    #[inline]
    fn read(&self, addr: u16) -> u8 {
        self.memory.read(addr)
    }

    #[inline]
    fn write(&mut self, addr: u16, val: u8) {
        if self.write_in_flight {
            self.memory.commit();
        }
        self.memory.write(addr, val);
        self.write_in_flight = true;
    }

    fn read_u16(&self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Zero-page pointer read; the high byte wraps within page zero.
    fn read_zp_u16(&self, zp: u8) -> u16 {
        let lo = self.read(zp as u16) as u16;
        let hi = self.read(zp.wrapping_add(1) as u16) as u16;
        (hi << 8) | lo
    }

    #[inline]
    fn fetch_u8(&mut self) -> u8 {
        let v = self.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        v
    }

    #[inline]
    fn fetch_u16(&mut self) -> u16 {
        let lo = self.fetch_u8() as u16;
        let hi = self.fetch_u8() as u16;
        (hi << 8) | lo
    }

    fn resolve(&mut self, mode: AddrMode) -> Operand {
        match mode {
            AddrMode::Implied => Operand::Implied,
            AddrMode::Accumulator => Operand::Accumulator,
            AddrMode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                Operand::at(addr)
            }
            AddrMode::ZeroPage => Operand::at(self.fetch_u8() as u16),
            AddrMode::ZeroPageX => Operand::at(self.fetch_u8().wrapping_add(self.x) as u16),
            AddrMode::ZeroPageY => Operand::at(self.fetch_u8().wrapping_add(self.y) as u16),
            AddrMode::Absolute => Operand::at(self.fetch_u16()),
            AddrMode::AbsoluteX => {
                let base = self.fetch_u16();
                Operand::indexed(base, self.x)
            }
            AddrMode::AbsoluteY => {
                let base = self.fetch_u16();
                Operand::indexed(base, self.y)
            }
            AddrMode::Indirect => {
                // The high byte is fetched without carrying into the pointer's page
                let ptr = self.fetch_u16();
                let lo = self.read(ptr) as u16;
                let hi = self.read((ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF)) as u16;
                Operand::at((hi << 8) | lo)
            }
            AddrMode::IndirectX => {
                let zp = self.fetch_u8().wrapping_add(self.x);
                Operand::at(self.read_zp_u16(zp))
            }
            AddrMode::IndirectY => {
                let zp = self.fetch_u8();
                let base = self.read_zp_u16(zp);
                Operand::indexed(base, self.y)
            }
            AddrMode::Relative => {
                let offset = self.fetch_u8() as i8;
                let next = self.pc;
                let target = next.wrapping_add(offset as i16 as u16);
                Operand::Memory {
                    addr: target,
                    page_crossed: crosses_page(next, target),
                }
            }
        }
    }

    fn load(&self, operand: Operand) -> u8 {
        match operand {
            Operand::Accumulator => self.a,
            Operand::Memory { addr, .. } => self.read(addr),
            Operand::Implied => 0,
        }
    }

    fn store(&mut self, operand: Operand, val: u8) {
        match operand {
            Operand::Accumulator => self.a = val,
            Operand::Memory { addr, .. } => self.write(addr, val),
            Operand::Implied => {}
        }
    }

    fn target(operand: Operand) -> u16 {
        match operand {
            Operand::Memory { addr, .. } => addr,
            _ => 0,
        }
    }

    fn push(&mut self, v: u8) {
        self.write(STACK_PAGE | self.sp as u16, v);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pull(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.read(STACK_PAGE | self.sp as u16)
    }

    fn push_u16(&mut self, v: u16) {
        self.push((v >> 8) as u8);
        self.push(v as u8);
    }

    fn pull_u16(&mut self) -> u16 {
        let lo = self.pull() as u16;
        let hi = self.pull() as u16;
        (hi << 8) | lo
    }

    fn set_zero_and_negative(&mut self, v: u8) {
        self.set_flag(flags::ZERO, v == 0);
        self.set_flag(flags::NEGATIVE, v & 0x80 != 0);
    }

    fn compare(&mut self, reg: u8, m: u8) {
        self.set_flag(flags::CARRY, reg >= m);
        self.set_zero_and_negative(reg.wrapping_sub(m));
    }

    fn branch(&mut self, condition: bool, operand: Operand) -> bool {
        if condition {
            self.pc = Self::target(operand);
        }
        condition
    }

    fn adc(&mut self, m: u8) {
        let carry = self.flag(flags::CARRY) as i16;
        if self.flag(flags::DECIMAL) {
            let sum = bcd_to_binary(self.a) + bcd_to_binary(m) + carry;
            self.set_flag(flags::CARRY, sum > 99);
            self.set_flag(flags::OVERFLOW, sum > 99);
            self.a = binary_to_bcd(sum);
        } else {
            let sum = self.a as u16 + m as u16 + carry as u16;
            let result = sum as u8;
            self.set_flag(flags::CARRY, sum > 0xFF);
            self.set_flag(
                flags::OVERFLOW,
                (!(self.a ^ m) & (self.a ^ result) & 0x80) != 0,
            );
            self.a = result;
        }
        self.set_zero_and_negative(self.a);
    }

    fn sbc(&mut self, m: u8) {
        let borrow = 1 - self.flag(flags::CARRY) as i16;
        if self.flag(flags::DECIMAL) {
            let diff = bcd_to_binary(self.a) - bcd_to_binary(m) - borrow;
            self.set_flag(flags::CARRY, diff >= 0);
            self.set_flag(flags::OVERFLOW, !(0..=99).contains(&diff));
            self.a = binary_to_bcd(diff);
        } else {
            let diff = self.a as i16 - m as i16 - borrow;
            let result = diff as u8;
            self.set_flag(flags::CARRY, diff >= 0);
            self.set_flag(
                flags::OVERFLOW,
                ((self.a ^ m) & (self.a ^ result) & 0x80) != 0,
            );
            self.a = result;
        }
        self.set_zero_and_negative(self.a);
    }

    /// Run `operation`. Returns whether a branch was taken.
    fn execute(&mut self, operation: Operation, operand: Operand) -> bool {
        match operation {
            Operation::Lda => {
                self.a = self.load(operand);
                self.set_zero_and_negative(self.a);
            }
            Operation::Ldx => {
                self.x = self.load(operand);
                self.set_zero_and_negative(self.x);
            }
            Operation::Ldy => {
                self.y = self.load(operand);
                self.set_zero_and_negative(self.y);
            }
            Operation::Sta => self.store(operand, self.a),
            Operation::Stx => self.store(operand, self.x),
            Operation::Sty => self.store(operand, self.y),

            Operation::Adc => {
                let m = self.load(operand);
                self.adc(m);
            }
            Operation::Sbc => {
                let m = self.load(operand);
                self.sbc(m);
            }
            Operation::And => {
                self.a &= self.load(operand);
                self.set_zero_and_negative(self.a);
            }
            Operation::Ora => {
                self.a |= self.load(operand);
                self.set_zero_and_negative(self.a);
            }
            Operation::Eor => {
                self.a ^= self.load(operand);
                self.set_zero_and_negative(self.a);
            }
            Operation::Bit => {
                let m = self.load(operand);
                self.set_flag(flags::ZERO, self.a & m == 0);
                self.set_flag(flags::OVERFLOW, m & 0x40 != 0);
                self.set_flag(flags::NEGATIVE, m & 0x80 != 0);
            }
            Operation::Cmp => {
                let m = self.load(operand);
                self.compare(self.a, m);
            }
            Operation::Cpx => {
                let m = self.load(operand);
                self.compare(self.x, m);
            }
            Operation::Cpy => {
                let m = self.load(operand);
                self.compare(self.y, m);
            }

            Operation::Asl => {
                let v = self.load(operand);
                self.set_flag(flags::CARRY, v & 0x80 != 0);
                let r = v << 1;
                self.store(operand, r);
                self.set_zero_and_negative(r);
            }
            Operation::Lsr => {
                let v = self.load(operand);
                self.set_flag(flags::CARRY, v & 0x01 != 0);
                let r = v >> 1;
                self.store(operand, r);
                self.set_zero_and_negative(r);
            }
            Operation::Rol => {
                let v = self.load(operand);
                let r = (v << 1) | self.flag(flags::CARRY) as u8;
                self.set_flag(flags::CARRY, v & 0x80 != 0);
                self.store(operand, r);
                self.set_zero_and_negative(r);
            }
            Operation::Ror => {
                let v = self.load(operand);
                let r = (v >> 1) | ((self.flag(flags::CARRY) as u8) << 7);
                self.set_flag(flags::CARRY, v & 0x01 != 0);
                self.store(operand, r);
                self.set_zero_and_negative(r);
            }
            Operation::Inc => {
                let r = self.load(operand).wrapping_add(1);
                self.store(operand, r);
                self.set_zero_and_negative(r);
            }
            Operation::Dec => {
                let r = self.load(operand).wrapping_sub(1);
                self.store(operand, r);
                self.set_zero_and_negative(r);
            }
            Operation::Inx => {
                self.x = self.x.wrapping_add(1);
                self.set_zero_and_negative(self.x);
            }
            Operation::Iny => {
                self.y = self.y.wrapping_add(1);
                self.set_zero_and_negative(self.y);
            }
            Operation::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.set_zero_and_negative(self.x);
            }
            Operation::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.set_zero_and_negative(self.y);
            }

            Operation::Tax => {
                self.x = self.a;
                self.set_zero_and_negative(self.x);
            }
            Operation::Tay => {
                self.y = self.a;
                self.set_zero_and_negative(self.y);
            }
            Operation::Txa => {
                self.a = self.x;
                self.set_zero_and_negative(self.a);
            }
            Operation::Tya => {
                self.a = self.y;
                self.set_zero_and_negative(self.a);
            }
            Operation::Tsx => {
                self.x = self.sp;
                self.set_zero_and_negative(self.x);
            }
            Operation::Txs => self.sp = self.x,

            Operation::Pha => self.push(self.a),
            Operation::Php => self.push(self.status | flags::BREAK | flags::UNUSED),
            Operation::Pla => {
                self.a = self.pull();
                self.set_zero_and_negative(self.a);
            }
            Operation::Plp => {
                self.status = (self.pull() & !flags::BREAK) | flags::UNUSED;
            }

            Operation::Clc => self.set_flag(flags::CARRY, false),
            Operation::Sec => self.set_flag(flags::CARRY, true),
            Operation::Cli => self.set_flag(flags::INTERRUPT, false),
            Operation::Sei => self.set_flag(flags::INTERRUPT, true),
            Operation::Cld => self.set_flag(flags::DECIMAL, false),
            Operation::Sed => self.set_flag(flags::DECIMAL, true),
            Operation::Clv => self.set_flag(flags::OVERFLOW, false),

            Operation::Bcc => return self.branch(!self.flag(flags::CARRY), operand),
            Operation::Bcs => return self.branch(self.flag(flags::CARRY), operand),
            Operation::Bne => return self.branch(!self.flag(flags::ZERO), operand),
            Operation::Beq => return self.branch(self.flag(flags::ZERO), operand),
            Operation::Bpl => return self.branch(!self.flag(flags::NEGATIVE), operand),
            Operation::Bmi => return self.branch(self.flag(flags::NEGATIVE), operand),
            Operation::Bvc => return self.branch(!self.flag(flags::OVERFLOW), operand),
            Operation::Bvs => return self.branch(self.flag(flags::OVERFLOW), operand),

            Operation::Jmp => self.pc = Self::target(operand),
            Operation::Jsr => {
                let ret = self.pc.wrapping_sub(1);
                self.push_u16(ret);
                self.pc = Self::target(operand);
            }
            Operation::Rts => {
                self.pc = self.pull_u16().wrapping_add(1);
            }
            Operation::Brk => {
                // BRK skips a padding byte
                let ret = self.pc.wrapping_add(1);
                self.push_u16(ret);
                self.push(self.status | flags::BREAK | flags::UNUSED);
                self.set_flag(flags::INTERRUPT, true);
                self.pc = self.read_u16(IRQ_VECTOR);
                log(LogCategory::Interrupts, LogLevel::Debug, || {
                    format!("CPU: BRK, return {:04X}, vector {:04X}", ret, self.pc)
                });
            }
            Operation::Rti => {
                self.status = (self.pull() & !flags::BREAK) | flags::UNUSED;
                self.pc = self.pull_u16();
                log(LogCategory::Interrupts, LogLevel::Debug, || {
                    format!("CPU: RTI to {:04X}", self.pc)
                });
            }

            Operation::Nop | Operation::Undocumented => {}
        }
        false
    }
}

impl<M: Memory6502> crate::Cpu for Cpu6502<M> {
    fn reset(&mut self) {
        Cpu6502::reset(self);
    }

    fn step(&mut self) -> u32 {
        self.execute_next()
    }
}

/// Flat 64 KiB memory, used by tests and benchmarks
#[derive(Debug)]
pub struct ArrayMemory {
    pub data: [u8; 0x10000],
}

impl ArrayMemory {
    pub fn new() -> Self {
        Self { data: [0; 0x10000] }
    }

    /// Copy `data` to `offset` and point the reset vector at it.
    pub fn load_program(&mut self, offset: u16, data: &[u8]) {
        let off = offset as usize;
        self.data[off..off + data.len()].copy_from_slice(data);
        self.data[RESET_VECTOR as usize] = offset as u8;
        self.data[RESET_VECTOR as usize + 1] = (offset >> 8) as u8;
    }
}

impl Default for ArrayMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory6502 for ArrayMemory {
    fn read(&self, addr: u16) -> u8 {
        self.data[addr as usize]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.data[addr as usize] = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_with(program: &[u8]) -> Cpu6502<ArrayMemory> {
        let mut cpu = Cpu6502::new(ArrayMemory::new());
        cpu.memory.load_program(0x8000, program);
        cpu.reset();
        cpu.boot(RESET_VECTOR);
        cpu
    }

    /// Records writes without applying them until `commit`
    #[derive(Default)]
    struct DeferredMemory {
        data: Vec<u8>,
        pending: Option<(u16, u8)>,
        commits: usize,
    }

    impl DeferredMemory {
        fn new() -> Self {
            Self {
                data: vec![0; 0x10000],
                ..Default::default()
            }
        }
    }

    impl Memory6502 for DeferredMemory {
        fn read(&self, addr: u16) -> u8 {
            self.data[addr as usize]
        }

        fn write(&mut self, addr: u16, val: u8) {
            self.pending = Some((addr, val));
        }

        fn commit(&mut self) {
            if let Some((addr, val)) = self.pending.take() {
                self.data[addr as usize] = val;
                self.commits += 1;
            }
        }
    }

    #[test]
    fn reset_clears_registers_and_boot_loads_vector() {
        let mut cpu = cpu_with(&[0xEA]);
        cpu.a = 1;
        cpu.x = 2;
        cpu.sp = 0x80;
        cpu.status = 0xFF;
        cpu.halt();
        cpu.reset();
        assert_eq!(cpu.snapshot(), Cpu6502State::default());
        cpu.boot(RESET_VECTOR);
        assert_eq!(cpu.pc, 0x8000);
    }

    #[test]
    fn lda_immediate_sets_a_and_flags() {
        let mut cpu = cpu_with(&[0xA9, 0x05, 0xA9, 0x00, 0xA9, 0x80]);
        assert_eq!(cpu.step(), 2);
        assert_eq!(cpu.a, 5);
        assert!(!cpu.flag(flags::ZERO));
        cpu.step();
        assert!(cpu.flag(flags::ZERO));
        cpu.step();
        assert!(cpu.flag(flags::NEGATIVE));
        assert_eq!(cpu.cycles, 6);
    }

    #[test]
    fn halted_cpu_idles_one_cycle() {
        let mut cpu = cpu_with(&[0xA9, 0x05]);
        cpu.halt();
        let before = cpu.snapshot();
        assert_eq!(cpu.execute_next(), 1);
        assert_eq!(cpu.snapshot(), before);
        cpu.resume();
        assert_eq!(cpu.execute_next(), 2);
        assert_eq!(cpu.a, 5);
    }

    #[test]
    fn undocumented_opcode_is_free_and_advances_pc() {
        let mut cpu = cpu_with(&[0x02, 0xA9, 0x07]);
        assert_eq!(cpu.step(), 0);
        assert_eq!(cpu.pc, 0x8001);
        assert_eq!(cpu.step(), 2);
        assert_eq!(cpu.a, 7);
    }

    #[test]
    fn adc_binary_matches_reference_for_all_inputs() {
        let mut cpu = cpu_with(&[0x69, 0x00]);
        for a in 0..=255u16 {
            for b in (0..=255u16).step_by(7) {
                for c in 0..=1u16 {
                    cpu.pc = 0x8000;
                    cpu.memory.data[0x8001] = b as u8;
                    cpu.a = a as u8;
                    cpu.status = if c == 1 { flags::CARRY } else { 0 };
                    cpu.step();

                    let sum = a + b + c;
                    let r = (sum & 0xFF) as u8;
                    assert_eq!(cpu.a, r);
                    assert_eq!(cpu.flag(flags::CARRY), sum > 0xFF);
                    assert_eq!(cpu.flag(flags::ZERO), r == 0);
                    assert_eq!(cpu.flag(flags::NEGATIVE), r & 0x80 != 0);
                    let overflow = (!(a as u8 ^ b as u8) & (a as u8 ^ r) & 0x80) != 0;
                    assert_eq!(cpu.flag(flags::OVERFLOW), overflow, "{a:02X}+{b:02X}+{c}");
                }
            }
        }
    }

    #[test]
    fn adc_signed_overflow() {
        let mut cpu = cpu_with(&[0x69, 0x50]);
        cpu.a = 0x50;
        cpu.step();
        assert_eq!(cpu.a, 0xA0);
        assert!(cpu.flag(flags::OVERFLOW));
        assert!(cpu.flag(flags::NEGATIVE));
        assert!(!cpu.flag(flags::CARRY));
    }

    #[test]
    fn adc_decimal_mode() {
        // SED; LDA #$09; ADC #$01; ADC #$95
        let mut cpu = cpu_with(&[0xF8, 0xA9, 0x09, 0x69, 0x01, 0x69, 0x95]);
        cpu.step();
        cpu.step();
        cpu.step();
        assert_eq!(cpu.a, 0x10);
        assert!(!cpu.flag(flags::CARRY));
        cpu.step();
        assert_eq!(cpu.a, 0x05);
        assert!(cpu.flag(flags::CARRY));
    }

    #[test]
    fn sbc_binary_and_decimal() {
        // SEC; LDA #$10; SBC #$01
        let mut cpu = cpu_with(&[0x38, 0xA9, 0x10, 0xE9, 0x01]);
        cpu.step();
        cpu.step();
        cpu.step();
        assert_eq!(cpu.a, 0x0F);
        assert!(cpu.flag(flags::CARRY));

        // SED; SEC; LDA #$10; SBC #$01; SBC #$20
        let mut cpu = cpu_with(&[0xF8, 0x38, 0xA9, 0x10, 0xE9, 0x01, 0xE9, 0x20]);
        for _ in 0..4 {
            cpu.step();
        }
        assert_eq!(cpu.a, 0x09);
        assert!(cpu.flag(flags::CARRY));
        cpu.step();
        assert_eq!(cpu.a, 0x89);
        assert!(!cpu.flag(flags::CARRY));
    }

    #[test]
    fn sbc_borrow_clears_carry() {
        let mut cpu = cpu_with(&[0xE9, 0x01]);
        cpu.a = 0x00;
        cpu.set_flag(flags::CARRY, true);
        cpu.step();
        assert_eq!(cpu.a, 0xFF);
        assert!(!cpu.flag(flags::CARRY));
        assert!(cpu.flag(flags::NEGATIVE));
    }

    #[test]
    fn absolute_x_page_cross_costs_a_cycle() {
        // LDA $60F0,X with X=$20 crosses into $6110
        let mut cpu = cpu_with(&[0xBD, 0xF0, 0x60]);
        cpu.x = 0x20;
        cpu.memory.data[0x6110] = 0x42;
        assert_eq!(cpu.step(), 5);
        assert_eq!(cpu.a, 0x42);

        let mut cpu = cpu_with(&[0xBD, 0x00, 0x10]);
        cpu.x = 0x01;
        assert_eq!(cpu.step(), 4);
    }

    #[test]
    fn stores_never_pay_page_cross() {
        let mut cpu = cpu_with(&[0x9D, 0xF0, 0x60]);
        cpu.x = 0x20;
        cpu.a = 0x33;
        assert_eq!(cpu.step(), 5);
        assert_eq!(cpu.memory.data[0x6110], 0x33);
    }

    #[test]
    fn branch_cycles() {
        // LDA #0; BEQ +2 (taken); BNE +0 (not taken)
        let mut cpu = cpu_with(&[0xA9, 0x00, 0xF0, 0x02, 0xEA, 0xEA, 0xD0, 0x00]);
        cpu.step();
        assert_eq!(cpu.step(), 3);
        assert_eq!(cpu.pc, 0x8006);
        assert_eq!(cpu.step(), 2);
        assert_eq!(cpu.pc, 0x8008);
    }

    #[test]
    fn branch_to_other_page_costs_four() {
        let mut cpu = Cpu6502::new(ArrayMemory::new());
        cpu.memory.load_program(0x80F0, &[0xB0, 0x20]);
        cpu.reset();
        cpu.boot(RESET_VECTOR);
        cpu.set_flag(flags::CARRY, true);
        assert_eq!(cpu.step(), 4);
        assert_eq!(cpu.pc, 0x8112);
    }

    #[test]
    fn backward_branch() {
        // DEX; BNE -3
        let mut cpu = cpu_with(&[0xCA, 0xD0, 0xFD]);
        cpu.x = 3;
        let mut steps = 0;
        while cpu.pc != 0x8003 {
            cpu.step();
            steps += 1;
        }
        assert_eq!(cpu.x, 0);
        assert_eq!(steps, 6);
    }

    #[test]
    fn indexed_indirect_addressing() {
        // LDA ($20,X); LDA ($40),Y
        let mut cpu = cpu_with(&[0xA1, 0x20, 0xB1, 0x40]);
        cpu.x = 0x04;
        cpu.y = 0x10;
        cpu.memory.data[0x24] = 0x00;
        cpu.memory.data[0x25] = 0x30;
        cpu.memory.data[0x3000] = 0x11;
        cpu.memory.data[0x40] = 0xF8;
        cpu.memory.data[0x41] = 0x30;
        cpu.memory.data[0x3108] = 0x22;

        assert_eq!(cpu.step(), 6);
        assert_eq!(cpu.a, 0x11);
        assert_eq!(cpu.step(), 6);
        assert_eq!(cpu.a, 0x22);
    }

    #[test]
    fn indirect_x_pointer_wraps_in_zero_page() {
        let mut cpu = cpu_with(&[0xA1, 0xFF]);
        cpu.x = 0;
        cpu.memory.data[0xFF] = 0x34;
        cpu.memory.data[0x00] = 0x12;
        cpu.memory.data[0x1234] = 0x99;
        cpu.step();
        assert_eq!(cpu.a, 0x99);
    }

    #[test]
    fn jmp_indirect_page_wrap_bug() {
        let mut cpu = cpu_with(&[0x6C, 0xFF, 0x30]);
        cpu.memory.data[0x30FF] = 0x34;
        cpu.memory.data[0x3000] = 0x12;
        cpu.memory.data[0x3100] = 0x56;
        assert_eq!(cpu.step(), 5);
        assert_eq!(cpu.pc, 0x1234);
    }

    #[test]
    fn jsr_rts_round_trip() {
        let mut cpu = cpu_with(&[0x20, 0x10, 0x80, 0xA9, 0x01]);
        cpu.sp = 0xFF;
        cpu.memory.data[0x8010] = 0x60;
        assert_eq!(cpu.step(), 6);
        assert_eq!(cpu.pc, 0x8010);
        assert_eq!(cpu.sp, 0xFD);
        assert_eq!(cpu.memory.data[0x01FF], 0x80);
        assert_eq!(cpu.memory.data[0x01FE], 0x02);
        assert_eq!(cpu.step(), 6);
        assert_eq!(cpu.pc, 0x8003);
        cpu.step();
        assert_eq!(cpu.a, 1);
    }

    #[test]
    fn stack_pointer_wraps_from_zero() {
        let mut cpu = cpu_with(&[0x48, 0x68]);
        cpu.a = 0x5A;
        assert_eq!(cpu.step(), 3);
        assert_eq!(cpu.sp, 0xFF);
        assert_eq!(cpu.memory.data[0x0100], 0x5A);
        cpu.a = 0;
        assert_eq!(cpu.step(), 4);
        assert_eq!(cpu.a, 0x5A);
        assert_eq!(cpu.sp, 0x00);
    }

    #[test]
    fn php_plp_handle_break_bit() {
        let mut cpu = cpu_with(&[0x08, 0x28]);
        cpu.sp = 0xFF;
        cpu.status = flags::CARRY | flags::NEGATIVE;
        cpu.step();
        assert_eq!(
            cpu.memory.data[0x01FF],
            flags::CARRY | flags::NEGATIVE | flags::BREAK | flags::UNUSED
        );
        cpu.status = 0;
        cpu.step();
        assert_eq!(cpu.status, flags::CARRY | flags::NEGATIVE | flags::UNUSED);
    }

    #[test]
    fn brk_and_rti() {
        let mut cpu = cpu_with(&[0x00, 0xFF, 0xA9, 0x01]);
        cpu.sp = 0xFF;
        cpu.status = flags::CARRY;
        cpu.memory.data[0xFFFE] = 0x00;
        cpu.memory.data[0xFFFF] = 0x90;
        cpu.memory.data[0x9000] = 0x40;

        assert_eq!(cpu.step(), 7);
        assert_eq!(cpu.pc, 0x9000);
        assert!(cpu.flag(flags::INTERRUPT));
        assert_eq!(cpu.sp, 0xFC);

        assert_eq!(cpu.step(), 6);
        assert_eq!(cpu.pc, 0x8002);
        assert!(cpu.flag(flags::CARRY));
        assert!(!cpu.flag(flags::INTERRUPT));
        cpu.step();
        assert_eq!(cpu.a, 1);
    }

    #[test]
    fn multi_byte_writes_commit_all_but_last() {
        let mut cpu = Cpu6502::new(DeferredMemory::new());
        cpu.memory.data[0x8000..0x8003].copy_from_slice(&[0x20, 0x10, 0x80]);
        cpu.pc = 0x8000;
        cpu.sp = 0xFF;
        cpu.step();
        // High byte of the return address landed, low byte is still pending
        assert_eq!(cpu.memory.data[0x01FF], 0x80);
        assert_eq!(cpu.memory.pending, Some((0x01FE, 0x02)));
        assert_eq!(cpu.memory.commits, 1);
        cpu.memory.commit();
        assert_eq!(cpu.memory.data[0x01FE], 0x02);
    }

    #[test]
    fn single_write_left_for_the_bus_owner() {
        let mut cpu = Cpu6502::new(DeferredMemory::new());
        cpu.memory.data[0x8000..0x8002].copy_from_slice(&[0x85, 0x10]);
        cpu.pc = 0x8000;
        cpu.a = 0x42;
        cpu.step();
        assert_eq!(cpu.memory.commits, 0);
        assert_eq!(cpu.memory.pending, Some((0x0010, 0x42)));
    }

    #[test]
    fn read_modify_write_and_shifts() {
        // INC $10; ASL $10; LSR A; ROL A; ROR A
        let mut cpu = cpu_with(&[0xE6, 0x10, 0x06, 0x10, 0x4A, 0x2A, 0x6A]);
        cpu.memory.data[0x10] = 0x7F;
        assert_eq!(cpu.step(), 5);
        assert_eq!(cpu.memory.data[0x10], 0x80);
        assert!(cpu.flag(flags::NEGATIVE));
        assert_eq!(cpu.step(), 5);
        assert_eq!(cpu.memory.data[0x10], 0x00);
        assert!(cpu.flag(flags::CARRY));
        assert!(cpu.flag(flags::ZERO));

        cpu.a = 0x03;
        cpu.step();
        assert_eq!(cpu.a, 0x01);
        assert!(cpu.flag(flags::CARRY));
        cpu.step();
        assert_eq!(cpu.a, 0x03);
        assert!(!cpu.flag(flags::CARRY));
        cpu.step();
        assert_eq!(cpu.a, 0x01);
        assert!(cpu.flag(flags::CARRY));
    }

    #[test]
    fn compare_and_bit() {
        // CMP #$10; CPX #$05; BIT $20
        let mut cpu = cpu_with(&[0xC9, 0x10, 0xE0, 0x05, 0x24, 0x20]);
        cpu.a = 0x20;
        cpu.x = 0x04;
        cpu.memory.data[0x20] = 0xC0;
        cpu.step();
        assert!(cpu.flag(flags::CARRY));
        assert!(!cpu.flag(flags::ZERO));
        cpu.step();
        assert!(!cpu.flag(flags::CARRY));
        assert!(cpu.flag(flags::NEGATIVE));
        cpu.step();
        assert!(cpu.flag(flags::NEGATIVE));
        assert!(cpu.flag(flags::OVERFLOW));
        assert!(cpu.flag(flags::ZERO));
    }

    #[test]
    fn transfers_and_clv() {
        let mut cpu = cpu_with(&[0xAA, 0xA8, 0x9A, 0xBA, 0xB8]);
        cpu.a = 0x80;
        cpu.step();
        cpu.step();
        assert_eq!((cpu.x, cpu.y), (0x80, 0x80));
        cpu.x = 0x33;
        cpu.step();
        assert_eq!(cpu.sp, 0x33);
        cpu.sp = 0;
        cpu.step();
        assert!(cpu.flag(flags::ZERO));
        cpu.set_flag(flags::OVERFLOW, true);
        assert_eq!(cpu.step(), 2);
        assert!(!cpu.flag(flags::OVERFLOW));
    }

    #[test]
    fn ora_uses_documented_mode_by_default() {
        // ORA $10
        let mut cpu = cpu_with(&[0x05, 0x10, 0xEA]);
        cpu.memory.data[0x10] = 0x0F;
        cpu.a = 0x30;
        assert_eq!(cpu.step(), 3);
        assert_eq!(cpu.a, 0x3F);
        assert_eq!(cpu.pc, 0x8002);
    }

    #[test]
    fn ora_quirk_reads_operand_byte() {
        let quirks = CpuQuirks {
            ora_always_immediate: true,
        };
        // ORA $1234 is executed as ORA #$34, leaving $12 as the next opcode
        let mut cpu = Cpu6502::with_quirks(ArrayMemory::new(), quirks);
        cpu.memory.load_program(0x8000, &[0x0D, 0x34, 0x12]);
        cpu.boot(RESET_VECTOR);
        cpu.memory.data[0x1234] = 0xFF;
        cpu.step();
        assert_eq!(cpu.a, 0x34);
        assert_eq!(cpu.pc, 0x8002);
    }

    #[test]
    fn snapshot_restore() {
        let mut cpu = cpu_with(&[0xA9, 0x05]);
        cpu.step();
        let saved = cpu.snapshot();
        cpu.reset();
        cpu.restore(&saved);
        assert_eq!(cpu.a, 5);
        assert_eq!(cpu.pc, 0x8002);
        assert_eq!(cpu.cycles, 2);
    }
}
