//! Line-command debugger
//!
//! Commands (addresses in hex, `$` prefix optional):
//!
//! ```text
//! s, step [n]        execute n instructions (default 1)
//! c, continue        run to the next breakpoint
//! f, frame           run to the end of the current frame
//! b, break <addr>    add a breakpoint
//! d, delete <addr>   remove a breakpoint
//! l, list            list breakpoints
//! r, regs            show CPU registers, beam position and next instruction
//! m, mem <addr> [n]  dump n bytes (default 16)
//! h, help            this text
//! q, quit            leave the debugger
//! ```
//!
//! Breakpoints compare the low 13 bits of the PC, which is all the 6507
//! puts on the bus.

use emu_atari2600::{Atari2600System, Cpu6502State};
use emu_core::cpu_6502::{AddrMode, OPCODES};
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// 6507 address lines
const ADDRESS_MASK: u16 = 0x1FFF;
/// Instructions `continue` and `frame` run before giving up
const CONTINUE_LIMIT: u64 = 10_000_000;
const DEFAULT_DUMP_LEN: u16 = 16;

const HELP: &str = "\
s, step [n]        execute n instructions (default 1)
c, continue        run to the next breakpoint
f, frame           run to the end of the current frame
b, break <addr>    add a breakpoint
d, delete <addr>   remove a breakpoint
l, list            list breakpoints
r, regs            show CPU registers, beam position and next instruction
m, mem <addr> [n]  dump n bytes (default 16)
h, help            this text
q, quit            leave the debugger";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebuggerError {
    #[error("unknown command '{0}' (try 'help')")]
    UnknownCommand(String),
    #[error("'{0}' needs an address")]
    MissingAddress(&'static str),
    #[error("bad address '{0}'")]
    BadAddress(String),
    #[error("bad count '{0}'")]
    BadCount(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Step(u64),
    Continue,
    Frame,
    Break(u16),
    Delete(u16),
    List,
    Registers,
    Memory { addr: u16, len: u16 },
    Help,
    Quit,
}

fn parse_addr(token: &str) -> Result<u16, DebuggerError> {
    let digits = token
        .trim_start_matches('$')
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|_| DebuggerError::BadAddress(token.to_string()))
}

fn parse_count<T: std::str::FromStr>(
    token: Option<&str>,
    default: T,
) -> Result<T, DebuggerError> {
    match token {
        None => Ok(default),
        Some(t) => t.parse().map_err(|_| DebuggerError::BadCount(t.to_string())),
    }
}

/// Parse one input line. Blank lines are `None`.
pub fn parse(line: &str) -> Result<Option<Command>, DebuggerError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let command = match name.to_ascii_lowercase().as_str() {
        "s" | "step" => Command::Step(parse_count(arg, 1)?),
        "c" | "continue" => Command::Continue,
        "f" | "frame" => Command::Frame,
        "b" | "break" => {
            let addr = arg.ok_or(DebuggerError::MissingAddress("break"))?;
            Command::Break(parse_addr(addr)?)
        }
        "d" | "delete" => {
            let addr = arg.ok_or(DebuggerError::MissingAddress("delete"))?;
            Command::Delete(parse_addr(addr)?)
        }
        "l" | "list" => Command::List,
        "r" | "regs" => Command::Registers,
        "m" | "mem" => Command::Memory {
            addr: parse_addr(arg.ok_or(DebuggerError::MissingAddress("mem"))?)?,
            len: parse_count(words.next(), DEFAULT_DUMP_LEN)?,
        },
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        other => return Err(DebuggerError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

fn format_flags(status: u8) -> String {
    "NV-BDIZC"
        .chars()
        .enumerate()
        .map(|(i, c)| if status & (0x80 >> i) != 0 { c } else { '.' })
        .collect()
}

pub fn format_registers(regs: &Cpu6502State, beam: (u16, u16)) -> String {
    format!(
        "PC={:04X} A={:02X} X={:02X} Y={:02X} SP={:02X} P={:02X} [{}] cyc={}{} beam=({},{})",
        regs.pc,
        regs.a,
        regs.x,
        regs.y,
        regs.sp,
        regs.status,
        format_flags(regs.status),
        regs.cycles,
        if regs.halted { " WSYNC" } else { "" },
        beam.0,
        beam.1
    )
}

/// One instruction at `pc`, e.g. `F003  D0 FD     BNE $F002`
pub fn disassemble(sys: &Atari2600System, pc: u16) -> String {
    let opcode = sys.peek(pc);
    let entry = OPCODES[opcode as usize];
    let len = entry.mode.operand_len();
    let lo = sys.peek(pc.wrapping_add(1));
    let hi = sys.peek(pc.wrapping_add(2));
    let word = u16::from_le_bytes([lo, hi]);

    let bytes = match len {
        0 => format!("{:02X}", opcode),
        1 => format!("{:02X} {:02X}", opcode, lo),
        _ => format!("{:02X} {:02X} {:02X}", opcode, lo, hi),
    };
    let operand = match entry.mode {
        AddrMode::Implied => String::new(),
        AddrMode::Accumulator => " A".to_string(),
        AddrMode::Immediate => format!(" #${:02X}", lo),
        AddrMode::ZeroPage => format!(" ${:02X}", lo),
        AddrMode::ZeroPageX => format!(" ${:02X},X", lo),
        AddrMode::ZeroPageY => format!(" ${:02X},Y", lo),
        AddrMode::Absolute => format!(" ${:04X}", word),
        AddrMode::AbsoluteX => format!(" ${:04X},X", word),
        AddrMode::AbsoluteY => format!(" ${:04X},Y", word),
        AddrMode::Indirect => format!(" (${:04X})", word),
        AddrMode::IndirectX => format!(" (${:02X},X)", lo),
        AddrMode::IndirectY => format!(" (${:02X}),Y", lo),
        AddrMode::Relative => {
            let target = pc.wrapping_add(2).wrapping_add(lo as i8 as u16);
            format!(" ${:04X}", target)
        }
    };
    format!("{:04X}  {:<8}  {}{}", pc, bytes, entry.operation.mnemonic(), operand)
}

fn show_state<W: Write>(sys: &Atari2600System, out: &mut W) -> io::Result<()> {
    let regs = sys.registers();
    writeln!(out, "{}", format_registers(&regs, sys.beam()))?;
    writeln!(out, "{}", disassemble(sys, regs.pc))
}

#[derive(Debug, Default)]
pub struct Debugger {
    breakpoints: BTreeSet<u16>,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_breakpoint(&mut self, addr: u16) {
        self.breakpoints.insert(addr & ADDRESS_MASK);
    }

    pub fn remove_breakpoint(&mut self, addr: u16) -> bool {
        self.breakpoints.remove(&(addr & ADDRESS_MASK))
    }

    pub fn is_breakpoint(&self, pc: u16) -> bool {
        self.breakpoints.contains(&(pc & ADDRESS_MASK))
    }

    /// Run one command. Returns false when the session should end.
    pub fn execute<W: Write>(
        &mut self,
        sys: &mut Atari2600System,
        command: Command,
        out: &mut W,
    ) -> io::Result<bool> {
        match command {
            Command::Step(n) => {
                for _ in 0..n {
                    sys.step_instruction();
                }
                show_state(sys, out)?;
            }
            Command::Continue => {
                let breakpoints = &self.breakpoints;
                let stop = |pc: u16| breakpoints.contains(&(pc & ADDRESS_MASK));
                match sys.run_until(stop, CONTINUE_LIMIT) {
                    Some(pc) => writeln!(out, "breakpoint at {:04X}", pc)?,
                    None => {
                        writeln!(out, "no breakpoint hit after {} instructions", CONTINUE_LIMIT)?
                    }
                }
                show_state(sys, out)?;
            }
            Command::Frame => {
                let start = sys.frame_count();
                let mut hit = None;
                for _ in 0..CONTINUE_LIMIT {
                    if sys.step_instruction().frame_complete {
                        break;
                    }
                    let regs = sys.registers();
                    if !regs.halted && self.is_breakpoint(regs.pc) {
                        hit = Some(regs.pc);
                        break;
                    }
                }
                match hit {
                    Some(pc) => writeln!(out, "breakpoint at {:04X}", pc)?,
                    None if sys.frame_count() > start => {
                        writeln!(out, "frame {} complete", sys.frame_count())?
                    }
                    None => writeln!(out, "no frame after {} instructions", CONTINUE_LIMIT)?,
                }
            }
            Command::Break(addr) => {
                self.add_breakpoint(addr);
                writeln!(out, "breakpoint set at {:04X}", addr & ADDRESS_MASK)?;
            }
            Command::Delete(addr) => {
                if self.remove_breakpoint(addr) {
                    writeln!(out, "breakpoint at {:04X} removed", addr & ADDRESS_MASK)?;
                } else {
                    writeln!(out, "no breakpoint at {:04X}", addr & ADDRESS_MASK)?;
                }
            }
            Command::List => {
                if self.breakpoints.is_empty() {
                    writeln!(out, "no breakpoints")?;
                }
                for addr in &self.breakpoints {
                    writeln!(out, "  {:04X}", addr)?;
                }
            }
            Command::Registers => show_state(sys, out)?,
            Command::Memory { addr, len } => {
                for row in (0..len).step_by(16) {
                    let base = addr.wrapping_add(row);
                    let bytes: Vec<String> = (0..16.min(len - row))
                        .map(|i| format!("{:02X}", sys.peek(base.wrapping_add(i))))
                        .collect();
                    writeln!(out, "{:04X}: {}", base, bytes.join(" "))?;
                }
            }
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Read commands until `quit` or end of input. Bad commands are reported
    /// and the session continues.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        sys: &mut Atari2600System,
        input: R,
        mut out: W,
    ) -> io::Result<()> {
        show_state(sys, &mut out)?;
        write!(out, "> ")?;
        out.flush()?;

        for line in input.lines() {
            let line = line?;
            match parse(&line) {
                Ok(Some(command)) => {
                    if !self.execute(sys, command, &mut out)? {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(e) => writeln!(out, "error: {}", e)?,
            }
            write!(out, "> ")?;
            out.flush()?;
        }
        Ok(())
    }
}
