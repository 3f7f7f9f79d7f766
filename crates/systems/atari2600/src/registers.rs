//! Register offsets for the TIA and the RIOT I/O block.
//!
//! TIA offsets are what the bus passes after masking with 0x3F. RIOT I/O
//! offsets are relative to the I/O block (address & 0x1F for reads,
//! address & 0x7F for writes).

/// TIA write strobes and registers
pub mod tia {
    pub const VSYNC: u8 = 0x00;
    pub const VBLANK: u8 = 0x01;
    pub const WSYNC: u8 = 0x02;
    pub const RSYNC: u8 = 0x03;
    pub const NUSIZ0: u8 = 0x04;
    pub const NUSIZ1: u8 = 0x05;
    pub const COLUP0: u8 = 0x06;
    pub const COLUP1: u8 = 0x07;
    pub const COLUPF: u8 = 0x08;
    pub const COLUBK: u8 = 0x09;
    pub const CTRLPF: u8 = 0x0A;
    pub const REFP0: u8 = 0x0B;
    pub const REFP1: u8 = 0x0C;
    pub const PF0: u8 = 0x0D;
    pub const PF1: u8 = 0x0E;
    pub const PF2: u8 = 0x0F;
    pub const RESP0: u8 = 0x10;
    pub const RESP1: u8 = 0x11;
    pub const RESM0: u8 = 0x12;
    pub const RESM1: u8 = 0x13;
    pub const RESBL: u8 = 0x14;
    pub const AUDC0: u8 = 0x15;
    pub const AUDC1: u8 = 0x16;
    pub const AUDF0: u8 = 0x17;
    pub const AUDF1: u8 = 0x18;
    pub const AUDV0: u8 = 0x19;
    pub const AUDV1: u8 = 0x1A;
    pub const GRP0: u8 = 0x1B;
    pub const GRP1: u8 = 0x1C;
    pub const ENAM0: u8 = 0x1D;
    pub const ENAM1: u8 = 0x1E;
    pub const ENABL: u8 = 0x1F;
    pub const HMP0: u8 = 0x20;
    pub const HMP1: u8 = 0x21;
    pub const HMM0: u8 = 0x22;
    pub const HMM1: u8 = 0x23;
    pub const HMBL: u8 = 0x24;
    pub const VDELP0: u8 = 0x25;
    pub const VDELP1: u8 = 0x26;
    pub const VDELBL: u8 = 0x27;
    pub const RESMP0: u8 = 0x28;
    pub const RESMP1: u8 = 0x29;
    pub const HMOVE: u8 = 0x2A;
    pub const HMCLR: u8 = 0x2B;
    pub const CXCLR: u8 = 0x2C;

    // Collision latches and input ports
    pub const CXM0P: u8 = 0x30;
    pub const CXM1P: u8 = 0x31;
    pub const CXP0FB: u8 = 0x32;
    pub const CXP1FB: u8 = 0x33;
    pub const CXM0FB: u8 = 0x34;
    pub const CXM1FB: u8 = 0x35;
    pub const CXBLPF: u8 = 0x36;
    pub const CXPPMM: u8 = 0x37;
    pub const INPT0: u8 = 0x38;
    pub const INPT1: u8 = 0x39;
    pub const INPT2: u8 = 0x3A;
    pub const INPT3: u8 = 0x3B;
    pub const INPT4: u8 = 0x3C;
    pub const INPT5: u8 = 0x3D;
}

/// RIOT I/O and timer registers
pub mod riot {
    pub const SWCHA: u8 = 0x00;
    pub const SWACNT: u8 = 0x01;
    pub const SWCHB: u8 = 0x02;
    pub const SWBCNT: u8 = 0x03;
    pub const INTIM: u8 = 0x04;
    pub const INSTAT: u8 = 0x05;
    pub const TIM1T: u8 = 0x14;
    pub const TIM8T: u8 = 0x15;
    pub const TIM64T: u8 = 0x16;
    pub const T1024T: u8 = 0x17;

    /// Bus address of the I/O block (bit 7 and bit 9 set)
    pub const IO_BASE: u16 = 0x0280;
}

/// Console switch bits in SWCHB
pub mod switches {
    pub const RESET: u8 = 0;
    pub const SELECT: u8 = 1;
    pub const COLOR: u8 = 3;
    pub const P0_DIFFICULTY: u8 = 6;
    pub const P1_DIFFICULTY: u8 = 7;
}

const TIA_NAMES: [(&str, u8); 59] = [
    ("VSYNC", tia::VSYNC),
    ("VBLANK", tia::VBLANK),
    ("WSYNC", tia::WSYNC),
    ("RSYNC", tia::RSYNC),
    ("NUSIZ0", tia::NUSIZ0),
    ("NUSIZ1", tia::NUSIZ1),
    ("COLUP0", tia::COLUP0),
    ("COLUP1", tia::COLUP1),
    ("COLUPF", tia::COLUPF),
    ("COLUBK", tia::COLUBK),
    ("CTRLPF", tia::CTRLPF),
    ("REFP0", tia::REFP0),
    ("REFP1", tia::REFP1),
    ("PF0", tia::PF0),
    ("PF1", tia::PF1),
    ("PF2", tia::PF2),
    ("RESP0", tia::RESP0),
    ("RESP1", tia::RESP1),
    ("RESM0", tia::RESM0),
    ("RESM1", tia::RESM1),
    ("RESBL", tia::RESBL),
    ("AUDC0", tia::AUDC0),
    ("AUDC1", tia::AUDC1),
    ("AUDF0", tia::AUDF0),
    ("AUDF1", tia::AUDF1),
    ("AUDV0", tia::AUDV0),
    ("AUDV1", tia::AUDV1),
    ("GRP0", tia::GRP0),
    ("GRP1", tia::GRP1),
    ("ENAM0", tia::ENAM0),
    ("ENAM1", tia::ENAM1),
    ("ENABL", tia::ENABL),
    ("HMP0", tia::HMP0),
    ("HMP1", tia::HMP1),
    ("HMM0", tia::HMM0),
    ("HMM1", tia::HMM1),
    ("HMBL", tia::HMBL),
    ("VDELP0", tia::VDELP0),
    ("VDELP1", tia::VDELP1),
    ("VDELBL", tia::VDELBL),
    ("RESMP0", tia::RESMP0),
    ("RESMP1", tia::RESMP1),
    ("HMOVE", tia::HMOVE),
    ("HMCLR", tia::HMCLR),
    ("CXCLR", tia::CXCLR),
    ("CXM0P", tia::CXM0P),
    ("CXM1P", tia::CXM1P),
    ("CXP0FB", tia::CXP0FB),
    ("CXP1FB", tia::CXP1FB),
    ("CXM0FB", tia::CXM0FB),
    ("CXM1FB", tia::CXM1FB),
    ("CXBLPF", tia::CXBLPF),
    ("CXPPMM", tia::CXPPMM),
    ("INPT0", tia::INPT0),
    ("INPT1", tia::INPT1),
    ("INPT2", tia::INPT2),
    ("INPT3", tia::INPT3),
    ("INPT4", tia::INPT4),
    ("INPT5", tia::INPT5),
];

const RIOT_NAMES: [(&str, u8); 10] = [
    ("SWCHA", riot::SWCHA),
    ("SWACNT", riot::SWACNT),
    ("SWCHB", riot::SWCHB),
    ("SWBCNT", riot::SWBCNT),
    ("INTIM", riot::INTIM),
    ("INSTAT", riot::INSTAT),
    ("TIM1T", riot::TIM1T),
    ("TIM8T", riot::TIM8T),
    ("TIM64T", riot::TIM64T),
    ("T1024T", riot::T1024T),
];

/// Bus address for a register name, case-insensitive.
pub fn lookup(name: &str) -> Option<u16> {
    let upper = name.to_ascii_uppercase();
    if let Some(&(_, offset)) = TIA_NAMES.iter().find(|(n, _)| *n == upper) {
        return Some(offset as u16);
    }
    RIOT_NAMES
        .iter()
        .find(|(n, _)| *n == upper)
        .map(|&(_, offset)| riot::IO_BASE | offset as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_tia_and_riot_names() {
        assert_eq!(lookup("COLUBK"), Some(0x09));
        assert_eq!(lookup("cxppmm"), Some(0x37));
        assert_eq!(lookup("INTIM"), Some(0x284));
        assert_eq!(lookup("tim64t"), Some(0x296));
        assert_eq!(lookup("NOPE"), None);
    }

    #[test]
    fn names_are_unique() {
        let mut all: Vec<&str> = TIA_NAMES.iter().map(|(n, _)| *n).collect();
        all.extend(RIOT_NAMES.iter().map(|(n, _)| *n));
        let count = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), count);
    }
}
