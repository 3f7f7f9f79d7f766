//! Playfield bit lookup.
//!
//! The 20-bit playfield (PF0 bits 4-7, PF1 bits 7-0, PF2 bits 0-7) covers
//! 80 colour clocks per half line, four clocks per bit. The right half
//! repeats the left one, or mirrors it when CTRLPF bit 0 is set.

use crate::registers::tia::{PF0, PF1, PF2};

use super::{HBLANK_CLOCKS, LINE_CLOCKS};

const HALF_WIDTH: u16 = 80;
const CLOCKS_PER_BIT: u16 = 4;

/// Bit numbers in draw order for a normal half line
const NORMAL_ORDER: [u8; 20] = [4, 5, 6, 7, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7];
/// Bit numbers in draw order for a reflected right half
const MIRRORED_ORDER: [u8; 20] = [7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 7, 6, 5, 4];

/// Where a colour clock finds its playfield bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayfieldBit {
    pub register: u8,
    pub mask: u8,
    pub left_half: bool,
}

/// Playfield bit for horizontal position `h`, or `None` during horizontal blank.
pub fn locate(h: u16, reflect: bool) -> Option<PlayfieldBit> {
    if !(HBLANK_CLOCKS..LINE_CLOCKS).contains(&h) {
        return None;
    }
    let offset = h - HBLANK_CLOCKS;
    let left_half = offset < HALF_WIDTH;
    let x = offset % HALF_WIDTH;
    let slot = (x / CLOCKS_PER_BIT) as usize;

    let (register, bit) = if left_half || !reflect {
        let register = match slot {
            0..=3 => PF0,
            4..=11 => PF1,
            _ => PF2,
        };
        (register, NORMAL_ORDER[slot])
    } else {
        let register = match slot {
            0..=7 => PF2,
            8..=15 => PF1,
            _ => PF0,
        };
        (register, MIRRORED_ORDER[slot])
    };

    Some(PlayfieldBit {
        register,
        mask: 1 << bit,
        left_half,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hblank_has_no_playfield() {
        assert_eq!(locate(0, false), None);
        assert_eq!(locate(67, true), None);
        assert_eq!(locate(228, false), None);
    }

    #[test]
    fn left_half_order() {
        let first = locate(68, false).unwrap();
        assert_eq!((first.register, first.mask, first.left_half), (PF0, 0x10, true));
        assert_eq!(locate(83, false).unwrap().mask, 0x80);
        let pf1 = locate(84, false).unwrap();
        assert_eq!((pf1.register, pf1.mask), (PF1, 0x80));
        assert_eq!(locate(115, false).unwrap().mask, 0x01);
        let pf2 = locate(116, false).unwrap();
        assert_eq!((pf2.register, pf2.mask), (PF2, 0x01));
        assert_eq!(locate(147, false).unwrap().mask, 0x80);
    }

    #[test]
    fn right_half_repeats_without_reflect() {
        for h in 68..148 {
            let left = locate(h, false).unwrap();
            let right = locate(h + 80, false).unwrap();
            assert!(!right.left_half);
            assert_eq!((left.register, left.mask), (right.register, right.mask));
        }
    }

    #[test]
    fn right_half_mirrors_with_reflect() {
        for h in 148..228 {
            let right = locate(h, true).unwrap();
            let left = locate(68 + (227 - h), false).unwrap();
            assert_eq!(
                (right.register, right.mask),
                (left.register, left.mask),
                "h={}",
                h
            );
        }
        let start = locate(148, true).unwrap();
        assert_eq!((start.register, start.mask), (PF2, 0x80));
        let end = locate(227, true).unwrap();
        assert_eq!((end.register, end.mask), (PF0, 0x10));
    }

    #[test]
    fn left_half_ignores_reflect() {
        for h in 68..148 {
            assert_eq!(locate(h, true), locate(h, false));
        }
    }
}
