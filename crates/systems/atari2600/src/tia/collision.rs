//! Which collision latch records a meeting of two objects.

use crate::frame::ObjectTag;
use crate::registers::tia::{CXBLPF, CXM0FB, CXM0P, CXM1FB, CXM1P, CXP0FB, CXP1FB, CXPPMM};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionBit {
    pub register: u8,
    pub mask: u8,
}

const fn bit(register: u8, mask: u8) -> Option<CollisionBit> {
    Some(CollisionBit { register, mask })
}

/// Latch for `a` meeting `b`, in either order. The background never collides.
pub fn between(a: ObjectTag, b: ObjectTag) -> Option<CollisionBit> {
    use ObjectTag::*;

    // Order the pair so each meeting has a single arm below
    let (lo, hi) = if a.rank() <= b.rank() { (a, b) } else { (b, a) };

    match (lo, hi) {
        (Player1, Missile0) => bit(CXM0P, 0x80),
        (Missile0, Player0) => bit(CXM0P, 0x40),
        (Missile1, Player0) => bit(CXM1P, 0x80),
        (Missile1, Player1) => bit(CXM1P, 0x40),
        (Playfield, Player0) => bit(CXP0FB, 0x80),
        (Ball, Player0) => bit(CXP0FB, 0x40),
        (Playfield, Player1) => bit(CXP1FB, 0x80),
        (Ball, Player1) => bit(CXP1FB, 0x40),
        (Playfield, Missile0) => bit(CXM0FB, 0x80),
        (Ball, Missile0) => bit(CXM0FB, 0x40),
        (Playfield, Missile1) => bit(CXM1FB, 0x80),
        (Ball, Missile1) => bit(CXM1FB, 0x40),
        (Playfield, Ball) => bit(CXBLPF, 0x80),
        (Player1, Player0) => bit(CXPPMM, 0x80),
        (Missile1, Missile0) => bit(CXPPMM, 0x40),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ObjectTag::*;

    const OBJECTS: [ObjectTag; 6] = [Playfield, Ball, Missile1, Player1, Missile0, Player0];

    #[test]
    fn every_object_pair_has_a_distinct_latch() {
        let mut seen = Vec::new();
        for (i, &a) in OBJECTS.iter().enumerate() {
            for &b in &OBJECTS[i + 1..] {
                let latch = between(a, b).unwrap_or_else(|| panic!("{:?}/{:?}", a, b));
                assert!(!seen.contains(&latch), "{:?}/{:?} reuses a latch", a, b);
                seen.push(latch);
            }
        }
        assert_eq!(seen.len(), 15);
    }

    #[test]
    fn order_does_not_matter() {
        for &a in &OBJECTS {
            for &b in &OBJECTS {
                assert_eq!(between(a, b), between(b, a));
            }
        }
    }

    #[test]
    fn background_and_self_never_collide() {
        for &a in &OBJECTS {
            assert_eq!(between(Background, a), None);
            assert_eq!(between(a, a), None);
        }
    }

    #[test]
    fn player_pair_and_missile_pair_share_cxppmm() {
        assert_eq!(between(Player0, Player1), bit(CXPPMM, 0x80));
        assert_eq!(between(Missile0, Missile1), bit(CXPPMM, 0x40));
        assert_eq!(between(Missile0, Player0), bit(CXM0P, 0x40));
    }
}
