//! Whole-machine tests with hand-assembled cartridges

use emu_atari2600::{resolve_color, Atari2600Config, Atari2600System, Quirks};
use emu_core::System;

/// Lay `program` at $F000 in a 4K image filled with NOPs and point the
/// reset vector at it.
fn cartridge(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0xEA; 4096];
    rom[..program.len()].copy_from_slice(program);
    rom[0x7FC] = 0x00;
    rom[0x7FD] = 0xF0;
    rom
}

fn boot(program: &[u8], config: Atari2600Config) -> Atari2600System {
    let mut sys = Atari2600System::with_config(config);
    sys.mount("Cartridge", &cartridge(program))
        .expect("cartridge mounts");
    sys
}

/// Three lines of VSYNC, a blue background, then 266 lines of WSYNC so the
/// beam wraps before the next VSYNC.
const BLUE_KERNEL: &[u8] = &[
    0xA9, 0x02, // F000 LDA #$02
    0x85, 0x00, // F002 STA VSYNC
    0x85, 0x02, // F004 STA WSYNC
    0x85, 0x02, // F006 STA WSYNC
    0x85, 0x02, // F008 STA WSYNC
    0xA9, 0x00, // F00A LDA #$00
    0x85, 0x00, // F00C STA VSYNC
    0xA9, 0x84, // F00E LDA #$84
    0x85, 0x09, // F010 STA COLUBK
    0xA2, 0x00, // F012 LDX #$00
    0x85, 0x02, // F014 STA WSYNC
    0xCA, //       F016 DEX
    0xD0, 0xFB, // F017 BNE $F014
    0xA2, 0x0A, // F019 LDX #$0A
    0x85, 0x02, // F01B STA WSYNC
    0xCA, //       F01D DEX
    0xD0, 0xFB, // F01E BNE $F01B
    0x4C, 0x00, 0xF0, // F020 JMP $F000
];

#[test]
fn kernel_draws_background_below_vsync() {
    let mut sys = boot(BLUE_KERNEL, Atari2600Config::default());
    let frame = sys.step_frame().expect("frame");

    let blue = 0xFF00_0000 | resolve_color(0x84, true);
    assert_eq!(frame.pixel(100, 50), Some(blue));
    assert_eq!(frame.pixel(227, 200), Some(blue));
    // Horizontal blank and the VSYNC lines stay black
    assert_eq!(frame.pixel(10, 50), Some(0xFF00_0000));
    assert_eq!(frame.pixel(100, 1), Some(0xFF00_0000));
}

#[test]
fn black_and_white_switch_greys_the_picture() {
    let mut sys = boot(
        BLUE_KERNEL,
        Atari2600Config {
            color_mode: false,
            ..Atari2600Config::default()
        },
    );
    let frame = sys.step_frame().expect("frame");
    let grey = 0xFF00_0000 | resolve_color(0x84, false);
    assert_eq!(frame.pixel(100, 50), Some(grey));
}

#[test]
fn frames_are_deterministic_across_save_states() {
    let mut sys = boot(BLUE_KERNEL, Atari2600Config::default());
    sys.step_frame().expect("frame");
    let state = sys.save_state();
    let expected = sys.step_frame().expect("frame");

    let mut restored = boot(BLUE_KERNEL, Atari2600Config::default());
    restored.load_state(&state).expect("state loads");
    let replayed = restored.step_frame().expect("frame");

    assert_eq!(replayed.pixels, expected.pixels);
    assert_eq!(restored.registers(), sys.registers());
}

#[test]
fn timer_wait_loop_exits_after_interval() {
    let program = [
        0xA9, 0x0A, //       F000 LDA #10
        0x8D, 0x96, 0x02, // F002 STA TIM64T
        0xAD, 0x84, 0x02, // F005 LDA INTIM
        0xD0, 0xFB, //       F008 BNE $F005
        0xA9, 0xFF, //       F00A LDA #$FF
        0x85, 0x80, //       F00C STA $80
        0x4C, 0x0E, 0xF0, // F00E JMP $F00E
    ];
    let mut sys = boot(&program, Atari2600Config::default());

    let stopped = sys.run_until(|pc| pc == 0xF00E, 1_000);
    assert_eq!(stopped, Some(0xF00E));
    assert_eq!(sys.peek(0x80), 0xFF);
    // Loaded with 10, ticked once on the write, then 9 intervals of 64
    let cycles = sys.cycles();
    assert!((6 + 64 * 9..6 + 64 * 10).contains(&cycles), "{} cycles", cycles);
}

/// Double-width player 0 and missile 0 strobed 9 clocks apart on the same
/// line, then CXM0P copied to $80.
const OVERLAP_PROGRAM: &[u8] = &[
    0xA9, 0x05, // F000 LDA #$05
    0x85, 0x04, // F002 STA NUSIZ0
    0xA9, 0xFF, // F004 LDA #$FF
    0x85, 0x1B, // F006 STA GRP0
    0xA9, 0x02, // F008 LDA #$02
    0x85, 0x1D, // F00A STA ENAM0
    0x85, 0x02, // F00C STA WSYNC
    0xEA, 0xEA, 0xEA, 0xEA, 0xEA, 0xEA, // F00E NOP x12
    0xEA, 0xEA, 0xEA, 0xEA, 0xEA, 0xEA, //
    0x85, 0x10, // F01A STA RESP0
    0x85, 0x12, // F01C STA RESM0
    0xEA, //       F01E NOP
    0xA5, 0x30, // F01F LDA CXM0P
    0x85, 0x80, // F021 STA $80
    0x4C, 0x23, 0xF0, // F023 JMP $F023
];

#[test]
fn missile_over_player_sets_collision_latch() {
    let mut sys = boot(OVERLAP_PROGRAM, Atari2600Config::default());
    assert_eq!(sys.run_until(|pc| pc == 0xF023, 1_000), Some(0xF023));
    assert_eq!(sys.peek(0x80) & 0x40, 0x40);
    assert_eq!(sys.peek(0x30) & 0x40, 0x40);
}

#[test]
fn missile0_latch_quirk_hides_missile0() {
    let config = Atari2600Config {
        quirks: Quirks {
            missile0_uses_missile1_latch: true,
            ..Quirks::default()
        },
        ..Atari2600Config::default()
    };
    let mut sys = boot(OVERLAP_PROGRAM, config);
    assert_eq!(sys.run_until(|pc| pc == 0xF023, 1_000), Some(0xF023));
    assert_eq!(sys.peek(0x80) & 0x40, 0x00);
}

#[test]
fn ora_addressing_follows_quirk_setting() {
    let program = [
        0xA9, 0x00, // F000 LDA #$00
        0x05, 0x80, // F002 ORA $80
        0x85, 0x81, // F004 STA $81
        0x4C, 0x06, 0xF0, // F006 JMP $F006
    ];

    let mut documented = boot(&program, Atari2600Config::default());
    documented.run_until(|pc| pc == 0xF006, 100);
    assert_eq!(documented.peek(0x81), 0x00);

    let mut quirky = boot(
        &program,
        Atari2600Config {
            quirks: Quirks {
                ora_always_immediate: true,
                ..Quirks::default()
            },
            ..Atari2600Config::default()
        },
    );
    quirky.run_until(|pc| pc == 0xF006, 100);
    assert_eq!(quirky.peek(0x81), 0x80);
}

#[test]
fn subroutine_call_stores_both_return_bytes() {
    let mut program = vec![0xEA; 0x11];
    program[..0x0D].copy_from_slice(&[
        0xA2, 0xFF, //       F000 LDX #$FF
        0x9A, //             F002 TXS
        0x20, 0x10, 0xF0, // F003 JSR $F010
        0xA9, 0x11, //       F006 LDA #$11
        0x85, 0x81, //       F008 STA $81
        0x4C, 0x0A, 0xF0, // F00A JMP $F00A
    ]);
    program[0x10] = 0x60; // F010 RTS
    let mut sys = boot(&program, Atari2600Config::default());

    for _ in 0..3 {
        sys.step_instruction();
    }
    assert_eq!(sys.registers().pc, 0xF010);
    assert_eq!(sys.peek(0x01FF), 0xF0);
    assert_eq!(sys.peek(0x01FE), 0x05);

    assert_eq!(sys.run_until(|pc| pc == 0xF00A, 100), Some(0xF00A));
    assert_eq!(sys.peek(0x81), 0x11);
    assert_eq!(sys.registers().sp, 0xFF);
}

#[test]
fn console_switches_are_readable_by_the_program() {
    let program = [
        0xAD, 0x82, 0x02, // F000 LDA SWCHB
        0x85, 0x80, //       F003 STA $80
        0x4C, 0x05, 0xF0, // F005 JMP $F005
    ];
    let mut sys = boot(&program, Atari2600Config::default());
    sys.set_console_switch(emu_atari2600::switches::RESET, true);
    sys.run_until(|pc| pc == 0xF005, 10);
    assert_eq!(sys.peek(0x80), 0x3E);
}
