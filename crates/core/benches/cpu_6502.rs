use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use emu_core::cpu_6502::{ArrayMemory, Cpu6502, RESET_VECTOR};

/// A tight loop touching the common addressing modes, placed at $F000
/// like a 4K cartridge.
fn kernel_loop() -> ArrayMemory {
    let mut mem = ArrayMemory::new();
    mem.load_program(
        0xF000,
        &[
            0xA2, 0x10, // LDX #$10
            0xA9, 0x42, // LDA #$42
            0x95, 0x80, // STA $80,X
            0xBD, 0xF8, 0xF0, // LDA $F0F8,X (crosses a page)
            0x65, 0x81, // ADC $81
            0xF8, // SED
            0x69, 0x19, // ADC #$19
            0xD8, // CLD
            0x26, 0x82, // ROL $82
            0xCA, // DEX
            0xD0, 0xF0, // BNE back to STA
            0x4C, 0x00, 0xF0, // JMP $F000
        ],
    );
    mem
}

fn booted() -> Cpu6502<ArrayMemory> {
    let mut cpu = Cpu6502::new(kernel_loop());
    cpu.reset();
    cpu.boot(RESET_VECTOR);
    cpu
}

fn bench_single_instruction(c: &mut Criterion) {
    c.bench_function("cpu_6502_single_instruction", |b| {
        let mut cpu = booted();
        b.iter(|| {
            black_box(cpu.step());
        });
    });
}

fn bench_instruction_runs(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_6502_runs");
    for count in [100u32, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut cpu = booted();
                for _ in 0..count {
                    cpu.step();
                }
                black_box(cpu.cycles);
            });
        });
    }
    group.finish();
}

fn bench_boot(c: &mut Criterion) {
    c.bench_function("cpu_6502_reset_and_boot", |b| {
        let mut cpu = Cpu6502::new(kernel_loop());
        b.iter(|| {
            cpu.reset();
            cpu.boot(RESET_VECTOR);
            black_box(cpu.pc);
        });
    });
}

criterion_group!(
    benches,
    bench_single_instruction,
    bench_instruction_runs,
    bench_boot
);
criterion_main!(benches);
