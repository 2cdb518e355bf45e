use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rob_tomasulo_sim::engine::EngineConfig;
use rob_tomasulo_sim::{Engine, Program, Seed};

fn straight_line_trace() -> String {
    "ADD R3, R1, R2\n\
     SUB R4, R3, R1\n\
     MUL R5, R4, R2\n\
     DIV R6, R5, R1\n\
     LW R7, R0, 108\n\
     SW R7, R0, 200\n"
        .to_string()
}

fn branchy_trace() -> String {
    let mut trace = String::new();
    for _ in 0..8 {
        trace.push_str("ADD R3, R1, R2\n");
        trace.push_str("SUB R3, R3, R2\n");
        trace.push_str("BEQ R3, R0, 0\n");
        trace.push_str("ADD R5, R1, R2\n");
    }
    trace
}

fn engine_tick_benchmark(c: &mut Criterion) {
    let trace = straight_line_trace();

    c.bench_function("engine_tick_straight_line", |b| {
        b.iter(|| {
            let program = Program::parse(&trace);
            let mut engine = Engine::new(EngineConfig::default(), program, Seed::default_contract()).unwrap();
            while !engine.is_finished() {
                engine.tick();
            }
            black_box(engine.metrics());
        });
    });
}

fn engine_branch_recovery_benchmark(c: &mut Criterion) {
    let trace = branchy_trace();

    c.bench_function("engine_mispredict_recovery", |b| {
        b.iter(|| {
            let program = Program::parse(&trace);
            let mut engine = Engine::new(EngineConfig::default(), program, Seed::default_contract()).unwrap();
            for _ in 0..500 {
                if engine.is_finished() {
                    break;
                }
                engine.tick();
            }
            black_box(engine.metrics());
        });
    });
}

fn trace_parse_benchmark(c: &mut Criterion) {
    let trace = branchy_trace();

    c.bench_function("trace_parse", |b| {
        b.iter(|| {
            black_box(Program::parse(&trace));
        });
    });
}

fn step_back_benchmark(c: &mut Criterion) {
    let trace = straight_line_trace();

    c.bench_function("engine_tick_then_step_back", |b| {
        let program = Program::parse(&trace);
        let mut engine = Engine::new(EngineConfig::default(), program, Seed::default_contract()).unwrap();

        b.iter(|| {
            engine.tick();
            black_box(engine.step_back());
        });
    });
}

criterion_group!(
    benches,
    engine_tick_benchmark,
    engine_branch_recovery_benchmark,
    trace_parse_benchmark,
    step_back_benchmark,
);
criterion_main!(benches);
