use rob_tomasulo_sim::engine::EngineConfig;
use rob_tomasulo_sim::{Engine, Program, Seed};

fn run(trace: &str, seed: Seed) -> Engine {
    let program = Program::parse(trace);
    let mut engine = Engine::new(EngineConfig::default(), program, seed).unwrap();
    while !engine.is_finished() && engine.metrics().total_cycles < 10_000 {
        engine.tick();
    }
    engine
}

#[test]
fn straight_line_arithmetic() {
    let engine = run("ADD R3, R1, R2\nSUB R4, R3, R1\n", Seed::default_contract());
    assert_eq!(engine.state().regfile.read("R3"), 10);
    assert_eq!(engine.state().regfile.read("R4"), 5);
    assert_eq!(engine.metrics().committed_instructions, 2);
    assert!(engine.state().rob.is_empty());
}

#[test]
fn raw_dependency_stall_and_forward() {
    let engine = run("MUL R3, R1, R2\nADD R4, R3, R1\n", Seed::default_contract());
    assert_eq!(engine.state().regfile.read("R3"), 25);
    assert_eq!(engine.state().regfile.read("R4"), 30);
}

#[test]
fn load_then_dependent_add() {
    let engine = run("LW R3, R0, 108\nADD R4, R3, R1\n", Seed::default_contract());
    assert_eq!(engine.state().regfile.read("R3"), 5);
    assert_eq!(engine.state().regfile.read("R4"), 10);
}

#[test]
fn correctly_predicted_not_taken_branch() {
    let trace = "ADD R3, R1, R2\nBEQ R3, R0, 7\nADD R5, R1, R2\n";
    let engine = run(trace, Seed::default_contract());
    assert_eq!(engine.state().regfile.read("R5"), 10);
    assert_eq!(engine.metrics().committed_instructions, 3);
}

#[test]
fn mispredicted_taken_branch_flushes_younger_instructions() {
    // BEQ R0, R0 always evaluates taken, which disagrees with the static
    // not-taken predictor: idx5 and idx6 are issued speculatively past the
    // branch and must be flushed when the misprediction is caught at commit.
    let trace = "ADD R3, R1, R2\n\
                 SUB R4, R3, R1\n\
                 SUB R3, R3, R2\n\
                 ADD R4, R3, R0\n\
                 BEQ R0, R0, 7\n\
                 ADD R5, R1, R2\n\
                 MUL R5, R5, R0\n\
                 SUB R5, R1, R0\n\
                 DIV R6, R1, R2\n";
    let engine = run(trace, Seed::default_contract());

    assert_eq!(engine.state().regfile.read("R5"), 5);
    assert_eq!(engine.state().regfile.read("R6"), 1);
    assert_eq!(engine.metrics().committed_instructions, 7);
    assert!(engine.metrics().bubble_cycles >= 1);
    assert!(engine.state().rob.is_empty());
}

#[test]
fn divide_by_zero_commits_a_sentinel_without_aborting() {
    let engine = run("DIV R3, R1, R0\n", Seed::default_contract());
    assert_eq!(engine.metrics().committed_instructions, 1);
    let retired = &engine.state().retired;
    assert_eq!(retired.len(), 1);
    assert!(matches!(retired[0].opcode, rob_tomasulo_sim::decode::Opcode::Div));
    // The div-by-zero sentinel carries no numeric value; register writeback
    // of a sentinel forwards as 0 (see `forward_raw`).
    assert_eq!(engine.state().regfile.read("R3"), 0);
}

#[test]
fn rob_occupancy_equals_busy_entry_count_after_every_tick() {
    let trace = "ADD R3, R1, R2\nMUL R4, R3, R1\nSUB R5, R4, R1\nDIV R6, R5, R2\n";
    let program = Program::parse(trace);
    let mut engine = Engine::new(EngineConfig::default(), program, Seed::default_contract()).unwrap();
    for _ in 0..200 {
        if engine.is_finished() {
            break;
        }
        engine.tick();
        let rob = &engine.state().rob;
        let busy_count = rob.entries.iter().filter(|e| e.busy).count();
        assert_eq!(rob.occupancy, busy_count);
    }
}

#[test]
fn tick_then_step_back_restores_identical_state() {
    let trace = "ADD R3, R1, R2\nSUB R4, R3, R1\n";
    let program = Program::parse(trace);
    let mut engine = Engine::new(EngineConfig::default(), program, Seed::default_contract()).unwrap();

    let before = format!("{:?}", engine.state());
    engine.tick();
    assert!(engine.step_back());
    let after = format!("{:?}", engine.state());
    assert_eq!(before, after);
}

#[test]
fn deterministic_given_identical_trace_and_seed() {
    let trace = "MUL R3, R1, R2\nADD R4, R3, R1\nLW R5, R0, 108\n";
    let a = run(trace, Seed::default_contract());
    let b = run(trace, Seed::default_contract());

    assert_eq!(a.metrics(), b.metrics());
    assert_eq!(a.state().regfile.read("R3"), b.state().regfile.read("R3"));
    assert_eq!(a.state().regfile.read("R4"), b.state().regfile.read("R4"));
    assert_eq!(a.state().regfile.read("R5"), b.state().regfile.read("R5"));
}

#[test]
fn zero_register_is_never_disturbed_by_a_program() {
    let trace = "ADD R0, R1, R2\nADD R3, R0, R1\n";
    let engine = run(trace, Seed::default_contract());
    assert_eq!(engine.state().regfile.read("R0"), 0);
    assert_eq!(engine.state().regfile.read("R3"), 5);
}

#[test]
fn seed_file_overrides_the_default_contract() {
    let seed = Seed::parse("reg R1 100\nmem 108 7\n");
    let engine = run("LW R3, R0, 108\nADD R4, R3, R1\n", seed);
    assert_eq!(engine.state().regfile.read("R3"), 7);
    assert_eq!(engine.state().regfile.read("R4"), 107);
}
