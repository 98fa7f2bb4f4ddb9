//! Benchmarks for the matching pipeline.
//!
//! Measures the three hot stages over synthetic method bodies:
//! - Feature extraction (sequential and parallel)
//! - CFG construction plus dominator analysis
//! - Scoring and assignment over a method population

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use symscope::analysis::{DominatorTree, ReducedCfg};
use symscope::assembly::{CallRef, FlowType, Instruction, MethodBody, Operand};
use symscope::corpus::WeightStore;
use symscope::features::{extract, extract_all, NormalizeOptions};
use symscope::matching::Pipeline;

/// Builds a synthetic body with branches, a loop and a few call sites.
fn synthetic_body(owner: &str, name: &str, size: usize) -> MethodBody {
    let mut instructions = Vec::with_capacity(size);
    for i in 0..size {
        let insn = match i % 7 {
            0 => Instruction {
                opcode: 0x99,
                operand: Operand::Jump((i + 3).min(size - 1)),
                flow: FlowType::ConditionalBranch,
            },
            3 => Instruction {
                opcode: 0xB6,
                operand: Operand::Call(CallRef {
                    owner: format!("app/C{}", i % 5),
                    name: format!("m{}", i % 11),
                    descriptor: "()V".to_string(),
                }),
                flow: FlowType::Sequential,
            },
            5 if i > 4 => Instruction {
                opcode: 0xA7,
                operand: Operand::Jump(i - 4),
                flow: FlowType::UnconditionalBranch,
            },
            _ => Instruction::simple((i % 200) as u8),
        };
        instructions.push(insn);
    }
    instructions.push(Instruction {
        opcode: 0xB1,
        operand: Operand::None,
        flow: FlowType::Return,
    });
    MethodBody {
        instructions,
        ..MethodBody::new(owner, name, "()V")
    }
}

fn bench_extraction(c: &mut Criterion) {
    let body = synthetic_body("app/Main", "run", 200);
    let options = NormalizeOptions::default();

    let mut group = c.benchmark_group("extract");
    group.throughput(Throughput::Elements(1));
    group.bench_function("single_method_200_insns", |b| {
        b.iter(|| black_box(extract(black_box(&body), &options)));
    });
    group.finish();

    let bodies: Vec<MethodBody> = (0..256)
        .map(|i| synthetic_body("app/Main", &format!("m{i}"), 100))
        .collect();
    let mut group = c.benchmark_group("extract_all");
    group.throughput(Throughput::Elements(bodies.len() as u64));
    group.bench_function("parallel_256_methods", |b| {
        b.iter(|| black_box(extract_all(black_box(&bodies), &options)));
    });
    group.finish();
}

fn bench_cfg_and_dominators(c: &mut Criterion) {
    let body = synthetic_body("app/Main", "run", 500);

    let mut group = c.benchmark_group("cfg");
    group.bench_function("build_500_insns", |b| {
        b.iter(|| black_box(ReducedCfg::build(black_box(&body))));
    });
    group.finish();

    let cfg = ReducedCfg::build(&body);
    let mut group = c.benchmark_group("dominators");
    group.bench_function("compute_500_insns", |b| {
        b.iter(|| black_box(DominatorTree::compute(black_box(&cfg))));
    });
    group.finish();
}

fn bench_matching(c: &mut Criterion) {
    let options = NormalizeOptions::default();
    let old_bodies: Vec<MethodBody> = (0..64)
        .map(|i| synthetic_body("obf/A", &format!("m{i}"), 50 + i))
        .collect();
    let new_bodies: Vec<MethodBody> = (0..64)
        .map(|i| synthetic_body("clean/A", &format!("name{i}"), 50 + i))
        .collect();
    let old = extract_all(&old_bodies, &options);
    let new = extract_all(&new_bodies, &options);
    let weights = WeightStore::new();

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements((old.len() * new.len()) as u64));
    group.bench_function("score_and_assign_64x64", |b| {
        b.iter(|| black_box(Pipeline::new(&weights).run(black_box(&old), black_box(&new))));
    });
    group.finish();
}

criterion_group!(benches, bench_extraction, bench_cfg_and_dominators, bench_matching);
criterion_main!(benches);
