//! Reduced control flow graph construction.
//!
//! The builder partitions a decoded instruction stream into basic blocks, wires successor
//! and predecessor edges (including exception edges), drops blocks unreachable from the
//! entry, and merges linear fallthrough chains. Every step keeps adjacency sorted and
//! deduplicated so that identical input always produces the identical graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::cfg::block::{sort_dedup, Block},
    assembly::{FlowType, MethodBody, Operand},
};

/// Policy for exception-handler edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ExceptionEdgePolicy {
    /// Every block intersecting a try-range gets an edge to the handler.
    #[default]
    Loose,
    /// Only blocks containing a potentially-throwing instruction (throw, call, field access)
    /// get an edge to the handler.
    Strict,
}

/// Options controlling CFG shape.
///
/// The [`fingerprint`](CfgOptions::fingerprint) string lets external cache layers detect
/// staleness; its `version` token changes whenever builder semantics change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgOptions {
    /// Exception-edge policy.
    pub exception_edges: ExceptionEdgePolicy,
    /// Whether to merge linear fallthrough chains after pruning.
    pub merge_linear_chains: bool,
}

impl Default for CfgOptions {
    fn default() -> Self {
        Self {
            exception_edges: ExceptionEdgePolicy::Loose,
            merge_linear_chains: true,
        }
    }
}

impl CfgOptions {
    /// Version token embedded in the options fingerprint. Bump on any semantic change to
    /// block partitioning, edge wiring, pruning or merging.
    pub const VERSION: u32 = 1;

    /// Flat `key=value;...` fingerprint of these options, including the stage version.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        format!(
            "exc={};merge={};version={}",
            self.exception_edges,
            self.merge_linear_chains,
            Self::VERSION
        )
    }
}

/// A reduced control flow graph over one method body.
///
/// Owns the block table; the entry is the block with the lowest id. Rebuilding from
/// identical input yields identical block and edge sets.
#[derive(Debug, Clone)]
pub struct ReducedCfg {
    blocks: BTreeMap<u32, Block>,
}

impl ReducedCfg {
    /// Builds the CFG for a method body with default options.
    #[must_use]
    pub fn build(body: &MethodBody) -> Self {
        Self::build_with(body, &CfgOptions::default())
    }

    /// Builds the CFG for a method body.
    ///
    /// Empty or malformed input (out-of-range branch targets, inverted try-ranges) degrades
    /// to an empty or partial graph; construction never fails.
    #[must_use]
    pub fn build_with(body: &MethodBody, options: &CfgOptions) -> Self {
        let mut cfg = Self {
            blocks: BTreeMap::new(),
        };
        if body.instructions.is_empty() {
            return cfg;
        }
        cfg.build_blocks(body, options);
        cfg.drop_unreachable();
        if options.merge_linear_chains {
            cfg.merge_linear_chains(body);
        }
        cfg.sort_edges();
        cfg
    }

    /// Entry block id: the lowest id in the table, `None` for an empty graph.
    #[must_use]
    pub fn entry(&self) -> Option<u32> {
        self.blocks.keys().next().copied()
    }

    /// Number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Looks up a block by id.
    #[must_use]
    pub fn block(&self, id: u32) -> Option<&Block> {
        self.blocks.get(&id)
    }

    /// Iterates blocks in ascending id order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// All block ids, ascending.
    #[must_use]
    pub fn block_ids(&self) -> Vec<u32> {
        self.blocks.keys().copied().collect()
    }

    // ---- construction ----

    fn build_blocks(&mut self, body: &MethodBody, options: &CfgOptions) {
        let insns = &body.instructions;
        let len = insns.len();

        // Leaders: first instruction, instructions after a jump/switch/terminal,
        // branch/switch targets, exception-handler entries.
        let mut is_leader = vec![false; len];
        is_leader[0] = true;
        for (i, insn) in insns.iter().enumerate() {
            match insn.flow {
                FlowType::UnconditionalBranch
                | FlowType::ConditionalBranch
                | FlowType::Switch
                | FlowType::Return
                | FlowType::Throw => {
                    if i + 1 < len {
                        is_leader[i + 1] = true;
                    }
                }
                FlowType::Sequential => {}
            }
            for target in insn.branch_targets() {
                if target < len {
                    is_leader[target] = true;
                }
            }
        }
        let mut handler_starts: BTreeSet<usize> = BTreeSet::new();
        for handler in &body.exception_table {
            if handler.handler < len {
                is_leader[handler.handler] = true;
                handler_starts.insert(handler.handler);
            }
        }

        // Partition into blocks by leader spans.
        let mut start = 0usize;
        for i in 1..=len {
            if i == len || is_leader[i] {
                let block = Block::new(start, i - 1, handler_starts.contains(&start));
                self.blocks.insert(block.id, block);
                start = i;
            }
        }

        // Control-flow successor edges.
        let ids: Vec<u32> = self.blocks.keys().copied().collect();
        for id in &ids {
            let end = self.blocks[id].end;
            let last = &insns[end];
            let mut succs: Vec<u32> = Vec::new();
            match last.flow {
                FlowType::UnconditionalBranch => {
                    if let Operand::Jump(t) = last.operand {
                        if t < len {
                            succs.push(t as u32);
                        }
                    }
                }
                FlowType::ConditionalBranch => {
                    if let Operand::Jump(t) = last.operand {
                        if t < len {
                            succs.push(t as u32);
                        }
                    }
                    if end + 1 < len {
                        succs.push((end + 1) as u32);
                    }
                }
                FlowType::Switch => {
                    for t in last.branch_targets() {
                        if t < len {
                            succs.push(t as u32);
                        }
                    }
                }
                FlowType::Return | FlowType::Throw => {}
                FlowType::Sequential => {
                    if end + 1 < len {
                        succs.push((end + 1) as u32);
                    }
                }
            }
            if let Some(block) = self.blocks.get_mut(id) {
                block.succs = succs;
            }
        }

        self.add_exception_edges(body, options);
        self.rebuild_preds();
    }

    fn add_exception_edges(&mut self, body: &MethodBody, options: &CfgOptions) {
        let len = body.instructions.len();
        for handler in &body.exception_table {
            if handler.handler >= len || handler.start >= handler.end {
                continue;
            }
            let target = handler.handler as u32;
            let covered: Vec<u32> = self
                .blocks
                .values()
                .filter(|b| b.start < handler.end && handler.start <= b.end)
                .filter(|b| match options.exception_edges {
                    ExceptionEdgePolicy::Loose => true,
                    ExceptionEdgePolicy::Strict => Self::may_throw(body, b),
                })
                .map(|b| b.id)
                .collect();
            for id in covered {
                if let Some(block) = self.blocks.get_mut(&id) {
                    block.succs.push(target);
                }
            }
        }
    }

    fn may_throw(body: &MethodBody, block: &Block) -> bool {
        body.instructions[block.start..=block.end].iter().any(|i| {
            i.flow == FlowType::Throw
                || matches!(
                    i.operand,
                    Operand::Call(_) | Operand::DynamicCall { .. } | Operand::Field(_)
                )
        })
    }

    fn drop_unreachable(&mut self) {
        let Some(entry) = self.entry() else {
            return;
        };
        let mut seen: BTreeSet<u32> = BTreeSet::new();
        let mut work = vec![entry];
        seen.insert(entry);
        while let Some(id) = work.pop() {
            if let Some(block) = self.blocks.get(&id) {
                for &s in &block.succs {
                    if self.blocks.contains_key(&s) && seen.insert(s) {
                        work.push(s);
                    }
                }
            }
        }
        self.blocks.retain(|id, _| seen.contains(id));
        self.rebuild_preds();
    }

    fn merge_linear_chains(&mut self, body: &MethodBody) {
        loop {
            let mut merged = false;
            let ids: Vec<u32> = self.blocks.keys().copied().collect();
            for id in ids {
                let Some(block) = self.blocks.get(&id) else {
                    continue;
                };
                if block.succs.len() != 1 {
                    continue;
                }
                let succ_id = block.succs[0];
                if succ_id == id {
                    continue;
                }
                let Some(succ) = self.blocks.get(&succ_id) else {
                    continue;
                };
                if succ.preds.len() != 1 || succ.preds[0] != id {
                    continue;
                }
                // Only merge across a plain fallthrough terminator.
                if body.instructions[block.end].flow != FlowType::Sequential {
                    continue;
                }
                if block.is_handler_start || succ.is_handler_start {
                    continue;
                }

                let Some(succ) = self.blocks.remove(&succ_id) else {
                    continue;
                };
                // A back-edge from the tail to the head becomes a self-loop on the merged
                // block; it must survive so the dominance layer still sees the cycle.
                if let Some(block) = self.blocks.get_mut(&id) {
                    block.end = succ.end;
                    block.succs = succ.succs;
                }
                self.rebuild_preds();
                merged = true;
                break;
            }
            if !merged {
                break;
            }
        }
    }

    fn sort_edges(&mut self) {
        let ids: Vec<u32> = self.blocks.keys().copied().collect();
        for id in ids {
            if let Some(block) = self.blocks.get_mut(&id) {
                sort_dedup(&mut block.succs);
            }
        }
        self.rebuild_preds();
    }

    fn rebuild_preds(&mut self) {
        let mut preds: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for block in self.blocks.values() {
            for &s in &block.succs {
                preds.entry(s).or_default().push(block.id);
            }
        }
        // Prune successors pointing at removed blocks so adjacency stays closed.
        let live: BTreeSet<u32> = self.blocks.keys().copied().collect();
        for block in self.blocks.values_mut() {
            block.succs.retain(|s| live.contains(s));
            sort_dedup(&mut block.succs);
            block.preds = preds.remove(&block.id).unwrap_or_default();
            block.preds.retain(|p| live.contains(p));
            sort_dedup(&mut block.preds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::Instruction;

    fn jump(target: usize) -> Instruction {
        Instruction {
            opcode: 0xA7,
            operand: Operand::Jump(target),
            flow: FlowType::UnconditionalBranch,
        }
    }

    fn branch(target: usize) -> Instruction {
        Instruction {
            opcode: 0x99,
            operand: Operand::Jump(target),
            flow: FlowType::ConditionalBranch,
        }
    }

    fn ret() -> Instruction {
        Instruction {
            opcode: 0xB1,
            operand: Operand::None,
            flow: FlowType::Return,
        }
    }

    fn body(instructions: Vec<Instruction>) -> MethodBody {
        MethodBody {
            instructions,
            ..MethodBody::new("a/B", "m", "()V")
        }
    }

    #[test]
    fn test_empty_input_yields_empty_cfg() {
        let cfg = ReducedCfg::build(&body(vec![]));
        assert_eq!(cfg.block_count(), 0);
        assert_eq!(cfg.entry(), None);
    }

    #[test]
    fn test_linear_chain_merges_to_single_block() {
        let cfg = ReducedCfg::build(&body(vec![
            Instruction::simple(0x00),
            Instruction::simple(0x00),
            ret(),
        ]));
        assert_eq!(cfg.block_count(), 1);
        let entry = cfg.entry().unwrap();
        assert_eq!(cfg.block(entry).unwrap().start, 0);
        assert_eq!(cfg.block(entry).unwrap().end, 2);
    }

    #[test]
    fn test_merged_cycle_keeps_self_loop() {
        // 0-1 fall into 2-3, which jumps back to 0. The unreachable jump at 4 makes 2 a
        // leader, so the loop arrives at the merger as a two-block chain.
        let cfg = ReducedCfg::build(&body(vec![
            Instruction::simple(0x00),
            Instruction::simple(0x00),
            Instruction::simple(0x00),
            jump(0),
            jump(2),
        ]));
        assert_eq!(cfg.block_count(), 1);
        let entry = cfg.entry().unwrap();
        assert_eq!(cfg.block(entry).unwrap().succs(), &[entry]);
        assert_eq!(cfg.block(entry).unwrap().preds(), &[entry]);
    }

    #[test]
    fn test_diamond_shape() {
        // 0: branch -> 3, 1: nop, 2: jump 4, 3: nop(fall), 4: ret
        let cfg = ReducedCfg::build(&body(vec![
            branch(3),
            Instruction::simple(0x00),
            jump(4),
            Instruction::simple(0x00),
            ret(),
        ]));
        let entry = cfg.entry().unwrap();
        assert_eq!(cfg.block(entry).unwrap().succs(), &[1, 3]);
        assert_eq!(cfg.block(4).unwrap().preds(), &[1, 3]);
    }

    #[test]
    fn test_unreachable_block_dropped() {
        // 0: jump 2, 1: nop (unreachable), 2: ret
        let cfg = ReducedCfg::build(&body(vec![jump(2), Instruction::simple(0x00), ret()]));
        assert_eq!(cfg.block_count(), 2);
        assert!(cfg.block(1).is_none());
    }

    #[test]
    fn test_build_is_deterministic_and_idempotent() {
        let b = body(vec![
            branch(3),
            Instruction::simple(0x00),
            jump(4),
            Instruction::simple(0x00),
            ret(),
        ]);
        let a = ReducedCfg::build(&b);
        let c = ReducedCfg::build(&b);
        assert_eq!(a.block_ids(), c.block_ids());
        for id in a.block_ids() {
            assert_eq!(a.block(id).unwrap().succs(), c.block(id).unwrap().succs());
            assert_eq!(a.block(id).unwrap().preds(), c.block(id).unwrap().preds());
        }
    }

    #[test]
    fn test_exception_edges_loose() {
        let mut b = body(vec![
            Instruction::simple(0x00),
            branch(0),
            ret(),
            Instruction {
                opcode: 0xBF,
                operand: Operand::None,
                flow: FlowType::Throw,
            },
        ]);
        b.exception_table.push(crate::assembly::ExceptionHandler {
            start: 0,
            end: 3,
            handler: 3,
            catch_type: Some("java/lang/Exception".to_string()),
        });
        let cfg = ReducedCfg::build(&b);
        // Every block intersecting [0,3) has an edge to the handler block at 3.
        for block in cfg.blocks() {
            if block.start < 3 {
                assert!(block.succs().contains(&3), "block {} lacks handler edge", block.id);
            }
        }
        assert!(cfg.block(3).unwrap().is_handler_start);
    }

    #[test]
    fn test_exception_edges_strict_skips_non_throwing_blocks() {
        // 0: nop, 1: branch 0, 2: ret, 3: handler ret. Nothing in the try-range can
        // throw, so the strict policy wires no handler edges and the handler is pruned.
        let mut b = body(vec![Instruction::simple(0x00), branch(0), ret(), ret()]);
        b.exception_table.push(crate::assembly::ExceptionHandler {
            start: 0,
            end: 3,
            handler: 3,
            catch_type: None,
        });
        let options = CfgOptions {
            exception_edges: ExceptionEdgePolicy::Strict,
            merge_linear_chains: true,
        };
        let cfg = ReducedCfg::build_with(&b, &options);
        assert!(cfg.block(3).is_none());
        for block in cfg.blocks() {
            assert!(!block.succs().contains(&3));
        }
    }

    #[test]
    fn test_switch_successors() {
        let cfg = ReducedCfg::build(&body(vec![
            Instruction {
                opcode: 0xAA,
                operand: Operand::Switch {
                    default: 3,
                    cases: vec![1, 2],
                },
                flow: FlowType::Switch,
            },
            jump(3),
            jump(3),
            ret(),
        ]));
        assert_eq!(cfg.block(0).unwrap().succs(), &[1, 2, 3]);
    }

    #[test]
    fn test_out_of_range_target_ignored() {
        let cfg = ReducedCfg::build(&body(vec![branch(99), ret()]));
        assert_eq!(cfg.block(0).unwrap().succs(), &[1]);
    }

    #[test]
    fn test_options_fingerprint_carries_version() {
        let fp = CfgOptions::default().fingerprint();
        assert!(fp.contains("exc=loose"));
        assert!(fp.contains(&format!("version={}", CfgOptions::VERSION)));
    }
}
