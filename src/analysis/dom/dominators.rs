//! Dominator tree computation over a reduced CFG.

use std::collections::BTreeMap;

use crate::analysis::cfg::ReducedCfg;

/// Iteration cap multiplier for the dominator fixpoint. A reducible graph converges in a
/// handful of passes; the cap only trips on pathological irreducible inputs.
const FIXPOINT_CAP_FACTOR: usize = 8;

/// Immediate-dominator tree for one CFG.
///
/// Built with the iterative reverse-postorder fixpoint of Cooper, Harvey and Kennedy.
/// The entry block dominates itself and has no immediate dominator. Queries on ids not
/// present in the graph return `None` or `false` rather than failing.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// Reverse postorder over reachable blocks, entry first. Blocks never reached by the
    /// depth-first walk are appended at the tail in ascending id order.
    rpo: Vec<u32>,
    /// Position of each block in `rpo`.
    rpo_pos: BTreeMap<u32, usize>,
    /// Immediate dominator per block; the entry maps to itself.
    idom: BTreeMap<u32, u32>,
    /// Depth in the dominator tree; entry is 0.
    depth: BTreeMap<u32, u32>,
    /// Dominator-tree children, sorted ascending.
    children: BTreeMap<u32, Vec<u32>>,
    entry: Option<u32>,
}

impl DominatorTree {
    /// Computes the dominator tree for `cfg`. An empty graph yields an empty tree.
    #[must_use]
    pub fn compute(cfg: &ReducedCfg) -> Self {
        let mut tree = Self {
            rpo: Vec::new(),
            rpo_pos: BTreeMap::new(),
            idom: BTreeMap::new(),
            depth: BTreeMap::new(),
            children: BTreeMap::new(),
            entry: cfg.entry(),
        };
        let Some(entry) = cfg.entry() else {
            return tree;
        };

        tree.compute_rpo(cfg, entry);
        tree.run_fixpoint(cfg, entry);
        tree.build_children(entry);
        tree.compute_depths(entry);
        tree
    }

    /// Entry block id, `None` for the empty tree.
    #[must_use]
    pub fn entry(&self) -> Option<u32> {
        self.entry
    }

    /// Immediate dominator of `id`. `None` for the entry itself or an unknown id.
    #[must_use]
    pub fn idom(&self, id: u32) -> Option<u32> {
        match (self.idom.get(&id), self.entry) {
            (Some(&d), Some(entry)) if id != entry => Some(d),
            _ => None,
        }
    }

    /// Depth of `id` in the dominator tree, entry at depth 0.
    #[must_use]
    pub fn depth(&self, id: u32) -> Option<u32> {
        self.depth.get(&id).copied()
    }

    /// Dominator-tree children of `id`, sorted ascending. Empty for leaves and unknown ids.
    #[must_use]
    pub fn children(&self, id: u32) -> &[u32] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Whether `a` dominates `b` (reflexively). Unknown ids never dominate anything.
    #[must_use]
    pub fn dominates(&self, a: u32, b: u32) -> bool {
        if !self.idom.contains_key(&a) || !self.idom.contains_key(&b) {
            return false;
        }
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            match self.idom(cur) {
                Some(parent) => cur = parent,
                None => return false,
            }
        }
    }

    /// Blocks in reverse postorder, entry first.
    #[must_use]
    pub fn reverse_postorder(&self) -> &[u32] {
        &self.rpo
    }

    fn compute_rpo(&mut self, cfg: &ReducedCfg, entry: u32) {
        // Explicit-stack postorder DFS; recursion depth is unbounded on long chains.
        let mut postorder: Vec<u32> = Vec::with_capacity(cfg.block_count());
        let mut visited: BTreeMap<u32, bool> = BTreeMap::new();
        let mut stack: Vec<(u32, usize)> = vec![(entry, 0)];
        visited.insert(entry, true);
        while let Some(&(id, next)) = stack.last() {
            let succs = cfg.block(id).map_or(&[][..], |b| b.succs());
            if next < succs.len() {
                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }
                let s = succs[next];
                if !visited.contains_key(&s) {
                    visited.insert(s, true);
                    stack.push((s, 0));
                }
            } else {
                postorder.push(id);
                stack.pop();
            }
        }
        postorder.reverse();
        self.rpo = postorder;

        // Blocks unreached by the walk (possible when pruning is disabled upstream) go at
        // the tail, ascending, so downstream order stays total.
        for id in cfg.block_ids() {
            if !visited.contains_key(&id) {
                self.rpo.push(id);
            }
        }
        for (pos, &id) in self.rpo.iter().enumerate() {
            self.rpo_pos.insert(id, pos);
        }
    }

    fn run_fixpoint(&mut self, cfg: &ReducedCfg, entry: u32) {
        let n = self.rpo.len();
        self.idom.insert(entry, entry);

        let cap = FIXPOINT_CAP_FACTOR * n.max(1);
        let mut passes = 0usize;
        let mut changed = true;
        while changed {
            if passes >= cap {
                log::warn!(
                    "dominator fixpoint cap hit after {passes} passes over {n} blocks; \
                     result may be conservative"
                );
                break;
            }
            passes += 1;
            changed = false;
            for &id in &self.rpo {
                if id == entry {
                    continue;
                }
                let Some(block) = cfg.block(id) else {
                    continue;
                };
                // First processed predecessor seeds the intersection.
                let mut new_idom: Option<u32> = None;
                for &p in block.preds() {
                    if !self.idom.contains_key(&p) {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(cur) => self.intersect(cur, p),
                    });
                }
                if let Some(d) = new_idom {
                    if self.idom.get(&id) != Some(&d) {
                        self.idom.insert(id, d);
                        changed = true;
                    }
                }
            }
        }
    }

    /// Walks two dominator chains upward by RPO position until they meet.
    fn intersect(&self, mut a: u32, mut b: u32) -> u32 {
        while a != b {
            let pa = self.rpo_pos.get(&a).copied().unwrap_or(usize::MAX);
            let pb = self.rpo_pos.get(&b).copied().unwrap_or(usize::MAX);
            if pa > pb {
                a = self.idom.get(&a).copied().unwrap_or(a);
            } else {
                b = self.idom.get(&b).copied().unwrap_or(b);
            }
        }
        a
    }

    fn build_children(&mut self, entry: u32) {
        for (&id, &dom) in &self.idom {
            if id != entry {
                self.children.entry(dom).or_default().push(id);
            }
        }
        for kids in self.children.values_mut() {
            kids.sort_unstable();
        }
    }

    fn compute_depths(&mut self, entry: u32) {
        self.depth.insert(entry, 0);
        let mut work = vec![entry];
        while let Some(id) = work.pop() {
            let d = self.depth[&id];
            for &child in self.children.get(&id).map_or(&[][..], Vec::as_slice) {
                self.depth.insert(child, d + 1);
                work.push(child);
            }
        }
    }
}
