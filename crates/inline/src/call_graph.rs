//! Module call graph and its strongly connected components.
//!
//! Nodes are the module's live functions plus one distinguished external
//! node standing for entries from outside the module. Direct call sites are
//! edges; address-taking instructions and external-node edges count as
//! references without being call edges. The graph is exclusively owned by
//! the inlining driver while an SCC pass runs.

use rustc_hash::{FxHashMap, FxHashSet};
use toccata_ir::{FuncRef, Inst, InstId, Module};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallEdge {
    pub site: InstId,
    pub callee: FuncRef,
}

#[derive(Debug, Default)]
struct CallGraphNode {
    edges: Vec<CallEdge>,
    /// Incoming call edges, address references, and external-node edges.
    num_references: u32,
}

#[derive(Debug, Default)]
pub struct CallGraph {
    nodes: FxHashMap<FuncRef, CallGraphNode>,
    /// Call edges from the distinguished external node.
    external_callees: Vec<FuncRef>,
}

impl CallGraph {
    pub fn build(module: &Module) -> Self {
        let mut cg = Self::default();
        for func_ref in module.funcs() {
            cg.nodes.insert(func_ref, CallGraphNode::default());
        }

        for func_ref in module.funcs() {
            let func = module.func(func_ref);
            for block in func.layout.iter_block() {
                for inst_id in func.layout.iter_inst(block) {
                    match func.dfg.inst(inst_id) {
                        Inst::Call { callee, .. } => {
                            cg.add_call_edge(func_ref, inst_id, *callee);
                        }
                        Inst::FuncAddr { func: target } => {
                            cg.bump_references(*target, 1);
                        }
                        _ => {}
                    }
                }
            }
        }

        for func_ref in module.funcs() {
            if module.func(func_ref).sig.linkage().is_externally_visible() {
                cg.external_callees.push(func_ref);
                cg.bump_references(func_ref, 1);
            }
        }

        cg
    }

    pub fn contains(&self, func_ref: FuncRef) -> bool {
        self.nodes.contains_key(&func_ref)
    }

    pub fn edges(&self, func_ref: FuncRef) -> &[CallEdge] {
        &self.nodes[&func_ref].edges
    }

    pub fn num_references(&self, func_ref: FuncRef) -> u32 {
        self.nodes[&func_ref].num_references
    }

    pub fn has_self_edge(&self, func_ref: FuncRef) -> bool {
        self.edges(func_ref).iter().any(|e| e.callee == func_ref)
    }

    pub fn add_call_edge(&mut self, caller: FuncRef, site: InstId, callee: FuncRef) {
        self.nodes
            .get_mut(&caller)
            .expect("caller not in call graph")
            .edges
            .push(CallEdge { site, callee });
        self.bump_references(callee, 1);
    }

    /// Drops the edge recorded for `site`, if any. Indirect call sites have
    /// no edge, so a miss is not an error.
    pub fn remove_call_edge_for(&mut self, caller: FuncRef, site: InstId) {
        let node = self.nodes.get_mut(&caller).expect("caller not in call graph");
        if let Some(pos) = node.edges.iter().position(|e| e.site == site) {
            let edge = node.edges.remove(pos);
            self.bump_references(edge.callee, -1);
        }
    }

    /// Drops every outgoing call edge of `func_ref`.
    pub fn remove_all_called_functions(&mut self, func_ref: FuncRef) {
        let node = self.nodes.get_mut(&func_ref).expect("node not in call graph");
        let edges = std::mem::take(&mut node.edges);
        for edge in edges {
            self.bump_references(edge.callee, -1);
        }
    }

    /// Drops any edge from the external node to `func_ref`.
    pub fn remove_any_call_edge_to(&mut self, func_ref: FuncRef) {
        let before = self.external_callees.len();
        self.external_callees.retain(|&f| f != func_ref);
        let removed = (before - self.external_callees.len()) as i32;
        self.bump_references(func_ref, -removed);
    }

    /// Removes the node. Its outgoing edges must already be gone.
    pub fn remove_function_from_module(&mut self, func_ref: FuncRef) {
        let node = self
            .nodes
            .remove(&func_ref)
            .expect("node not in call graph");
        debug_assert!(
            node.edges.is_empty(),
            "removing call graph node with live outgoing edges"
        );
    }

    fn bump_references(&mut self, func_ref: FuncRef, delta: i32) {
        let node = self.nodes.get_mut(&func_ref).expect("node not in call graph");
        node.num_references = node
            .num_references
            .checked_add_signed(delta)
            .expect("reference count underflow");
    }
}

/// One strongly connected component of the call graph.
#[derive(Debug, Clone)]
pub struct CallGraphScc {
    pub functions: Vec<FuncRef>,
}

impl CallGraphScc {
    /// An SCC is singular iff it holds exactly one function with no
    /// self-edge. The driver's work-list shrinkage discipline depends on
    /// this distinction.
    pub fn is_singular(&self, cg: &CallGraph) -> bool {
        self.functions.len() == 1 && !cg.has_self_edge(self.functions[0])
    }
}

/// Computes the SCCs of the call graph in bottom-up order: every SCC appears
/// after all SCCs it calls into, which is the order the inliner visits them.
pub fn compute_sccs_bottom_up(module: &Module, cg: &CallGraph) -> Vec<CallGraphScc> {
    let mut state = TarjanState {
        cg,
        index: FxHashMap::default(),
        lowlink: FxHashMap::default(),
        on_stack: FxHashSet::default(),
        stack: Vec::new(),
        next_index: 0,
        sccs: Vec::new(),
    };

    for root in module.funcs() {
        if !state.index.contains_key(&root) {
            state.connect(root);
        }
    }

    state.sccs
}

struct TarjanState<'a> {
    cg: &'a CallGraph,
    index: FxHashMap<FuncRef, u32>,
    lowlink: FxHashMap<FuncRef, u32>,
    on_stack: FxHashSet<FuncRef>,
    stack: Vec<FuncRef>,
    next_index: u32,
    sccs: Vec<CallGraphScc>,
}

impl TarjanState<'_> {
    /// Iterative Tarjan rooted at `root`. Emits each SCC when its root pops,
    /// so callees' components complete before their callers'.
    fn connect(&mut self, root: FuncRef) {
        let mut frames: Vec<(FuncRef, Vec<FuncRef>, usize)> = Vec::new();
        self.visit(root);
        frames.push((root, self.successors(root), 0));

        while !frames.is_empty() {
            let (node, next) = {
                let (node, succs, cursor) = frames.last_mut().unwrap();
                let node = *node;
                match succs.get(*cursor) {
                    Some(&succ) => {
                        *cursor += 1;
                        (node, Some(succ))
                    }
                    None => (node, None),
                }
            };

            let Some(succ) = next else {
                frames.pop();
                if self.lowlink[&node] == self.index[&node] {
                    let mut functions = Vec::new();
                    loop {
                        let member = self.stack.pop().unwrap();
                        self.on_stack.remove(&member);
                        functions.push(member);
                        if member == node {
                            break;
                        }
                    }
                    self.sccs.push(CallGraphScc { functions });
                }

                if let Some(&(parent, ..)) = frames.last() {
                    let low = self.lowlink[&parent].min(self.lowlink[&node]);
                    self.lowlink.insert(parent, low);
                }
                continue;
            };

            if !self.index.contains_key(&succ) {
                self.visit(succ);
                frames.push((succ, self.successors(succ), 0));
            } else if self.on_stack.contains(&succ) {
                let low = self.lowlink[&node].min(self.index[&succ]);
                self.lowlink.insert(node, low);
            }
        }
    }

    fn visit(&mut self, node: FuncRef) {
        self.index.insert(node, self.next_index);
        self.lowlink.insert(node, self.next_index);
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack.insert(node);
    }

    fn successors(&self, node: FuncRef) -> Vec<FuncRef> {
        self.cg
            .edges(node)
            .iter()
            .map(|e| e.callee)
            .filter(|callee| self.cg.contains(*callee))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;
    use toccata_ir::{Linkage, Signature, Type, builder::test_util::*};

    use super::*;

    fn call_module() -> (toccata_ir::Module, Vec<FuncRef>) {
        // main -> a -> b -> a (cycle), b -> leaf
        let mut mb = test_module_builder();
        let main =
            mb.declare_function(Signature::new("main", Linkage::Public, &[], Type::Unit));
        let a = mb.declare_function(Signature::new("a", Linkage::Private, &[], Type::Unit));
        let b = mb.declare_function(Signature::new("b", Linkage::Private, &[], Type::Unit));
        let leaf =
            mb.declare_function(Signature::new("leaf", Linkage::Private, &[], Type::Unit));

        for (func, callees) in [
            (main, vec![a]),
            (a, vec![b]),
            (b, vec![a, leaf]),
            (leaf, vec![]),
        ] {
            let mut builder = mb.func_builder(func);
            let b0 = builder.append_block();
            builder.switch_to_block(b0);
            for callee in callees {
                builder.insert_inst(toccata_ir::Inst::Call {
                    callee,
                    args: smallvec![],
                });
            }
            builder.insert_inst(toccata_ir::Inst::Return { arg: None });
        }

        (mb.build(), vec![main, a, b, leaf])
    }

    #[test]
    fn builds_edges_and_references() {
        let (module, funcs) = call_module();
        let cg = CallGraph::build(&module);
        let [main, a, b, leaf] = funcs[..] else {
            unreachable!()
        };

        assert_eq!(cg.edges(main).len(), 1);
        assert_eq!(cg.edges(b).len(), 2);
        // a: called by main and b.
        assert_eq!(cg.num_references(a), 2);
        // main: externally visible only.
        assert_eq!(cg.num_references(main), 1);
        assert_eq!(cg.num_references(leaf), 1);
    }

    #[test]
    fn sccs_come_out_bottom_up() {
        let (module, funcs) = call_module();
        let cg = CallGraph::build(&module);
        let [main, a, b, leaf] = funcs[..] else {
            unreachable!()
        };

        let sccs = compute_sccs_bottom_up(&module, &cg);
        assert_eq!(sccs.len(), 3);

        let position = |f: FuncRef| sccs.iter().position(|scc| scc.functions.contains(&f));
        assert!(position(leaf) < position(a));
        assert_eq!(position(a), position(b));
        assert!(position(a) < position(main));

        let cycle = &sccs[position(a).unwrap()];
        assert_eq!(cycle.functions.len(), 2);
        assert!(!cycle.is_singular(&cg));
        assert!(sccs[position(main).unwrap()].is_singular(&cg));
    }

    #[test]
    fn self_edge_makes_scc_non_singular() {
        let mut mb = test_module_builder();
        let f = mb.declare_function(Signature::new("f", Linkage::Private, &[], Type::Unit));
        let mut builder = mb.func_builder(f);
        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        builder.insert_inst(toccata_ir::Inst::Call {
            callee: f,
            args: smallvec![],
        });
        builder.insert_inst(toccata_ir::Inst::Return { arg: None });
        let module = mb.build();

        let cg = CallGraph::build(&module);
        let sccs = compute_sccs_bottom_up(&module, &cg);
        assert_eq!(sccs.len(), 1);
        assert!(!sccs[0].is_singular(&cg));
    }

    #[test]
    fn edge_removal_updates_references() {
        let (module, funcs) = call_module();
        let mut cg = CallGraph::build(&module);
        let [main, a, ..] = funcs[..] else {
            unreachable!()
        };

        let site = cg.edges(main)[0].site;
        cg.remove_call_edge_for(main, site);
        assert_eq!(cg.num_references(a), 1);
        assert!(cg.edges(main).is_empty());

        // Removing a missing edge is a no-op.
        cg.remove_call_edge_for(main, site);
        assert_eq!(cg.num_references(a), 1);
    }
}
