//! Equivalence graph over size/alignment-preserving expression forms
//!
//! A node collects all generated expressions believed to share the same
//! `sizeof`/`_Alignof` under any machine model; an edge applies a set of
//! (pseudo-)unary operators to every expression of its source node.
//! Nodes connected in a cycle could be populated forever, so cycle
//! traversal is capped, as is the nesting of self-loop operators inside
//! one node.

mod generator;

pub use generator::{ExpressionGenerator, GraphOptions, ShapeBase, ShapeLevel, TypeShape};

use crate::ctype::{CType, Variable};
use crate::error::ModelError;
use crate::expr::{scratch_variable, unit_variable, zero_variable, Expression};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A (pseudo-)unary operator applied along a graph edge or a node's
/// self-loop: a real unary operator, or a binary operator with the
/// second operand fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeOp {
    /// `e + 0`
    AddZero,
    /// `e + zero`
    AddZeroVar,
    /// `e + 1`
    AddOne,
    /// `e + unit`
    AddUnitVar,
    /// `e[0]`
    IndexZero,
    /// `e[zero]`
    IndexZeroVar,
    /// `e[1]`
    IndexOne,
    /// `e[unit]`
    IndexUnitVar,
    /// `&e`
    AddrOf,
    /// `*e`
    Deref,
}

impl EdgeOp {
    pub fn apply(&self, e: &Expression) -> Result<Expression, ModelError> {
        match self {
            EdgeOp::AddZero => e.add(&Expression::int_literal(0)),
            EdgeOp::AddZeroVar => e.add(&zero_variable()),
            EdgeOp::AddOne => e.add(&Expression::int_literal(1)),
            EdgeOp::AddUnitVar => e.add(&unit_variable()),
            EdgeOp::IndexZero => e.subscript(&Expression::int_literal(0)),
            EdgeOp::IndexZeroVar => e.subscript(&zero_variable()),
            EdgeOp::IndexOne => e.subscript(&Expression::int_literal(1)),
            EdgeOp::IndexUnitVar => e.subscript(&unit_variable()),
            EdgeOp::AddrOf => e.addr_of(),
            EdgeOp::Deref => e.deref(),
        }
    }
}

/// Render an operator set the way edges are labeled in diagnostics:
/// each operator applied to a placeholder pointer `e`.
fn edge_label(ops: &[EdgeOp]) -> String {
    let e = scratch_variable("e", CType::pointer_to(CType::int_type()));
    let rendered: Vec<String> = ops
        .iter()
        .map(|op| match op.apply(&e) {
            Ok(applied) => applied.to_string(),
            Err(_) => format!("{:?}", op),
        })
        .collect();
    rendered.join(", ")
}

/// How a node's expected size/alignment is obtained from the concrete
/// declared variable at emission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassRepr {
    /// The declared variable itself, including its declared alignment.
    Variable,
    /// Some pointer; the pointee does not matter.
    AnyPointer,
    /// The variable's type, without the variable's declared alignment.
    TypeOf,
    /// The variable's type after `n` dereferences.
    DerefTypeOf(usize),
}

/// A class representative resolved against a concrete variable.
pub enum Resolved<'a> {
    Variable(&'a Variable),
    Type(CType),
}

impl ClassRepr {
    pub fn resolve<'a>(&self, variable: &'a Variable) -> Result<Resolved<'a>, ModelError> {
        match self {
            ClassRepr::Variable => Ok(Resolved::Variable(variable)),
            ClassRepr::AnyPointer => Ok(Resolved::Type(CType::pointer_to(CType::void()))),
            ClassRepr::TypeOf => Ok(Resolved::Type(variable.ctype.clone())),
            ClassRepr::DerefTypeOf(levels) => {
                let mut ctype = &variable.ctype;
                for _ in 0..*levels {
                    ctype = ctype.points_to().ok_or_else(|| ModelError::ShallowType {
                        ctype: variable.ctype.to_string(),
                        levels: *levels,
                    })?;
                }
                Ok(Resolved::Type(ctype.clone()))
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            ClassRepr::Variable => "variable".to_string(),
            ClassRepr::AnyPointer => "a pointer".to_string(),
            ClassRepr::TypeOf => "type of v".to_string(),
            ClassRepr::DerefTypeOf(levels) => format!("type after {} dereferences", levels),
        }
    }
}

/// A node holds all expressions with the same size and alignment rules.
/// The first expression inserted doubles as the human-readable label of
/// the class in generated programs.
#[derive(Debug, Clone)]
pub struct Node {
    pub title: String,
    pub repr: ClassRepr,
    loops: Vec<EdgeOp>,
    loop_depth: u32,
    exprs: Vec<Expression>,
    seen: HashSet<Expression>,
}

impl Node {
    fn new(title: &str, repr: ClassRepr, loops: Vec<EdgeOp>, loop_depth: u32) -> Node {
        Node {
            title: title.to_string(),
            repr,
            loops,
            loop_depth,
            exprs: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Member expressions, in deterministic insertion order.
    pub fn expressions(&self) -> &[Expression] {
        &self.exprs
    }

    fn contains(&self, e: &Expression) -> bool {
        self.seen.contains(e)
    }

    /// Insert genuinely new expressions and close them under the node's
    /// self-loop operators, breadth-first up to `loop_depth` nestings.
    /// Returns everything newly added.
    fn extend(&mut self, fresh: Vec<Expression>) -> Result<Vec<Expression>, ModelError> {
        let mut added = Vec::new();
        let mut frontier = Vec::new();
        for e in fresh {
            if self.seen.insert(e.clone()) {
                self.exprs.push(e.clone());
                added.push(e.clone());
                frontier.push(e);
            }
        }
        for _ in 0..self.loop_depth {
            let mut next = Vec::new();
            for e in &frontier {
                for op in &self.loops {
                    let looped = op.apply(e)?;
                    if self.seen.insert(looped.clone()) {
                        self.exprs.push(looped.clone());
                        added.push(looped.clone());
                        next.push(looped);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        Ok(added)
    }
}

/// A recorded edge, kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub label: String,
}

/// Statistics view of a node, serializable for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct NodeStats {
    pub title: String,
    pub representative: String,
    pub count: usize,
    pub expressions: Vec<String>,
}

/// Statistics view of a whole graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub nodes: Vec<NodeStats>,
    pub edges: Vec<Edge>,
}

/// The equivalence graph: named nodes plus the edges that populated
/// them. Nodes and expressions keep insertion order, so construction is
/// deterministic for fixed inputs.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    edges: Vec<Edge>,
    cycle_depth: u32,
    loop_depth: u32,
}

impl Graph {
    pub fn new(cycle_depth: u32, loop_depth: u32) -> Graph {
        Graph {
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            cycle_depth,
            loop_depth,
        }
    }

    /// Whether any node already holds expressions. A populated graph is
    /// single-use: it must not be populated again.
    pub fn is_populated(&self) -> bool {
        self.nodes.iter().any(|node| !node.exprs.is_empty())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, title: &str) -> Result<&Node, ModelError> {
        let idx = self.node_index(title)?;
        Ok(&self.nodes[idx])
    }

    fn node_index(&self, title: &str) -> Result<usize, ModelError> {
        self.index
            .get(title)
            .copied()
            .ok_or_else(|| ModelError::UnknownNode {
                title: title.to_string(),
            })
    }

    /// Add an empty node. Self-loop closure in the node applies `loops`
    /// up to the graph's loop depth.
    pub fn add_node(
        &mut self,
        title: &str,
        repr: ClassRepr,
        loops: Vec<EdgeOp>,
    ) -> Result<(), ModelError> {
        if self.index.contains_key(title) {
            return Err(ModelError::DuplicateNode {
                title: title.to_string(),
            });
        }
        self.index.insert(title.to_string(), self.nodes.len());
        self.nodes
            .push(Node::new(title, repr, loops, self.loop_depth));
        Ok(())
    }

    /// Seed a node with initial expressions (normally the declared
    /// variable itself), closing them under the node's self-loops.
    pub fn init_node(&mut self, title: &str, exprs: Vec<Expression>) -> Result<(), ModelError> {
        let idx = self.node_index(title)?;
        self.nodes[idx].extend(exprs)?;
        Ok(())
    }

    /// Add expressions to `to` by applying `ops` to every expression of
    /// node `from`. Returns the expressions newly added to `to`.
    pub fn edge(
        &mut self,
        from: &str,
        to: &str,
        ops: &[EdgeOp],
    ) -> Result<Vec<Expression>, ModelError> {
        let label = edge_label(ops);
        debug!("edge {} --{{ {} }}--> {}", from, label, to);
        self.edges.push(Edge {
            from: from.to_string(),
            to: to.to_string(),
            label,
        });
        let seeds = self.node(from)?.expressions().to_vec();
        self.edge_exprs(&seeds, to, ops)
    }

    /// Edge body working on an explicit seed list; used by cycle
    /// iterations, which only advance the newest expressions.
    fn edge_exprs(
        &mut self,
        seeds: &[Expression],
        to: &str,
        ops: &[EdgeOp],
    ) -> Result<Vec<Expression>, ModelError> {
        let idx = self.node_index(to)?;
        let mut fresh: Vec<Expression> = Vec::new();
        for seed in seeds {
            for op in ops {
                if *op == EdgeOp::AddrOf && !seed.lvalue {
                    // dont apply & to (v + 0) even though it has the
                    // same alignment rules as v
                    continue;
                }
                let out = op.apply(seed)?;
                if !self.nodes[idx].contains(&out) && !fresh.contains(&out) {
                    fresh.push(out);
                }
            }
        }
        let added = self.nodes[idx].extend(fresh)?;
        if let Some(first) = added.first() {
            debug!("added {} expressions to {}: {}, ...", added.len(), to, first);
        }
        Ok(added)
    }

    /// Traverse the two-edge cycle `from` -- `to` -- `from` up to
    /// `depth` times, then close it with one final `ops_to` edge so both
    /// nodes receive the deepest chains. The first traversal consumes
    /// the whole `from` node; later traversals advance only the newest
    /// expressions.
    pub fn cycle(
        &mut self,
        from: &str,
        to: &str,
        ops_to: &[EdgeOp],
        ops_back: &[EdgeOp],
    ) -> Result<(), ModelError> {
        self.edges.push(Edge {
            from: to.to_string(),
            to: from.to_string(),
            label: edge_label(ops_back),
        });

        let mut seeds: Option<Vec<Expression>> = None;
        for _ in 0..self.cycle_depth {
            let advanced = match &seeds {
                None => self.edge(from, to, ops_to)?,
                Some(s) => self.edge_exprs(s, to, ops_to)?,
            };
            seeds = Some(self.edge_exprs(&advanced, from, ops_back)?);
        }
        match seeds {
            None => {
                self.edge(from, to, ops_to)?;
            }
            Some(s) => {
                self.edge_exprs(&s, to, ops_to)?;
            }
        }
        Ok(())
    }

    /// Add a capped reference/dereference cycle between `n1` and `n2`:
    /// address-of toward `n2`, dereferences back. Dereferences are `*e`
    /// and `e[0]`, plus `e[zero]` if `with_non_const`, plus `e[1]` (and
    /// `e[unit]`) for array-typed sources. With `other_way` the cycle
    /// starts with the dereference edge instead, for the
    /// self-dereferencing case.
    pub fn addr_deref_cycle(
        &mut self,
        n1: &str,
        n2: &str,
        with_non_const: bool,
        as_array: bool,
        other_way: bool,
    ) -> Result<(), ModelError> {
        let mut deref = vec![EdgeOp::Deref, EdgeOp::IndexZero];
        if with_non_const {
            deref.push(EdgeOp::IndexZeroVar);
        }
        if as_array {
            deref.push(EdgeOp::IndexOne);
            if with_non_const {
                deref.push(EdgeOp::IndexUnitVar);
            }
        }
        if other_way {
            self.cycle(n1, n2, &deref, &[EdgeOp::AddrOf])
        } else {
            self.cycle(n1, n2, &[EdgeOp::AddrOf], &deref)
        }
    }

    /// Serializable node/edge statistics.
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self
                .nodes
                .iter()
                .map(|node| NodeStats {
                    title: node.title.clone(),
                    representative: node.repr.describe(),
                    count: node.exprs.len(),
                    expressions: node.exprs.iter().map(|e| e.to_string()).collect(),
                })
                .collect(),
            edges: self.edges.clone(),
        }
    }

    /// Render the graph in Graphviz dot format.
    pub fn to_dot(&self, name: &str) -> String {
        let mut dot = format!("digraph {} {{\n", name);
        dot.push_str("in [shape=none, label=\"\"]\n");
        let mut ids = HashMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            ids.insert(node.title.as_str(), format!("n{}", i));
            dot.push_str(&format!(
                "n{} [label=\"{}\\n{}\"]\n",
                i,
                node.title,
                node.repr.describe()
            ));
        }
        if let Some(root) = ids.get("v") {
            dot.push_str(&format!("in -> {}\n", root));
        }
        for edge in &self.edges {
            if let (Some(from), Some(to)) = (ids.get(edge.from.as_str()), ids.get(edge.to.as_str()))
            {
                dot.push_str(&format!("{} -> {} [label=\"{}\"]\n", from, to, edge.label));
            }
        }
        dot.push_str("}\n");
        dot
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            writeln!(
                f,
                "{} ({}): {} expressions",
                node.title,
                node.repr.describe(),
                node.exprs.len()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::Alignment;

    fn int_var() -> Variable {
        CType::int_type().declare("v", Alignment::NoAttr).unwrap()
    }

    fn rendered(node: &Node) -> Vec<String> {
        node.expressions().iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_edge_applies_ops_and_dedups() {
        let mut graph = Graph::new(1, 0);
        graph.add_node("v", ClassRepr::Variable, vec![]).unwrap();
        graph.add_node("&v", ClassRepr::AnyPointer, vec![]).unwrap();
        graph
            .init_node("v", vec![Expression::variable(&int_var())])
            .unwrap();

        let added = graph.edge("v", "&v", &[EdgeOp::AddrOf]).unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(rendered(graph.node("&v").unwrap()), vec!["&v"]);

        // same edge again: everything is already a member
        let added = graph.edge("v", "&v", &[EdgeOp::AddrOf]).unwrap();
        assert!(added.is_empty());
    }

    #[test]
    fn test_edge_skips_addr_of_rvalues() {
        let mut graph = Graph::new(1, 0);
        graph.add_node("v", ClassRepr::Variable, vec![]).unwrap();
        graph.add_node("&v", ClassRepr::AnyPointer, vec![]).unwrap();
        let v = Expression::variable(&int_var());
        let sum = v.add(&Expression::int_literal(0)).unwrap();
        graph.init_node("v", vec![v, sum]).unwrap();

        let added = graph.edge("v", "&v", &[EdgeOp::AddrOf]).unwrap();
        // only &v: &(v + 0) is not legal C
        assert_eq!(added.len(), 1);
        assert_eq!(rendered(graph.node("&v").unwrap()), vec!["&v"]);
    }

    #[test]
    fn test_self_loop_closure_depth() {
        let mut graph = Graph::new(1, 2);
        graph
            .add_node("p", ClassRepr::AnyPointer, vec![EdgeOp::AddZero])
            .unwrap();
        let p = CType::pointer_to(CType::int_type())
            .declare("p", Alignment::NoAttr)
            .unwrap();
        graph.init_node("p", vec![Expression::variable(&p)]).unwrap();

        assert_eq!(
            rendered(graph.node("p").unwrap()),
            vec!["p", "p + 0", "p + 0 + 0"]
        );
    }

    #[test]
    fn test_cycle_depth_zero_is_single_edge() {
        let mut graph = Graph::new(0, 0);
        graph.add_node("v", ClassRepr::Variable, vec![]).unwrap();
        graph.add_node("&v", ClassRepr::AnyPointer, vec![]).unwrap();
        graph
            .init_node("v", vec![Expression::variable(&int_var())])
            .unwrap();
        graph.addr_deref_cycle("v", "&v", false, false, false).unwrap();

        assert_eq!(rendered(graph.node("v").unwrap()), vec!["v"]);
        assert_eq!(rendered(graph.node("&v").unwrap()), vec!["&v"]);
    }

    #[test]
    fn test_cycle_depth_one_reaches_both_directions() {
        let mut graph = Graph::new(1, 0);
        graph.add_node("v", ClassRepr::Variable, vec![]).unwrap();
        graph.add_node("&v", ClassRepr::AnyPointer, vec![]).unwrap();
        graph
            .init_node("v", vec![Expression::variable(&int_var())])
            .unwrap();
        graph.addr_deref_cycle("v", "&v", false, false, false).unwrap();

        assert_eq!(
            rendered(graph.node("v").unwrap()),
            vec!["v", "*&v", "(&v)[0]"]
        );
        assert_eq!(
            rendered(graph.node("&v").unwrap()),
            vec!["&v", "&*&v", "&(&v)[0]"]
        );
    }

    #[test]
    fn test_unknown_and_duplicate_nodes() {
        let mut graph = Graph::new(1, 1);
        graph.add_node("v", ClassRepr::Variable, vec![]).unwrap();
        assert!(matches!(
            graph.add_node("v", ClassRepr::Variable, vec![]),
            Err(ModelError::DuplicateNode { .. })
        ));
        assert!(matches!(
            graph.edge("v", "w", &[EdgeOp::AddrOf]),
            Err(ModelError::UnknownNode { .. })
        ));
        assert!(matches!(
            graph.node("w"),
            Err(ModelError::UnknownNode { .. })
        ));
    }

    #[test]
    fn test_dot_output_names_all_nodes() {
        let mut graph = Graph::new(0, 0);
        graph.add_node("v", ClassRepr::Variable, vec![]).unwrap();
        graph.add_node("&v", ClassRepr::AnyPointer, vec![]).unwrap();
        graph
            .init_node("v", vec![Expression::variable(&int_var())])
            .unwrap();
        graph.edge("v", "&v", &[EdgeOp::AddrOf]).unwrap();

        let dot = graph.to_dot("number");
        assert!(dot.starts_with("digraph number {"));
        assert!(dot.contains("n0 [label=\"v\\nvariable\"]"));
        assert!(dot.contains("in -> n0"));
        assert!(dot.contains("n0 -> n1 [label=\"&e\"]"));
    }

    #[test]
    fn test_edge_label_rendering() {
        assert_eq!(
            edge_label(&[EdgeOp::Deref, EdgeOp::IndexZero, EdgeOp::IndexZeroVar]),
            "*e, e[0], e[zero]"
        );
        assert_eq!(edge_label(&[EdgeOp::AddZeroVar]), "e + zero");
    }
}
