//! Graph construction for a variable of arbitrary pointer/array nesting
//!
//! Built graphs are memoized by the variable's type shape, so the graph
//! constructed for `int *` is reused for `char *`: only the canonical
//! representative of each node is resolved against the concrete variable
//! at emission time.

use crate::ctype::{CType, CTypeKind, Variable};
use crate::error::ModelError;
use crate::expr::Expression;
use crate::graph::{ClassRepr, EdgeOp, Graph};
use log::debug;
use std::collections::BTreeMap;
use std::fmt;

/// One pointer or array level of a type shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeLevel {
    Pointer,
    Array,
}

/// Arithmetic category of the base type a shape bottoms out in. Numbers
/// collapse to `Opaque` when number arithmetic is disabled, because the
/// graphs are then identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeBase {
    Number,
    Opaque,
}

/// Cache key for graph reuse: the pointer/array nesting pattern and the
/// arithmetic category of the base type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeShape {
    levels: Vec<ShapeLevel>,
    base: ShapeBase,
}

impl TypeShape {
    /// The shape of a type under the given number-arithmetic setting.
    pub fn of(ctype: &CType, number_arithmetic: bool) -> TypeShape {
        let mut levels = Vec::new();
        let mut current = ctype;
        loop {
            match &current.kind {
                CTypeKind::Pointer(referenced) => {
                    levels.push(ShapeLevel::Pointer);
                    current = referenced;
                }
                CTypeKind::Array { element, .. } => {
                    levels.push(ShapeLevel::Array);
                    current = element;
                }
                CTypeKind::Number(_) => {
                    let base = if number_arithmetic {
                        ShapeBase::Number
                    } else {
                        ShapeBase::Opaque
                    };
                    return TypeShape { levels, base };
                }
                CTypeKind::Void => {
                    return TypeShape {
                        levels,
                        base: ShapeBase::Opaque,
                    };
                }
            }
        }
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for level in &self.levels {
            match level {
                ShapeLevel::Pointer => write!(f, "P")?,
                ShapeLevel::Array => write!(f, "A")?,
            }
        }
        match self.base {
            ShapeBase::Number => write!(f, "number"),
            ShapeBase::Opaque => write!(f, "void"),
        }
    }
}

/// Bounds and operator settings for graph construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphOptions {
    /// How many times to traverse a reference/dereference cycle.
    pub cycle_depth: u32,
    /// How many self-loop operators to nest inside one node.
    pub loop_depth: u32,
    /// Add `p + 0` and `p + zero` loops for pointer expressions.
    pub pointer_arithmetic: bool,
    /// Add `v + 0` and `v + zero` loops and edges for number
    /// expressions.
    pub number_arithmetic: bool,
}

impl Default for GraphOptions {
    fn default() -> GraphOptions {
        GraphOptions {
            cycle_depth: 2,
            loop_depth: 2,
            pointer_arithmetic: false,
            number_arithmetic: false,
        }
    }
}

/// Generates expression graphs for variables and caches them by type
/// shape.
#[derive(Debug, Default)]
pub struct ExpressionGenerator {
    options: GraphOptions,
    graphs: BTreeMap<TypeShape, Graph>,
}

impl ExpressionGenerator {
    pub fn new(options: GraphOptions) -> ExpressionGenerator {
        ExpressionGenerator {
            options,
            graphs: BTreeMap::new(),
        }
    }

    pub fn options(&self) -> GraphOptions {
        self.options
    }

    /// All graphs built so far, keyed by shape, in deterministic order.
    pub fn graphs(&self) -> impl Iterator<Item = (&TypeShape, &Graph)> {
        self.graphs.iter()
    }

    /// The graph for the variable's type shape, building and caching it
    /// on first use.
    pub fn graph_for(&mut self, variable: &Variable) -> Result<&Graph, ModelError> {
        let shape = TypeShape::of(&variable.ctype, self.options.number_arithmetic);
        if !self.graphs.contains_key(&shape) {
            debug!(
                "constructing graph for {} ({})",
                shape, variable.declaration
            );
            let mut graph = Graph::new(self.options.cycle_depth, self.options.loop_depth);
            self.populate(&mut graph, variable)?;
            self.graphs.insert(shape.clone(), graph);
        } else {
            debug!("found graph for {} ({})", shape, variable.declaration);
        }
        Ok(&self.graphs[&shape])
    }

    /// Populate a fresh graph with expressions deriving from `variable`:
    /// taking its address and dereferencing back in different ways, plus
    /// dereferencing the variable itself when it is a pointer. A graph
    /// can only be populated once.
    pub fn populate(&self, graph: &mut Graph, variable: &Variable) -> Result<(), ModelError> {
        if graph.is_populated() {
            let shape = TypeShape::of(&variable.ctype, self.options.number_arithmetic);
            return Err(ModelError::GraphAlreadyBuilt {
                shape: shape.to_string(),
            });
        }

        let v = Expression::variable(variable);
        let v_arith = self.arithmetic_ops(&variable.ctype);
        let pointer_loops = if self.options.pointer_arithmetic {
            vec![EdgeOp::AddZero]
        } else {
            vec![]
        };
        let pointer_sum_loops = if self.options.pointer_arithmetic {
            vec![EdgeOp::AddZero, EdgeOp::AddZeroVar]
        } else {
            vec![]
        };

        graph.add_node("v", ClassRepr::Variable, vec![])?;
        graph.add_node("&v", ClassRepr::AnyPointer, pointer_loops)?;
        graph.add_node("&v+z", ClassRepr::AnyPointer, pointer_sum_loops)?;
        graph.add_node("(&v)[z]", ClassRepr::TypeOf, v_arith.clone())?;

        // all expressions derive from v
        graph.init_node("v", vec![v.clone()])?;
        // &v; *&v, (&v)[0]; &*&v ...
        graph.addr_deref_cycle("v", "&v", false, false, false)?;
        // &v --> (&v)[zero]
        graph.edge("&v", "(&v)[z]", &[EdgeOp::IndexZeroVar])?;
        // &v --> &v + zero
        graph.edge("&v", "&v+z", &[EdgeOp::AddZeroVar])?;
        // merge numeric and symbolic zero forms of both nodes
        graph.addr_deref_cycle("(&v)[z]", "&v+z", true, false, false)?;

        if !v_arith.is_empty() {
            // v + 0 shares the class of the canonical type representative
            graph.edge("v", "(&v)[z]", &v_arith)?;
        }
        if variable.ctype.points_to().is_some() {
            self.populate_pointer(graph, &v, 1, Some("(&v)[z]"))?;
        }
        Ok(())
    }

    /// Extend the graph with nodes for dereferences of a pointer-typed
    /// expression, recursing while the dereferenced type is itself a
    /// pointer. `anchor` is the existing node that `&*pointer` belongs
    /// to when that node differs from the pointer's own node.
    fn populate_pointer(
        &self,
        graph: &mut Graph,
        pointer: &Expression,
        level: usize,
        anchor: Option<&str>,
    ) -> Result<(), ModelError> {
        let is_array = pointer.ctype.is_array();
        let pointed = pointer.deref()?;
        let title = pointed.to_string();
        graph.add_node(
            &title,
            ClassRepr::DerefTypeOf(level),
            self.arithmetic_ops(&pointed.ctype),
        )?;

        if let Some(anchor) = anchor {
            // p --> *p, with the reference chains merged into the anchor
            let mut derefs = vec![EdgeOp::Deref, EdgeOp::IndexZero, EdgeOp::IndexZeroVar];
            if is_array {
                derefs.push(EdgeOp::IndexOne);
                derefs.push(EdgeOp::IndexUnitVar);
            }
            graph.edge(&pointer.to_string(), &title, &derefs)?;
            graph.addr_deref_cycle(&title, anchor, true, is_array, false)?;
        } else {
            // p is the same node as &*p: cycle p -> *p -> p directly
            graph.addr_deref_cycle(&pointer.to_string(), &title, true, is_array, true)?;
        }

        if pointed.ctype.points_to().is_some() {
            self.populate_pointer(graph, &pointed, level + 1, None)?;
        }
        Ok(())
    }

    /// The sum operators valid as self-loops for expressions of the
    /// given type, per the arithmetic settings.
    fn arithmetic_ops(&self, ctype: &CType) -> Vec<EdgeOp> {
        let sums = [
            EdgeOp::AddZero,
            EdgeOp::AddZeroVar,
            EdgeOp::AddOne,
            EdgeOp::AddUnitVar,
        ];
        match &ctype.kind {
            CTypeKind::Void => vec![],
            CTypeKind::Number(_) => {
                if self.options.number_arithmetic {
                    sums.to_vec()
                } else {
                    vec![]
                }
            }
            CTypeKind::Array { .. } => {
                if self.options.pointer_arithmetic {
                    sums.to_vec()
                } else {
                    vec![]
                }
            }
            CTypeKind::Pointer(_) => {
                if self.options.pointer_arithmetic {
                    vec![EdgeOp::AddZero, EdgeOp::AddZeroVar]
                } else {
                    vec![]
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::Alignment;
    use std::collections::HashSet;

    fn declared(ctype: CType) -> Variable {
        ctype.declare("v", Alignment::NoAttr).unwrap()
    }

    fn all_rendered(graph: &Graph) -> HashSet<String> {
        graph
            .nodes()
            .iter()
            .flat_map(|n| n.expressions().iter().map(|e| e.to_string()))
            .collect()
    }

    fn node_rendered(graph: &Graph, title: &str) -> Vec<String> {
        graph
            .node(title)
            .unwrap()
            .expressions()
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn test_shape_keys() {
        let int_ptr = CType::pointer_to(CType::int_type());
        let char_ptr = CType::pointer_to(CType::char_type());
        assert_eq!(TypeShape::of(&int_ptr, true), TypeShape::of(&char_ptr, true));
        assert_ne!(
            TypeShape::of(&int_ptr, true),
            TypeShape::of(&int_ptr, false)
        );
        assert_eq!(TypeShape::of(&int_ptr, true).to_string(), "Pnumber");

        let arr_of_ptr = CType::array_of(CType::pointer_to(CType::void()), 2);
        assert_eq!(TypeShape::of(&arr_of_ptr, false).to_string(), "APvoid");
    }

    #[test]
    fn test_number_graph_nodes_and_members() {
        let mut eg = ExpressionGenerator::new(GraphOptions {
            cycle_depth: 1,
            loop_depth: 1,
            pointer_arithmetic: true,
            number_arithmetic: false,
        });
        let v = declared(CType::int_type());
        let graph = eg.graph_for(&v).unwrap();

        let titles: Vec<&str> = graph.nodes().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["v", "&v", "&v+z", "(&v)[z]"]);

        let addr = node_rendered(graph, "&v");
        assert!(addr.contains(&"&v".to_string()));
        assert!(addr.contains(&"&*&v".to_string()));
        assert!(addr.contains(&"&v + 0".to_string()));
    }

    #[test]
    fn test_no_address_of_rvalue() {
        use crate::expr::{ExprKind, UnaryOp};

        // address-of on an address-of (or any other rvalue) must never
        // be generated; it would print as `&&...`
        fn check(e: &crate::expr::Expression) {
            if let ExprKind::Unary { op, operand } = &e.kind {
                if *op == UnaryOp::AddrOf {
                    assert!(operand.lvalue, "& applied to rvalue {}", operand);
                }
                check(operand);
            }
            match &e.kind {
                ExprKind::Binary { left, right, .. } => {
                    check(left);
                    check(right);
                }
                ExprKind::Subscript { base, index } => {
                    check(base);
                    check(index);
                }
                _ => {}
            }
        }

        let mut eg = ExpressionGenerator::new(GraphOptions {
            cycle_depth: 2,
            loop_depth: 1,
            pointer_arithmetic: true,
            number_arithmetic: true,
        });
        let v = declared(CType::pointer_to(CType::int_type()));
        let graph = eg.graph_for(&v).unwrap();
        for node in graph.nodes() {
            for e in node.expressions() {
                check(e);
                assert!(!e.to_string().contains("&&"), "illegal && in {}", e);
            }
        }
    }

    #[test]
    fn test_monotonic_cycle_growth() {
        let sets: Vec<HashSet<String>> = (0..3)
            .map(|depth| {
                let mut eg = ExpressionGenerator::new(GraphOptions {
                    cycle_depth: depth,
                    loop_depth: 1,
                    pointer_arithmetic: true,
                    number_arithmetic: true,
                });
                let v = declared(CType::int_type());
                all_rendered(eg.graph_for(&v).unwrap())
            })
            .collect();
        assert!(sets[0].is_subset(&sets[1]));
        assert!(sets[1].is_subset(&sets[2]));
        assert!(sets[0].len() < sets[2].len());
    }

    #[test]
    fn test_memoization_is_idempotent() {
        let options = GraphOptions {
            cycle_depth: 1,
            loop_depth: 1,
            pointer_arithmetic: true,
            number_arithmetic: false,
        };

        // same generator: char* reuses the int* graph
        let mut eg = ExpressionGenerator::new(options);
        let int_ptr = declared(CType::pointer_to(CType::int_type()));
        let char_ptr = CType::pointer_to(CType::char_type())
            .declare("v", Alignment::NoAttr)
            .unwrap();
        let first = all_rendered(eg.graph_for(&int_ptr).unwrap());
        let built = eg.graphs().count();
        let second = all_rendered(eg.graph_for(&char_ptr).unwrap());
        assert_eq!(built, eg.graphs().count());
        assert_eq!(first, second);

        // cache reset: structurally identical rebuild
        let mut fresh = ExpressionGenerator::new(options);
        let rebuilt = fresh.graph_for(&int_ptr).unwrap();
        assert_eq!(all_rendered(rebuilt), first);
        let again = eg.graph_for(&int_ptr).unwrap();
        assert_eq!(
            rebuilt.nodes().len(),
            again.nodes().len()
        );
        assert_eq!(rebuilt.edges(), again.edges());
    }

    #[test]
    fn test_pointer_graph_has_dereferenced_node() {
        let mut eg = ExpressionGenerator::new(GraphOptions {
            cycle_depth: 1,
            loop_depth: 1,
            pointer_arithmetic: false,
            number_arithmetic: false,
        });
        let v = declared(CType::pointer_to(CType::char_type()));
        let graph = eg.graph_for(&v).unwrap();

        let titles: Vec<&str> = graph.nodes().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["v", "&v", "&v+z", "(&v)[z]", "*v"]);
        assert_eq!(
            graph.node("*v").unwrap().repr,
            ClassRepr::DerefTypeOf(1)
        );
        assert!(node_rendered(graph, "*v").contains(&"*v".to_string()));
        // linked to the pointer node through an edge
        assert!(graph
            .edges()
            .iter()
            .any(|e| e.from == "v" && e.to == "*v"));
    }

    #[test]
    fn test_double_pointer_recurses() {
        let mut eg = ExpressionGenerator::new(GraphOptions {
            cycle_depth: 1,
            loop_depth: 1,
            pointer_arithmetic: false,
            number_arithmetic: false,
        });
        let v = declared(CType::pointer_to(CType::pointer_to(CType::int_type())));
        let graph = eg.graph_for(&v).unwrap();
        let titles: Vec<&str> = graph.nodes().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["v", "&v", "&v+z", "(&v)[z]", "*v", "**v"]);
        assert_eq!(graph.node("**v").unwrap().repr, ClassRepr::DerefTypeOf(2));
    }

    #[test]
    fn test_populate_twice_is_a_state_error() {
        let eg = ExpressionGenerator::new(GraphOptions::default());
        let v = declared(CType::int_type());
        let mut graph = Graph::new(1, 1);
        eg.populate(&mut graph, &v).unwrap();
        assert!(matches!(
            eg.populate(&mut graph, &v),
            Err(ModelError::GraphAlreadyBuilt { .. })
        ));
    }

    #[test]
    fn test_number_arithmetic_adds_sums_of_v() {
        let mut eg = ExpressionGenerator::new(GraphOptions {
            cycle_depth: 1,
            loop_depth: 1,
            pointer_arithmetic: false,
            number_arithmetic: true,
        });
        let v = declared(CType::int_type());
        let graph = eg.graph_for(&v).unwrap();
        let class = node_rendered(graph, "(&v)[z]");
        for text in ["v + 0", "v + zero", "v + 1", "v + unit"] {
            assert!(class.contains(&text.to_string()), "missing {}", text);
        }
    }
}
