use crate::compute::Ledger;
use crate::grammar::Expr;
use crate::store::{NodeId, NodeKind, Registry};
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the dependency tree under `target` with the values held in `ledger`.
///
/// Nodes already printed higher up are shown as back-references. Lag links are
/// leaves: their base is the variable being traced one iteration earlier.
pub fn format_trace(registry: &Registry, ledger: &Ledger, target: NodeId) -> String {
    let mut tracer = Tracer {
        registry,
        ledger,
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    if target.index() < registry.count() {
        let _ = writeln!(tracer.output, "AUDIT TRACE for '{}':", registry.name(target));
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_node(target, 1, "");
    } else {
        let _ = writeln!(tracer.output, "Error: Invalid Node ID {:?}", target);
    }
    tracer.output
}

struct Tracer<'a> {
    registry: &'a Registry,
    ledger: &'a Ledger,
    visited_at_level: HashMap<NodeId, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_node(&mut self, node_id: NodeId, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&node_id) {
            let _ = writeln!(
                self.output,
                "{}{} -> (Ref to L{})",
                prefix,
                self.registry.name(node_id),
                first_seen
            );
            return;
        }
        self.visited_at_level.insert(node_id, level);

        let line_header = format!("[L{}] {}", level, self.format_ref(node_id));

        match self.registry.kind(node_id) {
            NodeKind::Parameter(_) => {
                let _ = writeln!(self.output, "{}{} -> Param", prefix, line_header);
            }
            NodeKind::Lagged { seed, depth, .. } => {
                let _ = writeln!(
                    self.output,
                    "{}{} -> Lag(depth={}, seed {})",
                    prefix,
                    line_header,
                    depth,
                    self.format_ref(*seed)
                );
            }
            NodeKind::Variable(_) => {
                let formula = self
                    .registry
                    .equation(node_id)
                    .map(Expr::to_string)
                    .unwrap_or_default();
                let _ = writeln!(self.output, "{}{} = {}", prefix, line_header, formula);

                let mut children = self.registry.get_parents(node_id).to_vec();
                children.extend(self.lag_reads(node_id));
                self.recurse_children(prefix, &children, level);
            }
        }
    }

    /// Lag links read by a variable's equation, in reading order.
    fn lag_reads(&self, node_id: NodeId) -> Vec<NodeId> {
        let Some(expr) = self.registry.equation(node_id) else {
            return Vec::new();
        };
        expr.lags()
            .iter()
            .filter_map(|(name, depth)| {
                let base = self.registry.lookup(name)?;
                let head = self.registry.lag_head(base)?;
                self.registry.lag_link(head, *depth)
            })
            .collect()
    }

    fn recurse_children(&mut self, prefix: &str, children: &[NodeId], level: usize) {
        let stem = self.build_child_stem(prefix);
        for (i, &child) in children.iter().enumerate() {
            let connector = if i == children.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            self.trace_node(child, level + 1, &full_prefix);
        }
    }

    fn format_ref(&self, id: NodeId) -> String {
        let value = self.ledger.get(id);
        if value.is_nan() {
            format!("{}[?]", self.registry.name(id))
        } else {
            format!("{}[{:.3}]", self.registry.name(id), value)
        }
    }

    fn build_child_stem(&self, current_prefix: &str) -> String {
        current_prefix.replace("`--", "   ").replace("|--", "|  ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse_expr;

    #[test]
    fn test_trace_shows_values_and_back_references() {
        let mut reg = Registry::new();
        let a = reg.add_parameter("A", 2.0);
        let b = reg.add_variable("B", parse_expr("A * 2").unwrap(), &[a], 2);
        let y = reg.add_variable("Y", parse_expr("A + B").unwrap(), &[a, b], 1);
        let ledger = Ledger::from_values(vec![2.0, 4.0, 6.0]);

        let out = format_trace(&reg, &ledger, y);
        assert!(out.contains("[L1] Y[6.000] = (A + B)"), "{}", out);
        assert!(out.contains("|--[L2] A[2.000] -> Param"), "{}", out);
        assert!(out.contains("`--[L2] B[4.000] = (A * 2)"), "{}", out);
        assert!(out.contains("A -> (Ref to L2)"), "{}", out);
    }

    #[test]
    fn test_trace_lists_lag_links_as_leaves() {
        let mut reg = Registry::new();
        let seed = reg.add_parameter("Y_t_minus_1", 5.0);
        let y = reg.add_variable("Y", parse_expr("LAG(Y, 1)").unwrap(), &[], 1);
        reg.add_lagged(y, 1, seed, y);
        let ledger = Ledger::from_values(vec![5.0, 5.0, 5.0]);

        let out = format_trace(&reg, &ledger, y);
        assert!(out.contains("`--[L2] LAG(Y,1)[5.000] -> Lag(depth=1, seed Y_t_minus_1[5.000])"), "{}", out);
    }

    #[test]
    fn test_unset_values_are_marked() {
        let mut reg = Registry::new();
        let a = reg.add_parameter("A", f64::NAN);
        let out = format_trace(&reg, &Ledger::from_values(vec![f64::NAN]), a);
        assert!(out.contains("A[?] -> Param"));
    }
}
