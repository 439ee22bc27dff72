//! Expression priority rebalancing.
//!
//! Recursive descent builds an expression as a right-recursive chain: each
//! node holds one term (`lft`), an optional operator, and the rest of the
//! chain in `rgt`. That chain ignores operator priorities, so after parsing
//! it is restructured in place: for each priority level `p` from 1 (weakest,
//! `and`/`or`) upward, the first chain node at exactly `p` found below a
//! stronger node is spliced above it. The splice re-points `lft`/`rgt`/
//! `parent_node` indices only; no nodes are allocated or re-parsed. The
//! recursion descends with `p + 1` on the left child but keeps `p` on the
//! right child so remaining same-priority nodes are still found.

use crate::ast::{Expression, Operand};

impl Expression {
    /// Rebalance the freshly parsed chain rooted at `self.root`.
    pub fn prioritize(&mut self) {
        self.prioritize_from(self.root, 1);
    }

    fn prioritize_from(&mut self, start: usize, prio: u8) {
        if prio == 6 {
            return;
        }

        // Walk the right spine past everything binding no tighter than prio.
        let mut walk = Some(start);
        while let Some(index) = walk {
            if self.nodes[index].priority() <= prio {
                walk = self.rgt_node(index);
            } else {
                break;
            }
        }
        let Some(root) = walk else {
            self.prioritize_from(start, prio + 1);
            return;
        };

        // Find the next chain node at exactly this priority.
        let mut previous = root;
        let mut found = self.rgt_node(root);
        while let Some(index) = found {
            if self.nodes[index].priority() == prio {
                break;
            }
            previous = index;
            found = self.rgt_node(index);
        }
        let Some(current) = found else {
            self.prioritize_from(start, prio + 1);
            return;
        };

        // Splice `current` above `root`: its left operand moves to the chain
        // position it vacates, and `root`'s subtree becomes its left child.
        let lifted = self.nodes[current].lft.take();
        if let Some(Operand::Node(child)) = lifted {
            self.nodes[child].parent_node = Some(previous);
        }
        self.nodes[previous].rgt = lifted;
        self.nodes[current].lft = Some(Operand::Node(root));
        let parent = self.nodes[root].parent_node;
        match parent {
            None => self.root = current,
            Some(up) => self.nodes[up].rgt = Some(Operand::Node(current)),
        }
        self.nodes[current].parent_node = parent;
        self.nodes[root].parent_node = Some(current);

        self.prioritize_from(root, prio + 1);
        if let Some(right) = self.rgt_node(current) {
            self.prioritize_from(right, prio);
        }
    }

    fn rgt_node(&self, index: usize) -> Option<usize> {
        match self.nodes[index].rgt {
            Some(Operand::Node(next)) => Some(next),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expression, ExpressionNode, Op, Operand, Term};

    /// Build the chain the parser would produce for terms t0 op0 t1 op1 t2...
    fn chain(values: &[i64], ops: &[Op]) -> Expression {
        assert_eq!(values.len(), ops.len() + 1);
        let mut nodes = Vec::new();
        for (index, value) in values.iter().enumerate() {
            let is_last = index == values.len() - 1;
            nodes.push(ExpressionNode {
                lft: Some(Operand::Term(Term::Number(*value))),
                op: ops.get(index).copied(),
                rgt: if is_last {
                    None
                } else {
                    Some(Operand::Node(index + 1))
                },
                parent_node: if index == 0 { None } else { Some(index - 1) },
            });
        }
        Expression { nodes, root: 0 }
    }

    fn term_value(operand: &Operand) -> i64 {
        match operand {
            Operand::Term(Term::Number(value)) => *value,
            other => panic!("expected a number term, got {other:?}"),
        }
    }

    #[test]
    fn weaker_operator_is_lifted_above_stronger_prefix() {
        // 1 * 2 + 3 parses as 1 * (2 + 3); rebalancing yields (1 * 2) + 3.
        let mut expr = chain(&[1, 2, 3], &[Op::Mul, Op::Add]);
        expr.prioritize();

        let root = &expr.nodes[expr.root];
        assert_eq!(root.op, Some(Op::Add));
        let Some(Operand::Node(lft)) = root.lft else {
            panic!("root should own the multiplication subtree");
        };
        let mul = &expr.nodes[lft];
        assert_eq!(mul.op, Some(Op::Mul));
        assert_eq!(term_value(mul.lft.as_ref().unwrap()), 1);
        assert_eq!(term_value(mul.rgt.as_ref().unwrap()), 2);
        // The splice leaves the trailing term wrapped in its original chain
        // node, now operator-free.
        let Some(Operand::Node(rgt)) = root.rgt else {
            panic!("root should keep the trailing chain node on the right");
        };
        let tail = &expr.nodes[rgt];
        assert_eq!(tail.op, None);
        assert_eq!(term_value(tail.lft.as_ref().unwrap()), 3);
        assert_eq!(mul.parent_node, Some(expr.root));
    }

    #[test]
    fn tighter_suffix_is_left_in_place() {
        // 1 + 2 * 3 already nests correctly in the chain.
        let mut expr = chain(&[1, 2, 3], &[Op::Add, Op::Mul]);
        expr.prioritize();

        let root = &expr.nodes[expr.root];
        assert_eq!(root.op, Some(Op::Add));
        assert_eq!(term_value(root.lft.as_ref().unwrap()), 1);
        let Some(Operand::Node(rgt)) = root.rgt else {
            panic!("root's right child should be the multiplication");
        };
        assert_eq!(expr.nodes[rgt].op, Some(Op::Mul));
    }

    #[test]
    fn comparison_is_lifted_above_both_arithmetic_sides() {
        // 1 + 2 is 3 * 1  →  (1 + 2) is (3 * 1)
        let mut expr = chain(&[1, 2, 3, 1], &[Op::Add, Op::Is, Op::Mul]);
        expr.prioritize();

        let root = &expr.nodes[expr.root];
        assert_eq!(root.op, Some(Op::Is));
        let Some(Operand::Node(lft)) = root.lft else {
            panic!("left side should be the addition subtree");
        };
        assert_eq!(expr.nodes[lft].op, Some(Op::Add));
        let Some(Operand::Node(rgt)) = root.rgt else {
            panic!("right side should be the multiplication subtree");
        };
        assert_eq!(expr.nodes[rgt].op, Some(Op::Mul));
    }

    #[test]
    fn logical_operators_end_up_at_the_root() {
        // 1 is 2 or 3 is 3  →  (1 is 2) or (3 is 3)
        let mut expr = chain(&[1, 2, 3, 3], &[Op::Is, Op::Or, Op::Is]);
        expr.prioritize();
        assert_eq!(expr.nodes[expr.root].op, Some(Op::Or));
    }

    #[test]
    fn single_term_chains_are_untouched() {
        let mut expr = chain(&[7], &[]);
        expr.prioritize();
        assert_eq!(expr.root, 0);
        assert_eq!(expr.nodes[0].op, None);
        assert_eq!(term_value(expr.nodes[0].lft.as_ref().unwrap()), 7);
    }
}
