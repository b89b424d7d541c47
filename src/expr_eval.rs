use crate::{
    core::{ExprId, Value, ValueMode},
    error::{VfxError, VfxResult},
    expr::{BinaryOp, ExprKind, UnaryOp},
    graph::{ExprGraph, ExprNode},
};

impl ExprGraph {
    /// Host-evaluates `id` over its reduced parents. Arithmetic folds to a new literal; a value
    /// evaluates to itself; descriptor and wrapper kinds are rebuilt over the folded parents.
    pub fn evaluate(&mut self, id: ExprId, parents: &[ExprId]) -> VfxResult<ExprId> {
        let node = self.node(id)?.clone();
        self.calls_mut(id).evaluate += 1;

        match node.kind() {
            ExprKind::Value { .. } => Ok(id),
            ExprKind::Binary { func } => {
                let (a, a_mode) = self.literal(parents, 0)?;
                let (b, b_mode) = self.literal(parents, 1)?;
                let value = eval_binary(*func, &a, &b)?;
                Ok(self.variable(value, a_mode.max(b_mode)))
            }
            ExprKind::Unary { func } => {
                let (a, mode) = self.literal(parents, 0)?;
                let value = eval_unary(*func, &a)?;
                Ok(self.variable(value, mode))
            }
            _ => Ok(self.rebuild(&node, parents)),
        }
    }

    /// Structural rebuild of `id` over new parents. Returns `id` itself when nothing changed.
    pub fn reduce(&mut self, id: ExprId, parents: &[ExprId]) -> VfxResult<ExprId> {
        let node = self.node(id)?.clone();
        self.calls_mut(id).reduce += 1;

        if let ExprKind::Binary { func } = node.kind() {
            if let Some(operand) = self.simplify_binary(*func, parents) {
                return Ok(operand);
            }
        }

        if node.parents() == parents {
            return Ok(id);
        }
        Ok(self.rebuild(&node, parents))
    }

    fn rebuild(&mut self, node: &ExprNode, parents: &[ExprId]) -> ExprId {
        self.alloc_pinned(node.kind().clone(), parents, node.extra_flags())
    }

    fn literal(&self, parents: &[ExprId], i: usize) -> VfxResult<(Value, ValueMode)> {
        let Some(&id) = parents.get(i) else {
            return Err(VfxError::evaluation(format!("missing operand {i}")));
        };
        match self.node(id)?.kind() {
            ExprKind::Value { value, mode } => Ok((value.clone(), *mode)),
            other => Err(VfxError::evaluation(format!(
                "operand {i} is {} and not a value",
                other.operation()
            ))),
        }
    }

    // x+0, 0+x, x-0, x*1, 1*x, x/1 against constant literals.
    fn simplify_binary(&self, func: BinaryOp, parents: &[ExprId]) -> Option<ExprId> {
        let &[a, b] = parents else {
            return None;
        };
        let is_splat = |id: ExprId, scalar: i32| match self.get(id).map(ExprNode::kind) {
            Some(ExprKind::Value {
                value,
                mode: ValueMode::Constant,
            }) => value.is_splat(scalar),
            _ => false,
        };

        match func {
            BinaryOp::Add if is_splat(b, 0) => Some(a),
            BinaryOp::Add if is_splat(a, 0) => Some(b),
            BinaryOp::Subtract if is_splat(b, 0) => Some(a),
            BinaryOp::Multiply if is_splat(b, 1) => Some(a),
            BinaryOp::Multiply if is_splat(a, 1) => Some(b),
            BinaryOp::Divide if is_splat(b, 1) => Some(a),
            _ => None,
        }
    }
}

fn eval_binary(func: BinaryOp, a: &Value, b: &Value) -> VfxResult<Value> {
    let f = |x: f32, y: f32| float_op(func, x, y);
    Ok(match (a, b) {
        (Value::Float(x), Value::Float(y)) => Value::Float(f(*x, *y)),
        (Value::Float2(x), Value::Float2(y)) => Value::Float2(zip_lanes(x, y, f)),
        (Value::Float3(x), Value::Float3(y)) => Value::Float3(zip_lanes(x, y, f)),
        (Value::Float4(x), Value::Float4(y)) => Value::Float4(zip_lanes(x, y, f)),
        (Value::Int(x), Value::Int(y)) => Value::Int(int_op(func, *x, *y)?),
        (Value::Uint(x), Value::Uint(y)) => Value::Uint(uint_op(func, *x, *y)?),
        _ => {
            return Err(VfxError::evaluation(format!(
                "cannot apply {func:?} to {:?} and {:?}",
                a.value_type(),
                b.value_type()
            )));
        }
    })
}

fn eval_unary(func: UnaryOp, a: &Value) -> VfxResult<Value> {
    let f = |x: f32| match func {
        UnaryOp::Absolute => x.abs(),
        UnaryOp::Sine => x.sin(),
        UnaryOp::Cosine => x.cos(),
        UnaryOp::SquareRoot => x.sqrt(),
    };
    Ok(match (func, a) {
        (_, Value::Float(x)) => Value::Float(f(*x)),
        (_, Value::Float2(x)) => Value::Float2(x.map(f)),
        (_, Value::Float3(x)) => Value::Float3(x.map(f)),
        (_, Value::Float4(x)) => Value::Float4(x.map(f)),
        (UnaryOp::Absolute, Value::Int(x)) => Value::Int(x.wrapping_abs()),
        (UnaryOp::Absolute, Value::Uint(x)) => Value::Uint(*x),
        _ => {
            return Err(VfxError::evaluation(format!(
                "cannot apply {func:?} to {:?}",
                a.value_type()
            )));
        }
    })
}

fn zip_lanes<const N: usize>(x: &[f32; N], y: &[f32; N], f: impl Fn(f32, f32) -> f32) -> [f32; N] {
    std::array::from_fn(|i| f(x[i], y[i]))
}

fn float_op(func: BinaryOp, x: f32, y: f32) -> f32 {
    match func {
        BinaryOp::Add => x + y,
        BinaryOp::Subtract => x - y,
        BinaryOp::Multiply => x * y,
        BinaryOp::Divide => x / y,
        BinaryOp::Minimum => x.min(y),
        BinaryOp::Maximum => x.max(y),
    }
}

fn int_op(func: BinaryOp, x: i32, y: i32) -> VfxResult<i32> {
    Ok(match func {
        BinaryOp::Add => x.wrapping_add(y),
        BinaryOp::Subtract => x.wrapping_sub(y),
        BinaryOp::Multiply => x.wrapping_mul(y),
        BinaryOp::Divide => x
            .checked_div(y)
            .ok_or_else(|| VfxError::evaluation("integer division by zero or overflow"))?,
        BinaryOp::Minimum => x.min(y),
        BinaryOp::Maximum => x.max(y),
    })
}

fn uint_op(func: BinaryOp, x: u32, y: u32) -> VfxResult<u32> {
    Ok(match func {
        BinaryOp::Add => x.wrapping_add(y),
        BinaryOp::Subtract => x.wrapping_sub(y),
        BinaryOp::Multiply => x.wrapping_mul(y),
        BinaryOp::Divide => x
            .checked_div(y)
            .ok_or_else(|| VfxError::evaluation("integer division by zero"))?,
        BinaryOp::Minimum => x.min(y),
        BinaryOp::Maximum => x.max(y),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprFlags;

    #[test]
    fn evaluate_folds_componentwise() {
        let mut g = ExprGraph::new();
        let a = g.constant(Value::Float3([1.0, 2.0, 3.0]));
        let b = g.constant(Value::Float3([4.0, 5.0, 6.0]));
        let mul = g.binary(BinaryOp::Multiply, a, b).unwrap();

        let folded = g.evaluate(mul, &[a, b]).unwrap();
        assert_eq!(
            g[folded].kind().value(),
            Some(&Value::Float3([4.0, 10.0, 18.0]))
        );
        assert_eq!(g.call_counts(mul).evaluate, 1);
    }

    #[test]
    fn folded_value_takes_weakest_mode() {
        let mut g = ExprGraph::new();
        let a = g.constant(Value::Float(1.0));
        let b = g.variable(Value::Float(2.0), ValueMode::FoldableVariable);
        let add = g.binary(BinaryOp::Add, a, b).unwrap();

        let folded = g.evaluate(add, &[a, b]).unwrap();
        assert_eq!(g[folded].kind().value_mode(), Some(ValueMode::FoldableVariable));
        assert!(g[folded].is(ExprFlags::VALUE | ExprFlags::FOLDABLE));
        assert!(!g[folded].is_any(ExprFlags::CONSTANT));
    }

    #[test]
    fn integer_division_by_zero_is_an_evaluation_error() {
        let mut g = ExprGraph::new();
        let a = g.constant(Value::Int(4));
        let b = g.constant(Value::Int(0));
        let div = g.binary(BinaryOp::Divide, a, b).unwrap();

        let err = g.evaluate(div, &[a, b]).unwrap_err();
        assert!(matches!(err, VfxError::Evaluation(_)));
    }

    #[test]
    fn value_evaluates_to_itself() {
        let mut g = ExprGraph::new();
        let a = g.constant(Value::Bool(true));
        assert_eq!(g.evaluate(a, &[]).unwrap(), a);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn reduce_reuses_identity_when_parents_are_unchanged() {
        let mut g = ExprGraph::new();
        let a = g.variable(Value::Float(1.0), ValueMode::Variable);
        let s = g.unary(UnaryOp::Sine, a).unwrap();
        assert_eq!(g.reduce(s, &[a]).unwrap(), s);
        assert_eq!(g.call_counts(s).reduce, 1);
    }

    #[test]
    fn reduce_rebuilds_over_new_parents() {
        let mut g = ExprGraph::new();
        let a = g.variable(Value::Float(1.0), ValueMode::Variable);
        let b = g.variable(Value::Float(2.0), ValueMode::Variable);
        let s = g.unary(UnaryOp::Cosine, a).unwrap();

        let r = g.reduce(s, &[b]).unwrap();
        assert_ne!(r, s);
        assert_eq!(g[r].parents(), &[b]);
        assert_eq!(g[r].kind(), g[s].kind());
    }

    #[test]
    fn reduce_drops_identity_operands() {
        let mut g = ExprGraph::new();
        let x = g.variable(Value::Float2([1.0, 2.0]), ValueMode::Variable);
        let zero = g.constant(Value::Float2([0.0, 0.0]));
        let one = g.constant(Value::Float2([1.0, 1.0]));
        let add = g.binary(BinaryOp::Add, zero, x).unwrap();
        let mul = g.binary(BinaryOp::Multiply, x, one).unwrap();
        let sub = g.binary(BinaryOp::Subtract, zero, x).unwrap();

        assert_eq!(g.reduce(add, &[zero, x]).unwrap(), x);
        assert_eq!(g.reduce(mul, &[x, one]).unwrap(), x);
        assert_eq!(g.reduce(sub, &[zero, x]).unwrap(), sub);
    }

    #[test]
    fn variable_identity_operand_is_not_simplified() {
        let mut g = ExprGraph::new();
        let x = g.variable(Value::Float(3.0), ValueMode::Variable);
        let zero = g.variable(Value::Float(0.0), ValueMode::Variable);
        let add = g.binary(BinaryOp::Add, x, zero).unwrap();
        assert_eq!(g.reduce(add, &[x, zero]).unwrap(), add);
    }
}
