//! Binary, comparison and unary operators.
//!
//! Integers are fixed at 64 bits: anything that would leave `i64` raises
//! `OverflowError` instead of growing.

use crate::{
    eval::Evaluator,
    exception_private::{ExcType, RunError, RunResult, SimpleException},
    expressions::{CmpOperator, Operator},
    heap::HeapData,
    io::PrintWriter,
    resource::{LARGE_RESULT_THRESHOLD, ResourceTracker},
    tracer::EvalTracer,
    types::{List, Range, Tuple},
    value::{Number, Value},
};

impl<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer> Evaluator<'_, T, P, Tr> {
    /// `left op right` for the arithmetic operators.
    ///
    /// Both operands must already be rooted by the caller.
    pub(crate) fn binary_op(&mut self, left: Value, op: Operator, right: Value) -> RunResult<Value> {
        if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
            return numeric_op(a, op, b);
        }
        let result = match op {
            Operator::Add => self.concat(left, right)?,
            Operator::Mult => match (right.as_int(), left.as_int()) {
                (Some(count), _) => self.repeat(left, count)?,
                (None, Some(count)) => self.repeat(right, count)?,
                (None, None) => None,
            },
            Operator::And | Operator::Or => {
                return Err(RunError::internal("boolean operators are evaluated lazily"));
            }
            _ => None,
        };
        result.ok_or_else(|| {
            ExcType::binary_type_error(
                op.symbol(),
                &left.type_name(self.heap, self.interns),
                &right.type_name(self.heap, self.interns),
            )
        })
    }

    /// Augmented assignment: `list += iterable` extends the list in place,
    /// everything else behaves like the plain operator.
    pub(crate) fn inplace_op(&mut self, current: Value, op: Operator, rhs: Value) -> RunResult<Value> {
        if op == Operator::Add
            && let Value::Ref(id) = current
            && matches!(self.heap.get(id), HeapData::List(_))
        {
            let items = self.collect_iterable(rhs)?;
            self.heap.grow(id, items.len())?;
            if let HeapData::List(list) = self.heap.get_mut(id) {
                list.as_vec_mut().extend(items);
            }
            return Ok(current);
        }
        self.binary_op(current, op, rhs)
    }

    /// `str + str`, `list + list` and `tuple + tuple`; `None` for any other pair.
    fn concat(&mut self, left: Value, right: Value) -> RunResult<Option<Value>> {
        if let (Some(a), Some(b)) = (left.as_str(self.heap, self.interns), right.as_str(self.heap, self.interns)) {
            let joined = format!("{a}{b}");
            return self.alloc_str(joined).map(Some);
        }
        let (Value::Ref(a), Value::Ref(b)) = (left, right) else {
            return Ok(None);
        };
        let data = match (self.heap.get(a), self.heap.get(b)) {
            (HeapData::List(x), HeapData::List(y)) => {
                HeapData::List(List::new([x.as_slice(), y.as_slice()].concat()))
            }
            (HeapData::Tuple(x), HeapData::Tuple(y)) => {
                HeapData::Tuple(Tuple::new([x.as_slice(), y.as_slice()].concat()))
            }
            _ => return Ok(None),
        };
        self.allocate(data).map(Some)
    }

    /// `seq * count`; a count of zero or less gives an empty sequence.
    fn repeat(&mut self, seq: Value, count: i64) -> RunResult<Option<Value>> {
        let count = usize::try_from(count).unwrap_or(0);
        if let Some(s) = seq.as_str(self.heap, self.interns) {
            self.check_repeat_size(s.len(), count)?;
            let repeated = s.repeat(count);
            return self.alloc_str(repeated).map(Some);
        }
        let Value::Ref(id) = seq else {
            return Ok(None);
        };
        let data = match self.heap.get(id) {
            HeapData::List(list) => {
                self.check_repeat_size(list.len() * size_of::<Value>(), count)?;
                HeapData::List(List::new(list.as_slice().repeat(count)))
            }
            HeapData::Tuple(tuple) => {
                self.check_repeat_size(tuple.len() * size_of::<Value>(), count)?;
                HeapData::Tuple(Tuple::new(tuple.as_slice().repeat(count)))
            }
            _ => return Ok(None),
        };
        self.allocate(data).map(Some)
    }

    fn check_repeat_size(&self, unit_bytes: usize, count: usize) -> RunResult<()> {
        let Some(bytes) = unit_bytes.checked_mul(count) else {
            return Err(SimpleException::new_msg(ExcType::OverflowError, "repeated sequence is too long").into());
        };
        if bytes > LARGE_RESULT_THRESHOLD {
            self.heap.tracker().check_large_result(bytes)?;
        }
        Ok(())
    }

    /// Evaluates a comparison operator.
    pub(crate) fn compare(&mut self, left: Value, op: CmpOperator, right: Value) -> RunResult<bool> {
        match op {
            CmpOperator::Eq => Ok(left.py_eq(right, self.heap, self.interns)),
            CmpOperator::NotEq => Ok(!left.py_eq(right, self.heap, self.interns)),
            CmpOperator::Is => Ok(left.is_identical(right)),
            CmpOperator::IsNot => Ok(!left.is_identical(right)),
            CmpOperator::In => self.contains(right, left),
            CmpOperator::NotIn => self.contains(right, left).map(|found| !found),
            CmpOperator::Lt | CmpOperator::LtE | CmpOperator::Gt | CmpOperator::GtE => {
                let Some(ordering) = left.py_cmp(right, self.heap, self.interns) else {
                    // NaN is unordered but still comparable
                    if left.as_number().is_some() && right.as_number().is_some() {
                        return Ok(false);
                    }
                    return Err(ExcType::compare_type_error(
                        op.symbol(),
                        &left.type_name(self.heap, self.interns),
                        &right.type_name(self.heap, self.interns),
                    ));
                };
                Ok(match op {
                    CmpOperator::Lt => ordering.is_lt(),
                    CmpOperator::LtE => ordering.is_le(),
                    CmpOperator::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                })
            }
        }
    }

    /// `item in container`.
    fn contains(&self, container: Value, item: Value) -> RunResult<bool> {
        if let Some(haystack) = container.as_str(self.heap, self.interns) {
            return match item.as_str(self.heap, self.interns) {
                Some(needle) => Ok(haystack.contains(needle)),
                None => Err(ExcType::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    item.type_name(self.heap, self.interns)
                ))),
            };
        }
        if let Value::Ref(id) = container {
            match self.heap.get(id) {
                HeapData::List(list) => return Ok(self.any_equal(list.as_slice(), item)),
                HeapData::Tuple(tuple) => return Ok(self.any_equal(tuple.as_slice(), item)),
                HeapData::Set(set) => return set.contains(item, self.heap, self.interns),
                HeapData::Dict(dict) => return Ok(dict.get(item, self.heap, self.interns)?.is_some()),
                HeapData::Range(range) => return Ok(range_contains(range, item)),
                _ => {}
            }
        }
        Err(ExcType::type_error(format!(
            "argument of type '{}' is not iterable",
            container.type_name(self.heap, self.interns)
        )))
    }

    fn any_equal(&self, items: &[Value], item: Value) -> bool {
        items.iter().any(|candidate| candidate.py_eq(item, self.heap, self.interns))
    }

    /// Unary `-`.
    pub(crate) fn negate(&self, value: Value) -> RunResult<Value> {
        match value.as_number() {
            Some(Number::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(ExcType::overflow),
            Some(Number::Float(f)) => Ok(Value::Float(-f)),
            None => Err(ExcType::unary_type_error(
                "-",
                &value.type_name(self.heap, self.interns),
            )),
        }
    }
}

#[expect(clippy::cast_possible_truncation)]
fn range_contains(range: &Range, item: Value) -> bool {
    let value = match item.as_number() {
        Some(Number::Int(i)) => i,
        Some(Number::Float(f)) if f.fract() == 0.0 && f.abs() < 9.0e18 => f as i64,
        _ => return false,
    };
    let in_bounds = if range.step > 0 {
        range.start <= value && value < range.stop
    } else {
        range.stop < value && value <= range.start
    };
    in_bounds && (i128::from(value) - i128::from(range.start)) % i128::from(range.step) == 0
}

/// Arithmetic between two numbers, with `bool` already widened to `int`.
fn numeric_op(a: Number, op: Operator, b: Number) -> RunResult<Value> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => int_op(x, op, y),
        _ => float_op(a.as_f64(), op, b.as_f64(), false),
    }
}

fn int_op(x: i64, op: Operator, y: i64) -> RunResult<Value> {
    let checked = match op {
        Operator::Add => x.checked_add(y),
        Operator::Sub => x.checked_sub(y),
        Operator::Mult => x.checked_mul(y),
        Operator::Div => return float_op(x as f64, op, y as f64, true),
        Operator::FloorDiv => {
            if y == 0 {
                return Err(ExcType::zero_division("integer division or modulo by zero"));
            }
            x.checked_div(y).map(|q| if (x % y != 0) && ((x < 0) != (y < 0)) { q - 1 } else { q })
        }
        Operator::Mod => {
            if y == 0 {
                return Err(ExcType::zero_division("integer modulo by zero"));
            }
            x.checked_rem(y).map(|r| if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r })
        }
        Operator::Pow => return int_pow(x, y),
        Operator::And | Operator::Or => return Err(RunError::internal("boolean operators are evaluated lazily")),
    };
    checked.map(Value::Int).ok_or_else(ExcType::overflow)
}

fn int_pow(base: i64, exp: i64) -> RunResult<Value> {
    if exp < 0 {
        if base == 0 {
            return Err(ExcType::zero_division("0.0 cannot be raised to a negative power"));
        }
        #[expect(clippy::cast_possible_truncation)]
        let exp = exp.max(i64::from(i32::MIN)) as i32;
        return Ok(Value::Float((base as f64).powi(exp)));
    }
    match base {
        0 | 1 => return Ok(Value::Int(if exp == 0 { 1 } else { base })),
        -1 => return Ok(Value::Int(if exp % 2 == 0 { 1 } else { -1 })),
        _ => {}
    }
    u32::try_from(exp)
        .ok()
        .and_then(|exp| base.checked_pow(exp))
        .map(Value::Int)
        .ok_or_else(ExcType::overflow)
}

/// Float arithmetic; `both_int` selects the integer wording of division errors.
fn float_op(x: f64, op: Operator, y: f64, both_int: bool) -> RunResult<Value> {
    let result = match op {
        Operator::Add => x + y,
        Operator::Sub => x - y,
        Operator::Mult => x * y,
        Operator::Div => {
            if y == 0.0 {
                return Err(ExcType::zero_division(if both_int {
                    "division by zero"
                } else {
                    "float division by zero"
                }));
            }
            x / y
        }
        Operator::FloorDiv => {
            if y == 0.0 {
                return Err(ExcType::zero_division("float floor division by zero"));
            }
            (x / y).floor()
        }
        Operator::Mod => {
            if y == 0.0 {
                return Err(ExcType::zero_division("float modulo"));
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else if r == 0.0 {
                0.0_f64.copysign(y)
            } else {
                r
            }
        }
        Operator::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(ExcType::zero_division("0.0 cannot be raised to a negative power"));
            }
            x.powf(y)
        }
        Operator::And | Operator::Or => return Err(RunError::internal("boolean operators are evaluated lazily")),
    };
    Ok(Value::Float(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: RunResult<Value>) -> i64 {
        match value {
            Ok(Value::Int(i)) => i,
            other => panic!("expected an int, got {other:?}"),
        }
    }

    fn float(value: RunResult<Value>) -> f64 {
        match value {
            Ok(Value::Float(f)) => f,
            other => panic!("expected a float, got {other:?}"),
        }
    }

    #[test]
    fn floor_division_and_modulo_round_toward_negative_infinity() {
        assert_eq!(int(int_op(7, Operator::FloorDiv, 2)), 3);
        assert_eq!(int(int_op(-7, Operator::FloorDiv, 2)), -4);
        assert_eq!(int(int_op(7, Operator::FloorDiv, -2)), -4);
        assert_eq!(int(int_op(-7, Operator::Mod, 3)), 2);
        assert_eq!(int(int_op(7, Operator::Mod, -3)), -2);
        assert!((float(float_op(-7.5, Operator::Mod, 2.0, false)) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn overflow_is_an_error() {
        let err = int_op(i64::MAX, Operator::Add, 1).unwrap_err();
        assert!(err.is_exception_type(ExcType::OverflowError));
        let err = int_pow(2, 64).unwrap_err();
        assert!(err.is_exception_type(ExcType::OverflowError));
        assert_eq!(int(int_pow(-1, 1_000_001)), -1);
    }

    #[test]
    fn division_by_zero_messages_depend_on_operand_types() {
        let err = int_op(1, Operator::Div, 0).unwrap_err();
        assert!(err.is_exception_type(ExcType::ZeroDivisionError));
        let err = float_op(1.0, Operator::FloorDiv, 0.0, false).unwrap_err();
        assert!(err.is_exception_type(ExcType::ZeroDivisionError));
        let err = int_pow(0, -1).unwrap_err();
        assert!(err.is_exception_type(ExcType::ZeroDivisionError));
    }

    #[test]
    fn true_division_and_negative_powers_give_floats() {
        assert!((float(int_op(7, Operator::Div, 2)) - 3.5).abs() < f64::EPSILON);
        assert!((float(int_pow(2, -2)) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn range_membership_follows_the_step() {
        let range = Range::new(0, 10, 3);
        assert!(range_contains(&range, Value::Int(9)));
        assert!(!range_contains(&range, Value::Int(10)));
        assert!(!range_contains(&range, Value::Int(4)));
        let down = Range::new(10, 0, -2);
        assert!(range_contains(&down, Value::Float(4.0)));
        assert!(!range_contains(&down, Value::Int(0)));
    }
}
