//! Calling a builtin type: `str(x)`, `int(x)`, `list(iterable)`, `range(n)`, ...

use crate::{
    args::ArgValues,
    eval::Evaluator,
    exception_private::{ExcType, RunError, RunResult, SimpleException},
    heap::{HeapData, HeapId},
    io::PrintWriter,
    resource::ResourceTracker,
    tracer::EvalTracer,
    types::{Dict, List, Range, Set, Tuple, Type, dict::dict_set},
    value::{Number, Value},
};

/// Constructs a value of builtin type `ty` from the call arguments.
pub fn builtin_type_call<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &mut Evaluator<'_, T, P, Tr>,
    ty: Type,
    args: ArgValues,
) -> RunResult<Value> {
    let name = ty.name();
    if ty == Type::Dict {
        args.check_range(name, 0, 1)?;
        return construct_dict(ev, args);
    }
    args.check_no_kwargs(name, ev.interns)?;
    if ty == Type::Range {
        args.check_range(name, 1, 3)?;
        return construct_range(ev, &args);
    }
    args.check_range(name, 0, 1)?;
    let arg = args.args.first().copied();
    match ty {
        Type::Str => match arg {
            None => ev.alloc_str(String::new()),
            Some(value) if value.py_type(ev.heap) == Type::Str => Ok(value),
            Some(value) => {
                let text = value.py_str(ev.heap, ev.interns).into_owned();
                ev.alloc_str(text)
            }
        },
        Type::Int => match arg {
            Some(value) => to_int(ev, value),
            None => Ok(Value::Int(0)),
        },
        Type::Float => match arg {
            Some(value) => to_float(ev, value),
            None => Ok(Value::Float(0.0)),
        },
        Type::Bool => Ok(Value::Bool(arg.is_some_and(|value| value.py_bool(ev.heap, ev.interns)))),
        Type::List => {
            let items = match arg {
                Some(iterable) => ev.collect_iterable(iterable)?,
                None => Vec::new(),
            };
            ev.allocate(HeapData::List(List::new(items)))
        }
        Type::Tuple => {
            let items = match arg {
                Some(iterable) => ev.collect_iterable(iterable)?,
                None => Vec::new(),
            };
            ev.allocate(HeapData::Tuple(Tuple::new(items)))
        }
        Type::Set => {
            let mut set = Set::new();
            if let Some(iterable) = arg {
                for item in ev.collect_iterable(iterable)? {
                    set.add(item, ev.heap, ev.interns)?;
                }
            }
            ev.allocate(HeapData::Set(set))
        }
        _ => Err(ExcType::type_error(format!("cannot create '{name}' instances"))),
    }
}

#[expect(clippy::cast_possible_truncation)]
fn to_int<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &Evaluator<'_, T, P, Tr>,
    value: Value,
) -> RunResult<Value> {
    match value.as_number() {
        Some(Number::Int(i)) => return Ok(Value::Int(i)),
        Some(Number::Float(f)) => {
            if f.is_nan() {
                return Err(SimpleException::new_msg(ExcType::ValueError, "cannot convert float NaN to integer").into());
            }
            if f.is_infinite() {
                return Err(
                    SimpleException::new_msg(ExcType::OverflowError, "cannot convert float infinity to integer").into(),
                );
            }
            let truncated = f.trunc();
            if !(-9.223_372_036_854_776e18..9.223_372_036_854_776e18).contains(&truncated) {
                return Err(ExcType::overflow());
            }
            return Ok(Value::Int(truncated as i64));
        }
        None => {}
    }
    if let Some(s) = value.as_str(ev.heap, ev.interns) {
        return parse_int(s).map(Value::Int).ok_or_else(|| {
            SimpleException::new_msg(
                ExcType::ValueError,
                format!(
                    "invalid literal for int() with base 10: {}",
                    value.py_repr(ev.heap, ev.interns)
                ),
            )
            .into()
        });
    }
    Err(ExcType::type_error(format!(
        "int() argument must be a string or a real number, not '{}'",
        value.type_name(ev.heap, ev.interns)
    )))
}

/// Python's base-10 `int()` literal syntax: surrounding whitespace, an optional
/// sign, and digits with single underscores between them.
fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return None;
    }
    let mut result: i64 = 0;
    for c in digits.chars().filter(|&c| c != '_') {
        let digit = i64::from(c.to_digit(10)?);
        result = result.checked_mul(10)?;
        result = if negative {
            result.checked_sub(digit)?
        } else {
            result.checked_add(digit)?
        };
    }
    Some(result)
}

fn to_float<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &Evaluator<'_, T, P, Tr>,
    value: Value,
) -> RunResult<Value> {
    if let Some(number) = value.as_number() {
        return Ok(Value::Float(number.as_f64()));
    }
    if let Some(s) = value.as_str(ev.heap, ev.interns) {
        let trimmed = s.trim();
        let parsed = if trimmed.contains('_') {
            None
        } else {
            trimmed.parse::<f64>().ok()
        };
        return parsed.map(Value::Float).ok_or_else(|| {
            SimpleException::new_msg(
                ExcType::ValueError,
                format!("could not convert string to float: {}", value.py_repr(ev.heap, ev.interns)),
            )
            .into()
        });
    }
    Err(ExcType::type_error(format!(
        "float() argument must be a string or a real number, not '{}'",
        value.type_name(ev.heap, ev.interns)
    )))
}

fn construct_range<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &mut Evaluator<'_, T, P, Tr>,
    args: &ArgValues,
) -> RunResult<Value> {
    let mut bounds = [0i64; 3];
    for (slot, value) in bounds.iter_mut().zip(&args.args) {
        *slot = value.as_int().ok_or_else(|| -> RunError {
            ExcType::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name(ev.heap, ev.interns)
            ))
        })?;
    }
    let range = match args.args.len() {
        1 => Range::new(0, bounds[0], 1),
        2 => Range::new(bounds[0], bounds[1], 1),
        _ => {
            if bounds[2] == 0 {
                return Err(SimpleException::new_msg(ExcType::ValueError, "range() arg 3 must not be zero").into());
            }
            Range::new(bounds[0], bounds[1], bounds[2])
        }
    };
    ev.allocate(HeapData::Range(range))
}

/// `dict()`, `dict(mapping)`, `dict(pairs)` and `dict(key=value, ...)`.
fn construct_dict<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &mut Evaluator<'_, T, P, Tr>,
    args: ArgValues,
) -> RunResult<Value> {
    let id = match ev.allocate(HeapData::Dict(Dict::new()))? {
        Value::Ref(id) => id,
        _ => return Err(RunError::internal("dict allocation returned a scalar")),
    };
    if let Some(&source) = args.args.first() {
        let pairs = dict_source_pairs(ev, source)?;
        for (key, value) in pairs {
            dict_set(ev.heap, id, key, value, ev.interns)?;
        }
    }
    for &(key, value) in &args.kwargs {
        dict_set(ev.heap, id, Value::InternString(key), value, ev.interns)?;
    }
    Ok(Value::Ref(id))
}

fn dict_source_pairs<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &mut Evaluator<'_, T, P, Tr>,
    source: Value,
) -> RunResult<Vec<(Value, Value)>> {
    if let Value::Ref(id) = source
        && let HeapData::Dict(dict) = ev.heap.get(id)
    {
        return Ok(dict.iter().map(|(key, value)| (*key, *value)).collect());
    }
    let items = ev.collect_iterable(source)?;
    let mut pairs = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match pair_items(ev, item) {
            Some([key, value]) => pairs.push((key, value)),
            None => {
                return Err(ExcType::type_error(format!(
                    "cannot convert dictionary update sequence element #{index} to a sequence of length 2"
                )));
            }
        }
    }
    Ok(pairs)
}

fn pair_items<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &Evaluator<'_, T, P, Tr>,
    item: Value,
) -> Option<[Value; 2]> {
    let id: HeapId = item.ref_id()?;
    let items = match ev.heap.get(id) {
        HeapData::List(list) => list.as_slice(),
        HeapData::Tuple(tuple) => tuple.as_slice(),
        _ => return None,
    };
    match items {
        [key, value] => Some([*key, *value]),
        _ => None,
    }
}
