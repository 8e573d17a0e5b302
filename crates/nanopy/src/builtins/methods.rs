//! Methods of the builtin types: `list`, `dict`, `set` and `str`.
//!
//! Mutating methods go in two phases: look up with a shared borrow of the heap,
//! charge the tracker for any growth, then mutate through `get_mut`.

use crate::{
    args::ArgValues,
    eval::Evaluator,
    exception_private::{ExcType, RunError, RunResult, SimpleException},
    heap::{HeapData, HeapId},
    intern::{StaticStrings, StringId},
    io::PrintWriter,
    resource::{LARGE_RESULT_THRESHOLD, ResourceTracker},
    tracer::EvalTracer,
    types::{
        List, Tuple,
        dict::dict_pop,
        set::{set_add, set_discard},
        str::{find, split},
    },
    value::Value,
};

impl<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer> Evaluator<'_, T, P, Tr> {
    /// `object.attr(args)` where `object` is a value of a builtin type.
    pub(crate) fn call_method(&mut self, object: Value, attr: StringId, args: ArgValues) -> RunResult<Value> {
        let method = StaticStrings::from_string_id(attr);
        if let Some(s) = object.as_str(self.heap, self.interns) {
            let s = s.to_owned();
            return self.call_str_method(&s, method, attr, args);
        }
        if let Value::Ref(id) = object {
            match self.heap.get(id) {
                HeapData::List(_) => return self.call_list_method(id, method, attr, args),
                HeapData::Dict(_) => return self.call_dict_method(id, method, attr, args),
                HeapData::Set(_) => return self.call_set_method(id, method, attr, args),
                _ => {}
            }
        }
        Err(self.no_attribute(object, attr))
    }

    fn no_attribute(&self, object: Value, attr: StringId) -> RunError {
        ExcType::attribute_error(
            object.type_name(self.heap, self.interns),
            self.interns.get_str(attr),
        )
    }

    fn method_name(&self, type_name: &str, attr: StringId) -> String {
        format!("{type_name}.{}", self.interns.get_str(attr))
    }

    fn call_list_method(
        &mut self,
        id: HeapId,
        method: Option<StaticStrings>,
        attr: StringId,
        args: ArgValues,
    ) -> RunResult<Value> {
        let name = self.method_name("list", attr);
        args.check_no_kwargs(&name, self.interns)?;
        match method {
            Some(StaticStrings::Append) => {
                args.check_exact(&name, 1)?;
                self.heap.grow(id, 1)?;
                self.list_mut(id)?.append(args.args[0]);
                Ok(Value::None)
            }
            Some(StaticStrings::Insert) => {
                args.check_exact(&name, 2)?;
                let index = self.int_arg(args.args[0])?;
                self.heap.grow(id, 1)?;
                self.list_mut(id)?.insert(index, args.args[1]);
                Ok(Value::None)
            }
            Some(StaticStrings::Pop) => {
                args.check_range(&name, 0, 1)?;
                let index = match args.args.first() {
                    Some(&index) => Some(self.int_arg(index)?),
                    None => None,
                };
                let list = self.list_mut(id)?;
                if list.is_empty() {
                    return Err(SimpleException::new_msg(ExcType::IndexError, "pop from empty list").into());
                }
                list.pop(index)
                    .ok_or_else(|| SimpleException::new_msg(ExcType::IndexError, "pop index out of range").into())
            }
            Some(StaticStrings::Index) => {
                args.check_exact(&name, 1)?;
                let needle = args.args[0];
                let position = self
                    .list_items(id)
                    .iter()
                    .position(|item| item.py_eq(needle, self.heap, self.interns));
                match position {
                    Some(position) => Ok(Value::Int(i64::try_from(position).unwrap_or(i64::MAX))),
                    None => Err(SimpleException::new_msg(
                        ExcType::ValueError,
                        format!("{} is not in list", needle.py_repr(self.heap, self.interns)),
                    )
                    .into()),
                }
            }
            Some(StaticStrings::Count) => {
                args.check_exact(&name, 1)?;
                let needle = args.args[0];
                let count = self
                    .list_items(id)
                    .iter()
                    .filter(|item| item.py_eq(needle, self.heap, self.interns))
                    .count();
                Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
            }
            _ => Err(self.no_attribute(Value::Ref(id), attr)),
        }
    }

    fn list_items(&self, id: HeapId) -> &[Value] {
        match self.heap.get(id) {
            HeapData::List(list) => list.as_slice(),
            _ => &[],
        }
    }

    fn list_mut(&mut self, id: HeapId) -> RunResult<&mut List> {
        match self.heap.get_mut(id) {
            HeapData::List(list) => Ok(list),
            _ => Err(RunError::internal("list method called on a non-list")),
        }
    }

    fn call_dict_method(
        &mut self,
        id: HeapId,
        method: Option<StaticStrings>,
        attr: StringId,
        args: ArgValues,
    ) -> RunResult<Value> {
        let name = self.method_name("dict", attr);
        args.check_no_kwargs(&name, self.interns)?;
        let HeapData::Dict(dict) = self.heap.get(id) else {
            return Err(self.no_attribute(Value::Ref(id), attr));
        };
        match method {
            Some(StaticStrings::Get) => {
                args.check_range(&name, 1, 2)?;
                let found = dict.get(args.args[0], self.heap, self.interns)?;
                Ok(found.unwrap_or_else(|| args.args.get(1).copied().unwrap_or(Value::None)))
            }
            Some(StaticStrings::Keys) => {
                args.check_exact(&name, 0)?;
                let keys = dict.iter().map(|(key, _)| *key).collect();
                self.allocate(HeapData::List(List::new(keys)))
            }
            Some(StaticStrings::Values) => {
                args.check_exact(&name, 0)?;
                let values = dict.iter().map(|(_, value)| *value).collect();
                self.allocate(HeapData::List(List::new(values)))
            }
            Some(StaticStrings::Items) => {
                args.check_exact(&name, 0)?;
                let pairs: Vec<(Value, Value)> = dict.iter().map(|(key, value)| (*key, *value)).collect();
                let mut items = Vec::with_capacity(pairs.len());
                for (key, value) in pairs {
                    items.push(self.allocate(HeapData::Tuple(Tuple::new(vec![key, value])))?);
                }
                self.allocate(HeapData::List(List::new(items)))
            }
            Some(StaticStrings::Pop) => {
                args.check_range(&name, 1, 2)?;
                let key = args.args[0];
                match dict_pop(self.heap, id, key, self.interns)? {
                    Some(value) => Ok(value),
                    None => match args.args.get(1) {
                        Some(&default) => Ok(default),
                        None => Err(ExcType::key_error(key.py_repr(self.heap, self.interns))),
                    },
                }
            }
            _ => Err(self.no_attribute(Value::Ref(id), attr)),
        }
    }

    fn call_set_method(
        &mut self,
        id: HeapId,
        method: Option<StaticStrings>,
        attr: StringId,
        args: ArgValues,
    ) -> RunResult<Value> {
        let name = self.method_name("set", attr);
        args.check_no_kwargs(&name, self.interns)?;
        match method {
            Some(StaticStrings::Add) => {
                args.check_exact(&name, 1)?;
                set_add(self.heap, id, args.args[0], self.interns)?;
                Ok(Value::None)
            }
            Some(StaticStrings::Remove) => {
                args.check_exact(&name, 1)?;
                let item = args.args[0];
                if set_discard(self.heap, id, item, self.interns)? {
                    Ok(Value::None)
                } else {
                    Err(ExcType::key_error(item.py_repr(self.heap, self.interns)))
                }
            }
            Some(StaticStrings::Discard) => {
                args.check_exact(&name, 1)?;
                set_discard(self.heap, id, args.args[0], self.interns)?;
                Ok(Value::None)
            }
            _ => Err(self.no_attribute(Value::Ref(id), attr)),
        }
    }

    fn call_str_method(
        &mut self,
        s: &str,
        method: Option<StaticStrings>,
        attr: StringId,
        args: ArgValues,
    ) -> RunResult<Value> {
        let name = self.method_name("str", attr);
        args.check_no_kwargs(&name, self.interns)?;
        match method {
            Some(StaticStrings::Upper) => {
                args.check_exact(&name, 0)?;
                self.alloc_str(s.to_uppercase())
            }
            Some(StaticStrings::Lower) => {
                args.check_exact(&name, 0)?;
                self.alloc_str(s.to_lowercase())
            }
            Some(StaticStrings::Strip) => {
                args.check_range(&name, 0, 1)?;
                let stripped = match self.optional_str_arg(args.args.first().copied())? {
                    Some(chars) => s.trim_matches(|c: char| chars.contains(c)),
                    None => s.trim(),
                };
                self.alloc_str(stripped.to_owned())
            }
            Some(StaticStrings::Split) => {
                args.check_range(&name, 0, 2)?;
                let sep = self.optional_str_arg(args.args.first().copied())?;
                let maxsplit = match args.args.get(1) {
                    // negative means no limit
                    Some(&limit) => usize::try_from(self.int_arg(limit)?).ok(),
                    None => None,
                };
                let Some(parts) = split(s, sep.as_deref(), maxsplit) else {
                    return Err(SimpleException::new_msg(ExcType::ValueError, "empty separator").into());
                };
                let mut items = Vec::with_capacity(parts.len());
                for part in parts {
                    items.push(self.alloc_str(part.to_owned())?);
                }
                self.allocate(HeapData::List(List::new(items)))
            }
            Some(StaticStrings::Join) => {
                args.check_exact(&name, 1)?;
                let items = self.collect_iterable(args.args[0])?;
                let mut joined = String::new();
                for (index, item) in items.iter().enumerate() {
                    let Some(part) = item.as_str(self.heap, self.interns) else {
                        return Err(ExcType::type_error(format!(
                            "sequence item {index}: expected str instance, {} found",
                            item.type_name(self.heap, self.interns)
                        )));
                    };
                    if index > 0 {
                        joined.push_str(s);
                    }
                    joined.push_str(part);
                }
                self.alloc_str(joined)
            }
            Some(StaticStrings::Replace) => {
                args.check_range(&name, 2, 3)?;
                let old = self.str_arg(args.args[0])?;
                let new = self.str_arg(args.args[1])?;
                let replaced = match args.args.get(2) {
                    Some(&count) => match usize::try_from(self.int_arg(count)?) {
                        Ok(count) => s.replacen(&old, &new, count),
                        Err(_) => s.replace(&old, &new),
                    },
                    None => s.replace(&old, &new),
                };
                if replaced.len() > LARGE_RESULT_THRESHOLD {
                    self.heap.tracker().check_large_result(replaced.len())?;
                }
                self.alloc_str(replaced)
            }
            Some(StaticStrings::Startswith) => {
                args.check_exact(&name, 1)?;
                let prefix = self.str_arg(args.args[0])?;
                Ok(Value::Bool(s.starts_with(&prefix)))
            }
            Some(StaticStrings::Endswith) => {
                args.check_exact(&name, 1)?;
                let suffix = self.str_arg(args.args[0])?;
                Ok(Value::Bool(s.ends_with(&suffix)))
            }
            Some(StaticStrings::Find) => {
                args.check_exact(&name, 1)?;
                let sub = self.str_arg(args.args[0])?;
                Ok(Value::Int(find(s, &sub)))
            }
            _ => Err(ExcType::attribute_error("str", self.interns.get_str(attr))),
        }
    }

    fn str_arg(&self, value: Value) -> RunResult<String> {
        match value.as_str(self.heap, self.interns) {
            Some(s) => Ok(s.to_owned()),
            None => Err(ExcType::type_error(format!(
                "must be str, not {}",
                value.type_name(self.heap, self.interns)
            ))),
        }
    }

    fn optional_str_arg(&self, value: Option<Value>) -> RunResult<Option<String>> {
        match value {
            None | Some(Value::None) => Ok(None),
            Some(value) => self.str_arg(value).map(Some),
        }
    }

    fn int_arg(&self, value: Value) -> RunResult<i64> {
        value.as_int().ok_or_else(|| {
            ExcType::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name(self.heap, self.interns)
            ))
        })
    }
}
