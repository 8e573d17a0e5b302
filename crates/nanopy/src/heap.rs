use std::{collections::BTreeMap, mem::size_of};

use strum::IntoStaticStr;

use crate::{
    function::Function,
    namespace::Scope,
    resource::{ResourceError, ResourceTracker},
    types::{BoundMethod, ClassObject, Dict, Instance, List, Range, Set, Str, Tuple, Type},
    value::Value,
};

/// Live-byte threshold that triggers the first collection.
///
/// After each collection the threshold becomes twice the surviving bytes, never
/// dropping below this value.
pub const INITIAL_GC_THRESHOLD_BYTES: usize = 256 * 1024;

/// Snapshot of heap state at a point in time.
///
/// The `objects_by_type` map uses `BTreeMap` for deterministic iteration order,
/// making snapshots suitable for display and comparison without sort overhead.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HeapStats {
    /// Total number of live objects on the heap.
    pub live_objects: usize,
    /// Number of tombstoned slots waiting on the free list.
    pub free_slots: usize,
    /// Total heap capacity (live + free).
    pub total_slots: usize,
    /// Breakdown of live objects by `HeapData` variant name ("List", "Scope", ...).
    pub objects_by_type: BTreeMap<&'static str, usize>,
    /// Estimated bytes held by live objects.
    pub live_bytes: usize,
    /// Live-byte threshold at which the next collection is requested.
    pub next_gc_bytes: usize,
    /// Number of completed collections.
    pub collections: usize,
    /// Objects reclaimed over all collections.
    pub total_freed: usize,
    /// Resource tracker allocation count, if the tracker records one.
    pub tracker_allocations: Option<usize>,
    /// Resource tracker memory usage in bytes, if the tracker records one.
    pub tracker_memory_bytes: Option<usize>,
}

/// Difference between two heap snapshots.
///
/// Computed by [`HeapStats::diff`]. Positive deltas mean growth. Types exclusive to
/// the "after" snapshot are listed in `new_types`; types exclusive to the "before"
/// snapshot are in `removed_types`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HeapDiff {
    pub live_objects_delta: isize,
    pub free_slots_delta: isize,
    pub total_slots_delta: isize,
    /// Per-type deltas. Only includes types present in either snapshot.
    pub objects_by_type_delta: BTreeMap<&'static str, isize>,
    pub new_types: Vec<&'static str>,
    pub removed_types: Vec<&'static str>,
    pub live_bytes_delta: isize,
    pub collections_delta: isize,
    /// Change in tracker allocations (only if both snapshots have the value).
    pub tracker_allocations_delta: Option<isize>,
    /// Change in tracker memory bytes (only if both snapshots have the value).
    pub tracker_memory_bytes_delta: Option<isize>,
}

impl HeapStats {
    /// Computes the difference between `self` ("before") and `other` ("after").
    ///
    /// # Example
    ///
    /// ```
    /// # use std::collections::BTreeMap;
    /// # use nanopy::HeapStats;
    /// let before = HeapStats {
    ///     live_objects: 2, free_slots: 0, total_slots: 2,
    ///     objects_by_type: BTreeMap::new(), live_bytes: 100, next_gc_bytes: 1024,
    ///     collections: 0, total_freed: 0,
    ///     tracker_allocations: None, tracker_memory_bytes: None,
    /// };
    /// let after = HeapStats { live_objects: 5, total_slots: 5, ..before.clone() };
    /// let diff = before.diff(&after);
    /// assert_eq!(diff.live_objects_delta, 3);
    /// ```
    #[must_use]
    pub fn diff(&self, other: &Self) -> HeapDiff {
        let (objects_by_type_delta, new_types, removed_types) =
            compute_type_deltas(&self.objects_by_type, &other.objects_by_type);

        HeapDiff {
            live_objects_delta: isize_delta(self.live_objects, other.live_objects),
            free_slots_delta: isize_delta(self.free_slots, other.free_slots),
            total_slots_delta: isize_delta(self.total_slots, other.total_slots),
            objects_by_type_delta,
            new_types,
            removed_types,
            live_bytes_delta: isize_delta(self.live_bytes, other.live_bytes),
            collections_delta: isize_delta(self.collections, other.collections),
            tracker_allocations_delta: optional_isize_delta(self.tracker_allocations, other.tracker_allocations),
            tracker_memory_bytes_delta: optional_isize_delta(self.tracker_memory_bytes, other.tracker_memory_bytes),
        }
    }
}

impl std::fmt::Display for HeapStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HeapStats: {} live objects ({} bytes), {} free of {} slots, {} collections freed {} objects",
            self.live_objects, self.live_bytes, self.free_slots, self.total_slots, self.collections, self.total_freed
        )?;
        for (type_name, count) in &self.objects_by_type {
            write!(f, "\n  {type_name}: {count}")?;
        }
        Ok(())
    }
}

impl HeapDiff {
    /// Returns `true` when all deltas are zero and no types were added or removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_objects_delta == 0
            && self.free_slots_delta == 0
            && self.total_slots_delta == 0
            && self.live_bytes_delta == 0
            && self.collections_delta == 0
            && self.new_types.is_empty()
            && self.removed_types.is_empty()
            && self.objects_by_type_delta.values().all(|&v| v == 0)
            && self.tracker_allocations_delta.is_none_or(|d| d == 0)
            && self.tracker_memory_bytes_delta.is_none_or(|d| d == 0)
    }
}

impl std::fmt::Display for HeapDiff {
    /// Example output:
    ///
    /// ```text
    /// HeapDiff: +3 live objects, +4 slots
    ///   List: +1
    ///   Str: +2
    ///   New types: Dict
    /// ```
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "HeapDiff: no changes");
        }

        write!(
            f,
            "HeapDiff: {:+} live objects, {:+} slots",
            self.live_objects_delta, self.total_slots_delta
        )?;

        for (&type_name, &delta) in &self.objects_by_type_delta {
            if delta != 0 {
                write!(f, "\n  {type_name}: {delta:+}")?;
            }
        }

        if !self.new_types.is_empty() {
            write!(f, "\n  New types: {}", self.new_types.join(", "))?;
        }
        if !self.removed_types.is_empty() {
            write!(f, "\n  Removed types: {}", self.removed_types.join(", "))?;
        }
        if self.live_bytes_delta != 0 {
            write!(f, "\n  Live bytes: {:+}", self.live_bytes_delta)?;
        }
        if self.collections_delta != 0 {
            write!(f, "\n  Collections: {:+}", self.collections_delta)?;
        }
        if let Some(alloc_delta) = self.tracker_allocations_delta
            && alloc_delta != 0
        {
            write!(f, "\n  Tracker allocations: {alloc_delta:+}")?;
        }
        if let Some(mem_delta) = self.tracker_memory_bytes_delta
            && mem_delta != 0
        {
            write!(f, "\n  Tracker memory: {mem_delta:+} bytes")?;
        }
        Ok(())
    }
}

fn isize_delta(before: usize, after: usize) -> isize {
    (after as isize).wrapping_sub(before as isize)
}

fn optional_isize_delta(before: Option<usize>, after: Option<usize>) -> Option<isize> {
    match (before, after) {
        (Some(b), Some(a)) => Some(isize_delta(b, a)),
        _ => None,
    }
}

/// Computes per-type deltas, plus lists of new and removed types.
fn compute_type_deltas(
    before: &BTreeMap<&'static str, usize>,
    after: &BTreeMap<&'static str, usize>,
) -> (BTreeMap<&'static str, isize>, Vec<&'static str>, Vec<&'static str>) {
    let mut deltas = BTreeMap::new();
    let mut new_types = Vec::new();
    let mut removed_types = Vec::new();

    for (&type_name, &count) in before {
        let after_count = after.get(type_name).copied().unwrap_or(0);
        deltas.insert(type_name, isize_delta(count, after_count));
        if !after.contains_key(type_name) {
            removed_types.push(type_name);
        }
    }

    for (&type_name, &count) in after {
        if !before.contains_key(type_name) {
            deltas.insert(type_name, count as isize);
            new_types.push(type_name);
        }
    }

    (deltas, new_types, removed_types)
}

/// Handle to an object in the heap arena.
///
/// The generation is bumped every time a slot is swept, so a handle that outlives
/// its object resolves to a tombstone instead of whatever was allocated next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct HeapId {
    index: u32,
    generation: u32,
}

impl HeapId {
    /// Returns the slot index.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Payload of a heap object. The variant is the kind tag the collector dispatches on.
#[derive(Debug, IntoStaticStr)]
pub(crate) enum HeapData {
    Str(Str),
    List(List),
    Tuple(Tuple),
    Set(Set),
    Dict(Dict),
    Range(Range),
    Function(Function),
    BoundMethod(BoundMethod),
    Class(ClassObject),
    Instance(Instance),
    Scope(Scope),
}

impl HeapData {
    /// Variant name, used for stats and tracing.
    pub fn type_name(&self) -> &'static str {
        self.into()
    }

    pub fn py_type(&self) -> Type {
        match self {
            Self::Str(_) => Type::Str,
            Self::List(_) => Type::List,
            Self::Tuple(_) => Type::Tuple,
            Self::Set(_) => Type::Set,
            Self::Dict(_) => Type::Dict,
            Self::Range(_) => Type::Range,
            Self::Function(_) => Type::Function,
            Self::BoundMethod(_) => Type::Method,
            Self::Class(_) => Type::Type,
            // scopes never escape into values; they only appear here for completeness
            Self::Instance(_) | Self::Scope(_) => Type::Instance,
        }
    }

    /// Rough size in bytes used for collector scheduling and memory limits.
    pub fn estimate_size(&self) -> usize {
        size_of::<Self>() + self.item_count() * self.item_size()
    }

    /// Bytes one more entry adds to this object.
    fn item_size(&self) -> usize {
        let value = size_of::<Value>();
        match self {
            Self::Str(_) => 1,
            Self::List(_) | Self::Tuple(_) | Self::Function(_) => value,
            Self::Set(_) => value + 2 * size_of::<usize>(),
            Self::Dict(_) => 2 * value + 2 * size_of::<usize>(),
            Self::Class(_) | Self::Instance(_) | Self::Scope(_) => value + size_of::<u64>(),
            Self::Range(_) | Self::BoundMethod(_) => 0,
        }
    }

    fn item_count(&self) -> usize {
        match self {
            Self::Str(s) => s.as_str().len(),
            Self::List(list) => list.len(),
            Self::Tuple(tuple) => tuple.len(),
            Self::Set(set) => set.len(),
            Self::Dict(dict) => dict.len(),
            Self::Range(_) | Self::BoundMethod(_) => 0,
            Self::Function(function) => function.defaults.len(),
            Self::Class(class) => class.attrs.len(),
            Self::Instance(instance) => instance.attrs.len(),
            Self::Scope(scope) => scope.len(),
        }
    }
}

/// Pushes every heap reference held by `data` onto `work_list`.
///
/// This is the outgoing-reference list of the object header: the only place the
/// collector needs to know about the shape of each kind.
fn collect_child_ids(data: &HeapData, work_list: &mut Vec<HeapId>) {
    match data {
        HeapData::Str(_) | HeapData::Range(_) => {}
        HeapData::List(list) => push_refs(list.as_slice(), work_list),
        HeapData::Tuple(tuple) => push_refs(tuple.as_slice(), work_list),
        HeapData::Set(set) => push_refs(set.iter(), work_list),
        HeapData::Dict(dict) => {
            for (key, value) in dict.iter() {
                push_refs([key, value], work_list);
            }
        }
        HeapData::Function(function) => {
            push_refs(&function.defaults, work_list);
            work_list.push(function.scope);
        }
        HeapData::BoundMethod(method) => {
            push_refs([&method.instance], work_list);
            work_list.push(method.function);
        }
        HeapData::Class(class) => {
            push_refs(class.attrs.values(), work_list);
            work_list.extend(class.parent);
        }
        HeapData::Instance(instance) => {
            push_refs(instance.attrs.values(), work_list);
            work_list.push(instance.class);
        }
        HeapData::Scope(scope) => {
            push_refs(scope.values(), work_list);
            work_list.extend(scope.parent);
        }
    }
}

fn push_refs<'a>(values: impl IntoIterator<Item = &'a Value>, work_list: &mut Vec<HeapId>) {
    work_list.extend(values.into_iter().filter_map(|value| value.ref_id()));
}

/// A live object: the collector's mark bit plus the payload.
#[derive(Debug)]
struct HeapValue {
    marked: bool,
    /// Size charged to the tracker at allocation plus any growth since, refunded on sweep.
    size: usize,
    data: HeapData,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    /// `None` for a tombstoned slot sitting on the free list.
    value: Option<HeapValue>,
}

/// Mark-and-sweep arena that backs all composite runtime values.
///
/// Objects are only ever freed by [`Heap::collect_garbage`]; nothing is released at
/// scope exit. Swept slots go on a free list and are reused by later allocations
/// under a new generation.
///
/// Generic over `T: ResourceTracker`; with `NoLimitTracker` every limit check
/// compiles away.
#[derive(Debug)]
pub(crate) struct Heap<T: ResourceTracker> {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    tracker: T,
    live_objects: usize,
    live_bytes: usize,
    next_gc_bytes: usize,
    allocations_since_gc: usize,
    /// Set by `gc_collect()`-style requests and honoured at the next safepoint.
    gc_requested: bool,
    collections: usize,
    total_freed: usize,
}

impl<T: ResourceTracker> Heap<T> {
    pub fn new(tracker: T) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            tracker,
            live_objects: 0,
            live_bytes: 0,
            next_gc_bytes: INITIAL_GC_THRESHOLD_BYTES,
            allocations_since_gc: 0,
            gc_requested: false,
            collections: 0,
            total_freed: 0,
        }
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    /// Allocates a new heap object.
    ///
    /// Returns `Err(ResourceError)` if the tracker refuses the allocation; in that
    /// case nothing is stored, so there are no partial objects.
    pub fn allocate(&mut self, data: HeapData) -> Result<HeapId, ResourceError> {
        let size = data.estimate_size();
        self.tracker.on_allocate(|| size)?;
        self.live_objects += 1;
        self.live_bytes += size;
        self.allocations_since_gc += 1;

        let value = HeapValue {
            marked: false,
            size,
            data,
        };
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none(), "free list holds a live slot");
            slot.value = Some(value);
            Ok(HeapId {
                index,
                generation: slot.generation,
            })
        } else {
            let index = u32::try_from(self.slots.len()).map_err(|_| ResourceError::Memory {
                limit: u32::MAX as usize,
                used: self.slots.len() + 1,
            })?;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            Ok(HeapId { index, generation: 0 })
        }
    }

    /// Returns the object behind `id`.
    ///
    /// # Panics
    /// Panics if `id` is stale. Every handle the evaluator holds is rooted, so a stale
    /// handle here means the root contract was broken.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        self.get_if_live(id).expect("Heap::get: stale heap handle")
    }

    /// Charges `items` new entries of the container `id` to the live bytes and the tracker.
    ///
    /// Call before inserting. Shrinking is never credited; the whole charge is
    /// released when the object is freed.
    pub fn grow(&mut self, id: HeapId, items: usize) -> Result<(), ResourceError> {
        let bytes = items * self.get(id).item_size();
        self.tracker.on_container_insert(bytes)?;
        self.live_bytes += bytes;
        if let Some(value) = self.slots.get_mut(id.index()).and_then(|slot| slot.value.as_mut()) {
            value.size += bytes;
        }
        Ok(())
    }

    /// Mutable counterpart of [`Heap::get`].
    ///
    /// # Panics
    /// Panics if `id` is stale.
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_mut())
            .map(|value| &mut value.data)
            .expect("Heap::get_mut: stale heap handle")
    }

    /// Returns the object behind `id`, or `None` if it has been reclaimed.
    #[must_use]
    pub fn get_if_live(&self, id: HeapId) -> Option<&HeapData> {
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_ref().map(|value| &value.data)
    }

    #[must_use]
    pub fn is_live(&self, id: HeapId) -> bool {
        self.get_if_live(id).is_some()
    }

    /// Whether a collection is due: live bytes crossed the threshold, the tracker's
    /// allocation interval elapsed, or a collection was explicitly requested.
    #[must_use]
    pub fn should_gc(&self) -> bool {
        self.gc_requested
            || self.live_bytes >= self.next_gc_bytes
            || self
                .tracker
                .gc_interval()
                .is_some_and(|interval| self.allocations_since_gc >= interval.max(1))
    }

    /// Asks for a collection at the next safepoint.
    pub fn request_gc(&mut self) {
        self.gc_requested = true;
    }

    /// Runs a full mark-and-sweep collection and returns the number of objects freed.
    ///
    /// Marking is iterative over an explicit work list, and each object is marked at
    /// most once, so cycles terminate. Every unmarked object is swept: its payload is
    /// dropped, its slot generation bumped and the slot pushed on the free list.
    /// Survivors have their mark cleared for the next cycle.
    ///
    /// # Arguments
    /// * `roots` - Every handle the evaluator considers live
    pub fn collect_garbage(&mut self, roots: impl IntoIterator<Item = HeapId>) -> usize {
        let mut work_list: Vec<HeapId> = roots.into_iter().collect();

        while let Some(id) = work_list.pop() {
            let Some(slot) = self.slots.get_mut(id.index()) else {
                continue;
            };
            debug_assert_eq!(slot.generation, id.generation, "collector reached a stale handle");
            if slot.generation != id.generation {
                continue;
            }
            let Some(value) = slot.value.as_mut() else {
                continue;
            };
            if value.marked {
                continue;
            }
            value.marked = true;
            collect_child_ids(&value.data, &mut work_list);
        }

        let mut freed = 0;
        let mut live_bytes = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            match &mut slot.value {
                Some(value) if value.marked => {
                    value.marked = false;
                    live_bytes += value.size;
                }
                Some(_) => {
                    if let Some(value) = slot.value.take() {
                        self.tracker.on_free(|| value.size);
                    }
                    freed += 1;
                    // a slot whose generation would wrap is retired, never reused
                    if let Some(generation) = slot.generation.checked_add(1) {
                        slot.generation = generation;
                        self.free_list.push(u32::try_from(index).unwrap_or(u32::MAX));
                    }
                }
                None => {}
            }
        }

        self.live_objects -= freed;
        self.live_bytes = live_bytes;
        self.next_gc_bytes = (live_bytes * 2).max(INITIAL_GC_THRESHOLD_BYTES);
        self.allocations_since_gc = 0;
        self.gc_requested = false;
        self.collections += 1;
        self.total_freed += freed;
        freed
    }

    pub fn live_objects(&self) -> usize {
        self.live_objects
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    pub fn next_gc_bytes(&self) -> usize {
        self.next_gc_bytes
    }

    pub fn collections(&self) -> usize {
        self.collections
    }

    /// Takes a snapshot of heap state.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut objects_by_type = BTreeMap::new();
        for value in self.slots.iter().filter_map(|slot| slot.value.as_ref()) {
            *objects_by_type.entry(value.data.type_name()).or_insert(0) += 1;
        }
        HeapStats {
            live_objects: self.live_objects,
            free_slots: self.free_list.len(),
            total_slots: self.slots.len(),
            objects_by_type,
            live_bytes: self.live_bytes,
            next_gc_bytes: self.next_gc_bytes,
            collections: self.collections,
            total_freed: self.total_freed,
            tracker_allocations: self.tracker.allocation_count(),
            tracker_memory_bytes: self.tracker.current_memory_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::{
        intern::StringId,
        resource::{LimitedTracker, NoLimitTracker, ResourceLimits},
    };

    fn list(heap: &mut Heap<NoLimitTracker>, items: Vec<Value>) -> HeapId {
        heap.allocate(HeapData::List(List::new(items))).unwrap()
    }

    fn instance(heap: &mut Heap<NoLimitTracker>, class: HeapId) -> HeapId {
        heap.allocate(HeapData::Instance(Instance::new(class))).unwrap()
    }

    fn class(heap: &mut Heap<NoLimitTracker>) -> HeapId {
        heap.allocate(HeapData::Class(ClassObject::new(StringId::default(), None, IndexMap::new())))
            .unwrap()
    }

    fn set_attr(heap: &mut Heap<NoLimitTracker>, obj: HeapId, name: u8, value: Value) {
        let HeapData::Instance(inst) = heap.get_mut(obj) else {
            panic!("expected instance");
        };
        inst.attrs.insert(StringId::from_ascii(name), value);
    }

    #[test]
    fn reachable_objects_survive() {
        let mut heap = Heap::new(NoLimitTracker);
        let inner = list(&mut heap, vec![Value::Int(1)]);
        let outer = list(&mut heap, vec![Value::Ref(inner)]);
        let freed = heap.collect_garbage([outer]);
        assert_eq!(freed, 0);
        let HeapData::List(outer_list) = heap.get(outer) else {
            panic!("expected list");
        };
        assert_eq!(outer_list.len(), 1);
        assert!(heap.is_live(inner));
    }

    #[test]
    fn unreachable_objects_are_reclaimed() {
        let mut heap = Heap::new(NoLimitTracker);
        let kept = list(&mut heap, vec![]);
        let garbage = list(&mut heap, vec![Value::Int(3)]);
        assert_eq!(heap.collect_garbage([kept]), 1);
        assert!(heap.get_if_live(garbage).is_none());
        assert_eq!(heap.live_objects(), 1);
    }

    #[test]
    fn instance_cycle_is_reclaimed_together() {
        let mut heap = Heap::new(NoLimitTracker);
        let cls = class(&mut heap);
        let baseline = heap.live_objects();
        let a = instance(&mut heap, cls);
        let b = instance(&mut heap, cls);
        set_attr(&mut heap, a, b'o', Value::Ref(b));
        set_attr(&mut heap, b, b'o', Value::Ref(a));
        // a self-reference as well
        set_attr(&mut heap, a, b's', Value::Ref(a));

        assert_eq!(heap.collect_garbage([cls]), 2);
        assert_eq!(heap.live_objects(), baseline);
        assert!(heap.is_live(cls));
    }

    #[test]
    fn instances_keep_their_class_alive() {
        let mut heap = Heap::new(NoLimitTracker);
        let cls = class(&mut heap);
        let obj = instance(&mut heap, cls);
        assert_eq!(heap.collect_garbage([obj]), 0);
        assert!(heap.is_live(cls));
    }

    #[test]
    fn stale_handles_become_tombstones() {
        let mut heap = Heap::new(NoLimitTracker);
        let old = list(&mut heap, vec![]);
        heap.collect_garbage([]);
        let new = list(&mut heap, vec![Value::Int(7)]);
        assert_eq!(old.index(), new.index(), "slot is reused");
        assert_ne!(old, new);
        assert!(heap.get_if_live(old).is_none());
        assert!(heap.get_if_live(new).is_some());
    }

    #[test]
    #[should_panic(expected = "stale heap handle")]
    fn get_on_stale_handle_panics() {
        let mut heap = Heap::new(NoLimitTracker);
        let id = list(&mut heap, vec![]);
        heap.collect_garbage([]);
        let _ = heap.get(id);
    }

    #[test]
    fn free_list_bounds_slot_growth_under_churn() {
        let mut heap = Heap::new(NoLimitTracker);
        let anchor = list(&mut heap, vec![]);
        for _ in 0..50 {
            for i in 0..20 {
                list(&mut heap, vec![Value::Int(i)]);
            }
            heap.collect_garbage([anchor]);
        }
        let stats = heap.stats();
        assert_eq!(stats.live_objects, 1);
        assert!(stats.total_slots <= 21, "slots grew to {}", stats.total_slots);
        assert_eq!(stats.total_freed, 1000);
    }

    #[test]
    fn marks_are_cleared_between_collections() {
        let mut heap = Heap::new(NoLimitTracker);
        let id = list(&mut heap, vec![]);
        heap.collect_garbage([id]);
        // a stale mark would let the object survive without a root
        assert_eq!(heap.collect_garbage([]), 1);
    }

    #[test]
    fn collecting_an_empty_heap_is_a_no_op() {
        let mut heap = Heap::new(NoLimitTracker);
        assert_eq!(heap.collect_garbage([]), 0);
        assert_eq!(heap.collect_garbage([]), 0);
        assert_eq!(heap.collections(), 2);
    }

    #[test]
    fn gc_interval_requests_collection() {
        let tracker = LimitedTracker::new(ResourceLimits::new().gc_interval(3));
        let mut heap = Heap::new(tracker);
        for _ in 0..2 {
            heap.allocate(HeapData::List(List::new(vec![]))).unwrap();
        }
        assert!(!heap.should_gc());
        heap.allocate(HeapData::List(List::new(vec![]))).unwrap();
        assert!(heap.should_gc());
        heap.collect_garbage([]);
        assert!(!heap.should_gc());
    }

    #[test]
    fn freed_memory_is_returned_to_the_tracker() {
        let tracker = LimitedTracker::new(ResourceLimits::new());
        let mut heap = Heap::new(tracker);
        heap.allocate(HeapData::Str(Str::from("some text"))).unwrap();
        assert!(heap.tracker().current_memory() > 0);
        heap.collect_garbage([]);
        assert_eq!(heap.tracker().current_memory(), 0);
    }

    #[test]
    fn exhausted_generation_retires_the_slot() {
        let mut heap = Heap::new(NoLimitTracker);
        let id = list(&mut heap, vec![]);
        heap.slots[id.index()].generation = u32::MAX;
        let last = HeapId {
            index: id.index,
            generation: u32::MAX,
        };
        assert!(heap.is_live(last));
        assert_eq!(heap.collect_garbage([]), 1);
        assert!(heap.get_if_live(last).is_none());
        let fresh = list(&mut heap, vec![]);
        assert_ne!(fresh.index(), id.index(), "retired slot must not be reused");
        assert_eq!(heap.stats().total_slots, 2);
        assert_eq!(heap.stats().free_slots, 0);
    }

    #[test]
    fn container_growth_is_charged_and_refunded() {
        let tracker = LimitedTracker::new(ResourceLimits::new());
        let mut heap = Heap::new(tracker);
        let id = heap.allocate(HeapData::List(List::new(vec![]))).unwrap();
        let empty = heap.live_bytes();
        heap.grow(id, 100).unwrap();
        let grown = 100 * size_of::<Value>();
        assert_eq!(heap.live_bytes(), empty + grown);
        assert_eq!(heap.tracker().current_memory(), empty + grown);
        // survivors keep their full charge across a collection
        heap.collect_garbage([id]);
        assert_eq!(heap.live_bytes(), empty + grown);
        heap.collect_garbage([]);
        assert_eq!(heap.live_bytes(), 0);
        assert_eq!(heap.tracker().current_memory(), 0);
    }

    #[test]
    fn growth_past_the_memory_limit_is_refused() {
        let tracker = LimitedTracker::new(ResourceLimits::new().max_memory(4096));
        let mut heap = Heap::new(tracker);
        let id = heap.allocate(HeapData::List(List::new(vec![]))).unwrap();
        let err = heap.grow(id, 4096).unwrap_err();
        assert!(matches!(err, ResourceError::Memory { .. }), "{err:?}");
    }

    #[test]
    fn growth_counts_towards_the_byte_threshold() {
        let mut heap = Heap::new(NoLimitTracker);
        let id = list(&mut heap, vec![]);
        assert!(!heap.should_gc());
        heap.grow(id, INITIAL_GC_THRESHOLD_BYTES / size_of::<Value>()).unwrap();
        assert!(heap.should_gc());
    }

    #[test]
    fn threshold_doubles_surviving_bytes() {
        let mut heap = Heap::new(NoLimitTracker);
        let big = heap
            .allocate(HeapData::Str(Str::from("x".repeat(INITIAL_GC_THRESHOLD_BYTES))))
            .unwrap();
        assert!(heap.should_gc());
        heap.collect_garbage([big]);
        assert!(heap.next_gc_bytes() >= 2 * INITIAL_GC_THRESHOLD_BYTES);
        assert!(!heap.should_gc());
    }

    #[test]
    fn stats_diff_reports_growth() {
        let mut heap = Heap::new(NoLimitTracker);
        let before = heap.stats();
        list(&mut heap, vec![]);
        heap.allocate(HeapData::Str(Str::from("abc"))).unwrap();
        let diff = before.diff(&heap.stats());
        assert_eq!(diff.live_objects_delta, 2);
        assert_eq!(diff.new_types, vec!["List", "Str"]);
        assert!(diff.to_string().starts_with("HeapDiff: +2 live objects"));
    }
}
