//! An in-process managed engine implementing [`Boundary`].
//!
//! [`Heap`] is a non-moving mark/sweep heap that models just enough of a managed engine for the
//! boundary protocol: the native reference table, function and object templates, contexts,
//! functions, and instances. It is what tests and embeddings without a real engine plug into an
//! [`Engine`](crate::Engine).
//!
//! # References and GC
//!
//! Every reference handed across the boundary is a slot in the heap's reference table
//! `{ target, strength }`, addressed by a generation-checked [`ObjectRef`]:
//! - strong references are GC roots;
//! - weak references are not traced; after a sweep frees their target they are cleared and any
//!   further use fails with [`BridgeError::InvalidHandle`];
//! - releasing a reference bumps the slot generation, so stale copies are detected.
//!
//! Managed objects keep each other alive through their own fields (a template keeps its data,
//! signature, parent and sub-templates; a context keeps the functions materialized in it). This is
//! why callback data can be held weakly by the native registry: the template owns it.

use crate::boundary::Boundary;
use crate::boundary::CreateTemplate;
use crate::boundary::PreparedCall;
use crate::BridgeError;
use crate::CallbackRef;
use crate::ObjectRef;
use crate::Strength;
use crate::TemplateId;
use core::fmt;
use core::mem;

/// Hard upper bound for template parent chain walks done by the heap.
const MAX_PARENT_CHAIN: usize = 10_000;

/// Heap configuration and memory limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapLimits {
  /// Hard memory limit for live heap allocations, in bytes.
  pub max_bytes: usize,
  /// When an allocation would cause `used_bytes` to exceed this threshold, the heap will trigger a
  /// GC cycle before attempting the allocation.
  pub gc_threshold: usize,
}

impl HeapLimits {
  pub fn new(max_bytes: usize, gc_threshold: usize) -> Self {
    Self {
      max_bytes,
      gc_threshold,
    }
  }
}

impl Default for HeapLimits {
  fn default() -> Self {
    Self::new(16 * 1024 * 1024, 8 * 1024 * 1024)
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
struct HeapId(u64);

impl HeapId {
  fn from_parts(index: u32, generation: u32) -> Self {
    Self((index as u64) | ((generation as u64) << 32))
  }

  #[inline]
  fn index(self) -> u32 {
    self.0 as u32
  }

  #[inline]
  fn generation(self) -> u32 {
    (self.0 >> 32) as u32
  }
}

impl fmt::Debug for HeapId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HeapId")
      .field("index", &self.index())
      .field("generation", &self.generation())
      .finish()
  }
}

/// A non-moving mark/sweep heap acting as the managed side of the boundary.
pub struct Heap {
  limits: HeapLimits,

  /// Bytes used by live allocations.
  used_bytes: usize,
  gc_runs: u64,

  // GC-managed allocations.
  slots: Vec<Slot>,
  marks: Vec<u8>,
  free_list: Vec<u32>,

  // References held by native code.
  references: Vec<ReferenceSlot>,
  references_free: Vec<u32>,

  // Ids a request is still working with; traced as roots while it allocates.
  root_stack: Vec<HeapId>,

  // Permanently live.
  undefined: HeapId,
}

impl Heap {
  pub fn new(limits: HeapLimits) -> Self {
    debug_assert!(
      limits.gc_threshold <= limits.max_bytes,
      "gc_threshold should be <= max_bytes"
    );

    let mut heap = Self {
      limits,
      used_bytes: 0,
      gc_runs: 0,
      slots: Vec::new(),
      marks: Vec::new(),
      free_list: Vec::new(),
      references: Vec::new(),
      references_free: Vec::new(),
      root_stack: Vec::new(),
      undefined: HeapId::from_parts(0, 0),
    };
    heap.undefined = heap.alloc_unchecked(HeapObject::Undefined, 0);
    heap
  }

  pub fn limits(&self) -> HeapLimits {
    self.limits
  }

  /// Bytes currently used by live heap allocations.
  pub fn used_bytes(&self) -> usize {
    self.used_bytes
  }

  /// Total number of GC cycles that have run.
  pub fn gc_runs(&self) -> u64 {
    self.gc_runs
  }

  /// Number of references currently held by native code (strong or weak).
  pub fn live_references(&self) -> usize {
    self
      .references
      .iter()
      .filter(|slot| slot.entry.is_some())
      .count()
  }

  /// Explicitly runs a GC cycle.
  pub fn collect_garbage(&mut self) {
    self.gc_runs += 1;

    // Mark.
    {
      debug_assert_eq!(self.slots.len(), self.marks.len());

      let slots = &self.slots;
      let marks = &mut self.marks[..];

      let mut tracer = Tracer::new(slots, marks);
      tracer.trace(self.undefined);
      for &id in &self.root_stack {
        tracer.trace(id);
      }
      for entry in self.references.iter().filter_map(|slot| slot.entry.as_ref()) {
        if entry.strength == Strength::Strong {
          if let Some(target) = entry.target {
            tracer.trace(target);
          }
        }
      }

      while let Some(id) = tracer.pop_work() {
        let Some(idx) = tracer.validate(id) else {
          continue;
        };
        if tracer.marks[idx] != 0 {
          continue;
        }
        tracer.marks[idx] = 1;

        let Some(obj) = tracer.slots[idx].value.as_ref() else {
          debug_assert!(false, "validated heap id points to a free slot: {id:?}");
          continue;
        };
        obj.trace(&mut tracer);
      }
    }

    // Sweep.
    for (idx, slot) in self.slots.iter_mut().enumerate() {
      let marked = self.marks[idx] != 0;
      // Reset mark bits for next cycle.
      self.marks[idx] = 0;

      if slot.value.is_none() {
        debug_assert!(!marked);
        continue;
      }

      if marked {
        continue;
      }

      self.used_bytes = self.used_bytes.saturating_sub(slot.bytes);
      slot.value = None;
      slot.bytes = 0;
      slot.generation = slot.generation.wrapping_add(1);
      self.free_list.push(idx as u32);
    }

    // Clear weak references whose target did not survive.
    for idx in 0..self.references.len() {
      let target = self.references[idx]
        .entry
        .as_ref()
        .and_then(|entry| entry.target);
      if let Some(target) = target {
        if self.validate(target).is_none() {
          if let Some(entry) = self.references[idx].entry.as_mut() {
            debug_assert_eq!(entry.strength, Strength::Weak, "strong reference lost its target");
            entry.target = None;
          }
        }
      }
    }
  }

  // Reference table.

  fn new_reference(&mut self, target: HeapId, independent: bool) -> ObjectRef {
    let entry = ReferenceEntry {
      target: Some(target),
      strength: Strength::Strong,
      independent,
    };
    let idx = match self.references_free.pop() {
      Some(idx) => idx as usize,
      None => {
        self.references.push(ReferenceSlot {
          generation: 0,
          entry: None,
        });
        self.references.len() - 1
      }
    };
    let slot = &mut self.references[idx];
    debug_assert!(slot.entry.is_none(), "free list returned an occupied reference");
    slot.entry = Some(entry);
    ObjectRef::from_parts(idx as u32, slot.generation)
  }

  fn reference_entry(&self, reference: ObjectRef) -> Result<&ReferenceEntry, BridgeError> {
    let slot = self
      .references
      .get(reference.index() as usize)
      .ok_or(BridgeError::InvalidHandle)?;
    if slot.generation != reference.generation() {
      return Err(BridgeError::InvalidHandle);
    }
    slot.entry.as_ref().ok_or(BridgeError::InvalidHandle)
  }

  fn reference_entry_mut(&mut self, reference: ObjectRef) -> Result<&mut ReferenceEntry, BridgeError> {
    let slot = self
      .references
      .get_mut(reference.index() as usize)
      .ok_or(BridgeError::InvalidHandle)?;
    if slot.generation != reference.generation() {
      return Err(BridgeError::InvalidHandle);
    }
    slot.entry.as_mut().ok_or(BridgeError::InvalidHandle)
  }

  /// Dereferences `reference` to the object it targets.
  fn resolve(&self, reference: ObjectRef) -> Result<HeapId, BridgeError> {
    let target = self
      .reference_entry(reference)?
      .target
      .ok_or(BridgeError::InvalidHandle)?;
    self.validate(target).ok_or(BridgeError::InvalidHandle)?;
    Ok(target)
  }

  /// Returns `true` if the reference was created by a deep copy.
  pub fn is_independent(&self, reference: ObjectRef) -> Result<bool, BridgeError> {
    Ok(self.reference_entry(reference)?.independent)
  }

  /// The callback address a function template was last given, as seen by the managed side.
  pub fn template_callback_address(&self, template: ObjectRef) -> Result<Option<usize>, BridgeError> {
    let template = self.resolve(template)?;
    Ok(self.template(template)?.callback)
  }

  // Typed access.

  fn get_heap_object(&self, id: HeapId) -> Result<&HeapObject, BridgeError> {
    let idx = self.validate(id).ok_or(BridgeError::InvalidHandle)?;
    self.slots[idx].value.as_ref().ok_or(BridgeError::InvalidHandle)
  }

  fn get_heap_object_mut(&mut self, id: HeapId) -> Result<&mut HeapObject, BridgeError> {
    let idx = self.validate(id).ok_or(BridgeError::InvalidHandle)?;
    self.slots[idx].value.as_mut().ok_or(BridgeError::InvalidHandle)
  }

  fn template(&self, id: HeapId) -> Result<&TemplateRecord, BridgeError> {
    match self.get_heap_object(id)? {
      HeapObject::FunctionTemplate(t) => Ok(t),
      _ => Err(BridgeError::WrongKind("function template")),
    }
  }

  fn template_mut(&mut self, id: HeapId) -> Result<&mut TemplateRecord, BridgeError> {
    match self.get_heap_object_mut(id)? {
      HeapObject::FunctionTemplate(t) => Ok(t),
      _ => Err(BridgeError::WrongKind("function template")),
    }
  }

  fn function(&self, id: HeapId) -> Result<&JsFunction, BridgeError> {
    match self.get_heap_object(id)? {
      HeapObject::Function(f) => Ok(f),
      _ => Err(BridgeError::WrongKind("function")),
    }
  }

  fn expect_context(&self, id: HeapId) -> Result<(), BridgeError> {
    match self.get_heap_object(id)? {
      HeapObject::Context(_) => Ok(()),
      _ => Err(BridgeError::WrongKind("context")),
    }
  }

  /// Returns `true` if `value` was instantiated from `template` or a descendant of it.
  fn is_instance_of(&self, template: HeapId, value: HeapId) -> Result<bool, BridgeError> {
    let HeapObject::Object(obj) = self.get_heap_object(value)? else {
      return Ok(false);
    };
    let mut current = obj.template;
    let mut steps = 0usize;
    while let Some(t) = current {
      if t == template {
        return Ok(true);
      }
      if steps >= MAX_PARENT_CHAIN {
        return Err(BridgeError::InheritanceChainTooDeep);
      }
      steps += 1;
      current = self.template(t)?.parent;
    }
    Ok(false)
  }

  /// Fetches or lazily creates a template's instance or prototype template.
  fn sub_template(&mut self, template: HeapId, instance: bool) -> Result<HeapId, BridgeError> {
    let record = self.template(template)?;
    let existing = if instance {
      record.instance_template
    } else {
      record.prototype_template
    };
    if let Some(existing) = existing {
      return Ok(existing);
    }

    let sub = self.alloc_rooted(
      HeapObject::ObjectTemplate(ObjectTemplateRecord {
        instances_of: instance.then_some(template),
      }),
      &[template],
    )?;
    let record = self.template_mut(template)?;
    if instance {
      record.instance_template = Some(sub);
    } else {
      record.prototype_template = Some(sub);
    }
    Ok(sub)
  }

  // Allocation.

  fn alloc(&mut self, obj: HeapObject) -> Result<HeapId, BridgeError> {
    let bytes = obj.heap_size_bytes();
    self.ensure_can_allocate(bytes)?;
    Ok(self.alloc_unchecked(obj, bytes))
  }

  /// Allocates `obj` while keeping `roots` alive across any GC the allocation triggers.
  ///
  /// Every id `obj` points at must be in `roots`: a request may have resolved them through weak
  /// references only.
  fn alloc_rooted(&mut self, obj: HeapObject, roots: &[HeapId]) -> Result<HeapId, BridgeError> {
    let root_stack_len_at_entry = self.root_stack.len();
    self.root_stack.extend_from_slice(roots);
    let result = self.alloc(obj);
    self.root_stack.truncate(root_stack_len_at_entry);
    result
  }

  fn validate(&self, id: HeapId) -> Option<usize> {
    let idx = id.index() as usize;
    let slot = self.slots.get(idx)?;
    if slot.generation != id.generation() {
      return None;
    }
    if slot.value.is_none() {
      return None;
    }
    Some(idx)
  }

  fn ensure_can_allocate(&mut self, new_bytes: usize) -> Result<(), BridgeError> {
    let after = self.used_bytes.saturating_add(new_bytes);
    if after > self.limits.gc_threshold {
      self.collect_garbage();
    }

    let after = self.used_bytes.saturating_add(new_bytes);
    if after > self.limits.max_bytes {
      return Err(BridgeError::OutOfMemory);
    }
    Ok(())
  }

  fn update_slot_bytes(&mut self, idx: usize, new_bytes: usize) {
    let slot = &mut self.slots[idx];
    let old_bytes = slot.bytes;

    if new_bytes >= old_bytes {
      self.used_bytes = self.used_bytes.saturating_add(new_bytes - old_bytes);
    } else {
      self.used_bytes = self.used_bytes.saturating_sub(old_bytes - new_bytes);
    }

    slot.bytes = new_bytes;
  }

  fn alloc_unchecked(&mut self, obj: HeapObject, new_bytes: usize) -> HeapId {
    let idx = match self.free_list.pop() {
      Some(idx) => idx as usize,
      None => {
        let idx = self.slots.len();
        self.slots.push(Slot::new());
        self.marks.push(0);
        idx
      }
    };

    let slot = &mut self.slots[idx];
    debug_assert!(slot.value.is_none(), "free list returned an occupied slot");

    slot.value = Some(obj);
    slot.bytes = new_bytes;
    self.used_bytes = self.used_bytes.saturating_add(new_bytes);

    HeapId::from_parts(idx as u32, slot.generation)
  }
}

impl Boundary for Heap {
  fn undefined(&mut self) -> Result<ObjectRef, BridgeError> {
    Ok(self.new_reference(self.undefined, false))
  }

  fn copy_reference(
    &mut self,
    reference: ObjectRef,
    independent: bool,
  ) -> Result<ObjectRef, BridgeError> {
    let target = self.resolve(reference)?;
    Ok(self.new_reference(target, independent))
  }

  fn make_weak(&mut self, reference: ObjectRef) -> Result<(), BridgeError> {
    self.reference_entry_mut(reference)?.strength = Strength::Weak;
    Ok(())
  }

  fn release_reference(&mut self, reference: ObjectRef) -> Result<(), BridgeError> {
    self.reference_entry(reference)?;
    let slot = &mut self.references[reference.index() as usize];
    slot.entry = None;
    slot.generation = slot.generation.wrapping_add(1);
    self.references_free.push(reference.index());
    Ok(())
  }

  fn is_cleared(&self, reference: ObjectRef) -> Result<bool, BridgeError> {
    Ok(self.reference_entry(reference)?.target.is_none())
  }

  fn same_identity(&self, a: ObjectRef, b: ObjectRef) -> Result<bool, BridgeError> {
    Ok(self.resolve(a)? == self.resolve(b)?)
  }

  fn collect_garbage(&mut self) {
    Heap::collect_garbage(self);
  }

  fn new_string(&mut self, value: &str) -> Result<ObjectRef, BridgeError> {
    let id = self.alloc(HeapObject::String(value.into()))?;
    Ok(self.new_reference(id, false))
  }

  fn string_value(&self, reference: ObjectRef) -> Result<Option<String>, BridgeError> {
    let target = self.resolve(reference)?;
    Ok(match self.get_heap_object(target)? {
      HeapObject::String(s) => Some(s.to_string()),
      _ => None,
    })
  }

  fn new_object(&mut self) -> Result<ObjectRef, BridgeError> {
    let id = self.alloc(HeapObject::Object(JsObject { template: None }))?;
    Ok(self.new_reference(id, false))
  }

  fn new_context(&mut self) -> Result<ObjectRef, BridgeError> {
    let id = self.alloc(HeapObject::Context(ContextRecord {
      functions: Vec::new(),
    }))?;
    Ok(self.new_reference(id, false))
  }

  fn create_template(&mut self, request: CreateTemplate) -> Result<ObjectRef, BridgeError> {
    let data = self.resolve(request.data)?;
    let signature = match request.signature {
      Some(signature) => {
        let signature = self.resolve(signature)?;
        self.template(signature)?;
        Some(signature)
      }
      None => None,
    };
    let id = self.alloc_rooted(
      HeapObject::FunctionTemplate(TemplateRecord {
        id: request.id,
        callback: request.callback.map(CallbackRef::address),
        data,
        signature,
        constructor_allowed: request.constructor_allowed,
        class_name: None,
        parent: None,
        instance_template: None,
        prototype_template: None,
      }),
      &[data, signature.unwrap_or(self.undefined)],
    )?;
    Ok(self.new_reference(id, false))
  }

  fn set_class_name(&mut self, template: ObjectRef, name: ObjectRef) -> Result<(), BridgeError> {
    let template = self.resolve(template)?;
    let name = self.resolve(name)?;
    if !matches!(self.get_heap_object(name)?, HeapObject::String(_)) {
      return Err(BridgeError::WrongKind("string"));
    }
    self.template_mut(template)?.class_name = Some(name);
    Ok(())
  }

  fn get_instance_template(&mut self, template: ObjectRef) -> Result<ObjectRef, BridgeError> {
    let template = self.resolve(template)?;
    let sub = self.sub_template(template, true)?;
    Ok(self.new_reference(sub, false))
  }

  fn get_prototype_template(&mut self, template: ObjectRef) -> Result<ObjectRef, BridgeError> {
    let template = self.resolve(template)?;
    let sub = self.sub_template(template, false)?;
    Ok(self.new_reference(sub, false))
  }

  fn get_function(
    &mut self,
    template: ObjectRef,
    context: ObjectRef,
  ) -> Result<ObjectRef, BridgeError> {
    let template = self.resolve(template)?;
    let context = self.resolve(context)?;
    self.template(template)?;

    let cached = match self.get_heap_object(context)? {
      HeapObject::Context(ctx) => ctx
        .functions
        .iter()
        .find(|(t, _)| *t == template)
        .map(|(_, f)| *f),
      _ => return Err(BridgeError::WrongKind("context")),
    };
    if let Some(function) = cached {
      return Ok(self.new_reference(function, false));
    }

    let function = self.alloc_rooted(
      HeapObject::Function(JsFunction { template, context }),
      &[template, context],
    )?;
    let idx = self.validate(context).ok_or(BridgeError::InvalidHandle)?;
    let Some(HeapObject::Context(ctx)) = self.slots[idx].value.as_mut() else {
      return Err(BridgeError::WrongKind("context"));
    };
    ctx.functions.push((template, function));
    let new_bytes = self.slots[idx]
      .value
      .as_ref()
      .map_or(0, HeapObject::heap_size_bytes);
    self.update_slot_bytes(idx, new_bytes);
    Ok(self.new_reference(function, false))
  }

  fn has_instance(&mut self, template: ObjectRef, value: ObjectRef) -> Result<bool, BridgeError> {
    let template = self.resolve(template)?;
    let value = self.resolve(value)?;
    self.template(template)?;
    self.is_instance_of(template, value)
  }

  fn set_call_handler(
    &mut self,
    template: ObjectRef,
    callback: Option<CallbackRef>,
    data: ObjectRef,
  ) -> Result<(), BridgeError> {
    let template = self.resolve(template)?;
    let data = self.resolve(data)?;
    let record = self.template_mut(template)?;
    record.callback = callback.map(CallbackRef::address);
    record.data = data;
    Ok(())
  }

  fn inherit(&mut self, template: ObjectRef, parent: ObjectRef) -> Result<(), BridgeError> {
    let template = self.resolve(template)?;
    let parent = self.resolve(parent)?;
    self.template(parent)?;
    self.template_mut(template)?.parent = Some(parent);
    Ok(())
  }

  fn object_template_new_instance(
    &mut self,
    template: ObjectRef,
    context: ObjectRef,
  ) -> Result<ObjectRef, BridgeError> {
    let template = self.resolve(template)?;
    let context = self.resolve(context)?;
    self.expect_context(context)?;
    let instances_of = match self.get_heap_object(template)? {
      HeapObject::ObjectTemplate(t) => t.instances_of,
      _ => return Err(BridgeError::WrongKind("object template")),
    };
    let id = self.alloc_rooted(
      HeapObject::Object(JsObject {
        template: instances_of,
      }),
      &[template, instances_of.unwrap_or(self.undefined)],
    )?;
    Ok(self.new_reference(id, false))
  }

  fn prepare_call(
    &mut self,
    function: ObjectRef,
    receiver: ObjectRef,
    construct: bool,
  ) -> Result<PreparedCall, BridgeError> {
    let function = self.resolve(function)?;
    let template = self.function(function)?.template;
    let record = self.template(template)?;
    let id = record.id;

    if construct {
      if !record.constructor_allowed {
        return Err(BridgeError::NotConstructable);
      }
      let instance = self.alloc_rooted(
        HeapObject::Object(JsObject {
          template: Some(template),
        }),
        &[function, template],
      )?;
      return Ok(PreparedCall {
        template: id,
        receiver: self.new_reference(instance, false),
      });
    }

    let signature = record.signature;
    let receiver = self.resolve(receiver)?;
    if let Some(signature) = signature {
      if !self.is_instance_of(signature, receiver)? {
        return Err(BridgeError::IllegalInvocation);
      }
    }
    Ok(PreparedCall {
      template: id,
      receiver: self.new_reference(receiver, false),
    })
  }

  fn function_name(&mut self, function: ObjectRef) -> Result<ObjectRef, BridgeError> {
    let function = self.resolve(function)?;
    let template = self.function(function)?.template;
    let name = self.template(template)?.class_name.unwrap_or(self.undefined);
    Ok(self.new_reference(name, false))
  }
}

#[derive(Debug)]
struct Slot {
  generation: u32,
  value: Option<HeapObject>,
  bytes: usize,
}

impl Slot {
  fn new() -> Self {
    Self {
      generation: 0,
      value: None,
      bytes: 0,
    }
  }
}

#[derive(Debug)]
struct ReferenceSlot {
  generation: u32,
  entry: Option<ReferenceEntry>,
}

#[derive(Debug)]
struct ReferenceEntry {
  /// `None` once a weak reference has been cleared.
  target: Option<HeapId>,
  strength: Strength,
  independent: bool,
}

#[derive(Debug)]
enum HeapObject {
  Undefined,
  String(Box<str>),
  Object(JsObject),
  Context(ContextRecord),
  FunctionTemplate(TemplateRecord),
  ObjectTemplate(ObjectTemplateRecord),
  Function(JsFunction),
}

impl HeapObject {
  fn heap_size_bytes(&self) -> usize {
    let extra = match self {
      HeapObject::String(s) => s.len(),
      HeapObject::Context(ctx) => ctx
        .functions
        .capacity()
        .saturating_mul(mem::size_of::<(HeapId, HeapId)>()),
      _ => 0,
    };
    mem::size_of::<HeapObject>().saturating_add(extra)
  }

  fn trace(&self, tracer: &mut Tracer<'_>) {
    match self {
      HeapObject::Undefined | HeapObject::String(_) => {}
      HeapObject::Object(obj) => tracer.trace_opt(obj.template),
      HeapObject::Context(ctx) => {
        for &(template, function) in &ctx.functions {
          tracer.trace(template);
          tracer.trace(function);
        }
      }
      HeapObject::FunctionTemplate(t) => {
        tracer.trace(t.data);
        tracer.trace_opt(t.signature);
        tracer.trace_opt(t.class_name);
        tracer.trace_opt(t.parent);
        tracer.trace_opt(t.instance_template);
        tracer.trace_opt(t.prototype_template);
      }
      HeapObject::ObjectTemplate(t) => tracer.trace_opt(t.instances_of),
      HeapObject::Function(f) => {
        tracer.trace(f.template);
        tracer.trace(f.context);
      }
    }
  }
}

#[derive(Debug)]
struct JsObject {
  /// The function template this object was instantiated from.
  template: Option<HeapId>,
}

#[derive(Debug)]
struct ContextRecord {
  /// Functions materialized in this context, keyed by template.
  functions: Vec<(HeapId, HeapId)>,
}

#[derive(Debug)]
struct TemplateRecord {
  id: TemplateId,
  /// Address of the native callback. Only the native registry can call it.
  callback: Option<usize>,
  data: HeapId,
  signature: Option<HeapId>,
  constructor_allowed: bool,
  class_name: Option<HeapId>,
  parent: Option<HeapId>,
  instance_template: Option<HeapId>,
  prototype_template: Option<HeapId>,
}

#[derive(Debug)]
struct ObjectTemplateRecord {
  /// Set for instance templates: the function template their objects are instances of.
  instances_of: Option<HeapId>,
}

#[derive(Debug)]
struct JsFunction {
  template: HeapId,
  context: HeapId,
}

struct Tracer<'a> {
  slots: &'a [Slot],
  marks: &'a mut [u8],
  worklist: Vec<HeapId>,
}

impl<'a> Tracer<'a> {
  fn new(slots: &'a [Slot], marks: &'a mut [u8]) -> Self {
    Self {
      slots,
      marks,
      worklist: Vec::new(),
    }
  }

  fn pop_work(&mut self) -> Option<HeapId> {
    self.worklist.pop()
  }

  fn trace(&mut self, id: HeapId) {
    let Some(idx) = self.validate(id) else {
      return;
    };
    if self.marks[idx] != 0 {
      return;
    }
    self.worklist.push(id);
  }

  fn trace_opt(&mut self, id: Option<HeapId>) {
    if let Some(id) = id {
      self.trace(id);
    }
  }

  fn validate(&self, id: HeapId) -> Option<usize> {
    let idx = id.index() as usize;
    let slot = self.slots.get(idx)?;
    if slot.generation != id.generation() {
      debug_assert!(false, "stale handle during GC: {id:?}");
      return None;
    }
    if slot.value.is_none() {
      debug_assert!(false, "handle points at a free slot during GC: {id:?}");
      return None;
    }
    Some(idx)
  }
}
