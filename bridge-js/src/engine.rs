use crate::boundary::Boundary;
use crate::callback::CallbackInfo;
use crate::context::Context;
use crate::registry::CallbackData;
use crate::registry::CallbackRegistry;
use crate::BridgeError;
use crate::CallbackRef;
use crate::EngineId;
use crate::Handle;
use crate::IdAllocator;
use crate::ObjectRef;
use crate::TemplateId;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::trace_span;

/// Hard upper bound for template inheritance chain traversals.
pub const MAX_INHERITANCE_CHAIN: usize = 10_000;

/// Construction-time engine options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
  /// The first function template id the engine hands out.
  pub first_template_id: u32,
  /// Inheritance chains longer than this are rejected by `Inherit`.
  pub max_inheritance_depth: usize,
}

impl Default for EngineOptions {
  fn default() -> Self {
    Self {
      first_template_id: 0,
      max_inheritance_depth: MAX_INHERITANCE_CHAIN,
    }
  }
}

/// Native-side state for one managed engine instance.
///
/// The engine owns the boundary to the managed side, the function template id allocator, and the
/// callback registry. All mutation goes through `&mut Engine`, so one engine is only ever driven
/// from one logical execution context at a time; hosts wanting parallelism run one engine per
/// thread.
pub struct Engine {
  id: EngineId,
  options: EngineOptions,
  boundary: Box<dyn Boundary>,
  template_ids: IdAllocator,
  registry: CallbackRegistry,
  undefined: Handle,
}

impl Engine {
  /// Creates an engine over `boundary` with default options.
  pub fn new(boundary: impl Boundary + 'static) -> Result<Self, BridgeError> {
    Self::with_options(boundary, EngineOptions::default())
  }

  pub fn with_options(
    boundary: impl Boundary + 'static,
    options: EngineOptions,
  ) -> Result<Self, BridgeError> {
    let mut boundary: Box<dyn Boundary> = Box::new(boundary);
    let id = EngineId::next();
    let undefined = {
      let _span = trace_span!("bridge_js.boundary", request = "undefined").entered();
      boundary.undefined()?
    };
    debug!(engine = ?id, first_template_id = options.first_template_id, "engine created");
    Ok(Self {
      id,
      template_ids: IdAllocator::new(options.first_template_id),
      options,
      boundary,
      registry: CallbackRegistry::new(),
      undefined: Handle::new(id, undefined, false),
    })
  }

  #[inline]
  pub fn id(&self) -> EngineId {
    self.id
  }

  #[inline]
  pub fn options(&self) -> &EngineOptions {
    &self.options
  }

  /// The engine's canonical `undefined` handle.
  #[inline]
  pub fn undefined(&self) -> &Handle {
    &self.undefined
  }

  /// Issues one cross-boundary request inside a tracing span.
  pub(crate) fn request<T>(
    &mut self,
    request: &'static str,
    f: impl FnOnce(&mut dyn Boundary) -> Result<T, BridgeError>,
  ) -> Result<T, BridgeError> {
    let _span = trace_span!("bridge_js.boundary", request).entered();
    let result = f(self.boundary.as_mut());
    if let Err(err) = &result {
      debug!(error = %err, "boundary request failed");
    }
    result
  }

  fn query<T>(
    &self,
    request: &'static str,
    f: impl FnOnce(&dyn Boundary) -> Result<T, BridgeError>,
  ) -> Result<T, BridgeError> {
    let _span = trace_span!("bridge_js.boundary", request).entered();
    let result = f(self.boundary.as_ref());
    if let Err(err) = &result {
      debug!(error = %err, "boundary request failed");
    }
    result
  }

  /// Rejects handles created by other engines.
  #[inline]
  pub(crate) fn check_owner(&self, handle: &Handle) -> Result<ObjectRef, BridgeError> {
    if handle.engine() != self.id {
      return Err(BridgeError::ForeignHandle);
    }
    Ok(handle.reference())
  }

  /// Wraps a reference returned by the managed side.
  #[inline]
  pub(crate) fn wrap(&self, reference: ObjectRef) -> Handle {
    Handle::new(self.id, reference, false)
  }

  /// Releases a handle on a path that is already failing, keeping the original error.
  pub(crate) fn discard(&mut self, handle: Handle) {
    if let Err(err) = self.release(handle) {
      debug!(error = %err, "failed to release handle while unwinding");
    }
  }

  // Handles.

  /// Returns a new handle to the same managed object as `handle`.
  ///
  /// The copy owns its own managed-side reference. With `deep`, it is also marked independent: it
  /// survives the original being released and can be made weak on its own.
  pub fn copy_handle(&mut self, handle: &Handle, deep: bool) -> Result<Handle, BridgeError> {
    let reference = self.check_owner(handle)?;
    let copy = self.request("copy_reference", |b| b.copy_reference(reference, deep))?;
    Ok(Handle::new(self.id, copy, deep))
  }

  /// Hands reclamation of `handle`'s object over to the managed garbage collector.
  ///
  /// This is one-way. Making an already-weak handle weak is a no-op.
  pub fn make_weak(&mut self, handle: &mut Handle) -> Result<(), BridgeError> {
    let reference = self.check_owner(handle)?;
    if handle.is_weak() {
      return Ok(());
    }
    self.request("make_weak", |b| b.make_weak(reference))?;
    handle.mark_weak();
    Ok(())
  }

  /// Gives `handle`'s reference back to the managed side.
  pub fn release(&mut self, handle: Handle) -> Result<(), BridgeError> {
    let reference = self.check_owner(&handle)?;
    self.request("release_reference", |b| b.release_reference(reference))
  }

  /// Returns `true` if `handle` is weak and its object has been collected.
  pub fn is_collected(&self, handle: &Handle) -> Result<bool, BridgeError> {
    let reference = self.check_owner(handle)?;
    self.query("is_cleared", |b| b.is_cleared(reference))
  }

  /// Returns `true` if both handles reference the same managed object.
  pub fn same_identity(&self, a: &Handle, b: &Handle) -> Result<bool, BridgeError> {
    let a = self.check_owner(a)?;
    let b = self.check_owner(b)?;
    self.query("same_identity", |boundary| boundary.same_identity(a, b))
  }

  /// Returns `true` if `handle` references the engine's `undefined`.
  pub fn is_undefined(&self, handle: &Handle) -> Result<bool, BridgeError> {
    self.same_identity(handle, &self.undefined)
  }

  /// Returns a new handle to `undefined`.
  pub fn new_undefined(&mut self) -> Result<Handle, BridgeError> {
    let reference = self.undefined.reference();
    let copy = self.request("copy_reference", |b| b.copy_reference(reference, false))?;
    Ok(self.wrap(copy))
  }

  /// Asks the managed side to collect garbage.
  pub fn collect_garbage(&mut self) {
    let _span = trace_span!("bridge_js.boundary", request = "collect_garbage").entered();
    self.boundary.collect_garbage();
  }

  // Primitive bridge types and contexts.

  pub fn new_string(&mut self, value: &str) -> Result<Handle, BridgeError> {
    let reference = self.request("new_string", |b| b.new_string(value))?;
    Ok(self.wrap(reference))
  }

  pub fn string_value(&self, handle: &Handle) -> Result<Option<String>, BridgeError> {
    let reference = self.check_owner(handle)?;
    self.query("string_value", |b| b.string_value(reference))
  }

  pub fn new_object(&mut self) -> Result<Handle, BridgeError> {
    let reference = self.request("new_object", |b| b.new_object())?;
    Ok(self.wrap(reference))
  }

  pub fn new_context(&mut self) -> Result<Context, BridgeError> {
    let reference = self.request("new_context", |b| b.new_context())?;
    Ok(Context::from_handle(self.wrap(reference)))
  }

  // Template ids and the callback registry.

  /// Allocates a function template id and creates its (empty) registry entry.
  pub fn next_function_template_id(&mut self) -> Result<TemplateId, BridgeError> {
    let id = self.template_ids.next_id()?;
    self.registry.insert(&self.template_ids, id)?;
    Ok(id)
  }

  /// Number of function template ids allocated so far.
  pub fn function_template_count(&self) -> usize {
    self.template_ids.allocated()
  }

  pub fn set_function_template_callback(
    &mut self,
    id: TemplateId,
    callback: Option<CallbackRef>,
  ) -> Result<(), BridgeError> {
    self.registry.set_callback(&self.template_ids, id, callback)
  }

  /// Overwrites the data registered for `id`; the previous data handle is released.
  pub fn set_function_template_data(
    &mut self,
    id: TemplateId,
    data: CallbackData,
  ) -> Result<(), BridgeError> {
    if let CallbackData::Value(handle) = &data {
      self.check_owner(handle)?;
    }
    match self.registry.set_data(&self.template_ids, id, data)? {
      Some(previous) => self.release(previous),
      None => Ok(()),
    }
  }

  pub fn function_template_callback(
    &self,
    id: TemplateId,
  ) -> Result<Option<CallbackRef>, BridgeError> {
    Ok(self.registry.entry(&self.template_ids, id)?.callback)
  }

  pub fn function_template_data(&self, id: TemplateId) -> Result<&CallbackData, BridgeError> {
    Ok(&self.registry.entry(&self.template_ids, id)?.data)
  }

  /// Records `function` as the function most recently materialized from template `id`; the
  /// previously recorded function handle is released.
  pub fn set_function_template_function(
    &mut self,
    id: TemplateId,
    function: Handle,
  ) -> Result<(), BridgeError> {
    self.check_owner(&function)?;
    match self.registry.set_function(&self.template_ids, id, function)? {
      Some(previous) => self.release(previous),
      None => Ok(()),
    }
  }

  pub fn function_template_function(&self, id: TemplateId) -> Result<Option<&Handle>, BridgeError> {
    Ok(self.registry.entry(&self.template_ids, id)?.function.as_ref())
  }

  /// The template `id` inherits from, if `Inherit` has been called on it.
  pub fn function_template_parent(&self, id: TemplateId) -> Result<Option<TemplateId>, BridgeError> {
    Ok(self.registry.entry(&self.template_ids, id)?.parent)
  }

  /// Resolves optional callback data: `None` becomes the undefined sentinel, a value becomes an
  /// independent weak copy owned by the registry.
  pub(crate) fn resolve_callback_data(
    &mut self,
    data: Option<&Handle>,
  ) -> Result<CallbackData, BridgeError> {
    let Some(data) = data else {
      return Ok(CallbackData::Undefined);
    };
    let mut copy = self.copy_handle(data, true)?;
    if let Err(err) = self.make_weak(&mut copy) {
      self.discard(copy);
      return Err(err);
    }
    Ok(CallbackData::Value(copy))
  }

  #[inline]
  pub(crate) fn callback_data_reference(&self, data: &CallbackData) -> ObjectRef {
    data.handle_or(&self.undefined).reference()
  }

  /// Checks that `child` may inherit from `parent`.
  ///
  /// A template inherits at most once, and `parent`'s own chain must not reach `child`.
  pub(crate) fn check_inheritance(
    &self,
    child: TemplateId,
    parent: TemplateId,
  ) -> Result<(), BridgeError> {
    if self.function_template_parent(child)?.is_some() {
      return Err(BridgeError::AlreadyInherited(child));
    }
    let mut current = Some(parent);
    let mut steps = 0usize;
    while let Some(id) = current {
      if id == child {
        return Err(BridgeError::InheritanceCycle(child));
      }
      if steps >= self.options.max_inheritance_depth {
        return Err(BridgeError::InheritanceChainTooDeep);
      }
      steps += 1;
      current = self.function_template_parent(id)?;
    }
    Ok(())
  }

  pub(crate) fn set_function_template_parent(
    &mut self,
    child: TemplateId,
    parent: TemplateId,
  ) -> Result<(), BridgeError> {
    self.registry.entry_mut(&self.template_ids, child)?.parent = Some(parent);
    Ok(())
  }

  /// Calls `function`, running the native callback registered for its template.
  ///
  /// The managed side validates the call and names the template; the callback and its data come
  /// from the registry, so a `SetCallHandler` takes effect for every function already
  /// materialized from the template.
  pub(crate) fn call_function(
    &mut self,
    function: &Handle,
    receiver: Option<&Handle>,
    args: &[&Handle],
    construct: bool,
  ) -> Result<Handle, BridgeError> {
    let function = self.check_owner(function)?;
    let receiver = match receiver {
      Some(receiver) => self.check_owner(receiver)?,
      None => self.undefined.reference(),
    };
    for arg in args {
      self.check_owner(arg)?;
    }

    let prepared = self.request("prepare_call", |b| {
      b.prepare_call(function, receiver, construct)
    })?;
    let receiver = self.wrap(prepared.receiver);

    let registered = self
      .registry
      .entry(&self.template_ids, prepared.template)
      .map(|entry| (entry.callback, self.callback_data_reference(&entry.data)));
    let (callback, data) = match registered {
      Ok(registered) => registered,
      Err(err) => {
        self.discard(receiver);
        return Err(err);
      }
    };

    let Some(callback) = callback else {
      if construct {
        return Ok(receiver);
      }
      self.release(receiver)?;
      return self.new_undefined();
    };

    let data = match self.request("copy_reference", |b| b.copy_reference(data, false)) {
      Ok(data) => self.wrap(data),
      Err(err) => {
        self.discard(receiver);
        return Err(err);
      }
    };

    debug!(template = %prepared.template, construct, argc = args.len(), "dispatching native callback");
    let mut info = CallbackInfo::new(self, prepared.template, receiver, args, data, construct);
    let outcome = callback.invoke(&mut info);
    let (receiver, data, return_value) = info.finish();
    self.discard(data);

    if let Err(err) = outcome {
      self.discard(receiver);
      if let Some(value) = return_value {
        self.discard(value);
      }
      return Err(err);
    }

    if construct {
      if let Some(value) = return_value {
        self.release(value)?;
      }
      return Ok(receiver);
    }
    self.release(receiver)?;
    match return_value {
      Some(value) => Ok(value),
      None => self.new_undefined(),
    }
  }
}

impl Drop for Engine {
  fn drop(&mut self) {
    for handle in self.registry.drain_handles() {
      let reference = handle.reference();
      if let Err(err) = self.boundary.release_reference(reference) {
        debug!(error = %err, "failed to release registry handle on engine drop");
      }
    }
    if let Err(err) = self.boundary.release_reference(self.undefined.reference()) {
      debug!(error = %err, "failed to release undefined on engine drop");
    }
  }
}
