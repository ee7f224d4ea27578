use crate::BridgeError;
use crate::Engine;
use crate::Handle;
use crate::TemplateId;
use core::fmt;

/// A native `[[Call]]`/`[[Construct]]` entrypoint registered on a function template.
///
/// # Handle expectations
///
/// The receiver, arguments and data exposed by [`CallbackInfo`] are owned by the caller and are
/// only valid for the duration of the call. A callback that needs to keep one must take its own
/// copy via [`Engine::copy_handle`].
pub type FunctionCallback = for<'a> fn(&mut CallbackInfo<'a>) -> Result<(), BridgeError>;

/// An opaque, comparable reference to a [`FunctionCallback`].
///
/// Two `CallbackRef`s are equal when they point at the same function. The managed side only ever
/// sees [`CallbackRef::address`]; the callback registry is what maps a template id back to the
/// callable function.
#[derive(Clone, Copy)]
pub struct CallbackRef(FunctionCallback);

impl CallbackRef {
  #[inline]
  pub fn new(callback: FunctionCallback) -> Self {
    Self(callback)
  }

  /// The function address, as carried across the boundary.
  #[inline]
  pub fn address(self) -> usize {
    self.0 as usize
  }

  #[inline]
  pub fn invoke(self, info: &mut CallbackInfo<'_>) -> Result<(), BridgeError> {
    (self.0)(info)
  }
}

impl From<FunctionCallback> for CallbackRef {
  #[inline]
  fn from(callback: FunctionCallback) -> Self {
    Self::new(callback)
  }
}

impl PartialEq for CallbackRef {
  fn eq(&self, other: &Self) -> bool {
    self.address() == other.address()
  }
}

impl Eq for CallbackRef {}

impl fmt::Debug for CallbackRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "CallbackRef({:#x})", self.address())
  }
}

/// Arguments of one native callback invocation.
pub struct CallbackInfo<'a> {
  engine: &'a mut Engine,
  template: TemplateId,
  receiver: Handle,
  args: &'a [&'a Handle],
  data: Handle,
  construct_call: bool,
  return_value: Option<Handle>,
}

impl<'a> CallbackInfo<'a> {
  pub(crate) fn new(
    engine: &'a mut Engine,
    template: TemplateId,
    receiver: Handle,
    args: &'a [&'a Handle],
    data: Handle,
    construct_call: bool,
  ) -> Self {
    Self {
      engine,
      template,
      receiver,
      args,
      data,
      construct_call,
      return_value: None,
    }
  }

  /// The engine the call runs on; callbacks use it to create and inspect values.
  #[inline]
  pub fn engine(&mut self) -> &mut Engine {
    self.engine
  }

  /// The id of the function template whose function is being called.
  #[inline]
  pub fn template_id(&self) -> TemplateId {
    self.template
  }

  /// The receiver (`this`). For construct calls this is the newly created instance.
  #[inline]
  pub fn this(&self) -> &Handle {
    &self.receiver
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.args.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.args.is_empty()
  }

  #[inline]
  pub fn arg(&self, index: usize) -> Option<&Handle> {
    self.args.get(index).copied()
  }

  #[inline]
  pub fn args(&self) -> &[&'a Handle] {
    self.args
  }

  /// The data registered with the callback (the undefined sentinel if none was supplied).
  #[inline]
  pub fn data(&self) -> &Handle {
    &self.data
  }

  #[inline]
  pub fn is_construct_call(&self) -> bool {
    self.construct_call
  }

  /// Takes a handle to the receiver that outlives the call.
  pub fn copy_this(&mut self) -> Result<Handle, BridgeError> {
    self.engine.copy_handle(&self.receiver, false)
  }

  /// Takes a handle to the registered data that outlives the call.
  pub fn copy_data(&mut self) -> Result<Handle, BridgeError> {
    self.engine.copy_handle(&self.data, false)
  }

  /// Takes a handle to argument `index` that outlives the call.
  pub fn copy_arg(&mut self, index: usize) -> Result<Option<Handle>, BridgeError> {
    match self.args.get(index) {
      Some(arg) => self.engine.copy_handle(arg, false).map(Some),
      None => Ok(None),
    }
  }

  /// Sets the call's result, releasing any previously set value.
  pub fn set_return_value(&mut self, value: Handle) -> Result<(), BridgeError> {
    match self.return_value.replace(value) {
      Some(previous) => self.engine.release(previous),
      None => Ok(()),
    }
  }

  pub(crate) fn finish(self) -> (Handle, Handle, Option<Handle>) {
    (self.receiver, self.data, self.return_value)
  }
}
