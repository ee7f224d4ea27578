use crate::BridgeError;
use crate::Engine;
use crate::Handle;

/// An execution context functions are materialized in.
#[derive(Debug)]
pub struct Context {
  handle: Handle,
}

impl Context {
  pub(crate) fn from_handle(handle: Handle) -> Self {
    Self { handle }
  }

  #[inline]
  pub fn handle(&self) -> &Handle {
    &self.handle
  }

  #[inline]
  pub fn into_handle(self) -> Handle {
    self.handle
  }

  pub fn release(self, engine: &mut Engine) -> Result<(), BridgeError> {
    engine.release(self.handle)
  }
}

/// A callable function materialized from a [`FunctionTemplate`](crate::FunctionTemplate).
#[derive(Debug)]
pub struct Function {
  handle: Handle,
}

impl Function {
  pub(crate) fn from_handle(handle: Handle) -> Self {
    Self { handle }
  }

  #[inline]
  pub fn handle(&self) -> &Handle {
    &self.handle
  }

  #[inline]
  pub fn into_handle(self) -> Handle {
    self.handle
  }

  /// Calls the function with `receiver` as `this` (`undefined` if `None`).
  ///
  /// Fails with [`BridgeError::IllegalInvocation`] if the template has a signature the receiver is
  /// not an instance of. Returns the value the callback set, or `undefined`.
  pub fn call(
    &self,
    engine: &mut Engine,
    receiver: Option<&Handle>,
    args: &[&Handle],
  ) -> Result<Handle, BridgeError> {
    engine.call_function(&self.handle, receiver, args, false)
  }

  /// Calls the function as a constructor and returns the new instance.
  ///
  /// Fails with [`BridgeError::NotConstructable`] if the template was created with
  /// [`ConstructorBehavior::Throw`](crate::ConstructorBehavior::Throw).
  pub fn new_instance(&self, engine: &mut Engine, args: &[&Handle]) -> Result<Handle, BridgeError> {
    engine.call_function(&self.handle, None, args, true)
  }

  /// The class name set on the function's template, or `undefined`.
  pub fn name(&self, engine: &mut Engine) -> Result<Handle, BridgeError> {
    let function = engine.check_owner(&self.handle)?;
    let reference = engine.request("function_name", |b| b.function_name(function))?;
    Ok(engine.wrap(reference))
  }

  pub fn release(self, engine: &mut Engine) -> Result<(), BridgeError> {
    engine.release(self.handle)
  }
}
