use crate::context::Context;
use crate::BridgeError;
use crate::Engine;
use crate::Handle;

/// An object template, as returned by
/// [`FunctionTemplate::instance_template`](crate::FunctionTemplate::instance_template) and
/// [`FunctionTemplate::prototype_template`](crate::FunctionTemplate::prototype_template).
#[derive(Debug)]
pub struct ObjectTemplate {
  handle: Handle,
}

impl ObjectTemplate {
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

  /// Creates an object from this template in `context`.
  ///
  /// Objects created from a function template's instance template are instances of that function
  /// template.
  pub fn new_instance(&self, engine: &mut Engine, context: &Context) -> Result<Handle, BridgeError> {
    let template = engine.check_owner(&self.handle)?;
    let context = engine.check_owner(context.handle())?;
    let reference = engine.request("object_template_new_instance", |b| {
      b.object_template_new_instance(template, context)
    })?;
    Ok(engine.wrap(reference))
  }

  pub fn release(self, engine: &mut Engine) -> Result<(), BridgeError> {
    engine.release(self.handle)
  }
}
