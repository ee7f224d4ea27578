use crate::boundary::ConstructorBehavior;
use crate::boundary::CreateTemplate;
use crate::context::Context;
use crate::context::Function;
use crate::object_template::ObjectTemplate;
use crate::registry::CallbackData;
use crate::BridgeError;
use crate::CallbackRef;
use crate::Engine;
use crate::Handle;
use crate::TemplateId;
use tracing::debug;

/// A function template: the blueprint functions are materialized from.
///
/// The template's managed object lives on the other side of the boundary; the native side keeps
/// its [`TemplateId`] and, in the engine's callback registry, the callback and data that calls of
/// functions made from it dispatch to.
#[derive(Debug)]
pub struct FunctionTemplate {
  handle: Handle,
  id: TemplateId,
}

impl FunctionTemplate {
  /// Creates a function template.
  ///
  /// - `data` absent: the callback sees the engine's `undefined`.
  /// - `data` present: the registry keeps an independent weak copy, so the template does not pin
  ///   the caller's value beyond what the managed side holds.
  /// - `signature`: when set, functions from this template only accept receivers that are
  ///   instances of `signature`.
  pub fn new(
    engine: &mut Engine,
    callback: Option<CallbackRef>,
    data: Option<&Handle>,
    signature: Option<&FunctionTemplate>,
    behavior: ConstructorBehavior,
  ) -> Result<Self, BridgeError> {
    let signature = signature
      .map(|signature| engine.check_owner(&signature.handle))
      .transpose()?;
    let id = engine.next_function_template_id()?;
    let data = engine.resolve_callback_data(data)?;

    let request = CreateTemplate {
      id,
      callback,
      data: engine.callback_data_reference(&data),
      signature,
      constructor_allowed: behavior.is_allowed(),
    };
    let reference = match engine.request("create_template", |b| b.create_template(request)) {
      Ok(reference) => reference,
      Err(err) => {
        if let CallbackData::Value(data) = data {
          engine.discard(data);
        }
        return Err(err);
      }
    };
    let template = Self {
      handle: engine.wrap(reference),
      id,
    };

    engine.set_function_template_data(id, data)?;
    engine.set_function_template_callback(id, callback)?;
    debug!(template = %id, has_callback = callback.is_some(), "function template created");
    Ok(template)
  }

  /// Shorthand for a constructible template with no data and no signature.
  pub fn with_callback(engine: &mut Engine, callback: CallbackRef) -> Result<Self, BridgeError> {
    Self::new(engine, Some(callback), None, None, ConstructorBehavior::Allow)
  }

  #[inline]
  pub fn id(&self) -> TemplateId {
    self.id
  }

  #[inline]
  pub fn handle(&self) -> &Handle {
    &self.handle
  }

  /// The template this one inherits from, as recorded by [`FunctionTemplate::inherit`].
  pub fn parent(&self, engine: &Engine) -> Result<Option<TemplateId>, BridgeError> {
    engine.function_template_parent(self.id)
  }

  #[inline]
  pub fn into_handle(self) -> Handle {
    self.handle
  }

  pub fn set_class_name(&self, engine: &mut Engine, name: &Handle) -> Result<(), BridgeError> {
    let template = engine.check_owner(&self.handle)?;
    let name = engine.check_owner(name)?;
    engine.request("set_class_name", |b| b.set_class_name(template, name))
  }

  /// The template objects created by functions of this template are instantiated from.
  pub fn instance_template(&self, engine: &mut Engine) -> Result<ObjectTemplate, BridgeError> {
    let template = engine.check_owner(&self.handle)?;
    let reference = engine.request("get_instance_template", |b| {
      b.get_instance_template(template)
    })?;
    Ok(ObjectTemplate::from_handle(engine.wrap(reference)))
  }

  /// The template the `prototype` object of functions of this template is instantiated from.
  pub fn prototype_template(&self, engine: &mut Engine) -> Result<ObjectTemplate, BridgeError> {
    let template = engine.check_owner(&self.handle)?;
    let reference = engine.request("get_prototype_template", |b| {
      b.get_prototype_template(template)
    })?;
    Ok(ObjectTemplate::from_handle(engine.wrap(reference)))
  }

  /// Materializes this template's function in `context`.
  ///
  /// The engine also records the function against this template's id (see
  /// [`Engine::function_template_function`]); materializing in another context replaces that
  /// record.
  pub fn get_function(
    &self,
    engine: &mut Engine,
    context: &Context,
  ) -> Result<Function, BridgeError> {
    let template = engine.check_owner(&self.handle)?;
    let context = engine.check_owner(context.handle())?;
    let reference = engine.request("get_function", |b| b.get_function(template, context))?;
    let function = engine.wrap(reference);

    let recorded = match engine.copy_handle(&function, true) {
      Ok(recorded) => recorded,
      Err(err) => {
        engine.discard(function);
        return Err(err);
      }
    };
    engine.set_function_template_function(self.id, recorded)?;
    debug!(template = %self.id, "function materialized");
    Ok(Function::from_handle(function))
  }

  /// Returns `true` if `value` was instantiated from this template or from a template inheriting
  /// from it.
  pub fn has_instance(&self, engine: &mut Engine, value: &Handle) -> Result<bool, BridgeError> {
    let template = engine.check_owner(&self.handle)?;
    let value = engine.check_owner(value)?;
    engine.request("has_instance", |b| b.has_instance(template, value))
  }

  /// Replaces the callback and data of this template.
  ///
  /// `data` follows the same rule as [`FunctionTemplate::new`]. The managed side is updated first;
  /// the registry is only overwritten once that succeeds, so on failure both sides keep the
  /// previous pair. Functions already materialized from this template dispatch to the new pair.
  /// The previous data handle is released.
  pub fn set_call_handler(
    &self,
    engine: &mut Engine,
    callback: Option<CallbackRef>,
    data: Option<&Handle>,
  ) -> Result<(), BridgeError> {
    let template = engine.check_owner(&self.handle)?;
    let data = engine.resolve_callback_data(data)?;
    let data_reference = engine.callback_data_reference(&data);

    if let Err(err) = engine.request("set_call_handler", |b| {
      b.set_call_handler(template, callback, data_reference)
    }) {
      if let CallbackData::Value(data) = data {
        engine.discard(data);
      }
      return Err(err);
    }

    engine.set_function_template_data(self.id, data)?;
    engine.set_function_template_callback(self.id, callback)?;
    debug!(template = %self.id, has_callback = callback.is_some(), "call handler replaced");
    Ok(())
  }

  /// Makes this template inherit from `parent`.
  ///
  /// Unlike the managed side, which would loop forever on a cyclic chain, the bridge rejects an
  /// edge that closes a cycle with [`BridgeError::InheritanceCycle`]. A template inherits at most
  /// once.
  pub fn inherit(&self, engine: &mut Engine, parent: &FunctionTemplate) -> Result<(), BridgeError> {
    let template = engine.check_owner(&self.handle)?;
    let parent_reference = engine.check_owner(&parent.handle)?;
    engine.check_inheritance(self.id, parent.id)?;
    engine.request("inherit", |b| b.inherit(template, parent_reference))?;
    engine.set_function_template_parent(self.id, parent.id)?;
    debug!(template = %self.id, parent = %parent.id, "inheritance recorded");
    Ok(())
  }

  /// Gives the template's handle back to the managed side.
  ///
  /// The template id and its registry entry stay valid for the engine's lifetime.
  pub fn release(self, engine: &mut Engine) -> Result<(), BridgeError> {
    engine.release(self.handle)
  }
}
