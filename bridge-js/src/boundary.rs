//! The fixed request vocabulary between the bridge and the managed engine.
//!
//! Every method is one synchronous request/response exchange. References passed in are borrowed
//! (the caller keeps ownership); references returned are new and owned by the caller, which wraps
//! each one into exactly one [`Handle`](crate::Handle).

use crate::BridgeError;
use crate::CallbackRef;
use crate::ObjectRef;
use crate::TemplateId;

/// Whether functions created from a template may be used with `new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConstructorBehavior {
  #[default]
  Allow,
  Throw,
}

impl ConstructorBehavior {
  #[inline]
  pub fn is_allowed(self) -> bool {
    self == ConstructorBehavior::Allow
  }
}

/// Payload of [`Boundary::create_template`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTemplate {
  pub id: TemplateId,
  pub callback: Option<CallbackRef>,
  pub data: ObjectRef,
  pub signature: Option<ObjectRef>,
  pub constructor_allowed: bool,
}

/// Result of [`Boundary::prepare_call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedCall {
  /// The template the called function was materialized from.
  pub template: TemplateId,
  /// New reference to the receiver; for construct calls, the freshly created instance.
  pub receiver: ObjectRef,
}

/// A managed engine reachable from native code.
pub trait Boundary {
  // Reference services.

  /// Returns a new strong reference to the canonical `undefined` value.
  fn undefined(&mut self) -> Result<ObjectRef, BridgeError>;

  /// Returns a new strong reference to the same object as `reference`.
  ///
  /// `independent` marks the copy as collectible independently of the original. Copying a cleared
  /// weak reference fails with [`BridgeError::InvalidHandle`].
  fn copy_reference(&mut self, reference: ObjectRef, independent: bool)
    -> Result<ObjectRef, BridgeError>;

  /// Stops `reference` from keeping its object alive.
  fn make_weak(&mut self, reference: ObjectRef) -> Result<(), BridgeError>;

  /// Gives `reference` back to the managed side.
  fn release_reference(&mut self, reference: ObjectRef) -> Result<(), BridgeError>;

  /// Returns `true` if `reference` is weak and its object has been collected.
  fn is_cleared(&self, reference: ObjectRef) -> Result<bool, BridgeError>;

  /// Managed-side identity equality.
  fn same_identity(&self, a: ObjectRef, b: ObjectRef) -> Result<bool, BridgeError>;

  /// Asks the managed side to run a garbage collection cycle.
  fn collect_garbage(&mut self);

  // Primitive bridge types.

  fn new_string(&mut self, value: &str) -> Result<ObjectRef, BridgeError>;

  /// Returns the contents of a string reference, or `None` if it references something else.
  fn string_value(&self, reference: ObjectRef) -> Result<Option<String>, BridgeError>;

  fn new_object(&mut self) -> Result<ObjectRef, BridgeError>;

  fn new_context(&mut self) -> Result<ObjectRef, BridgeError>;

  // Function templates.

  fn create_template(&mut self, request: CreateTemplate) -> Result<ObjectRef, BridgeError>;

  fn set_class_name(&mut self, template: ObjectRef, name: ObjectRef) -> Result<(), BridgeError>;

  /// Fetches the template's instance template, creating it on first use.
  fn get_instance_template(&mut self, template: ObjectRef) -> Result<ObjectRef, BridgeError>;

  /// Fetches the template's prototype template, creating it on first use.
  fn get_prototype_template(&mut self, template: ObjectRef) -> Result<ObjectRef, BridgeError>;

  fn get_function(&mut self, template: ObjectRef, context: ObjectRef)
    -> Result<ObjectRef, BridgeError>;

  fn has_instance(&mut self, template: ObjectRef, value: ObjectRef) -> Result<bool, BridgeError>;

  fn set_call_handler(
    &mut self,
    template: ObjectRef,
    callback: Option<CallbackRef>,
    data: ObjectRef,
  ) -> Result<(), BridgeError>;

  fn inherit(&mut self, template: ObjectRef, parent: ObjectRef) -> Result<(), BridgeError>;

  // Object templates and functions.

  fn object_template_new_instance(
    &mut self,
    template: ObjectRef,
    context: ObjectRef,
  ) -> Result<ObjectRef, BridgeError>;

  /// Validates a call of `function` and reports which template's callback should run.
  ///
  /// For ordinary calls `receiver` must satisfy the template's signature (if any). For construct
  /// calls `receiver` is ignored and a new instance of the template is created.
  fn prepare_call(
    &mut self,
    function: ObjectRef,
    receiver: ObjectRef,
    construct: bool,
  ) -> Result<PreparedCall, BridgeError>;

  /// Returns the function's class name, or `undefined` if none was set.
  fn function_name(&mut self, function: ObjectRef) -> Result<ObjectRef, BridgeError>;
}
