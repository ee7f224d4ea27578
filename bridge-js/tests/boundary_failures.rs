use std::cell::Cell;
use std::rc::Rc;

use bridge_js::{
  Boundary, BridgeError, CallbackData, CallbackInfo, CallbackRef, ConstructorBehavior,
  CreateTemplate, Engine, FunctionTemplate, Heap, HeapLimits, ObjectRef, PreparedCall,
};

/// A heap whose `set_call_handler` can be made to fail.
struct FlakyHeap {
  heap: Heap,
  fail_set_call_handler: Rc<Cell<bool>>,
}

impl Boundary for FlakyHeap {
  fn undefined(&mut self) -> Result<ObjectRef, BridgeError> {
    self.heap.undefined()
  }

  fn copy_reference(
    &mut self,
    reference: ObjectRef,
    independent: bool,
  ) -> Result<ObjectRef, BridgeError> {
    self.heap.copy_reference(reference, independent)
  }

  fn make_weak(&mut self, reference: ObjectRef) -> Result<(), BridgeError> {
    self.heap.make_weak(reference)
  }

  fn release_reference(&mut self, reference: ObjectRef) -> Result<(), BridgeError> {
    self.heap.release_reference(reference)
  }

  fn is_cleared(&self, reference: ObjectRef) -> Result<bool, BridgeError> {
    self.heap.is_cleared(reference)
  }

  fn same_identity(&self, a: ObjectRef, b: ObjectRef) -> Result<bool, BridgeError> {
    self.heap.same_identity(a, b)
  }

  fn collect_garbage(&mut self) {
    self.heap.collect_garbage();
  }

  fn new_string(&mut self, value: &str) -> Result<ObjectRef, BridgeError> {
    self.heap.new_string(value)
  }

  fn string_value(&self, reference: ObjectRef) -> Result<Option<String>, BridgeError> {
    self.heap.string_value(reference)
  }

  fn new_object(&mut self) -> Result<ObjectRef, BridgeError> {
    self.heap.new_object()
  }

  fn new_context(&mut self) -> Result<ObjectRef, BridgeError> {
    self.heap.new_context()
  }

  fn create_template(&mut self, request: CreateTemplate) -> Result<ObjectRef, BridgeError> {
    self.heap.create_template(request)
  }

  fn set_class_name(&mut self, template: ObjectRef, name: ObjectRef) -> Result<(), BridgeError> {
    self.heap.set_class_name(template, name)
  }

  fn get_instance_template(&mut self, template: ObjectRef) -> Result<ObjectRef, BridgeError> {
    self.heap.get_instance_template(template)
  }

  fn get_prototype_template(&mut self, template: ObjectRef) -> Result<ObjectRef, BridgeError> {
    self.heap.get_prototype_template(template)
  }

  fn get_function(
    &mut self,
    template: ObjectRef,
    context: ObjectRef,
  ) -> Result<ObjectRef, BridgeError> {
    self.heap.get_function(template, context)
  }

  fn has_instance(&mut self, template: ObjectRef, value: ObjectRef) -> Result<bool, BridgeError> {
    self.heap.has_instance(template, value)
  }

  fn set_call_handler(
    &mut self,
    template: ObjectRef,
    callback: Option<CallbackRef>,
    data: ObjectRef,
  ) -> Result<(), BridgeError> {
    if self.fail_set_call_handler.get() {
      return Err(BridgeError::OutOfMemory);
    }
    self.heap.set_call_handler(template, callback, data)
  }

  fn inherit(&mut self, template: ObjectRef, parent: ObjectRef) -> Result<(), BridgeError> {
    self.heap.inherit(template, parent)
  }

  fn object_template_new_instance(
    &mut self,
    template: ObjectRef,
    context: ObjectRef,
  ) -> Result<ObjectRef, BridgeError> {
    self.heap.object_template_new_instance(template, context)
  }

  fn prepare_call(
    &mut self,
    function: ObjectRef,
    receiver: ObjectRef,
    construct: bool,
  ) -> Result<PreparedCall, BridgeError> {
    self.heap.prepare_call(function, receiver, construct)
  }

  fn function_name(&mut self, function: ObjectRef) -> Result<ObjectRef, BridgeError> {
    self.heap.function_name(function)
  }
}

fn flaky_engine() -> Result<(Engine, Rc<Cell<bool>>), BridgeError> {
  let fail = Rc::new(Cell::new(false));
  let engine = Engine::new(FlakyHeap {
    heap: Heap::new(HeapLimits::new(1024 * 1024, 1024 * 1024)),
    fail_set_call_handler: Rc::clone(&fail),
  })?;
  Ok((engine, fail))
}

fn echo_data(info: &mut CallbackInfo<'_>) -> Result<(), BridgeError> {
  let data = info.copy_data()?;
  info.set_return_value(data)
}

fn report_call_kind(info: &mut CallbackInfo<'_>) -> Result<(), BridgeError> {
  let value = info.engine().new_string("replaced")?;
  info.set_return_value(value)
}

#[test]
fn failed_set_call_handler_keeps_previous_pair() -> Result<(), BridgeError> {
  let (mut engine, fail) = flaky_engine()?;
  let ctx = engine.new_context()?;

  let d1 = engine.new_string("d1")?;
  let t = FunctionTemplate::new(
    &mut engine,
    Some(CallbackRef::new(echo_data)),
    Some(&d1),
    None,
    ConstructorBehavior::Allow,
  )?;
  let f = t.get_function(&mut engine, &ctx)?;
  engine.release(d1)?;

  let d2 = engine.new_string("d2")?;
  let mut watch = engine.copy_handle(&d2, true)?;
  engine.make_weak(&mut watch)?;

  fail.set(true);
  assert_eq!(
    t.set_call_handler(&mut engine, Some(CallbackRef::new(report_call_kind)), Some(&d2))
      .unwrap_err(),
    BridgeError::OutOfMemory
  );
  fail.set(false);

  // The registry still holds the pair the managed template holds.
  assert_eq!(
    engine.function_template_callback(t.id())?,
    Some(CallbackRef::new(echo_data))
  );
  let CallbackData::Value(stored) = engine.function_template_data(t.id())? else {
    panic!("expected registered data");
  };
  assert_eq!(engine.string_value(stored)?.as_deref(), Some("d1"));

  // Nothing kept the rejected data alive.
  engine.release(d2)?;
  engine.collect_garbage();
  assert!(engine.is_collected(&watch)?);

  let result = f.call(&mut engine, None, &[])?;
  assert_eq!(engine.string_value(&result)?.as_deref(), Some("d1"));
  Ok(())
}

#[test]
fn set_call_handler_succeeds_after_a_failure() -> Result<(), BridgeError> {
  let (mut engine, fail) = flaky_engine()?;
  let ctx = engine.new_context()?;

  let t = FunctionTemplate::with_callback(&mut engine, CallbackRef::new(echo_data))?;
  let f = t.get_function(&mut engine, &ctx)?;

  fail.set(true);
  assert!(t
    .set_call_handler(&mut engine, Some(CallbackRef::new(report_call_kind)), None)
    .is_err());
  let result = f.call(&mut engine, None, &[])?;
  assert!(engine.is_undefined(&result)?);

  fail.set(false);
  t.set_call_handler(&mut engine, Some(CallbackRef::new(report_call_kind)), None)?;
  let result = f.call(&mut engine, None, &[])?;
  assert_eq!(engine.string_value(&result)?.as_deref(), Some("replaced"));
  Ok(())
}
