//! Every allocation on these heaps runs a full collection first, so any id a boundary request
//! holds without rooting it is swept out from under the request.

use bridge_js::{
  BridgeError, CallbackData, CallbackInfo, CallbackRef, ConstructorBehavior, Engine,
  FunctionTemplate, Heap, HeapLimits,
};

fn engine() -> Result<Engine, BridgeError> {
  Engine::new(Heap::new(HeapLimits::new(1024 * 1024, 0)))
}

fn echo_data(info: &mut CallbackInfo<'_>) -> Result<(), BridgeError> {
  let data = info.copy_data()?;
  info.set_return_value(data)
}

fn tag_instance(info: &mut CallbackInfo<'_>) -> Result<(), BridgeError> {
  // Allocates while the new instance is only held by the call.
  let value = info.engine().new_string("tagged")?;
  info.set_return_value(value)
}

#[test]
fn weak_data_survives_template_creation() -> Result<(), BridgeError> {
  let mut engine = engine()?;
  let ctx = engine.new_context()?;

  let mut data = engine.new_string("payload")?;
  engine.make_weak(&mut data)?;
  let t = FunctionTemplate::new(
    &mut engine,
    Some(CallbackRef::new(echo_data)),
    Some(&data),
    None,
    ConstructorBehavior::Allow,
  )?;
  assert!(!engine.is_collected(&data)?);

  engine.collect_garbage();
  assert!(!engine.is_collected(&data)?);
  let CallbackData::Value(stored) = engine.function_template_data(t.id())? else {
    panic!("expected registered data");
  };
  assert_eq!(engine.string_value(stored)?.as_deref(), Some("payload"));

  let f = t.get_function(&mut engine, &ctx)?;
  let result = f.call(&mut engine, None, &[])?;
  assert_eq!(engine.string_value(&result)?.as_deref(), Some("payload"));
  Ok(())
}

#[test]
fn signature_outlives_its_template_handle() -> Result<(), BridgeError> {
  let mut engine = engine()?;
  let ctx = engine.new_context()?;

  let owner = FunctionTemplate::new(&mut engine, None, None, None, ConstructorBehavior::Allow)?;
  let receiver = owner.instance_template(&mut engine)?.new_instance(&mut engine, &ctx)?;
  let method = FunctionTemplate::new(
    &mut engine,
    Some(CallbackRef::new(echo_data)),
    None,
    Some(&owner),
    ConstructorBehavior::Throw,
  )?;
  let mut watch = engine.copy_handle(owner.handle(), true)?;
  engine.make_weak(&mut watch)?;
  owner.release(&mut engine)?;

  let f = method.get_function(&mut engine, &ctx)?;
  assert!(!engine.is_collected(&watch)?);
  f.call(&mut engine, Some(&receiver), &[])?;

  let stranger = engine.new_object()?;
  assert_eq!(
    f.call(&mut engine, Some(&stranger), &[]).unwrap_err(),
    BridgeError::IllegalInvocation
  );
  Ok(())
}

#[test]
fn get_function_under_collection_pressure() -> Result<(), BridgeError> {
  let mut engine = engine()?;
  let ctx = engine.new_context()?;

  let t = FunctionTemplate::with_callback(&mut engine, CallbackRef::new(echo_data))?;
  let f = t.get_function(&mut engine, &ctx)?;
  let again = t.get_function(&mut engine, &ctx)?;
  assert!(engine.same_identity(f.handle(), again.handle())?);

  let recorded = engine
    .function_template_function(t.id())?
    .expect("recorded function");
  assert!(engine.same_identity(recorded, f.handle())?);

  // The context keeps the function alive once every native handle is gone.
  f.release(&mut engine)?;
  again.release(&mut engine)?;
  engine.collect_garbage();
  let f = t.get_function(&mut engine, &ctx)?;
  let result = f.call(&mut engine, None, &[])?;
  assert!(engine.is_undefined(&result)?);
  Ok(())
}

#[test]
fn construct_calls_under_collection_pressure() -> Result<(), BridgeError> {
  let mut engine = engine()?;
  let ctx = engine.new_context()?;

  let t = FunctionTemplate::with_callback(&mut engine, CallbackRef::new(tag_instance))?;
  let f = t.get_function(&mut engine, &ctx)?;
  let a = f.new_instance(&mut engine, &[])?;
  let b = f.new_instance(&mut engine, &[])?;
  engine.collect_garbage();

  assert!(t.has_instance(&mut engine, &a)?);
  assert!(t.has_instance(&mut engine, &b)?);
  assert!(!engine.same_identity(&a, &b)?);
  Ok(())
}

#[test]
fn instance_templates_under_collection_pressure() -> Result<(), BridgeError> {
  let mut engine = engine()?;
  let ctx = engine.new_context()?;

  let parent = FunctionTemplate::new(&mut engine, None, None, None, ConstructorBehavior::Allow)?;
  let child = FunctionTemplate::new(&mut engine, None, None, None, ConstructorBehavior::Allow)?;
  child.inherit(&mut engine, &parent)?;

  let instance_template = child.instance_template(&mut engine)?;
  let again = child.instance_template(&mut engine)?;
  assert!(engine.same_identity(instance_template.handle(), again.handle())?);
  let proto = child.prototype_template(&mut engine)?;
  assert!(!engine.same_identity(instance_template.handle(), proto.handle())?);

  let instance = instance_template.new_instance(&mut engine, &ctx)?;
  engine.collect_garbage();
  assert!(child.has_instance(&mut engine, &instance)?);
  assert!(parent.has_instance(&mut engine, &instance)?);
  Ok(())
}

#[test]
fn weak_handles_are_cleared_after_sweep() -> Result<(), BridgeError> {
  let mut engine = engine()?;

  let mut cache = engine.new_object()?;
  engine.make_weak(&mut cache)?;
  // The next allocation collects first and sweeps the weakly held object.
  let _other = engine.new_object()?;
  assert!(engine.is_collected(&cache)?);
  assert_eq!(
    engine.copy_handle(&cache, false).unwrap_err(),
    BridgeError::InvalidHandle
  );
  Ok(())
}
