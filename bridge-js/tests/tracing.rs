use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;

use bridge_js::{
  BridgeError, CallbackInfo, CallbackRef, ConstructorBehavior, Engine, FunctionTemplate, Heap,
  HeapLimits,
};

#[derive(Clone, Default)]
struct SharedWriter {
  buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
  fn into_inner(self) -> Vec<u8> {
    match Arc::try_unwrap(self.buffer) {
      Ok(buffer) => buffer.into_inner().unwrap(),
      Err(arc) => arc.lock().unwrap().clone(),
    }
  }
}

struct SharedWriterGuard<'a> {
  buffer: &'a Arc<Mutex<Vec<u8>>>,
}

impl<'a> io::Write for SharedWriterGuard<'a> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.buffer.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl<'a> MakeWriter<'a> for SharedWriter {
  type Writer = SharedWriterGuard<'a>;

  fn make_writer(&'a self) -> Self::Writer {
    SharedWriterGuard {
      buffer: &self.buffer,
    }
  }
}

fn noop(_info: &mut CallbackInfo<'_>) -> Result<(), BridgeError> {
  Ok(())
}

#[test]
fn tracing_emits_boundary_spans() {
  let writer = SharedWriter::default();
  let subscriber = tracing_subscriber::fmt()
    .with_span_events(FmtSpan::CLOSE)
    .with_max_level(tracing::Level::TRACE)
    .with_ansi(false)
    .with_writer(writer.clone())
    .finish();
  let _guard = tracing::subscriber::set_default(subscriber);

  let mut engine = Engine::new(Heap::new(HeapLimits::new(1024 * 1024, 1024 * 1024))).unwrap();
  let ctx = engine.new_context().unwrap();
  let t = FunctionTemplate::with_callback(&mut engine, CallbackRef::new(noop)).unwrap();
  let f = t.get_function(&mut engine, &ctx).unwrap();
  f.call(&mut engine, None, &[]).unwrap();

  let other = FunctionTemplate::new(&mut engine, None, None, None, ConstructorBehavior::Throw)
    .unwrap()
    .get_function(&mut engine, &ctx)
    .unwrap();
  assert_eq!(
    other.new_instance(&mut engine, &[]).unwrap_err(),
    BridgeError::NotConstructable
  );

  drop(_guard);
  let output = String::from_utf8(writer.into_inner()).unwrap();
  assert!(
    output.contains("bridge_js.boundary"),
    "expected boundary span output, got: {output}"
  );
  assert!(
    output.contains("create_template"),
    "expected create_template request to be recorded"
  );
  assert!(
    output.contains("dispatching native callback"),
    "expected dispatch event, got: {output}"
  );
  assert!(
    output.contains("boundary request failed"),
    "expected failed request to be logged"
  );
}
