use core::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// An opaque reference to an object living on the managed side of the boundary.
///
/// This is a packed `{ index: u32, generation: u32 }` into the managed side's reference table.
/// Each reference is owned by exactly one native [`Handle`]; the managed side bumps `generation`
/// whenever the reference is released, so a reference that outlives its release is detected
/// rather than aliased to whatever reuses the slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjectRef(u64);

impl ObjectRef {
  pub fn from_parts(index: u32, generation: u32) -> Self {
    Self((index as u64) | ((generation as u64) << 32))
  }

  /// The slot index within the managed reference table.
  #[inline]
  pub fn index(self) -> u32 {
    self.0 as u32
  }

  /// The generation of the slot when this reference was created.
  #[inline]
  pub fn generation(self) -> u32 {
    (self.0 >> 32) as u32
  }
}

impl fmt::Debug for ObjectRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ObjectRef")
      .field("index", &self.index())
      .field("generation", &self.generation())
      .finish()
  }
}

/// Identifies one [`Engine`](crate::Engine) instance within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct EngineId(u64);

impl EngineId {
  pub(crate) fn next() -> Self {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    Self(NEXT.fetch_add(1, Ordering::Relaxed))
  }
}

/// Who decides when the referenced managed object may be reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strength {
  /// The native holder keeps the object alive.
  Strong,
  /// The managed garbage collector decides; the reference is cleared once the object is gone.
  Weak,
}

/// Native-side wrapper owning one managed-side reference.
///
/// A `Handle` is deliberately not `Clone`: duplicating one must go through
/// [`Engine::copy_handle`](crate::Engine::copy_handle), which asks the managed side for a new
/// reference so the copy's lifetime is independent of the original. Handles are given back with
/// [`Engine::release`](crate::Engine::release).
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Handle {
  reference: ObjectRef,
  engine: EngineId,
  strength: Strength,
  independent: bool,
}

impl Handle {
  pub(crate) fn new(engine: EngineId, reference: ObjectRef, independent: bool) -> Self {
    Self {
      reference,
      engine,
      strength: Strength::Strong,
      independent,
    }
  }

  /// The managed-side reference this handle owns.
  #[inline]
  pub fn reference(&self) -> ObjectRef {
    self.reference
  }

  /// The engine that created this handle.
  #[inline]
  pub fn engine(&self) -> EngineId {
    self.engine
  }

  #[inline]
  pub fn strength(&self) -> Strength {
    self.strength
  }

  #[inline]
  pub fn is_weak(&self) -> bool {
    self.strength == Strength::Weak
  }

  /// Whether this handle was produced by a deep copy and is collectible independently of the
  /// handle it was copied from.
  #[inline]
  pub fn is_independent(&self) -> bool {
    self.independent
  }

  pub(crate) fn mark_weak(&mut self) {
    self.strength = Strength::Weak;
  }
}
