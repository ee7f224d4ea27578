use crate::BridgeError;
use core::fmt;

/// Engine-scoped identifier of a function template.
///
/// Ids are dense: an engine hands them out in strictly increasing order starting at
/// [`EngineOptions::first_template_id`](crate::EngineOptions::first_template_id) and never reuses
/// one while the engine lives. The callback registry is indexed by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TemplateId(pub u32);

impl fmt::Display for TemplateId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Issues [`TemplateId`]s for one engine.
///
/// There is no internal locking: the allocator is owned by the engine and only reachable through
/// `&mut Engine`.
#[derive(Debug)]
pub struct IdAllocator {
  base: u32,
  next: Option<u32>,
}

impl IdAllocator {
  pub fn new(base: u32) -> Self {
    Self {
      base,
      next: Some(base),
    }
  }

  /// The first id this allocator hands out.
  #[inline]
  pub fn base(&self) -> u32 {
    self.base
  }

  /// Returns the next id. Fails once the 32-bit id space is used up rather than wrapping.
  pub fn next_id(&mut self) -> Result<TemplateId, BridgeError> {
    let id = self.next.ok_or(BridgeError::TemplateIdsExhausted)?;
    self.next = id.checked_add(1);
    Ok(TemplateId(id))
  }

  /// Number of ids allocated so far.
  pub fn allocated(&self) -> usize {
    match self.next {
      Some(next) => (next - self.base) as usize,
      None => (u32::MAX - self.base) as usize + 1,
    }
  }

  /// Returns `true` if `id` was handed out by this allocator.
  pub fn contains(&self, id: TemplateId) -> bool {
    id.0 >= self.base && self.next.map_or(true, |next| id.0 < next)
  }

  /// Dense index of `id` into per-template arenas.
  #[inline]
  pub(crate) fn slot(&self, id: TemplateId) -> Option<usize> {
    self.contains(id).then(|| (id.0 - self.base) as usize)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ids_are_strictly_increasing_from_base() {
    let mut ids = IdAllocator::new(10);
    assert_eq!(ids.next_id().unwrap(), TemplateId(10));
    assert_eq!(ids.next_id().unwrap(), TemplateId(11));
    assert_eq!(ids.next_id().unwrap(), TemplateId(12));
    assert_eq!(ids.allocated(), 3);
    assert!(ids.contains(TemplateId(11)));
    assert!(!ids.contains(TemplateId(9)));
    assert!(!ids.contains(TemplateId(13)));
    assert_eq!(ids.slot(TemplateId(12)), Some(2));
  }

  #[test]
  fn exhaustion_is_an_error_not_a_wrap() {
    let mut ids = IdAllocator::new(u32::MAX - 1);
    assert_eq!(ids.next_id().unwrap(), TemplateId(u32::MAX - 1));
    assert_eq!(ids.next_id().unwrap(), TemplateId(u32::MAX));
    assert_eq!(ids.next_id(), Err(BridgeError::TemplateIdsExhausted));
    assert!(ids.contains(TemplateId(u32::MAX)));
    assert_eq!(ids.allocated(), 2);
  }
}
