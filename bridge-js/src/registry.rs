use crate::BridgeError;
use crate::CallbackRef;
use crate::Handle;
use crate::IdAllocator;
use crate::TemplateId;
use core::mem;

/// The data closed over by a registered callback.
#[derive(Debug, PartialEq, Eq)]
pub enum CallbackData {
  /// No data was supplied; the callback sees the engine's undefined sentinel.
  Undefined,
  /// An independent weak copy of the caller's value.
  Value(Handle),
}

impl CallbackData {
  #[inline]
  pub fn is_undefined(&self) -> bool {
    matches!(self, CallbackData::Undefined)
  }

  /// The stored handle, or `undefined` for [`CallbackData::Undefined`].
  #[inline]
  pub fn handle_or<'a>(&'a self, undefined: &'a Handle) -> &'a Handle {
    match self {
      CallbackData::Undefined => undefined,
      CallbackData::Value(handle) => handle,
    }
  }

  fn into_handle(self) -> Option<Handle> {
    match self {
      CallbackData::Undefined => None,
      CallbackData::Value(handle) => Some(handle),
    }
  }
}

/// Per-template native state.
#[derive(Debug)]
pub(crate) struct RegistryEntry {
  pub(crate) callback: Option<CallbackRef>,
  pub(crate) data: CallbackData,
  pub(crate) parent: Option<TemplateId>,
  pub(crate) function: Option<Handle>,
}

impl RegistryEntry {
  fn new() -> Self {
    Self {
      callback: None,
      data: CallbackData::Undefined,
      parent: None,
      function: None,
    }
  }
}

/// Engine-scoped arena mapping template ids to their callback, data, inheritance edge and most
/// recently materialized function.
///
/// The arena is indexed densely by `id - base`. It is authoritative: a lookup for an id the
/// engine's [`IdAllocator`] never issued is a programming error and fails with
/// [`BridgeError::UnknownTemplate`].
///
/// Replacing a handle (data, function) hands the previous one back to the caller so it can be
/// released on the managed side; the registry itself never talks across the boundary.
#[derive(Debug, Default)]
pub(crate) struct CallbackRegistry {
  entries: Vec<Option<RegistryEntry>>,
}

impl CallbackRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates the (empty) entry for a freshly allocated id.
  pub(crate) fn insert(&mut self, ids: &IdAllocator, id: TemplateId) -> Result<(), BridgeError> {
    let idx = ids.slot(id).ok_or(BridgeError::UnknownTemplate(id))?;
    if idx >= self.entries.len() {
      self.entries.resize_with(idx + 1, || None);
    }
    debug_assert!(self.entries[idx].is_none(), "template id registered twice");
    self.entries[idx] = Some(RegistryEntry::new());
    Ok(())
  }

  pub(crate) fn entry(&self, ids: &IdAllocator, id: TemplateId) -> Result<&RegistryEntry, BridgeError> {
    ids
      .slot(id)
      .and_then(|idx| self.entries.get(idx))
      .and_then(|entry| entry.as_ref())
      .ok_or(BridgeError::UnknownTemplate(id))
  }

  pub(crate) fn entry_mut(
    &mut self,
    ids: &IdAllocator,
    id: TemplateId,
  ) -> Result<&mut RegistryEntry, BridgeError> {
    ids
      .slot(id)
      .and_then(|idx| self.entries.get_mut(idx))
      .and_then(|entry| entry.as_mut())
      .ok_or(BridgeError::UnknownTemplate(id))
  }

  /// Overwrites the callback registered for `id`.
  pub(crate) fn set_callback(
    &mut self,
    ids: &IdAllocator,
    id: TemplateId,
    callback: Option<CallbackRef>,
  ) -> Result<(), BridgeError> {
    self.entry_mut(ids, id)?.callback = callback;
    Ok(())
  }

  /// Overwrites the data registered for `id`, returning the previous handle (if any).
  pub(crate) fn set_data(
    &mut self,
    ids: &IdAllocator,
    id: TemplateId,
    data: CallbackData,
  ) -> Result<Option<Handle>, BridgeError> {
    let entry = self.entry_mut(ids, id)?;
    Ok(mem::replace(&mut entry.data, data).into_handle())
  }

  /// Overwrites the materialized function recorded for `id`, returning the previous one (if any).
  pub(crate) fn set_function(
    &mut self,
    ids: &IdAllocator,
    id: TemplateId,
    function: Handle,
  ) -> Result<Option<Handle>, BridgeError> {
    Ok(self.entry_mut(ids, id)?.function.replace(function))
  }

  /// Removes every entry, returning all handles the registry owned.
  pub(crate) fn drain_handles(&mut self) -> Vec<Handle> {
    let mut handles = Vec::new();
    for entry in self.entries.drain(..).flatten() {
      handles.extend(entry.data.into_handle());
      handles.extend(entry.function);
    }
    handles
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::callback::CallbackInfo;

  fn noop(_info: &mut CallbackInfo<'_>) -> Result<(), BridgeError> {
    Ok(())
  }

  fn other(_info: &mut CallbackInfo<'_>) -> Result<(), BridgeError> {
    Err(BridgeError::Boundary("other"))
  }

  #[test]
  fn lookup_of_unallocated_id_is_an_error() {
    let mut ids = IdAllocator::new(0);
    let mut registry = CallbackRegistry::new();
    let id = ids.next_id().unwrap();
    registry.insert(&ids, id).unwrap();

    assert!(registry.entry(&ids, id).is_ok());
    assert!(matches!(
      registry.entry(&ids, TemplateId(1)),
      Err(BridgeError::UnknownTemplate(TemplateId(1)))
    ));
    assert!(matches!(
      registry.set_callback(&ids, TemplateId(5), None),
      Err(BridgeError::UnknownTemplate(TemplateId(5)))
    ));
  }

  #[test]
  fn callback_overwrite_is_unconditional() {
    let mut ids = IdAllocator::new(100);
    let mut registry = CallbackRegistry::new();
    let id = ids.next_id().unwrap();
    registry.insert(&ids, id).unwrap();

    assert_eq!(registry.entry(&ids, id).unwrap().callback, None);
    registry
      .set_callback(&ids, id, Some(CallbackRef::new(noop)))
      .unwrap();
    registry
      .set_callback(&ids, id, Some(CallbackRef::new(other)))
      .unwrap();
    assert_eq!(
      registry.entry(&ids, id).unwrap().callback,
      Some(CallbackRef::new(other))
    );
    assert!(registry.entry(&ids, id).unwrap().data.is_undefined());
  }
}
