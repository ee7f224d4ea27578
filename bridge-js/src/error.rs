use crate::id::TemplateId;

/// Errors produced by the bridge or reported by the managed side of a boundary request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
  /// The managed heap has exceeded its configured memory limit.
  #[error("out of memory")]
  OutOfMemory,

  /// A reference was used after the managed side released or cleared it (or the reference is
  /// otherwise malformed).
  #[error("invalid handle")]
  InvalidHandle,

  /// A handle created by one engine was passed to another.
  #[error("handle belongs to a different engine")]
  ForeignHandle,

  /// The callback registry was queried for an id it never allocated.
  #[error("unknown function template id {0}")]
  UnknownTemplate(TemplateId),

  /// The 32-bit template id space is exhausted.
  #[error("function template ids exhausted")]
  TemplateIdsExhausted,

  /// `Inherit` was called on a template that already has a parent.
  #[error("function template {0} already inherits from another template")]
  AlreadyInherited(TemplateId),

  /// `Inherit` would make a template its own ancestor.
  #[error("inheritance cycle through function template {0}")]
  InheritanceCycle(TemplateId),

  /// A template inheritance chain traversal exceeded a hard upper bound.
  #[error("inheritance chain too deep")]
  InheritanceChainTooDeep,

  /// A request expected a reference of a different managed kind.
  #[error("expected {0}")]
  WrongKind(&'static str),

  /// The receiver of a call did not satisfy the function template's signature.
  #[error("illegal invocation")]
  IllegalInvocation,

  /// Attempted to construct a function whose template does not allow construction.
  #[error("function is not a constructor")]
  NotConstructable,

  /// The managed side could not satisfy a request.
  #[error("boundary request failed: {0}")]
  Boundary(&'static str),
}

impl BridgeError {
  /// Returns `true` for programming errors the embedding was expected to prevent.
  ///
  /// These are not recoverable locally; callers should abort the current call chain. All other
  /// errors are cross-boundary failures that the caller may report and continue past.
  pub fn is_fatal(&self) -> bool {
    matches!(
      self,
      BridgeError::InvalidHandle
        | BridgeError::ForeignHandle
        | BridgeError::UnknownTemplate(_)
        | BridgeError::TemplateIdsExhausted
        | BridgeError::AlreadyInherited(_)
        | BridgeError::InheritanceCycle(_)
    )
  }
}
