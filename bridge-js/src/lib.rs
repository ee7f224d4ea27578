//! Native-side object identity bridge to a managed JavaScript engine.
//!
//! Objects (templates, functions, values) live inside a managed engine with its own garbage
//! collector. Native code manipulates them through [`Handle`]s, each owning exactly one reference
//! issued by the managed side. The crate provides:
//! - The handle model: copying ([`Engine::copy_handle`]), weak promotion ([`Engine::make_weak`]),
//!   release ([`Engine::release`])
//! - Dense, engine-scoped function template ids ([`TemplateId`], [`IdAllocator`])
//! - The callback registry mapping template ids to native callbacks and their data
//! - Function and object templates ([`FunctionTemplate`], [`ObjectTemplate`])
//! - Contexts and functions, including dispatch of calls to native callbacks ([`Context`],
//!   [`Function`])
//! - The request vocabulary to the managed side ([`Boundary`]), and an in-process managed heap
//!   implementing it ([`Heap`])
//!
//! # Lifetimes across the boundary
//!
//! A handle never aliases another handle's reference: [`Engine::copy_handle`] always asks the
//! managed side for a new one. Strong references keep their object alive; weak references leave
//! reclamation to the managed collector and are cleared once the object is gone. Callback data is
//! stored weakly by the registry because the managed template already owns it.
//!
//! Every operation takes the [`Engine`] explicitly. One engine is driven from one logical
//! execution context at a time; nothing in this crate locks.

mod boundary;
mod callback;
mod context;
mod engine;
mod error;
mod handle;
mod heap;
mod id;
mod object_template;
mod registry;
mod template;

pub use crate::boundary::Boundary;
pub use crate::boundary::ConstructorBehavior;
pub use crate::boundary::CreateTemplate;
pub use crate::boundary::PreparedCall;
pub use crate::callback::CallbackInfo;
pub use crate::callback::CallbackRef;
pub use crate::callback::FunctionCallback;
pub use crate::context::Context;
pub use crate::context::Function;
pub use crate::engine::Engine;
pub use crate::engine::EngineOptions;
pub use crate::engine::MAX_INHERITANCE_CHAIN;
pub use crate::error::BridgeError;
pub use crate::handle::EngineId;
pub use crate::handle::Handle;
pub use crate::handle::ObjectRef;
pub use crate::handle::Strength;
pub use crate::heap::Heap;
pub use crate::heap::HeapLimits;
pub use crate::id::IdAllocator;
pub use crate::id::TemplateId;
pub use crate::object_template::ObjectTemplate;
pub use crate::registry::CallbackData;
pub use crate::template::FunctionTemplate;
