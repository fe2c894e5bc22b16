//! Waypoint Registry
//!
//! The capability maps the engine reads while executing a graph:
//!
//! - action kinds: an optional executor plus an optional retry policy
//! - comparators: an arity plus a synchronous predicate
//! - operand resolvers: keyed by operand kind (or by `fnId` for `fn` operands)
//!
//! A [`Registry`] is built once with [`RegistryBuilder`] and then shared
//! read-only. Populating it from manifests or plugin systems is up to the host.

mod action;
mod comparator;
mod context;
mod builtin;
mod registry;
mod resolver;

pub use action::{ActionError, ActionExecutor, ActionKind, FnAction, RetryPolicy};
pub use comparator::{Arity, Comparator, ComparatorDef};
pub use context::{ExecContext, FlowContext, RuntimeContext, UserContext};
pub use registry::{Registry, RegistryBuilder, RegistryError};
pub use resolver::{FnResolver, OperandResolver, ResolveError};
