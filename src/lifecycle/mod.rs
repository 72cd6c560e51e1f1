//! Device binding lifecycle.
//!
//! [`LifecycleManager`] is a synchronous ledger over registry state. Each
//! transition is split into a `plan_*` step that validates against the ledger
//! and yields the [`RegistryRequest`]s to send, and [`LifecycleManager::commit`]
//! that applies them once the registry accepted them. A rejected plan leaves
//! the ledger untouched.

pub mod error;
pub mod manager;
pub mod state;

pub use error::{LifecycleError, Missing};
pub use manager::{LifecycleManager, RegistrySnapshot};
pub use state::{Binding, BindingState, RegistryRequest};
