//! # Reconcile
//!
//! Diff-and-apply reconciliation of declared key/value entries against a
//! remote key/value store.
//!
//! ## Core Concepts
//!
//! - **Entry**: One key/value binding, compared as a whole record
//! - **EntrySet**: An unordered set of entries, previous or desired
//! - **KeyClient**: Store access bound to a scope and a token
//! - **ScopeResolver**: Picks the scope, tolerating denied discovery
//! - **Engine**: Writes added entries, then deletes removed ones, then re-reads
//!
//! ## Example
//!
//! ```
//! use reconcile::{
//!     Entry, EntrySet, KeyClient, MemoryStore, NoProgress, ProviderDefaults,
//!     ScopeResolver, apply,
//! };
//!
//! let store = MemoryStore::new();
//! let defaults = ProviderDefaults::default();
//!
//! // Ask the agent for the scope since none is pinned
//! let scope = ScopeResolver::new(&defaults).resolve(None, &store)?;
//! let client = KeyClient::new(&store, scope, defaults.token_for(None));
//!
//! let previous: EntrySet = [Entry::write("app/version", "1").with_delete(true)]
//!     .into_iter()
//!     .collect();
//! let desired: EntrySet = [Entry::write("app/version", "2")
//!     .with_label("version")
//!     .with_delete(true)]
//! .into_iter()
//! .collect();
//!
//! let result = apply(&previous, &desired, &client, &mut NoProgress)?;
//! assert_eq!(result.vars["version"], "2");
//! assert_eq!(result.summary.deleted, 0);
//! # Ok::<(), reconcile::Error>(())
//! ```
//!
//! ## Collaborator Traits
//!
//! - [`KvStore`]: The store transport (get/put/delete)
//! - [`ScopeSource`]: Local scope discovery
//! - [`ProgressCallback`]: Receives phase and operation updates

pub mod client;
pub mod context;
pub mod diff;
pub mod engine;
pub mod error;
pub mod memory;
pub mod scope;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use client::{KeyClient, KvStore, StoredValue};
pub use context::{NoProgress, Phase, ProgressCallback, RecordProgress};
pub use diff::{ChangeSet, Plan, plan, teardown_plan};
pub use engine::{apply, apply_simple, destroy, read};
pub use error::{Error, Result, StoreOperation};
pub use memory::{MemoryStore, StoreCall};
pub use scope::{ProviderDefaults, ScopeLookupError, ScopeResolver, ScopeSource};
pub use types::{
    AppliedResult, ApplySummary, DefaultValue, Entry, EntryKind, EntrySet, Operation,
};
