// # dnsync-core
//
// Core library for DNS record reconciliation.
//
// ## Architecture Overview
//
// The store declares which records should exist; the provider holds what
// actually exists. A periodic pass converges the provider towards the store:
//
// - **RecordStore**: Trait for the persisted desired state (soft deletes via tombstones)
// - **DnsProvider**: Trait for listing and mutating records through a provider API
// - **DomainRegistry**: Domain suffix → zone and credential mapping, injected where names are resolved
// - **Reconciler**: Fetch, diff, apply, clean; one pass at a time
// - **ProviderRegistry**: Plugin-based registry for DNS providers
//
// ## Design Principles
//
// 1. **One-directional**: Remote records with no declared counterpart are never touched
// 2. **Independent outcomes**: One record's failure never affects another's
// 3. **Consistent snapshot**: A pass either sees every zone or applies nothing
// 4. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 5. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{DomainConfig, ProviderConfig, PurgePolicy, ReconcilerConfig, StoreConfig, SyncConfig};
pub use engine::{DriverState, PassReport, ReconcileEvent, Reconciler};
pub use error::{Error, Result};
pub use record::{DesiredRecord, ProviderRecord, RecordData, RecordType, RemoteRecord};
pub use registry::{DomainRegistry, ProviderRegistry, Zone};
pub use state::{FileRecordStore, MemoryRecordStore, NameValidator};
pub use traits::{DnsProvider, DnsProviderFactory, RecordStore};
