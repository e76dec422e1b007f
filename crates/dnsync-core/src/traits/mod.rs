//! Core traits
//!
//! The reconciler's two external collaborators:
//!
//! - [`DnsProvider`]: the remote authoritative DNS provider
//! - [`RecordStore`]: the persisted desired state

pub mod dns_provider;
pub mod record_store;

pub use dns_provider::{DnsProvider, DnsProviderFactory};
pub use record_store::RecordStore;
