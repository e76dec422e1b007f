//! Registries
//!
//! - [`DomainRegistry`]: static mapping from domain suffix to zone and
//!   credential, injected into every component that resolves record names
//! - [`ProviderRegistry`]: plugin-style lookup of provider factories by type
//!   name, avoiding hardcoded if-else chains in the daemon

pub mod domains;
pub mod providers;

pub use domains::{Credential, DomainRegistry, Zone};
pub use providers::ProviderRegistry;
