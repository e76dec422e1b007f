// # Record Store Implementations
//
// This module provides implementations of the RecordStore trait for
// different persistence strategies.

mod catalog;
pub mod file;
pub mod memory;

pub use catalog::NameValidator;
pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;
