//! Storage adapters.
//!
//! An adapter wraps another store and exposes the same interface.
//! [`FailingStorageAdapter`] counts store accesses and injects write failures, to test that mutations leave a store consistent.

mod failing;

pub use self::failing::FailingStorageAdapter;
