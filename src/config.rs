//! `mdstore` global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Global configuration options for the mdstore crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
/// A [`Dataset`](crate::dataset::Dataset) takes a snapshot of the global configuration when it is opened,
/// and [`OpenOptions`](crate::dataset::OpenOptions) can override individual options per store handle.
///
/// # Codec Configuration Options
///
/// ## Validate Checksums
///  > default: [`true`]
///
/// If enabled, checksum filters (e.g. `crc32c`) validate that decoded data matches stored checksums, otherwise validation is skipped.
///
/// ## Allow Partial Reads
///  > default: [`false`]
///
/// If enabled, a chunk that cannot be decoded (an unsupported codec, a corrupt or truncated payload) is read as if it had never been written,
/// i.e. it is filled with the fill value, and a warning is logged.
/// Otherwise the read touching that chunk fails, while reads of other chunks are unaffected.
///
/// # Chunk Configuration Options
///
/// ## Free Empty Chunks
///  > default: [`true`]
///
/// If enabled, a chunk whose content is entirely the fill value is erased from the store instead of being written.
///
/// ## Block Size Limit
///  > default: `256`
///
/// The maximum chunk extent generated for the last two dimensions of an array created without an explicit chunk shape.
#[derive(Debug, Clone)]
pub struct Config {
    validate_checksums: bool,
    allow_partial_reads: bool,
    free_empty_chunks: bool,
    block_size_limit: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            validate_checksums: true,
            allow_partial_reads: false,
            free_empty_chunks: true,
            block_size_limit: 256,
        }
    }
}

impl Config {
    /// Get the [validate checksums](#validate-checksums) configuration.
    #[must_use]
    pub fn validate_checksums(&self) -> bool {
        self.validate_checksums
    }

    /// Set the [validate checksums](#validate-checksums) configuration.
    pub fn set_validate_checksums(&mut self, validate_checksums: bool) -> &mut Self {
        self.validate_checksums = validate_checksums;
        self
    }

    /// Get the [allow partial reads](#allow-partial-reads) configuration.
    #[must_use]
    pub fn allow_partial_reads(&self) -> bool {
        self.allow_partial_reads
    }

    /// Set the [allow partial reads](#allow-partial-reads) configuration.
    pub fn set_allow_partial_reads(&mut self, allow_partial_reads: bool) -> &mut Self {
        self.allow_partial_reads = allow_partial_reads;
        self
    }

    /// Get the [free empty chunks](#free-empty-chunks) configuration.
    #[must_use]
    pub fn free_empty_chunks(&self) -> bool {
        self.free_empty_chunks
    }

    /// Set the [free empty chunks](#free-empty-chunks) configuration.
    pub fn set_free_empty_chunks(&mut self, free_empty_chunks: bool) -> &mut Self {
        self.free_empty_chunks = free_empty_chunks;
        self
    }

    /// Get the [block size limit](#block-size-limit) configuration.
    #[must_use]
    pub fn block_size_limit(&self) -> u64 {
        self.block_size_limit
    }

    /// Set the [block size limit](#block-size-limit) configuration.
    ///
    /// A limit of zero is treated as one.
    pub fn set_block_size_limit(&mut self, block_size_limit: u64) -> &mut Self {
        self.block_size_limit = block_size_limit.max(1);
        self
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global mdstore configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global mdstore configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}
