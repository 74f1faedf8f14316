//! Store and repository configuration.

/// Hard upper bound for `max_segment_size`.
pub const SEGMENT_SIZE_LIMIT: usize = 1024 * 1024;

/// Configuration for opening a store or repository.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the archive if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the archive already exists.
    pub error_if_exists: bool,

    /// Maximum size of a single segment in bytes.
    pub max_segment_size: usize,

    /// Size at which the writer rolls over to a new archive file.
    pub max_archive_file_size: u64,

    /// Whether to sync the archive file after every head record.
    pub sync_on_commit: bool,

    /// How many times a commit is rebased after losing the root swap.
    pub commit_retries: u32,

    /// Number of recently read segments kept in memory.
    pub segment_cache_size: usize,

    /// User id accepted by `Repository::login`.
    pub admin_user: String,

    /// Password accepted by `Repository::login`.
    pub admin_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            max_segment_size: 256 * 1024,              // 256 KiB
            max_archive_file_size: 256 * 1024 * 1024, // 256 MiB
            sync_on_commit: true,
            commit_retries: 16,
            segment_cache_size: 64,
            admin_user: "admin".to_string(),
            admin_password: "admin".to_string(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the archive if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if the archive exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets the maximum segment size, capped at [`SEGMENT_SIZE_LIMIT`].
    #[must_use]
    pub const fn max_segment_size(mut self, size: usize) -> Self {
        self.max_segment_size = if size > SEGMENT_SIZE_LIMIT {
            SEGMENT_SIZE_LIMIT
        } else {
            size
        };
        self
    }

    /// Sets the archive file roll-over size.
    #[must_use]
    pub const fn max_archive_file_size(mut self, size: u64) -> Self {
        self.max_archive_file_size = size;
        self
    }

    /// Sets whether to sync on every head record.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the commit retry bound.
    #[must_use]
    pub const fn commit_retries(mut self, retries: u32) -> Self {
        self.commit_retries = retries;
        self
    }

    /// Sets the segment cache capacity.
    #[must_use]
    pub const fn segment_cache_size(mut self, entries: usize) -> Self {
        self.segment_cache_size = entries;
        self
    }

    /// Sets the administrator credentials.
    #[must_use]
    pub fn admin_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.admin_user = user.into();
        self.admin_password = password.into();
        self
    }
}
