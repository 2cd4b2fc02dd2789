//! Configuration for Polarway Accounts

use std::path::{Path, PathBuf};

/// Accounts configuration
#[derive(Debug, Clone)]
pub struct AccountsConfig {
    /// API id handed to the resolver when building sessions
    pub api_id: i32,

    /// Shared directory holding per-account session state
    pub app_group_path: PathBuf,

    /// Resolve current accounts against the testing environment
    pub testing_environment: bool,

    /// Capacity of the in-memory store's request channel
    pub store_channel_capacity: usize,
}

impl AccountsConfig {
    /// Create config with sensible defaults
    ///
    /// `testing_environment` defaults to the `POLARWAY_ACCOUNTS_TESTING`
    /// environment variable (`1` or `true`), otherwise `false`.
    pub fn new(api_id: i32, app_group_path: impl AsRef<Path>) -> Self {
        let testing_environment = std::env::var("POLARWAY_ACCOUNTS_TESTING")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"))
            .unwrap_or(false);

        Self {
            api_id,
            app_group_path: app_group_path.as_ref().to_path_buf(),
            testing_environment,
            store_channel_capacity: 256,
        }
    }

    /// Override testing environment flag
    pub fn with_testing_environment(mut self, testing: bool) -> Self {
        self.testing_environment = testing;
        self
    }

    /// Override store channel capacity (clamped to at least 1)
    pub fn with_store_channel_capacity(mut self, capacity: usize) -> Self {
        self.store_channel_capacity = capacity.max(1);
        self
    }

    /// Options used when resolving the current account
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            api_id: self.api_id,
            app_group_path: self.app_group_path.clone(),
            testing_environment: self.testing_environment,
        }
    }

    /// Options used when resolving accounts for cleanup.
    ///
    /// Cleanup always talks to the production environment.
    pub fn cleanup_resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            testing_environment: false,
            ..self.resolve_options()
        }
    }
}

/// Parameters passed to [`AccountResolver::resolve`](crate::AccountResolver::resolve)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    pub api_id: i32,
    pub app_group_path: PathBuf,
    pub testing_environment: bool,
}
