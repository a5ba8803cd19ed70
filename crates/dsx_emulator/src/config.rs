//! Emulator configuration.

/// Configuration for the emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorConfig {
    /// Only requests for this project are served, if set.
    pub project_id: Option<String>,
    /// Maximum mutations accepted in one commit.
    pub max_mutations_per_commit: usize,
    /// Maximum keys answered by one lookup; the rest are deferred.
    pub max_lookup_keys: usize,
    /// Query limit applied when a query sets none.
    pub default_query_limit: u32,
    /// First id handed out for incomplete keys.
    pub first_allocated_id: i64,
}

impl EmulatorConfig {
    /// Creates a configuration that serves any project.
    pub fn new() -> Self {
        Self {
            project_id: None,
            max_mutations_per_commit: 500,
            max_lookup_keys: 1000,
            default_query_limit: 300,
            first_allocated_id: 1,
        }
    }

    /// Restricts the emulator to one project.
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Sets the maximum mutations per commit.
    pub fn with_max_mutations(mut self, max: usize) -> Self {
        self.max_mutations_per_commit = max;
        self
    }

    /// Sets the maximum keys per lookup.
    pub fn with_max_lookup_keys(mut self, max: usize) -> Self {
        self.max_lookup_keys = max;
        self
    }

    /// Sets the default query limit.
    pub fn with_default_query_limit(mut self, limit: u32) -> Self {
        self.default_query_limit = limit;
        self
    }

    /// Sets the first allocated id.
    pub fn with_first_allocated_id(mut self, id: i64) -> Self {
        self.first_allocated_id = id;
        self
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EmulatorConfig::default();
        assert_eq!(config.max_mutations_per_commit, 500);
        assert_eq!(config.max_lookup_keys, 1000);
        assert_eq!(config.default_query_limit, 300);
        assert!(config.project_id.is_none());
    }

    #[test]
    fn config_builder() {
        let config = EmulatorConfig::new()
            .with_project("demo")
            .with_max_mutations(10)
            .with_max_lookup_keys(2)
            .with_default_query_limit(5)
            .with_first_allocated_id(1000);

        assert_eq!(config.project_id.as_deref(), Some("demo"));
        assert_eq!(config.max_mutations_per_commit, 10);
        assert_eq!(config.max_lookup_keys, 2);
        assert_eq!(config.default_query_limit, 5);
        assert_eq!(config.first_allocated_id, 1000);
    }
}
