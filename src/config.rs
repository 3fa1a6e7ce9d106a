//! Scheduler construction options.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Prefix for every log line, so several schedulers inside one host
    /// engine stay distinguishable.
    pub label: String,
    /// Handle slots reserved up front.
    pub initial_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            label: "scheduler".to_string(),
            initial_capacity: 0,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.label, "scheduler");
        assert_eq!(config.initial_capacity, 0);
    }

    #[test]
    fn test_config_builder() {
        let config = SchedulerConfig::new()
            .with_label("io")
            .with_initial_capacity(32);
        assert_eq!(config.label, "io");
        assert_eq!(config.initial_capacity, 32);
    }
}
