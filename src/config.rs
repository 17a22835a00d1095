use std::path::PathBuf;

pub const LOG_ENV: &str = "TIMETABLED_LOG";
pub const WORKSPACE_ENV: &str = "TIMETABLED_WORKSPACE";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub log_filter: String,
    /// Opened at start-up as if `workspace.select` had been sent.
    pub workspace: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let log_filter = get(LOG_ENV)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let workspace = get(WORKSPACE_ENV)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        Self {
            log_filter,
            workspace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> DaemonConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = config_from(&[]);
        assert_eq!(cfg.log_filter, "info");
        assert!(cfg.workspace.is_none());
    }

    #[test]
    fn reads_filter_and_workspace() {
        let cfg = config_from(&[
            (LOG_ENV, "timetabled=debug"),
            (WORKSPACE_ENV, " /tmp/school "),
        ]);
        assert_eq!(cfg.log_filter, "timetabled=debug");
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/school")));
    }

    #[test]
    fn blank_values_fall_back() {
        let cfg = config_from(&[(LOG_ENV, "  "), (WORKSPACE_ENV, "")]);
        assert_eq!(cfg.log_filter, "info");
        assert!(cfg.workspace.is_none());
    }
}
