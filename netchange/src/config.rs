//! Process-level bootstrap configuration, read once at startup.

/// Env-var-sourced configuration (spec's Non-goals exclude a northbound API
/// or CLI, so there is no user-facing config surface beyond this).
pub struct Config {
    pub node_id: String,
    pub reconcile_workers: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            node_id: std::env::var("NODE_ID").unwrap_or_else(|_| "node-1".to_string()),
            reconcile_workers: std::env::var("RECONCILE_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
        }
    }
}
