//! Anonymous aggregate telemetry
//!
//! Counts tool invocations and durations per tool name. Every method is a
//! no-op when disabled; the outbound reporting sink is an external
//! collaborator fed from `snapshot()`, never called from here.

use std::time::Duration;

use dashmap::DashMap;
use serde_json::{Value, json};

#[derive(Debug, Default, Clone)]
struct ToolStats {
    calls: u64,
    errors: u64,
    total_micros: u64,
}

#[derive(Debug)]
pub struct Analytics {
    enabled: bool,
    tools: DashMap<String, ToolStats>,
}

impl Analytics {
    /// The `disabled` flag comes straight from the CLI.
    pub fn new(disabled: bool) -> Self {
        Analytics {
            enabled: !disabled,
            tools: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_tool(&self, name: &str, elapsed: Duration, ok: bool) {
        if !self.enabled {
            return;
        }
        let mut stats = self.tools.entry(name.to_string()).or_default();
        stats.calls += 1;
        if !ok {
            stats.errors += 1;
        }
        stats.total_micros += elapsed.as_micros() as u64;
    }

    /// Aggregate counters, suitable for an external reporter.
    pub fn snapshot(&self) -> Value {
        let mut tools = serde_json::Map::new();
        let mut entries: Vec<(String, ToolStats)> = self
            .tools
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, stats) in entries {
            tools.insert(
                name,
                json!({
                    "calls": stats.calls,
                    "errors": stats.errors,
                    "total_micros": stats.total_micros,
                }),
            );
        }
        json!({ "enabled": self.enabled, "tools": Value::Object(tools) })
    }
}
