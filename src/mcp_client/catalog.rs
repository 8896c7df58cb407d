//! Tool catalog — snapshot of the tools discovered by the last listing.
//!
//! The catalog is replaced wholesale on every successful `tools/list` and is
//! never merged, so lookups always reflect exactly one server response.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::types::Tool;

// ─── ToolCatalog ─────────────────────────────────────────────────────────────

/// In-memory snapshot of remote tools, in server order.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<Tool>,
    /// Names present in `tools`.
    names: HashSet<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl ToolCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot. Duplicate names keep their first occurrence.
    ///
    /// Returns the number of tools in the new snapshot.
    pub fn replace(&mut self, tools: Vec<Tool>) -> usize {
        let mut deduped = Vec::with_capacity(tools.len());
        let mut names = HashSet::with_capacity(tools.len());

        for tool in tools {
            if !names.insert(tool.name.clone()) {
                tracing::warn!(tool = %tool.name, "duplicate tool name in listing, keeping first");
                continue;
            }
            deduped.push(tool);
        }

        self.tools = deduped;
        self.names = names;
        self.refreshed_at = Some(Utc::now());
        self.tools.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// All tools, in the order the server listed them.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// When the snapshot was last replaced (`None` if never listed).
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
