//! Tool registry

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::{ToolError, ToolExecutor, ToolModule};
use crate::api::Tool;
use crate::config::ToolModuleConfig;

/// Registered tools plus their enabled switches
pub struct ToolRegistry {
    tools: Vec<Arc<dyn ToolModule>>,
    enabled: HashMap<String, bool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            enabled: HashMap::new(),
        }
    }

    /// Register a tool, enabled
    pub fn register(&mut self, tool: Arc<dyn ToolModule>) {
        self.enabled.insert(tool.name().to_string(), true);
        self.tools.push(tool);
    }

    /// Enable or disable a registered tool; unknown names are ignored
    pub fn set_enabled(&mut self, name: &str, enabled: bool) {
        if let Some(flag) = self.enabled.get_mut(name) {
            *flag = enabled;
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.get(name).copied().unwrap_or(false)
    }

    pub fn list_tools(&self) -> &[Arc<dyn ToolModule>] {
        &self.tools
    }

    pub fn get_tool(&self, name: &str) -> Option<&Arc<dyn ToolModule>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Definitions of the enabled tools, in registration order
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools
            .iter()
            .filter(|t| self.is_enabled(t.name()))
            .map(|t| t.definition())
            .collect()
    }

    /// Apply `tools.modules` switches
    pub fn configure(&mut self, modules: &HashMap<String, ToolModuleConfig>) {
        for (name, module) in modules {
            if self.get_tool(name).is_some() {
                self.set_enabled(name, module.enabled);
            } else {
                tracing::warn!(tool = %name, "Ignoring configuration for unknown tool");
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, name: &str, arguments: &str) -> Result<String, ToolError> {
        let tool = self.get_tool(name).ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        if !self.is_enabled(name) {
            return Err(ToolError::Disabled(name.to_string()));
        }

        let parsed: Value = if arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(arguments).map_err(|e| ToolError::invalid(name, e.to_string()))?
        };

        tracing::debug!(tool = name, arguments = %arguments, "Executing tool");
        let started = std::time::Instant::now();
        let result = tool.execute(&parsed).await;
        match &result {
            Ok(text) => tracing::debug!(
                tool = name,
                result_len = text.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Tool finished"
            ),
            Err(e) => tracing::warn!(tool = name, error = %e, "Tool failed"),
        }
        result
    }
}
