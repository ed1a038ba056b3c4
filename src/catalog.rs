//! Catalog
//!
//! Normalizes a heterogeneous tool collection into an ordered, indexed set
//! of `ToolInfo` records. Order is preserved from construction so
//! generated prompt text and sandbox stubs are deterministic across runs
//! -- this codebase's existing tool registry sorts for display, but here
//! insertion order is the contract the Code Assembler relies on.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::CatalogError;
use crate::schema::Schema;
use crate::tool::{Tool, ToolSpec};

/// Normalized descriptor of one tool.
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Schema,
    pub output_schema: Option<Schema>,
    inner: Arc<dyn Tool>,
}

impl ToolInfo {
    /// Build a standalone `ToolInfo` outside of a `Catalog`, e.g. for a
    /// tool constructed around a client that is itself built from a
    /// catalog (`create_executor_tool`).
    pub fn from_bare(tool: Arc<dyn Tool>) -> Self {
        Self::from_spec(ToolSpec::Bare(tool))
    }

    fn from_spec(spec: ToolSpec) -> Self {
        match spec {
            ToolSpec::Bare(tool) => {
                let output_schema = tool.output_schema().cloned();
                Self {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    input_schema: tool.input_schema().clone(),
                    output_schema,
                    inner: tool,
                }
            }
            ToolSpec::WithOutputSchema { tool, output_schema } => Self {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema().clone(),
                output_schema: Some(output_schema),
                inner: tool,
            },
        }
    }

    pub async fn invoke(&self, args: Value) -> Result<Value, String> {
        self.inner.invoke(args).await
    }
}

pub struct Catalog {
    tools: Vec<ToolInfo>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(specs: Vec<ToolSpec>) -> Result<Self, CatalogError> {
        let mut tools = Vec::with_capacity(specs.len());
        let mut index = HashMap::with_capacity(specs.len());

        for spec in specs {
            let info = ToolInfo::from_spec(spec);
            if index.contains_key(&info.name) {
                return Err(CatalogError::DuplicateName(info.name));
            }
            index.insert(info.name.clone(), tools.len());
            tools.push(info);
        }

        Ok(Self { tools, index })
    }

    pub fn by_name(&self, name: &str) -> Option<&ToolInfo> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn list(&self) -> &[ToolInfo] {
        &self.tools
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    /// Prompt text listing every tool with its projected input/output
    /// types and description.
    pub fn catalog_text(&self) -> String {
        self.catalog_text_filtered(&self.names())
    }

    /// Same as `catalog_text`, restricted to a subset of tool names. Names
    /// not present in the catalog are silently ignored.
    pub fn catalog_text_filtered(&self, allowed: &[String]) -> String {
        if allowed.is_empty() {
            return "No tools available for this execution.\n".to_string();
        }

        let mut out = String::from("Available Tools:\n\n");
        for name in allowed {
            let Some(tool) = self.by_name(name) else { continue };
            let output = tool
                .output_schema
                .as_ref()
                .map(|s| s.project())
                .unwrap_or_else(|| "any".to_string());
            out.push_str(&format!(
                "- {}({}) -> Promise<{}>: {}\n",
                tool.name,
                tool.input_schema.project(),
                output,
                tool.description
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::test_tools::{AlwaysFailsTool, CalculateTool, GetWeatherTool};

    #[test]
    fn normalizes_and_indexes_tools() {
        let catalog = Catalog::new(vec![ToolSpec::bare(GetWeatherTool::new()), ToolSpec::bare(CalculateTool::new())]).unwrap();
        assert_eq!(catalog.list().len(), 2);
        assert!(catalog.by_name("get_weather").is_some());
        assert!(catalog.by_name("missing").is_none());
    }

    #[test]
    fn duplicate_names_fail_construction() {
        let err = Catalog::new(vec![ToolSpec::bare(GetWeatherTool::new()), ToolSpec::bare(GetWeatherTool::new())]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName(ref n) if n == "get_weather"));
    }

    #[test]
    fn preserves_insertion_order() {
        let catalog = Catalog::new(vec![
            ToolSpec::bare(CalculateTool::new()),
            ToolSpec::bare(GetWeatherTool::new()),
            ToolSpec::bare(AlwaysFailsTool::new()),
        ])
        .unwrap();
        assert_eq!(catalog.names(), vec!["calculate", "get_weather", "always_fails"]);
    }

    #[test]
    fn catalog_text_lists_name_types_and_description() {
        let catalog = Catalog::new(vec![ToolSpec::bare(GetWeatherTool::new())]).unwrap();
        let text = catalog.catalog_text();
        assert!(text.contains("get_weather"));
        assert!(text.contains("city: string"));
        assert!(text.contains("current weather"));
    }

    #[test]
    fn filtered_catalog_text_excludes_unlisted_tools() {
        let catalog = Catalog::new(vec![ToolSpec::bare(GetWeatherTool::new()), ToolSpec::bare(CalculateTool::new())]).unwrap();
        let text = catalog.catalog_text_filtered(&["get_weather".to_string()]);
        assert!(text.contains("get_weather"));
        assert!(!text.contains("calculate("));
    }

    #[tokio::test]
    async fn invoke_forwards_to_inner_tool() {
        let catalog = Catalog::new(vec![ToolSpec::bare(GetWeatherTool::new())]).unwrap();
        let tool = catalog.by_name("get_weather").unwrap();
        let result = tool.invoke(serde_json::json!({"city": "paris"})).await.unwrap();
        assert_eq!(result["city"], "paris");
    }
}
