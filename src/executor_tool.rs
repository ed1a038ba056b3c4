//! `ptc_executor`: exposes `Client::execute` as a named tool, so an agent
//! framework that already speaks "tool with a schema and an invoke
//! function" can hand the orchestrator to an agent the same way it would
//! hand it any other tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::catalog::ToolInfo;
use crate::orchestrator::Client;
use crate::schema::{ObjectField, Schema};
use crate::tool::{Tool, ToolSpec};

struct ExecutorTool {
    client: Arc<Client>,
    schema: Schema,
}

#[async_trait]
impl Tool for ExecutorTool {
    fn name(&self) -> &str {
        "ptc_executor"
    }

    fn description(&self) -> &str {
        "Execute a single program in an isolated sandbox, with access to the tools listed in this catalog via async stub functions. Returns the program's final value or a descriptive error."
    }

    fn input_schema(&self) -> &Schema {
        &self.schema
    }

    async fn invoke(&self, args: Value) -> Result<Value, String> {
        let code = args
            .get("code")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| "\"code\" must be a non-empty string".to_string())?;

        match self.client.execute(code).await {
            crate::orchestrator::ExecutionResult::Success(result) => Ok(json!({ "success": true, "result": result })),
            crate::orchestrator::ExecutionResult::Failure(error) => Ok(json!({ "success": false, "error": error })),
        }
    }
}

/// Build the `ptc_executor` `ToolInfo` around a shared `Client`.
pub fn create_executor_tool(client: Arc<Client>) -> ToolInfo {
    let schema = Schema::Object { fields: vec![ObjectField::new("code", Schema::String)] };
    let tool = ExecutorTool { client, schema };
    ToolInfo::from_bare(Arc::new(tool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::sandbox::local::{LocalProcessProvider, Runner};
    use crate::sandbox::SandboxProvider;

    #[tokio::test]
    async fn rejects_empty_code() {
        let provider: Arc<dyn SandboxProvider> =
            Arc::new(LocalProcessProvider::new(Runner::new("true", vec![], "ts")));
        let client = Arc::new(Client::new(ClientConfig::default(), vec![ToolSpec::bare(crate::tool::test_tools::GetWeatherTool::new())], provider).unwrap());
        let tool = create_executor_tool(client);
        let err = tool.invoke(json!({"code": "   "})).await.unwrap_err();
        assert!(err.contains("non-empty"));
    }

    #[tokio::test]
    async fn executes_and_returns_success_envelope() {
        let script = r#"printf '__PTC_FINAL__{"n":1}\n'"#;
        let provider: Arc<dyn SandboxProvider> =
            Arc::new(LocalProcessProvider::new(Runner::new("sh", vec!["-c".to_string(), script.to_string()], "ts")));
        let client = Arc::new(Client::new(ClientConfig::default(), vec![], provider).unwrap());
        let tool = create_executor_tool(client);
        let result = tool.invoke(json!({"code": "return {n: 1};"})).await.unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["result"]["n"], 1);
    }
}
