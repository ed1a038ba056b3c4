//! Tool trait.
//!
//! A tool is an opaque async function with a declared schema. Modeled as
//! a trait object the way this codebase's existing tool system is
//! structured, so a catalog can hold a heterogeneous `Vec<Arc<dyn Tool>>`.

use async_trait::async_trait;
use serde_json::Value;

use crate::schema::Schema;

/// A host-side tool implementation.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> &Schema;

    /// `None` unless the tool declares an explicit output schema.
    fn output_schema(&self) -> Option<&Schema> {
        None
    }

    /// Invoke the tool. `args` has already been validated against
    /// `input_schema` by the caller; a tool must not be invoked otherwise.
    async fn invoke(&self, args: Value) -> Result<Value, String>;
}

/// A tool collection element: either a bare tool, or a bare tool paired
/// with an explicit output schema supplied separately.
pub enum ToolSpec {
    Bare(std::sync::Arc<dyn Tool>),
    WithOutputSchema {
        tool: std::sync::Arc<dyn Tool>,
        output_schema: Schema,
    },
}

impl ToolSpec {
    pub fn bare(tool: impl Tool + 'static) -> Self {
        ToolSpec::Bare(std::sync::Arc::new(tool))
    }

    pub fn with_output_schema(tool: impl Tool + 'static, output_schema: Schema) -> Self {
        ToolSpec::WithOutputSchema { tool: std::sync::Arc::new(tool), output_schema }
    }
}

#[cfg(test)]
pub(crate) mod test_tools {
    use super::*;
    use crate::schema::ObjectField;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns `{weather: "sunny", city: <args.city>}` and counts
    /// invocations, for cache-hit and multi-call test scenarios.
    pub struct GetWeatherTool {
        pub calls: Arc<AtomicUsize>,
        schema: Schema,
    }

    impl GetWeatherTool {
        pub fn new() -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                schema: Schema::Object {
                    fields: vec![ObjectField::new("city", Schema::String)],
                },
            }
        }
    }

    #[async_trait]
    impl Tool for GetWeatherTool {
        fn name(&self) -> &str {
            "get_weather"
        }
        fn description(&self) -> &str {
            "Get the current weather for a city"
        }
        fn input_schema(&self) -> &Schema {
            &self.schema
        }
        async fn invoke(&self, args: Value) -> Result<Value, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let city = args["city"].as_str().unwrap_or_default().to_string();
            Ok(json!({"weather": "sunny", "city": city}))
        }
    }

    /// `{a, b, operation}` -> numeric result; counts invocations.
    pub struct CalculateTool {
        pub calls: Arc<AtomicUsize>,
        schema: Schema,
    }

    impl CalculateTool {
        pub fn new() -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                schema: Schema::Object {
                    fields: vec![
                        ObjectField::new("a", Schema::Number),
                        ObjectField::new("b", Schema::Number),
                        ObjectField::new("operation", Schema::Enum(vec!["add".into(), "sub".into()])),
                    ],
                },
            }
        }
    }

    #[async_trait]
    impl Tool for CalculateTool {
        fn name(&self) -> &str {
            "calculate"
        }
        fn description(&self) -> &str {
            "Perform a basic arithmetic operation"
        }
        fn input_schema(&self) -> &Schema {
            &self.schema
        }
        async fn invoke(&self, args: Value) -> Result<Value, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let a = args["a"].as_f64().unwrap_or_default();
            let b = args["b"].as_f64().unwrap_or_default();
            let result = match args["operation"].as_str() {
                Some("add") => a + b,
                Some("sub") => a - b,
                _ => return Err("unsupported operation".to_string()),
            };
            Ok(json!({"result": result}))
        }
    }

    /// Always fails; used to test tool-side error propagation.
    pub struct AlwaysFailsTool {
        schema: Schema,
    }

    impl AlwaysFailsTool {
        pub fn new() -> Self {
            Self { schema: Schema::Any }
        }
    }

    #[async_trait]
    impl Tool for AlwaysFailsTool {
        fn name(&self) -> &str {
            "always_fails"
        }
        fn description(&self) -> &str {
            "A tool that always raises an error"
        }
        fn input_schema(&self) -> &Schema {
            &self.schema
        }
        async fn invoke(&self, _args: Value) -> Result<Value, String> {
            Err("deliberate failure".to_string())
        }
    }
}
