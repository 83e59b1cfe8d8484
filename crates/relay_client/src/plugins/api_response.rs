//! Reports completed API calls

use crate::client::Client;
use crate::context::PluginContext;
use crate::error::PluginError;
use crate::plugin::{Capability, Plugin};
use crate::utils::arg;
use serde_json::{json, Value};

/// Command type emitted for a completed API call
pub const API_RESPONSE: &str = "api.response";

/// Capability name
pub const API_RESPONSE_CAPABILITY: &str = "apiResponse";

/// Adds the `apiResponse(request, response, duration)` capability.
///
/// Each call sends exactly one `api.response` command whose payload is
/// `{request, response, duration}`, with the arguments passed through
/// unchanged. Missing arguments are sent as `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiResponsePlugin;

impl ApiResponsePlugin {
    fn report(context: &PluginContext, args: &[Value]) -> Result<(), PluginError> {
        let payload = json!({
            "request": arg(args, 0),
            "response": arg(args, 1),
            "duration": arg(args, 2),
        });
        context.send(API_RESPONSE, payload)?;
        Ok(())
    }
}

impl Plugin for ApiResponsePlugin {
    fn name(&self) -> &str {
        "api-response"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::new(API_RESPONSE_CAPABILITY, Self::report)]
    }
}

/// Typed access to the `apiResponse` capability
pub trait ApiResponseExt {
    /// Report a completed API call that took `duration_ms` milliseconds
    fn api_response(&self, request: Value, response: Value, duration_ms: u64) -> Result<(), PluginError>;
}

impl ApiResponseExt for Client {
    fn api_response(&self, request: Value, response: Value, duration_ms: u64) -> Result<(), PluginError> {
        self.invoke(API_RESPONSE_CAPABILITY, vec![request, response, json!(duration_ms)])
    }
}
