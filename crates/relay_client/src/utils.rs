//! Utility functions and helpers

use crate::error::PluginError;
use serde_json::Value;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run one plugin callback, converting a panic into [`PluginError::Panicked`]
pub fn isolate<T, F>(f: F) -> Result<T, PluginError>
where
    F: FnOnce() -> Result<T, PluginError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic_info) => Err(PluginError::Panicked(panic_message(panic_info.as_ref()))),
    }
}

/// Extract a readable message from a panic payload
pub fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Positional argument `index`, or `null` when the caller left it out
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}

/// Collapse variadic log arguments: one argument is sent as is, several as an array
pub fn message_of(args: &[Value]) -> Value {
    match args {
        [] => Value::Null,
        [single] => single.clone(),
        many => Value::Array(many.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_isolate_passes_results_through() {
        assert_eq!(isolate(|| Ok(7)), Ok(7));
        assert_eq!(
            isolate::<(), _>(|| Err(PluginError::Failed("nope".to_string()))),
            Err(PluginError::Failed("nope".to_string()))
        );
    }

    #[test]
    fn test_isolate_catches_panics() {
        let result = isolate::<(), _>(|| panic!("hook exploded"));
        assert_eq!(result, Err(PluginError::Panicked("hook exploded".to_string())));

        let code = 42;
        let result = isolate::<(), _>(|| panic!("code {code}"));
        assert_eq!(result, Err(PluginError::Panicked("code 42".to_string())));
    }

    #[test]
    fn test_arg_defaults_to_null() {
        let args = vec![json!(1)];
        assert_eq!(arg(&args, 0), json!(1));
        assert_eq!(arg(&args, 3), Value::Null);
    }

    #[test]
    fn test_message_of() {
        assert_eq!(message_of(&[]), Value::Null);
        assert_eq!(message_of(&[json!("hi")]), json!("hi"));
        assert_eq!(message_of(&[json!("a"), json!(2)]), json!(["a", 2]));
    }
}
