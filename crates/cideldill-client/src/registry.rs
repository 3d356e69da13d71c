use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use cideldill_types::ExceptionInfo;

/// A function the `replace` resume action can redirect a call to, keyed by
/// the name a debugger operator would type into the UI.
pub type ReplacementFn = Box<dyn Fn(&[Value], &HashMap<String, Value>) -> Result<Value, ExceptionInfo> + Send + Sync>;

#[derive(Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, ReplacementFn>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, f: ReplacementFn) {
        self.functions.write().expect("function registry lock poisoned").insert(name.into(), f);
    }

    pub fn call(&self, name: &str, args: &[Value], kwargs: &HashMap<String, Value>) -> Result<Value, ExceptionInfo> {
        let functions = self.functions.read().expect("function registry lock poisoned");
        match functions.get(name) {
            Some(f) => f(args, kwargs),
            None => Err(ExceptionInfo {
                type_fqn: "LookupError".to_string(),
                message: format!("no function named {name:?} registered for replace"),
                traceback: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_function_is_reachable_by_name() {
        let registry = FunctionRegistry::new();
        registry.register("double", Box::new(|args, _kwargs| Ok(Value::from(args[0].as_i64().unwrap_or(0) * 2))));
        let result = registry.call("double", &[Value::from(21)], &HashMap::new()).unwrap();
        assert_eq!(result, Value::from(42));
    }

    #[test]
    fn unregistered_name_reports_lookup_error() {
        let registry = FunctionRegistry::new();
        let err = registry.call("missing", &[], &HashMap::new()).unwrap_err();
        assert_eq!(err.type_fqn, "LookupError");
    }
}
