use std::sync::Arc;

use rhai::{Array, Dynamic, Engine};

fn dynamic_to_json(value: &Dynamic) -> serde_json::Value {
    if value.is_unit() {
        serde_json::Value::Null
    } else if let Some(b) = value.clone().try_cast::<bool>() {
        serde_json::Value::Bool(b)
    } else if let Some(i) = value.clone().try_cast::<i64>() {
        serde_json::Value::from(i)
    } else if let Some(f) = value.clone().try_cast::<f64>() {
        serde_json::json!(f)
    } else {
        serde_json::Value::String(value.to_string())
    }
}

/// `echo.print(args...)` / `echo.printJSON(args...)`, both writing
/// JSON-encoded lines to the session's stdout. rhai has no native varargs,
/// so scripts pass an array literal: `print([a, b, c])`.
pub fn register(engine: &mut Engine, stdout: Arc<dyn Fn(String) + Send + Sync>) {
    let print_out = stdout.clone();
    engine.register_fn("print", move |args: Array| {
        let line = args
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        print_out(serde_json::json!({ "line": line }).to_string());
    });

    let json_out = stdout;
    engine.register_fn("printJSON", move |args: Array| {
        let values: Vec<serde_json::Value> = args.iter().map(dynamic_to_json).collect();
        json_out(serde_json::to_string(&values).unwrap_or_default());
    });
}
