//! Single-line JSON events on stderr.

use serde_json::{json, Value};

pub fn log_info(component: &str, event: &str, details: Value) {
    emit(component, "info", event, details);
}

pub fn log_warn(component: &str, event: &str, details: Value) {
    emit(component, "warn", event, details);
}

pub fn log_error(component: &str, event: &str, details: Value) {
    emit(component, "error", event, details);
}

fn emit(component: &str, level: &str, event: &str, details: Value) {
    eprintln!(
        "{}",
        json!({
            "component": component,
            "level": level,
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}
