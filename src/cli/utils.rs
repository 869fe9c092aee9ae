use serde_json::{json, Value};
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(object)) = (data, response.as_object_mut()) {
                object.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a key/value listing; JSON mode prints the value as-is
pub fn output_details(
    output_format: &OutputFormat,
    title: &str,
    details: &Value,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(details)?);
        }
        OutputFormat::Text => {
            println!("{}", title);
            if let Some(object) = details.as_object() {
                for (key, value) in object {
                    match value {
                        Value::String(s) => println!("  {}: {}", key, s),
                        Value::Null => println!("  {}: -", key),
                        other => println!("  {}: {}", key, other),
                    }
                }
            }
        }
    }
    Ok(())
}
