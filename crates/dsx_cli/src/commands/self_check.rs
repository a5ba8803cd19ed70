//! Self-check command implementation.

use serde::Serialize;

/// Adapter compatibility report.
#[derive(Debug, Serialize)]
pub struct SelfCheckResult {
    /// Adapter contract version.
    pub adapter_version: u32,
    /// Whether an extension client could be derived.
    pub compatible: bool,
    /// Failure diagnostic, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the self-check command.
pub fn run(format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = dsx_core::self_check();
    let result = SelfCheckResult {
        adapter_version: dsx_core::ADAPTER_VERSION,
        compatible: outcome.is_ok(),
        error: outcome.as_ref().err().map(|e| e.to_string()),
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => {
            println!("Adapter version: {}", result.adapter_version);
            match &result.error {
                None => println!("Status: compatible"),
                Some(error) => println!("Status: incompatible ({})", error),
            }
        }
    }

    outcome.map_err(Into::into)
}
