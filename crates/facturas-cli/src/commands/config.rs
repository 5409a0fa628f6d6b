//! Config command - print the effective configuration.

use facturas::sanitize::redact_url;
use facturas::ClientConfig;

pub fn run(config: &ClientConfig) -> anyhow::Result<()> {
    let mut shown = config.clone();
    shown.api_url = redact_url(&shown.api_url);
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}
