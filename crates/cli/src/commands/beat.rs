//! Heartbeat CLI command

use anyhow::Result;

use crate::client::{ApiClient, HeartbeatRequest, IngestResponse};
use crate::output::{print_json, print_success, OutputFormat};

const HEARTBEAT_PATH: &str = "/heartbeats";

/// Post one heartbeat to the agent
pub async fn send_beat(
    client: &ApiClient,
    kind: &str,
    actor: &str,
    action: &str,
    format: OutputFormat,
) -> Result<()> {
    let request = HeartbeatRequest {
        kind: kind.to_string(),
        actor: actor.to_string(),
        action: action.to_string(),
    };
    let reply: IngestResponse = client.post(HEARTBEAT_PATH, &request).await?;

    match format {
        OutputFormat::Json => print_json(&reply)?,
        OutputFormat::Table => {
            print_success(&format!("Heartbeat {} {} {} accepted", kind, actor, action))
        }
    }
    Ok(())
}
