//! Device registration commands

use anyhow::Result;
use pushkit_lib::config::EchoConfig;
use pushkit_lib::echo::EchoClient;

use super::Context;
use crate::ui;

fn client(ctx: &Context, project_id: Option<String>) -> Result<EchoClient> {
    let mut config: EchoConfig = ctx.config.echo.clone();
    if let Some(project_id) = project_id {
        config.project_id = project_id;
    }
    Ok(EchoClient::new(config)?)
}

/// Register a device token
pub async fn register(
    ctx: &Context,
    client_id: &str,
    token: &str,
    project_id: Option<String>,
) -> Result<()> {
    let client = client(ctx, project_id)?;

    ui::header("Register Device");
    ui::key_value("Server", &client.config().base_url);
    ui::key_value("Project", &client.config().project_id);
    ui::key_value("Client", client_id);

    let spinner = ui::spinner("Registering...");
    let result = client.register(client_id, token).await;
    spinner.finish_and_clear();
    result?;

    ui::success("Device registered");
    Ok(())
}

/// Remove a device registration
pub async fn unregister(
    ctx: &Context,
    client_id: &str,
    project_id: Option<String>,
    yes: bool,
) -> Result<()> {
    let client = client(ctx, project_id)?;

    if !yes && !ui::confirm(&format!("Unregister client {}?", client_id), false)? {
        ui::info("Cancelled");
        return Ok(());
    }

    let spinner = ui::spinner("Unregistering...");
    let result = client.unregister(client_id).await;
    spinner.finish_and_clear();
    result?;

    ui::success("Device unregistered");
    Ok(())
}
