//! Config command

use anyhow::Result;

use super::Context;
use crate::ui;

/// Print the effective configuration
pub fn show(ctx: &Context) -> Result<()> {
    ui::header("Configuration");
    ui::key_value("Storage", &ctx.store_root().display().to_string());
    if ctx.config_path.exists() {
        ui::key_value("File", &ctx.config_path.display().to_string());
    } else {
        ui::warning("No config file, using defaults");
    }
    ui::separator();
    ui::json(&ctx.config)
}
