//! First-run license key prompt.

use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;

use gravity_pm::{ConfigStore, GravityConfig};

/// Return `config` unchanged when it already carries a license key; otherwise
/// ask for one, persist it and return the updated config.
pub fn ensure_license_key(store: &ConfigStore, config: GravityConfig) -> Result<GravityConfig> {
    if config.license_key().is_some() {
        return Ok(config);
    }

    println!(
        "{}",
        style("Gravity requires a license key in order to take advantage of premium features.").yellow()
    );

    let key: String = Input::new()
        .with_prompt("License key")
        .validate_with(|input: &String| {
            if input.trim().is_empty() {
                Err("License key must not be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .context("A license key is required; add \"licenseKey\" to the config file or run interactively")?;

    let config = store
        .set_license_key(config, key.trim())
        .with_context(|| format!("Failed to save license key to {}", store.path().display()))?;

    log::info!("License key saved to {}", store.path().display());
    Ok(config)
}
