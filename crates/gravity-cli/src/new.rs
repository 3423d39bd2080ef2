//! `gravity new <application name>` - scaffold a new application.

use std::io::IsTerminal;

use anyhow::Result;
use clap::Args;
use console::style;

use gravity_pm::{
    GravityConfig, GravityError, HttpClientConfig, InstallRequest, Pipeline, PipelineEvent,
    RegistryError,
};

use crate::progress::PipelineProgress;

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Name of the application folder to create
    #[arg(value_name = "APPLICATION NAME")]
    pub name: String,

    /// Distribution tag to install
    #[arg(long, default_value = "latest")]
    pub tag: String,
}

pub async fn execute(args: NewArgs, config: GravityConfig) -> Result<i32> {
    let cwd = std::env::current_dir()?;

    let request = match InstallRequest::new(&args.name, &cwd) {
        Ok(request) => request,
        Err(e) => return Ok(report(&e)),
    };

    let pipeline = match Pipeline::from_config(&config, HttpClientConfig::default()) {
        Ok(pipeline) => pipeline.with_tag(&args.tag),
        Err(e) => return Ok(report(&e)),
    };

    log::info!(
        "Installing {} from {} into {}",
        pipeline.package(),
        pipeline.registry_url(),
        request.target_dir().display()
    );

    let progress = PipelineProgress::new(std::io::stderr().is_terminal());
    let result = pipeline
        .run_with_progress(request, |event| {
            if let PipelineEvent::Resolved { version, .. } = event {
                progress.println(format!(
                    "{} {}",
                    style("Generating app with Gravity").green(),
                    style(version).yellow()
                ));
            }
            progress.handle(event);
        })
        .await;
    progress.finish();

    match result {
        Ok(installed) => {
            log::debug!("Installed {} into {}", installed.version, installed.target_dir.display());
            println!(
                "{}",
                style("Gravity has bootstrapped your application for you! Now go make something great.").green()
            );
            Ok(0)
        }
        Err(e) => Ok(report(&e)),
    }
}

/// Print the user-facing message for a failed run and return its exit code.
fn report(err: &GravityError) -> i32 {
    let Some(headline) = headline(err) else {
        // Status and target errors already read as a complete sentence
        match err {
            GravityError::Registry(RegistryError::Status { .. }) => eprintln!("{}", style(err).red()),
            _ => eprintln!("{} {}", style("Error:").red(), err),
        }
        return err.exit_code();
    };

    eprintln!("{}", style(headline).red());
    eprintln!("  Caused by: {}", err);
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }

    if matches!(err, GravityError::Extraction(_)) {
        eprintln!(
            "{}",
            style("The application folder was left in place so you can inspect it.").yellow()
        );
    }

    err.exit_code()
}

/// Stage-specific first line for failures that carry an underlying cause
fn headline(err: &GravityError) -> Option<&'static str> {
    match err {
        GravityError::Registry(RegistryError::InvalidPayload(_) | RegistryError::MissingKey(_)) => {
            Some("Response payload from server was invalid.")
        }
        GravityError::Registry(RegistryError::Transport(_)) => Some("Could not reach the registry"),
        GravityError::Download(_) => Some("Gravity download failed"),
        GravityError::Extraction(_) => Some("Error while extracting framework tarball"),
        _ => None,
    }
}
