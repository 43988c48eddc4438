//! CLI smoke entry point.
//!
//! # Responsibility
//! - Start the state services from environment configuration.
//! - Print a deterministic one-line-per-service summary.

use notestate_core::{start, AppServices, CoreConfig, ServiceRegistry, StartupError};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("notestate_core ping={}", notestate_core::ping());
    println!("notestate_core version={}", notestate_core::core_version());

    let config = CoreConfig::from_env();
    match start(&config).and_then(|services| print_summary(&services)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("notestate startup failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_summary(services: &ServiceRegistry) -> Result<(), StartupError> {
    println!("services={}", services.service_names().join(","));

    let settings = services.settings()?;
    let settings = settings.borrow();
    println!(
        "settings ui_mode={} keep_tabs={} debug_level={}",
        settings.ui_mode().as_str(),
        settings.keep_tabs(),
        settings.debug_level()
    );

    let workspace = services.workspace()?;
    let workspace = workspace.borrow();
    println!(
        "workspace tabs={} active_tab={}",
        workspace.tabs().len(),
        workspace.active_tab_id().unwrap_or("-")
    );

    println!("favorites count={}", services.favorites()?.borrow().get_favorites().len());
    println!(
        "collapsible registered={}",
        services.collapsible()?.borrow().get_registered_ids().len()
    );

    let sidebar = services.sidebar()?;
    let sidebar = sidebar.borrow();
    match sidebar.width() {
        Some(width) => println!("sidebar open={} width={width}", sidebar.is_open()),
        None => println!("sidebar open={} width=-", sidebar.is_open()),
    }
    Ok(())
}
