mod atd_config;
mod atd_controllers;
mod atd_dashboard;
mod atd_gui;
mod atd_map;
mod atd_models;
mod atd_selection;
mod atd_views;

use anyhow::{Context, anyhow};
use atd_config::{Cli, Command, DashboardConfig};
use atd_controllers::{ATDControllers, DashboardSession};
use clap::Parser;
use log::info;

fn main() -> anyhow::Result<()> {
    // Environment first so clap can pick up ATD_* values from .env
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter())).init();

    // Set up panic hook for better error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n{}", "═".repeat(70));
        eprintln!("❌ APPLICATION PANIC");
        eprintln!("{}", "═".repeat(70));
        eprintln!("\nThe application encountered an unexpected error:");
        eprintln!("{}", panic_info);
        eprintln!("\n💡 Troubleshooting:");
        eprintln!("  • Please restart the application");
        eprintln!("  • Check that the transit feed is reachable");
        eprintln!("  • Report this issue if it persists");
        eprintln!("\n{}", "═".repeat(70));
    }));

    let config = DashboardConfig::from_cli(&cli).context("invalid dashboard configuration")?;
    info!("Feed {} in {}", config.feed_url, config.timezone);

    match cli.command.unwrap_or(Command::Menu) {
        Command::Gui => atd_gui::run_gui(config).map_err(|e| anyhow!("desktop dashboard failed: {e}"))?,
        Command::Menu => ATDControllers::run(DashboardSession::load(config)),
        command => ATDControllers::run_command(config, &command).context("command failed")?,
    }

    Ok(())
}
