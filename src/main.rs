// src/main.rs

use anyhow::{Context, Result};
use log::info;

use rawview::config::CONFIG;
use rawview::platform::DisplayFactory;
use rawview::stream::Input;
use rawview::{ViewProcess, ViewRegistry, ViewSettings};

#[cfg(feature = "x11")]
fn display_backend(_settings: &mut ViewSettings) -> DisplayFactory {
    rawview::platform::x11::X11Display::open
}

/// Without a window system the view walks the whole input on its own and
/// logs each window.
#[cfg(not(feature = "x11"))]
fn display_backend(settings: &mut ViewSettings) -> DisplayFactory {
    settings.autoscroll = true;
    settings.stop_at_end = true;
    rawview::platform::HeadlessDisplay::open_unrecorded
}

fn main() -> Result<()> {
    let config = &*CONFIG;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_filter()))
        .format_timestamp_micros()
        .init();

    let input = match &config.input.path {
        Some(path) => Input::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?,
        None => Input::stdin().context("Failed to open standard input")?,
    };

    let mut settings = ViewSettings::from_config(config);
    let factory = display_backend(&mut settings);
    info!(
        "Starting {} view of {}",
        settings.kind,
        settings
            .input_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "standard input".to_string())
    );

    let mut registry = ViewRegistry::new();
    let mut view = ViewProcess::new(settings, input, factory)?;
    view.run(&mut registry)
}
