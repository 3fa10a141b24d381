use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns built-in defaults if `init_config` was never called, so library
/// users do not have to initialise it first. No file is read on that path.
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get_or_init(|| ArcSwap::from_pointee(StaticConfig::default()))
        .load_full()
}

/// Initialize the global configuration
///
/// Loads configuration from `path` (default "config.toml"). A missing file
/// means defaults plus environment overrides; a file that cannot be parsed
/// is an error. Later calls keep the first configuration.
///
/// # Examples
/// ```no_run
/// use driplnk::config::init_config;
/// init_config(None).expect("config");
/// ```
pub fn init_config(path: Option<&str>) -> anyhow::Result<()> {
    if CONFIG.get().is_some() {
        return Ok(());
    }
    let config = StaticConfig::load(path)?;
    CONFIG.get_or_init(|| ArcSwap::from_pointee(config));
    Ok(())
}
