//! # HM Device Schema
//!
//! Loads the device description directories named in the configuration and
//! prints a JSON summary of every loaded description.
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- config/default.toml
//! ```
//!
//! Expected output:
//! ```text
//! INFO hm_device_schema: HM Device Schema v0.1.0 starting...
//! INFO hm_device_schema::pool: Loaded 312 homematic_bidcos device descriptions from /etc/homegear/devices/0
//! ```

use anyhow::{Context, Result};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use hm_device_schema::config::{Config, LoggingConfig};
use hm_device_schema::pool::{load_families, DescriptionPool};
use hm_device_schema::DeviceFamily;

/// Used when no configuration path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&path).with_context(|| format!("could not load configuration {}", path))?;

    // Keep the guard alive so the file writer flushes on exit
    let _guard = init_logging(&config.logging)?;

    info!("HM Device Schema v{} starting...", env!("CARGO_PKG_VERSION"));

    let pools = load_families(&config).await?;
    println!("{}", serde_json::to_string_pretty(&summarize(&pools))?);

    Ok(())
}

/// Set up stdout logging, plus a daily rolling file when a directory is configured
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level: tracing::Level = logging.level.parse()?;
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::io::stdout.and(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}

/// One JSON object per family listing its descriptions
fn summarize(pools: &BTreeMap<DeviceFamily, DescriptionPool>) -> serde_json::Value {
    let families: Vec<_> = pools
        .iter()
        .map(|(family, pool)| {
            let descriptions: Vec<_> = pool
                .snapshot()
                .iter()
                .map(|desc| {
                    json!({
                        "types": desc.supported_types.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
                        "version": desc.version,
                        "channels": desc.channels.len(),
                        "frames": desc.frame_count(),
                        "aes": desc.supports_aes,
                        "team": desc.team.is_some(),
                    })
                })
                .collect();
            json!({ "family": family.to_string(), "descriptions": descriptions })
        })
        .collect();
    json!({ "families": families })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hm_device_schema::loader;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }

    #[test]
    fn test_summary() {
        let xml = r#"
            <device version="4" supports_aes="true">
                <supported_types><type id="HM-Sec-SC"><parameter index="10.0" size="2.0" const_value="0x002F"/></type></supported_types>
                <channels><channel index="1" type="SHUTTER_CONTACT"/></channels>
                <frames><frame id="EVENT" direction="from_device" event="true" type="0x41"/></frames>
            </device>"#;
        let pool = DescriptionPool::new(DeviceFamily::HomeMaticBidCos);
        pool.insert(loader::load_str(xml, DeviceFamily::HomeMaticBidCos).unwrap().value);
        let pools = BTreeMap::from([(DeviceFamily::HomeMaticBidCos, pool)]);

        let summary = summarize(&pools);
        let family = &summary["families"][0];
        assert_eq!(family["family"], "homematic_bidcos");
        let desc = &family["descriptions"][0];
        assert_eq!(desc["types"][0], "HM-Sec-SC");
        assert_eq!(desc["version"], 4);
        assert_eq!(desc["channels"], 2);
        assert_eq!(desc["frames"], 1);
        assert_eq!(desc["aes"], true);
        assert_eq!(desc["team"], false);
    }
}
