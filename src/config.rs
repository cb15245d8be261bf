use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub service: ServiceConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub aoi: PathBuf, // .geojson/.json or .shp
    #[serde(default = "default_aoi_name")]
    pub aoi_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub project: String,
    #[serde(default = "default_token_env")]
    pub access_token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Ground resolution used for point sampling, in meters.
pub const DEFAULT_SAMPLE_SCALE_M: f64 = 1000.0;

#[derive(Debug, Deserialize, Clone)]
pub struct SamplingConfig {
    #[serde(default = "default_scale")]
    pub scale_m: f64,
    #[serde(default = "default_max_pixels")]
    pub max_pixels: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    #[serde(default = "default_first_year")]
    pub first_year: i32,
    #[serde(default = "default_last_year")]
    pub last_year: i32,
    #[serde(default = "default_year")]
    pub default_year: i32,
    #[serde(default = "default_center")]
    pub center: [f64; 2], // [lat, lon]
    #[serde(default = "default_zoom")]
    pub zoom: u8,
}

fn default_aoi_name() -> String { "Area of interest".to_string() }
fn default_base_url() -> String { "https://earthengine.googleapis.com/v1".to_string() }
fn default_token_env() -> String { "EE_ACCESS_TOKEN".to_string() }
fn default_timeout_secs() -> u64 { 60 }
fn default_scale() -> f64 { DEFAULT_SAMPLE_SCALE_M }
fn default_max_pixels() -> f64 { 1e13 }
fn default_ttl_secs() -> u64 { 3600 }
fn default_static_dir() -> PathBuf { PathBuf::from("static") }
fn default_first_year() -> i32 { 2018 }
fn default_last_year() -> i32 { 2025 }
fn default_year() -> i32 { 2021 }
fn default_center() -> [f64; 2] { [23.8351, 90.2564] }
fn default_zoom() -> u8 { 10 }

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { scale_m: default_scale(), max_pixels: default_max_pixels() }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: default_ttl_secs() }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            first_year: default_first_year(),
            last_year: default_last_year(),
            default_year: default_year(),
            center: default_center(),
            zoom: default_zoom(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        if !(config.sampling.scale_m > 0.0) {
            anyhow::bail!("sampling.scale_m must be positive, got {}", config.sampling.scale_m);
        }
        if config.ui.first_year > config.ui.last_year {
            anyhow::bail!("ui.first_year is after ui.last_year");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [input]
        aoi = "data/aoi.geojson"

        [service]
        project = "demo"

        [server]
        port = 8080
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = AppConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.sampling.scale_m, DEFAULT_SAMPLE_SCALE_M);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.service.access_token_env, "EE_ACCESS_TOKEN");
        assert_eq!(config.ui.center, [23.8351, 90.2564]);
        assert_eq!(config.server.static_dir, PathBuf::from("static"));
    }

    #[test]
    fn rejects_non_positive_scale() {
        let content = format!("{}\n[sampling]\nscale_m = 0.0\n", MINIMAL);
        assert!(AppConfig::from_toml(&content).is_err());
    }

    #[test]
    fn loads_repository_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml");
        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ui.first_year, 2018);
    }
}
