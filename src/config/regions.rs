// src/config/regions.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::region::{RegionSet, RegionSpec};

pub const ENV_REGIONS_PATH: &str = "REGIONS_CONFIG_PATH";
const DEFAULT_TOML: &str = "config/regions.toml";
const DEFAULT_JSON: &str = "config/regions.json";

/// Load the region table from an explicit path. Supports TOML or JSON formats.
pub fn load_regions_from(path: &Path) -> Result<RegionSet> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading regions from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_regions(&content, ext.as_str())
        .with_context(|| format!("parsing regions from {}", path.display()))
}

/// Load the region table using env var + fallbacks:
/// 1) $REGIONS_CONFIG_PATH
/// 2) config/regions.toml
/// 3) config/regions.json
/// 4) built-in reference table
pub fn load_regions_default() -> Result<RegionSet> {
    if let Ok(p) = std::env::var(ENV_REGIONS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_regions_from(&pb);
        } else {
            return Err(anyhow!("REGIONS_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_TOML);
    if toml_p.exists() {
        return load_regions_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_JSON);
    if json_p.exists() {
        return load_regions_from(&json_p);
    }
    tracing::info!("no regions config found, using reference table");
    Ok(RegionSet::reference())
}

#[derive(serde::Deserialize)]
struct RegionsFile {
    regions: Vec<RegionSpec>,
}

fn parse_regions(s: &str, hint_ext: &str) -> Result<RegionSet> {
    let specs = if hint_ext == "json" {
        parse_json(s)?
    } else {
        // TOML first, JSON as a second chance for extension-less files.
        match parse_toml(s) {
            Ok(v) => v,
            Err(toml_err) => parse_json(s).map_err(|_| toml_err)?,
        }
    };
    RegionSet::new(specs)
}

fn parse_toml(s: &str) -> Result<Vec<RegionSpec>> {
    let v: RegionsFile = toml::from_str(s)?;
    Ok(v.regions)
}

fn parse_json(s: &str) -> Result<Vec<RegionSpec>> {
    // Either {"regions": [...]} or a bare array.
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum AnyJson {
        Wrapped(RegionsFile),
        Bare(Vec<RegionSpec>),
    }
    let v: AnyJson = serde_json::from_str(s)?;
    Ok(match v {
        AnyJson::Wrapped(f) => f.regions,
        AnyJson::Bare(list) => list,
    })
}
