use std::path::PathBuf;

use anyhow::{anyhow, Result};

/// Fixed tunables of the demo.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoConfig {
    pub title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub asset_root: PathBuf,
    pub shadow_map_size: u32,
    /// World units per frame while a move key is held.
    pub camera_speed: f32,
    /// Degrees of look rotation per cursor pixel.
    pub mouse_sensitivity: f32,
    /// Degrees per frame while a rotate key is held.
    pub rotation_step: f32,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "shadow-scene".to_string(),
            window_width: 1024,
            window_height: 768,
            asset_root: PathBuf::from("."),
            shadow_map_size: 2048,
            camera_speed: 0.05,
            mouse_sensitivity: 0.1,
            rotation_step: 1.0,
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 50.0,
        }
    }
}

/// Command line surface: `shadow-scene [ASSET_DIR] [--summary-only]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub asset_root: Option<PathBuf>,
    pub summary_only: bool,
}

pub const USAGE: &str = "Usage: shadow-scene [ASSET_DIR] [--summary-only]";

impl CliOptions {
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut asset_root = None;
        let mut summary_only = false;
        for arg in args {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "-h" | "--help" => return Err(anyhow!(USAGE)),
                other if other.starts_with("--") => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --summary-only\n{USAGE}"
                    ));
                }
                other => {
                    if asset_root.replace(PathBuf::from(other)).is_some() {
                        return Err(anyhow!("Only one asset directory may be given\n{USAGE}"));
                    }
                }
            }
        }
        Ok(Self {
            asset_root,
            summary_only,
        })
    }

    pub fn apply(&self, config: &mut DemoConfig) {
        if let Some(root) = &self.asset_root {
            config.asset_root = root.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn no_arguments_uses_defaults() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.asset_root, None);
        assert!(!options.summary_only);

        let mut config = DemoConfig::default();
        options.apply(&mut config);
        assert_eq!(config.asset_root, PathBuf::from("."));
    }

    #[test]
    fn asset_dir_and_flag_in_any_order() {
        let options = parse(&["--summary-only", "data"]).unwrap();
        assert!(options.summary_only);
        let mut config = DemoConfig::default();
        options.apply(&mut config);
        assert_eq!(config.asset_root, PathBuf::from("data"));
    }

    #[test]
    fn rejects_unknown_flags_and_extra_paths() {
        assert!(parse(&["--fullscreen"]).is_err());
        assert!(parse(&["a", "b"]).is_err());
    }
}
