// File: src/paths.rs
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

// Allow injecting a base path (from Android Context)
static ANDROID_DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

pub const TEST_DIR_ENV: &str = "BLASSA_TEST_DIR";

pub struct AppPaths;

impl AppPaths {
    /// Initialize the Android data directory. Must be called once at startup.
    pub fn init_android_path(path: String) {
        let _ = ANDROID_DATA_DIR.set(PathBuf::from(path));
    }

    fn get_proj_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("tn", "blassa", "blassa")
    }

    fn ensure_exists(path: PathBuf) -> Result<PathBuf> {
        if !path.exists() {
            fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(path)
    }

    fn resolve_config_dir() -> Option<PathBuf> {
        // 1. Android Override
        if let Some(android_root) = ANDROID_DATA_DIR.get() {
            return Some(android_root.join("config"));
        }

        // 2. Test Override
        if let Ok(test_dir) = env::var(TEST_DIR_ENV) {
            return Some(PathBuf::from(test_dir).join("config"));
        }

        // 3. Standard OS location
        Self::get_proj_dirs().map(|proj| proj.config_dir().to_path_buf())
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let path = Self::resolve_config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Self::ensure_exists(path)
    }

    pub fn get_config_file_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_under_test_dir() {
        let dir = env::temp_dir().join(format!("blassa-paths-{}", std::process::id()));
        // Only this test touches the override
        unsafe { env::set_var(TEST_DIR_ENV, &dir) };

        let path = AppPaths::get_config_file_path().unwrap();
        assert_eq!(path, dir.join("config").join("config.toml"));
        assert!(dir.join("config").is_dir());

        unsafe { env::remove_var(TEST_DIR_ENV) };
        let _ = fs::remove_dir_all(&dir);
    }
}
