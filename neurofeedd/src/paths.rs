//! Cross-platform application paths

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self, String> {
        let base = dirs::config_dir().ok_or("Could not determine config directory")?;
        Ok(Self::with_base(base))
    }

    fn with_base(base: PathBuf) -> Self {
        Self {
            config_dir: base.join("neurofeed"),
        }
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_lives_under_app_dir() {
        let paths = AppPaths::with_base(PathBuf::from("/tmp/cfg"));
        assert_eq!(paths.config_dir(), &PathBuf::from("/tmp/cfg/neurofeed"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/tmp/cfg/neurofeed/config.json")
        );
    }
}
