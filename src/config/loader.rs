use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::HooksFileConfig;

/// 按候选路径加载 Hook 配置，目录下的 `*.toml` 按文件名顺序合并
pub struct HooksConfigLoader {
    candidate_paths: Vec<PathBuf>,
}

impl Default for HooksConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HooksConfigLoader {
    pub fn new() -> Self {
        Self {
            candidate_paths: vec![
                PathBuf::from("config/mqtt-hooks.toml"),
                PathBuf::from("config/mqtt-hooks.d"),
            ],
        }
    }

    /// 仅使用给定路径
    pub fn with_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            candidate_paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_candidate<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.candidate_paths.push(path.into());
        self
    }

    /// 返回第一个存在的候选路径的配置；都不存在时返回默认配置
    pub fn load(&self) -> Result<HooksFileConfig, ConfigError> {
        for path in &self.candidate_paths {
            if path.is_dir() {
                return self.load_from_directory(path);
            } else if path.is_file() {
                return self.load_from_file(path);
            }
        }
        tracing::debug!(candidates = ?self.candidate_paths, "no hook config found, use defaults");
        Ok(HooksFileConfig::default())
    }

    fn load_from_file(&self, path: &Path) -> Result<HooksFileConfig, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| {
            ConfigError::Load(format!("path={}, err={err}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|err| ConfigError::Load(format!("path={}, err={err}", path.display())))
    }

    fn load_from_directory(&self, dir: &Path) -> Result<HooksFileConfig, ConfigError> {
        let mut entries = fs::read_dir(dir)
            .map_err(|err| ConfigError::Load(format!("path={}, err={err}", dir.display())))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|ext| ext == "toml").unwrap_or(false))
            .collect::<Vec<_>>();
        entries.sort();

        let mut merged = HooksFileConfig::default();
        for path in entries {
            merged.merge(self.load_from_file(&path)?);
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::adapters::EventCategory;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mqtt-hooks-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_paths_yield_defaults() {
        let loader = HooksConfigLoader::with_paths(["/nonexistent/mqtt-hooks.toml"]);
        let config = loader.load().unwrap();
        assert!(config.http_auth.is_none());
    }

    #[test]
    fn test_load_single_file() {
        let dir = scratch_dir("file");
        let path = dir.join("hooks.toml");
        fs::write(
            &path,
            r#"
            [http_auth]
            connect_endpoint = "http://auth.local/connect"
            acl_endpoint = "http://auth.local/acl"
            "#,
        )
        .unwrap();

        let config = HooksConfigLoader::with_paths([&path]).load().unwrap();
        assert_eq!(config.http_auth.unwrap().acl_endpoint, "http://auth.local/acl");
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_directory_merge_in_name_order() {
        let dir = scratch_dir("dir");
        fs::write(
            dir.join("10-fanout.toml"),
            r#"
            [event_fanout]
            disallow_list = ["monitor"]
            [event_fanout.destinations]
            connect = "conn-a"
            "#,
        )
        .unwrap();
        fs::write(
            dir.join("20-fanout.toml"),
            r#"
            [event_fanout]
            disallow_list = ["monitor", "probe"]
            [event_fanout.destinations]
            connect = "conn-b"
            published = "pub"
            "#,
        )
        .unwrap();
        fs::write(dir.join("ignored.txt"), "not toml").unwrap();

        let config = HooksConfigLoader::with_paths([&dir]).load().unwrap();
        let fanout = config.event_fanout.unwrap();
        assert_eq!(fanout.destinations[&EventCategory::Connect], "conn-b");
        assert_eq!(fanout.destinations[&EventCategory::Published], "pub");
        assert_eq!(fanout.disallow_list, vec!["monitor".to_string(), "probe".to_string()]);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_batch_settings_kept_when_later_file_omits_them() {
        let dir = scratch_dir("batch");
        fs::write(
            dir.join("10-batch.toml"),
            r#"
            [event_fanout.batch]
            count_threshold = 50
            "#,
        )
        .unwrap();
        fs::write(
            dir.join("20-denylist.toml"),
            r#"
            [event_fanout]
            disallow_list = ["x"]
            "#,
        )
        .unwrap();

        let config = HooksConfigLoader::with_paths([&dir]).load().unwrap();
        let fanout = config.event_fanout.unwrap();
        assert_eq!(fanout.batch.unwrap().count_threshold, 50);
        assert_eq!(fanout.disallow_list, vec!["x".to_string()]);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_invalid_file_is_load_error() {
        let dir = scratch_dir("invalid");
        let path = dir.join("broken.toml");
        fs::write(&path, "[http_auth\n").unwrap();

        let err = HooksConfigLoader::with_paths([&path]).load().unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
        fs::remove_dir_all(dir).unwrap();
    }
}
