use crate::constants::{config, polling};
use crate::executor::PollSettings;
use crate::sql::validate_identifier;
use crate::{BrError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 应用配置结构
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub backup: BackupConfig,
    /// 仓库创建参数，只有 init 命令使用
    #[serde(default)]
    pub repository: Option<RepositoryConfig>,
}

/// 集群连接配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// 备份的目标数据库
    pub database: String,
    #[serde(default)]
    pub tls: TlsConfig,
}

/// TLS 配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub ca_cert: Option<String>,
    #[serde(default = "default_true")]
    pub verify_server_cert: bool,
}

/// 备份相关配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackupConfig {
    /// 仓库名
    pub repository: String,
    /// `backup auto` 以及未指定分组时使用的表
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    /// 提交任务前是否检查 FE/BE 状态
    #[serde(default = "default_true")]
    pub health_check: bool,
}

/// 对象存储仓库配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RepositoryConfig {
    #[serde(rename = "type", default = "default_repository_type")]
    pub repo_type: String,
    pub endpoint: String,
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
    pub access_key: String,
    pub secret_key: String,
    #[serde(default = "default_true")]
    pub force_https: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ca_cert: None,
            verify_server_cert: true,
        }
    }
}

fn default_port() -> u16 {
    config::DEFAULT_QUERY_PORT
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    polling::DEFAULT_POLL_INTERVAL_MS
}

fn default_max_polls() -> u32 {
    polling::MAX_POLLS
}

fn default_repository_type() -> String {
    "s3".to_string()
}

impl AppConfig {
    /// 查找并加载配置文件
    /// 显式指定的路径优先，否则按优先级查找：starrocks-br.yaml -> starrocks-br.yml -> config.yaml
    pub fn find_and_load_config(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(BrError::configuration(format!(
                    "配置文件不存在: {}",
                    path.display()
                )));
            }
            return Self::load_from_file(path);
        }

        for config_file in config::CONFIG_FILE_CANDIDATES {
            if Path::new(config_file).exists() {
                tracing::info!("找到配置文件: {}", config_file);
                return Self::load_from_file(config_file);
            }
        }

        Err(BrError::configuration(format!(
            "未找到配置文件，请通过 --config 指定，或在当前目录放置 {}",
            config::CONFIG_FILE_CANDIDATES.join(" / ")
        )))
    }

    /// 从指定文件加载配置并校验
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let mut config = Self::from_yaml(&content)?;

        if let Ok(password) = std::env::var(config::PASSWORD_ENV) {
            config.connection.password = password;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        if !value.is_mapping() {
            return Err(BrError::configuration("配置文件顶层必须是映射"));
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// 校验必填项与标识符
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("connection.host", &self.connection.host),
            ("connection.user", &self.connection.user),
            ("connection.database", &self.connection.database),
            ("backup.repository", &self.backup.repository),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(BrError::configuration(format!("缺少必填配置项: {field}")));
            }
        }

        if self.connection.port == 0 {
            return Err(BrError::configuration("connection.port 不能为 0"));
        }

        validate_identifier(&self.connection.database)?;
        validate_identifier(&self.backup.repository)?;
        for table in &self.backup.tables {
            validate_identifier(table)?;
        }

        if self.backup.max_polls == 0 || self.backup.poll_interval_ms == 0 {
            return Err(BrError::configuration(
                "backup.max_polls 与 backup.poll_interval_ms 必须大于 0",
            ));
        }

        if let Some(repository) = &self.repository {
            repository.validate()?;
        }

        Ok(())
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            max_polls: self.backup.max_polls,
            interval: Duration::from_millis(self.backup.poll_interval_ms),
        }
    }
}

impl RepositoryConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.repo_type.eq_ignore_ascii_case("s3") {
            return Err(BrError::configuration(format!(
                "暂不支持的仓库类型: {}",
                self.repo_type
            )));
        }
        if self.force_https && self.endpoint.starts_with("http://") {
            return Err(BrError::configuration(
                "force_https 开启时仓库 endpoint 必须使用 HTTPS",
            ));
        }
        validate_identifier(&self.bucket)?;
        Ok(())
    }

    /// s3://bucket/prefix
    pub fn location(&self) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("s3://{}", self.bucket)
        } else {
            format!("s3://{}/{}", self.bucket, prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
connection:
  host: 127.0.0.1
  user: root
  database: sales
backup:
  repository: br_repo
  tables: [orders, customers]
"#;

    #[test]
    fn test_defaults_are_applied() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.connection.port, 9030);
        assert!(!config.connection.tls.enabled);
        assert!(config.connection.tls.verify_server_cert);
        assert_eq!(config.backup.max_polls, 21_600);
        assert_eq!(
            config.poll_settings().interval,
            Duration::from_millis(1_000)
        );
        assert!(config.backup.health_check);
        assert!(config.repository.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.backup.tables, vec!["orders", "customers"]);
    }

    #[test]
    fn test_missing_explicit_file_is_configuration_error() {
        let err = AppConfig::find_and_load_config(Some(Path::new("/nonexistent/br.yaml")))
            .unwrap_err();
        assert!(matches!(err, BrError::Configuration(_)));
    }

    #[test]
    fn test_non_mapping_is_rejected() {
        let err = AppConfig::from_yaml("- a\n- b\n").unwrap_err();
        assert!(matches!(err, BrError::Configuration(_)));
    }

    #[test]
    fn test_invalid_table_name_is_rejected() {
        let yaml = SAMPLE.replace("customers", "\"x; DROP TABLE y\"");
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(BrError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_repository_requires_https_when_forced() {
        let yaml = format!(
            "{SAMPLE}repository:\n  endpoint: http://minio:9000\n  bucket: backups\n  access_key: a\n  secret_key: b\n"
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert!(matches!(config.validate(), Err(BrError::Configuration(_))));
    }

    #[test]
    fn test_repository_location() {
        let repository = RepositoryConfig {
            repo_type: "s3".into(),
            endpoint: "https://minio:9000".into(),
            bucket: "backups".into(),
            prefix: "/starrocks/".into(),
            access_key: "a".into(),
            secret_key: "b".into(),
            force_https: true,
        };
        assert_eq!(repository.location(), "s3://backups/starrocks");
    }
}
