use serde::{Deserialize, Serialize};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 静态配置（从 TOML 加载，启动时使用）
///
/// - database: 后端选择与关系型数据库连接池
/// - kv: sled 数据目录
/// - snapshot: KV 数据目录的对象存储备份
/// - analytics: 事件异步写入
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub kv: KvConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：DL，分隔符：__
    /// 示例：DL__DATABASE__URL=postgres://localhost/driplnk
    ///
    /// 另外兼容 `DATABASE_URL` 与 `DB_PATH` 两个常用变量。
    /// 文件存在但无法解析时返回错误，不回退到默认值
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        use anyhow::Context;
        use config::{Config, Environment, File};

        let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

        let settings = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 DL，分隔符 __
            .add_source(
                Environment::with_prefix("DL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        let mut config: StaticConfig = settings
            .try_deserialize()
            .with_context(|| format!("Invalid configuration in {}", path))?;

        if std::path::Path::new(path).exists() {
            eprintln!("[INFO] Configuration loaded from: {}", path);
        }

        config.apply_legacy_env(
            std::env::var("DATABASE_URL").ok(),
            std::env::var("DB_PATH").ok(),
        );
        Ok(config)
    }

    /// `DATABASE_URL` / `DB_PATH` 仅在对应配置项仍为默认值时生效
    fn apply_legacy_env(&mut self, database_url: Option<String>, db_path: Option<String>) {
        if let Some(url) = database_url.filter(|u| !u.is_empty())
            && self.database.url.is_empty()
        {
            self.database.url = url;
        }
        if let Some(dir) = db_path.filter(|d| !d.is_empty())
            && self.kv.data_dir == default_kv_data_dir()
        {
            self.kv.data_dir = dir;
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// 数据库配置
///
/// `backend` 为空时根据 `url` 推断：空 URL 使用 sled，否则按 scheme 选择。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl DatabaseConfig {
    /// 指定 URL 的关系型配置，其余取默认值
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// 嵌入式 KV 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvConfig {
    #[serde(default = "default_kv_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_kv_store_name")]
    pub store_name: String,
    /// 每次批量写入后刷盘
    #[serde(default = "default_true")]
    pub flush_on_write: bool,
}

impl KvConfig {
    /// sled 实际打开的目录：`<data_dir>/<store_name>`
    pub fn store_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join(&self.store_name)
    }
}

/// 快照备份配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_snapshot_region")]
    pub region: String,
    /// S3 兼容服务的自定义 endpoint
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_snapshot_key")]
    pub key: String,
    /// 设置后使用本地目录作为对象存储
    #[serde(default)]
    pub local_dir: Option<String>,
}

/// 分析事件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_record_timeout_ms")]
    pub record_timeout_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_true")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_database_pool_size() -> u32 {
    25
}

fn default_min_connections() -> u32 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    8
}

fn default_max_lifetime_secs() -> u64 {
    300
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_kv_data_dir() -> String {
    "./data".to_string()
}

fn default_kv_store_name() -> String {
    "driplnk.db".to_string()
}

fn default_snapshot_region() -> String {
    "us-east-1".to_string()
}

fn default_snapshot_key() -> String {
    "driplnk_backup.zip".to_string()
}

fn default_record_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: String::new(),
            url: String::new(),
            pool_size: default_database_pool_size(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_lifetime_secs: default_max_lifetime_secs(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            data_dir: default_kv_data_dir(),
            store_name: default_kv_store_name(),
            flush_on_write: true,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bucket: String::new(),
            region: default_snapshot_region(),
            endpoint_url: None,
            key: default_snapshot_key(),
            local_dir: None,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            record_timeout_ms: default_record_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: true,
        }
    }
}
