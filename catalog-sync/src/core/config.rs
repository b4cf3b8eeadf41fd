use std::path::PathBuf;
use std::time::Duration;

/// 目录同步配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 |
/// | CATALOG_DB_PATH | {WORK_DIR}/catalog.redb | 覆盖层数据库文件 |
/// | CACHE_TTL_MS | 1000 | 合并视图缓存时间(毫秒) |
/// | SEED_DEMO_CONTENT | false | 首次启动是否写入演示数据 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (无) | 日志目录，设置后按天滚动写文件 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/catalog CACHE_TTL_MS=500 cargo run -p catalog-sync
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: PathBuf,
    /// redb 数据库路径；`None` 表示内存存储
    pub db_path: Option<PathBuf>,
    /// 合并视图缓存 TTL
    pub cache_ttl: Duration,
    /// 是否写入演示数据
    pub seed_demo_content: bool,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        let work_dir: PathBuf = std::env::var("WORK_DIR")
            .unwrap_or_else(|_| "./data".into())
            .into();
        let db_path = std::env::var("CATALOG_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| work_dir.join("catalog.redb"));

        Self {
            db_path: Some(db_path),
            work_dir,
            cache_ttl: Duration::from_millis(
                std::env::var("CACHE_TTL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1000),
            ),
            seed_demo_content: std::env::var("SEED_DEMO_CONTENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok(),
        }
    }

    /// 内存存储配置
    ///
    /// 常用于测试场景
    pub fn in_memory() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            db_path: None,
            cache_ttl: Duration::from_millis(1000),
            seed_demo_content: false,
            environment: "test".into(),
            log_level: "debug".into(),
            log_dir: None,
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_config() {
        let config = Config::in_memory();
        assert!(config.db_path.is_none());
        assert_eq!(config.cache_ttl, Duration::from_secs(1));
        assert!(!config.is_production());
    }
}
