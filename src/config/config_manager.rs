// ==========================================
// 教学成绩与选课系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 配置键全集
pub mod config_keys {
    /// 批量重算的范围锁等待上限 (毫秒)
    pub const LOCK_TIMEOUT_MS: &str = "lock_timeout_ms";
    /// 新建教学班的默认容量
    pub const DEFAULT_CLASS_CAPACITY: &str = "default_class_capacity";
}

/// 范围锁等待上限默认值 (毫秒)
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
/// 教学班默认容量
pub const DEFAULT_CLASS_CAPACITY: i64 = 50;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    // ===== 并发控制配置 =====

    /// 批量重算的范围锁等待上限
    ///
    /// 配置格式错误时回落到默认值并记 warn
    pub fn get_lock_timeout(&self) -> Result<Duration, Box<dyn Error>> {
        let value = self.get_config_or_default(
            config_keys::LOCK_TIMEOUT_MS,
            &DEFAULT_LOCK_TIMEOUT_MS.to_string(),
        )?;
        let ms = value.parse::<u64>().unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::LOCK_TIMEOUT_MS,
                raw_value = %value,
                "锁超时配置格式错误，使用默认值"
            );
            DEFAULT_LOCK_TIMEOUT_MS
        });
        Ok(Duration::from_millis(ms))
    }

    // ===== 选课配置 =====

    /// 新建教学班的默认容量
    pub fn get_default_class_capacity(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(
            config_keys::DEFAULT_CLASS_CAPACITY,
            &DEFAULT_CLASS_CAPACITY.to_string(),
        )?;
        let capacity = value.parse::<i64>().unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::DEFAULT_CLASS_CAPACITY,
                raw_value = %value,
                "默认容量配置格式错误，使用默认值"
            );
            DEFAULT_CLASS_CAPACITY
        });
        if capacity <= 0 {
            return Ok(DEFAULT_CLASS_CAPACITY);
        }
        Ok(capacity)
    }
}
