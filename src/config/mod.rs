// ==========================================
// 教学成绩与选课系统 - 配置层
// ==========================================
// 职责: 系统配置的存取与类型化读取
// ==========================================

pub mod config_manager;

pub use config_manager::{
    ConfigManager, DEFAULT_CLASS_CAPACITY, DEFAULT_LOCK_TIMEOUT_MS,
};
