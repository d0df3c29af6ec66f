// ==========================================
// 教学成绩与选课系统 - 应用层
// ==========================================
// 职责: 组装仓储/引擎/API，提供进程入口所需的共享状态
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, Collaborators};
