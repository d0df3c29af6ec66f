// ==========================================
// 教学成绩与选课系统 - 主入口
// ==========================================
// 技术栈: Rust + SQLite
// ==========================================

use grade_system::app::{get_default_db_path, AppState};
use grade_system::logging;

fn main() {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", grade_system::APP_NAME);
    tracing::info!("系统版本: {}", grade_system::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    // 创建AppState
    tracing::info!("正在初始化AppState...");
    let app_state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("AppState初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        db_path = %app_state.db_path,
        "初始化完成，等待上层接入 (HTTP 路由/命令行均在本核心之外)"
    );
}
