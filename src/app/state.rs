// ==========================================
// 教学成绩与选课系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{EnrollmentApi, GradeApi};
use crate::config::config_manager::ConfigManager;
use crate::db;
use crate::engine::enrollment::{DirectoryLookup, EnrollmentEngine};
use crate::engine::events::OptionalEventPublisher;
use crate::engine::grade_update::GradeUpdateEngine;
use crate::engine::lock_manager::LockManager;
use crate::engine::recalc::RecalcEngine;
use crate::engine::EnrollmentEventPublisher;
use crate::importer::GradeImporter;
use crate::repository::{
    CourseEnrollmentRepository, GradeRecordRepository, TeachingClassRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 成绩API
    pub grade_api: Arc<GradeApi>,

    /// 选课API
    pub enrollment_api: Arc<EnrollmentApi>,

    /// 成绩导入器
    pub grade_importer: Arc<GradeImporter>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 范围锁管理器 (诊断用)
    pub lock_manager: Arc<LockManager>,
}

/// AppState 构建期的可选外部协作方
#[derive(Default)]
pub struct Collaborators {
    pub directory: Option<Arc<dyn DirectoryLookup>>,
    pub event_publisher: Option<Arc<dyn EnrollmentEventPublisher>>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库连接并建库（幂等）
    /// 2. 初始化所有Repository与Engine
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_collaborators(db_path, Collaborators::default())
    }

    /// 创建 AppState 并注入外部协作方 (名册查询 / 事件发布)
    pub fn with_collaborators(
        db_path: String,
        collaborators: Collaborators,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        db::init_schema(&conn).map_err(|e| format!("建库失败: {}", e))?;

        match db::read_schema_version(&conn) {
            Ok(Some(v)) if v != db::CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    found = v,
                    expected = db::CURRENT_SCHEMA_VERSION,
                    "schema_version 与当前代码不一致"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("schema_version 读取失败(将继续启动): {}", e),
        }

        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let grade_repo = Arc::new(GradeRecordRepository::new(conn.clone()));
        let class_repo = Arc::new(TeachingClassRepository::new(conn.clone()));
        let enrollment_repo = Arc::new(CourseEnrollmentRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("配置管理器初始化失败: {}", e))?,
        );
        let lock_timeout = config_manager
            .get_lock_timeout()
            .map_err(|e| format!("锁超时配置读取失败: {}", e))?;

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let lock_manager = Arc::new(LockManager::new());
        let update_engine = Arc::new(GradeUpdateEngine::new(grade_repo.clone()));
        let recalc_engine = Arc::new(RecalcEngine::new(
            grade_repo.clone(),
            lock_manager.clone(),
            lock_timeout,
        ));

        let events = match collaborators.event_publisher {
            Some(publisher) => OptionalEventPublisher::with_publisher(publisher),
            None => OptionalEventPublisher::none(),
        };
        let mut enrollment_engine =
            EnrollmentEngine::new(enrollment_repo.clone(), class_repo.clone()).with_events(events);
        if let Some(directory) = collaborators.directory {
            enrollment_engine = enrollment_engine.with_directory(directory);
        }
        let enrollment_engine = Arc::new(enrollment_engine);

        // ==========================================
        // 初始化API层
        // ==========================================
        let grade_api = Arc::new(GradeApi::new(
            grade_repo.clone(),
            update_engine.clone(),
            recalc_engine,
        ));
        let enrollment_api = Arc::new(EnrollmentApi::new(
            enrollment_engine,
            enrollment_repo,
            class_repo,
            config_manager.clone(),
        ));
        let grade_importer = Arc::new(GradeImporter::new(grade_repo, update_engine));

        tracing::info!("AppState初始化成功");
        Ok(Self {
            db_path,
            grade_api,
            enrollment_api,
            grade_importer,
            config_manager,
            lock_manager,
        })
    }
}

/// 默认数据库路径
///
/// 优先读取环境变量 GRADE_SYSTEM_DB，否则使用工作目录下的 grade_system.db
pub fn get_default_db_path() -> String {
    std::env::var("GRADE_SYSTEM_DB").unwrap_or_else(|_| "grade_system.db".to_string())
}
