// ==========================================
// 教学成绩与选课系统 - 选课 API
// ==========================================
// 职责: 选课/退课/状态变更/查询入口
// 红线: 容量判定只发生在仓储层的原子条件更新内，
//       API 层不做容量预检
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::domain::{CourseEnrollment, EnrollmentStatus, TeachingClass, TeachingClassStatus};
use crate::engine::enrollment::EnrollmentEngine;
use crate::repository::enrollment_repo::CourseEnrollmentRepository;
use crate::repository::teaching_class_repo::TeachingClassRepository;

// ==========================================
// DTO 定义 (camelCase 对外)
// ==========================================

/// 选课请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub student_id: String,
    pub teaching_class_id: String,
}

/// 选课/退课响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResponse {
    pub enrollment_id: String,
    pub student_id: String,
    pub teaching_class_id: String,
    pub status: String,
    pub enrolled_at: NaiveDateTime,
    pub dropped_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    /// 非致命提示 (如名册缺失)，不影响事务结果
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl EnrollmentResponse {
    fn from_enrollment(e: CourseEnrollment, warnings: Vec<String>) -> Self {
        Self {
            enrollment_id: e.enrollment_id,
            student_id: e.student_id,
            teaching_class_id: e.teaching_class_id,
            status: e.status.to_string(),
            enrolled_at: e.enrolled_at,
            dropped_at: e.dropped_at,
            completed_at: e.completed_at,
            warnings,
        }
    }
}

/// 创建教学班请求 (capacity 缺省时使用配置的默认容量)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCreateRequest {
    pub class_id: String,
    pub name: String,
    pub course_id: String,
    #[serde(default)]
    pub capacity: Option<i64>,
}

/// 教学班响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingClassResponse {
    pub class_id: String,
    pub name: String,
    pub course_id: String,
    pub capacity: i64,
    pub enrolled_count: i64,
    pub status: String,
}

impl From<TeachingClass> for TeachingClassResponse {
    fn from(c: TeachingClass) -> Self {
        Self {
            class_id: c.class_id,
            name: c.name,
            course_id: c.course_id,
            capacity: c.capacity,
            enrolled_count: c.enrolled_count,
            status: c.status.to_string(),
        }
    }
}

// ==========================================
// EnrollmentApi - 选课 API
// ==========================================
pub struct EnrollmentApi {
    engine: Arc<EnrollmentEngine>,
    enrollment_repo: Arc<CourseEnrollmentRepository>,
    class_repo: Arc<TeachingClassRepository>,
    config_manager: Arc<ConfigManager>,
}

impl EnrollmentApi {
    pub fn new(
        engine: Arc<EnrollmentEngine>,
        enrollment_repo: Arc<CourseEnrollmentRepository>,
        class_repo: Arc<TeachingClassRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            engine,
            enrollment_repo,
            class_repo,
            config_manager,
        }
    }

    /// 选课
    ///
    /// 冲突类结果 (ClassFull / AlreadyEnrolled / ClassNotEnrollable)
    /// 以对应的 ApiError 变体返回
    pub fn enroll(&self, req: &EnrollRequest) -> ApiResult<EnrollmentResponse> {
        validate_ids(&req.student_id, &req.teaching_class_id)?;
        let outcome = self.engine.enroll(&req.student_id, &req.teaching_class_id)?;
        Ok(EnrollmentResponse::from_enrollment(
            outcome.enrollment,
            outcome.warnings,
        ))
    }

    /// 退课
    pub fn drop_enrollment(
        &self,
        student_id: &str,
        class_id: &str,
    ) -> ApiResult<EnrollmentResponse> {
        validate_ids(student_id, class_id)?;
        let outcome = self.engine.drop_enrollment(student_id, class_id)?;
        Ok(EnrollmentResponse::from_enrollment(
            outcome.enrollment,
            outcome.warnings,
        ))
    }

    /// 管理性状态变更 (COMPLETED / FAILED 等)
    pub fn update_status(
        &self,
        enrollment_id: &str,
        new_status: &str,
    ) -> ApiResult<EnrollmentResponse> {
        if enrollment_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("选课记录 ID 不能为空".to_string()));
        }
        let status = EnrollmentStatus::from_db_str(new_status);
        if status.to_db_str() != new_status {
            return Err(ApiError::InvalidInput(format!(
                "未知的选课状态: {}",
                new_status
            )));
        }
        let enrollment = self.engine.update_status(enrollment_id, status)?;
        Ok(EnrollmentResponse::from_enrollment(enrollment, Vec::new()))
    }

    /// 学生的选课列表
    pub fn list_by_student(&self, student_id: &str) -> ApiResult<Vec<EnrollmentResponse>> {
        if student_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("学生 ID 不能为空".to_string()));
        }
        let enrollments = self.enrollment_repo.find_by_student_id(student_id)?;
        Ok(enrollments
            .into_iter()
            .map(|e| EnrollmentResponse::from_enrollment(e, Vec::new()))
            .collect())
    }

    /// 教学班的选课列表
    pub fn list_by_class(&self, class_id: &str) -> ApiResult<Vec<EnrollmentResponse>> {
        if class_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("教学班 ID 不能为空".to_string()));
        }
        let enrollments = self.enrollment_repo.find_by_class_id(class_id)?;
        Ok(enrollments
            .into_iter()
            .map(|e| EnrollmentResponse::from_enrollment(e, Vec::new()))
            .collect())
    }

    /// 是否处于在读选课状态
    pub fn is_enrolled(&self, student_id: &str, class_id: &str) -> ApiResult<bool> {
        validate_ids(student_id, class_id)?;
        Ok(self.enrollment_repo.is_enrolled(student_id, class_id)?)
    }

    /// 创建教学班 (初始为 PLANNED，需显式开放选课)
    pub fn create_class(&self, req: &ClassCreateRequest) -> ApiResult<TeachingClassResponse> {
        if req.class_id.trim().is_empty() || req.course_id.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "教学班 ID 与课程 ID 不能为空".to_string(),
            ));
        }

        let capacity = match req.capacity {
            Some(c) => c,
            None => self
                .config_manager
                .get_default_class_capacity()
                .map_err(|e| ApiError::InternalError(e.to_string()))?,
        };

        self.class_repo.create(
            &req.class_id,
            &req.name,
            &req.course_id,
            capacity,
            TeachingClassStatus::Planned,
        )?;
        self.get_class(&req.class_id)
    }

    /// 教学班状态管理 (开放选课 / 截止 / 取消等)
    pub fn set_class_status(&self, class_id: &str, status: &str) -> ApiResult<TeachingClassResponse> {
        if class_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("教学班 ID 不能为空".to_string()));
        }
        let parsed = TeachingClassStatus::from_db_str(status);
        if parsed.to_db_str() != status {
            return Err(ApiError::InvalidInput(format!(
                "未知的教学班状态: {}",
                status
            )));
        }
        self.class_repo.update_status(class_id, parsed)?;
        self.get_class(class_id)
    }

    /// 教学班信息 (容量/已选人数)
    pub fn get_class(&self, class_id: &str) -> ApiResult<TeachingClassResponse> {
        let class = self
            .class_repo
            .find_by_id(class_id)?
            .ok_or_else(|| ApiError::NotFound(format!("TeachingClass(id={})不存在", class_id)))?;
        Ok(class.into())
    }
}

fn validate_ids(student_id: &str, class_id: &str) -> ApiResult<()> {
    if student_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("学生 ID 不能为空".to_string()));
    }
    if class_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("教学班 ID 不能为空".to_string()));
    }
    Ok(())
}
