// ==========================================
// 教学成绩与选课系统 - 选课引擎
// ==========================================
// 职责: 选课/退课的编排层
// - 名册存在性校验 (非致命，仅产出告警)
// - 调用仓储完成原子的容量占位/释放
// - 事务提交后发布选课事件 (失败只记日志)
// ==========================================

use crate::domain::{CourseEnrollment, EnrollmentStatus, TeachingClass};
use crate::engine::events::{EnrollmentEvent, EnrollmentEventType, OptionalEventPublisher};
use crate::repository::enrollment_repo::CourseEnrollmentRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::teaching_class_repo::TeachingClassRepository;
use std::sync::Arc;

/// 学生/课程名册只读查询
///
/// 由外部身份系统适配器实现; 本系统只消费存在性判断，
/// 不管理名册数据
pub trait DirectoryLookup: Send + Sync {
    fn student_exists(&self, student_id: &str) -> bool;
    fn course_exists(&self, course_id: &str) -> bool;
}

/// 选课/退课结果 (warnings 为非致命提示，不影响事务结果)
#[derive(Debug, Clone)]
pub struct EnrollmentOutcome {
    pub enrollment: CourseEnrollment,
    pub warnings: Vec<String>,
}

// ==========================================
// EnrollmentEngine - 选课引擎
// ==========================================
pub struct EnrollmentEngine {
    enrollment_repo: Arc<CourseEnrollmentRepository>,
    class_repo: Arc<TeachingClassRepository>,
    directory: Option<Arc<dyn DirectoryLookup>>,
    events: OptionalEventPublisher,
}

impl EnrollmentEngine {
    pub fn new(
        enrollment_repo: Arc<CourseEnrollmentRepository>,
        class_repo: Arc<TeachingClassRepository>,
    ) -> Self {
        Self {
            enrollment_repo,
            class_repo,
            directory: None,
            events: OptionalEventPublisher::none(),
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn DirectoryLookup>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_events(mut self, events: OptionalEventPublisher) -> Self {
        self.events = events;
        self
    }

    /// 选课
    ///
    /// 容量判定与占位在仓储层同一事务内完成，这里不做
    /// 预读容量的判断 (预读结果在并发下不可信)
    pub fn enroll(&self, student_id: &str, class_id: &str) -> RepositoryResult<EnrollmentOutcome> {
        let class = self.require_class(class_id)?;
        let warnings = self.directory_warnings(student_id, &class);

        let enrollment = self.enrollment_repo.enroll(student_id, class_id)?;
        tracing::info!(
            enrollment_id = %enrollment.enrollment_id,
            student_id,
            class_id,
            "选课成功"
        );

        self.events.publish(EnrollmentEvent::new(
            EnrollmentEventType::CourseEnrolled,
            enrollment.enrollment_id.clone(),
            student_id.to_string(),
            class_id.to_string(),
            class.course_id.clone(),
        ));

        Ok(EnrollmentOutcome {
            enrollment,
            warnings,
        })
    }

    /// 退课
    ///
    /// 教学班结课/取消后不再接受退课，成绩经由管理性状态转移结算
    pub fn drop_enrollment(
        &self,
        student_id: &str,
        class_id: &str,
    ) -> RepositoryResult<EnrollmentOutcome> {
        let class = self.require_class(class_id)?;
        if !class.status.can_withdraw() {
            return Err(RepositoryError::ClassNotWithdrawable {
                class_id: class_id.to_string(),
                status: class.status.to_string(),
            });
        }
        let warnings = self.directory_warnings(student_id, &class);

        let enrollment = self.enrollment_repo.drop_enrollment(student_id, class_id)?;
        tracing::info!(
            enrollment_id = %enrollment.enrollment_id,
            student_id,
            class_id,
            "退课成功"
        );

        self.events.publish(EnrollmentEvent::new(
            EnrollmentEventType::CourseDropped,
            enrollment.enrollment_id.clone(),
            student_id.to_string(),
            class_id.to_string(),
            class.course_id.clone(),
        ));

        Ok(EnrollmentOutcome {
            enrollment,
            warnings,
        })
    }

    /// 管理性状态转移 (COMPLETED / FAILED 等)
    pub fn update_status(
        &self,
        enrollment_id: &str,
        new_status: EnrollmentStatus,
    ) -> RepositoryResult<CourseEnrollment> {
        let enrollment = self.enrollment_repo.update_status(enrollment_id, new_status)?;
        tracing::info!(
            enrollment_id,
            status = %enrollment.status,
            "选课状态已变更"
        );
        Ok(enrollment)
    }

    fn require_class(&self, class_id: &str) -> RepositoryResult<TeachingClass> {
        self.class_repo
            .find_by_id(class_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "TeachingClass".to_string(),
                id: class_id.to_string(),
            })
    }

    /// 名册存在性告警 (非致命)
    fn directory_warnings(&self, student_id: &str, class: &TeachingClass) -> Vec<String> {
        let mut warnings = Vec::new();
        let Some(directory) = &self.directory else {
            return warnings;
        };

        if !directory.student_exists(student_id) {
            tracing::warn!(student_id, "学生不在名册中");
            warnings.push(format!("学生 {} 不在名册中", student_id));
        }
        if !directory.course_exists(&class.course_id) {
            tracing::warn!(course_id = %class.course_id, "课程不在名册中");
            warnings.push(format!("课程 {} 不在名册中", class.course_id));
        }
        warnings
    }
}
