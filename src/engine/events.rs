// ==========================================
// 教学成绩与选课系统 - 引擎层事件发布
// ==========================================
// 职责: 定义选课事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，外围通知系统实现适配器
// 红线: 事件发布失败只记日志，绝不影响已提交的选课事务
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 选课事件类型
// ==========================================

/// 选课事件触发类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentEventType {
    /// 选课成功
    CourseEnrolled,
    /// 退课成功
    CourseDropped,
}

impl EnrollmentEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            EnrollmentEventType::CourseEnrolled => "CourseEnrolled",
            EnrollmentEventType::CourseDropped => "CourseDropped",
        }
    }
}

/// 选课事件
///
/// 引擎在选课/退课事务提交之后发布，携带冗余的课程 ID
/// 便于下游按课程维度聚合
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentEvent {
    /// 选课记录 ID
    pub enrollment_id: String,
    /// 事件类型
    pub event_type: EnrollmentEventType,
    /// 学生 ID
    pub student_id: String,
    /// 教学班 ID
    pub teaching_class_id: String,
    /// 课程 ID
    pub course_id: String,
    /// 事件发生时间
    pub occurred_at: NaiveDateTime,
}

impl EnrollmentEvent {
    pub fn new(
        event_type: EnrollmentEventType,
        enrollment_id: String,
        student_id: String,
        teaching_class_id: String,
        course_id: String,
    ) -> Self {
        Self {
            enrollment_id,
            event_type,
            student_id,
            teaching_class_id,
            course_id,
            occurred_at: chrono::Utc::now().naive_utc(),
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 选课事件发布者 Trait
///
/// Engine 层定义，通知适配器实现
///
/// # 实现说明
/// - 发布发生在数据库事务提交之后
/// - 返回 Err 时由调用方记 warn 日志，不回滚事务
pub trait EnrollmentEventPublisher: Send + Sync {
    /// 发布选课事件
    fn publish(&self, event: EnrollmentEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl EnrollmentEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: EnrollmentEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - enrollment_id={}, event_type={}",
            event.enrollment_id,
            event.event_type.as_str()
        );
        Ok(())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn EnrollmentEventPublisher>> 的使用
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn EnrollmentEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn EnrollmentEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）; 失败只记 warn
    pub fn publish(&self, event: EnrollmentEvent) {
        let Some(publisher) = &self.inner else {
            tracing::debug!(
                "OptionalEventPublisher: 未配置发布者，跳过事件 - enrollment_id={}, event_type={}",
                event.enrollment_id,
                event.event_type.as_str()
            );
            return;
        };

        let event_type = event.event_type;
        let enrollment_id = event.enrollment_id.clone();
        if let Err(e) = publisher.publish(event) {
            tracing::warn!(
                enrollment_id = %enrollment_id,
                event_type = event_type.as_str(),
                error = %e,
                "选课事件发布失败 (事务已提交，不回滚)"
            );
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
