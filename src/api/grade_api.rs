// ==========================================
// 教学成绩与选课系统 - 成绩 API
// ==========================================
// 职责: 成绩的创建/编辑/批量编辑/查询/重算入口
// 红线: 版本冲突直接返回给调用方，核心层绝不静默重试
//       (静默重试会掩盖并发编辑)
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::GradeRecord;
use crate::engine::grade_update::{GradeUpdateCommand, GradeUpdateEngine};
use crate::engine::recalc::RecalcEngine;
use crate::repository::grade_repo::GradeRecordRepository;

// ==========================================
// DTO 定义 (camelCase 对外)
// ==========================================

/// 创建成绩请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCreateRequest {
    pub student_id: String,
    pub course_id: String,
    #[serde(default)]
    pub usual_score: Option<f64>,
    #[serde(default)]
    pub mid_score: Option<f64>,
    #[serde(default)]
    pub experiment_score: Option<f64>,
    #[serde(default)]
    pub final_exam_score: Option<f64>,
}

/// 成绩编辑请求
///
/// 分项为 None 表示本次不修改该分项; version 为调用方读取时
/// 看到的版本号，缺失且未声明 unconditional 时请求被拒绝
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeUpdateRequest {
    #[serde(default)]
    pub usual_score: Option<f64>,
    #[serde(default)]
    pub mid_score: Option<f64>,
    #[serde(default)]
    pub experiment_score: Option<f64>,
    #[serde(default)]
    pub final_exam_score: Option<f64>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub unconditional: bool,
}

/// 批量编辑中的单条 (携带目标记录 ID)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBatchItem {
    pub grade_id: String,
    #[serde(flatten)]
    pub update: GradeUpdateRequest,
}

/// 成绩响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResponse {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub usual_score: Option<f64>,
    pub mid_score: Option<f64>,
    pub experiment_score: Option<f64>,
    pub final_exam_score: Option<f64>,
    pub final_score: Option<f64>,
    pub gpa: Option<f64>,
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<GradeRecord> for GradeResponse {
    fn from(r: GradeRecord) -> Self {
        Self {
            id: r.id,
            student_id: r.student_id,
            course_id: r.course_id,
            usual_score: r.usual_score,
            mid_score: r.mid_score,
            experiment_score: r.experiment_score,
            final_exam_score: r.final_exam_score,
            final_score: r.final_score,
            gpa: r.gpa,
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// 批量编辑响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateResponse {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<BatchErrorItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchErrorItem {
    pub id: String,
    pub reason: String,
}

/// 重算响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalcResponse {
    pub scanned: usize,
    pub updated: usize,
}

/// 课程成绩列表响应 (附平均总评)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGradesResponse {
    pub course_id: String,
    pub average_final_score: Option<f64>,
    pub grades: Vec<GradeResponse>,
}

/// 学生成绩列表响应 (附平均绩点)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGradesResponse {
    pub student_id: String,
    pub average_gpa: Option<f64>,
    pub grades: Vec<GradeResponse>,
}

// ==========================================
// GradeApi - 成绩 API
// ==========================================
pub struct GradeApi {
    grade_repo: Arc<GradeRecordRepository>,
    update_engine: Arc<GradeUpdateEngine>,
    recalc_engine: Arc<RecalcEngine>,
}

impl GradeApi {
    pub fn new(
        grade_repo: Arc<GradeRecordRepository>,
        update_engine: Arc<GradeUpdateEngine>,
        recalc_engine: Arc<RecalcEngine>,
    ) -> Self {
        Self {
            grade_repo,
            update_engine,
            recalc_engine,
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 按 ID 查询成绩
    pub fn get_grade(&self, grade_id: &str) -> ApiResult<GradeResponse> {
        if grade_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("成绩记录 ID 不能为空".to_string()));
        }
        let record = self
            .grade_repo
            .find_by_id(grade_id)?
            .ok_or_else(|| ApiError::NotFound(format!("GradeRecord(id={})不存在", grade_id)))?;
        Ok(record.into())
    }

    /// 按 (学生, 课程) 查询成绩
    pub fn get_grade_by_student_and_course(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> ApiResult<GradeResponse> {
        let record = self
            .grade_repo
            .find_by_student_and_course(student_id, course_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "GradeRecord(student={}, course={})不存在",
                    student_id, course_id
                ))
            })?;
        Ok(record.into())
    }

    /// 课程成绩列表 + 平均总评
    pub fn list_course_grades(&self, course_id: &str) -> ApiResult<CourseGradesResponse> {
        if course_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("课程 ID 不能为空".to_string()));
        }
        let grades = self.grade_repo.find_by_course_id(course_id)?;
        let average = self.grade_repo.course_average_final_score(course_id)?;
        debug!(course_id, count = grades.len(), "课程成绩查询");
        Ok(CourseGradesResponse {
            course_id: course_id.to_string(),
            average_final_score: average,
            grades: grades.into_iter().map(Into::into).collect(),
        })
    }

    /// 学生成绩列表 + 平均绩点
    pub fn list_student_grades(&self, student_id: &str) -> ApiResult<StudentGradesResponse> {
        if student_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("学生 ID 不能为空".to_string()));
        }
        let grades = self.grade_repo.find_by_student_id(student_id)?;
        let average = self.grade_repo.student_average_gpa(student_id)?;
        Ok(StudentGradesResponse {
            student_id: student_id.to_string(),
            average_gpa: average,
            grades: grades.into_iter().map(Into::into).collect(),
        })
    }

    // ==========================================
    // 写入接口
    // ==========================================

    /// 创建成绩记录
    pub fn create_grade(&self, req: &GradeCreateRequest) -> ApiResult<GradeResponse> {
        if req.student_id.trim().is_empty() || req.course_id.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "学生 ID 与课程 ID 不能为空".to_string(),
            ));
        }
        let record = self.update_engine.create_grade(
            &req.student_id,
            &req.course_id,
            req.usual_score,
            req.mid_score,
            req.experiment_score,
            req.final_exam_score,
        )?;
        Ok(record.into())
    }

    /// 单条成绩编辑 (乐观锁)
    ///
    /// 版本冲突返回 `ApiError::VersionConflict`，由调用方重读后重试
    pub fn update_grade(&self, grade_id: &str, req: &GradeUpdateRequest) -> ApiResult<GradeResponse> {
        if grade_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("成绩记录 ID 不能为空".to_string()));
        }
        let record = self.update_engine.update_grade(&to_command(grade_id, req))?;
        Ok(record.into())
    }

    /// 批量成绩编辑 (逐条隔离，永远返回 200 级别的报告)
    pub fn batch_update_grades(&self, items: &[GradeBatchItem]) -> ApiResult<BatchUpdateResponse> {
        let commands: Vec<GradeUpdateCommand> = items
            .iter()
            .map(|item| to_command(&item.grade_id, &item.update))
            .collect();

        let report = self.update_engine.batch_update(&commands);
        Ok(BatchUpdateResponse {
            success_count: report.success_count,
            failure_count: report.failure_count,
            errors: report
                .errors
                .into_iter()
                .map(|e| BatchErrorItem {
                    id: e.grade_id,
                    reason: e.reason,
                })
                .collect(),
        })
    }

    /// 课程级批量重算 (排他锁)
    pub fn recalculate_course(&self, course_id: &str) -> ApiResult<RecalcResponse> {
        let summary = self.recalc_engine.recalculate_course(course_id)?;
        Ok(RecalcResponse {
            scanned: summary.scanned,
            updated: summary.updated,
        })
    }

    /// 学生级批量重算 (排他锁)
    pub fn recalculate_student(&self, student_id: &str) -> ApiResult<RecalcResponse> {
        let summary = self.recalc_engine.recalculate_student(student_id)?;
        Ok(RecalcResponse {
            scanned: summary.scanned,
            updated: summary.updated,
        })
    }
}

fn to_command(grade_id: &str, req: &GradeUpdateRequest) -> GradeUpdateCommand {
    GradeUpdateCommand {
        grade_id: grade_id.to_string(),
        usual_score: req.usual_score,
        mid_score: req.mid_score,
        experiment_score: req.experiment_score,
        final_exam_score: req.final_exam_score,
        expected_version: req.version,
        unconditional: req.unconditional,
    }
}
