// ==========================================
// 教学成绩与选课系统 - 成绩更新引擎
// ==========================================
// 职责: 单条/批量成绩编辑的编排层
// - 分项校验 + 与库内现值合并 + 派生字段重算 + 乐观锁写入
// - 批量更新逐条隔离: 单条失败不影响其余条目，也不中断批次
// 约束:
// - 默认要求调用方携带 expected_version; 不带版本的写入必须
//   显式声明 unconditional 才被接受
// ==========================================

use crate::domain::GradeRecord;
use crate::engine::score::{self, Derived};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::grade_repo::{GradeRecordRepository, GradeWrite};
use std::sync::Arc;
use uuid::Uuid;

/// 一次成绩编辑请求
///
/// 四个分项均为可选: None 表示本次不修改该分项 (保留库内现值)
#[derive(Debug, Clone)]
pub struct GradeUpdateCommand {
    pub grade_id: String,
    pub usual_score: Option<f64>,
    pub mid_score: Option<f64>,
    pub experiment_score: Option<f64>,
    pub final_exam_score: Option<f64>,
    /// 调用方读取时看到的 version
    pub expected_version: Option<i64>,
    /// 显式声明放弃版本检查 (last-writer-wins)
    pub unconditional: bool,
}

/// 批量更新中单条失败的摘要
#[derive(Debug, Clone)]
pub struct BatchItemError {
    pub grade_id: String,
    pub reason: String,
}

/// 批量更新结果报告 (errors 保持输入顺序)
#[derive(Debug, Clone, Default)]
pub struct BatchUpdateReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<BatchItemError>,
}

// ==========================================
// GradeUpdateEngine - 成绩更新引擎
// ==========================================
pub struct GradeUpdateEngine {
    grade_repo: Arc<GradeRecordRepository>,
}

impl GradeUpdateEngine {
    pub fn new(grade_repo: Arc<GradeRecordRepository>) -> Self {
        Self { grade_repo }
    }

    /// 创建成绩记录 (分项可部分缺失，派生字段按缺失规则置空)
    pub fn create_grade(
        &self,
        student_id: &str,
        course_id: &str,
        usual_score: Option<f64>,
        mid_score: Option<f64>,
        experiment_score: Option<f64>,
        final_exam_score: Option<f64>,
    ) -> RepositoryResult<GradeRecord> {
        validate_components(usual_score, mid_score, experiment_score, final_exam_score)?;

        let derived = score::compute_derived(usual_score, mid_score, experiment_score, final_exam_score);
        let write = GradeWrite {
            usual_score,
            mid_score,
            experiment_score,
            final_exam_score,
            final_score: derived.final_score,
            gpa: derived.gpa,
        };

        let id = Uuid::new_v4().to_string();
        let record = self.grade_repo.create(&id, student_id, course_id, &write)?;
        tracing::info!(
            grade_id = %record.id,
            student_id,
            course_id,
            "成绩记录已创建"
        );
        Ok(record)
    }

    /// 单条成绩更新
    ///
    /// # 并发控制
    /// 合并所依据的库内现值可能在读取后被并发修改，但随后的
    /// 条件更新会因 version 不匹配而失败，不会产生基于过期
    /// 现值的覆盖写
    ///
    /// # 错误
    /// - `ValidationError`: 未携带 expected_version 且未声明 unconditional
    /// - `FieldValueError`: 分项超出 [0,100]
    /// - `VersionConflict` / `NotFound`: 见仓储层
    pub fn update_grade(&self, cmd: &GradeUpdateCommand) -> RepositoryResult<GradeRecord> {
        validate_components(
            cmd.usual_score,
            cmd.mid_score,
            cmd.experiment_score,
            cmd.final_exam_score,
        )?;

        if cmd.expected_version.is_none() && !cmd.unconditional {
            return Err(RepositoryError::ValidationError(
                "缺少 expectedVersion; 如确需覆盖写请显式设置 unconditional".to_string(),
            ));
        }

        let prior = self
            .grade_repo
            .find_by_id(&cmd.grade_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "GradeRecord".to_string(),
                id: cmd.grade_id.clone(),
            })?;

        // 合并: 本次携带的分项覆盖现值，未携带的保留
        let usual = cmd.usual_score.or(prior.usual_score);
        let mid = cmd.mid_score.or(prior.mid_score);
        let experiment = cmd.experiment_score.or(prior.experiment_score);
        let final_exam = cmd.final_exam_score.or(prior.final_exam_score);

        let Derived { final_score, gpa } = score::compute_derived(usual, mid, experiment, final_exam);
        let write = GradeWrite {
            usual_score: usual,
            mid_score: mid,
            experiment_score: experiment,
            final_exam_score: final_exam,
            final_score,
            gpa,
        };

        let new_version = match cmd.expected_version {
            Some(expected) => self.grade_repo.update_checked(&cmd.grade_id, expected, &write)?,
            None => {
                tracing::warn!(grade_id = %cmd.grade_id, "无版本检查的覆盖写入");
                self.grade_repo.update_unconditional(&cmd.grade_id, &write)?
            }
        };

        tracing::info!(
            grade_id = %cmd.grade_id,
            version = new_version,
            final_score = ?final_score,
            "成绩记录已更新"
        );

        // 回读落库行，返回的 version / updated_at 与存储一致
        self.grade_repo
            .find_by_id(&cmd.grade_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "GradeRecord".to_string(),
                id: cmd.grade_id.clone(),
            })
    }

    /// 批量成绩更新 (逐条隔离)
    ///
    /// 每条独立执行与提交: 任何一条失败 (版本冲突/校验失败/不存在)
    /// 只记入报告，既不回滚已成功条目，也不中断后续条目
    pub fn batch_update(&self, commands: &[GradeUpdateCommand]) -> BatchUpdateReport {
        let mut report = BatchUpdateReport::default();

        for cmd in commands {
            match self.update_grade(cmd) {
                Ok(_) => report.success_count += 1,
                Err(e) => {
                    tracing::warn!(grade_id = %cmd.grade_id, error = %e, "批量更新单条失败");
                    report.failure_count += 1;
                    report.errors.push(BatchItemError {
                        grade_id: cmd.grade_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            total = commands.len(),
            success = report.success_count,
            failure = report.failure_count,
            "批量成绩更新完成"
        );
        report
    }
}

fn validate_components(
    usual: Option<f64>,
    mid: Option<f64>,
    experiment: Option<f64>,
    final_exam: Option<f64>,
) -> RepositoryResult<()> {
    score::validate_component("usual_score", usual)?;
    score::validate_component("mid_score", mid)?;
    score::validate_component("experiment_score", experiment)?;
    score::validate_component("final_exam_score", final_exam)?;
    Ok(())
}
