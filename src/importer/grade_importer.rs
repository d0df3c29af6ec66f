// ==========================================
// 教学成绩与选课系统 - 成绩导入器
// ==========================================
// 职责: CSV 成绩文件的批量导入
// 写入策略: 已存在的 (student, course) 记录走无条件系统写入，
//           不存在的创建; 逐行隔离，单行失败只记入摘要
// ==========================================

use crate::engine::grade_update::{GradeUpdateCommand, GradeUpdateEngine};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::grade_repo::GradeRecordRepository;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// CSV 行结构
///
/// 表头: student_id,course_id,usual_score,mid_score,experiment_score,final_exam_score
#[derive(Debug, Clone, Deserialize)]
struct GradeImportRow {
    student_id: String,
    course_id: String,
    #[serde(default)]
    usual_score: Option<f64>,
    #[serde(default)]
    mid_score: Option<f64>,
    #[serde(default)]
    experiment_score: Option<f64>,
    #[serde(default)]
    final_exam_score: Option<f64>,
}

/// 单行失败摘要 (row 为数据行号，从 1 开始，不含表头)
#[derive(Debug, Clone)]
pub struct ImportRowError {
    pub row: usize,
    pub message: String,
}

/// 导入摘要
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<ImportRowError>,
}

// ==========================================
// GradeImporter - 成绩导入器
// ==========================================
pub struct GradeImporter {
    grade_repo: Arc<GradeRecordRepository>,
    update_engine: Arc<GradeUpdateEngine>,
}

impl GradeImporter {
    pub fn new(
        grade_repo: Arc<GradeRecordRepository>,
        update_engine: Arc<GradeUpdateEngine>,
    ) -> Self {
        Self {
            grade_repo,
            update_engine,
        }
    }

    /// 从 CSV 文件导入成绩
    ///
    /// 文件不存在/扩展名不符/表头不可解析为致命错误;
    /// 行级错误 (主键缺失、分项超范围) 只记入摘要
    pub fn import_csv(&self, file_path: &Path) -> ImportResult<ImportSummary> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(
                file_path.display().to_string(),
            ));
        }
        if let Some(ext) = file_path.extension() {
            if ext != "csv" {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut summary = ImportSummary::default();

        for (idx, result) in reader.deserialize::<GradeImportRow>().enumerate() {
            let row_no = idx + 1;
            summary.total_rows += 1;

            let outcome = match result {
                Ok(row) => self.import_row(row_no, &row),
                Err(e) => Err(ImportError::RowError {
                    row: row_no,
                    message: e.to_string(),
                }),
            };

            match outcome {
                Ok(RowOutcome::Created) => summary.created += 1,
                Ok(RowOutcome::Updated) => summary.updated += 1,
                Err(e) => {
                    tracing::warn!(row = row_no, error = %e, "导入行失败");
                    summary.failed += 1;
                    summary.errors.push(ImportRowError {
                        row: row_no,
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            file = %file_path.display(),
            total = summary.total_rows,
            created = summary.created,
            updated = summary.updated,
            failed = summary.failed,
            "成绩导入完成"
        );
        Ok(summary)
    }

    fn import_row(&self, row_no: usize, row: &GradeImportRow) -> ImportResult<RowOutcome> {
        if row.student_id.is_empty() || row.course_id.is_empty() {
            return Err(ImportError::PrimaryKeyMissing { row: row_no });
        }

        let existing = self
            .grade_repo
            .find_by_student_and_course(&row.student_id, &row.course_id)?;

        match existing {
            Some(record) => {
                let cmd = GradeUpdateCommand {
                    grade_id: record.id,
                    usual_score: row.usual_score,
                    mid_score: row.mid_score,
                    experiment_score: row.experiment_score,
                    final_exam_score: row.final_exam_score,
                    expected_version: None,
                    unconditional: true,
                };
                self.update_engine.update_grade(&cmd)?;
                Ok(RowOutcome::Updated)
            }
            None => {
                self.update_engine.create_grade(
                    &row.student_id,
                    &row.course_id,
                    row.usual_score,
                    row.mid_score,
                    row.experiment_score,
                    row.final_exam_score,
                )?;
                Ok(RowOutcome::Created)
            }
        }
    }
}

enum RowOutcome {
    Created,
    Updated,
}
