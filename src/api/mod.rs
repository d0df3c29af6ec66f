// ==========================================
// 教学成绩与选课系统 - API层
// ==========================================
// 职责: 对外操作入口，参数校验 + 错误转换 + DTO 组装
// 红线: API 层不拼 SQL，不做容量/版本的预判定
// ==========================================

pub mod enrollment_api;
pub mod error;
pub mod grade_api;

pub use enrollment_api::{
    ClassCreateRequest, EnrollRequest, EnrollmentApi, EnrollmentResponse, TeachingClassResponse,
};
pub use error::{ApiError, ApiResult};
pub use grade_api::{
    BatchUpdateResponse, CourseGradesResponse, GradeApi, GradeBatchItem, GradeCreateRequest,
    GradeResponse, GradeUpdateRequest, RecalcResponse, StudentGradesResponse,
};
