mod user;
pub use user::{UserEntity, UserEntityCreateUpdate, UserStatistics};

mod course;
pub use course::{Course, CourseCreate, CourseStatistics};

mod course_content;
pub use course_content::{CourseContent, CourseContentCreate};

mod enrollment;
pub use enrollment::{Enrollment, EnrollmentStatistics};

mod learning_path;
pub use learning_path::{LearningPath, LearningPathCreate, LearningPathEnrollment};

mod learning_module;
pub use learning_module::{LearningModule, LearningModuleCreate, ModuleSearch};

mod learning_section;
pub use learning_section::{LearningSection, LearningSectionCreate};

mod content_block;
pub use content_block::{ContentBlock, ContentBlockCreate};

mod progress;
pub use progress::{
    InstructorStatistics, MonthlyCount, Progress, ProgressUpdate, StudentProgressRow, fill_months,
};

mod student_progress;
pub use student_progress::{ModuleProgressUpdate, StudentProgress};

mod assessment;
pub use assessment::{Assessment, AssessmentCreate};

mod question;
pub use question::{Question, QuestionCreate, QuestionOption, QuestionOptionCreate};

mod attempt;
pub use attempt::{AnswerGrade, AnswerSubmit, AssessmentAttempt, AttemptScore, StudentAnswer};
