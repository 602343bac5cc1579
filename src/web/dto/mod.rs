mod auth;
pub use auth::{LoginBody, MessageResponse, RegisterBody, UserUpdateBody};

mod queries;
pub use queries::{CourseFilterQuery, NameQuery, SearchQuery, StatusQuery};

mod bodies;
pub use bodies::{PercentageBody, RatingBody, StatusBody};

mod details;
pub use details::{
    AnswerView, AssessmentDetails, AttemptDetails, LearningPathDetails, OptionView, QuestionDetails,
    QuestionView,
};
