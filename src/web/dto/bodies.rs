use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::CourseStatus;

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct StatusBody {
    pub status: CourseStatus,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct RatingBody {
    #[validate(range(min = 1.0, max = 5.0, message = "rating must be between 1 and 5"))]
    pub rating: f64,
}

/// Percentages outside 0..=100 are clamped rather than rejected.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct PercentageBody {
    pub percentage: f64,
}
