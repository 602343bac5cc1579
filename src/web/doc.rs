use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::web::middlewares::AUTH_TOKEN;

pub struct CookieAuthModifier;

impl Modify for CookieAuthModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(schema) = openapi.components.as_mut() {
            schema.add_security_scheme(
                "cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    AUTH_TOKEN,
                    "JWT session of the signed in user",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "LMS API", description = "Courses, learning paths, modules and assessments"),
    paths(
        crate::web::routes::auth::auth_register_handler,
        crate::web::routes::auth::auth_login_handler,
        crate::web::routes::auth::auth_logout_handler,
        crate::web::routes::auth::auth_me_handler,
        crate::web::routes::users::user_create_handler,
        crate::web::routes::users::user_list_handler,
        crate::web::routes::users::user_active_handler,
        crate::web::routes::users::user_search_handler,
        crate::web::routes::users::user_statistics_handler,
        crate::web::routes::users::user_by_role_handler,
        crate::web::routes::users::user_email_exists_handler,
        crate::web::routes::users::user_get_handler,
        crate::web::routes::users::user_update_handler,
        crate::web::routes::users::user_delete_handler,
        crate::web::routes::users::user_activate_handler,
        crate::web::routes::users::user_deactivate_handler,
        crate::web::routes::courses::course_list_handler,
        crate::web::routes::courses::course_published_handler,
        crate::web::routes::courses::course_featured_handler,
        crate::web::routes::courses::course_search_handler,
        crate::web::routes::courses::course_available_handler,
        crate::web::routes::courses::course_statistics_handler,
        crate::web::routes::courses::course_get_handler,
        crate::web::routes::courses::course_create_handler,
        crate::web::routes::courses::course_update_handler,
        crate::web::routes::courses::course_delete_handler,
        crate::web::routes::courses::course_publish_handler,
        crate::web::routes::courses::course_unpublish_handler,
        crate::web::routes::courses::course_status_handler,
        crate::web::routes::courses::course_rating_handler,
        crate::web::routes::courses::content_list_handler,
        crate::web::routes::courses::content_create_handler,
        crate::web::routes::courses::content_update_handler,
        crate::web::routes::courses::content_delete_handler,
        crate::web::routes::courses::assessment_list_handler,
        crate::web::routes::courses::assessment_create_handler,
        crate::web::routes::enrollments::enrollment_enroll_handler,
        crate::web::routes::enrollments::enrollment_unenroll_handler,
        crate::web::routes::enrollments::enrollment_my_courses_handler,
        crate::web::routes::enrollments::enrollment_check_handler,
        crate::web::routes::enrollments::enrollment_statistics_handler,
        crate::web::routes::enrollments::enrollment_by_student_handler,
        crate::web::routes::enrollments::enrollment_by_course_handler,
        crate::web::routes::enrollments::enrollment_students_handler,
        crate::web::routes::enrollments::enrollment_status_handler,
        crate::web::routes::enrollments::enrollment_progress_handler,
        crate::web::routes::learning_paths::path_list_handler,
        crate::web::routes::learning_paths::path_published_handler,
        crate::web::routes::learning_paths::path_search_handler,
        crate::web::routes::learning_paths::path_get_handler,
        crate::web::routes::learning_paths::path_create_handler,
        crate::web::routes::learning_paths::path_update_handler,
        crate::web::routes::learning_paths::path_delete_handler,
        crate::web::routes::learning_paths::path_publish_handler,
        crate::web::routes::learning_paths::path_unpublish_handler,
        crate::web::routes::learning_paths::path_add_course_handler,
        crate::web::routes::learning_paths::path_remove_course_handler,
        crate::web::routes::learning_paths::path_enroll_handler,
        crate::web::routes::learning_paths::path_progress_handler,
        crate::web::routes::modules::module_list_handler,
        crate::web::routes::modules::module_mine_handler,
        crate::web::routes::modules::module_search_handler,
        crate::web::routes::modules::module_subjects_handler,
        crate::web::routes::modules::module_levels_handler,
        crate::web::routes::modules::module_get_handler,
        crate::web::routes::modules::module_create_handler,
        crate::web::routes::modules::module_update_handler,
        crate::web::routes::modules::module_delete_handler,
        crate::web::routes::modules::module_publish_handler,
        crate::web::routes::modules::module_unpublish_handler,
        crate::web::routes::modules::module_clone_handler,
        crate::web::routes::modules::module_sections_handler,
        crate::web::routes::modules::module_section_create_handler,
        crate::web::routes::sections::section_update_handler,
        crate::web::routes::sections::section_delete_handler,
        crate::web::routes::sections::section_blocks_handler,
        crate::web::routes::sections::section_block_create_handler,
        crate::web::routes::content_blocks::block_update_handler,
        crate::web::routes::content_blocks::block_delete_handler,
        crate::web::routes::progress::progress_record_handler,
        crate::web::routes::progress::progress_course_handler,
        crate::web::routes::progress::progress_course_percentage_handler,
        crate::web::routes::progress::progress_modules_handler,
        crate::web::routes::progress::progress_module_get_handler,
        crate::web::routes::progress::progress_module_record_handler,
        crate::web::routes::progress::progress_instructor_statistics_handler,
        crate::web::routes::progress::progress_instructor_students_handler,
        crate::web::routes::progress::progress_monthly_handler,
        crate::web::routes::progress::progress_delete_handler,
        crate::web::routes::assessments::assessment_get_handler,
        crate::web::routes::assessments::assessment_update_handler,
        crate::web::routes::assessments::assessment_delete_handler,
        crate::web::routes::assessments::question_create_handler,
        crate::web::routes::assessments::question_delete_handler,
        crate::web::routes::assessments::attempt_start_handler,
        crate::web::routes::assessments::attempt_list_handler,
        crate::web::routes::attempts::attempt_get_handler,
        crate::web::routes::attempts::attempt_answer_handler,
        crate::web::routes::attempts::attempt_submit_handler,
        crate::web::routes::attempts::answer_grade_handler,
    ),
    tags(
        (name = "auth", description = "Registration and cookie sessions"),
        (name = "users", description = "Account administration"),
        (name = "courses", description = "Course catalogue and authoring"),
        (name = "enrollments", description = "Course enrollments"),
        (name = "learning-paths", description = "Ordered course sequences"),
        (name = "modules", description = "Self-paced learning modules"),
        (name = "progress", description = "Progress tracking and analytics"),
        (name = "assessments", description = "Assessments, attempts and grading"),
    ),
    modifiers(&CookieAuthModifier),
)]
pub struct ApiDoc;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn document_registers_cookie_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components are generated");
        assert!(components.security_schemes.contains_key("cookie"));
    }

    #[test]
    fn document_lists_nested_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/courses/{id}"));
        assert!(doc.paths.paths.contains_key("/attempts/{id}/submit"));
    }
}
