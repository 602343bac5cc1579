use clap::{Parser, Subcommand, ValueEnum};
use lms::model::entity::{
    Course, CourseCreate, LearningPath, UserEntity, UserEntityCreateUpdate,
};
use lms::model::{CrudRepository, DatabaseError, DbConnection, ModelManager, ResourceType, Role};
use lms::web::AuthenticatedUser;

#[derive(Parser, Debug)]
#[command(about = "CLI tool for seeding the LMS database", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseCommands,
    },

    /// Manage learning paths
    Path {
        #[command(subcommand)]
        action: PathCommands,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum RoleArg {
    Student,
    Instructor,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Student => Role::Student,
            RoleArg::Instructor => Role::Instructor,
            RoleArg::Admin => Role::Admin,
        }
    }
}

/// User management
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long, value_enum, default_value_t = RoleArg::Student)]
        role: RoleArg,
    },
}

/// Course management
#[derive(Subcommand, Debug)]
pub enum CourseCommands {
    Add {
        /// Email of the instructor that will own the course
        #[arg(long)]
        instructor_email: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        max_students: Option<i32>,
        #[arg(long, default_value_t = 0)]
        price_cents: i64,
    },
}

/// Learning path management
#[derive(Subcommand, Debug)]
pub enum PathCommands {
    /// Append a course to the end of a learning path
    Link {
        #[arg(long)]
        path_title: String,
        #[arg(long)]
        course_title: String,
    },
}

async fn id_by_title(
    mm: &ModelManager,
    query: &'static str,
    title: &str,
    resource: ResourceType,
) -> Result<uuid::Uuid, DatabaseError> {
    let id: Option<uuid::Uuid> = sqlx::query_scalar(query)
        .bind(title)
        .fetch_optional(mm.executor())
        .await?;
    id.ok_or(DatabaseError::NotFound(resource))
}

#[tokio::main]
async fn main() -> lms::error::AppResult<()> {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    let database_url = std::env::var("DATABASE_URL").map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "DATABASE_URL is not set")
    })?;
    let db_con = DbConnection::connect(&database_url)?;
    let mm = ModelManager::new(db_con);
    let admin = AuthenticatedUser::admin();

    match args.command {
        Commands::User { action } => match action {
            UserCommands::Add {
                email,
                password,
                first_name,
                last_name,
                role,
            } => {
                let user = UserEntity::create(
                    &mm,
                    &admin,
                    UserEntityCreateUpdate {
                        first_name,
                        last_name,
                        email,
                        password_hash: Some(lms::auth::hash_password(&password)?),
                        role: role.into(),
                        ..Default::default()
                    },
                )
                .await?;
                println!("User created: {} ({:?})", user.email(), user.role());
            }
        },

        Commands::Course { action } => match action {
            CourseCommands::Add {
                instructor_email,
                title,
                description,
                category,
                max_students,
                price_cents,
            } => {
                let instructor = UserEntity::find_by_email(&mm, &admin, &instructor_email)
                    .await?
                    .ok_or(DatabaseError::NotFound(ResourceType::User))?;
                let actor = AuthenticatedUser::new(instructor.id(), instructor.role());

                let course = Course::create(
                    &mm,
                    &actor,
                    CourseCreate {
                        title,
                        description,
                        short_description: None,
                        category,
                        level: None,
                        language: None,
                        duration_hours: None,
                        price_cents,
                        max_students,
                        start_date: None,
                        end_date: None,
                        tags: vec![],
                        is_featured: false,
                    },
                )
                .await?;
                println!("Course created: {} ({})", course.title(), course.id());
            }
        },

        Commands::Path { action } => match action {
            PathCommands::Link {
                path_title,
                course_title,
            } => {
                let path_id = id_by_title(
                    &mm,
                    "SELECT id FROM learning_paths WHERE title = $1",
                    &path_title,
                    ResourceType::LearningPath,
                )
                .await?;
                let course_id = id_by_title(
                    &mm,
                    "SELECT id FROM courses WHERE title = $1",
                    &course_title,
                    ResourceType::Course,
                )
                .await?;

                let path = LearningPath::find_by_id(&mm, &admin, path_id)
                    .await?
                    .ok_or(DatabaseError::NotFound(ResourceType::LearningPath))?;
                path.add_course(&mm, course_id).await?;
                println!("Course `{course_title}` appended to `{path_title}`");
            }
        },
    }

    Ok(())
}
