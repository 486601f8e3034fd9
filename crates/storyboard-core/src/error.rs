use std::fmt;

/// Machine-readable error codes for scripts and front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    ProjectNotFound,
    StoryNotFound,
    PersonNotFound,
    StatusNotFound,
    RoleNotFound,
    ForeignStory,
    EmptyBulkInput,
    InvalidOrderField,
    CorruptStore,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ProjectNotFound => "E2001",
            Self::StoryNotFound => "E2002",
            Self::PersonNotFound => "E2003",
            Self::StatusNotFound => "E2004",
            Self::RoleNotFound => "E2005",
            Self::ForeignStory => "E2006",
            Self::EmptyBulkInput => "E2007",
            Self::InvalidOrderField => "E2008",
            Self::CorruptStore => "E3001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Store not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::ProjectNotFound => "Project not found",
            Self::StoryNotFound => "User story not found",
            Self::PersonNotFound => "Person not found",
            Self::StatusNotFound => "Status not found",
            Self::RoleNotFound => "Role not found",
            Self::ForeignStory => "User story belongs to another project",
            Self::EmptyBulkInput => "Bulk input contains no stories",
            Self::InvalidOrderField => "Invalid order field",
            Self::CorruptStore => "Corrupt SQLite store",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `sb init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .storyboard/config.toml and retry."),
            Self::ProjectNotFound => Some("List projects with `sb project list`."),
            Self::StoryNotFound | Self::PersonNotFound => None,
            Self::StatusNotFound => Some("Add the status with `sb status add` first."),
            Self::RoleNotFound => Some("Add the role with `sb role add` first."),
            Self::ForeignStory => Some("Pass stories that belong to the selected project."),
            Self::EmptyBulkInput => Some("Provide one story subject per non-blank line."),
            Self::InvalidOrderField => Some("Use one of: backlog, sprint, kanban."),
            Self::CorruptStore => Some("Move the store aside and run `sb init` again."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Domain failures raised by store services.
///
/// Raw SQLite failures are not represented here; they travel as
/// `anyhow::Error` with context attached at the call site.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store not initialized at {}", .0.display())]
    NotInitialized(std::path::PathBuf),

    #[error("invalid config file {}", .0.display())]
    ConfigParse(std::path::PathBuf),

    #[error("store at {} is not a readable storyboard database", .0.display())]
    CorruptStore(std::path::PathBuf),

    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    #[error("user story {0} not found")]
    StoryNotFound(i64),

    #[error("person '{0}' not found")]
    PersonNotFound(String),

    #[error("status '{0}' not found in project")]
    StatusNotFound(String),

    #[error("role '{0}' not found in project")]
    RoleNotFound(String),

    #[error("user story {story_id} does not belong to project {project_id}")]
    ForeignStory { story_id: i64, project_id: i64 },

    #[error("bulk input contains no story subjects")]
    EmptyBulkInput,

    #[error("unknown order field '{0}'")]
    InvalidOrderField(String),
}

impl StoreError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized(_) => ErrorCode::NotInitialized,
            Self::ConfigParse(_) => ErrorCode::ConfigParseError,
            Self::CorruptStore(_) => ErrorCode::CorruptStore,
            Self::ProjectNotFound(_) => ErrorCode::ProjectNotFound,
            Self::StoryNotFound(_) => ErrorCode::StoryNotFound,
            Self::PersonNotFound(_) => ErrorCode::PersonNotFound,
            Self::StatusNotFound(_) => ErrorCode::StatusNotFound,
            Self::RoleNotFound(_) => ErrorCode::RoleNotFound,
            Self::ForeignStory { .. } => ErrorCode::ForeignStory,
            Self::EmptyBulkInput => ErrorCode::EmptyBulkInput,
            Self::InvalidOrderField(_) => ErrorCode::InvalidOrderField,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
