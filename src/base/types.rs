use thiserror::Error;

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// Failures of the response-set core.
///
/// These are the only errors that cross the store and controller seams; the
/// adapters fold them into [`Err`] at the edges of the application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// No record exists for the message.
    #[error("no response record exists for message `{0}`")]
    NotFound(String),
    /// A record already exists for the message.
    #[error("a response record already exists for message `{0}`")]
    AlreadyExists(String),
    /// The underlying storage failed, or returned a row that could not be decoded.
    #[error("storage failure: {0}")]
    Storage(String),
    /// A prompt was configured with a degenerate group set.
    #[error("invalid prompt configuration: {0}")]
    InvalidConfiguration(String),
    /// The pressed action does not name a group of the message.
    #[error("message `{message_id}` has no group for action `{action_id}`")]
    UnknownAction { message_id: String, action_id: String },
}

/// Result alias for the response-set core.
pub type ResponseResult<T> = Result<T, ResponseError>;

/// A single button press: `user_id` pressed `action_id` on `message_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleEvent {
    pub message_id: String,
    pub user_id: String,
    pub action_id: String,
}

impl ToggleEvent {
    pub fn new(message_id: impl Into<String>, user_id: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            user_id: user_id.into(),
            action_id: action_id.into(),
        }
    }
}

/// One labeled field for the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedGroup {
    pub name: String,
    pub members: Vec<String>,
}
