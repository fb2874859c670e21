// Actor identity: who sessions and settings belong to.
// Anonymous token format: "anon-<uuid>"

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

const ACTOR_ID_FILE: &str = "actor_id.txt";
const ANONYMOUS_PREFIX: &str = "anon-";

/// Settings key used when no user id is known.
pub const ANONYMOUS_KEY: &str = "anonymous";

/// Error type for actor ID operations
#[derive(Debug, thiserror::Error)]
pub enum ActorIdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid actor ID format: {0}")]
    InvalidFormat(String),
}

/// The user a session or settings record belongs to. `None` is the
/// anonymous actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ActorKey(Option<String>);

impl ActorKey {
    /// Empty or blank ids are treated as anonymous.
    pub fn new(user_id: Option<String>) -> Self {
        Self(user_id.filter(|u| !u.trim().is_empty()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(Some(id.into()))
    }

    pub fn user_id(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_none()
    }

    /// Key under which the actor's settings are stored.
    pub fn storage_key(&self) -> &str {
        self.0.as_deref().unwrap_or(ANONYMOUS_KEY)
    }

    /// Whether a record owned by `user_id` belongs to this actor.
    /// The anonymous actor only sees records without a user id.
    pub fn matches(&self, user_id: Option<&str>) -> bool {
        let owner = user_id.filter(|u| !u.is_empty());
        match (&self.0, owner) {
            (Some(me), Some(owner)) => me == owner,
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ActorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_key())
    }
}

/// Get or create the anonymous actor token in `dir`.
///
/// The token is stable across launches so history and settings follow the
/// same device even without an account.
///
/// # Errors
/// Fails on I/O errors, or when the stored token has the wrong prefix.
pub fn load_or_create_anonymous_id_at(dir: &Path) -> Result<String, ActorIdError> {
    let id_path = dir.join(ACTOR_ID_FILE);

    if id_path.exists() {
        let content = fs::read_to_string(&id_path)?;
        let actor_id = content.trim().to_string();
        if actor_id.starts_with(ANONYMOUS_PREFIX) {
            return Ok(actor_id);
        }
        return Err(ActorIdError::InvalidFormat(actor_id));
    }

    let actor_id = format!("{}{}", ANONYMOUS_PREFIX, Uuid::new_v4());

    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }

    let mut file = fs::File::create(&id_path)?;
    writeln!(file, "{}", actor_id)?;
    tracing::debug!(path = %id_path.display(), "created anonymous actor id");

    Ok(actor_id)
}
