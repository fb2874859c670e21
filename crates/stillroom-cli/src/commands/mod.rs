pub mod config;
pub mod practice;
pub mod presets;
pub mod sessions;
pub mod settings;
pub mod stats;

use std::error::Error;
use std::path::Path;

use serde_json::json;
use stillroom_core::error::Result as CoreResult;
use stillroom_core::storage::{data_dir, open_store, Config};
use stillroom_core::{load_or_create_anonymous_id_at, ActorKey, SessionManager};

/// Settings written here when the store rejects or cannot take them.
const SETTINGS_FALLBACK_FILE: &str = "settings.json";

/// `client.user_id` when set, otherwise this machine's anonymous token.
fn resolve_actor(config: &Config, dir: &Path) -> CoreResult<ActorKey> {
    let configured = config.client.user_id.trim();
    if !configured.is_empty() {
        return Ok(ActorKey::user(configured));
    }
    Ok(ActorKey::user(load_or_create_anonymous_id_at(dir)?))
}

/// Session manager over the configured store, acting for the resolved actor.
pub(crate) fn open_manager() -> CoreResult<SessionManager> {
    let config = Config::load()?;
    let dir = data_dir()?;
    let actor = resolve_actor(&config, &dir)?;
    let store = open_store(&config)?;
    Ok(SessionManager::new(store, actor).with_settings_fallback(dir.join(SETTINGS_FALLBACK_FILE)))
}

pub fn whoami() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let dir = data_dir()?;
    let actor = resolve_actor(&config, &dir)?;
    let store = if config.client.api_base_url.trim().is_empty() {
        serde_json::to_value(config.storage.backend)?
    } else {
        json!(config.client.api_base_url)
    };
    let out = json!({
        "userId": actor.user_id(),
        "anonymous": config.client.user_id.trim().is_empty(),
        "store": store,
        "dataDir": dir.display().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
