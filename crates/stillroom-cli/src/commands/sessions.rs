use clap::Subcommand;
use serde_json::json;

use super::open_manager;

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List recent sessions, newest first
    List {
        /// Maximum number of sessions to print
        #[arg(long, short, default_value = "20")]
        limit: usize,
    },
    /// Show one session
    Show {
        /// Session ID
        id: String,
    },
    /// Delete one session
    Delete {
        /// Session ID
        id: String,
    },
    /// Delete every session of the current user
    Clear {
        /// Required to actually delete
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(action: SessionsAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut manager = open_manager()?;

    match action {
        SessionsAction::List { limit } => {
            let sessions = manager.recent(limit);
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        SessionsAction::Show { id } => {
            let session = manager
                .session(&id)?
                .ok_or_else(|| format!("session not found: {id}"))?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        SessionsAction::Delete { id } => {
            if !manager.delete_session(&id)? {
                return Err(format!("session not found: {id}").into());
            }
            println!("{}", json!({ "success": true }));
        }
        SessionsAction::Clear { yes } => {
            if !yes {
                return Err("refusing to delete all sessions without --yes".into());
            }
            let removed = manager.clear_all_data()?;
            println!("{}", json!({ "removed": removed }));
        }
    }
    Ok(())
}
