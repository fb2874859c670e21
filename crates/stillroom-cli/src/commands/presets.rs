use clap::Subcommand;
use serde_json::json;
use stillroom_core::timer::BreathingPattern;
use stillroom_core::{builtin_presets, find_preset};

#[derive(Subcommand)]
pub enum PresetsAction {
    /// List built-in presets
    List,
    /// Show one preset with its breathing guide
    Show {
        /// Preset ID (e.g. "box-breathing")
        id: String,
    },
}

pub fn run(action: PresetsAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        PresetsAction::List => {
            println!("{}", serde_json::to_string_pretty(&builtin_presets())?);
        }
        PresetsAction::Show { id } => {
            let preset = find_preset(&id).ok_or_else(|| format!("unknown preset: {id}"))?;
            let pattern = preset.technique.and_then(BreathingPattern::for_technique);
            let out = json!({
                "preset": preset,
                "breathing": pattern,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
