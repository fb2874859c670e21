use clap::{Args, Subcommand};
use stillroom_core::SettingsPatch;

use super::open_manager;

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the current settings
    Get,
    /// Change one or more settings
    Set(SettingsArgs),
}

#[derive(Args)]
pub struct SettingsArgs {
    /// Ring a bell at fixed intervals during practice
    #[arg(long)]
    interval_bells: Option<bool>,
    /// Minutes between interval bells
    #[arg(long)]
    interval_duration: Option<u32>,
    #[arg(long)]
    sound_enabled: Option<bool>,
    /// Bell sound name (e.g. "tibetan")
    #[arg(long)]
    bell_sound: Option<String>,
    /// Volume, 0-100
    #[arg(long)]
    volume: Option<u32>,
    #[arg(long)]
    visual_cues: Option<bool>,
    #[arg(long)]
    auto_fade_interface: Option<bool>,
    /// Seconds before the interface fades
    #[arg(long)]
    fade_duration: Option<u32>,
}

impl From<SettingsArgs> for SettingsPatch {
    fn from(a: SettingsArgs) -> Self {
        SettingsPatch {
            interval_bells: a.interval_bells,
            interval_duration: a.interval_duration,
            sound_enabled: a.sound_enabled,
            bell_sound: a.bell_sound,
            volume: a.volume,
            visual_cues: a.visual_cues,
            auto_fade_interface: a.auto_fade_interface,
            fade_duration: a.fade_duration,
        }
    }
}

pub fn run(action: SettingsAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut manager = open_manager()?;

    match action {
        SettingsAction::Get => {
            println!("{}", serde_json::to_string_pretty(&manager.settings())?);
        }
        SettingsAction::Set(args) => {
            let patch = SettingsPatch::from(args);
            if patch.is_empty() {
                return Err("nothing to set; pass at least one option (see --help)".into());
            }
            let settings = manager.save_settings(&patch)?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }
    Ok(())
}
