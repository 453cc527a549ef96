//! Config command - show or create the configuration file.

use anyhow::{bail, Context, Result};
use vocab_common::VocabConfig;

use super::{ConfigAction, GlobalOpts};

pub fn run(opts: &GlobalOpts, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = opts.load_config()?;
            let rendered = toml::to_string_pretty(&config.redacted())
                .context("Failed to serialize configuration")?;
            println!("{}", rendered);
            println!("# state: {}", config.paths.state_dir().display());
            Ok(())
        }
        ConfigAction::Init { force } => {
            let path = match &opts.config {
                Some(p) => p.clone(),
                None => VocabConfig::user_config_path()
                    .context("Could not determine the user config directory")?,
            };
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }

            let mut config = VocabConfig::default();
            config.paths.state_dir = opts.state_dir.clone();
            config.save_to(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}
