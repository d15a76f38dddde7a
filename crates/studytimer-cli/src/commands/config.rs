use clap::Subcommand;
use studytimer_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print a value; prints nothing when the key is unset
    Get {
        /// Dot-path key (e.g. "identity.user_id", "timer.tick_interval_ms")
        key: String,
    },
    /// Validate and store a value
    Set {
        /// Dot-path key
        key: String,
        /// New value
        value: String,
    },
    /// Clear an optional value such as "remote.api_key"
    Unset {
        /// Dot-path key
        key: String,
    },
    /// List every key
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Overwrite the config file with defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            if let Some(value) = Config::load()?.get(&key)? {
                println!("{value}");
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.apply(&key, &value)?;
            config.save()?;
            tracing::info!(key = %key, "config updated");
            println!("{key} = {}", config.get(&key)?.unwrap_or_default());
        }
        ConfigAction::Unset { key } => {
            let mut config = Config::load()?;
            config.unset(&key)?;
            config.save()?;
            println!("{key} unset");
        }
        ConfigAction::List { json } => {
            let config = Config::load()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
                return Ok(());
            }
            for (key, value) in config.entries() {
                match value {
                    Some(value) => println!("{key} = {value}"),
                    None => println!("{key} ="),
                }
            }
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
