use chrono::Local;
use studytimer_core::remote;
use studytimer_core::timer::format_hms;
use studytimer_core::Config;

pub async fn run(json: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let user_id = super::require_user(config)?;
    let store = remote::from_config(config)?;
    let sessions = store.list_sessions(&user_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No study sessions yet.");
        return Ok(());
    }

    for session in &sessions {
        let started = session.started_at.with_timezone(&Local);
        let studied = match session.ended_at {
            Some(ended) => {
                let wall = ended
                    .signed_duration_since(session.started_at)
                    .num_seconds()
                    .max(0) as u64;
                format_hms(wall.saturating_sub(session.total_break_secs))
            }
            None => "in progress".to_string(),
        };
        let productivity = session
            .productivity
            .map(|p| format!("{p}/10"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<12}  breaks {:<12}  {:>5}  {}",
            started.format("%Y-%m-%d %H:%M"),
            studied,
            format_hms(session.total_break_secs),
            productivity,
            session.note.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}
