use chrono::{Local, NaiveDate, Utc};
use clap::Subcommand;
use studytimer_core::{Config, Database, LogBook, Score};

#[derive(Subcommand)]
pub enum LogAction {
    /// Rate last night's sleep (one entry per day; logging again replaces it)
    Sleep {
        /// Sleep quality 1-10
        score: i64,
        /// Free-form note
        #[arg(long, default_value = "")]
        note: String,
        /// Day to log for (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Record current mood
    Mood {
        /// Mood 1-10
        score: i64,
        /// Free-form note
        #[arg(long, default_value = "")]
        note: String,
    },
    /// List sleep and mood logs
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: LogAction, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let user_id = super::require_user(config)?;
    let db = Database::open()?;

    match action {
        LogAction::Sleep { score, note, date } => {
            let score = Score::new(score)?;
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let mut book = LogBook::load(&db, user_id)?;
            let log = book.log_sleep(date, score, &note)?;
            println!("{}", serde_json::to_string_pretty(&log)?);
        }
        LogAction::Mood { score, note } => {
            let score = Score::new(score)?;
            let mut book = LogBook::load(&db, user_id)?;
            let log = book.log_mood(Utc::now(), score, &note)?;
            println!("{}", serde_json::to_string_pretty(&log)?);
        }
        LogAction::List { json } => {
            if json {
                let bundle = db.all_logs(&user_id)?;
                println!("{}", serde_json::to_string_pretty(&bundle)?);
                return Ok(());
            }

            let book = LogBook::load(&db, user_id)?;
            let sleep = book.sleep();
            let mood = book.mood();
            if sleep.is_empty() && mood.is_empty() {
                println!("No logs yet.");
                return Ok(());
            }
            if !sleep.is_empty() {
                println!("Sleep:");
                for log in sleep {
                    println!("  {}  {:>2}/10  {}", log.date, log.score.get(), log.note);
                }
            }
            if !mood.is_empty() {
                println!("Mood:");
                for log in mood {
                    let at = log.at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
                    println!("  {at}  {:>2}/10  {}", log.score.get(), log.note);
                }
            }
        }
    }
    Ok(())
}
