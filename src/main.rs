// src/main.rs

use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{error, info};
use review_scheduler::{database, pedagogy, repository, ConfigOverrides, Rating, Result, StudyConfig};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "review-scheduler",
    about = "Spaced-repetition study queue over a local exercise catalog",
    version
)]
struct Cli {
    /// SQLite database file (created and seeded on first use)
    #[arg(long, default_value = "review_scheduler.db")]
    db: PathBuf,

    /// JSON file overriding batch sizes and the commit retry budget
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum due reviews per session (overrides the config file)
    #[arg(long)]
    review_batch_size: Option<usize>,

    /// Maximum new exercises per session (overrides the config file)
    #[arg(long)]
    new_batch_size: Option<usize>,

    /// Recompute budget after a lost version race (overrides the config file)
    #[arg(long)]
    max_commit_attempts: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Due reviews plus new exercises for one sitting
    Session {
        #[arg(long)]
        user: String,
    },

    /// The single next exercise to study
    Next {
        #[arg(long)]
        user: String,
    },

    /// Grade an answer and reschedule the exercise
    Submit {
        #[arg(long)]
        user: String,

        #[arg(long)]
        exercise: String,

        #[arg(long)]
        answer: String,

        /// Time taken to answer, in milliseconds
        #[arg(long)]
        response_time_ms: Option<i64>,
    },

    /// Reschedule from a self-assessed rating: 1 Again, 2 Hard, 3 Good, 4 Easy
    Rate {
        #[arg(long)]
        user: String,

        #[arg(long)]
        exercise: String,

        #[arg(long)]
        rating: i64,
    },

    /// Experience and review counters for a user
    Stats {
        #[arg(long)]
        user: String,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = StudyConfig::load_or_default(cli.config.as_deref())?.with_overrides(ConfigOverrides {
        review_batch_size: cli.review_batch_size,
        new_batch_size: cli.new_batch_size,
        max_commit_attempts: cli.max_commit_attempts,
    });

    info!("Database path: {:?}", cli.db);
    let conn = Connection::open(&cli.db)?;
    database::init_db(&conn)?;

    let now = Utc::now();
    match cli.command {
        Commands::Session { user } => print_json(&pedagogy::build_session(&conn, &config, &user, now)?),
        Commands::Next { user } => print_json(&pedagogy::next_exercise(&conn, &user, now)?),
        Commands::Submit {
            user,
            exercise,
            answer,
            response_time_ms,
        } => print_json(&pedagogy::submit_answer(
            &conn,
            &config,
            &user,
            &exercise,
            &answer,
            response_time_ms,
            now,
        )?),
        Commands::Rate {
            user,
            exercise,
            rating,
        } => {
            let rating = Rating::try_from(rating)?;
            print_json(&pedagogy::record_rating(&conn, &config, &user, &exercise, rating, now)?)
        }
        Commands::Stats { user } => print_json(&repository::get_user_stats(&conn, &user, now)?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
