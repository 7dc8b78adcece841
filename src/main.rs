use anyhow::{Result, bail};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use footy_pipeline::aliases::{get_aliases, register_alias};
use footy_pipeline::config::{AppConfig, FixtureProvider, League};
use footy_pipeline::dashboard::{load_dashboard_rows, render_plain};
use footy_pipeline::db;
use footy_pipeline::fixture_match::{DEFAULT_TOLERANCE_MINUTES, match_fixture};
use footy_pipeline::logging::{LogSettings, init_logging};
use footy_pipeline::pipeline::{self, DEFAULT_CHUNK_DAYS, DEFAULT_DAYS_AHEAD, DailyOptions, PipelineContext};
use footy_pipeline::providers::understat;

#[derive(Parser)]
#[command(name = "footy")]
#[command(about = "Football fixtures, odds, xG and Elo probabilities in SQLite", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// Fetch fixtures and odds, update ratings and write probabilities
    RunDaily {
        /// Initialise the schema first
        #[arg(long)]
        init: bool,
        /// Days ahead to fetch fixtures for
        #[arg(long, default_value_t = DEFAULT_DAYS_AHEAD)]
        days: i64,
        /// League keys (EPL, LaLiga, SerieA, Bundesliga)
        #[arg(long, num_args = 1.., value_delimiter = ',', default_value = "EPL")]
        leagues: Vec<League>,
        /// Fixture provider, overriding FIXTURE_PROVIDER
        #[arg(long)]
        provider: Option<FixtureProvider>,
    },
    /// Load historical fixtures for a date range
    Backfill {
        #[arg(long)]
        from: NaiveDate,
        /// Defaults to today
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, num_args = 1.., value_delimiter = ',', default_value = "EPL")]
        leagues: Vec<League>,
        #[arg(long, default_value_t = DEFAULT_CHUNK_DAYS)]
        chunk_days: i64,
    },
    /// Seed team aliases from football-data.org team lists
    SeedAliases {
        #[arg(long, num_args = 1.., value_delimiter = ',', default_value = "EPL")]
        leagues: Vec<League>,
    },
    /// Register extra names for a team id
    RegisterAlias {
        team_id: String,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Resolve an odds quote to a stored fixture id
    Match {
        #[arg(long)]
        league: League,
        /// ISO-8601 kickoff, e.g. 2025-09-01T15:00:00Z
        #[arg(long)]
        kickoff: String,
        #[arg(long)]
        home: String,
        #[arg(long)]
        away: String,
        #[arg(long, default_value_t = DEFAULT_TOLERANCE_MINUTES)]
        tolerance: i64,
    },
    /// Store Understat xG for a fixture
    Xg {
        #[arg(long)]
        fixture: String,
        #[arg(long)]
        understat_id: String,
    },
    /// Print upcoming fixtures with probabilities
    Dashboard,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let _guard = init_logging(&LogSettings {
        dir: config.data_dir.clone(),
        console: true,
    });

    match cli.command {
        Commands::Init => {
            db::open_db(&config.db_path)?;
            info!(db = %config.db_path.display(), "schema initialised");
            println!("Initialised {}", config.db_path.display());
        }
        Commands::RunDaily {
            init,
            days,
            leagues,
            provider,
        } => {
            // Opening the database always creates the schema; --init only logs it.
            let mut ctx = PipelineContext::open(config)?;
            if init {
                info!("schema initialised");
            }
            let opts = DailyOptions {
                leagues,
                days_ahead: days,
                provider,
            };
            let summary = pipeline::run_daily(&mut ctx, &opts, Utc::now())?;
            println!(
                "run {}: fixtures={} odds={} rated={} probs={}",
                summary.run_id,
                summary.counts.fixtures_upserted,
                summary.counts.odds_written,
                summary.counts.fixtures_rated,
                summary.counts.probs_written
            );
            for err in &summary.errors {
                println!("  error: {err}");
            }
        }
        Commands::Backfill {
            from,
            to,
            leagues,
            chunk_days,
        } => {
            let to = to.unwrap_or_else(|| Utc::now().date_naive());
            if from > to {
                bail!("--from {from} is after --to {to}");
            }
            let mut ctx = PipelineContext::open(config)?;
            let summary = pipeline::backfill(&mut ctx, &leagues, from, to, chunk_days)?;
            println!(
                "Backfill {from}..{to}: fixtures={} rated={} failed_chunks={}",
                summary.fixtures_upserted,
                summary.fixtures_rated,
                summary.failed_chunks.len()
            );
            for chunk in &summary.failed_chunks {
                println!("  failed: {chunk}");
            }
        }
        Commands::SeedAliases { leagues } => {
            let ctx = PipelineContext::open(config)?;
            let added = pipeline::seed_aliases(&ctx, &leagues)?;
            println!("Aliases added: {added}");
        }
        Commands::RegisterAlias { team_id, names } => {
            let conn = db::open_db(&config.db_path)?;
            let added = register_alias(&conn, &team_id, &names)?;
            let all = get_aliases(&conn, &team_id)?;
            println!("{team_id}: {added} new, aliases = {all:?}");
        }
        Commands::Match {
            league,
            kickoff,
            home,
            away,
            tolerance,
        } => {
            let conn = db::open_db(&config.db_path)?;
            match match_fixture(&conn, league.key(), &kickoff, &home, &away, tolerance)? {
                Some(fixture_id) => println!("{fixture_id}"),
                None => println!("no match"),
            }
        }
        Commands::Xg {
            fixture,
            understat_id,
        } => {
            let ctx = PipelineContext::open(config)?;
            let written =
                understat::upsert_match_xg(&ctx.conn, &ctx.client, &ctx.config, &fixture, &understat_id)?;
            println!("xG rows written: {written}");
        }
        Commands::Dashboard => {
            let conn = db::open_db(&config.db_path)?;
            let rows = load_dashboard_rows(&conn, Utc::now().date_naive())?;
            print!("{}", render_plain(&rows));
        }
    }
    Ok(())
}
