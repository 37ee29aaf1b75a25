use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tickerdesk_core::backend::HttpProfileBackend;
use tickerdesk_core::codec;
use tickerdesk_core::config::Settings;
use tickerdesk_core::domain::profile::ProfileId;
use tickerdesk_core::listing::HttpListingProvider;
use tickerdesk_core::prediction::HttpPredictionClient;
use tickerdesk_core::storage::FileCacheStore;
use tickerdesk_core::sync::{
    GenerationOutcome, Notice, Notifier, PredictionOrchestrator, ProfileStore, TickerCache,
};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod render;

#[derive(Debug, Parser)]
#[command(name = "tickerdesk")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show all profiles, unassigned first.
    List,
    /// Create an empty profile.
    Create,
    Delete { id: ProfileId },
    /// Bind a ticker to a profile and fetch its baseline plot.
    Assign { id: ProfileId, ticker: String },
    /// Generate predictive plots, concurrently across the given profiles.
    Predict {
        #[arg(required = true)]
        ids: Vec<ProfileId>,
    },
    /// Switch a profile between baseline and predictive view (not persisted).
    Toggle { id: ProfileId },
    /// Print the decoded plot series of a profile.
    Plot {
        id: ProfileId,
        #[arg(long)]
        predictive: bool,
    },
    /// Show selectable ticker symbols.
    Tickers {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        search: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let notifier = Notifier::default();
    let mut notices = notifier.subscribe();

    let res = run(args.command, &settings, notifier).await;
    print_notices(&mut notices);

    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "command failed");
    }
    res
}

async fn run(command: Command, settings: &Settings, notifier: Notifier) -> anyhow::Result<()> {
    if let Command::Tickers { limit, search } = &command {
        return show_tickers(settings, notifier, *limit, search.as_deref()).await;
    }

    let backend = Arc::new(HttpProfileBackend::from_settings(settings)?);
    let prediction = Arc::new(HttpPredictionClient::from_settings(settings)?);
    let store = Arc::new(ProfileStore::new(
        backend,
        prediction.clone(),
        notifier.clone(),
    ));
    let orchestrator = Arc::new(PredictionOrchestrator::new(
        store.clone(),
        prediction,
        notifier,
    ));

    store.sync().await.context("initial profile sync failed")?;

    match command {
        Command::List => {
            let snapshot = store.list();
            if snapshot.is_empty() {
                println!("no profiles");
            }
            for profile in snapshot.profiles() {
                println!("{}", render::profile_line(profile));
            }
        }
        Command::Create => {
            let profile = store.create().await?;
            println!("created {}", render::profile_line(&profile));
        }
        Command::Delete { id } => {
            store.delete(id).await?;
            println!("deleted #{id}");
        }
        Command::Assign { id, ticker } => {
            let profile = store.assign_ticker(id, &ticker).await?;
            println!("{}", render::profile_line(&profile));
        }
        Command::Predict { ids } => predict_all(&orchestrator, ids).await?,
        Command::Toggle { id } => {
            let active = orchestrator.toggle_view(id)?;
            println!("#{id} view={}", if active { "predictive" } else { "baseline" });
            if orchestrator.needs_generation(id) {
                println!("no predictive plot yet; run `tickerdesk predict {id}`");
            }
        }
        Command::Plot { id, predictive } => {
            let profile = store
                .get(id)
                .with_context(|| format!("profile {id} not found"))?;
            let raw = if predictive {
                profile.predictive_plot.as_deref()
            } else {
                profile.baseline_plot.as_deref()
            };
            match codec::decode(raw) {
                Some(series) => println!("{}", serde_json::to_string_pretty(&series)?),
                None => println!("#{id}: nothing to plot"),
            }
            if let Some(risk) = &profile.risk {
                println!("risk {}", render::risk_summary(risk));
            }
        }
        // Handled before connecting.
        Command::Tickers { .. } => {}
    }
    Ok(())
}

async fn predict_all(
    orchestrator: &Arc<PredictionOrchestrator>,
    ids: Vec<ProfileId>,
) -> anyhow::Result<()> {
    let mut tasks = tokio::task::JoinSet::new();
    for id in ids {
        let orchestrator = orchestrator.clone();
        tasks.spawn(async move { (id, orchestrator.generate_predictive_plot(id).await) });
    }

    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        let (id, res) = joined.context("prediction task panicked")?;
        match res {
            Ok(GenerationOutcome::Completed) => println!("#{id}: predictive plot generated"),
            Ok(GenerationOutcome::AlreadyGenerating) => println!("#{id}: already generating"),
            Ok(GenerationOutcome::AlreadyPresent) => println!("#{id}: predictive plot present"),
            // Already reported through the notifier.
            Err(_) => failed += 1,
        }
    }

    anyhow::ensure!(failed == 0, "{failed} prediction(s) failed");
    Ok(())
}

async fn show_tickers(
    settings: &Settings,
    notifier: Notifier,
    limit: usize,
    search: Option<&str>,
) -> anyhow::Result<()> {
    let listing = Arc::new(HttpListingProvider::from_settings(settings)?);
    let store = Arc::new(FileCacheStore::new(settings.ticker_cache_dir.clone()));
    let cache = TickerCache::new(listing, store, notifier);

    let tickers = cache.get_tickers().await;
    let prefix = search.map(str::to_ascii_uppercase);
    let matching: Vec<&String> = tickers
        .iter()
        .filter(|t| prefix.as_deref().map_or(true, |p| t.starts_with(p)))
        .collect();

    for ticker in matching.iter().take(limit) {
        println!("{ticker}");
    }
    println!("{} of {} shown", matching.len().min(limit), tickers.len());
    Ok(())
}

fn print_notices(rx: &mut broadcast::Receiver<Notice>) {
    loop {
        match rx.try_recv() {
            Ok(notice) => eprintln!("{notice}"),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                eprintln!("({skipped} more notices dropped)");
            }
            Err(_) => break,
        }
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
