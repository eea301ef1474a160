use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use estate_scout::api::ApiClient;
use estate_scout::cache::{FileStorage, SilentCache, SilentCacheOptions, Storage};
use estate_scout::config::{Config, TOKEN_SLOT};
use estate_scout::filter::{SearchFilters, DEFAULT_MAX_WALKING_MINUTES, DEFAULT_PRICE_RANGE};
use estate_scout::models::{HouseType, Listing};
use estate_scout::store::Store;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LISTINGS_CACHE_KEY: &str = "houses";

#[derive(Parser)]
#[command(name = "estate-scout", about = "Browse student rentals from the terminal")]
struct Cli {
    /// Backend origin
    #[arg(long, env = "ESTATE_API_URL")]
    api_url: Option<String>,

    /// Bearer token for authenticated calls
    #[arg(long, env = "ESTATE_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List houses, optionally filtered
    Listings {
        #[command(flatten)]
        filters: FilterArgs,
        /// Write the result as JSON
        #[arg(long)]
        output: Option<std::path::PathBuf>,
    },
    /// Free-text search over title, estate and amenities
    Search { query: String },
    /// Show one house with its reviews
    Show { id: String },
    /// Price trends, popular estates and trending searches
    Insights,
    /// Unread notifications
    Notifications,
    /// Keep the listings cache fresh and print changes until Ctrl-C
    Watch,
    /// Remember a token for later runs
    Login { token: String },
    /// Forget the remembered token
    Logout,
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long)]
    min_price: Option<u64>,
    #[arg(long)]
    max_price: Option<u64>,
    /// House type (bedsitter, single, 1BR, 2BR, 3BR, hostel); repeatable
    #[arg(long = "type")]
    house_types: Vec<String>,
    /// Estate name; repeatable
    #[arg(long = "estate")]
    estates: Vec<String>,
    /// Required amenity; repeatable
    #[arg(long = "amenity")]
    amenities: Vec<String>,
    #[arg(long, default_value_t = 0.0)]
    min_rating: f32,
    #[arg(long, default_value_t = 0)]
    min_safety: u8,
    #[arg(long)]
    verified: bool,
    /// Maximum walking time to campus in minutes
    #[arg(long)]
    max_walk: Option<u32>,
}

impl FilterArgs {
    fn into_filters(self) -> SearchFilters {
        SearchFilters {
            price_range: (
                self.min_price.unwrap_or(DEFAULT_PRICE_RANGE.0),
                self.max_price.unwrap_or(DEFAULT_PRICE_RANGE.1),
            ),
            house_types: self.house_types.iter().map(|t| HouseType::from(t.as_str())).collect(),
            max_walking_minutes: self.max_walk.unwrap_or(DEFAULT_MAX_WALKING_MINUTES),
            amenities: self.amenities,
            min_rating: self.min_rating,
            min_safety_rating: self.min_safety,
            verified_only: self.verified,
            estates: self.estates,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Loads .env before clap reads its env fallbacks
    let config = Config::load();
    let cli = Cli::parse();
    let files = FileStorage::new(&config.cache_dir)?;
    info!("Cache directory: {}", files.dir().display());
    let storage: Arc<dyn Storage> = Arc::new(files);

    let token = cli
        .token
        .clone()
        .or_else(|| config.api_token.clone())
        .or_else(|| storage.get_item(TOKEN_SLOT).ok().flatten());
    let api_url = cli.api_url.clone().unwrap_or_else(|| config.api_url.clone());
    let client = ApiClient::new(&api_url, config.request_timeout)?.with_token(token);
    let store = Store::new(config.toast_duration);

    match cli.command {
        Command::Listings { filters, output } => {
            let listings = cached_listings(&client, storage.clone()).await;
            store.set_listings(listings);
            store.set_filters(filters.into_filters());

            let found = store.filtered_listings();
            info!(
                "✅ {} of {} houses match ({} active filters)",
                found.len(),
                store.listings().len(),
                store.filters().active_count()
            );
            print_listings(&found);

            if let Some(path) = output {
                let json = serde_json::to_string_pretty(&found)?;
                tokio::fs::write(&path, json)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("💾 Saved {} houses to {}", found.len(), path.display());
            }
        }
        Command::Search { query } => {
            store.set_listings(cached_listings(&client, storage.clone()).await);
            let found = store.search(&query);
            info!("🔎 {} houses match {:?}", found.len(), query);
            print_listings(&found);
        }
        Command::Show { id } => {
            let listing = client.get_house(&id).await.context("Failed to load house")?;
            print_listings(std::slice::from_ref(&listing));
            let reviews = client.reviews_for_house(&id).await.unwrap_or_else(|e| {
                warn!("Could not load reviews: {}", e);
                listing.reviews.clone()
            });
            for review in reviews {
                println!("   ★ {:.1} {}: {}", review.rating, review.author, review.comment);
            }
        }
        Command::Insights => {
            let listings = cached_listings(&client, storage.clone()).await;
            println!("Average price by type:");
            for trend in client.price_trends(&listings).await? {
                println!("   {:<10} {:>8} KES ({} houses)", trend.house_type, trend.average_price, trend.listings);
            }
            println!("Popular estates:");
            for estate in client.popular_estates(&listings).await? {
                println!("   {:<14} {} houses, avg {} KES", estate.estate, estate.listings, estate.average_price);
            }
            println!("Trending searches:");
            for search in client.trending_searches(&listings).await? {
                println!("   {} ({})", search.term, search.count);
            }
        }
        Command::Notifications => {
            if let Err(e) = store.load_notifications(&client).await {
                anyhow::bail!(e.user_message());
            }
            info!("🔔 {} unread", store.unread_count());
            for notification in store.notifications().iter().filter(|n| !n.read) {
                println!("- {}: {}", notification.title, notification.message);
            }
        }
        Command::Watch => watch_listings(&client, storage.clone(), &config).await?,
        Command::Login { token } => {
            storage.set_item(TOKEN_SLOT, token.trim())?;
            info!("Token saved");
        }
        Command::Logout => {
            storage.remove_item(TOKEN_SLOT)?;
            info!("Token removed");
        }
    }

    for toast in store.toasts() {
        warn!("{:?}: {}", toast.level, toast.message);
    }

    Ok(())
}

fn listings_cache(client: &ApiClient, storage: Arc<dyn Storage>, config: Option<&Config>) -> SilentCache<Vec<Listing>> {
    let client = client.clone();
    let mut options = SilentCacheOptions::new(LISTINGS_CACHE_KEY, move || {
        let client = client.clone();
        async move { Ok::<_, anyhow::Error>(client.list_houses().await?) }
    })
    .compare(|a: &Vec<Listing>, b: &Vec<Listing>| a == b);

    if let Some(period) = config.and_then(|c| c.revalidate_interval) {
        options = options.revalidate_every(period);
    }
    SilentCache::mount(options, storage)
}

/// Fresh listings when the backend answers, the cached copy otherwise.
async fn cached_listings(client: &ApiClient, storage: Arc<dyn Storage>) -> Vec<Listing> {
    let cache = listings_cache(client, storage, None);
    let mut updates = cache.subscribe();
    // Wait for the fetch fired on mount
    if updates.wait_for(|s| !s.stale).await.is_err() {
        warn!("Listings cache closed early");
    }
    if cache.last_checked().is_none() {
        if let Some(cached) = cache.data() {
            warn!("Backend unavailable, showing {} cached houses", cached.len());
        }
    }
    cache.data().map(|d| d.as_ref().clone()).unwrap_or_default()
}

async fn watch_listings(client: &ApiClient, storage: Arc<dyn Storage>, config: &Config) -> Result<()> {
    let cache = listings_cache(client, storage, Some(config));
    let mut updates = cache.subscribe();
    info!("👀 Watching listings (Ctrl-C to stop)");
    if let Some(cached) = cache.data() {
        info!("{} houses from cache", cached.len());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if let (Some(data), Some(at)) = (&snapshot.data, snapshot.last_updated) {
                    if !snapshot.stale {
                        info!("🔄 {} houses as of {}", data.len(), at.format("%H:%M:%S"));
                    }
                }
            }
            _ = &mut ctrl_c => {
                info!("Stopping");
                break;
            }
        }
    }

    cache.unmount();
    Ok(())
}

fn print_listings(listings: &[Listing]) {
    for (i, listing) in listings.iter().enumerate() {
        println!("{}. {} ({} KES)", i + 1, listing.title, listing.price);
        let availability = if listing.is_vacant() { "vacant" } else { "occupied" };
        println!("   {} in {} ({})", listing.house_type, listing.location.estate, availability);
        if let Some(walk) = listing.location.distance_from_university.walking {
            println!("   {} min walk to campus", walk);
        }
        println!("   Rating: {:.1} ({} reviews), safety {}/5", listing.rating, listing.review_count, listing.safety_rating);
        let amenities: Vec<&str> = listing
            .amenities
            .iter()
            .filter(|a| a.available)
            .map(|a| a.name.as_str())
            .collect();
        if !amenities.is_empty() {
            println!("   Amenities: {}", amenities.join(", "));
        }
        if listing.verification.verified {
            println!("   ✔ Verified");
        }
        println!("   ID: {}", listing.id);
        println!();
    }
}
