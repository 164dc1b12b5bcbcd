use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crwn_client::{
    config::Config,
    hooks::{category_universe, LoadState, PostCollection},
    state::AppState,
    utils::format::{category_label, time_ago},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();

    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("LOG_LEVEL").unwrap_or_else(|_| "crwn_client=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CRWN client...");

    let config = Config::from_env()?;
    info!("Backend: {} ({})", config.backend_url, config.environment);

    let state = AppState::from_config(config)?;

    // 可选登录
    if let (Ok(email), Ok(password)) = (std::env::var("CRWN_EMAIL"), std::env::var("CRWN_PASSWORD")) {
        match state.auth_service.sign_in_with_password(&email, &password).await {
            Ok(session) => info!("Signed in as {}", session.user.id),
            Err(e) => warn!("Sign-in failed, continuing anonymously: {}", e),
        }
    }

    let feed = PostCollection::new(state.post_service.clone(), None);
    match feed.mount().await {
        LoadState::Ready => {
            let posts = feed.posts();
            let now = chrono::Utc::now();
            info!("Feed loaded: {} posts", posts.len());

            let categories: Vec<String> = category_universe(&posts)
                .iter()
                .map(|c| category_label(c))
                .collect();
            info!("Categories: {}", categories.join(", "));

            for post in posts.iter().take(10) {
                info!(
                    "{} by @{} ({})",
                    post.title.as_deref().unwrap_or("Untitled"),
                    post.author_username(),
                    time_ago(post.created_at, now)
                );
            }
        }
        other => {
            let message = feed.error().map(|e| e.message).unwrap_or_default();
            error!("Feed unavailable ({:?}): {}", other, message);
        }
    }
    feed.unmount();

    if state.auth.is_signed_in() {
        if let Err(e) = state.auth_service.sign_out().await {
            warn!("Sign-out failed: {}", e);
        }
    }

    Ok(())
}
