mod config;
mod handlers;
mod models;
mod services;
mod webhook; // Bird.com webhook handler

#[cfg(feature = "webhook-server")]
use webhook::server::create_webhook_router;

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;

use config::Config;
use handlers::MessageHandler;
use services::{BirdComClient, CompletionClient, MealLogStore, OpenRouterService, WhatsAppService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init();

    log::info!("🚀 Starting FitBOT...");

    let config = Config::from_env()?;

    tokio::fs::create_dir_all(&config.downloads_dir).await?;
    tokio::fs::create_dir_all(&config.data_dir).await?;
    log::info!("📁 Downloads: {} | Data: {}", config.downloads_dir.display(), config.data_dir.display());

    let openrouter = Arc::new(OpenRouterService::new(config.openrouter.clone()));
    if openrouter.is_enabled() {
        log::info!(
            "✅ OpenRouter service initialized (text: {}, vision: {})",
            openrouter.text_model(),
            openrouter.vision_model()
        );
    } else {
        log::warn!("⚠️ OPENROUTER_API_KEY not set, AI commands will reply with setup instructions");
    }

    let bird_client = Arc::new(BirdComClient::from_config(&config.bird));
    let whatsapp = bird_client.clone() as Arc<dyn WhatsAppService>;
    log::info!("✅ WhatsApp service initialized (Bird.com)");

    let meal_log = Arc::new(MealLogStore::new(config.data_dir.clone()));

    let message_handler = Arc::new(MessageHandler::new(
        openrouter.clone() as Arc<dyn CompletionClient>,
        whatsapp.clone(),
        meal_log,
        config.downloads_dir.clone(),
    ));
    log::info!("✅ Message handler initialized");

    #[cfg(feature = "webhook-server")]
    {
        use services::Database;
        use webhook::admin::create_admin_router;

        let mut webhook_app = create_webhook_router(message_handler.clone(), config.bird.webhook_secret.clone());

        match (&config.database_url, &config.admin_token) {
            (Some(database_url), Some(admin_token)) => {
                let db = Arc::new(Database::new(database_url).await?);
                log::info!("✅ PostgreSQL database initialized");

                webhook_app = webhook_app.nest("/admin", create_admin_router(db, admin_token.clone()));
                log::info!("🔐 Client config API mounted at /admin/api/client-configs");
            }
            (Some(_), None) => log::warn!("⚠️ ADMIN_TOKEN not set, client config API disabled"),
            _ => log::info!("ℹ️ No database configured, client config API disabled"),
        }

        let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
        log::info!("🌐 Webhook server starting on {}", config.bind_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, webhook_app).await {
                log::error!("❌ Webhook server stopped: {}", e);
            }
        });
    }

    if let Some(jid) = config.initial_notification_jid.clone() {
        let handler = message_handler.clone();
        tokio::spawn(async move {
            if let Err(e) = handler.announce_startup(&jid).await {
                log::error!("❌ Startup notification to {} failed: {}", jid, e);
            }
        });
    }

    log::info!("🎉 Bot is ready!");

    tokio::signal::ctrl_c().await?;

    log::info!("🛑 Shutting down...");

    Ok(())
}
