pub mod ai_service;
pub mod bird; // Bird.com WhatsApp Business API
pub mod calorie_estimator;
pub mod chat_summary;
pub mod database;
pub mod meal_log;
pub mod media;
pub mod openrouter; // OpenRouter AI service
pub mod qna;
pub mod science_brief;
pub mod whatsapp;

pub use ai_service::CompletionClient;
pub use bird::BirdComClient;
pub use database::Database;
pub use meal_log::MealLogStore;
pub use openrouter::OpenRouterService;
pub use whatsapp::WhatsAppService;
