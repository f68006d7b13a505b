mod catalog;
mod commands;
mod context;
mod llm;
mod models;
mod playlist;
mod recommend;
mod sheets;
mod weather;

use context::AppContext;
use std::sync::Arc;
use tauri::Manager;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  tauri::Builder::default()
    .plugin(tauri_plugin_opener::init())
    .setup(|app| {
      // Load the workout catalog once for the process lifetime
      match AppContext::initialize() {
        Ok(context) => {
          app.handle().manage(Arc::new(context));
          println!("Workout catalog ready");
        }
        Err(e) => {
          eprintln!("Failed to load workout catalog: {}", e);
        }
      }
      Ok(())
    })
    .invoke_handler(tauri::generate_handler![
      commands::users::list_users,
      commands::users::register_user,
      commands::daily::save_daily_entry,
      commands::recommend::get_recommendation,
      commands::recommend::get_recommendation_slots,
      commands::evaluation::submit_evaluation,
    ])
    .run(tauri::generate_context!())
    .expect("error while running tauri application");
}
