pub mod api_error;

pub mod home_controller;
pub mod holdings_controller;
pub mod prices_controller;
pub mod decisions_controller;
pub mod settings_controller;
pub mod realtime_controller;
