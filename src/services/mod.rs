pub mod stooq;
pub mod symbol_directory;
pub mod db_init;
pub mod drift_monitor;

pub mod drift_engine;
pub mod holdings_service;
pub mod prices_service;
pub mod decisions_service;
pub mod settings_service;
