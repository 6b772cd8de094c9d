//! Carga de configuración desde variables de entorno.
//! Convención: `INVESTIGATOR_DB` apunta al archivo SQLite de la corrida.

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

/// Ruta por defecto del log durable.
pub const DEFAULT_DB_PATH: &str = "runs/events.db";

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: String,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let path = env::var("INVESTIGATOR_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
        let max_connections = env::var("INVESTIGATOR_DB_MAX_CONNECTIONS").ok()
                                                                         .and_then(|v| v.parse().ok())
                                                                         .unwrap_or(4);
        Self { path, max_connections }
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
