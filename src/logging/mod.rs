//! Инициализация `tracing`: фильтр, консоль и необязательный файл.

pub mod config;
mod filters;
mod formatter;
pub mod handle;
mod sinks;

pub use config::{FileSinkConfig, LogFormat, LoggingConfig};
pub use handle::LoggingHandle;
use rdbport_error::{GenericError, RdbResult, StatusCode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Устанавливает глобальный подписчик. Повторный вызов возвращает ошибку.
pub fn init_logging(config: LoggingConfig) -> RdbResult<LoggingHandle> {
    let env_filter = filters::build_filter(&config);
    let mut layers = vec![formatter::console_layer(&config)];

    let file_guard = match &config.file {
        Some(file_cfg) => {
            let (layer, guard) = sinks::file_layer(file_cfg)?;
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| GenericError::new(StatusCode::Internal, e.to_string()))?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        format = %config.format,
        file = config.file.is_some(),
        "Logging initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
