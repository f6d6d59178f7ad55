use std::{fs, io};

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::Layer, registry::LookupSpan};

use crate::logging::config::FileSinkConfig;

/// Файловый слой с ежедневной ротацией и неблокирующей записью.
///
/// Guard нужно держать до завершения процесса, иначе хвост буфера потеряется.
pub fn file_layer<S>(
    config: &FileSinkConfig
) -> io::Result<(Box<dyn Layer<S> + Send + Sync>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fs::create_dir_all(&config.dir)?;
    let appender = rolling::daily(&config.dir, &config.prefix);
    let (writer, guard) = non_blocking(appender);
    let layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer);
    Ok((Box::new(layer), guard))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    #[test]
    fn test_file_layer_writes_into_dir() {
        let dir = tempdir().unwrap();
        let cfg = FileSinkConfig {
            dir: dir.path().join("nested"),
            prefix: "test.log".to_string(),
        };
        let (layer, guard) = file_layer::<Registry>(&cfg).unwrap();
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("written to file");
        });
        drop(guard);

        let files: Vec<_> = fs::read_dir(&cfg.dir).unwrap().collect();
        assert_eq!(files.len(), 1);
        let path = files[0].as_ref().unwrap().path();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("written to file"));
    }
}
