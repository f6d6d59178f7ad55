use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use rdbport_error::{bail, RdbResult, StatusCode};
use serde::{Deserialize, Serialize};

/// Пороги кодирования и параметры отложенного освобождения.
///
/// Значения по умолчанию совпадают с Redis. Конфигурация передаётся в
/// декодер и кодировщик явно, глобального состояния нет.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RdbConfig {
    pub hash_max_ziplist_entries: usize,
    pub hash_max_ziplist_value: usize,
    pub set_max_intset_entries: usize,
    pub set_max_listpack_entries: usize,
    pub set_max_listpack_value: usize,
    pub zset_max_ziplist_entries: usize,
    pub zset_max_ziplist_value: usize,
    /// Начиная с этого числа членов sorted set грузится через сортировку.
    pub zset_bulk_threshold: usize,
    /// `fill` узла quicklist: > 0 число записей, < 0 класс размера.
    pub list_max_ziplist_size: i32,
    pub rdb_compression: bool,
    pub lazyfree_threads: usize,
    pub lazyfree_threshold: usize,
}

impl Default for RdbConfig {
    fn default() -> Self {
        Self {
            hash_max_ziplist_entries: 128,
            hash_max_ziplist_value: 64,
            set_max_intset_entries: 512,
            set_max_listpack_entries: 128,
            set_max_listpack_value: 64,
            zset_max_ziplist_entries: 128,
            zset_max_ziplist_value: 64,
            zset_bulk_threshold: 128,
            list_max_ziplist_size: -2,
            rdb_compression: true,
            lazyfree_threads: 8,
            lazyfree_threshold: 128,
        }
    }
}

impl RdbConfig {
    /// Значения по умолчанию плюс переменные окружения `RDBPORT_*`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// То же, что [`RdbConfig::load`], с дополнительным файлом (TOML, YAML,
    /// JSON) между умолчаниями и окружением.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let d = Self::default();
        let mut builder = Config::builder()
            .set_default("hash_max_ziplist_entries", d.hash_max_ziplist_entries as u64)?
            .set_default("hash_max_ziplist_value", d.hash_max_ziplist_value as u64)?
            .set_default("set_max_intset_entries", d.set_max_intset_entries as u64)?
            .set_default("set_max_listpack_entries", d.set_max_listpack_entries as u64)?
            .set_default("set_max_listpack_value", d.set_max_listpack_value as u64)?
            .set_default("zset_max_ziplist_entries", d.zset_max_ziplist_entries as u64)?
            .set_default("zset_max_ziplist_value", d.zset_max_ziplist_value as u64)?
            .set_default("zset_bulk_threshold", d.zset_bulk_threshold as u64)?
            .set_default("list_max_ziplist_size", d.list_max_ziplist_size as i64)?
            .set_default("rdb_compression", d.rdb_compression)?
            .set_default("lazyfree_threads", d.lazyfree_threads as u64)?
            .set_default("lazyfree_threshold", d.lazyfree_threshold as u64)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let cfg = builder
            // Переменные окружения с префиксом RDBPORT_
            .add_source(Environment::with_prefix("RDBPORT").try_parsing(true))
            .build()?;

        cfg.try_deserialize()
    }

    /// Разбирает конфигурацию в стиле `redis.conf`: строки `имя значение`.
    pub fn from_redis_conf(text: &str) -> RdbResult<Self> {
        let mut cfg = Self::default();
        cfg.apply_redis_conf(text)?;
        Ok(cfg)
    }

    /// Применяет поверх текущих значений директивы `redis.conf`.
    ///
    /// Неизвестные директивы пропускаются, неверные значения это ошибка.
    pub fn apply_redis_conf(
        &mut self,
        text: &str,
    ) -> RdbResult<()> {
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
                bail!(
                    StatusCode::InvalidArgs,
                    "line {}: directive without value: {line}",
                    lineno + 1
                );
            };
            let name = name.to_ascii_lowercase();

            let slot = match name.as_str() {
                "hash-max-ziplist-entries" | "hash-max-listpack-entries" => {
                    &mut self.hash_max_ziplist_entries
                }
                "hash-max-ziplist-value" | "hash-max-listpack-value" => {
                    &mut self.hash_max_ziplist_value
                }
                "set-max-intset-entries" => &mut self.set_max_intset_entries,
                "set-max-listpack-entries" => &mut self.set_max_listpack_entries,
                "set-max-listpack-value" => &mut self.set_max_listpack_value,
                "zset-max-ziplist-entries" | "zset-max-listpack-entries" => {
                    &mut self.zset_max_ziplist_entries
                }
                "zset-max-ziplist-value" | "zset-max-listpack-value" => {
                    &mut self.zset_max_ziplist_value
                }
                "lazyfree-threads" => &mut self.lazyfree_threads,
                "lazyfree-threshold" => &mut self.lazyfree_threshold,
                "list-max-ziplist-size" | "list-max-listpack-size" => {
                    self.list_max_ziplist_size = parse_value(lineno, &name, value)?;
                    continue;
                }
                "rdbcompression" => {
                    self.rdb_compression = match value.to_ascii_lowercase().as_str() {
                        "yes" => true,
                        "no" => false,
                        _ => bail!(
                            StatusCode::InvalidValue,
                            "line {}: {name} expects yes or no, got {value}",
                            lineno + 1
                        ),
                    };
                    continue;
                }
                _ => {
                    tracing::debug!(directive = %name, "Ignoring unknown configuration directive");
                    continue;
                }
            };
            *slot = parse_value(lineno, &name, value)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> RdbResult<()> {
        if self.list_max_ziplist_size == 0 {
            bail!(
                StatusCode::InvalidValue,
                "list_max_ziplist_size must not be zero"
            );
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(
    lineno: usize,
    name: &str,
    value: &str,
) -> RdbResult<T> {
    match value.parse::<T>() {
        Ok(v) => Ok(v),
        Err(_) => bail!(
            StatusCode::InvalidValue,
            "line {}: invalid value for {name}: {value}",
            lineno + 1
        ),
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_defaults_match_redis() {
        let cfg = RdbConfig::default();
        assert_eq!(cfg.zset_max_ziplist_entries, 128);
        assert_eq!(cfg.zset_max_ziplist_value, 64);
        assert_eq!(cfg.set_max_intset_entries, 512);
        assert_eq!(cfg.list_max_ziplist_size, -2);
        assert!(cfg.rdb_compression);
    }

    #[test]
    fn test_redis_conf_overrides() {
        let cfg = RdbConfig::from_redis_conf(
            "# comment\n\
             zset-max-ziplist-entries 16\n\
             hash-max-listpack-value 32\n\
             list-max-ziplist-size 8\n\
             rdbcompression no\n\
             appendonly yes\n",
        )
        .unwrap();
        assert_eq!(cfg.zset_max_ziplist_entries, 16);
        assert_eq!(cfg.hash_max_ziplist_value, 32);
        assert_eq!(cfg.list_max_ziplist_size, 8);
        assert!(!cfg.rdb_compression);
    }

    #[test]
    fn test_redis_conf_errors() {
        assert!(RdbConfig::from_redis_conf("zset-max-ziplist-entries lots").is_err());
        assert!(RdbConfig::from_redis_conf("rdbcompression maybe").is_err());
        assert!(RdbConfig::from_redis_conf("set-max-intset-entries").is_err());
        assert!(RdbConfig::from_redis_conf("list-max-ziplist-size 0").is_err());
    }

    #[test]
    #[serial]
    fn test_load_reads_environment() {
        std::env::set_var("RDBPORT_ZSET_BULK_THRESHOLD", "64");
        let cfg = RdbConfig::load().unwrap();
        std::env::remove_var("RDBPORT_ZSET_BULK_THRESHOLD");
        assert_eq!(cfg.zset_bulk_threshold, 64);
        assert_eq!(cfg.hash_max_ziplist_entries, 128);
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rdbport.toml");
        std::fs::write(&path, "lazyfree_threads = 2\nrdb_compression = false\n").unwrap();
        let cfg = RdbConfig::load_from(Some(&path)).unwrap();
        assert_eq!(cfg.lazyfree_threads, 2);
        assert!(!cfg.rdb_compression);
    }
}
