//! CLI rdbport
//!
//! Читает файл снимка RDB и печатает по одной JSON-записи на элемент.
//! Умеет также декодировать одиночный блок `DUMP`.

use std::{
    borrow::Cow,
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rdbport::{
    StackError,
    config::RdbConfig,
    database::{ObjectType, Value},
    engine::{decode_dump_payload, BatchIterator, Loader},
    logging::{init_logging, FileSinkConfig, LogFormat, LoggingConfig},
};
use serde::Serialize;
use tracing::{debug, error, info};

/// Аргументы командной строки.
#[derive(Parser)]
#[command(name = "rdbport")]
#[command(version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("RDBPORT_GIT_COMMIT"),
    ", built ",
    env!("RDBPORT_BUILD_TIME"),
    ")"
))]
#[command(about = "Decode Redis RDB snapshots and dump payloads into JSON lines", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Файл настроек TOML с порогами кодирования
    #[arg(long, global = true, env = "RDBPORT_CONFIG")]
    config: Option<PathBuf>,
    /// Файл в формате redis.conf с порогами кодирования
    #[arg(long, global = true)]
    redis_conf: Option<PathBuf>,
    /// Уровень логирования или директива фильтра
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    /// Формат логов: pretty, compact или json
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,
    /// Каталог для файла логов с ежедневной ротацией
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Декодировать файл снимка целиком
    Decode {
        /// Входной файл, по умолчанию stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Выходной файл, по умолчанию stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Декодировать одиночный блок DUMP/RESTORE
    Payload {
        #[arg(short, long)]
        input: PathBuf,
        /// Вход записан шестнадцатеричным текстом
        #[arg(long)]
        hex: bool,
        /// Имя ключа в выводе
        #[arg(long, default_value = "payload")]
        key: String,
    },
}

/// Одна строка вывода.
#[derive(Serialize)]
struct Record<'a> {
    db: u64,
    #[serde(rename = "type")]
    kind: &'static str,
    key: Cow<'a, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    member: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expireat: Option<i64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: cli.log_level.clone(),
        format: cli.log_format,
        file: cli.log_dir.clone().map(|dir| FileSinkConfig {
            dir,
            ..Default::default()
        }),
        ..Default::default()
    };
    let handle = match init_logging(logging) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("rdbport: failed to initialize logging: {e}");
            return ExitCode::from(70);
        }
    };

    let status = match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    };
    handle.shutdown();
    status
}

fn run(cli: &Cli) -> Result<()> {
    let cfg = load_config(cli)?;
    match &cli.command {
        Commands::Decode { input, output } => decode(input.as_ref(), output.as_ref(), cfg),
        Commands::Payload { input, hex, key } => payload(input, *hex, key, &cfg),
    }
}

/// Логирует ошибку и выбирает код завершения по её категории.
fn report(err: &anyhow::Error) -> ExitCode {
    let Some(stack) = err.downcast_ref::<StackError>() else {
        error!("{err:#}");
        return ExitCode::FAILURE;
    };
    let code = stack.status_code();
    match stack.hint() {
        Some(hint) => error!(code = %code, hint, "{err:#}"),
        None => error!(code = %code, "{err:#}"),
    }
    debug!("{}", stack.report());
    ExitCode::from(u8::try_from(code.exit_code()).unwrap_or(1))
}

fn load_config(cli: &Cli) -> Result<RdbConfig> {
    let mut cfg = RdbConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(path) = &cli.redis_conf {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        cfg.apply_redis_conf(&text)?;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn decode(
    input: Option<&PathBuf>,
    output: Option<&PathBuf>,
    cfg: RdbConfig,
) -> Result<()> {
    let src: Box<dyn Read> = match input {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => Box::new(io::stdin().lock()),
    };
    let mut out = open_output(output)?;

    let mut loader = Loader::new(src, cfg);
    let mut keys = 0u64;
    let mut records = 0u64;
    for entry in loader.by_ref() {
        let entry = entry?;
        keys += 1;
        if let Some(ms) = entry.expire_at_ms {
            emit(
                &mut out,
                &Record {
                    expireat: Some(ms),
                    ..Record::new(entry.db, "expire", &entry.key)
                },
            )?;
            records += 1;
        }
        records += emit_value(&mut out, entry.db, &entry.key, &entry.value)?;
    }
    out.flush()?;

    info!(
        keys,
        records,
        bytes = loader.bytes_read(),
        "Decode finished"
    );
    Ok(())
}

fn payload(
    input: &PathBuf,
    hex: bool,
    key: &str,
    cfg: &RdbConfig,
) -> Result<()> {
    let raw = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let bytes = if hex { parse_hex(&raw)? } else { raw };
    let value = decode_dump_payload(&bytes, cfg)?;

    let mut out = open_output(None)?;
    emit_value(&mut out, 0, key.as_bytes(), &value)?;
    out.flush()?;
    Ok(())
}

fn open_output(path: Option<&PathBuf>) -> Result<BufWriter<Box<dyn Write>>> {
    let w: Box<dyn Write> = match path {
        Some(p) => {
            Box::new(File::create(p).with_context(|| format!("failed to create {}", p.display()))?)
        }
        None => Box::new(io::stdout().lock()),
    };
    Ok(BufWriter::new(w))
}

/// Печатает все элементы значения, возвращает число записей.
fn emit_value(
    out: &mut impl Write,
    db: u64,
    key: &[u8],
    value: &Value,
) -> Result<u64> {
    let t = value.object_type();
    let kind = t.name();
    if let Value::Str(s) = value {
        let bytes = s.to_bytes();
        emit(
            out,
            &Record {
                value: Some(String::from_utf8_lossy(&bytes)),
                ..Record::new(db, kind, key)
            },
        )?;
        return Ok(1);
    }

    let mut it = BatchIterator::new(value, t)?;
    let mut index = 0usize;
    loop {
        let batch = it.load(256)?;
        if batch.is_empty() {
            break;
        }
        match t {
            ObjectType::Hash => {
                for pair in batch.chunks(2) {
                    let field = pair[0].elem.as_bytes();
                    let val = pair[1].elem.as_bytes();
                    emit(
                        out,
                        &Record {
                            field: Some(String::from_utf8_lossy(&field)),
                            value: Some(String::from_utf8_lossy(&val)),
                            ..Record::new(db, kind, key)
                        },
                    )?;
                    index += 1;
                }
            }
            _ => {
                for slot in batch {
                    let bytes = slot.elem.as_bytes();
                    let text = String::from_utf8_lossy(&bytes);
                    let rec = match t {
                        ObjectType::List => Record {
                            index: Some(index),
                            value: Some(text),
                            ..Record::new(db, kind, key)
                        },
                        ObjectType::ZSet => Record {
                            index: Some(index),
                            member: Some(text),
                            score: slot.score,
                            ..Record::new(db, kind, key)
                        },
                        _ => Record {
                            member: Some(text),
                            ..Record::new(db, kind, key)
                        },
                    };
                    emit(out, &rec)?;
                    index += 1;
                }
            }
        }
    }
    it.release();
    Ok(index as u64)
}

fn emit(
    out: &mut impl Write,
    rec: &Record<'_>,
) -> Result<()> {
    serde_json::to_writer(&mut *out, rec)?;
    out.write_all(b"\n")?;
    Ok(())
}

fn parse_hex(raw: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        bail!("hex input has an odd number of digits");
    }
    digits
        .chunks(2)
        .map(|p| -> Result<u8> {
            let s = std::str::from_utf8(p)?;
            Ok(u8::from_str_radix(s, 16)?)
        })
        .collect()
}

impl<'a> Record<'a> {
    fn new(
        db: u64,
        kind: &'static str,
        key: &'a [u8],
    ) -> Self {
        Self {
            db,
            kind,
            key: String::from_utf8_lossy(key),
            index: None,
            field: None,
            value: None,
            member: None,
            score: None,
            expireat: None,
        }
    }
}
