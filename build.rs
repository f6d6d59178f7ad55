//! Вшивает в бинарник описание ревизии и момент сборки для `rdbport --version`.

use std::{env, process::Command};

fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8(out.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

fn main() {
    // Из архива исходников без .git описание берётся из окружения.
    let revision = env::var("RDBPORT_GIT_COMMIT")
        .ok()
        .or_else(|| git(&["describe", "--always", "--dirty", "--abbrev=10"]))
        .unwrap_or_else(|| "unknown".to_owned());

    // SOURCE_DATE_EPOCH даёт воспроизводимую сборку.
    let built = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(chrono::Utc::now)
        .format("%Y-%m-%d %H:%M UTC");

    println!("cargo:rustc-env=RDBPORT_GIT_COMMIT={revision}");
    println!("cargo:rustc-env=RDBPORT_BUILD_TIME={built}");
    println!("cargo:rerun-if-env-changed=RDBPORT_GIT_COMMIT");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    if let Some(git_dir) = git(&["rev-parse", "--git-dir"]) {
        println!("cargo:rerun-if-changed={git_dir}/HEAD");
    }
}
