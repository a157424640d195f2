//! Doctor command - verify configuration and backend connectivity.

use crate::cli::Output;
use crate::config::{SemanticIndexProvider, Settings};
use crate::embedding::OpenAIEmbedder;
use crate::openai::DEFAULT_API_KEY_ENV;
use crate::semantic_index;
use console::style;
use std::sync::Arc;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Spør Doctor");
    println!();
    println!("Checking configuration and backends...\n");

    let mut checks = Vec::new();

    println!("{}", style("API Configuration").bold());
    let mut api_checks = vec![check_api_key(DEFAULT_API_KEY_ENV, "used for embeddings")];
    if settings.completion.api_key_env != DEFAULT_API_KEY_ENV {
        api_checks.push(check_api_key(&settings.completion.api_key_env, "used for answers"));
    }
    for check in &api_checks {
        check.print();
    }
    checks.extend(api_checks);

    println!();

    println!("{}", style("Storage").bold());
    let storage_checks = check_storage(settings);
    for check in &storage_checks {
        check.print();
    }
    checks.extend(storage_checks);

    println!();

    println!("{}", style("Semantic Index").bold());
    let index_check = check_semantic_index(settings).await;
    index_check.print();
    checks.push(index_check);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Spør.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Spør is ready to use.");
    }

    Ok(())
}

/// Check that an API key variable is set.
fn check_api_key(var: &str, purpose: &str) -> CheckResult {
    match std::env::var(var) {
        Ok(key) if key.chars().count() > 12 => {
            CheckResult::ok(var, &format!("configured ({}), {}", mask_key(&key), purpose))
        }
        Ok(key) if key.is_empty() => {
            CheckResult::error(var, "empty", &format!("Set with: export {}='...'", var))
        }
        Ok(_) => CheckResult::warning(
            var,
            "set but looks too short",
            "Check that the full API key was copied",
        ),
        Err(_) => CheckResult::error(var, "not set", &format!("Set with: export {}='...'", var)),
    }
}

/// First and last four characters of a key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let head: String = chars.iter().take(4).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Check the data directory and the video database.
fn check_storage(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let data_dir = settings.data_dir();
    if data_dir.exists() {
        results.push(CheckResult::ok("Data directory", &format!("{}", data_dir.display())));
    } else {
        results.push(CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        ));
    }

    let db_path = settings.database_path();
    if db_path.exists() {
        let size = std::fs::metadata(&db_path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        results.push(CheckResult::ok(
            "Video database",
            &format!("{} ({})", db_path.display(), size),
        ));
    } else {
        results.push(CheckResult::warning(
            "Video database",
            &format!("{} (not created yet)", db_path.display()),
            "Database will be created when the first video is added",
        ));
    }

    results
}

/// Probe the configured semantic index.
async fn check_semantic_index(settings: &Settings) -> CheckResult {
    let name = format!("{} index", settings.semantic_index.provider);
    let hint = match settings.semantic_index.provider {
        SemanticIndexProvider::Chroma => format!(
            "Start Chroma at {} or set CHROMA_URL",
            settings.semantic_index.resolved_chroma_url()
        ),
        _ => "Check semantic_index.sqlite_path in the config file".to_string(),
    };

    let embedder = match OpenAIEmbedder::with_config(
        &settings.embedding.model,
        settings.embedding.dimensions as usize,
    ) {
        Ok(embedder) => Arc::new(embedder),
        Err(e) => return CheckResult::error(&name, &format!("error: {}", e), &hint),
    };

    let index = match semantic_index::from_settings(settings, embedder) {
        Ok(index) => index,
        Err(e) => return CheckResult::error(&name, &format!("error: {}", e), &hint),
    };

    let probe = tokio::time::timeout(settings.semantic_index.probe_timeout(), index.heartbeat()).await;
    match probe {
        Ok(Ok(())) => CheckResult::ok(&name, "reachable"),
        Ok(Err(e)) => CheckResult::warning(
            &name,
            &format!("unreachable ({}), general questions will use full transcripts", e),
            &hint,
        ),
        Err(_) => CheckResult::warning(
            &name,
            "heartbeat timed out, general questions will use full transcripts",
            &hint,
        ),
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning("Config file", "using defaults", "Create with: spor config edit")
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
