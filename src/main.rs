mod cli;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use yuzu_frontend::config::FrontendConfig;
use yuzu_frontend::games::{AddOutcome, GameFolderRegistry};
use yuzu_frontend::import::{ImportContext, ImportJob, ImportReport, ImportRunner, TaskState};
use yuzu_frontend::native::BridgeNative;
use yuzu_frontend::ImportError;
use yuzu_frontend_updater::{
    AutoAccept, CommandInstaller, DownloadEvent, DownloadManager, FlowOutcome, HttpUpdateSource,
    PromptDecision, UpdateCheck, UpdateFlow, UpdateInfo, UpdatePrompt, UpdateSource,
};

use cli::{Cli, Command};

/// 터미널에서 y/N으로 묻는 확인
struct TerminalPrompt;

impl UpdatePrompt for TerminalPrompt {
    fn confirm(&self, info: &UpdateInfo) -> PromptDecision {
        println!("New version available: {}", info.version);
        if let Some(ref notes) = info.release_notes {
            println!("\n{}\n", notes.trim());
        }
        print!("Download and install now? [y/N] ");
        std::io::stdout().flush().ok();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return PromptDecision::Deferred;
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => PromptDecision::Accepted,
            _ => PromptDecision::Deferred,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout은 명령 결과 전용, 로그는 stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("✗ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// 성공이면 `Ok(true)`, 작업이 실패로 끝났으면 `Ok(false)`
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let cfg = FrontendConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::CheckUpdate => check_update(&cfg).await,
        Command::Update { yes } => {
            if yes {
                update(&cfg, AutoAccept).await
            } else {
                update(&cfg, TerminalPrompt).await
            }
        }
        Command::ImportKeys { file } => {
            run_import(&cfg, ImportJob::Keys { source: file }, cli.json).await
        }
        Command::ImportAmiiboKeys { file } => {
            run_import(&cfg, ImportJob::AmiiboKeys { source: file }, cli.json).await
        }
        Command::ImportFirmware { archive } => {
            run_import(&cfg, ImportJob::Firmware { source: archive }, cli.json).await
        }
        Command::InstallContent { files, program_id, force } => {
            let job = ImportJob::Content { documents: files, program_id, force };
            run_import(&cfg, job, cli.json).await
        }
        Command::ExportBackup { destination } => export_backup(&cfg, destination, cli.json).await,
        Command::ImportBackup { archive } => {
            run_import(&cfg, ImportJob::BackupImport { source: archive }, cli.json).await
        }
        Command::AddGamesDir { path, deep_scan } => {
            let mut registry = GameFolderRegistry::open(&cfg.resolve_user_dir())?;
            match registry.add(&path, deep_scan)? {
                AddOutcome::Added => println!("✓ Added {}", path.display()),
                AddOutcome::AlreadyAdded => println!("• Folder already added: {}", path.display()),
            }
            Ok(true)
        }
        Command::ListGamesDirs => {
            let registry = GameFolderRegistry::open(&cfg.resolve_user_dir())?;
            if registry.list().is_empty() {
                println!("No game folders registered");
            }
            for dir in registry.list() {
                let scan = if dir.deep_scan { " (deep scan)" } else { "" };
                println!("{}{}", dir.path, scan);
            }
            Ok(true)
        }
    }
}

// ═══════════════════════════════════════════════════════
// 업데이트
// ═══════════════════════════════════════════════════════

async fn check_update(cfg: &FrontendConfig) -> anyhow::Result<bool> {
    let source = HttpUpdateSource::new(&cfg.updater)?;
    match source.check_for_update(&cfg.updater.current_version).await {
        UpdateCheck::UpToDate => {
            println!("✓ Up to date ({})", cfg.updater.current_version);
            Ok(true)
        }
        UpdateCheck::Available(info) => {
            println!("New version available: {} (installed: {})", info.version, cfg.updater.current_version);
            if let Some(notes) = info.release_notes {
                println!("\n{}", notes.trim());
            }
            Ok(true)
        }
        UpdateCheck::Failed(e) => {
            println!("✗ Update check failed: {}", e.user_message());
            Ok(false)
        }
    }
}

async fn update<P: UpdatePrompt>(cfg: &FrontendConfig, prompt: P) -> anyhow::Result<bool> {
    let source = HttpUpdateSource::new(&cfg.updater)?;
    let installer = CommandInstaller::from_command(&cfg.updater.installer_command);
    let downloads = DownloadManager::new(cfg.updater.timeout_secs)?;
    let flow = UpdateFlow::new(cfg.updater.clone(), source, prompt, installer, downloads);

    let mut events = flow.downloads().subscribe();
    let progress = tokio::spawn(async move {
        let mut last_percent = 0;
        while let Ok(event) = events.recv().await {
            match event {
                DownloadEvent::Progress { downloaded, total: Some(total), .. } if total > 0 => {
                    let percent = downloaded * 100 / total;
                    if percent >= last_percent + 10 {
                        last_percent = percent;
                        eprintln!("  {}% ({}/{} bytes)", percent, downloaded, total);
                    }
                }
                DownloadEvent::Completed { .. } | DownloadEvent::Failed { .. } => break,
                _ => {}
            }
        }
    });

    let outcome = flow.run().await;
    progress.abort();

    match outcome {
        FlowOutcome::Disabled => {
            println!("Update check is disabled in config");
            Ok(true)
        }
        FlowOutcome::UpToDate => {
            println!("✓ Up to date ({})", cfg.updater.current_version);
            Ok(true)
        }
        FlowOutcome::Deferred => {
            println!("Update deferred");
            Ok(true)
        }
        FlowOutcome::Installed { version, package } => {
            println!("✓ Installer started for {} ({})", version, package.display());
            Ok(true)
        }
        FlowOutcome::CheckFailed(e) => {
            println!("✗ Update check failed: {}", e.user_message());
            Ok(false)
        }
        FlowOutcome::DownloadFailed(e) => {
            println!("✗ Download failed: {}", e.user_message());
            Ok(false)
        }
        FlowOutcome::InstallFailed(e) => {
            println!("✗ Install failed: {}", e.user_message());
            Ok(false)
        }
    }
}

// ═══════════════════════════════════════════════════════
// 가져오기
// ═══════════════════════════════════════════════════════

fn build_runner(cfg: &FrontendConfig) -> ImportRunner<BridgeNative> {
    let user_dir = cfg.resolve_user_dir();
    let native = BridgeNative::new(cfg.native.bridge.clone(), user_dir.clone(), cfg.native.timeout_secs);
    ImportRunner::new(ImportContext::new(Arc::new(native), user_dir, cfg.resolve_cache_dir()))
}

async fn run_import(cfg: &FrontendConfig, job: ImportJob, json: bool) -> anyhow::Result<bool> {
    let runner = build_runner(cfg);
    match runner.run(job).await {
        Ok(report) => print_report(&report, json),
        Err(e) => Ok(print_rejection(&e, json)),
    }
}

async fn export_backup(cfg: &FrontendConfig, destination: PathBuf, json: bool) -> anyhow::Result<bool> {
    let runner = build_runner(cfg);
    let cancel = CancellationToken::new();

    let handle = match runner.spawn(ImportJob::BackupExport { destination, cancel: cancel.clone() }) {
        Ok(handle) => handle,
        Err(e) => return Ok(print_rejection(&e, json)),
    };
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("[Backup] Cancellation requested");
                cancel.cancel();
            }
        }
    });

    let report = handle.await?;
    ctrl_c.abort();
    print_report(&report, json)
}

fn print_report(report: &ImportReport, json: bool) -> anyhow::Result<bool> {
    let success = report.state == TaskState::Completed;
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(success);
    }

    match report.state {
        TaskState::Completed => println!("✓ {}", report.message),
        TaskState::Cancelled => println!("• {}", report.message),
        TaskState::Failed => {
            match report.error_code {
                Some(code) => println!("✗ {} [{}]", report.message, code),
                None => println!("✗ {}", report.message),
            }
            if report.untouched {
                println!("  No changes were made");
            }
        }
    }
    Ok(success)
}

/// 작업이 시작되기 전에 거부된 경우 (예: 다른 작업 실행 중)
fn print_rejection(error: &ImportError, json: bool) -> bool {
    if json {
        println!("{}", error.to_json());
    } else {
        println!("✗ {} [{}]", error, error.error_code());
    }
    false
}
