//! 파일 가져오기 디스패치
//!
//! 사용자가 고른 파일/아카이브를 키, 펌웨어, 추가 콘텐츠, 백업 중 하나의
//! 작업으로 보내고, 얕은 사전 검증 후 실제 반영은 네이티브 코어에 맡긴다.
//!
//! 작업 하나당 백그라운드 태스크 하나. 동시에 하나만 실행되며
//! 실행 중에 들어온 작업은 `ImportError::Busy`로 거부된다.

pub mod archive;
pub mod backup;
pub mod content;
pub mod firmware;
pub mod keys;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ImportError;
use crate::native::NativeBoundary;

pub use content::ContentInstallSummary;

// ═══════════════════════════════════════════════════════
// 타입
// ═══════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportRole {
    Keys,
    AmiiboKeys,
    Firmware,
    Content,
    BackupExport,
    BackupImport,
}

impl fmt::Display for ImportRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Keys => "keys",
            Self::AmiiboKeys => "amiibo keys",
            Self::Firmware => "firmware",
            Self::Content => "content",
            Self::BackupExport => "backup export",
            Self::BackupImport => "backup import",
        };
        f.write_str(label)
    }
}

/// 작업 종료 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Completed,
    Failed,
    Cancelled,
}

/// 사용자 작업 하나. 실행 시 소비된다.
#[derive(Debug)]
pub enum ImportJob {
    Keys { source: PathBuf },
    AmiiboKeys { source: PathBuf },
    Firmware { source: PathBuf },
    Content {
        documents: Vec<PathBuf>,
        /// 선택된 게임. 있으면 설치 전에 프로그램 일치 여부를 검사한다.
        program_id: Option<String>,
        /// 불일치 경고를 확인하고 그대로 설치
        force: bool,
    },
    BackupExport { destination: PathBuf, cancel: CancellationToken },
    BackupImport { source: PathBuf },
}

impl ImportJob {
    pub fn role(&self) -> ImportRole {
        match self {
            Self::Keys { .. } => ImportRole::Keys,
            Self::AmiiboKeys { .. } => ImportRole::AmiiboKeys,
            Self::Firmware { .. } => ImportRole::Firmware,
            Self::Content { .. } => ImportRole::Content,
            Self::BackupExport { .. } => ImportRole::BackupExport,
            Self::BackupImport { .. } => ImportRole::BackupImport,
        }
    }
}

/// 완료 시 한 번 보여줄 결과
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub role: ImportRole,
    pub state: TaskState,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ContentInstallSummary>,
    /// 실패했지만 사용자 데이터는 손대지 않은 채 거부됨
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub untouched: bool,
}

impl ImportReport {
    fn completed(role: ImportRole, message: impl Into<String>) -> Self {
        Self {
            role,
            state: TaskState::Completed,
            message: message.into(),
            error_code: None,
            summary: None,
            untouched: false,
        }
    }

    fn failed(role: ImportRole, error: &ImportError) -> Self {
        Self {
            role,
            state: TaskState::Failed,
            message: error.to_string(),
            error_code: Some(error.error_code()),
            summary: None,
            untouched: error.rejected_before_commit(),
        }
    }

    fn cancelled(role: ImportRole, message: impl Into<String>) -> Self {
        Self {
            role,
            state: TaskState::Cancelled,
            message: message.into(),
            error_code: None,
            summary: None,
            untouched: false,
        }
    }
}

// ═══════════════════════════════════════════════════════
// 실행 컨텍스트
// ═══════════════════════════════════════════════════════

/// 가져오기 작업이 공유하는 경로와 네이티브 경계
pub struct ImportContext<N> {
    pub native: Arc<N>,
    pub user_dir: PathBuf,
    /// 펌웨어 스테이징 위치
    pub cache_dir: PathBuf,
}

impl<N> ImportContext<N> {
    pub fn new(native: Arc<N>, user_dir: PathBuf, cache_dir: PathBuf) -> Self {
        Self { native, user_dir, cache_dir }
    }
}

impl<N> Clone for ImportContext<N> {
    fn clone(&self) -> Self {
        Self {
            native: Arc::clone(&self.native),
            user_dir: self.user_dir.clone(),
            cache_dir: self.cache_dir.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════
// ImportRunner
// ═══════════════════════════════════════════════════════

pub struct ImportRunner<N> {
    ctx: ImportContext<N>,
    active: Arc<Mutex<()>>,
}

impl<N: NativeBoundary + 'static> ImportRunner<N> {
    pub fn new(ctx: ImportContext<N>) -> Self {
        Self { ctx, active: Arc::new(Mutex::new(())) }
    }

    pub fn context(&self) -> &ImportContext<N> {
        &self.ctx
    }

    /// 작업이 실행 중인지
    pub fn is_busy(&self) -> bool {
        self.active.try_lock().is_err()
    }

    /// 작업을 백그라운드 태스크로 시작한다. 이미 실행 중이면 `Busy`.
    pub fn spawn(&self, job: ImportJob) -> Result<JoinHandle<ImportReport>, ImportError> {
        let guard = Arc::clone(&self.active)
            .try_lock_owned()
            .map_err(|_| ImportError::Busy)?;
        let ctx = self.ctx.clone();

        tracing::info!("[Import] Starting {} job", job.role());
        Ok(tokio::spawn(async move {
            let report = execute(&ctx, job).await;
            drop(guard);
            report
        }))
    }

    /// 시작하고 완료까지 기다린다
    pub async fn run(&self, job: ImportJob) -> Result<ImportReport, ImportError> {
        let handle = self.spawn(job)?;
        handle
            .await
            .map_err(|e| ImportError::Internal(anyhow::anyhow!("import task failed: {}", e)))
    }
}

async fn execute<N: NativeBoundary>(ctx: &ImportContext<N>, job: ImportJob) -> ImportReport {
    let role = job.role();
    let report = match job {
        ImportJob::Keys { source } => match keys::install_prod_keys(ctx, &source).await {
            Ok(dest) => ImportReport::completed(role, format!("Keys installed to {}", dest.display())),
            Err(e) => ImportReport::failed(role, &e),
        },
        ImportJob::AmiiboKeys { source } => match keys::install_amiibo_keys(ctx, &source).await {
            Ok(dest) => ImportReport::completed(role, format!("Amiibo keys installed to {}", dest.display())),
            Err(e) => ImportReport::failed(role, &e),
        },
        ImportJob::Firmware { source } => match firmware::install_firmware(ctx, &source).await {
            Ok(count) => ImportReport::completed(role, format!("Firmware installed ({} entries)", count)),
            Err(e) => ImportReport::failed(role, &e),
        },
        ImportJob::Content { documents, program_id, force } => {
            run_content(ctx, &documents, program_id.as_deref(), force).await
        }
        ImportJob::BackupExport { destination, cancel } => {
            match backup::export_user_data(ctx, &destination, cancel).await {
                Ok(TaskState::Cancelled) => ImportReport::cancelled(role, "User data export cancelled"),
                Ok(_) => ImportReport::completed(
                    role,
                    format!("User data exported to {}", destination.display()),
                ),
                Err(e) => ImportReport::failed(role, &e),
            }
        }
        ImportJob::BackupImport { source } => match backup::import_user_data(ctx, &source).await {
            Ok(files) => ImportReport::completed(role, format!("User data imported ({} files)", files)),
            Err(e) => ImportReport::failed(role, &e),
        },
    };

    match report.state {
        TaskState::Failed => tracing::warn!("[Import] {} failed: {}", role, report.message),
        _ => tracing::info!("[Import] {} {:?}", role, report.state),
    }
    report
}

async fn run_content<N: NativeBoundary>(
    ctx: &ImportContext<N>,
    documents: &[PathBuf],
    program_id: Option<&str>,
    force: bool,
) -> ImportReport {
    let role = ImportRole::Content;

    if let Some(program_id) = program_id {
        if let Err(e) = content::verify_content(ctx, documents, program_id).await {
            let mismatch = matches!(e, ImportError::ContentMismatch { .. });
            if !(mismatch && force) {
                return ImportReport::failed(role, &e);
            }
            tracing::info!("[Import] Installing despite program mismatch (confirmed)");
        }
    }

    let summary = content::install_content(ctx, documents).await;
    let state = if summary.is_success() { TaskState::Completed } else { TaskState::Failed };
    ImportReport {
        role,
        state,
        message: summary.render(),
        error_code: None,
        summary: Some(summary),
        untouched: false,
    }
}
