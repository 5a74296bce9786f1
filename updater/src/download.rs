//! 다운로드 매니저: 백그라운드 전송 + 핸들 기반 완료 알림
//!
//! ## 동작
//! - `enqueue`는 즉시 `DownloadHandle`을 돌려주고, 전송은 별도 tokio 태스크에서 진행
//! - 진행/완료/실패는 broadcast 채널로 전달되며 핸들로 구분한다
//! - `<dest>.part`에 기록 후 완료 시 `<dest>`로 rename (실패 시 `.part` 삭제)
//! - 해시가 주어지면 SHA256 검증 후에만 완료 처리

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::error::{ErrorContext, UpdaterError};

/// 진행 중인 전송을 식별하는 토큰
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadHandle(Uuid);

impl DownloadHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DownloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 다운로드 요청
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    /// 최종 저장 경로
    pub destination: PathBuf,
    /// 선택: 기대 SHA256 (hex)
    pub sha256: Option<String>,
}

/// 전송 상태
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadStatus {
    Pending,
    Running { downloaded: u64, total: Option<u64> },
    Completed(PathBuf),
    Failed(UpdaterError),
}

/// 구독자에게 브로드캐스트되는 이벤트
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Started { handle: DownloadHandle },
    Progress { handle: DownloadHandle, downloaded: u64, total: Option<u64> },
    Completed { handle: DownloadHandle, path: PathBuf },
    Failed { handle: DownloadHandle, error: UpdaterError },
}

/// 백그라운드 다운로드 매니저
pub struct DownloadManager {
    http: reqwest::Client,
    timeout_secs: u64,
    statuses: Arc<RwLock<HashMap<DownloadHandle, DownloadStatus>>>,
    event_tx: broadcast::Sender<DownloadEvent>,
}

impl DownloadManager {
    /// `timeout_secs`는 연결 타임아웃 (본문 전송 시간은 제한하지 않음)
    pub fn new(timeout_secs: u64) -> Result<Self, UpdaterError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("yuzu-frontend-updater/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| UpdaterError::ConfigError {
                message: format!("failed to create HTTP client: {}", e),
            })?;
        let (event_tx, _) = broadcast::channel(64);

        Ok(Self {
            http,
            timeout_secs,
            statuses: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
        })
    }

    /// 전송 요청 등록. tokio 런타임 안에서 호출해야 한다.
    pub async fn enqueue(&self, request: DownloadRequest) -> DownloadHandle {
        let handle = DownloadHandle::new();
        self.statuses.write().await.insert(handle, DownloadStatus::Pending);

        tracing::info!(
            "[Download] {} queued: {} -> {}",
            handle, request.url, request.destination.display()
        );

        let http = self.http.clone();
        let timeout_secs = self.timeout_secs;
        let statuses = self.statuses.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            run_transfer(http, timeout_secs, handle, request, statuses, event_tx).await;
        });

        handle
    }

    /// 이벤트 구독
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.event_tx.subscribe()
    }

    /// 끝난 전송의 상태를 지운다. `wait_for`를 쓰지 않는 호출자는
    /// 이벤트로 완료를 받은 뒤 직접 호출해야 맵이 커지지 않는다.
    /// 진행 중인 전송은 지우지 않는다.
    pub async fn forget(&self, handle: DownloadHandle) -> bool {
        let mut statuses = self.statuses.write().await;
        match statuses.get(&handle) {
            Some(DownloadStatus::Completed(_)) | Some(DownloadStatus::Failed(_)) => {
                statuses.remove(&handle);
                true
            }
            _ => false,
        }
    }

    /// 추적 중인 핸들 수
    pub async fn tracked(&self) -> usize {
        self.statuses.read().await.len()
    }

    /// 현재 상태 조회 (알 수 없는 핸들이면 None)
    pub async fn status(&self, handle: DownloadHandle) -> Option<DownloadStatus> {
        self.statuses.read().await.get(&handle).cloned()
    }

    /// 전송이 끝날 때까지 대기. 결과를 돌려주면서 핸들을 상태 맵에서 제거한다.
    pub async fn wait_for(&self, handle: DownloadHandle) -> Result<PathBuf, UpdaterError> {
        // 상태 확인 전에 구독해야 완료 이벤트를 놓치지 않는다
        let mut rx = self.event_tx.subscribe();

        loop {
            match self.status(handle).await {
                Some(DownloadStatus::Completed(path)) => {
                    self.forget(handle).await;
                    return Ok(path);
                }
                Some(DownloadStatus::Failed(error)) => {
                    self.forget(handle).await;
                    return Err(error);
                }
                Some(_) => {}
                None => {
                    return Err(UpdaterError::DownloadFailed {
                        url: String::new(),
                        message: format!("unknown download handle {}", handle),
                    });
                }
            }

            match rx.recv().await {
                Ok(DownloadEvent::Completed { handle: h, path }) if h == handle => {
                    self.forget(handle).await;
                    return Ok(path);
                }
                Ok(DownloadEvent::Failed { handle: h, error }) if h == handle => {
                    self.forget(handle).await;
                    return Err(error);
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(UpdaterError::DownloadFailed {
                        url: String::new(),
                        message: "download manager dropped".to_string(),
                    });
                }
            }
        }
    }
}

async fn run_transfer(
    http: reqwest::Client,
    timeout_secs: u64,
    handle: DownloadHandle,
    request: DownloadRequest,
    statuses: Arc<RwLock<HashMap<DownloadHandle, DownloadStatus>>>,
    event_tx: broadcast::Sender<DownloadEvent>,
) {
    statuses.write().await.insert(handle, DownloadStatus::Running { downloaded: 0, total: None });
    let _ = event_tx.send(DownloadEvent::Started { handle });

    let result = transfer(&http, timeout_secs, handle, &request, &statuses, &event_tx).await;

    // 상태를 먼저 기록한 뒤 이벤트 전송 (wait_for 경합 방지)
    match result {
        Ok(path) => {
            tracing::info!("[Download] {} completed: {}", handle, path.display());
            statuses.write().await.insert(handle, DownloadStatus::Completed(path.clone()));
            let _ = event_tx.send(DownloadEvent::Completed { handle, path });
        }
        Err(error) => {
            let _ = tokio::fs::remove_file(part_path(&request.destination)).await;
            ErrorContext::new(&format!("download {}", handle), error.clone()).log();
            statuses.write().await.insert(handle, DownloadStatus::Failed(error.clone()));
            let _ = event_tx.send(DownloadEvent::Failed { handle, error });
        }
    }
}

async fn transfer(
    http: &reqwest::Client,
    timeout_secs: u64,
    handle: DownloadHandle,
    request: &DownloadRequest,
    statuses: &RwLock<HashMap<DownloadHandle, DownloadStatus>>,
    event_tx: &broadcast::Sender<DownloadEvent>,
) -> Result<PathBuf, UpdaterError> {
    let dest = &request.destination;
    let dest_str = dest.display().to_string();

    let response = http
        .get(&request.url)
        .send()
        .await
        .map_err(|e| UpdaterError::from_reqwest(&e, "download", timeout_secs))?;

    if !response.status().is_success() {
        return Err(UpdaterError::DownloadFailed {
            url: request.url.clone(),
            message: format!("HTTP {}", response.status()),
        });
    }

    let total = response.content_length();

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| UpdaterError::from_io(&e, "create download dir", &parent.display().to_string()))?;
    }

    let part = part_path(dest);
    let mut file = tokio::fs::File::create(&part)
        .await
        .map_err(|e| UpdaterError::from_io(&e, "create", &part.display().to_string()))?;

    let mut hasher = Sha256::new();
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| UpdaterError::DownloadFailed {
            url: request.url.clone(),
            message: e.to_string(),
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| UpdaterError::from_io(&e, "write", &part.display().to_string()))?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;

        statuses.write().await.insert(handle, DownloadStatus::Running { downloaded, total });
        let _ = event_tx.send(DownloadEvent::Progress { handle, downloaded, total });
    }

    file.flush()
        .await
        .map_err(|e| UpdaterError::from_io(&e, "flush", &part.display().to_string()))?;
    drop(file);

    if let Some(ref expected) = request.sha256 {
        let actual = hex::encode(hasher.finalize());
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(UpdaterError::ValidationError {
                component: dest_str,
                expected: expected.trim().to_string(),
                actual,
            });
        }
    }

    tokio::fs::rename(&part, dest)
        .await
        .map_err(|e| UpdaterError::from_io(&e, "rename", &dest_str))?;

    Ok(dest.clone())
}

/// 전송 중 임시 파일 경로 (`update.apk` → `update.apk.part`)
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
