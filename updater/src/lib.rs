//! # yuzu-frontend 업데이터 라이브러리
//!
//! 앱 업데이트 확인 → 사용자 확인 → 패키지 다운로드 → 설치 프로그램 실행을
//! 하나의 흐름(`UpdateFlow`)으로 묶는다.
//!
//! ## 구성
//! - **source.rs**: `UpdateSource` 트레이트 + HTTP 구현. 실패는 "최신"과 구분되는 별도 결과
//! - **descriptor.rs**: 엔드포인트 JSON 계약 (스키마 버전 + 구버전 필드 별칭)
//! - **version.rs**: 문자열/세그먼트 버전 비교
//! - **download.rs**: 백그라운드 전송, 핸들로 완료 알림 상관
//! - **install.rs**: 플랫폼 설치 프로그램 연동
//! - **error.rs**: 에러 분류 및 로깅
//!
//! 연기(Deferred)된 업데이트는 다시 예약하지 않는다. 실패도 자동 재시도하지 않는다.

// ══════════════════════════════════════════════════════
// 모듈
// ══════════════════════════════════════════════════════

pub mod descriptor;
pub mod download;
pub mod error;
pub mod install;
pub mod source;
pub mod version;


pub use descriptor::VersionDescriptor;
pub use download::{DownloadEvent, DownloadHandle, DownloadManager, DownloadRequest, DownloadStatus};
pub use error::{ErrorContext, UpdaterError};
pub use install::{CommandInstaller, PackageInstaller};
pub use source::{HttpUpdateSource, UpdateSource};
pub use version::VersionScheme;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ══════════════════════════════════════════════════════
// 결과 타입
// ══════════════════════════════════════════════════════

/// 새 버전 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    pub version: String,
    pub release_notes: Option<String>,
    pub download_url: Option<String>,
    pub sha256: Option<String>,
}

/// 업데이트 확인 결과
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateCheck {
    UpToDate,
    Available(UpdateInfo),
    /// 네트워크/파싱 실패. 최신 상태로 간주하지 않는다.
    Failed(UpdaterError),
}

/// 사용자 확인 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptDecision {
    Accepted,
    Deferred,
}

/// 업데이트 적용 여부를 사용자에게 묻는 경계
pub trait UpdatePrompt: Send + Sync {
    fn confirm(&self, info: &UpdateInfo) -> PromptDecision;
}

/// 항상 수락 (`--yes`, 무인 실행)
pub struct AutoAccept;

impl UpdatePrompt for AutoAccept {
    fn confirm(&self, _info: &UpdateInfo) -> PromptDecision {
        PromptDecision::Accepted
    }
}

/// 항상 연기 (확인만 하고 설치하지 않음)
pub struct AlwaysDefer;

impl UpdatePrompt for AlwaysDefer {
    fn confirm(&self, _info: &UpdateInfo) -> PromptDecision {
        PromptDecision::Deferred
    }
}

/// 전체 흐름의 최종 결과
#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    /// 설정에서 업데이트 확인이 꺼져 있음
    Disabled,
    UpToDate,
    Deferred,
    Installed { version: String, package: PathBuf },
    CheckFailed(UpdaterError),
    DownloadFailed(UpdaterError),
    InstallFailed(UpdaterError),
}

// ══════════════════════════════════════════════════════
// 설정
// ══════════════════════════════════════════════════════

/// 업데이트 설정 (`[updater]` 섹션)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub enabled: bool,
    /// 버전 디스크립터 URL
    pub endpoint: String,
    /// 설치된 버전 (기본값: 빌드 버전)
    pub current_version: String,
    pub version_scheme: VersionScheme,
    /// 다운로드 저장 디렉터리 (기본값: 플랫폼 캐시 경로)
    pub download_dir: Option<String>,
    /// 저장할 패키지 파일 이름
    pub package_name: String,
    /// 디스크립터에 download_url이 없을 때 사용할 URL
    pub fallback_download_url: Option<String>,
    /// 설치 명령 (비어 있으면 플랫폼 기본 오프너)
    pub installer_command: Vec<String>,
    /// HTTP 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: String::new(),
            current_version: env!("CARGO_PKG_VERSION").to_string(),
            version_scheme: VersionScheme::default(),
            download_dir: None,
            package_name: "update.apk".to_string(),
            fallback_download_url: None,
            installer_command: Vec::new(),
            timeout_secs: 30,
        }
    }
}

impl UpdateConfig {
    /// 다운로드 디렉터리: 설정값 또는 플랫폼 캐시 경로
    pub fn resolve_download_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.download_dir {
            if !dir.trim().is_empty() {
                return PathBuf::from(dir);
            }
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA")
                .map(|appdata| PathBuf::from(appdata).join("yuzu-frontend").join("updates"))
                .unwrap_or_else(|_| PathBuf::from("./updates"))
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".cache").join("yuzu-frontend").join("updates"))
                .unwrap_or_else(|_| PathBuf::from("./updates"))
        }
    }
}

// ══════════════════════════════════════════════════════
// UpdateFlow
// ══════════════════════════════════════════════════════

/// 확인 → 확인 요청 → 다운로드 → 설치
pub struct UpdateFlow<S, P, I> {
    config: UpdateConfig,
    source: S,
    prompt: P,
    installer: I,
    downloads: DownloadManager,
}

impl<S, P, I> UpdateFlow<S, P, I>
where
    S: UpdateSource,
    P: UpdatePrompt,
    I: PackageInstaller,
{
    pub fn new(
        config: UpdateConfig,
        source: S,
        prompt: P,
        installer: I,
        downloads: DownloadManager,
    ) -> Self {
        Self { config, source, prompt, installer, downloads }
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    pub fn downloads(&self) -> &DownloadManager {
        &self.downloads
    }

    /// 확인만 수행
    pub async fn check(&self) -> UpdateCheck {
        self.source.check_for_update(&self.config.current_version).await
    }

    /// 전체 흐름 실행. 모든 실패는 로그를 남기고 구분된 결과로 돌려준다.
    pub async fn run(&self) -> FlowOutcome {
        if !self.config.enabled {
            tracing::info!("[Updater] Update check disabled in config");
            return FlowOutcome::Disabled;
        }

        let info = match self.check().await {
            UpdateCheck::UpToDate => return FlowOutcome::UpToDate,
            UpdateCheck::Failed(e) => return FlowOutcome::CheckFailed(e),
            UpdateCheck::Available(info) => info,
        };

        if self.prompt.confirm(&info) == PromptDecision::Deferred {
            tracing::info!("[Updater] Update to {} deferred by user", info.version);
            return FlowOutcome::Deferred;
        }

        let url = match info.download_url.clone() {
            Some(url) => url,
            None => {
                let e = UpdaterError::ConfigError {
                    message: format!(
                        "no download_url for version {} and no fallback_download_url configured",
                        info.version
                    ),
                };
                ErrorContext::new("update download", e.clone()).log();
                return FlowOutcome::DownloadFailed(e);
            }
        };

        let destination = self.config.resolve_download_dir().join(&self.config.package_name);
        let handle = self.downloads.enqueue(DownloadRequest {
            url,
            destination,
            sha256: info.sha256.clone(),
        }).await;

        // 실패 로그는 다운로드 매니저가 남긴다
        let package = match self.downloads.wait_for(handle).await {
            Ok(path) => path,
            Err(e) => return FlowOutcome::DownloadFailed(e),
        };

        match self.installer.install(&package).await {
            Ok(()) => {
                tracing::info!("[Updater] Installer launched for {} ({})", info.version, package.display());
                FlowOutcome::Installed { version: info.version, package }
            }
            Err(e) => {
                ErrorContext::new("update install", e.clone()).log();
                FlowOutcome::InstallFailed(e)
            }
        }
    }
}
