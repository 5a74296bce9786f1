//! 업데이트 확인 서비스
//!
//! `UpdateSource` 트레이트 뒤에 실제 HTTP 구현(`HttpUpdateSource`)을 둔다.
//! 테스트나 다른 배포 채널은 트레이트를 직접 구현해 주입한다.

use std::future::Future;
use std::time::Duration;

use crate::descriptor::VersionDescriptor;
use crate::error::{ErrorContext, UpdaterError};
use crate::version::{self, VersionScheme};
use crate::{UpdateCheck, UpdateConfig};

/// 주입 가능한 업데이트 확인 서비스
pub trait UpdateSource: Send + Sync {
    /// 현재 설치된 버전과 원격 버전을 비교한다. 실패는 `UpdateCheck::Failed`로 돌려준다.
    fn check_for_update(&self, current_version: &str) -> impl Future<Output = UpdateCheck> + Send;
}

/// HTTP 엔드포인트에서 버전 디스크립터를 가져오는 구현
pub struct HttpUpdateSource {
    http: reqwest::Client,
    endpoint: String,
    scheme: VersionScheme,
    timeout_secs: u64,
    fallback_download_url: Option<String>,
}

impl HttpUpdateSource {
    pub fn new(config: &UpdateConfig) -> Result<Self, UpdaterError> {
        let endpoint = config.endpoint.trim();
        if endpoint.is_empty() {
            return Err(UpdaterError::ConfigError {
                message: "updater.endpoint is not configured".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("yuzu-frontend-updater/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UpdaterError::ConfigError {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            scheme: config.version_scheme,
            timeout_secs: config.timeout_secs,
            fallback_download_url: config.fallback_download_url.clone(),
        })
    }

    /// 엔드포인트에서 디스크립터를 한 번 가져온다 (재시도 없음)
    pub async fn fetch_descriptor(&self) -> Result<VersionDescriptor, UpdaterError> {
        let response = self.http
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| UpdaterError::from_reqwest(&e, "fetch version descriptor", self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpdaterError::ApiError {
                status_code: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| UpdaterError::from_reqwest(&e, "read version descriptor", self.timeout_secs))?;

        VersionDescriptor::parse(&body)
    }
}

impl UpdateSource for HttpUpdateSource {
    async fn check_for_update(&self, current_version: &str) -> UpdateCheck {
        tracing::info!("[Updater] Checking {} (installed: {})", self.endpoint, current_version);

        let descriptor = match self.fetch_descriptor().await {
            Ok(d) => d,
            Err(e) => {
                ErrorContext::new("check_for_update", e.clone()).log();
                return UpdateCheck::Failed(e);
            }
        };

        if version::is_newer(&descriptor.version, current_version, self.scheme) {
            tracing::info!(
                "[Updater] Update available: {} -> {}",
                current_version, descriptor.version
            );
            UpdateCheck::Available(descriptor.into_info(self.fallback_download_url.as_deref()))
        } else {
            tracing::info!(
                "[Updater] Up to date (installed {}, remote {})",
                current_version, descriptor.version
            );
            UpdateCheck::UpToDate
        }
    }
}
