//! 버전 디스크립터: 업데이트 엔드포인트가 반환하는 JSON 계약
//!
//! ```json
//! {
//!   "schema": 1,
//!   "version": "1.2.3",
//!   "release_notes": "- Fixed bugs",
//!   "download_url": "https://example.com/yuzu-1.2.3.apk",
//!   "sha256": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//! }
//! ```
//!
//! 기존 서버들이 사용하던 필드 이름(`versionName`, `notes`, `apk_url` 등)도 별칭으로 받는다.

use serde::{Deserialize, Serialize};

use crate::error::UpdaterError;
use crate::UpdateInfo;

/// 현재 지원하는 디스크립터 스키마 버전
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema() -> u32 {
    SCHEMA_VERSION
}

/// 엔드포인트 응답 (필요한 필드만)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    #[serde(default = "default_schema")]
    pub schema: u32,
    #[serde(alias = "versionName", alias = "version_name")]
    pub version: String,
    #[serde(default, alias = "notes", alias = "changelog")]
    pub release_notes: Option<String>,
    #[serde(default, alias = "url", alias = "apk_url")]
    pub download_url: Option<String>,
    /// 선택: 패키지 SHA256 해시 (hex)
    #[serde(default)]
    pub sha256: Option<String>,
}

impl VersionDescriptor {
    /// 응답 본문 파싱 + 스키마 검증
    pub fn parse(body: &str) -> Result<Self, UpdaterError> {
        let descriptor: VersionDescriptor = serde_json::from_str(body).map_err(|e| {
            UpdaterError::ParseError { message: e.to_string() }
        })?;

        if descriptor.schema != SCHEMA_VERSION {
            return Err(UpdaterError::ParseError {
                message: format!(
                    "unsupported descriptor schema {} (expected {})",
                    descriptor.schema, SCHEMA_VERSION
                ),
            });
        }

        if descriptor.version.trim().is_empty() {
            return Err(UpdaterError::ParseError {
                message: "empty version field".to_string(),
            });
        }

        Ok(descriptor)
    }

    /// 다운로드 URL이 없으면 `fallback_url`로 채워 `UpdateInfo`를 만든다
    pub fn into_info(self, fallback_url: Option<&str>) -> UpdateInfo {
        let download_url = self
            .download_url
            .filter(|u| !u.trim().is_empty())
            .or_else(|| fallback_url.map(str::to_string));

        UpdateInfo {
            version: self.version.trim().to_string(),
            release_notes: self.release_notes,
            download_url,
            sha256: self.sha256.filter(|h| !h.trim().is_empty()),
        }
    }
}
