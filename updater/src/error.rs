//! 업데이터 에러 타입
//!
//! ## 지원하는 에러 상황
//! - 네트워크 끊김 / 타임아웃
//! - 버전 엔드포인트 응답 오류 (HTTP 상태, JSON 파싱)
//! - 다운로드 실패 / 체크섬 불일치
//! - 설치 프로그램 실행 실패
//!
//! 자동 재시도는 하지 않는다. 복구는 사용자가 동작을 다시 실행하는 것으로 한다.

use std::fmt;
use serde::{Deserialize, Serialize};

/// 업데이터 에러 타입
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum UpdaterError {
    /// 네트워크 연결 실패
    NetworkError {
        message: String,
        recoverable: bool,
    },
    /// HTTP 요청 타임아웃
    Timeout {
        operation: String,
        duration_secs: u64,
    },
    /// 엔드포인트가 2xx 이외의 상태를 반환
    ApiError {
        status_code: u16,
        message: String,
    },
    /// 버전 디스크립터 파싱 실패
    ParseError {
        message: String,
    },
    /// 다운로드 실패
    DownloadFailed {
        url: String,
        message: String,
    },
    /// 파일 시스템 오류
    FileSystemError {
        operation: String,
        path: String,
        message: String,
    },
    /// 검증 실패 (해시 불일치 등)
    ValidationError {
        component: String,
        expected: String,
        actual: String,
    },
    /// 설치 프로그램 실행 실패
    InstallerError {
        message: String,
    },
    /// 설정 오류
    ConfigError {
        message: String,
    },
}

impl fmt::Display for UpdaterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdaterError::NetworkError { message, .. } => {
                write!(f, "Network error: {}", message)
            }
            UpdaterError::Timeout { operation, duration_secs } => {
                write!(f, "Timeout after {}s: {}", duration_secs, operation)
            }
            UpdaterError::ApiError { status_code, message } => {
                write!(f, "API error ({}): {}", status_code, message)
            }
            UpdaterError::ParseError { message } => {
                write!(f, "Invalid version descriptor: {}", message)
            }
            UpdaterError::DownloadFailed { url, message } => {
                write!(f, "Download of '{}' failed: {}", url, message)
            }
            UpdaterError::FileSystemError { operation, path, message } => {
                write!(f, "File system error during {} on '{}': {}", operation, path, message)
            }
            UpdaterError::ValidationError { component, expected, actual } => {
                write!(
                    f,
                    "Validation failed for {}: expected {}, got {}",
                    component, expected, actual
                )
            }
            UpdaterError::InstallerError { message } => {
                write!(f, "Installer error: {}", message)
            }
            UpdaterError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
        }
    }
}

impl std::error::Error for UpdaterError {}

impl UpdaterError {
    /// 복구 가능한 에러인지 확인 (사용자가 다시 시도하면 성공할 수 있는지)
    pub fn is_recoverable(&self) -> bool {
        match self {
            UpdaterError::NetworkError { recoverable, .. } => *recoverable,
            UpdaterError::Timeout { .. } => true,
            UpdaterError::ApiError { status_code, .. } => {
                // 5xx 에러는 재시도 가능, 4xx는 불가능
                *status_code >= 500
            }
            UpdaterError::ParseError { .. } => false,
            UpdaterError::DownloadFailed { .. } => true,
            UpdaterError::FileSystemError { .. } => false,
            UpdaterError::ValidationError { .. } => true, // 재다운로드로 복구 가능
            UpdaterError::InstallerError { .. } => false,
            UpdaterError::ConfigError { .. } => false,
        }
    }

    /// 사용자에게 표시할 메시지
    pub fn user_message(&self) -> String {
        match self {
            UpdaterError::NetworkError { .. } => {
                "인터넷 연결을 확인해주세요.".to_string()
            }
            UpdaterError::Timeout { .. } => {
                "서버 응답이 지연되고 있습니다. 잠시 후 다시 시도해주세요.".to_string()
            }
            UpdaterError::ApiError { status_code, .. } => {
                if *status_code == 404 {
                    "업데이트 정보를 찾을 수 없습니다.".to_string()
                } else if *status_code >= 500 {
                    "서버에 일시적인 문제가 있습니다. 잠시 후 다시 시도해주세요.".to_string()
                } else {
                    format!("서버 오류 ({})", status_code)
                }
            }
            UpdaterError::ParseError { .. } => {
                "서버가 올바르지 않은 버전 정보를 반환했습니다.".to_string()
            }
            UpdaterError::DownloadFailed { .. } => {
                "업데이트 파일 다운로드에 실패했습니다. 다시 시도해주세요.".to_string()
            }
            UpdaterError::FileSystemError { .. } => {
                "파일 저장 중 오류가 발생했습니다. 디스크 공간을 확인해주세요.".to_string()
            }
            UpdaterError::ValidationError { .. } => {
                "다운로드 파일 검증에 실패했습니다. 다시 다운로드해주세요.".to_string()
            }
            UpdaterError::InstallerError { message } => {
                format!("설치 프로그램을 실행하지 못했습니다: {}", message)
            }
            UpdaterError::ConfigError { message } => {
                format!("설정 오류: {}", message)
            }
        }
    }

    /// reqwest 에러를 UpdaterError로 변환
    pub fn from_reqwest(err: &reqwest::Error, operation: &str, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            UpdaterError::Timeout {
                operation: operation.to_string(),
                duration_secs: timeout_secs,
            }
        } else if err.is_connect() {
            UpdaterError::NetworkError {
                message: format!("connection failed: {}", err),
                recoverable: true,
            }
        } else if let Some(status) = err.status() {
            UpdaterError::ApiError {
                status_code: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            UpdaterError::ParseError {
                message: err.to_string(),
            }
        } else {
            UpdaterError::NetworkError {
                message: err.to_string(),
                recoverable: err.is_request() || err.is_body(),
            }
        }
    }

    /// IO 에러를 UpdaterError로 변환
    pub fn from_io(err: &std::io::Error, operation: &str, path: &str) -> Self {
        UpdaterError::FileSystemError {
            operation: operation.to_string(),
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

/// 에러 컨텍스트 (로깅용)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    pub timestamp: String,
    pub operation: String,
    pub error: UpdaterError,
}

impl ErrorContext {
    pub fn new(operation: &str, error: UpdaterError) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            operation: operation.to_string(),
            error,
        }
    }

    /// 로그 출력
    pub fn log(&self) {
        if self.error.is_recoverable() {
            tracing::warn!(
                "[Error] {} (recoverable) at {}: {}",
                self.operation,
                self.timestamp,
                self.error
            );
        } else {
            tracing::error!(
                "[Error] {} (fatal) at {}: {}",
                self.operation,
                self.timestamp,
                self.error
            );
        }
    }
}
