//! 가져오기/네이티브 경계 에러 타입: 에러 종류를 구분하여
//! CLI가 적절한 메시지와 종료 코드를 고를 수 있게 합니다.

use std::path::PathBuf;

/// 네이티브 코어 호출 실패
#[derive(thiserror::Error, Debug)]
pub enum NativeError {
    #[error("Native bridge is not configured")]
    NotConfigured,

    #[error("Native bridge '{0}' could not be started: {1}")]
    Spawn(String, std::io::Error),

    #[error("Native call '{function}' failed: {message}")]
    CallFailed { function: String, message: String },

    #[error("Native call '{0}' timed out after {1}s")]
    Timeout(String, u64),

    #[error("Native call '{function}' returned an invalid response: {message}")]
    InvalidResponse { function: String, message: String },
}

/// 가져오기 작업 중 발생할 수 있는 에러 유형
#[derive(thiserror::Error, Debug)]
pub enum ImportError {
    #[error("Source file '{0}' does not exist")]
    SourceNotFound(PathBuf),

    #[error("Expected a .{expected} file, got '{actual}'")]
    ExtensionMismatch { expected: String, actual: String },

    #[error("Keys were copied but the emulator core rejected them")]
    InvalidKeys,

    #[error("Firmware archive rejected: {} unexpected entr(y/ies): {}", .offending.len(), .offending.join(", "))]
    FirmwareRejected { offending: Vec<String> },

    #[error("Firmware archive contains no entries")]
    EmptyFirmware,

    #[error("'{document}' does not match the selected game's program {program_id}")]
    ContentMismatch { program_id: String, document: String },

    #[error("Archive is not a user data backup (missing config/config.ini)")]
    InvalidBackup,

    #[error("Archive entry '{0}' escapes the destination directory")]
    UnsafeEntry(String),

    #[error("Another import is already running")]
    Busy,

    #[error(transparent)]
    Native(#[from] NativeError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl ImportError {
    /// 머신 리더블 에러 코드
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            Self::ExtensionMismatch { .. } => "EXTENSION_MISMATCH",
            Self::InvalidKeys => "INVALID_KEYS",
            Self::FirmwareRejected { .. } => "FIRMWARE_REJECTED",
            Self::EmptyFirmware => "FIRMWARE_EMPTY",
            Self::ContentMismatch { .. } => "CONTENT_MISMATCH",
            Self::InvalidBackup => "INVALID_BACKUP",
            Self::UnsafeEntry(_) => "UNSAFE_ARCHIVE_ENTRY",
            Self::Busy => "IMPORT_BUSY",
            Self::Native(_) => "NATIVE_ERROR",
            Self::Archive(_) => "ARCHIVE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 상태를 바꾸기 전에 거부된 에러인지 (사용자 데이터가 그대로 남음)
    pub fn rejected_before_commit(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound(_)
                | Self::ExtensionMismatch { .. }
                | Self::FirmwareRejected { .. }
                | Self::EmptyFirmware
                | Self::ContentMismatch { .. }
                | Self::InvalidBackup
                | Self::UnsafeEntry(_)
                | Self::Busy
        )
    }

    /// JSON 에러 응답 생성
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "error_code": self.error_code(),
        })
    }
}
