//! 키 파일 가져오기 (`prod.keys`, `key_retail.bin`)

use std::path::{Path, PathBuf};

use crate::error::ImportError;
use crate::native::NativeBoundary;

use super::ImportContext;

/// 키 파일 종류별 고정 설치 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFile {
    Prod,
    Amiibo,
}

impl KeyFile {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Prod => "keys",
            Self::Amiibo => "bin",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Prod => "prod.keys",
            Self::Amiibo => "key_retail.bin",
        }
    }

    /// `<user_dir>/keys/<file_name>`
    pub fn destination(self, user_dir: &Path) -> PathBuf {
        user_dir.join("keys").join(self.file_name())
    }
}

pub async fn install_prod_keys<N: NativeBoundary>(
    ctx: &ImportContext<N>,
    src: &Path,
) -> Result<PathBuf, ImportError> {
    install_key_file(ctx, src, KeyFile::Prod).await
}

pub async fn install_amiibo_keys<N: NativeBoundary>(
    ctx: &ImportContext<N>,
    src: &Path,
) -> Result<PathBuf, ImportError> {
    install_key_file(ctx, src, KeyFile::Amiibo).await
}

/// 확장자 확인 → 고정 경로로 복사 → 코어에 재로드 요청
async fn install_key_file<N: NativeBoundary>(
    ctx: &ImportContext<N>,
    src: &Path,
    kind: KeyFile,
) -> Result<PathBuf, ImportError> {
    if !src.is_file() {
        return Err(ImportError::SourceNotFound(src.to_path_buf()));
    }

    let extension = src.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !extension.eq_ignore_ascii_case(kind.extension()) {
        return Err(ImportError::ExtensionMismatch {
            expected: kind.extension().to_string(),
            actual: src
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        });
    }

    let dest = kind.destination(&ctx.user_dir);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(src, &dest).await?;
    tracing::info!("[Import] Copied {} → {}", src.display(), dest.display());

    if !ctx.native.reload_keys().await? {
        tracing::warn!("[Import] Core rejected keys from {}", src.display());
        return Err(ImportError::InvalidKeys);
    }

    tracing::info!("[Import] {} installed and reloaded", kind.file_name());
    Ok(dest)
}
