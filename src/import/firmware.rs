//! 펌웨어 아카이브 가져오기
//!
//! 캐시 디렉터리에 해제한 뒤 최상위 엔트리가 전부 `.nca`인지 확인한다.
//! 하나라도 아니면 설치된 펌웨어는 건드리지 않는다.

use std::path::{Path, PathBuf};

use crate::error::ImportError;
use crate::native::NativeBoundary;

use super::archive;
use super::ImportContext;

pub const FIRMWARE_SUFFIX: &str = ".nca";

/// `<user_dir>/nand/system/Contents/registered`
pub fn firmware_dir(user_dir: &Path) -> PathBuf {
    user_dir.join("nand").join("system").join("Contents").join("registered")
}

/// 접미사 필터를 통과하지 못한 최상위 엔트리
pub fn offending_entries(names: &[String]) -> Vec<String> {
    names
        .iter()
        .filter(|name| !name.ends_with(FIRMWARE_SUFFIX))
        .cloned()
        .collect()
}

/// 펌웨어 설치. 설치된 NCA 엔트리 수 반환.
pub async fn install_firmware<N: NativeBoundary>(
    ctx: &ImportContext<N>,
    src: &Path,
) -> Result<usize, ImportError> {
    if !src.is_file() {
        return Err(ImportError::SourceNotFound(src.to_path_buf()));
    }

    let src = src.to_path_buf();
    let cache_dir = ctx.cache_dir.clone();
    let live = firmware_dir(&ctx.user_dir);

    let installed = tokio::task::spawn_blocking(move || stage_and_commit(&src, &cache_dir, &live))
        .await
        .map_err(|e| anyhow::anyhow!("firmware task failed: {}", e))??;

    ctx.native.initialize_system(true).await?;
    tracing::info!("[Firmware] Installed {} NCA entr(y/ies), system reinitialized", installed);
    Ok(installed)
}

fn stage_and_commit(src: &Path, cache_dir: &Path, live: &Path) -> Result<usize, ImportError> {
    std::fs::create_dir_all(cache_dir)?;
    // TempDir 드롭 시 스테이징 삭제
    let staging = tempfile::Builder::new()
        .prefix("firmware-")
        .tempdir_in(cache_dir)?;

    archive::extract_archive(src, staging.path())?;

    let names = archive::top_level_names(staging.path())?;
    if names.is_empty() {
        return Err(ImportError::EmptyFirmware);
    }
    let offending = offending_entries(&names);
    if !offending.is_empty() {
        tracing::warn!("[Firmware] Rejected archive {}: {:?}", src.display(), offending);
        return Err(ImportError::FirmwareRejected { offending });
    }

    // 캐시와 NAND가 다른 파일시스템일 수 있으므로 live 옆으로 복사 후 rename
    let incoming = archive::sibling_path(live, "incoming");
    archive::remove_dir_if_exists(&incoming)?;
    if let Err(e) = archive::copy_dir_recursive(staging.path(), &incoming)
        .and_then(|_| archive::replace_dir(&incoming, live))
    {
        archive::remove_dir_if_exists(&incoming).ok();
        return Err(e.into());
    }

    tracing::info!("[Firmware] Replaced {}", live.display());
    Ok(names.len())
}
