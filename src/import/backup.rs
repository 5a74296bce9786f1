//! 사용자 데이터 백업 내보내기 / 가져오기
//!
//! 백업은 사용자 디렉터리 전체를 담은 zip이며, `config/config.ini` 엔트리
//! 유무만으로 유효한 백업인지 판단한다.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::error::ImportError;
use crate::native::NativeBoundary;

use super::archive::{self, ZipOutcome};
use super::{ImportContext, TaskState};

/// 백업 판별용 엔트리
pub const BACKUP_MARKER: &str = "config/config.ini";

/// 사용자 디렉터리를 `dest`로 내보낸다.
///
/// `dest` 옆 임시 파일에 기록하다가 완료되면 제자리로 옮긴다.
/// 취소되면 `TaskState::Cancelled`이고 `dest`에는 아무 파일도 생기지 않는다.
pub async fn export_user_data<N: NativeBoundary>(
    ctx: &ImportContext<N>,
    dest: &Path,
    cancel: CancellationToken,
) -> Result<TaskState, ImportError> {
    let user_dir = ctx.user_dir.clone();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || export_blocking(&user_dir, &dest, &cancel))
        .await
        .map_err(|e| anyhow::anyhow!("export task failed: {}", e))?
}

fn export_blocking(
    user_dir: &Path,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<TaskState, ImportError> {
    if !user_dir.is_dir() {
        return Err(ImportError::SourceNotFound(user_dir.to_path_buf()));
    }

    let parent = archive::parent_or_current(dest);
    std::fs::create_dir_all(parent)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".user-export-")
        .suffix(".zip.part")
        .tempfile_in(parent)?;

    // 내보낼 파일을 사용자 디렉터리 안에 둔 경우 자기 자신은 제외
    let root = user_dir.canonicalize()?;
    let skip = temp.path().canonicalize().ok();

    tracing::info!("[Backup] Exporting {} → {}", root.display(), dest.display());
    match archive::zip_directory(&root, temp.as_file_mut(), cancel, skip.as_deref())? {
        ZipOutcome::Cancelled => {
            tracing::info!("[Backup] Export cancelled, discarding partial archive");
            Ok(TaskState::Cancelled)
        }
        ZipOutcome::Completed { entries } => {
            temp.persist(dest).map_err(|e| e.error)?;
            tracing::info!("[Backup] Exported {} entr(y/ies) to {}", entries, dest.display());
            Ok(TaskState::Completed)
        }
    }
}

/// 백업 아카이브로 사용자 데이터를 교체한다. 해제한 파일 수 반환.
///
/// 마커가 없거나 안전하지 않은 엔트리가 있으면 기존 데이터는 그대로 남는다.
pub async fn import_user_data<N: NativeBoundary>(
    ctx: &ImportContext<N>,
    src: &Path,
) -> Result<usize, ImportError> {
    if !src.is_file() {
        return Err(ImportError::SourceNotFound(src.to_path_buf()));
    }

    let src_owned = src.to_path_buf();
    let user_dir = ctx.user_dir.clone();
    let (staged, files) = tokio::task::spawn_blocking(move || stage_backup(&src_owned, &user_dir))
        .await
        .map_err(|e| anyhow::anyhow!("backup staging task failed: {}", e))??;

    let committed = commit_backup(ctx, &staged).await;
    archive::remove_dir_if_exists(&staged).ok();
    committed?;

    tracing::info!("[Backup] Imported {} file(s) from {}", files, src.display());
    Ok(files)
}

/// 마커 확인 후 사용자 디렉터리 옆 스테이징에 해제
fn stage_backup(src: &Path, user_dir: &Path) -> Result<(PathBuf, usize), ImportError> {
    if !archive::contains_entry(src, BACKUP_MARKER)? {
        tracing::warn!("[Backup] {} has no {} entry", src.display(), BACKUP_MARKER);
        return Err(ImportError::InvalidBackup);
    }

    let parent = archive::parent_or_current(user_dir);
    std::fs::create_dir_all(parent)?;
    let staging = tempfile::Builder::new()
        .prefix(".user-import-")
        .tempdir_in(parent)?;

    let files = archive::extract_archive(src, staging.path())?;
    Ok((staging.into_path(), files))
}

/// 설정 언로드 → 디렉터리 교체 → 시스템/설정 재초기화
async fn commit_backup<N: NativeBoundary>(
    ctx: &ImportContext<N>,
    staged: &Path,
) -> Result<(), ImportError> {
    ctx.native.unload_global_config().await?;

    let swap = {
        let staged = staged.to_path_buf();
        let user_dir = ctx.user_dir.clone();
        tokio::task::spawn_blocking(move || archive::replace_dir(&staged, &user_dir))
            .await
            .map_err(|e| anyhow::anyhow!("backup swap task failed: {}", e))?
    };
    if let Err(e) = swap {
        // 기존 데이터가 복원된 상태이므로 설정을 다시 올린다
        if let Err(reload) = ctx.native.initialize_global_config().await {
            tracing::error!("[Backup] Config reload after failed swap also failed: {}", reload);
        }
        return Err(e.into());
    }

    ctx.native.initialize_system(true).await?;
    ctx.native.initialize_global_config().await?;
    Ok(())
}
