//! zip 아카이브 / 디렉터리 유틸리티
//!
//! 엔트리 이름은 앞의 `/`를 떼어 정규화하고, `..`나 절대 경로로
//! 대상 디렉터리를 벗어나는 엔트리는 거부한다.

use std::fs;
use std::io::{self, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};

use tokio_util::sync::CancellationToken;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::ImportError;

/// 복사 단위 (취소 확인 주기)
const CHUNK_SIZE: usize = 64 * 1024;

/// 디렉터리 압축 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZipOutcome {
    Completed { entries: usize },
    Cancelled,
}

/// 엔트리 이름 → 대상 기준 상대 경로. 루트 자체(`/`, 빈 이름)는 `None`.
pub fn entry_relative_path(name: &str) -> Result<Option<PathBuf>, ImportError> {
    let trimmed = name.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(None);
    }

    let mut relative = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ImportError::UnsafeEntry(name.to_string()));
            }
        }
    }

    if relative.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(relative))
    }
}

/// 아카이브 전체를 `dest`에 해제. 해제한 파일 수 반환.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<usize, ImportError> {
    let file = fs::File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    fs::create_dir_all(dest)?;

    let mut files = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = match entry_relative_path(entry.name())? {
            Some(relative) => relative,
            None => continue,
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = fs::File::create(&out_path)?;
            io::copy(&mut entry, &mut outfile)?;
            files += 1;
        }
    }
    Ok(files)
}

/// `marker` 엔트리가 있는지 (이름 앞뒤 공백 제거, 앞 `/` 허용)
pub fn contains_entry(archive_path: &Path, marker: &str) -> Result<bool, ImportError> {
    let file = fs::File::open(archive_path)?;
    let archive = ZipArchive::new(file)?;
    let rooted = format!("/{}", marker);
    let found = archive
        .file_names()
        .map(str::trim)
        .any(|name| name == marker || name == rooted);
    Ok(found)
}

/// `root` 아래 전체를 zip으로 기록. 엔트리 이름은 `root` 기준 상대 경로.
///
/// 엔트리마다, 그리고 파일 복사 청크마다 `cancel`을 확인한다.
/// `skip`과 같은 경로(예: 출력 임시 파일 자신)는 건너뛴다.
/// 심볼릭 링크와 특수 파일은 따라가지 않고 건너뛴다.
pub fn zip_directory<W: Write + Seek>(
    root: &Path,
    writer: W,
    cancel: &CancellationToken,
    skip: Option<&Path>,
) -> Result<ZipOutcome, ImportError> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut entries = 0;
    let mut pending = vec![root.to_path_buf()];
    let mut buf = vec![0u8; CHUNK_SIZE];

    while let Some(dir) = pending.pop() {
        let mut children: Vec<(PathBuf, fs::FileType)> = Vec::new();
        for entry in fs::read_dir(&dir)?.flatten() {
            // DirEntry::file_type은 링크를 따라가지 않는다
            if let Ok(file_type) = entry.file_type() {
                children.push((entry.path(), file_type));
            }
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, file_type) in children {
            if cancel.is_cancelled() {
                return Ok(ZipOutcome::Cancelled);
            }
            if skip.map(|s| s == path).unwrap_or(false) {
                continue;
            }

            let name = entry_name(root, &path);
            if file_type.is_dir() {
                zip.add_directory(format!("{}/", name), options)?;
                pending.push(path);
            } else if file_type.is_file() {
                let mut file = fs::File::open(&path)?;
                let len = file.metadata()?.len();
                zip.start_file(name, options.large_file(needs_zip64(len)))?;
                loop {
                    if cancel.is_cancelled() {
                        return Ok(ZipOutcome::Cancelled);
                    }
                    let n = file.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    zip.write_all(&buf[..n])?;
                }
            } else {
                tracing::debug!("[Backup] Skipping non-regular entry {}", path.display());
                continue;
            }
            entries += 1;
        }
    }

    zip.finish()?;
    Ok(ZipOutcome::Completed { entries })
}

/// 4 GiB 근처부터 zip64 헤더 사용. deflate 팽창분만큼 여유를 둔다.
pub fn needs_zip64(len: u64) -> bool {
    len >= (u32::MAX as u64) / 64 * 63
}

/// zip 엔트리 이름은 항상 `/` 구분자
fn entry_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// 최상위 엔트리 이름 목록 (정렬)
pub fn top_level_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

pub fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)?.flatten() {
        let path = entry.path();
        let dest = dst.join(entry.file_name());
        if path.is_dir() {
            copy_dir_recursive(&path, &dest)?;
        } else {
            fs::copy(&path, &dest)?;
        }
    }
    Ok(())
}

pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// `live` 옆의 숨김 형제 경로 (`.<name>.<tag>`)
pub fn sibling_path(live: &Path, tag: &str) -> PathBuf {
    let name = live
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dir".to_string());
    live.with_file_name(format!(".{}.{}", name, tag))
}

/// 상위 디렉터리. 상대 경로 한 단계면 현재 디렉터리.
pub fn parent_or_current(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// `incoming` 디렉터리를 `live` 자리로 교체한다.
///
/// 기존 `live`는 `.previous`로 옮겨 두었다가 교체가 끝나면 지운다.
/// 교체에 실패하면 기존 디렉터리를 되돌린다. `incoming`과 `live`는
/// 같은 파일시스템에 있어야 한다.
pub fn replace_dir(incoming: &Path, live: &Path) -> io::Result<()> {
    let previous = sibling_path(live, "previous");
    remove_dir_if_exists(&previous)?;

    let had_live = live.exists();
    if had_live {
        fs::rename(live, &previous)?;
    } else if let Some(parent) = live.parent() {
        fs::create_dir_all(parent)?;
    }

    if let Err(e) = fs::rename(incoming, live) {
        if had_live {
            if let Err(restore) = fs::rename(&previous, live) {
                tracing::error!(
                    "[Import] Failed to restore {} from {}: {}",
                    live.display(), previous.display(), restore
                );
            }
        }
        return Err(e);
    }

    if had_live {
        if let Err(e) = fs::remove_dir_all(&previous) {
            tracing::warn!("[Import] Could not remove {}: {}", previous.display(), e);
        }
    }
    Ok(())
}
