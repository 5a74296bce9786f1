//! 가져오기 파이프라인 통합 테스트
//!
//! ## 테스트 시나리오
//! 1. 키: 확장자 검사, 고정 경로 복사, 코어 재로드 결과 처리
//! 2. 펌웨어: 접미사 필터 위반 시 설치된 펌웨어 보존, 통과 시 교체 + 재초기화
//! 3. 추가 콘텐츠: 프로그램 일치 검사, 결과 집계
//! 4. 백업: 마커 없는 아카이브 거부, 가져오기 교체, 내보내기 취소
//! 5. 러너: 동시에 하나만 실행

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use yuzu_frontend::import::{
    backup, content, firmware, keys, ImportContext, ImportJob, ImportRunner, TaskState,
};
use yuzu_frontend::native::{InstallResult, NativeBoundary};
use yuzu_frontend::{ImportError, NativeError};

// ═══════════════════════════════════════════════════════
// 테스트 유틸리티
// ═══════════════════════════════════════════════════════

/// 호출을 기록하는 가짜 코어
struct FakeNative {
    keys_valid: bool,
    /// 이 이름이 포함된 문서는 프로그램 불일치
    mismatch_marker: Option<String>,
    reload_delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeNative {
    fn default() -> Self {
        Self {
            keys_valid: true,
            mismatch_marker: None,
            reload_delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeNative {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

impl NativeBoundary for FakeNative {
    async fn reload_keys(&self) -> Result<bool, NativeError> {
        if !self.reload_delay.is_zero() {
            tokio::time::sleep(self.reload_delay).await;
        }
        self.record("reload_keys");
        Ok(self.keys_valid)
    }

    async fn initialize_system(&self, reload: bool) -> Result<(), NativeError> {
        self.record(format!("initialize_system({})", reload));
        Ok(())
    }

    /// 파일 이름 접두사로 결과 결정: ok / over / base / ext / 그 외
    async fn install_file_to_nand(&self, path: &Path, extension: &str) -> Result<InstallResult, NativeError> {
        let name = file_name(path);
        self.record(format!("install:{}:{}", name, extension));
        Ok(if name.starts_with("ok") {
            InstallResult::Success
        } else if name.starts_with("over") {
            InstallResult::SuccessOverwritten
        } else if name.starts_with("base") {
            InstallResult::ErrorBaseGame
        } else if name.starts_with("ext") {
            InstallResult::ErrorExtension
        } else if name.starts_with("crash") {
            return Err(NativeError::CallFailed {
                function: "install_file_to_nand".into(),
                message: "core crashed".into(),
            });
        } else {
            InstallResult::ErrorOther
        })
    }

    async fn does_update_match_program(&self, program_id: &str, path: &Path) -> Result<bool, NativeError> {
        let name = file_name(path);
        self.record(format!("match:{}:{}", program_id, name));
        Ok(match self.mismatch_marker {
            Some(ref marker) => !name.contains(marker.as_str()),
            None => true,
        })
    }

    async fn unload_global_config(&self) -> Result<(), NativeError> {
        self.record("unload_global_config");
        Ok(())
    }

    async fn initialize_global_config(&self) -> Result<(), NativeError> {
        self.record("initialize_global_config");
        Ok(())
    }
}

struct Fixture {
    tmp: TempDir,
    native: Arc<FakeNative>,
    ctx: ImportContext<FakeNative>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_native(FakeNative::default())
    }

    fn with_native(native: FakeNative) -> Self {
        let tmp = TempDir::new().unwrap();
        let native = Arc::new(native);
        let user_dir = tmp.path().join("user");
        fs::create_dir_all(&user_dir).unwrap();
        let ctx = ImportContext::new(native.clone(), user_dir, tmp.path().join("cache"));
        Self { tmp, native, ctx }
    }

    fn user_dir(&self) -> &Path {
        &self.ctx.user_dir
    }

    fn write(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.tmp.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn write_zip(&self, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = self.tmp.path().join(name);
        let file = fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (entry, content) in entries {
            zip.start_file(*entry, options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    /// 기존 사용자 데이터 배치
    fn seed_user_data(&self) {
        let config = self.user_dir().join("config");
        fs::create_dir_all(&config).unwrap();
        fs::write(config.join("config.ini"), "[UI]\ntheme=dark\n").unwrap();
        fs::write(self.user_dir().join("save.dat"), "old save").unwrap();
    }

    fn seed_firmware(&self) -> PathBuf {
        let live = firmware::firmware_dir(self.user_dir());
        fs::create_dir_all(&live).unwrap();
        fs::write(live.join("old.nca"), "old firmware").unwrap();
        live
    }
}

// ═══════════════════════════════════════════════════════
// 키
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn keys_with_wrong_extension_are_not_copied() {
    let fx = Fixture::new();
    let src = fx.write("prod.txt", b"key = value");

    let err = keys::install_prod_keys(&fx.ctx, &src).await.unwrap_err();
    assert!(matches!(err, ImportError::ExtensionMismatch { ref expected, .. } if expected == "keys"));
    assert!(!fx.user_dir().join("keys").exists());
    assert!(fx.native.calls().is_empty());
}

#[tokio::test]
async fn keys_are_copied_and_reloaded() {
    let fx = Fixture::new();
    let src = fx.write("my.keys", b"header_key = 00");

    let dest = keys::install_prod_keys(&fx.ctx, &src).await.unwrap();
    assert_eq!(dest, fx.user_dir().join("keys").join("prod.keys"));
    assert_eq!(fs::read(&dest).unwrap(), b"header_key = 00");
    assert_eq!(fx.native.calls(), vec!["reload_keys"]);
}

#[tokio::test]
async fn keys_rejected_by_core_are_invalid() {
    let fx = Fixture::with_native(FakeNative { keys_valid: false, ..Default::default() });
    let src = fx.write("prod.keys", b"garbage");

    assert!(matches!(
        keys::install_prod_keys(&fx.ctx, &src).await,
        Err(ImportError::InvalidKeys)
    ));
}

#[tokio::test]
async fn amiibo_keys_use_their_own_destination() {
    let fx = Fixture::new();
    let src = fx.write("key_retail.bin", &[0u8; 160]);

    let dest = keys::install_amiibo_keys(&fx.ctx, &src).await.unwrap();
    assert_eq!(dest, fx.user_dir().join("keys").join("key_retail.bin"));

    let wrong = fx.write("prod.keys", b"x");
    assert!(matches!(
        keys::install_amiibo_keys(&fx.ctx, &wrong).await,
        Err(ImportError::ExtensionMismatch { .. })
    ));
}

// ═══════════════════════════════════════════════════════
// 펌웨어
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn firmware_with_foreign_entry_leaves_live_dir_untouched() {
    let fx = Fixture::new();
    let live = fx.seed_firmware();
    let archive = fx.write_zip(
        "firmware.zip",
        &[("a.nca", b"1"), ("b.nca", b"2"), ("readme.txt", b"hi")],
    );

    match firmware::install_firmware(&fx.ctx, &archive).await {
        Err(ImportError::FirmwareRejected { offending }) => assert_eq!(offending, vec!["readme.txt"]),
        other => panic!("expected FirmwareRejected, got {:?}", other),
    }

    assert_eq!(fs::read_to_string(live.join("old.nca")).unwrap(), "old firmware");
    assert!(!live.join("a.nca").exists());
    assert!(fx.native.calls().is_empty());
}

#[tokio::test]
async fn firmware_replaces_live_dir_and_reinitializes() {
    let fx = Fixture::new();
    let live = fx.seed_firmware();
    let archive = fx.write_zip(
        "firmware.zip",
        &[("a.nca", b"1"), ("b.nca/00", b"split part")],
    );

    let installed = firmware::install_firmware(&fx.ctx, &archive).await.unwrap();
    assert_eq!(installed, 2);
    assert!(live.join("a.nca").is_file());
    assert!(live.join("b.nca").join("00").is_file());
    assert!(!live.join("old.nca").exists());
    assert_eq!(fx.native.calls(), vec!["initialize_system(true)"]);

    // 스테이징은 남지 않는다
    let leftovers: Vec<_> = fs::read_dir(&fx.ctx.cache_dir).unwrap().flatten().collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn empty_firmware_archive_is_rejected() {
    let fx = Fixture::new();
    let live = fx.seed_firmware();
    let archive = fx.write_zip("empty.zip", &[]);

    assert!(matches!(
        firmware::install_firmware(&fx.ctx, &archive).await,
        Err(ImportError::EmptyFirmware)
    ));
    assert!(live.join("old.nca").exists());
}

// ═══════════════════════════════════════════════════════
// 추가 콘텐츠
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn content_outcomes_are_aggregated_once() {
    let fx = Fixture::new();
    let documents: Vec<PathBuf> = ["ok1.nsp", "ok2.nsp", "ok3.NSP", "over1.nsp", "base1.nsp", "base2.nsp"]
        .iter()
        .map(|name| fx.write(name, b"content"))
        .collect();

    let summary = content::install_content(&fx.ctx, &documents).await;
    assert_eq!(summary.success, 3);
    assert_eq!(summary.overwritten, 1);
    assert_eq!(summary.error_base_game, 2);
    assert_eq!(summary.error_extension, 0);
    assert_eq!(summary.error_other, 0);
    assert_eq!(summary.error_total(), 2);

    // 확장자는 소문자로 전달
    assert!(fx.native.calls().contains(&"install:ok3.NSP:nsp".to_string()));
}

#[tokio::test]
async fn native_failure_counts_as_other_error() {
    let fx = Fixture::new();
    let documents = vec![fx.write("ok.nsp", b"c"), fx.write("crash.nsp", b"c")];
    let missing = fx.tmp.path().join("ok-missing.nsp");

    let mut all = documents.clone();
    all.push(missing);
    let summary = content::install_content(&fx.ctx, &all).await;
    assert_eq!(summary.success, 1);
    assert_eq!(summary.error_other, 2);
}

#[tokio::test]
async fn mismatched_content_is_not_installed_without_confirmation() {
    let fx = Fixture::with_native(FakeNative {
        mismatch_marker: Some("other-game".into()),
        ..Default::default()
    });
    let documents = vec![fx.write("ok-update.nsp", b"c"), fx.write("ok-other-game.nsp", b"c")];
    let runner = ImportRunner::new(fx.ctx.clone());

    let report = runner.run(ImportJob::Content {
        documents: documents.clone(),
        program_id: Some("0100000000010000".into()),
        force: false,
    }).await.unwrap();
    assert_eq!(report.state, TaskState::Failed);
    assert_eq!(report.error_code, Some("CONTENT_MISMATCH"));
    assert!(!fx.native.calls().iter().any(|c| c.starts_with("install:")));

    let report = runner.run(ImportJob::Content {
        documents,
        program_id: Some("0100000000010000".into()),
        force: true,
    }).await.unwrap();
    assert_eq!(report.state, TaskState::Completed);
    assert_eq!(report.summary.unwrap().success, 2);
}

// ═══════════════════════════════════════════════════════
// 백업
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn backup_without_marker_leaves_user_data_untouched() {
    let fx = Fixture::new();
    fx.seed_user_data();
    let archive = fx.write_zip("not-a-backup.zip", &[("save.dat", b"new save")]);

    assert!(matches!(
        backup::import_user_data(&fx.ctx, &archive).await,
        Err(ImportError::InvalidBackup)
    ));
    assert_eq!(fs::read_to_string(fx.user_dir().join("save.dat")).unwrap(), "old save");
    assert!(fx.native.calls().is_empty());
}

#[tokio::test]
async fn backup_with_escaping_entry_is_rejected() {
    let fx = Fixture::new();
    fx.seed_user_data();
    let archive = fx.write_zip(
        "evil.zip",
        &[("config/config.ini", b"[UI]"), ("../../outside.txt", b"x")],
    );

    assert!(matches!(
        backup::import_user_data(&fx.ctx, &archive).await,
        Err(ImportError::UnsafeEntry(_))
    ));
    assert_eq!(fs::read_to_string(fx.user_dir().join("save.dat")).unwrap(), "old save");
    assert!(fx.native.calls().is_empty());
}

#[tokio::test]
async fn backup_with_rooted_marker_replaces_user_data() {
    let fx = Fixture::new();
    fx.seed_user_data();
    let archive = fx.write_zip(
        "backup.zip",
        &[("/config/config.ini", b"[UI]\ntheme=light\n"), ("/nand/save.bin", b"restored")],
    );

    let files = backup::import_user_data(&fx.ctx, &archive).await.unwrap();
    assert_eq!(files, 2);
    assert_eq!(
        fs::read_to_string(fx.user_dir().join("config").join("config.ini")).unwrap(),
        "[UI]\ntheme=light\n"
    );
    assert!(fx.user_dir().join("nand").join("save.bin").is_file());
    assert!(!fx.user_dir().join("save.dat").exists());
    assert_eq!(
        fx.native.calls(),
        vec!["unload_global_config", "initialize_system(true)", "initialize_global_config"]
    );
}

#[tokio::test]
async fn exported_backup_can_be_imported_again() {
    let fx = Fixture::new();
    fx.seed_user_data();
    let dest = fx.tmp.path().join("exports").join("backup.zip");

    let state = backup::export_user_data(&fx.ctx, &dest, CancellationToken::new()).await.unwrap();
    assert_eq!(state, TaskState::Completed);
    assert!(dest.is_file());

    fs::write(fx.user_dir().join("save.dat"), "changed after export").unwrap();
    backup::import_user_data(&fx.ctx, &dest).await.unwrap();
    assert_eq!(fs::read_to_string(fx.user_dir().join("save.dat")).unwrap(), "old save");
}

#[tokio::test]
async fn export_into_user_dir_skips_its_own_archive() {
    let fx = Fixture::new();
    fx.seed_user_data();
    let dest = fx.user_dir().join("backup.zip");

    let state = backup::export_user_data(&fx.ctx, &dest, CancellationToken::new()).await.unwrap();
    assert_eq!(state, TaskState::Completed);

    let archive = zip::ZipArchive::new(fs::File::open(&dest).unwrap()).unwrap();
    assert!(archive.file_names().any(|n| n == "config/config.ini"));
    assert!(!archive.file_names().any(|n| n.contains("user-export")));
}

#[tokio::test]
async fn cancelled_export_leaves_no_output() {
    let fx = Fixture::new();
    fx.seed_user_data();
    let exports = fx.tmp.path().join("exports");
    let dest = exports.join("backup.zip");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let runner = ImportRunner::new(fx.ctx.clone());
    let report = runner.run(ImportJob::BackupExport { destination: dest.clone(), cancel }).await.unwrap();

    assert_eq!(report.state, TaskState::Cancelled);
    assert!(!dest.exists());
    let leftovers: Vec<_> = fs::read_dir(&exports).unwrap().flatten().collect();
    assert!(leftovers.is_empty());
}

/// 압축되지 않는 의사 난수 바이트
fn noise(len: usize, mut seed: u32) -> Vec<u8> {
    (0..len)
        .map(|_| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed as u8
        })
        .collect()
}

#[tokio::test]
async fn export_cancelled_while_writing_removes_partial_archive() {
    let fx = Fixture::new();
    fx.seed_user_data();
    let saves = fx.user_dir().join("nand").join("saves");
    fs::create_dir_all(&saves).unwrap();
    for i in 0..40 {
        fs::write(saves.join(format!("slot{:02}.bin", i)), noise(256 * 1024, i + 1)).unwrap();
    }
    let exports = fx.tmp.path().join("exports");
    fs::create_dir_all(&exports).unwrap();
    let dest = exports.join("backup.zip");

    let cancel = CancellationToken::new();
    let runner = ImportRunner::new(fx.ctx.clone());
    let handle = runner
        .spawn(ImportJob::BackupExport { destination: dest.clone(), cancel: cancel.clone() })
        .unwrap();

    // 임시 아카이브가 1 MiB를 넘기면 취소
    let mut observed = 0;
    while !handle.is_finished() {
        let partial = fs::read_dir(&exports)
            .unwrap()
            .flatten()
            .find(|e| e.file_name().to_string_lossy().starts_with(".user-export-"));
        if let Some(entry) = partial {
            observed = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if observed > 1024 * 1024 {
                cancel.cancel();
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let report = handle.await.unwrap();
    assert!(observed > 1024 * 1024, "export finished before it could be cancelled");
    assert_eq!(report.state, TaskState::Cancelled);
    assert!(!dest.exists());
    let leftovers: Vec<_> = fs::read_dir(&exports).unwrap().flatten().collect();
    assert!(leftovers.is_empty(), "partial archive left behind: {:?}", leftovers);
}

/// 4 GiB를 넘는 파일 (희소 파일이라 디스크는 거의 쓰지 않는다)
#[cfg(unix)]
#[tokio::test]
async fn export_handles_files_over_4gib() {
    let fx = Fixture::new();
    fx.seed_user_data();
    let registered = fx.user_dir().join("nand").join("user").join("Contents").join("registered");
    fs::create_dir_all(&registered).unwrap();
    let big_len = 4 * 1024 * 1024 * 1024 + 1024 * 1024;
    let big = fs::File::create(registered.join("big.nca")).unwrap();
    big.set_len(big_len).unwrap();
    drop(big);
    let dest = fx.tmp.path().join("exports").join("backup.zip");

    let state = backup::export_user_data(&fx.ctx, &dest, CancellationToken::new()).await.unwrap();
    assert_eq!(state, TaskState::Completed);

    let mut archive = zip::ZipArchive::new(fs::File::open(&dest).unwrap()).unwrap();
    let entry = archive.by_name("nand/user/Contents/registered/big.nca").unwrap();
    assert_eq!(entry.size(), big_len);
    drop(entry);
    assert!(archive.by_name("config/config.ini").is_ok());
}

#[cfg(unix)]
#[tokio::test]
async fn export_skips_symlinked_directories() {
    let fx = Fixture::new();
    fx.seed_user_data();
    std::os::unix::fs::symlink(fx.user_dir(), fx.user_dir().join("config").join("self")).unwrap();
    let dest = fx.tmp.path().join("exports").join("backup.zip");

    let state = backup::export_user_data(&fx.ctx, &dest, CancellationToken::new()).await.unwrap();
    assert_eq!(state, TaskState::Completed);

    let archive = zip::ZipArchive::new(fs::File::open(&dest).unwrap()).unwrap();
    assert!(archive.file_names().any(|n| n == "config/config.ini"));
    assert!(!archive.file_names().any(|n| n.starts_with("config/self")));
}

// ═══════════════════════════════════════════════════════
// 러너
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn second_job_while_running_is_busy() {
    let fx = Fixture::with_native(FakeNative {
        reload_delay: Duration::from_millis(300),
        ..Default::default()
    });
    let src = fx.write("prod.keys", b"k");
    let runner = ImportRunner::new(fx.ctx.clone());

    let first = runner.spawn(ImportJob::Keys { source: src.clone() }).unwrap();
    assert!(runner.is_busy());
    assert!(matches!(
        runner.spawn(ImportJob::Keys { source: src.clone() }),
        Err(ImportError::Busy)
    ));

    let report = first.await.unwrap();
    assert_eq!(report.state, TaskState::Completed);
    assert!(!runner.is_busy());

    // 끝난 뒤에는 다시 실행 가능
    let report = runner.run(ImportJob::Keys { source: src }).await.unwrap();
    assert_eq!(report.state, TaskState::Completed);
}

#[tokio::test]
async fn failed_job_reports_error_code() {
    let fx = Fixture::new();
    let runner = ImportRunner::new(fx.ctx.clone());
    let report = runner
        .run(ImportJob::Firmware { source: fx.tmp.path().join("missing.zip") })
        .await
        .unwrap();

    assert_eq!(report.state, TaskState::Failed);
    assert_eq!(report.error_code, Some("SOURCE_NOT_FOUND"));
}

#[tokio::test]
async fn rejected_job_is_marked_untouched() {
    let fx = Fixture::new();
    fx.seed_firmware();
    let archive = fx.write_zip("firmware.zip", &[("a.nca", b"a"), ("readme.txt", b"hi")]);
    let runner = ImportRunner::new(fx.ctx.clone());

    let report = runner.run(ImportJob::Firmware { source: archive }).await.unwrap();
    assert_eq!(report.state, TaskState::Failed);
    assert!(report.untouched);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["error_code"], "FIRMWARE_REJECTED");
    assert_eq!(json["untouched"], true);
}

#[tokio::test]
async fn keys_rejected_by_core_are_not_untouched() {
    let fx = Fixture::with_native(FakeNative { keys_valid: false, ..Default::default() });
    let src = fx.write("prod.keys", b"bad");
    let runner = ImportRunner::new(fx.ctx.clone());

    // 키는 이미 복사된 뒤에 거부된다
    let report = runner.run(ImportJob::Keys { source: src }).await.unwrap();
    assert_eq!(report.state, TaskState::Failed);
    assert_eq!(report.error_code, Some("INVALID_KEYS"));
    assert!(!report.untouched);
    assert!(serde_json::to_value(&report).unwrap().get("untouched").is_none());
}
