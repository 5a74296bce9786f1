//! 추가 콘텐츠(업데이트/DLC) 검증 및 NAND 설치

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ImportError;
use crate::native::{InstallResult, NativeBoundary};

use super::ImportContext;

/// 파일별 설치 결과 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentInstallSummary {
    pub success: usize,
    pub overwritten: usize,
    pub error_base_game: usize,
    pub error_extension: usize,
    pub error_other: usize,
}

impl ContentInstallSummary {
    pub fn record(&mut self, result: InstallResult) {
        match result {
            InstallResult::Success => self.success += 1,
            InstallResult::SuccessOverwritten => self.overwritten += 1,
            InstallResult::ErrorBaseGame => self.error_base_game += 1,
            InstallResult::ErrorExtension => self.error_extension += 1,
            InstallResult::ErrorOther => self.error_other += 1,
        }
    }

    pub fn error_total(&self) -> usize {
        self.error_base_game + self.error_extension + self.error_other
    }

    pub fn is_success(&self) -> bool {
        self.error_total() == 0
    }

    /// 한 번에 보여줄 요약 메시지
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        if self.success > 0 {
            lines.push(format!("Successfully installed {} file(s)", self.success));
        }
        if self.overwritten > 0 {
            lines.push(format!("Successfully overwrote {} file(s)", self.overwritten));
        }

        let errors = self.error_total();
        if errors > 0 {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(format!("Failed to install {} file(s)", errors));
            if self.error_base_game > 0 {
                lines.push(format!(
                    "- {} update/DLC file(s) need the base game installed first",
                    self.error_base_game
                ));
            }
            if self.error_extension > 0 {
                lines.push(format!(
                    "- {} file(s) are not NSP content",
                    self.error_extension
                ));
            }
            if self.error_other > 0 {
                lines.push(format!(
                    "- {} file(s) could not be installed (see log for details)",
                    self.error_other
                ));
            }
        }

        if lines.is_empty() {
            "No content was installed".to_string()
        } else {
            lines.join("\n")
        }
    }
}

impl fmt::Display for ContentInstallSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// 선택된 게임의 프로그램과 모든 문서가 일치하는지 확인. 첫 불일치에서 중단.
pub async fn verify_content<N: NativeBoundary>(
    ctx: &ImportContext<N>,
    documents: &[PathBuf],
    program_id: &str,
) -> Result<(), ImportError> {
    for document in documents {
        if !ctx.native.does_update_match_program(program_id, document).await? {
            tracing::warn!(
                "[Import] {} does not belong to program {}",
                document.display(), program_id
            );
            return Err(ImportError::ContentMismatch {
                program_id: program_id.to_string(),
                document: document.display().to_string(),
            });
        }
    }
    Ok(())
}

/// 문서마다 NAND 설치를 한 번씩 호출하고 결과를 하나로 집계한다.
/// 네이티브 호출 자체가 실패한 파일은 `error_other`로 센다.
pub async fn install_content<N: NativeBoundary>(
    ctx: &ImportContext<N>,
    documents: &[PathBuf],
) -> ContentInstallSummary {
    let mut summary = ContentInstallSummary::default();

    for document in documents {
        let result = install_one(ctx, document).await;
        tracing::debug!("[Import] {} → {:?}", document.display(), result);
        summary.record(result);
    }

    tracing::info!(
        "[Import] Content install: {} ok, {} overwritten, {} failed",
        summary.success, summary.overwritten, summary.error_total()
    );
    summary
}

async fn install_one<N: NativeBoundary>(ctx: &ImportContext<N>, document: &Path) -> InstallResult {
    if !document.is_file() {
        tracing::warn!("[Import] Content file not found: {}", document.display());
        return InstallResult::ErrorOther;
    }

    let extension = document
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ctx.native.install_file_to_nand(document, &extension).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("[Import] Install of {} failed: {}", document.display(), e);
            InstallResult::ErrorOther
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_tallies_mixed_outcomes() {
        let mut summary = ContentInstallSummary::default();
        for result in [
            InstallResult::Success,
            InstallResult::ErrorBaseGame,
            InstallResult::Success,
            InstallResult::SuccessOverwritten,
            InstallResult::ErrorBaseGame,
            InstallResult::Success,
        ] {
            summary.record(result);
        }

        assert_eq!(summary.success, 3);
        assert_eq!(summary.overwritten, 1);
        assert_eq!(summary.error_base_game, 2);
        assert_eq!(summary.error_total(), 2);
        assert!(!summary.is_success());

        let message = summary.render();
        assert!(message.contains("Successfully installed 3 file(s)"));
        assert!(message.contains("Successfully overwrote 1 file(s)"));
        assert!(message.contains("Failed to install 2 file(s)"));
        assert!(message.contains("base game"));
        assert!(!message.contains("NSP"));
    }

    #[test]
    fn empty_summary_renders_placeholder() {
        let summary = ContentInstallSummary::default();
        assert!(summary.is_success());
        assert_eq!(summary.render(), "No content was installed");
    }
}
