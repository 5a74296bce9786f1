//! 설치 프로그램 연동: 받은 패키지를 플랫폼 설치 프로그램에 넘긴다
//!
//! 패키지 무결성은 다운로드 단계의 SHA256 검증(해시가 있을 때)과
//! 플랫폼 설치 프로그램의 서명 검증에 맡긴다.

use std::future::Future;
use std::path::Path;

use tokio::process::Command;

use crate::error::UpdaterError;

/// 패키지 설치 경계
pub trait PackageInstaller: Send + Sync {
    fn install(&self, package: &Path) -> impl Future<Output = Result<(), UpdaterError>> + Send;
}

/// 외부 명령으로 패키지를 여는 설치기 (`<program> <args..> <package>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInstaller {
    program: String,
    args: Vec<String>,
}

impl CommandInstaller {
    /// 설정된 명령 (비어 있으면 플랫폼 기본 오프너)
    pub fn from_command(command: &[String]) -> Self {
        match command.split_first() {
            Some((program, args)) if !program.trim().is_empty() => Self {
                program: program.clone(),
                args: args.to_vec(),
            },
            _ => Self::platform_default(),
        }
    }

    /// 플랫폼 기본 오프너
    pub fn platform_default() -> Self {
        #[cfg(target_os = "windows")]
        {
            Self {
                program: "cmd".to_string(),
                args: vec!["/C".to_string(), "start".to_string(), String::new()],
            }
        }
        #[cfg(target_os = "macos")]
        {
            Self { program: "open".to_string(), args: Vec::new() }
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            Self { program: "xdg-open".to_string(), args: Vec::new() }
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl PackageInstaller for CommandInstaller {
    async fn install(&self, package: &Path) -> Result<(), UpdaterError> {
        if !package.is_file() {
            return Err(UpdaterError::InstallerError {
                message: format!("package not found: {}", package.display()),
            });
        }

        tracing::info!("[Installer] {} {:?} {}", self.program, self.args, package.display());

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(package)
            .status()
            .await
            .map_err(|e| UpdaterError::InstallerError {
                message: format!("failed to launch '{}': {}", self.program, e),
            })?;

        if !status.success() {
            return Err(UpdaterError::InstallerError {
                message: format!("'{}' exited with {:?}", self.program, status.code()),
            });
        }

        Ok(())
    }
}
