//! 네이티브 에뮬레이터 코어 경계
//!
//! 키 재로드, 시스템 재초기화, NAND 설치, 업데이트-프로그램 일치 검사,
//! 전역 설정 언로드/초기화를 모두 실패 가능한 호출로 모델링한다.
//!
//! 실제 구현(`BridgeNative`)은 코어를 감싼 외부 브리지 실행 파일을 호출당 한 번 실행한다:
//! `<bridge..> <function>` + stdin JSON 인자 → stdout JSON 결과
//! (`{"ok": true, "value": ...}` 또는 `{"ok": false, "error": "..."}`).

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::NativeError;

/// 기본 브리지 호출 타임아웃 (초)
pub const DEFAULT_BRIDGE_TIMEOUT_SECS: u64 = 120;

/// NAND 설치 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallResult {
    Success,
    SuccessOverwritten,
    ErrorBaseGame,
    ErrorExtension,
    #[serde(other)]
    ErrorOther,
}

/// 네이티브 코어에 대한 호출 모음
pub trait NativeBoundary: Send + Sync {
    /// 키 파일 재로드. 코어가 키를 거부하면 `Ok(false)`.
    fn reload_keys(&self) -> impl Future<Output = Result<bool, NativeError>> + Send;

    fn initialize_system(&self, reload: bool) -> impl Future<Output = Result<(), NativeError>> + Send;

    fn install_file_to_nand(
        &self,
        path: &Path,
        extension: &str,
    ) -> impl Future<Output = Result<InstallResult, NativeError>> + Send;

    fn does_update_match_program(
        &self,
        program_id: &str,
        path: &Path,
    ) -> impl Future<Output = Result<bool, NativeError>> + Send;

    fn unload_global_config(&self) -> impl Future<Output = Result<(), NativeError>> + Send;

    fn initialize_global_config(&self) -> impl Future<Output = Result<(), NativeError>> + Send;
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

/// 외부 브리지 실행 파일로 코어를 호출하는 구현
#[derive(Debug, Clone)]
pub struct BridgeNative {
    /// 실행 파일 + 앞에 붙일 인자 (예: `["python3", "bridge.py"]`)
    command: Vec<String>,
    user_dir: PathBuf,
    timeout_secs: u64,
}

impl BridgeNative {
    pub fn new(command: Vec<String>, user_dir: PathBuf, timeout_secs: u64) -> Self {
        Self { command, user_dir, timeout_secs }
    }

    /// 브리지 한 번 실행 → `value` 반환
    pub async fn call(&self, function: &str, args: Value) -> Result<Value, NativeError> {
        let (exe, prefix) = match self.command.split_first() {
            Some((exe, prefix)) if !exe.trim().is_empty() => (exe, prefix),
            _ => return Err(NativeError::NotConfigured),
        };
        tracing::debug!("[Native] {} {:?} {} {}", exe, prefix, function, args);

        let mut cmd = Command::new(exe);
        cmd.args(prefix)
            .arg(function)
            .env("YUZU_USER_DIR", &self.user_dir)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        hide_console_window(&mut cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| NativeError::Spawn(exe.clone(), e))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = args.to_string();
            stdin.write_all(payload.as_bytes()).await.map_err(|e| NativeError::CallFailed {
                function: function.to_string(),
                message: format!("failed to write arguments: {}", e),
            })?;
            stdin.shutdown().await.ok();
        }

        let output = match tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        ).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(NativeError::CallFailed {
                    function: function.to_string(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                // wait_with_output 퓨처가 드롭되면서 kill_on_drop으로 프로세스 종료
                tracing::warn!("[Native] {} timed out after {}s", function, self.timeout_secs);
                return Err(NativeError::Timeout(function.to_string(), self.timeout_secs));
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            tracing::debug!("[Native] {} stderr: {}", function, line);
        }

        if !output.status.success() {
            return Err(NativeError::CallFailed {
                function: function.to_string(),
                message: format!("exit {:?}: {}", output.status.code(), stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_response(function, &stdout)
    }

    async fn call_bool(&self, function: &str, args: Value) -> Result<bool, NativeError> {
        let value = self.call(function, args).await?;
        value.as_bool().ok_or_else(|| NativeError::InvalidResponse {
            function: function.to_string(),
            message: format!("expected boolean, got {}", value),
        })
    }
}

fn parse_response(function: &str, stdout: &str) -> Result<Value, NativeError> {
    let response: BridgeResponse = serde_json::from_str(stdout.trim()).map_err(|e| {
        NativeError::InvalidResponse {
            function: function.to_string(),
            message: format!("{} | stdout: {}", e, stdout.trim()),
        }
    })?;

    if !response.ok {
        return Err(NativeError::CallFailed {
            function: function.to_string(),
            message: response.error.unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    Ok(response.value)
}

impl NativeBoundary for BridgeNative {
    async fn reload_keys(&self) -> Result<bool, NativeError> {
        self.call_bool("reload_keys", json!({})).await
    }

    async fn initialize_system(&self, reload: bool) -> Result<(), NativeError> {
        self.call("initialize_system", json!({ "reload": reload })).await.map(|_| ())
    }

    async fn install_file_to_nand(&self, path: &Path, extension: &str) -> Result<InstallResult, NativeError> {
        let value = self.call(
            "install_file_to_nand",
            json!({ "path": path, "extension": extension }),
        ).await?;
        serde_json::from_value(value).map_err(|e| NativeError::InvalidResponse {
            function: "install_file_to_nand".to_string(),
            message: e.to_string(),
        })
    }

    async fn does_update_match_program(&self, program_id: &str, path: &Path) -> Result<bool, NativeError> {
        self.call_bool(
            "does_update_match_program",
            json!({ "program_id": program_id, "path": path }),
        ).await
    }

    async fn unload_global_config(&self) -> Result<(), NativeError> {
        self.call("unload_global_config", json!({})).await.map(|_| ())
    }

    async fn initialize_global_config(&self) -> Result<(), NativeError> {
        self.call("initialize_global_config", json!({})).await.map(|_| ())
    }
}

/// Windows에서 브리지 콘솔 창 숨김
#[cfg(target_os = "windows")]
fn hide_console_window(cmd: &mut Command) {
    const CREATE_NO_WINDOW: u32 = 0x08000000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(target_os = "windows"))]
fn hide_console_window(_cmd: &mut Command) {}
