//! 프론트엔드 설정 (`config/frontend.toml`)
//!
//! 파일이 없으면 기본값을 쓴다. 경로는 `--config` 또는
//! `YUZU_FRONTEND_CONFIG` 환경변수로 바꿀 수 있다.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use yuzu_frontend_updater::UpdateConfig;

use crate::native::DEFAULT_BRIDGE_TIMEOUT_SECS;

pub const DEFAULT_CONFIG_PATH: &str = "config/frontend.toml";
pub const CONFIG_ENV_VAR: &str = "YUZU_FRONTEND_CONFIG";

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct FrontendConfig {
    /// 사용자 데이터 디렉터리 (키, NAND, 설정)
    pub user_dir: Option<PathBuf>,
    /// 스테이징용 캐시 디렉터리
    pub cache_dir: Option<PathBuf>,
    pub native: NativeConfig,
    pub updater: UpdateConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NativeConfig {
    /// 브리지 실행 명령 (`["yuzu-bridge"]`, `["python3", "bridge.py"]` 등)
    pub bridge: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            bridge: Vec::new(),
            timeout_secs: DEFAULT_BRIDGE_TIMEOUT_SECS,
        }
    }
}

impl FrontendConfig {
    /// 명시 경로 → 환경변수 → 기본 경로 순으로 찾는다.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = Self::resolve_path(explicit);
        if !path.exists() {
            // 명시한 파일이 없으면 오타일 가능성이 높으므로 에러
            if explicit.is_some() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            tracing::debug!("[Config] {} not found, using defaults", path.display());
            return Ok(Self::with_build_version(Self::default()));
        }

        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let cfg = Self::from_toml(&s)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!("[Config] Loaded {}", path.display());
        Ok(cfg)
    }

    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        let has_version = toml::from_str::<toml::Value>(s)?
            .get("updater")
            .and_then(|u| u.get("current_version"))
            .is_some();
        let cfg: Self = toml::from_str(s)?;
        Ok(if has_version { cfg } else { Self::with_build_version(cfg) })
    }

    /// 설치된 버전 기본값은 프론트엔드 빌드 버전
    fn with_build_version(mut cfg: Self) -> Self {
        cfg.updater.current_version = env!("CARGO_PKG_VERSION").to_string();
        cfg
    }

    pub fn resolve_user_dir(&self) -> PathBuf {
        self.user_dir
            .clone()
            .unwrap_or_else(|| resolve_data_dir().join("user"))
    }

    pub fn resolve_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| resolve_data_dir().join("cache"))
    }
}

/// 프론트엔드 데이터 디렉터리
///
/// Windows: `%APPDATA%/yuzu-frontend`
/// Linux/macOS: `~/.config/yuzu-frontend`
pub fn resolve_data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("yuzu-frontend");
        }
    }
    #[cfg(not(target_os = "windows"))]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config").join("yuzu-frontend");
        }
    }
    PathBuf::from(".").join("yuzu-frontend")
}
