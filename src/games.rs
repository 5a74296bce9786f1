//! 게임 폴더 목록 (`<user_dir>/config/game_dirs.json`)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDir {
    pub path: String,
    /// 하위 폴더까지 검색
    #[serde(default)]
    pub deep_scan: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyAdded,
}

pub struct GameFolderRegistry {
    state_path: PathBuf,
    dirs: Vec<GameDir>,
}

impl GameFolderRegistry {
    pub fn state_path_for(user_dir: &Path) -> PathBuf {
        user_dir.join("config").join("game_dirs.json")
    }

    /// 저장된 목록을 읽는다. 파일이 없으면 빈 목록.
    pub fn open(user_dir: &Path) -> anyhow::Result<Self> {
        let state_path = Self::state_path_for(user_dir);
        let dirs = if state_path.exists() {
            let content = std::fs::read_to_string(&state_path)?;
            serde_json::from_str(&content)?
        } else {
            Vec::new()
        };
        tracing::debug!("[Games] Loaded {} folder(s) from {}", dirs.len(), state_path.display());
        Ok(Self { state_path, dirs })
    }

    pub fn list(&self) -> &[GameDir] {
        &self.dirs
    }

    /// 이미 있는 경로면 `AlreadyAdded`, 목록은 그대로
    pub fn add(&mut self, path: &Path, deep_scan: bool) -> anyhow::Result<AddOutcome> {
        let key = path.display().to_string();
        if self.dirs.iter().any(|d| d.path == key) {
            return Ok(AddOutcome::AlreadyAdded);
        }
        self.dirs.push(GameDir { path: key, deep_scan });
        self.save()?;
        tracing::info!("[Games] Added folder {} (deep_scan={})", path.display(), deep_scan);
        Ok(AddOutcome::Added)
    }

    /// 삭제했으면 `true`
    pub fn remove(&mut self, path: &Path) -> anyhow::Result<bool> {
        let key = path.display().to_string();
        let before = self.dirs.len();
        self.dirs.retain(|d| d.path != key);
        if self.dirs.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.state_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.dirs)?;
        std::fs::write(&self.state_path, json)?;
        Ok(())
    }
}
