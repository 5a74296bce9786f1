//! 버전 비교 유틸리티 (외부 크레이트 없이)
//!
//! 두 가지 정렬 방식을 지원한다.
//! - `Lexical`: 문자열 그대로 비교 (`"9"` > `"10"`). 기존 버전 서버와의 호환용 기본값.
//! - `Segmented`: 점으로 구분된 숫자 세그먼트를 튜플로 비교 (`1.10.0` > `1.9.3`).

use std::cmp::Ordering;
use std::fmt;
use serde::{Deserialize, Serialize};

/// 버전 정렬 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionScheme {
    #[default]
    Lexical,
    Segmented,
}

/// 세그먼트 버전 (n.n.n...[-prerelease])
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub segments: Vec<u64>,
    pub prerelease: Option<String>,
}

impl Version {
    /// "v1.2.3", "1.2", "1.0.0-beta.1" 형식을 파싱
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);
        let (version_part, prerelease) = match s.split_once('-') {
            Some((v, pre)) => (v, Some(pre.to_string())),
            None => (s, None),
        };

        if version_part.is_empty() {
            return None;
        }

        let segments = version_part
            .split('.')
            .map(|p| p.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        Some(Self { segments, prerelease })
    }

    /// 프리릴리스 여부
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    fn segment(&self, idx: usize) -> u64 {
        self.segments.get(idx).copied().unwrap_or(0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.segments.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", joined.join("."))?;
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // 1.2 == 1.2.0
        let len = self.segments.len().max(other.segments.len());
        for idx in 0..len {
            match self.segment(idx).cmp(&other.segment(idx)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        // 프리릴리스가 있으면 정식 릴리스보다 낮음
        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 원격 버전이 로컬 버전보다 새로운지 확인
///
/// 원격 버전이 비어 있으면 항상 `false`.
/// `Segmented`에서 어느 한쪽이라도 파싱에 실패하면 문자열 비교로 대체한다.
pub fn is_newer(remote: &str, local: &str, scheme: VersionScheme) -> bool {
    let remote = remote.trim();
    let local = local.trim();
    if remote.is_empty() {
        return false;
    }

    match scheme {
        VersionScheme::Lexical => remote > local,
        VersionScheme::Segmented => match (Version::parse(remote), Version::parse(local)) {
            (Some(r), Some(l)) => r > l,
            _ => {
                tracing::debug!(
                    "[Version] '{}' / '{}' not segmented, falling back to lexical order",
                    remote, local
                );
                remote > local
            }
        },
    }
}
