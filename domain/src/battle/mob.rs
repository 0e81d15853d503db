//! Mob blueprints built by mob packages before anything is spawned.

use super::enums::Rank;
use crate::core::handle::{Handle, NativeType, Shared, share};
use crate::core::error::DomainError;

/// Places copies of one character at chosen tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spawner {
    fqn: String,
    rank: Rank,
    placements: Vec<(i64, i64)>,
}

impl Spawner {
    pub fn new(fqn: impl Into<String>, rank: Rank) -> Self {
        Self {
            fqn: fqn.into(),
            rank,
            placements: Vec::new(),
        }
    }

    pub fn fqn(&self) -> &str {
        &self.fqn
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn spawn_at(&mut self, x: i64, y: i64) {
        self.placements.push((x, y));
    }

    pub fn placements(&self) -> &[(i64, i64)] {
        &self.placements
    }
}

impl NativeType for Spawner {
    const TYPE_NAME: &'static str = "Spawner";
}

/// One character to place on the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub fqn: String,
    pub rank: Rank,
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Default)]
pub struct Mob {
    background: Option<String>,
    music: Option<String>,
    spawners: Vec<Shared<Spawner>>,
}

impl Mob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn background(&self) -> Option<&str> {
        self.background.as_deref()
    }

    pub fn set_background(&mut self, path: impl Into<String>) {
        self.background = Some(path.into());
    }

    pub fn music(&self) -> Option<&str> {
        self.music.as_deref()
    }

    pub fn set_music(&mut self, path: impl Into<String>) {
        self.music = Some(path.into());
    }

    /// The mob keeps the spawner alive; scripts get a weak handle to it.
    pub fn create_spawner(&mut self, fqn: impl Into<String>, rank: Rank) -> Shared<Spawner> {
        let spawner = share(Spawner::new(fqn, rank));
        self.spawners.push(spawner.clone());
        spawner
    }

    /// Distinct character FQNs in first-seen order.
    pub fn required_characters(&self) -> Result<Vec<String>, DomainError> {
        let mut fqns: Vec<String> = Vec::new();
        for spawner in &self.spawners {
            let fqn = Handle::wrap(spawner).with(|s| s.fqn().to_string())?;
            if !fqns.contains(&fqn) {
                fqns.push(fqn);
            }
        }
        Ok(fqns)
    }

    /// Flatten every spawner into individual placements, in creation order.
    pub fn spawn_requests(&self) -> Result<Vec<SpawnRequest>, DomainError> {
        let mut requests = Vec::new();
        for spawner in &self.spawners {
            Handle::wrap(spawner).with(|s| {
                requests.extend(s.placements().iter().map(|&(x, y)| SpawnRequest {
                    fqn: s.fqn().to_string(),
                    rank: s.rank(),
                    x,
                    y,
                }));
            })?;
        }
        Ok(requests)
    }
}

impl NativeType for Mob {
    const TYPE_NAME: &'static str = "Mob";
}
