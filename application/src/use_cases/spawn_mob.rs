//! Spawn mob use case
//!
//! Builds a mob from a mob package and places its characters on a field:
//!
//! 1. **Build** - load the mob package and run its `package_build(mob)` hook
//! 2. **Resolve** - `requires_character` every FQN the spawners reference; a
//!    single failure aborts the spawn before anything is placed
//! 3. **Place** - check every placement against the field bounds
//! 4. **Spawn** - create each character, put it on the field and run its
//!    `character_init(entity)` hook
//!
//! If step 4 fails, everything the spawn put on the field (characters and
//! whatever their hooks spawned) is taken off again before the error returns.
//!
//! Enemy characters are spawned on [`Team::Blue`].

use crate::ports::script_runtime::{RuntimeError, ScriptRuntimePort};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tactica_domain::{
    DomainError, Entity, EntityId, Field, Handle, Mob, PackageKind, Rank, Shared, SpawnRequest,
    Team, share,
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SpawnMobError {
    #[error("Failed to build mob from {}: {source}", path.display())]
    Build {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },

    #[error("Mob requires '{fqn}': {source}")]
    MissingCharacter {
        fqn: String,
        #[source]
        source: RuntimeError,
    },

    #[error("character_init failed for '{fqn}': {source}")]
    Init {
        fqn: String,
        #[source]
        source: RuntimeError,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone)]
pub struct SpawnMobInput {
    /// Directory of the mob package.
    pub mob_dir: PathBuf,
    pub field: Shared<Field>,
}

impl SpawnMobInput {
    pub fn new(mob_dir: impl Into<PathBuf>, field: Shared<Field>) -> Self {
        Self {
            mob_dir: mob_dir.into(),
            field,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnedCharacter {
    pub id: EntityId,
    pub fqn: String,
    pub rank: Rank,
    pub tile: (i64, i64),
}

#[derive(Debug, Clone, Default)]
pub struct SpawnMobOutput {
    pub spawned: Vec<SpawnedCharacter>,
    pub background: Option<String>,
    pub music: Option<String>,
}

pub struct SpawnMobUseCase {
    runtime: Arc<dyn ScriptRuntimePort>,
}

impl SpawnMobUseCase {
    pub fn new(runtime: Arc<dyn ScriptRuntimePort>) -> Self {
        Self { runtime }
    }

    pub fn execute(&self, input: SpawnMobInput) -> Result<SpawnMobOutput, SpawnMobError> {
        let build_error = |source| SpawnMobError::Build {
            path: input.mob_dir.clone(),
            source,
        };

        // Step 1: build
        self.runtime
            .load_package(&input.mob_dir, PackageKind::Mob)
            .map_err(build_error)?;
        let mob = share(Mob::new());
        self.runtime
            .build_mob(&input.mob_dir, &mob)
            .map_err(build_error)?;

        let handle = Handle::wrap(&mob);
        let (fqns, requests, background, music) = handle.with(|m| {
            Ok::<_, DomainError>((
                m.required_characters()?,
                m.spawn_requests()?,
                m.background().map(str::to_string),
                m.music().map(str::to_string),
            ))
        })??;

        // Step 2: resolve
        for fqn in &fqns {
            self.runtime
                .requires_character(fqn)
                .map_err(|source| SpawnMobError::MissingCharacter {
                    fqn: fqn.clone(),
                    source,
                })?;
        }

        // Step 3: place
        Handle::wrap(&input.field).with(|field| {
            requests
                .iter()
                .find(|r| !field.contains(r.x, r.y))
                .map_or(Ok(()), |r| Err(DomainError::OutOfBounds { x: r.x, y: r.y }))
        })??;

        // Step 4: spawn
        let before = entity_ids(&input.field)?;
        let spawned = match self.spawn_all(&input.field, requests) {
            Ok(spawned) => spawned,
            Err(error) => {
                self.roll_back(&input.field, &before);
                return Err(error);
            }
        };
        let output = SpawnMobOutput {
            spawned,
            background,
            music,
        };

        info!(
            mob = %input.mob_dir.display(),
            spawned = output.spawned.len(),
            "Mob spawned"
        );
        Ok(output)
    }

    fn spawn_all(
        &self,
        field: &Shared<Field>,
        requests: Vec<SpawnRequest>,
    ) -> Result<Vec<SpawnedCharacter>, SpawnMobError> {
        let mut spawned = Vec::with_capacity(requests.len());
        for request in requests {
            let entity = share(Entity::character(&request.fqn, Team::Blue, request.rank));
            let id = Field::spawn(field, entity.clone(), request.x, request.y)?;
            debug!(fqn = %request.fqn, id, x = request.x, y = request.y, "Spawned character");

            self.runtime
                .init_character(&request.fqn, &entity)
                .map_err(|source| SpawnMobError::Init {
                    fqn: request.fqn.clone(),
                    source,
                })?;

            spawned.push(SpawnedCharacter {
                id,
                fqn: request.fqn,
                rank: request.rank,
                tile: (request.x, request.y),
            });
        }
        Ok(spawned)
    }

    /// Take every entity not in `before` off the field and drop its callbacks.
    fn roll_back(&self, field: &Shared<Field>, before: &HashSet<EntityId>) {
        let removed = match entity_ids(field) {
            Ok(now) => Handle::wrap(field).with_mut(|f| {
                now.difference(before)
                    .filter_map(|id| f.remove(*id))
                    .collect::<Vec<_>>()
            }),
            Err(error) => Err(error),
        };
        match removed {
            Ok(removed) => {
                debug!(removed = removed.len(), "Mob spawn rolled back");
                self.runtime.release_entities(&removed);
            }
            Err(error) => warn!(%error, "Could not roll back mob spawn"),
        }
    }
}

fn entity_ids(field: &Shared<Field>) -> Result<HashSet<EntityId>, DomainError> {
    Handle::wrap(field).with(|f| {
        f.entities()
            .iter()
            .filter_map(|e| Handle::wrap(e).with(Entity::id).ok())
            .collect()
    })
}
