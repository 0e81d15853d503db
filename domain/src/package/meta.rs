//! Package metadata filled in by a package's `package_init` hook.

use super::package_id::PackageId;
use crate::battle::card::CardProperties;
use crate::battle::enums::BlockColor;
use crate::core::error::DomainError;
use crate::core::handle::{NativeType, Shared, share};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageKind {
    Character,
    Player,
    Library,
    Mob,
    Card,
    Block,
}

impl PackageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Player => "player",
            Self::Library => "library",
            Self::Mob => "mob",
            Self::Card => "card",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity fields of a [`PackageMeta`], saved while foreign code runs in its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    package_id: Option<PackageId>,
    name: String,
    description: String,
    preview_texture_path: Option<String>,
}

/// Side length of a block's placement grid.
pub const BLOCK_GRID: usize = 5;

/// Placement data of a navi customization block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockProfile {
    pub color: BlockColor,
    /// Row-major `BLOCK_GRID` x `BLOCK_GRID` occupancy.
    pub shape: Vec<bool>,
    pub is_program: bool,
}

impl Default for BlockProfile {
    fn default() -> Self {
        Self {
            color: BlockColor::White,
            shape: vec![false; BLOCK_GRID * BLOCK_GRID],
            is_program: false,
        }
    }
}

#[derive(Debug)]
pub struct PackageMeta {
    kind: PackageKind,
    package_id: Option<PackageId>,
    name: String,
    description: String,
    preview_texture_path: Option<String>,
    card: Shared<CardProperties>,
    icon_texture_path: Option<String>,
    codes: Vec<String>,
    block: BlockProfile,
}

impl PackageMeta {
    pub fn new(kind: PackageKind) -> Self {
        Self {
            kind,
            package_id: None,
            name: String::new(),
            description: String::new(),
            preview_texture_path: None,
            card: share(CardProperties::default()),
            icon_texture_path: None,
            codes: Vec::new(),
            block: BlockProfile::default(),
        }
    }

    fn require(&self, expected: PackageKind, method: &'static str) -> Result<(), DomainError> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(DomainError::WrongPackageKind {
                method,
                expected: expected.as_str(),
                actual: self.kind.as_str(),
            })
        }
    }

    pub fn kind(&self) -> PackageKind {
        self.kind
    }

    /// Bind the package identity. A later declaration replaces an earlier one.
    pub fn declare_package_id(&mut self, raw: &str) -> Result<&PackageId, DomainError> {
        let id = PackageId::new(raw)?;
        Ok(self.package_id.insert(id))
    }

    pub fn package_id(&self) -> Option<&PackageId> {
        self.package_id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn preview_texture_path(&self) -> Option<&str> {
        self.preview_texture_path.as_deref()
    }

    pub fn set_preview_texture_path(&mut self, path: impl Into<String>) {
        self.preview_texture_path = Some(path.into());
    }

    pub fn card_props(&self) -> &Shared<CardProperties> {
        &self.card
    }

    pub fn icon_texture_path(&self) -> Option<&str> {
        self.icon_texture_path.as_deref()
    }

    pub fn set_icon_texture_path(&mut self, path: impl Into<String>) -> Result<(), DomainError> {
        self.require(PackageKind::Card, "set_icon_texture")?;
        self.icon_texture_path = Some(path.into());
        Ok(())
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Replace the card's codes. Each code is one letter A-Z, or `*` for any.
    pub fn set_codes(&mut self, codes: Vec<String>) -> Result<(), DomainError> {
        self.require(PackageKind::Card, "set_codes")?;
        let valid = |code: &str| {
            code == "*" || (code.len() == 1 && code.chars().all(|c| c.is_ascii_uppercase()))
        };
        if let Some(bad) = codes.iter().find(|code| !valid(code)) {
            return Err(DomainError::InvalidCardCode(bad.clone()));
        }
        self.codes = codes;
        Ok(())
    }

    pub fn block(&self) -> &BlockProfile {
        &self.block
    }

    pub fn set_block_color(&mut self, color: BlockColor) -> Result<(), DomainError> {
        self.require(PackageKind::Block, "set_color")?;
        self.block.color = color;
        Ok(())
    }

    /// Set the occupancy grid from row-major cells; any non-zero cell is filled.
    pub fn set_block_shape(&mut self, cells: &[i64]) -> Result<(), DomainError> {
        self.require(PackageKind::Block, "set_shape")?;
        let expected = BLOCK_GRID * BLOCK_GRID;
        if cells.len() != expected {
            return Err(DomainError::InvalidBlockShape {
                expected,
                actual: cells.len(),
            });
        }
        self.block.shape = cells.iter().map(|c| *c != 0).collect();
        Ok(())
    }

    pub fn mark_program(&mut self) -> Result<(), DomainError> {
        self.require(PackageKind::Block, "as_program")?;
        self.block.is_program = true;
        Ok(())
    }

    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity {
            package_id: self.package_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            preview_texture_path: self.preview_texture_path.clone(),
        }
    }

    pub fn restore_identity(&mut self, identity: PackageIdentity) {
        self.package_id = identity.package_id;
        self.name = identity.name;
        self.description = identity.description;
        self.preview_texture_path = identity.preview_texture_path;
    }
}

impl NativeType for PackageMeta {
    const TYPE_NAME: &'static str = "PackageMeta";
}

/// What the loader learned about one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub id: Option<PackageId>,
    pub kind: PackageKind,
    pub path: PathBuf,
    pub name: String,
    pub description: String,
    pub dependencies: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_package_id_validates() {
        let mut meta = PackageMeta::new(PackageKind::Character);
        assert!(meta.declare_package_id("not valid").is_err());
        assert_eq!(meta.package_id(), None);

        meta.declare_package_id("com.test.hero").unwrap();
        assert_eq!(meta.package_id().map(PackageId::as_str), Some("com.test.hero"));
    }

    #[test]
    fn test_restore_identity_undoes_later_declarations() {
        let mut meta = PackageMeta::new(PackageKind::Character);
        meta.declare_package_id("com.test.a").unwrap();
        meta.set_name("A");
        let saved = meta.identity();

        meta.declare_package_id("shared_util").unwrap();
        meta.set_name("Shared");
        meta.set_preview_texture_path("shared.png");
        meta.restore_identity(saved);

        assert_eq!(meta.package_id().map(PackageId::as_str), Some("com.test.a"));
        assert_eq!(meta.name(), "A");
        assert_eq!(meta.preview_texture_path(), None);
    }

    #[test]
    fn test_card_codes() {
        let mut meta = PackageMeta::new(PackageKind::Card);
        meta.set_codes(vec!["A".into(), "*".into()]).unwrap();
        assert_eq!(meta.codes(), ["A", "*"]);
        assert_eq!(
            meta.set_codes(vec!["AB".into()]).unwrap_err(),
            DomainError::InvalidCardCode("AB".into())
        );
        assert_eq!(meta.codes(), ["A", "*"]);
        meta.set_icon_texture_path("icon.png").unwrap();
        assert_eq!(meta.icon_texture_path(), Some("icon.png"));
    }

    #[test]
    fn test_block_profile() {
        let mut meta = PackageMeta::new(PackageKind::Block);
        let mut cells = vec![0; 25];
        cells[12] = 1;
        meta.set_block_shape(&cells).unwrap();
        meta.set_block_color(BlockColor::Pink).unwrap();
        meta.mark_program().unwrap();

        let block = meta.block();
        assert_eq!(block.shape.iter().filter(|c| **c).count(), 1);
        assert!(block.shape[12]);
        assert_eq!(block.color, BlockColor::Pink);
        assert!(block.is_program);

        assert_eq!(
            meta.set_block_shape(&[1, 0]).unwrap_err(),
            DomainError::InvalidBlockShape {
                expected: 25,
                actual: 2
            }
        );
    }

    #[test]
    fn test_kind_specific_setters_check_kind() {
        let mut meta = PackageMeta::new(PackageKind::Character);
        let err = meta.set_codes(vec!["A".into()]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "set_codes is only available to card packages, not character"
        );
        assert!(meta.mark_program().is_err());
    }

    #[test]
    fn test_card_props_are_shared() {
        let meta = PackageMeta::new(PackageKind::Character);
        meta.card_props().lock().unwrap().damage = 80;
        assert_eq!(meta.card_props().lock().unwrap().damage, 80);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&PackageKind::Library).unwrap(),
            "\"library\""
        );
    }
}
