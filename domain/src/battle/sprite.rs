//! Sprite nodes: the scene-graph state scripts attach to entities.
//!
//! Drawing is the host's job. A node only records what scripts ask for
//! (texture, visibility, layer, position, tint, tags) and owns its children.

use crate::core::error::DomainError;
use crate::core::handle::{Handle, NativeType, Shared};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, Weak};

/// RGBA tint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

#[derive(Debug)]
pub struct SpriteNode {
    texture: Option<String>,
    visible: bool,
    layer: i64,
    position: (f64, f64),
    color: Color,
    tags: BTreeSet<String>,
    parent: Option<Weak<Mutex<SpriteNode>>>,
    children: Vec<Shared<SpriteNode>>,
}

impl SpriteNode {
    pub fn new() -> Self {
        Self {
            texture: None,
            visible: true,
            layer: 0,
            position: (0.0, 0.0),
            color: Color::WHITE,
            tags: BTreeSet::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn texture(&self) -> Option<&str> {
        self.texture.as_deref()
    }

    pub fn set_texture(&mut self, path: impl Into<String>) {
        self.texture = Some(path.into());
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn layer(&self) -> i64 {
        self.layer
    }

    pub fn set_layer(&mut self, layer: i64) {
        self.layer = layer;
    }

    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.position = (x, y);
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
    }

    pub fn remove_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            self.tags.remove(tag.as_ref());
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn has_parent(&self) -> bool {
        self.parent.as_ref().is_some_and(|p| p.strong_count() > 0)
    }

    pub fn children(&self) -> &[Shared<SpriteNode>] {
        &self.children
    }

    /// Direct children carrying at least one of `tags`.
    pub fn children_with_tags(&self, tags: &[String]) -> Result<Vec<Shared<SpriteNode>>, DomainError> {
        let mut found = Vec::new();
        for child in &self.children {
            if Handle::wrap(child).with(|c| tags.iter().any(|t| c.has_tag(t)))? {
                found.push(child.clone());
            }
        }
        Ok(found)
    }

    /// Attach `child` under `parent`, which becomes its owner.
    ///
    /// A node has at most one parent and may not end up inside its own subtree.
    pub fn add_child(parent: &Shared<SpriteNode>, child: Shared<SpriteNode>) -> Result<(), DomainError> {
        if subtree_contains(&child, parent)? {
            return Err(DomainError::SpriteTree(
                "a node cannot be attached inside its own subtree",
            ));
        }
        let weak = Arc::downgrade(parent);
        Handle::wrap(&child).with_mut(|c| {
            if c.has_parent() {
                return Err(DomainError::SpriteTree("the node already has a parent"));
            }
            c.parent = Some(weak);
            Ok(())
        })??;
        Handle::wrap(parent).with_mut(|p| p.children.push(child))?;
        Ok(())
    }

    /// Detach `child` from `parent`, handing ownership back to the caller.
    pub fn remove_child(
        parent: &Shared<SpriteNode>,
        child: &Shared<SpriteNode>,
    ) -> Result<Option<Shared<SpriteNode>>, DomainError> {
        let removed = Handle::wrap(parent).with_mut(|p| {
            let pos = p.children.iter().position(|c| Arc::ptr_eq(c, child))?;
            Some(p.children.remove(pos))
        })?;
        if let Some(node) = &removed {
            Handle::wrap(node).with_mut(|c| c.parent = None)?;
        }
        Ok(removed)
    }
}

impl Default for SpriteNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeType for SpriteNode {
    const TYPE_NAME: &'static str = "SpriteNode";
}

fn subtree_contains(root: &Shared<SpriteNode>, target: &Shared<SpriteNode>) -> Result<bool, DomainError> {
    if Arc::ptr_eq(root, target) {
        return Ok(true);
    }
    let children = Handle::wrap(root).with(|n| n.children.clone())?;
    for child in &children {
        if subtree_contains(child, target)? {
            return Ok(true);
        }
    }
    Ok(false)
}
