//! The language hierarchy: family → language → dialect → mother tongue.
//!
//! Versions are grouped under language entities. The hierarchy is read from
//! the mirror as flat rows and assembled into a tree for browsing; nothing
//! here is user-scoped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, SelectionError};
use crate::mirror::SqliteMirror;

/// Position of an entity in the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageLevel {
    Family,
    Language,
    Dialect,
    MotherTongue,
}

impl LanguageLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageLevel::Family => "family",
            LanguageLevel::Language => "language",
            LanguageLevel::Dialect => "dialect",
            LanguageLevel::MotherTongue => "mother_tongue",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "family" => Ok(LanguageLevel::Family),
            "language" => Ok(LanguageLevel::Language),
            "dialect" => Ok(LanguageLevel::Dialect),
            "mother_tongue" => Ok(LanguageLevel::MotherTongue),
            other => Err(SelectionError::Validation(format!(
                "unknown language level: {other}"
            ))),
        }
    }
}

/// A node in the language classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageEntity {
    pub id: String,
    pub name: String,
    pub level: LanguageLevel,
    pub parent_id: Option<String>,
}

/// A language entity with its children attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageNode {
    pub entity: LanguageEntity,
    pub children: Vec<LanguageNode>,
}

impl LanguageNode {
    pub fn id(&self) -> &str {
        &self.entity.id
    }

    pub fn name(&self) -> &str {
        &self.entity.name
    }
}

/// Load all language entities and assemble the browse tree.
///
/// Entities whose parent is missing locally are promoted to roots so a
/// partially synced hierarchy still renders.
pub async fn load_hierarchy(mirror: &SqliteMirror) -> Result<Vec<LanguageNode>> {
    let rows: Vec<(String, String, String, Option<String>)> =
        sqlx::query_as("SELECT id, name, level, parent_id FROM language_entities ORDER BY name")
            .fetch_all(mirror.pool())
            .await?;

    let mut entities = Vec::with_capacity(rows.len());
    for (id, name, level, parent_id) in rows {
        entities.push(LanguageEntity {
            id,
            name,
            level: LanguageLevel::parse(&level)?,
            parent_id,
        });
    }

    Ok(build_tree(entities))
}

/// Assemble flat entities into root nodes.
pub fn build_tree(entities: Vec<LanguageEntity>) -> Vec<LanguageNode> {
    let known: std::collections::HashSet<String> =
        entities.iter().map(|e| e.id.clone()).collect();

    let mut children_of: HashMap<Option<String>, Vec<LanguageEntity>> = HashMap::new();
    for entity in entities {
        let parent = match &entity.parent_id {
            Some(p) if known.contains(p) => Some(p.clone()),
            _ => None,
        };
        children_of.entry(parent).or_default().push(entity);
    }

    fn attach(
        entity: LanguageEntity,
        children_of: &mut HashMap<Option<String>, Vec<LanguageEntity>>,
    ) -> LanguageNode {
        let children = children_of
            .remove(&Some(entity.id.clone()))
            .unwrap_or_default()
            .into_iter()
            .map(|child| attach(child, children_of))
            .collect();
        LanguageNode { entity, children }
    }

    children_of
        .remove(&None)
        .unwrap_or_default()
        .into_iter()
        .map(|root| attach(root, &mut children_of))
        .collect()
}

/// Find the path from a root down to the entity with the given id.
pub fn find_path<'a>(roots: &'a [LanguageNode], id: &str) -> Result<Vec<&'a LanguageNode>> {
    fn descend<'a>(node: &'a LanguageNode, id: &str, path: &mut Vec<&'a LanguageNode>) -> bool {
        path.push(node);
        if node.id() == id {
            return true;
        }
        for child in &node.children {
            if descend(child, id, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    let mut path = Vec::new();
    for root in roots {
        if descend(root, id, &mut path) {
            return Ok(path);
        }
    }
    Err(SelectionError::NotFound(format!("language entity {id}")))
}

/// Denormalized name lookup for a language entity id.
///
/// Returns `None` for a dangling reference; callers render an empty name.
pub async fn language_name_of(mirror: &SqliteMirror, entity_id: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT name FROM language_entities WHERE id = ?")
        .bind(entity_id)
        .fetch_optional(mirror.pool())
        .await?;
    Ok(row.map(|(name,)| name))
}
