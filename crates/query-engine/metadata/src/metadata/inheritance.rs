//! Single-table inheritance groupings, resolved once per set of metadata.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::entities::{EntityMetadata, InheritanceType};
use super::Metadata;

/// A single-table inheritance base and the subtypes stored in its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StiGroup {
    pub base: String,
    /// Empty when the group was looked up by a subtype name.
    pub sub_types: Vec<String>,
}

/// Mapping from an entity name (base or subtype) to its single-table group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StiEntities(pub BTreeMap<String, StiGroup>);

impl StiEntities {
    /// Group every single-table base with the entities that declare it as an ancestor.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mut groups = BTreeMap::new();
        for entity in metadata.entities.0.values() {
            if entity.inheritance != Some(InheritanceType::Sti)
                || entity.sti_discriminator_field.is_none()
            {
                continue;
            }
            let sub_types: Vec<String> = metadata
                .entities
                .0
                .values()
                .filter(|other| other.name != entity.name && other.base_types.contains(&entity.name))
                .map(|other| other.name.clone())
                .collect();
            // Allow looking up by subtype name
            for sub_type in &sub_types {
                groups.insert(
                    sub_type.clone(),
                    StiGroup {
                        base: entity.name.clone(),
                        sub_types: vec![],
                    },
                );
            }
            groups.insert(
                entity.name.clone(),
                StiGroup {
                    base: entity.name.clone(),
                    sub_types,
                },
            );
        }
        StiEntities(groups)
    }

    pub fn get(&self, entity_name: &str) -> Option<&StiGroup> {
        self.0.get(entity_name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Lazily computed inheritance information shared by every query compiled against one
/// `Metadata`.
///
/// The groups are computed on first access and are read-only afterwards. Use `clear` to drop
/// them so that the next access recomputes them, i.e. after swapping the metadata in tests.
#[derive(Debug, Default)]
pub struct InheritanceCache {
    sti_entities: OnceLock<StiEntities>,
}

impl InheritanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single-table groups of `metadata`, computing them if needed.
    pub fn sti_entities(&self, metadata: &Metadata) -> &StiEntities {
        self.sti_entities
            .get_or_init(|| StiEntities::from_metadata(metadata))
    }

    /// Find `sub_type` among the subtypes of the single-table base `base`.
    pub fn lookup_sub_type<'a>(
        &self,
        metadata: &'a Metadata,
        base: &str,
        sub_type: &str,
    ) -> Option<&'a EntityMetadata> {
        let group = self.sti_entities(metadata).get(base)?;
        if group.base != base || !group.sub_types.iter().any(|name| name == sub_type) {
            return None;
        }
        metadata.entities.0.get(sub_type)
    }

    /// Whether the groups have been computed yet.
    pub fn is_initialized(&self) -> bool {
        self.sti_entities.get().is_some()
    }

    /// Forget the computed groups.
    pub fn clear(&mut self) {
        self.sti_entities = OnceLock::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::EntitiesInfo;

    fn entity(name: &str, base_types: &[&str]) -> EntityMetadata {
        EntityMetadata {
            name: name.to_string(),
            tag_name: name.to_lowercase(),
            table_name: "tasks".to_string(),
            fields: BTreeMap::new(),
            base_types: base_types.iter().map(ToString::to_string).collect(),
            sub_types: vec![],
            inheritance: Some(InheritanceType::Sti),
            sti_discriminator_field: None,
            sti_discriminator_value: None,
        }
    }

    fn tasks_metadata() -> Metadata {
        let mut task = entity("Task", &[]);
        task.sti_discriminator_field = Some("type".to_string());
        let mut task_old = entity("TaskOld", &["Task"]);
        task_old.sti_discriminator_value = Some(1);
        let mut task_new = entity("TaskNew", &["Task"]);
        task_new.sti_discriminator_value = Some(2);
        Metadata {
            entities: EntitiesInfo(
                [task, task_old, task_new]
                    .into_iter()
                    .map(|e| (e.name.clone(), e))
                    .collect(),
            ),
        }
    }

    #[test]
    fn groups_subtypes_under_their_base() {
        let metadata = tasks_metadata();
        let cache = InheritanceCache::new();
        assert!(!cache.is_initialized());

        let sti = cache.sti_entities(&metadata);
        similar_asserts::assert_eq!(
            sti.get("Task"),
            Some(&StiGroup {
                base: "Task".to_string(),
                sub_types: vec!["TaskNew".to_string(), "TaskOld".to_string()],
            })
        );
        similar_asserts::assert_eq!(
            sti.get("TaskOld"),
            Some(&StiGroup {
                base: "Task".to_string(),
                sub_types: vec![],
            })
        );
        assert!(cache.is_initialized());
    }

    #[test]
    fn looks_up_declared_subtypes_only() {
        let metadata = tasks_metadata();
        let cache = InheritanceCache::new();
        assert_eq!(
            cache
                .lookup_sub_type(&metadata, "Task", "TaskOld")
                .map(|e| e.name.as_str()),
            Some("TaskOld")
        );
        assert!(cache
            .lookup_sub_type(&metadata, "Task", "Author")
            .is_none());
        assert!(cache
            .lookup_sub_type(&metadata, "TaskOld", "TaskNew")
            .is_none());
    }

    #[test]
    fn clear_recomputes_from_new_metadata() {
        let metadata = tasks_metadata();
        let mut cache = InheritanceCache::new();
        assert_eq!(cache.sti_entities(&metadata).0.len(), 3);

        // A cached value is never recomputed on its own.
        let empty = Metadata::empty();
        assert_eq!(cache.sti_entities(&empty).0.len(), 3);

        cache.clear();
        assert!(!cache.is_initialized());
        assert!(cache.sti_entities(&empty).is_empty());
    }
}
