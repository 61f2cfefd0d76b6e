use freeze::core::models::template::EntityTemplate;
use freeze::engine::config::{self as core_config, EntitySpec, Orientation};

/// A loaded point table with its requested count.
#[derive(Debug, Clone)]
pub struct EntityEntry {
    pub template: EntityTemplate,
    pub count: usize,
    pub orientation: Orientation,
}

pub struct AppConfig {
    pub entities: Vec<EntityEntry>,
    pub core_config: core_config::FreezeConfig,
}

impl AppConfig {
    pub fn entity_specs(&self) -> Vec<EntitySpec<'_>> {
        self.entities
            .iter()
            .map(|e| EntitySpec::new(&e.template, e.count).with_orientation(e.orientation))
            .collect()
    }
}
