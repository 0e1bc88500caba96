//! Bevy wiring for the construction core.
//!
//! Hosts add [`ConstructionPlugin`] and put their own systems into [`ConstructionSet`]:
//!
//! ```text
//! Advance  →  Damage  →  Preview  →  Commit  →  Notify
//! ```
//!
//! * **Advance** – hit-point ramp for everything under construction.
//! * **Damage** – the host drains [`DamageStructure`] into the registry.
//! * **Preview** – build-mode candidate from this frame's aim ray.
//! * **Commit** – placement requests (local clicks or network messages).
//! * **Notify** – destruction notifications for particles and network sync.

use bevy::prelude::*;

use crate::config::{ConstructionConfig, CONFIG_PATH};
use crate::construction::ConstructionScheduler;
use crate::registry::StructureRegistry;
use crate::structures::{Structure, StructureId};

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstructionSet {
    Advance,
    Damage,
    Preview,
    Commit,
    Notify,
}

/// Request to damage a structure; applied once per tick in [`ConstructionSet::Damage`]
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct DamageStructure {
    pub id: StructureId,
    pub amount: f32,
}

/// A structure reached zero hit points and was removed
#[derive(Message, Debug, Clone, PartialEq)]
pub struct StructureDestroyed {
    pub structure: Structure,
}

pub struct ConstructionPlugin {
    /// RON file with [`ConstructionConfig`]; missing or invalid falls back to defaults
    pub config_path: String,
}

impl Default for ConstructionPlugin {
    fn default() -> Self {
        Self {
            config_path: CONFIG_PATH.to_string(),
        }
    }
}

impl Plugin for ConstructionPlugin {
    fn build(&self, app: &mut App) {
        let config = ConstructionConfig::load_or_default(&self.config_path);

        app.insert_resource(StructureRegistry::new(config.grid_size))
            .insert_resource(config)
            .init_resource::<ConstructionScheduler>()
            .add_message::<DamageStructure>()
            .add_message::<StructureDestroyed>();

        app.configure_sets(
            Update,
            (
                ConstructionSet::Advance,
                ConstructionSet::Damage,
                ConstructionSet::Preview,
                ConstructionSet::Commit,
                ConstructionSet::Notify,
            )
                .chain(),
        );

        app.add_systems(Update, advance_construction.in_set(ConstructionSet::Advance))
            .add_systems(Update, publish_destroyed.in_set(ConstructionSet::Notify));
    }
}

/// Ramp hit points using the app clock
pub fn advance_construction(
    time: Res<Time>,
    mut registry: ResMut<StructureRegistry>,
    mut scheduler: ResMut<ConstructionScheduler>,
) {
    if scheduler.in_progress_count() == 0 {
        return;
    }
    scheduler.advance(time.elapsed_secs_f64(), &mut registry);
}

/// Turn the registry's destruction outbox into messages
pub fn publish_destroyed(mut registry: ResMut<StructureRegistry>, mut destroyed: MessageWriter<StructureDestroyed>) {
    for structure in registry.take_destroyed() {
        destroyed.write(StructureDestroyed { structure });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Orientation;
    use crate::structures::{MaterialKind, StructureKind};
    use crate::testing::RecordingBackend;

    fn app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins).add_plugins(ConstructionPlugin {
            config_path: "does/not/exist.ron".to_string(),
        });
        app
    }

    #[test]
    fn test_plugin_inserts_resources() {
        let app = app();
        assert!(app.world().contains_resource::<StructureRegistry>());
        assert!(app.world().contains_resource::<ConstructionScheduler>());
        assert_eq!(app.world().resource::<ConstructionConfig>().grid_size, 4.0);
    }

    #[test]
    fn test_destroyed_outbox_becomes_messages() {
        let mut app = app();
        let mut backend = RecordingBackend::default();
        {
            let mut registry = app.world_mut().resource_mut::<StructureRegistry>();
            let wall = registry.create(
                StructureKind::Wall,
                MaterialKind::Wood,
                Vec3::ZERO,
                Orientation::UNROTATED,
                0.0,
                &mut backend,
            );
            registry.apply_damage(wall.id, 1.0, &mut backend);
        }

        app.update();

        let messages = app.world().resource::<Messages<StructureDestroyed>>();
        let mut cursor = messages.get_cursor();
        let destroyed: Vec<_> = cursor.read(messages).collect();
        assert_eq!(destroyed.len(), 1);
        assert_eq!(destroyed[0].structure.kind, StructureKind::Wall);
        assert!(app.world().resource::<StructureRegistry>().is_empty());
    }

    /// Hit points a `Preview`-set system saw on its first run
    #[derive(Resource, Default)]
    struct SeenInPreview(Option<f32>);

    #[derive(Resource, Default)]
    struct SeenInNotify(usize);

    #[test]
    fn test_preview_sees_advanced_hit_points() {
        let mut app = app();
        app.init_resource::<SeenInPreview>().add_systems(
            Update,
            (|registry: Res<StructureRegistry>, mut seen: ResMut<SeenInPreview>| {
                seen.0 = registry.iter().next().map(|s| s.current_hit_points);
            })
            .in_set(ConstructionSet::Preview),
        );

        let mut backend = RecordingBackend::default();
        let wall = {
            let mut registry = app.world_mut().resource_mut::<StructureRegistry>();
            // Started long enough ago to be finished by the first tick
            registry.create(
                StructureKind::Wall,
                MaterialKind::Wood,
                Vec3::ZERO,
                Orientation::UNROTATED,
                -100.0,
                &mut backend,
            )
        };
        app.world_mut().resource_mut::<ConstructionScheduler>().track(wall.id);
        assert_eq!(wall.current_hit_points, 0.0);

        app.update();

        assert_eq!(app.world().resource::<SeenInPreview>().0, Some(wall.max_hit_points));
    }

    #[test]
    fn test_notify_readers_see_destruction_same_frame() {
        let mut app = app();
        app.init_resource::<SeenInNotify>().add_systems(
            Update,
            (|mut destroyed: MessageReader<StructureDestroyed>, mut seen: ResMut<SeenInNotify>| {
                seen.0 += destroyed.read().count();
            })
            .after(publish_destroyed)
            .in_set(ConstructionSet::Notify),
        );

        let mut backend = RecordingBackend::default();
        {
            let mut registry = app.world_mut().resource_mut::<StructureRegistry>();
            let floor = registry.create(
                StructureKind::Floor,
                MaterialKind::Wood,
                Vec3::ZERO,
                Orientation::UNROTATED,
                0.0,
                &mut backend,
            );
            registry.apply_damage(floor.id, 1.0, &mut backend);
        }

        app.update();
        assert_eq!(app.world().resource::<SeenInNotify>().0, 1);
    }
}
