//! Particle systems
//!
//! Debris burst when a structure is destroyed.

use bevy::prelude::*;
use rand::Rng;

use shared::{publish_destroyed, ConstructionSet, MaterialKind, StructureDestroyed, ALL_MATERIALS};

use crate::structures::material_color;

/// Chunks spawned per destroyed structure
const DEBRIS_COUNT: usize = 24;
const DEBRIS_GRAVITY: Vec3 = Vec3::new(0.0, -14.0, 0.0);

// =============================================================================
// COMPONENTS & RESOURCES
// =============================================================================

#[derive(Component)]
pub struct DebrisParticle {
    pub lifetime: f32,
    pub max_lifetime: f32,
    pub velocity: Vec3,
    pub spin: Vec3,
    pub initial_scale: f32,
}

/// Pre-made assets for particles (avoid recreating each burst)
#[derive(Resource)]
pub struct ParticleAssets {
    pub debris_mesh: Handle<Mesh>,
    pub debris_materials: Vec<(MaterialKind, Handle<StandardMaterial>)>,
}

impl ParticleAssets {
    fn material_for(&self, material: MaterialKind) -> Option<Handle<StandardMaterial>> {
        self.debris_materials
            .iter()
            .find(|(kind, _)| *kind == material)
            .map(|(_, handle)| handle.clone())
    }
}

pub struct ParticlesPlugin;

impl Plugin for ParticlesPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_particle_assets);
        app.add_systems(Update, spawn_debris.after(publish_destroyed).in_set(ConstructionSet::Notify));
        app.add_systems(Update, update_debris);
    }
}

// =============================================================================
// SETUP
// =============================================================================

fn setup_particle_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let debris_mesh = meshes.add(Cuboid::new(1.0, 1.0, 1.0));
    let debris_materials = ALL_MATERIALS
        .iter()
        .map(|material| {
            let handle = materials.add(StandardMaterial {
                base_color: material_color(*material),
                perceptual_roughness: 1.0,
                ..default()
            });
            (*material, handle)
        })
        .collect();

    commands.insert_resource(ParticleAssets {
        debris_mesh,
        debris_materials,
    });
}

// =============================================================================
// SPAWNING
// =============================================================================

fn spawn_debris(
    mut commands: Commands,
    particle_assets: Option<Res<ParticleAssets>>,
    mut destroyed: MessageReader<StructureDestroyed>,
) {
    let Some(assets) = particle_assets else {
        destroyed.clear();
        return;
    };
    let mut rng = rand::thread_rng();

    for StructureDestroyed { structure } in destroyed.read() {
        let Some(material) = assets.material_for(structure.material) else {
            continue;
        };
        let bounds = structure.bounds();
        let center = bounds.center();
        let half = bounds.half_extents();

        for _ in 0..DEBRIS_COUNT {
            let offset = Vec3::new(
                rng.gen_range(-half.x..=half.x),
                rng.gen_range(-half.y..=half.y),
                rng.gen_range(-half.z..=half.z),
            );
            let outward = offset.normalize_or_zero();
            let velocity = outward * rng.gen_range(2.0_f32..6.0) + Vec3::Y * rng.gen_range(3.0_f32..7.0);
            let initial_scale = rng.gen_range(0.15_f32..0.45);
            let lifetime = rng.gen_range(0.9_f32..1.6);

            commands.spawn((
                DebrisParticle {
                    lifetime,
                    max_lifetime: lifetime,
                    velocity,
                    spin: Vec3::new(rng.gen_range(-6.0..6.0), rng.gen_range(-6.0..6.0), rng.gen_range(-6.0..6.0)),
                    initial_scale,
                },
                Mesh3d(assets.debris_mesh.clone()),
                MeshMaterial3d(material.clone()),
                Transform::from_translation(center + offset).with_scale(Vec3::splat(initial_scale)),
            ));
        }
    }
}

// =============================================================================
// UPDATE
// =============================================================================

/// Move, tumble, shrink and despawn debris
fn update_debris(
    mut commands: Commands,
    time: Res<Time>,
    mut particles: Query<(Entity, &mut DebrisParticle, &mut Transform)>,
) {
    let dt = time.delta_secs();

    for (entity, mut particle, mut transform) in particles.iter_mut() {
        particle.lifetime -= dt;
        if particle.lifetime <= 0.0 {
            commands.entity(entity).despawn();
            continue;
        }

        particle.velocity += DEBRIS_GRAVITY * dt;
        transform.translation += particle.velocity * dt;

        // Bounce off the ground, losing most of the energy
        if transform.translation.y < 0.0 {
            transform.translation.y = 0.0;
            particle.velocity.y = -particle.velocity.y * 0.3;
            particle.velocity.x *= 0.6;
            particle.velocity.z *= 0.6;
        }

        let spin = particle.spin * dt;
        transform.rotate(Quat::from_euler(EulerRot::XYZ, spin.x, spin.y, spin.z));

        let life = (particle.lifetime / particle.max_lifetime).clamp(0.0, 1.0);
        transform.scale = Vec3::splat(particle.initial_scale * life.sqrt().max(0.1));
    }
}
