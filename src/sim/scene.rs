//! Built-in scene: convex solids with surface behaviours
//!
//! Answers the engine's ray queries analytically. Objects can be moved or
//! removed between ticks; that is how obstacles enter and leave a beam's path.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::geometry::{GeometryQuery, Layer, RayHit, Shape, SurfaceId};
use super::surface::{Surface, SurfaceKind};
use crate::ConfigError;

/// A collidable object
#[derive(Debug)]
pub struct SceneObject {
    pub id: SurfaceId,
    pub shape: Shape,
    pub layer: Layer,
    pub surface: Box<dyn Surface>,
}

/// Object list (sorted by id for determinism)
#[derive(Debug, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
    next_id: u32,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object and return its surface id
    pub fn add(&mut self, shape: Shape, layer: Layer, surface: Box<dyn Surface>) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        self.objects.push(SceneObject {
            id,
            shape,
            layer,
            surface,
        });
        id
    }

    /// Remove an object. Returns false if it did not exist.
    pub fn remove(&mut self, id: SurfaceId) -> bool {
        let before = self.objects.len();
        self.objects.retain(|o| o.id != id);
        self.objects.len() != before
    }

    /// Move an object by `offset`. Returns false if it did not exist.
    pub fn translate(&mut self, id: SurfaceId, offset: Vec3) -> bool {
        match self.objects.iter_mut().find(|o| o.id == id) {
            Some(object) => {
                object.shape.translate(offset);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: SurfaceId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Build a scene from its description
    pub fn from_desc(desc: &SceneDesc) -> Self {
        let mut scene = Scene::new();
        for object in &desc.objects {
            scene.add(object.shape, object.layer, object.surface.into_surface());
        }
        scene
    }
}

fn hit_from(object: &SceneObject, origin: Vec3, dir: Vec3, max_distance: f32) -> Option<RayHit> {
    let (distance, normal) = object.shape.ray_intersect(origin, dir, max_distance)?;
    Some(RayHit {
        distance,
        point: origin + dir * distance,
        normal,
        surface: object.id,
    })
}

impl GeometryQuery for Scene {
    fn raycast(&self, origin: Vec3, dir: Vec3, max_distance: f32, mask: Layer) -> Option<RayHit> {
        self.objects
            .iter()
            .filter(|o| o.layer.intersects(mask))
            .filter_map(|o| hit_from(o, origin, dir, max_distance))
            .min_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    fn raycast_surface(
        &self,
        surface: SurfaceId,
        origin: Vec3,
        dir: Vec3,
        max_distance: f32,
    ) -> Option<RayHit> {
        hit_from(self.get(surface)?, origin, dir, max_distance)
    }

    fn surface(&self, id: SurfaceId) -> Option<&dyn Surface> {
        self.get(id).map(|o| o.surface.as_ref())
    }
}

/// A scene object in a scene file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDesc {
    pub shape: Shape,
    #[serde(default)]
    pub layer: Layer,
    #[serde(default)]
    pub surface: SurfaceKind,
}

/// A beam source in a scene file
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EmitterDesc {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Scene file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneDesc {
    #[serde(default)]
    pub objects: Vec<ObjectDesc>,
    #[serde(default)]
    pub emitters: Vec<EmitterDesc>,
}

impl SceneDesc {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let desc: SceneDesc = serde_json::from_str(json)?;
        if let Some(bad) = desc.emitters.iter().find(|e| e.direction.length_squared() == 0.0) {
            return Err(ConfigError::Invalid(format!(
                "emitter at {} has a zero direction",
                bad.origin
            )));
        }
        Ok(desc)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let desc = Self::from_json(&std::fs::read_to_string(path)?)?;
        log::info!(
            "Loaded scene {}: {} objects, {} emitters",
            path.display(),
            desc.objects.len(),
            desc.emitters.len()
        );
        Ok(desc)
    }
}
