//! Dynamic batch producer that emits polygons every frame

use std::sync::Arc;

use super::{DynamicResult, MeshLease, MeshPrimitive};
use crate::foundation::math::{Mat4, Mat4Ext, Point3};
use crate::gobj::{BoundingVolume, VertexFormat, COLOR, VERTEX};
use crate::pgraph::{RenderState, TransformState};
use crate::scene::{CullTraverser, CullTraverserData, SceneNode};

/// Closed outline of points
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Outline, in order
    pub points: Vec<Point3>,
    /// RGBA color written to formats that carry one
    pub color: [f32; 4],
}

impl Polygon {
    /// White polygon
    pub fn new(points: Vec<Point3>) -> Self {
        Self {
            points,
            color: [1.0; 4],
        }
    }

    /// Set the color
    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }
}

/// Writes its polygons into the nearest dynamic batch root while culled
///
/// Polygons that do not fit in the root's buffer this frame are skipped.
pub struct DynamicPolygonNode {
    name: String,
    format: Arc<VertexFormat>,
    mesh_state: Arc<RenderState>,
    primitive: MeshPrimitive,
    transform: Option<Arc<TransformState>>,
    polygons: Vec<Polygon>,
}

impl DynamicPolygonNode {
    /// Producer writing `primitive` batches of `format` with `mesh_state`
    pub fn new(
        name: impl Into<String>,
        format: Arc<VertexFormat>,
        mesh_state: Arc<RenderState>,
        primitive: MeshPrimitive,
    ) -> Self {
        Self {
            name: name.into(),
            format,
            mesh_state,
            primitive,
            transform: None,
            polygons: Vec::new(),
        }
    }

    /// Append a polygon
    pub fn with_polygon(mut self, polygon: Polygon) -> Self {
        self.polygons.push(polygon);
        self
    }

    /// Set the local transform
    pub fn with_transform(mut self, transform: Arc<TransformState>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Polygons written each frame
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }
}

fn write_polygon(mesh: &mut MeshLease<'_>, polygon: &Polygon, local: &Mat4, has_color: bool) -> DynamicResult<bool> {
    if !mesh.lock(polygon.points.len()) {
        return Ok(false);
    }
    {
        let mut writer = mesh.writer(VERTEX)?;
        for point in &polygon.points {
            writer.add_point(&local.xform_point(point))?;
        }
    }
    if has_color {
        let mut writer = mesh.writer(COLOR)?;
        let [r, g, b, a] = polygon.color;
        for _ in &polygon.points {
            writer.add_data4f(r, g, b, a)?;
        }
    }
    mesh.unlock()?;
    Ok(true)
}

impl SceneNode for DynamicPolygonNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self) -> Option<&Arc<TransformState>> {
        self.transform.as_ref()
    }

    fn internal_bounds(&self) -> BoundingVolume {
        BoundingVolume::from_points(self.polygons.iter().flat_map(|polygon| polygon.points.iter()))
    }

    fn cull_callback(&self, trav: &mut CullTraverser<'_>, data: &mut CullTraverserData) -> bool {
        let Some(local) = trav.dynamic_local_transform(data) else {
            log::warn!("'{}' is not below a dynamic render node, nothing drawn", self.name);
            return false;
        };
        let has_color = self.format.has_column(COLOR);

        for polygon in &self.polygons {
            let written = trav.with_dynamic_mesh(&self.format, &self.mesh_state, self.primitive, |mesh| {
                write_polygon(mesh, polygon, &local, has_color)
            });
            match written {
                Some(Ok(true)) | None => {}
                Some(Ok(false)) => log::trace!("'{}' skipped a {} vertex polygon", self.name, polygon.points.len()),
                Some(Err(err)) => log::error!("'{}' failed to write a polygon: {}", self.name, err),
            }
        }
        false
    }
}
