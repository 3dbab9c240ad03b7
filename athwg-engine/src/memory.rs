//! 记录型内存后端：不做任何实体计算，只登记调用并返回新句柄。
//! 用于测试与命令行的建模计划预览。

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::path::{Path, PathBuf};

use athwg_core::geometry::Point2;
use athwg_core::sketch::{EntityId, Sketch, SketchEntity};
use tracing::trace;

use crate::backend::{
    BackendError, BackendResult, BodyId, EdgeId, EdgeInfo, EdgeKind, ExtrudeExtent, Extrusion,
    FaceId, FaceRole, FeatureOperation, LoopInfo, ModelingBackend, PlaneId, PlaneRef, RegionId,
    SketchAxis, SketchId, SketchTarget,
};

/// 一次后端调用的记录。
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateSketch {
        sketch: SketchId,
        target: SketchTarget,
        name: String,
    },
    Draw {
        sketch: SketchId,
        entity: EntityId,
        kind: &'static str,
    },
    Revolve {
        region: RegionId,
        body: BodyId,
        angle: f64,
    },
    OffsetPlane {
        plane: PlaneId,
        base: PlaneRef,
        distance: f64,
    },
    SplitBody {
        body: BodyId,
        plane: PlaneRef,
        parts: (BodyId, BodyId),
    },
    Extrude {
        region: RegionId,
        extent: ExtrudeExtent,
        operation: FeatureOperation,
        body: BodyId,
    },
    Fillet {
        edges: usize,
        radius: f64,
    },
    RenameBody {
        body: BodyId,
        name: String,
    },
    ExportMesh {
        body: BodyId,
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy)]
struct RegionRecord {
    sketch: SketchId,
}

#[derive(Debug, Clone, Copy)]
enum FaceSource {
    Role(FaceRole),
    ExtrusionEnd(RegionId),
}

#[derive(Debug)]
pub struct RecordingBackend {
    next_handle: u64,
    sketches: Vec<(SketchId, Sketch)>,
    regions: HashMap<RegionId, RegionRecord>,
    bodies: Vec<BodyId>,
    faces: HashMap<(BodyId, FaceRole), FaceId>,
    face_sources: HashMap<FaceId, FaceSource>,
    role_loops: HashMap<FaceRole, Vec<LoopInfo>>,
    body_names: HashMap<BodyId, String>,
    operations: Vec<Operation>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    /// 使用一组典型的面几何创建后端：喉部端面为同心圆环，剖分面为矩形。
    pub fn new() -> Self {
        let mut backend = Self {
            next_handle: 0,
            sketches: Vec::new(),
            regions: HashMap::new(),
            bodies: Vec::new(),
            faces: HashMap::new(),
            face_sources: HashMap::new(),
            role_loops: HashMap::new(),
            body_names: HashMap::new(),
            operations: Vec::new(),
        };
        let top = backend.annulus_loops(3.0, 1.5);
        let bottom = backend.annulus_loops(2.5, 1.0);
        let seam = backend.rectangle_loop(Point2::new(0.0, 0.0), Point2::new(6.0, 3.0));
        backend.role_loops.insert(FaceRole::ThroatTop, top);
        backend.role_loops.insert(FaceRole::ThroatBottom, bottom);
        backend
            .role_loops
            .insert(FaceRole::SeamLeading, vec![seam.clone()]);
        backend.role_loops.insert(FaceRole::SeamTrailing, vec![seam]);
        backend
    }

    /// 以外径/内径替换某个角色面的环。
    pub fn with_annulus(mut self, role: FaceRole, outer_radius: f64, inner_radius: f64) -> Self {
        let loops = self.annulus_loops(outer_radius, inner_radius);
        self.role_loops.insert(role, loops);
        self
    }

    pub fn with_face_loops(mut self, role: FaceRole, loops: Vec<LoopInfo>) -> Self {
        self.role_loops.insert(role, loops);
        self
    }

    #[inline]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn sketch(&self, id: SketchId) -> Option<&Sketch> {
        self.sketches
            .iter()
            .find(|(sketch_id, _)| *sketch_id == id)
            .map(|(_, sketch)| sketch)
    }

    pub fn sketches(&self) -> impl Iterator<Item = &(SketchId, Sketch)> {
        self.sketches.iter()
    }

    pub fn body_name(&self, body: BodyId) -> Option<&str> {
        self.body_names.get(&body).map(String::as_str)
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn new_body(&mut self) -> BodyId {
        let body = BodyId::new(self.allocate());
        self.bodies.push(body);
        body
    }

    fn record(&mut self, operation: Operation) {
        trace!(?operation, "记录后端调用");
        self.operations.push(operation);
    }

    fn require_body(&self, body: BodyId, operation: &'static str) -> BackendResult<()> {
        if self.bodies.contains(&body) {
            Ok(())
        } else {
            Err(BackendError::new(operation, format!("{body} 不存在")))
        }
    }

    fn sketch_mut(&mut self, id: SketchId, operation: &'static str) -> BackendResult<&mut Sketch> {
        self.sketches
            .iter_mut()
            .find(|(sketch_id, _)| *sketch_id == id)
            .map(|(_, sketch)| sketch)
            .ok_or_else(|| BackendError::new(operation, format!("{id} 不存在")))
    }

    fn edge(&mut self, kind: EdgeKind, start: Point2, end: Point2, length: f64) -> EdgeInfo {
        EdgeInfo {
            id: EdgeId::new(self.allocate()),
            kind,
            start,
            end,
            length,
        }
    }

    fn circle_edge(&mut self, radius: f64) -> EdgeInfo {
        let point = Point2::new(radius, 0.0);
        self.edge(EdgeKind::Circle, point, point, TAU * radius)
    }

    fn annulus_loops(&mut self, outer_radius: f64, inner_radius: f64) -> Vec<LoopInfo> {
        let outer = self.circle_edge(outer_radius);
        let inner = self.circle_edge(inner_radius);
        vec![
            LoopInfo {
                is_outer: false,
                edges: vec![inner],
            },
            LoopInfo {
                is_outer: true,
                edges: vec![outer],
            },
        ]
    }

    fn rectangle_loop(&mut self, min: Point2, max: Point2) -> LoopInfo {
        let corners = [
            min,
            Point2::new(max.x(), min.y()),
            max,
            Point2::new(min.x(), max.y()),
        ];
        let edges = (0..corners.len())
            .map(|index| {
                let start = corners[index];
                let end = corners[(index + 1) % corners.len()];
                self.edge(EdgeKind::Line, start, end, start.distance(end))
            })
            .collect();
        LoopInfo {
            is_outer: true,
            edges,
        }
    }

    /// 拉伸终止面的外环取自截面所在草图中的线段与圆。
    fn extrusion_end_loops(&mut self, region: RegionId) -> BackendResult<Vec<LoopInfo>> {
        let record = self
            .regions
            .get(&region)
            .copied()
            .ok_or_else(|| BackendError::new("face_loops", format!("{region} 不存在")))?;
        let shapes: Vec<SketchEntity> = self
            .sketch(record.sketch)
            .map(|sketch| sketch.entities().map(|(_, entity)| entity.clone()).collect())
            .unwrap_or_default();

        let mut edges = Vec::new();
        for shape in shapes {
            match shape {
                SketchEntity::Line(line) => {
                    let length = line.start.distance(line.end);
                    edges.push(self.edge(EdgeKind::Line, line.start, line.end, length));
                }
                SketchEntity::Circle(circle) => edges.push(self.circle_edge(circle.radius)),
                _ => {}
            }
        }
        Ok(vec![LoopInfo {
            is_outer: true,
            edges,
        }])
    }
}

impl ModelingBackend for RecordingBackend {
    fn create_sketch(&mut self, target: SketchTarget, name: &str) -> BackendResult<SketchId> {
        if let SketchTarget::Face(face) = target {
            if !self.face_sources.contains_key(&face) {
                return Err(BackendError::new("create_sketch", format!("{face} 不存在")));
            }
        }
        let sketch = SketchId::new(self.allocate());
        self.sketches.push((sketch, Sketch::named(name)));
        self.record(Operation::CreateSketch {
            sketch,
            target,
            name: name.to_string(),
        });
        Ok(sketch)
    }

    fn draw(&mut self, sketch: SketchId, entity: SketchEntity) -> BackendResult<EntityId> {
        let kind = entity.kind_name();
        let id = self.sketch_mut(sketch, "draw")?.add(entity);
        self.record(Operation::Draw {
            sketch,
            entity: id,
            kind,
        });
        Ok(id)
    }

    fn regions(&mut self, sketch: SketchId) -> BackendResult<Vec<RegionId>> {
        if self.sketch_mut(sketch, "regions")?.is_empty() {
            return Ok(Vec::new());
        }
        let region = RegionId::new(self.allocate());
        self.regions.insert(region, RegionRecord { sketch });
        Ok(vec![region])
    }

    fn region_at(&mut self, sketch: SketchId, point: Point2) -> BackendResult<RegionId> {
        let inside = self
            .sketch_mut(sketch, "region_at")?
            .bounds()
            .is_some_and(|bounds| {
                let (min, max) = (bounds.min(), bounds.max());
                (min.x()..=max.x()).contains(&point.x()) && (min.y()..=max.y()).contains(&point.y())
            });
        if !inside {
            return Err(BackendError::new(
                "region_at",
                format!("({:.3}, {:.3}) 处没有闭合区域", point.x(), point.y()),
            ));
        }
        let region = RegionId::new(self.allocate());
        self.regions.insert(region, RegionRecord { sketch });
        Ok(region)
    }

    fn revolve(&mut self, region: RegionId, axis: SketchAxis, angle: f64) -> BackendResult<BodyId> {
        if !self.regions.contains_key(&region) {
            return Err(BackendError::new("revolve", format!("{region} 不存在")));
        }
        let axis_is_line = self
            .sketch(axis.sketch)
            .and_then(|sketch| sketch.entity(axis.line))
            .is_some_and(|entity| matches!(entity, SketchEntity::Line(_)));
        if !axis_is_line {
            return Err(BackendError::new("revolve", "旋转轴必须是草图直线"));
        }
        let body = self.new_body();
        self.record(Operation::Revolve {
            region,
            body,
            angle,
        });
        Ok(body)
    }

    fn offset_plane(&mut self, base: PlaneRef, distance: f64) -> BackendResult<PlaneId> {
        let plane = PlaneId::new(self.allocate());
        self.record(Operation::OffsetPlane {
            plane,
            base,
            distance,
        });
        Ok(plane)
    }

    fn split_body(&mut self, body: BodyId, plane: PlaneRef) -> BackendResult<(BodyId, BodyId)> {
        self.require_body(body, "split_body")?;
        self.bodies.retain(|existing| *existing != body);
        let parts = (self.new_body(), self.new_body());
        self.record(Operation::SplitBody { body, plane, parts });
        Ok(parts)
    }

    fn extrude(
        &mut self,
        region: RegionId,
        extent: ExtrudeExtent,
        operation: FeatureOperation,
    ) -> BackendResult<Extrusion> {
        if !self.regions.contains_key(&region) {
            return Err(BackendError::new("extrude", format!("{region} 不存在")));
        }
        let body = match operation {
            FeatureOperation::NewBody => self.new_body(),
            FeatureOperation::Join(target) | FeatureOperation::Cut(target) => {
                self.require_body(target, "extrude")?;
                target
            }
        };
        let end_face = FaceId::new(self.allocate());
        self.face_sources
            .insert(end_face, FaceSource::ExtrusionEnd(region));
        self.record(Operation::Extrude {
            region,
            extent,
            operation,
            body,
        });
        Ok(Extrusion { body, end_face })
    }

    fn face(&mut self, body: BodyId, role: FaceRole) -> BackendResult<FaceId> {
        self.require_body(body, "face")?;
        if let Some(face) = self.faces.get(&(body, role)) {
            return Ok(*face);
        }
        let face = FaceId::new(self.allocate());
        self.faces.insert((body, role), face);
        self.face_sources.insert(face, FaceSource::Role(role));
        Ok(face)
    }

    fn face_loops(&mut self, face: FaceId) -> BackendResult<Vec<LoopInfo>> {
        match self.face_sources.get(&face).copied() {
            Some(FaceSource::Role(role)) => {
                Ok(self.role_loops.get(&role).cloned().unwrap_or_default())
            }
            Some(FaceSource::ExtrusionEnd(region)) => self.extrusion_end_loops(region),
            None => Err(BackendError::new("face_loops", format!("{face} 不存在"))),
        }
    }

    fn fillet(&mut self, edges: &[EdgeId], radius: f64) -> BackendResult<()> {
        if edges.is_empty() {
            return Err(BackendError::new("fillet", "未指定任何边"));
        }
        if radius <= 0.0 {
            return Err(BackendError::new("fillet", format!("圆角半径 {radius} 无效")));
        }
        self.record(Operation::Fillet {
            edges: edges.len(),
            radius,
        });
        Ok(())
    }

    fn set_body_name(&mut self, body: BodyId, name: &str) -> BackendResult<()> {
        self.require_body(body, "set_body_name")?;
        self.body_names.insert(body, name.to_string());
        self.record(Operation::RenameBody {
            body,
            name: name.to_string(),
        });
        Ok(())
    }

    fn export_mesh(&mut self, body: BodyId, path: &Path) -> BackendResult<()> {
        self.require_body(body, "export_mesh")?;
        self.record(Operation::ExportMesh {
            body,
            path: path.to_path_buf(),
        });
        Ok(())
    }
}
