use std::f64::consts::TAU;
use std::path::PathBuf;

use athwg_config::{AppConfig, ExportConfig, MountingHolesConfig, PetalConnectorConfig, ThroatConfig};
use athwg_core::geometry::{
    Point2, Vector2, offset_segment, point_on_circle, radius_from_circumference,
};
use athwg_core::profile::Profile;
use athwg_core::sketch::{Line, SketchEntity};
use tracing::{debug, info};

use crate::backend::{
    BodyId, ConstructionPlane, EdgeId, EdgeInfo, EdgeKind, ExtrudeExtent, FaceId, FaceRole,
    FeatureOperation, LoopInfo, ModelingBackend, PlaneRef, SketchAxis, SketchId, SketchTarget,
};
use crate::errors::EngineError;
use crate::renderer::SketchRenderer;

const PROFILE_SKETCH: &str = "AthProfile";
const THROAT_NAME: &str = "Throat";
const RING_NAME: &str = "Ring";

/// 建模流程产出的各部件。
#[derive(Debug, Clone, PartialEq)]
pub struct WaveguideParts {
    pub throat: BodyId,
    pub petals: Vec<BodyId>,
    pub ring: BodyId,
    /// 喉部顶面外环半径（厘米）。
    pub throat_radius: f64,
    pub mounting_holes: usize,
    pub petal_connectors: usize,
    pub exported: Vec<PathBuf>,
}

/// 按配置驱动建模后端，把剖面加工成可打印的喉部、环形连接件和四片花瓣。
#[derive(Debug, Clone)]
pub struct WaveguideBuilder {
    throat: ThroatConfig,
    mounting_holes: MountingHolesConfig,
    petal_connector: PetalConnectorConfig,
    export: ExportConfig,
}

impl WaveguideBuilder {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            throat: config.throat.clone(),
            mounting_holes: config.mounting_holes.clone(),
            petal_connector: config.petal_connector.clone(),
            export: config.export.clone(),
        }
    }

    pub fn build<B: ModelingBackend + ?Sized>(
        &self,
        profile: &Profile,
        backend: &mut B,
    ) -> Result<WaveguideParts, EngineError> {
        if profile.is_empty() {
            return Err(EngineError::EmptyProfile);
        }

        let horn = self.revolve_profile(profile, backend)?;

        let split_plane = backend.offset_plane(
            PlaneRef::Construction(ConstructionPlane::YZ),
            self.throat.length.cm(),
        )?;
        let (mouth, throat) = backend.split_body(horn, PlaneRef::Offset(split_plane))?;
        backend.set_body_name(throat, THROAT_NAME)?;

        let petals = split_petals(backend, mouth)?;
        for (index, petal) in petals.iter().enumerate() {
            backend.set_body_name(*petal, &format!("Petal{}", index + 1))?;
        }
        info!(%throat, petals = petals.len(), "喉部与花瓣已分割");

        let (ring, throat_radius) = self.ring_connector(backend, throat)?;

        let mounting_holes = if self.mounting_holes.enabled {
            self.mounting_holes(backend, throat)?
        } else {
            0
        };

        let petal_connectors = if self.petal_connector.enabled {
            self.petal_connectors(backend, &petals)?
        } else {
            0
        };

        let exported = if self.export.enabled {
            self.export_parts(backend, throat, ring, &petals)?
        } else {
            Vec::new()
        };

        Ok(WaveguideParts {
            throat,
            petals,
            ring,
            throat_radius,
            mounting_holes,
            petal_connectors,
            exported,
        })
    }

    /// 绘制剖面和旋转轴，并将第一个闭合区域绕 X 轴旋转一周。
    fn revolve_profile<B: ModelingBackend + ?Sized>(
        &self,
        profile: &Profile,
        backend: &mut B,
    ) -> Result<BodyId, EngineError> {
        let sketch = backend.create_sketch(
            SketchTarget::Plane(PlaneRef::Construction(ConstructionPlane::XY)),
            PROFILE_SKETCH,
        )?;
        SketchRenderer::new().render(profile, backend, sketch)?;

        let axis = backend.draw(
            sketch,
            SketchEntity::Line(Line {
                start: Point2::new(0.0, 0.0),
                end: Point2::new(1.0, 0.0),
            }),
        )?;

        // 剖面记录顺序决定了哪个区域是“那个”剖面
        let region = backend
            .regions(sketch)?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::NoProfileRegion(PROFILE_SKETCH.to_string()))?;
        let body = backend.revolve(region, SketchAxis { sketch, line: axis }, TAU)?;
        debug!(%body, "剖面已旋转成形");
        Ok(body)
    }

    /// 在喉部顶面按外环半径内缩绘制圆环，两侧开槽并生成独立的连接环。
    fn ring_connector<B: ModelingBackend + ?Sized>(
        &self,
        backend: &mut B,
        throat: BodyId,
    ) -> Result<(BodyId, f64), EngineError> {
        let top = backend.face(throat, FaceRole::ThroatTop)?;
        let radius = radius_from_circumference(outer_circle(backend, top, FaceRole::ThroatTop)?.length);

        let outer = radius - self.throat.ring_outer_inset.cm();
        let inner = radius - self.throat.ring_inner_inset.cm();
        if inner <= 0.0 || outer <= inner {
            return Err(EngineError::InvalidDimension(format!(
                "环形连接件半径无效：外径 {outer:.3} cm，内径 {inner:.3} cm（喉部半径 {radius:.3} cm）"
            )));
        }

        let sketch = backend.create_sketch(SketchTarget::Face(top), "ThroatTop")?;
        let center = Point2::new(0.0, 0.0);
        backend.draw(sketch, circle(center, outer))?;
        backend.draw(sketch, circle(center, inner))?;
        let annulus = backend.region_at(sketch, Point2::new((outer + inner) * 0.5, 0.0))?;

        let height = 2.0 * self.throat.ring_height.cm();
        backend.extrude(
            annulus,
            ExtrudeExtent::Symmetric(height),
            FeatureOperation::Cut(throat),
        )?;
        let ring = backend
            .extrude(annulus, ExtrudeExtent::Symmetric(height), FeatureOperation::NewBody)?
            .body;
        backend.set_body_name(ring, RING_NAME)?;
        debug!(radius, outer, inner, "环形连接件已生成");
        Ok((ring, radius))
    }

    /// 在喉部底面沿节圆均布安装孔。
    fn mounting_holes<B: ModelingBackend + ?Sized>(
        &self,
        backend: &mut B,
        throat: BodyId,
    ) -> Result<usize, EngineError> {
        let config = &self.mounting_holes;
        if config.count == 0 {
            return Ok(0);
        }

        let bottom = backend.face(throat, FaceRole::ThroatBottom)?;
        let loops = backend.face_loops(bottom)?;
        let outer = loops
            .iter()
            .find(|l| l.is_outer)
            .and_then(first_circle)
            .ok_or(EngineError::MissingOuterLoop {
                role: FaceRole::ThroatBottom,
            })?;
        let outer_radius = radius_from_circumference(outer.length);
        let inner_radius = loops
            .iter()
            .filter(|l| !l.is_outer)
            .filter_map(first_circle)
            .map(|edge| radius_from_circumference(edge.length))
            .fold(0.0, f64::max);

        let hole_radius = config.diameter.cm() * 0.5;
        let pitch = outer_radius - config.pitch_offset.cm();
        if pitch + hole_radius >= outer_radius || pitch - hole_radius <= inner_radius {
            return Err(EngineError::InvalidDimension(format!(
                "安装孔节圆 {pitch:.3} cm 与孔径 {:.3} cm 超出喉部底面 [{inner_radius:.3}, {outer_radius:.3}] cm",
                config.diameter.cm()
            )));
        }

        let sketch = backend.create_sketch(SketchTarget::Face(bottom), "MountingHoles")?;
        let centers: Vec<Point2> = (0..config.count)
            .map(|k| point_on_circle(Point2::new(0.0, 0.0), pitch, TAU * k as f64 / config.count as f64))
            .collect();
        for center in &centers {
            backend.draw(sketch, circle(*center, hole_radius))?;
        }
        for center in &centers {
            let region = backend.region_at(sketch, *center)?;
            backend.extrude(
                region,
                ExtrudeExtent::Distance(-config.depth.cm()),
                FeatureOperation::Cut(throat),
            )?;
        }
        debug!(count = centers.len(), pitch, "安装孔已生成");
        Ok(centers.len())
    }

    /// 每片花瓣前侧剖分面开槽，后侧剖分面加凸榫并倒圆角，相邻花瓣因此可以插接。
    fn petal_connectors<B: ModelingBackend + ?Sized>(
        &self,
        backend: &mut B,
        petals: &[BodyId],
    ) -> Result<usize, EngineError> {
        let config = &self.petal_connector;
        let width = config.slot_width.cm();
        let depth = config.slot_depth.cm();
        let clearance = config.tab_clearance.cm();
        if width <= 2.0 * clearance || depth <= clearance {
            return Err(EngineError::InvalidDimension(format!(
                "插槽 {width:.3}×{depth:.3} cm 容不下间隙 {clearance:.3} cm"
            )));
        }

        let mut connectors = 0;
        for (index, petal) in petals.iter().enumerate() {
            let leading = backend.face(*petal, FaceRole::SeamLeading)?;
            let edge = longest_line(backend, leading, FaceRole::SeamLeading)?;
            let slot = connector_outline(&edge, width, width, 0.0).ok_or_else(|| {
                EngineError::InvalidDimension(format!("花瓣 {} 的剖分面过短，无法开槽", index + 1))
            })?;
            let sketch = backend.create_sketch(SketchTarget::Face(leading), &format!("Slot{}", index + 1))?;
            let sample = draw_outline(backend, sketch, &slot)?;
            let region = backend.region_at(sketch, sample)?;
            backend.extrude(
                region,
                ExtrudeExtent::Distance(-depth),
                FeatureOperation::Cut(*petal),
            )?;

            let trailing = backend.face(*petal, FaceRole::SeamTrailing)?;
            let edge = longest_line(backend, trailing, FaceRole::SeamTrailing)?;
            let tab = connector_outline(&edge, width, width, clearance).ok_or_else(|| {
                EngineError::InvalidDimension(format!("花瓣 {} 的剖分面过短，无法加凸榫", index + 1))
            })?;
            let sketch = backend.create_sketch(SketchTarget::Face(trailing), &format!("Tab{}", index + 1))?;
            let sample = draw_outline(backend, sketch, &tab)?;
            let region = backend.region_at(sketch, sample)?;
            let extrusion = backend.extrude(
                region,
                ExtrudeExtent::Distance(depth - clearance),
                FeatureOperation::Join(*petal),
            )?;

            let edges: Vec<EdgeId> = backend
                .face_loops(extrusion.end_face)?
                .into_iter()
                .filter(|l| l.is_outer)
                .flat_map(|l| l.edges)
                .map(|edge| edge.id)
                .collect();
            if !edges.is_empty() {
                backend.fillet(&edges, config.fillet_radius.cm())?;
            }
            connectors += 1;
        }
        debug!(connectors, "花瓣连接件已生成");
        Ok(connectors)
    }

    fn export_parts<B: ModelingBackend + ?Sized>(
        &self,
        backend: &mut B,
        throat: BodyId,
        ring: BodyId,
        petals: &[BodyId],
    ) -> Result<Vec<PathBuf>, EngineError> {
        let mut parts = vec![(THROAT_NAME.to_string(), throat), (RING_NAME.to_string(), ring)];
        parts.extend(
            petals
                .iter()
                .enumerate()
                .map(|(index, petal)| (format!("Petal{}", index + 1), *petal)),
        );

        let mut exported = Vec::with_capacity(parts.len());
        for (name, body) in parts {
            let path = self
                .export
                .directory
                .join(format!("{name}.{}", self.export.format));
            backend.export_mesh(body, &path)?;
            info!(path = %path.display(), "已导出网格");
            exported.push(path);
        }
        Ok(exported)
    }
}

/// 口部先按 XZ 平面对半，再把每一半按 XY 平面对半，得到四片花瓣。
fn split_petals<B: ModelingBackend + ?Sized>(
    backend: &mut B,
    mouth: BodyId,
) -> Result<Vec<BodyId>, EngineError> {
    let (upper, lower) = backend.split_body(mouth, PlaneRef::Construction(ConstructionPlane::XZ))?;
    let mut petals = Vec::with_capacity(4);
    for half in [upper, lower] {
        let (front, back) = backend.split_body(half, PlaneRef::Construction(ConstructionPlane::XY))?;
        petals.push(front);
        petals.push(back);
    }
    Ok(petals)
}

fn circle(center: Point2, radius: f64) -> SketchEntity {
    SketchEntity::Circle(athwg_core::sketch::Circle { center, radius })
}

fn first_circle(outer: &LoopInfo) -> Option<&EdgeInfo> {
    outer.edges.iter().find(|edge| edge.kind == EdgeKind::Circle)
}

fn outer_circle<B: ModelingBackend + ?Sized>(
    backend: &mut B,
    face: FaceId,
    role: FaceRole,
) -> Result<EdgeInfo, EngineError> {
    backend
        .face_loops(face)?
        .iter()
        .find(|l| l.is_outer)
        .and_then(first_circle)
        .cloned()
        .ok_or(EngineError::MissingOuterLoop { role })
}

fn longest_line<B: ModelingBackend + ?Sized>(
    backend: &mut B,
    face: FaceId,
    role: FaceRole,
) -> Result<EdgeInfo, EngineError> {
    backend
        .face_loops(face)?
        .into_iter()
        .filter(|l| l.is_outer)
        .flat_map(|l| l.edges)
        .filter(|edge| edge.kind == EdgeKind::Line)
        .max_by(|a, b| a.length.total_cmp(&b.length))
        .ok_or(EngineError::MissingOuterLoop { role })
}

/// 沿边内侧生成矩形轮廓：距边 `margin + inset`，宽 `width - 2 * inset`，
/// 两端各缩进 `margin + inset`。外环内部位于边的左侧。
fn connector_outline(edge: &EdgeInfo, width: f64, margin: f64, inset: f64) -> Option<[Point2; 4]> {
    let direction = Vector2::from_points(edge.start, edge.end).normalize()?;
    let trim = margin + inset;
    if edge.length <= 2.0 * trim {
        return None;
    }
    let start = edge.start.translate(direction.scale(trim));
    let end = edge.end.translate(direction.scale(-trim));
    let (near_start, near_end) = offset_segment(start, end, margin + inset)?;
    let (far_start, far_end) = offset_segment(start, end, margin + width - inset)?;
    Some([near_start, near_end, far_end, far_start])
}

/// 绘制闭合轮廓，返回轮廓内部的一个采样点。
fn draw_outline<B: ModelingBackend + ?Sized>(
    backend: &mut B,
    sketch: SketchId,
    outline: &[Point2; 4],
) -> Result<Point2, EngineError> {
    for index in 0..outline.len() {
        let start = outline[index];
        let end = outline[(index + 1) % outline.len()];
        backend.draw(sketch, SketchEntity::Line(Line { start, end }))?;
    }
    Ok(outline[0].midpoint(outline[2]))
}
