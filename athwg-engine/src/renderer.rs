use athwg_core::profile::{Curve, Profile};
use athwg_core::sketch::{Arc, EntityId, FittedSpline, Line, SketchEntity};
use tracing::debug;

use crate::backend::{ModelingBackend, SketchId};
use crate::errors::EngineError;

/// 将剖面曲线逐条绘制到平面草图中。
#[derive(Debug, Clone, Copy, Default)]
pub struct SketchRenderer;

impl SketchRenderer {
    pub fn new() -> Self {
        Self
    }

    /// 按文件顺序绘制全部曲线，返回生成的草图实体。
    pub fn render<B: ModelingBackend + ?Sized>(
        &self,
        profile: &Profile,
        backend: &mut B,
        sketch: SketchId,
    ) -> Result<Vec<EntityId>, EngineError> {
        let entities = profile_entities(profile)?;
        let mut ids = Vec::with_capacity(entities.len());
        for entity in entities {
            ids.push(backend.draw(sketch, entity)?);
        }
        debug!(%sketch, entities = ids.len(), "剖面已绘制到草图");
        Ok(ids)
    }
}

/// 剖面曲线到草图实体的转换，不涉及后端。
pub fn profile_entities(profile: &Profile) -> Result<Vec<SketchEntity>, EngineError> {
    profile
        .curves()
        .iter()
        .map(|curve| curve_entity(profile, curve))
        .collect()
}

fn curve_entity(profile: &Profile, curve: &Curve) -> Result<SketchEntity, EngineError> {
    let position = |id: athwg_core::profile::PointId| {
        profile
            .position(id)
            .ok_or(EngineError::UnknownPoint(id.index()))
    };

    Ok(match curve {
        Curve::Segment { start, end } => SketchEntity::Line(Line {
            start: position(*start)?,
            end: position(*end)?,
        }),
        Curve::Spline { points } => SketchEntity::FittedSpline(FittedSpline {
            fit_points: points
                .iter()
                .map(|id| position(*id))
                .collect::<Result<Vec<_>, _>>()?,
        }),
        Curve::Arc(arc) => SketchEntity::Arc(Arc::from_center_start_sweep(
            arc.center,
            position(arc.start)?,
            arc.sweep,
        )),
    })
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use athwg_core::geometry::Point2;
    use athwg_core::profile::ArcCurve;

    use super::*;
    use crate::backend::{ConstructionPlane, PlaneRef, SketchTarget};
    use crate::memory::RecordingBackend;

    fn sample_profile() -> Profile {
        let mut profile = Profile::new();
        let a = profile.push_point("1", Point2::new(0.0, 0.0), 1);
        let b = profile.push_point("2", Point2::new(0.0, 1.0), 2);
        let c = profile.push_point("3", Point2::new(2.0, 1.5), 3);
        let d = profile.push_point("4", Point2::new(4.0, 3.0), 4);
        let e = profile.push_point("61", Point2::new(4.0, 0.0), 5);
        profile.push_curve(Curve::Segment { start: a, end: b });
        profile.push_curve(Curve::Spline {
            points: vec![b, c, d],
        });
        profile.push_curve(Curve::Arc(ArcCurve::half_circle(
            d,
            Point2::new(4.0, 3.0),
            e,
            Point2::new(4.0, 0.0),
        )));
        profile.push_curve(Curve::Segment { start: e, end: a });
        profile
    }

    #[test]
    fn curves_map_to_sketch_entities_in_order() {
        let entities = profile_entities(&sample_profile()).expect("转换失败");
        let kinds: Vec<&str> = entities.iter().map(SketchEntity::kind_name).collect();
        assert_eq!(kinds, ["line", "fitted_spline", "arc", "line"]);

        let SketchEntity::Arc(arc) = &entities[2] else {
            panic!("期望圆弧");
        };
        assert!((arc.center.y() - 1.5).abs() < 1e-9);
        assert!((arc.radius - 1.5).abs() < 1e-9);
        assert!((arc.sweep() - PI).abs() < 1e-12);
        let end = arc.end_point();
        assert!((end.x() - 4.0).abs() < 1e-9);
        assert!(end.y().abs() < 1e-9);
    }

    #[test]
    fn render_draws_every_curve() {
        let profile = sample_profile();
        let mut backend = RecordingBackend::new();
        let sketch = backend
            .create_sketch(
                SketchTarget::Plane(PlaneRef::Construction(ConstructionPlane::XY)),
                "Profile",
            )
            .expect("创建草图");
        let ids = SketchRenderer::new()
            .render(&profile, &mut backend, sketch)
            .expect("绘制失败");
        assert_eq!(ids.len(), 4);
        assert_eq!(backend.sketch(sketch).map(|s| s.len()), Some(4));
    }
}
