pub mod geometry {
    use std::f64::consts::TAU;

    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。剖面所在平面固定为 XY，Z 恒为 0。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn midpoint(self, other: Point2) -> Point2 {
            Self((self.0 + other.0) * 0.5)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        /// 提升为三维点，Z 固定为 0。
        #[inline]
        pub fn to_point3(self) -> Point3 {
            Point3::new(self.0.x, self.0.y, 0.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        /// 逆时针旋转 90° 得到的法向量。
        #[inline]
        pub fn perpendicular(self) -> Vector2 {
            Self(self.0.perp())
        }

        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self(self.0 * factor)
        }

        /// 相对 X 轴正方向的角度（弧度）。
        #[inline]
        pub fn angle(self) -> f64 {
            self.0.y.atan2(self.0.x)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 三维点，供建模后端的坐标参数使用。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn origin() -> Self {
            Self(DVec3::ZERO)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于估算剖面/草图范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            self.min.midpoint(self.max)
        }
    }

    /// 由整圆周长反推半径，用于根据圆形边的弧长估算环形连接件尺寸。
    #[inline]
    pub fn radius_from_circumference(length: f64) -> f64 {
        length / TAU
    }

    /// 将线段沿其左侧法向平移 `distance`（负值向右）。退化线段返回 `None`。
    pub fn offset_segment(start: Point2, end: Point2, distance: f64) -> Option<(Point2, Point2)> {
        let normal = Vector2::from_points(start, end)
            .normalize()?
            .perpendicular()
            .scale(distance);
        Some((start.translate(normal), end.translate(normal)))
    }

    /// 将角度归一化到 `[0, 2π)`。
    #[inline]
    pub fn normalize_angle(angle: f64) -> f64 {
        let normalized = angle.rem_euclid(TAU);
        if normalized >= TAU { 0.0 } else { normalized }
    }

    #[inline]
    pub fn point_on_circle(center: Point2, radius: f64, angle: f64) -> Point2 {
        center.translate(Vector2::new(radius * angle.cos(), radius * angle.sin()))
    }
}

pub mod profile {
    use std::collections::HashMap;
    use std::f64::consts::PI;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Vector2};

    /// 剖面点在点表中的下标。所有曲线均以该下标引用点，而非复制坐标。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct PointId(usize);

    impl PointId {
        #[inline]
        pub fn index(self) -> usize {
            self.0
        }
    }

    /// 带标签的剖面点，坐标已经过单位换算。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ProfilePoint {
        pub label: String,
        pub position: Point2,
        /// 定义该点的记录所在行号（从 1 开始）。
        pub line: usize,
    }

    /// 半圆弧：圆心为两端点中点，自第一个点起逆时针扫掠 π。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ArcCurve {
        pub start: PointId,
        pub end: PointId,
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub sweep: f64,
    }

    impl ArcCurve {
        pub fn half_circle(start: PointId, start_pos: Point2, end: PointId, end_pos: Point2) -> Self {
            let center = start_pos.midpoint(end_pos);
            let radial = Vector2::from_points(center, start_pos);
            Self {
                start,
                end,
                center,
                radius: radial.length(),
                start_angle: radial.angle(),
                sweep: PI,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Curve {
        Segment { start: PointId, end: PointId },
        Spline { points: Vec<PointId> },
        Arc(ArcCurve),
    }

    impl Curve {
        /// 曲线引用的全部点，按引用顺序。
        pub fn point_ids(&self) -> Vec<PointId> {
            match self {
                Curve::Segment { start, end } => vec![*start, *end],
                Curve::Spline { points } => points.clone(),
                Curve::Arc(arc) => vec![arc.start, arc.end],
            }
        }

        #[inline]
        pub fn kind_name(&self) -> &'static str {
            match self {
                Curve::Segment { .. } => "segment",
                Curve::Spline { .. } => "spline",
                Curve::Arc(_) => "arc",
            }
        }
    }

    /// 一次解析得到的完整剖面：点表加上按文件顺序排列的曲线。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Profile {
        points: Vec<ProfilePoint>,
        curves: Vec<Curve>,
    }

    impl Profile {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_point(&mut self, label: impl Into<String>, position: Point2, line: usize) -> PointId {
            let id = PointId(self.points.len());
            self.points.push(ProfilePoint {
                label: label.into(),
                position,
                line,
            });
            id
        }

        pub fn push_curve(&mut self, curve: Curve) {
            self.curves.push(curve);
        }

        #[inline]
        pub fn points(&self) -> &[ProfilePoint] {
            &self.points
        }

        #[inline]
        pub fn curves(&self) -> &[Curve] {
            &self.curves
        }

        #[inline]
        pub fn point(&self, id: PointId) -> Option<&ProfilePoint> {
            self.points.get(id.0)
        }

        #[inline]
        pub fn position(&self, id: PointId) -> Option<Point2> {
            self.point(id).map(|point| point.position)
        }

        /// 按标签查找点；重复定义时返回最后一次定义。
        pub fn resolve(&self, label: &str) -> Option<PointId> {
            self.points
                .iter()
                .rposition(|point| point.label == label)
                .map(PointId)
        }

        /// 返回曲线所经过点的坐标序列。
        pub fn curve_positions(&self, curve: &Curve) -> Vec<Point2> {
            curve
                .point_ids()
                .into_iter()
                .filter_map(|id| self.position(id))
                .collect()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.curves.is_empty()
        }

        /// 每个标签最后一次定义的点，按定义顺序；被重复定义覆盖的点不在其中。
        pub fn live_points(&self) -> impl Iterator<Item = &ProfilePoint> {
            let latest: HashMap<&str, usize> = self
                .points
                .iter()
                .enumerate()
                .map(|(index, point)| (point.label.as_str(), index))
                .collect();
            self.points
                .iter()
                .enumerate()
                .filter(move |(index, point)| latest.get(point.label.as_str()) == Some(index))
                .map(|(_, point)| point)
        }

        pub fn live_point_count(&self) -> usize {
            self.live_points().count()
        }

        /// 有效点（见 [`Profile::live_points`]）的包围盒。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            for point in self.live_points() {
                bounds.include_point(point.position);
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }
    }
}

pub mod sketch {
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Vector2, normalize_angle, point_on_circle};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
    }

    /// 圆弧实体，角度以弧度形式储存，遵循数学正方向。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
    }

    impl Arc {
        /// 以圆心、起点与扫掠角构造圆弧。
        pub fn from_center_start_sweep(center: Point2, start: Point2, sweep: f64) -> Self {
            let radial = Vector2::from_points(center, start);
            let start_angle = radial.angle();
            Self {
                center,
                radius: radial.length(),
                start_angle,
                end_angle: start_angle + sweep,
            }
        }

        #[inline]
        pub fn sweep(&self) -> f64 {
            self.end_angle - self.start_angle
        }

        #[inline]
        pub fn start_point(&self) -> Point2 {
            point_on_circle(self.center, self.radius, self.start_angle)
        }

        #[inline]
        pub fn end_point(&self) -> Point2 {
            point_on_circle(self.center, self.radius, self.end_angle)
        }
    }

    /// 通过拟合点插值的样条。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct FittedSpline {
        pub fit_points: Vec<Point2>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum SketchEntity {
        Point(Point2),
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        FittedSpline(FittedSpline),
    }

    impl SketchEntity {
        #[inline]
        pub fn kind_name(&self) -> &'static str {
            match self {
                SketchEntity::Point(_) => "point",
                SketchEntity::Line(_) => "line",
                SketchEntity::Circle(_) => "circle",
                SketchEntity::Arc(_) => "arc",
                SketchEntity::FittedSpline(_) => "fitted_spline",
            }
        }

        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match self {
                SketchEntity::Point(point) => bounds.include_point(*point),
                SketchEntity::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                SketchEntity::Circle(circle) => {
                    let radius = circle.radius.abs();
                    let center = circle.center;
                    bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
                    bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
                }
                SketchEntity::Arc(arc) => arc_bounds(arc, &mut bounds),
                SketchEntity::FittedSpline(spline) => {
                    for point in &spline.fit_points {
                        bounds.include_point(*point);
                    }
                }
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }
    }

    /// 平面草图中的实体集合，保持添加顺序。
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct Sketch {
        name: Option<String>,
        entities: Vec<(EntityId, SketchEntity)>,
        next_entity_id: u64,
    }

    impl Sketch {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn named(name: impl Into<String>) -> Self {
            Self {
                name: Some(name.into()),
                ..Self::default()
            }
        }

        #[inline]
        pub fn name(&self) -> Option<&str> {
            self.name.as_deref()
        }

        pub fn set_name(&mut self, name: impl Into<String>) {
            self.name = Some(name.into());
        }

        pub fn add(&mut self, entity: SketchEntity) -> EntityId {
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        pub fn add_point(&mut self, point: Point2) -> EntityId {
            self.add(SketchEntity::Point(point))
        }

        pub fn add_line(&mut self, start: Point2, end: Point2) -> EntityId {
            self.add(SketchEntity::Line(Line { start, end }))
        }

        pub fn add_circle(&mut self, center: Point2, radius: f64) -> EntityId {
            self.add(SketchEntity::Circle(Circle { center, radius }))
        }

        pub fn add_arc(&mut self, center: Point2, start: Point2, sweep: f64) -> EntityId {
            self.add(SketchEntity::Arc(Arc::from_center_start_sweep(
                center, start, sweep,
            )))
        }

        pub fn add_fitted_spline(&mut self, fit_points: Vec<Point2>) -> EntityId {
            self.add(SketchEntity::FittedSpline(FittedSpline { fit_points }))
        }

        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, SketchEntity)> {
            self.entities.iter()
        }

        pub fn entity(&self, id: EntityId) -> Option<&SketchEntity> {
            self.entities
                .iter()
                .find(|(entity_id, _)| *entity_id == id)
                .map(|(_, entity)| entity)
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.entities.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.entities.is_empty()
        }

        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for (_, entity) in &self.entities {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            self.next_entity_id += 1;
            EntityId(self.next_entity_id)
        }
    }

    fn canonical_interval(start: f64, end: f64) -> (f64, f64) {
        let span = end - start;
        let start = normalize_angle(start);
        if span.abs() >= TAU - 1e-9 {
            return (start, start + TAU);
        }
        let mut end = normalize_angle(end);
        if end < start {
            end += TAU;
        }
        (start, end)
    }

    fn arc_bounds(arc: &Arc, bounds: &mut Bounds2D) {
        let radius = arc.radius.abs();
        if radius <= f64::EPSILON {
            bounds.include_point(arc.center);
            return;
        }

        let (start, end) = canonical_interval(arc.start_angle, arc.end_angle);
        bounds.include_point(point_on_circle(arc.center, radius, start));
        bounds.include_point(point_on_circle(arc.center, radius, end));

        const QUADRANTS: [f64; 4] = [0.0, FRAC_PI_2, PI, FRAC_PI_2 * 3.0];
        for base in QUADRANTS {
            let mut candidate = base;
            while candidate < start {
                candidate += TAU;
            }
            if candidate <= end {
                bounds.include_point(point_on_circle(arc.center, radius, candidate));
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn sketch_assigns_sequential_ids() {
            let mut sketch = Sketch::named("Profile");
            let line = sketch.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0));
            let circle = sketch.add_circle(Point2::new(0.0, 0.0), 2.0);
            assert_eq!(line.get() + 1, circle.get());
            assert_eq!(sketch.len(), 2);
            assert_eq!(sketch.name(), Some("Profile"));
            assert!(matches!(sketch.entity(circle), Some(SketchEntity::Circle(_))));
        }

        #[test]
        fn half_arc_bounds_cover_top_quadrant() {
            let mut sketch = Sketch::new();
            sketch.add_arc(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), PI);
            let bounds = sketch.bounds().expect("圆弧应有包围盒");
            assert!((bounds.min().x() + 1.0).abs() < 1e-9);
            assert!((bounds.max().x() - 1.0).abs() < 1e-9);
            assert!((bounds.max().y() - 1.0).abs() < 1e-9);
            assert!(bounds.min().y().abs() < 1e-9);
        }

        #[test]
        fn arc_from_center_start_sweep_reaches_opposite_point() {
            let arc = Arc::from_center_start_sweep(Point2::new(1.0, 1.0), Point2::new(1.0, 0.0), PI);
            let end = arc.end_point();
            assert!((end.x() - 1.0).abs() < 1e-9);
            assert!((end.y() - 2.0).abs() < 1e-9);
            assert!((arc.sweep() - PI).abs() < 1e-12);
        }
    }
}
