//! 建模后端能力接口。
//!
//! 实体建模（旋转、分割、拉伸、圆角、网格导出）完全由宿主建模内核完成，
//! 本 crate 只负责提供参数和调用顺序。所有句柄都是后端分配的不透明标识。

use std::fmt;
use std::path::Path;

use athwg_core::geometry::Point2;
use athwg_core::sketch::{EntityId, SketchEntity};
use thiserror::Error;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            #[inline]
            pub fn new(raw: u64) -> Self {
                Self(raw)
            }

            #[inline]
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

handle!(
    /// 草图句柄。
    SketchId,
    "sketch"
);
handle!(
    /// 草图中的闭合区域，可作为旋转/拉伸的截面。
    RegionId,
    "region"
);
handle!(BodyId, "body");
handle!(PlaneId, "plane");
handle!(FaceId, "face");
handle!(EdgeId, "edge");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstructionPlane {
    XY,
    YZ,
    XZ,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneRef {
    Construction(ConstructionPlane),
    Offset(PlaneId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SketchTarget {
    Plane(PlaneRef),
    /// 面上草图的原点取在旋转轴上。
    Face(FaceId),
}

/// 旋转轴：某张草图中的一条直线。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SketchAxis {
    pub sketch: SketchId,
    pub line: EntityId,
}

/// 拉伸特征的布尔运算，合并与切除需指明参与运算的实体。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureOperation {
    NewBody,
    Join(BodyId),
    Cut(BodyId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtrudeExtent {
    /// 沿草图法向的单侧距离，负值表示反向。
    Distance(f64),
    /// 以草图平面为中心的对称总高度。
    Symmetric(f64),
}

/// 由后端保证稳定的面角色，替代按坐标匹配选面。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceRole {
    /// 喉部靠近口部一侧的端面。
    ThroatTop,
    /// 喉部驱动器一侧的端面。
    ThroatBottom,
    /// 花瓣沿旋转方向前侧的剖分面。
    SeamLeading,
    /// 花瓣沿旋转方向后侧的剖分面。
    SeamTrailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Line,
    Circle,
    Other,
}

/// 边的信息，坐标位于所在面的草图坐标系。
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeInfo {
    pub id: EdgeId,
    pub kind: EdgeKind,
    pub start: Point2,
    pub end: Point2,
    pub length: f64,
}

/// 面上的一个环。外环按逆时针排列，内部位于每条边的左侧。
#[derive(Debug, Clone, PartialEq)]
pub struct LoopInfo {
    pub is_outer: bool,
    pub edges: Vec<EdgeInfo>,
}

/// 拉伸结果：受影响的实体与拉伸终止面。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extrusion {
    pub body: BodyId,
    pub end_face: FaceId,
}

/// 后端操作失败。对核心而言是不透明的，只向上传递。
#[derive(Debug, Clone, Error)]
#[error("建模后端执行 {operation} 失败: {message}")]
pub struct BackendError {
    pub operation: &'static str,
    pub message: String,
}

impl BackendError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// 宿主建模系统提供的能力集合。每次调用都可能修改宿主文档，因此统一取 `&mut self`。
pub trait ModelingBackend {
    fn create_sketch(&mut self, target: SketchTarget, name: &str) -> BackendResult<SketchId>;

    fn draw(&mut self, sketch: SketchId, entity: SketchEntity) -> BackendResult<EntityId>;

    /// 草图中的全部闭合区域，顺序由后端决定。
    fn regions(&mut self, sketch: SketchId) -> BackendResult<Vec<RegionId>>;

    /// 包含给定草图坐标的最小闭合区域。
    fn region_at(&mut self, sketch: SketchId, point: Point2) -> BackendResult<RegionId>;

    fn revolve(&mut self, region: RegionId, axis: SketchAxis, angle: f64) -> BackendResult<BodyId>;

    fn offset_plane(&mut self, base: PlaneRef, distance: f64) -> BackendResult<PlaneId>;

    /// 以平面分割实体，返回平面正、负两侧的新实体。
    fn split_body(&mut self, body: BodyId, plane: PlaneRef) -> BackendResult<(BodyId, BodyId)>;

    fn extrude(
        &mut self,
        region: RegionId,
        extent: ExtrudeExtent,
        operation: FeatureOperation,
    ) -> BackendResult<Extrusion>;

    fn face(&mut self, body: BodyId, role: FaceRole) -> BackendResult<FaceId>;

    fn face_loops(&mut self, face: FaceId) -> BackendResult<Vec<LoopInfo>>;

    fn fillet(&mut self, edges: &[EdgeId], radius: f64) -> BackendResult<()>;

    fn set_body_name(&mut self, body: BodyId, name: &str) -> BackendResult<()>;

    fn export_mesh(&mut self, body: BodyId, path: &Path) -> BackendResult<()>;
}
