pub mod backend;
pub mod memory;
pub mod pipeline;
pub mod renderer;

pub use backend::ModelingBackend;
pub use memory::RecordingBackend;
pub use pipeline::{WaveguideBuilder, WaveguideParts};

pub mod errors {
    use thiserror::Error;

    use crate::backend::{BackendError, FaceRole};

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error(transparent)]
        Backend(#[from] BackendError),
        #[error("剖面不含任何曲线")]
        EmptyProfile,
        #[error("曲线引用了不存在的点 #{0}")]
        UnknownPoint(usize),
        #[error("草图 {0} 中没有闭合区域")]
        NoProfileRegion(String),
        #[error("{role:?} 面缺少可用的外环")]
        MissingOuterLoop { role: FaceRole },
        #[error("尺寸无效: {0}")]
        InvalidDimension(String),
    }
}
