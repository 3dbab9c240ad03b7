use std::path::PathBuf;

use athwg_config::ConfigError;
use athwg_engine::errors::EngineError;
use athwg_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("在搜索路径中找不到剖面文件 {0:?}")]
    ProfileNotFound(PathBuf),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] IoError),
    #[error("生成建模计划失败: {0}")]
    Plan(#[from] EngineError),
}
