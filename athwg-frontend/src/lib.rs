pub mod cli;
pub mod errors;
pub mod loader;
pub mod resource_locator;

pub use cli::CliRequest;
pub use loader::{LoadedConfig, ParseOverrides, load_configuration};

use athwg_config::AppConfig;
use errors::FrontendError;
use tracing::info;

/// 加载剖面并打印报告；`plan` 为真时同时打印建模计划。
pub fn run_cli(request: &CliRequest, config: &AppConfig) -> Result<(), FrontendError> {
    info!(profile = %request.profile.display(), plan = request.plan, "启动命令行前端");
    cli::run(request, config)
}
