use std::path::PathBuf;

use athwg_config::AppConfig;
use athwg_frontend::{CliRequest, ParseOverrides};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

const USAGE: &str = "用法：athwg [--config <path>] [--lenient] [--round-back] [--plan] <profile.afp>";

fn main() {
    let mut args = std::env::args().skip(1);
    let mut request = CliRequest::default();
    let mut profile: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--lenient" => request.overrides.lenient = true,
            "--round-back" => request.overrides.round_back = true,
            "--plan" => request.plan = true,
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                request.config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                return;
            }
            other if other.starts_with('-') => {
                eprintln!("未知参数：{other}");
                eprintln!("{USAGE}");
                std::process::exit(1);
            }
            other => {
                if profile.replace(PathBuf::from(other)).is_some() {
                    eprintln!("只能指定一个剖面文件");
                    std::process::exit(1);
                }
            }
        }
    }

    let Some(profile) = profile else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };
    request.profile = profile;

    let loaded = match athwg_frontend::load_configuration(
        request.config.as_deref(),
        Some(&request.profile),
    ) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_logging(&loaded.config);
    loaded.log_fallback();
    info!("启动 Ath 波导建模工具");

    if let Err(err) = athwg_frontend::run_cli(&request, &loaded.config) {
        error!(error = %err, "处理剖面失败");
        std::process::exit(1);
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
