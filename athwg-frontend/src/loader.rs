use std::env;
use std::path::{Path, PathBuf};

use athwg_config::{AppConfig, ConfigError, sidecar_path};
use athwg_io::{AfpFacade, ParseMode, ParseOptions, ParseOutcome, ParseWarning, ProfileLoader};
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::resource_locator::ProfileLocator;

/// 加载后的剖面与元信息。
#[derive(Debug)]
pub struct LoadedProfile {
    pub path: PathBuf,
    pub options: ParseOptions,
    pub outcome: ParseOutcome,
}

/// 命令行对配置的覆盖，只能打开开关，不能关闭。
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOverrides {
    pub lenient: bool,
    pub round_back: bool,
}

impl ParseOverrides {
    pub fn apply(&self, config: &AppConfig) -> ParseOptions {
        let lenient = self.lenient || config.profile.lenient;
        ParseOptions::new(
            self.round_back || config.profile.round_back,
            if lenient {
                ParseMode::Lenient
            } else {
                ParseMode::Strict
            },
        )
    }
}

/// 配置读取结果。自动发现失败时 `fallback` 保存原因，
/// 由调用方在日志初始化之后输出。
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub fallback: Option<ConfigError>,
}

impl LoadedConfig {
    pub fn log_fallback(&self) {
        let Some(err) = &self.fallback else {
            return;
        };
        match err {
            ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                warn!(path = %path.display(), error = %err, "加载配置失败，使用内建默认值");
            }
            ConfigError::Context { .. } | ConfigError::Expression { .. } => {
                warn!(error = %err, "加载配置失败，使用内建默认值");
            }
        }
    }
}

/// 读取配置：显式路径失败视为错误；自动发现失败时回退到内建默认值。
pub fn load_configuration(
    override_path: Option<&Path>,
    profile: Option<&Path>,
) -> Result<LoadedConfig, FrontendError> {
    if let Some(path) = override_path {
        return Ok(LoadedConfig {
            config: AppConfig::from_file(path)?,
            fallback: None,
        });
    }

    Ok(match AppConfig::discover_for(profile) {
        Ok(config) => LoadedConfig {
            config,
            fallback: None,
        },
        Err(err) => LoadedConfig {
            config: AppConfig::default(),
            fallback: Some(err),
        },
    })
}

/// 在工作目录与配置的搜索路径中定位剖面文件。
pub fn locate_profile(requested: &Path, config: &AppConfig) -> Result<PathBuf, FrontendError> {
    let cwd = env::current_dir().ok();
    ProfileLocator::from_config(cwd.as_deref(), config)
        .resolve(requested)
        .ok_or_else(|| FrontendError::ProfileNotFound(requested.to_path_buf()))
}

/// 剖面经搜索路径解析到别处时，改用解析后路径旁的侧车配置。
/// 显式指定了配置文件或设置了 `ATHWG_CONFIG` 时保持原配置。
pub fn config_for_resolved(
    requested: &Path,
    resolved: &Path,
    explicit_config: bool,
    config: &AppConfig,
) -> Result<AppConfig, FrontendError> {
    if explicit_config || sidecar_path(requested) == sidecar_path(resolved) {
        return Ok(config.clone());
    }

    match AppConfig::sidecar_for(resolved)? {
        Some(sidecar) => {
            info!(profile = %resolved.display(), "使用剖面旁的侧车配置");
            Ok(sidecar)
        }
        None => Ok(config.clone()),
    }
}

/// 定位并解析剖面文件。
pub fn load_profile(
    requested: &Path,
    config: &AppConfig,
    overrides: ParseOverrides,
) -> Result<LoadedProfile, FrontendError> {
    let path = locate_profile(requested, config)?;
    parse_located(path, config, overrides)
}

/// 解析已定位的剖面文件，解析提示逐条写入日志。
pub fn parse_located(
    path: PathBuf,
    config: &AppConfig,
    overrides: ParseOverrides,
) -> Result<LoadedProfile, FrontendError> {
    let options = overrides.apply(config);
    let outcome = AfpFacade::with_options(options).load(&path)?;
    for warning in &outcome.warnings {
        log_warning(warning);
    }
    info!(
        path = %path.display(),
        points = outcome.profile.live_point_count(),
        curves = outcome.profile.curves().len(),
        warnings = outcome.warnings.len(),
        "剖面加载成功"
    );

    Ok(LoadedProfile {
        path,
        options,
        outcome,
    })
}

/// 重复标签与跳过的记录已由解析器记录，这里只补充未知记录类型。
fn log_warning(warning: &ParseWarning) {
    if let ParseWarning::UnknownRecord {
        line,
        discriminator,
    } = warning
    {
        warn!(line, %discriminator, "跳过未知类型的记录");
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn overrides_only_enable_flags() {
        let mut config = AppConfig::default();
        config.profile.round_back = true;

        let options = ParseOverrides::default().apply(&config);
        assert!(options.round_back);
        assert_eq!(options.mode, ParseMode::Strict);

        let options = ParseOverrides {
            lenient: true,
            round_back: false,
        }
        .apply(&config);
        assert!(options.round_back);
        assert_eq!(options.mode, ParseMode::Lenient);
    }

    #[test]
    fn profile_is_resolved_through_search_roots() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(
            dir.path().join("tiny.afp"),
            "P 1 0 0\nP 2 10 0\nP 3 10 10\nL 1 2\nL 2 3\nL 3 1\n",
        )
        .expect("write profile");

        let mut config = AppConfig::default();
        config.profile.search_roots = vec![dir.path().to_path_buf()];
        let loaded = load_profile(Path::new("tiny.afp"), &config, ParseOverrides::default())
            .expect("load profile");

        assert_eq!(loaded.path, dir.path().join("tiny.afp"));
        assert_eq!(loaded.outcome.profile.points().len(), 3);
        assert_eq!(loaded.outcome.profile.curves().len(), 3);
        assert!(loaded.outcome.warnings.is_empty());
    }

    #[test]
    fn missing_profile_is_reported() {
        let err = load_profile(
            Path::new("does-not-exist-anywhere.afp"),
            &AppConfig::default(),
            ParseOverrides::default(),
        )
        .expect_err("文件不存在");
        assert!(matches!(err, FrontendError::ProfileNotFound(_)));
    }

    #[test]
    fn explicit_config_errors_are_not_swallowed() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[Throat\n").expect("write config");
        let err = load_configuration(Some(&path), None).expect_err("配置格式错误");
        assert!(matches!(err, FrontendError::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn sidecar_next_to_resolved_profile_replaces_discovered_config() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join("horn.afp"), "P 1 0 0\n").expect("write profile");
        fs::write(dir.path().join("horn.toml"), "[Throat]\nlength = \"3 cm\"\n").expect("write sidecar");

        let mut config = AppConfig::default();
        config.profile.search_roots = vec![dir.path().to_path_buf()];
        let requested = Path::new("horn.afp");
        let resolved = locate_profile(requested, &config).expect("locate profile");
        assert_eq!(resolved, dir.path().join("horn.afp"));

        let settled = config_for_resolved(requested, &resolved, false, &config).expect("settle config");
        assert!((settled.throat.length.cm() - 3.0).abs() < 1e-12, "应读取解析后路径旁的侧车配置");

        let explicit = config_for_resolved(requested, &resolved, true, &config).expect("settle config");
        assert!((explicit.throat.length.cm() - 8.0).abs() < 1e-12, "显式配置优先于侧车");
    }

    #[test]
    fn discovery_failure_is_kept_for_later_logging() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let profile = dir.path().join("horn.afp");
        fs::write(dir.path().join("horn.toml"), "[Throat\n").expect("write sidecar");

        let loaded = load_configuration(None, Some(&profile)).expect("自动发现失败应回退");
        assert!(matches!(loaded.fallback, Some(ConfigError::Parse { .. })));
        assert_eq!(loaded.config.logging.level, "info");
        loaded.log_fallback();
    }
}
