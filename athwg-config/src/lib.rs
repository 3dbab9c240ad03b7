use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub mod units;

pub use units::{Length, LengthUnit};

const CONFIG_ENV: &str = "ATHWG_CONFIG";

/// 应用配置的根结构。节名与旧版侧车配置文件保持一致。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default, rename = "Profile")]
    pub profile: ProfileConfig,
    #[serde(default, rename = "Throat")]
    pub throat: ThroatConfig,
    #[serde(default, rename = "MountingHoles")]
    pub mounting_holes: MountingHolesConfig,
    #[serde(default, rename = "PetalConnector")]
    pub petal_connector: PetalConnectorConfig,
    #[serde(default, rename = "Export")]
    pub export: ExportConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `ATHWG_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        Self::discover_for(None)
    }

    /// 与 [`AppConfig::discover`] 相同，但在环境变量之后优先查找剖面文件旁的侧车配置
    /// （同目录、同名、扩展名为 `toml`）。
    pub fn discover_for(profile: Option<&Path>) -> Result<Self, ConfigError> {
        let env_override = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let base_dir = match env_override {
            Some(_) => None,
            None => Some(env::current_dir().map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?),
        };

        match discovery_path(env_override, profile, base_dir.as_deref()) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// 仅读取剖面旁的侧车配置。设置了 `ATHWG_CONFIG` 或侧车文件不存在时返回 `None`。
    pub fn sidecar_for(profile: &Path) -> Result<Option<Self>, ConfigError> {
        if env::var_os(CONFIG_ENV).is_some() {
            return Ok(None);
        }
        match sidecar_path(profile).filter(|path| path.is_file()) {
            Some(path) => Self::from_file(path).map(Some),
            None => Ok(None),
        }
    }
}

/// 按优先级选择配置文件：环境变量、侧车文件、`<base_dir>/config/default.toml`。
/// 都不存在时返回 `None`，调用方使用内建默认值。
fn discovery_path(
    env_override: Option<PathBuf>,
    profile: Option<&Path>,
    base_dir: Option<&Path>,
) -> Option<PathBuf> {
    if env_override.is_some() {
        return env_override;
    }

    if let Some(sidecar) = profile.and_then(sidecar_path).filter(|path| path.is_file()) {
        return Some(sidecar);
    }

    base_dir
        .map(|dir| dir.join("config").join("default.toml"))
        .filter(|path| path.exists())
}

/// 剖面文件对应的侧车配置路径；无文件名时返回 `None`。
pub fn sidecar_path(profile: &Path) -> Option<PathBuf> {
    profile.file_stem()?;
    Some(profile.with_extension("toml"))
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileConfig {
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub round_back: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub lenient: bool,
    #[serde(default)]
    pub search_roots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThroatConfig {
    /// 喉部与口部分割平面相对 YZ 平面的偏移。
    #[serde(default = "ThroatConfig::default_length")]
    pub length: Length,
    #[serde(default = "ThroatConfig::default_ring_outer_inset")]
    pub ring_outer_inset: Length,
    #[serde(default = "ThroatConfig::default_ring_inner_inset")]
    pub ring_inner_inset: Length,
    #[serde(default = "ThroatConfig::default_ring_height")]
    pub ring_height: Length,
}

impl ThroatConfig {
    fn default_length() -> Length {
        Length::from_cm(8.0)
    }

    fn default_ring_outer_inset() -> Length {
        Length::from_cm(0.5)
    }

    fn default_ring_inner_inset() -> Length {
        Length::from_cm(0.8)
    }

    fn default_ring_height() -> Length {
        Length::from_cm(0.2)
    }
}

impl Default for ThroatConfig {
    fn default() -> Self {
        Self {
            length: Self::default_length(),
            ring_outer_inset: Self::default_ring_outer_inset(),
            ring_inner_inset: Self::default_ring_inner_inset(),
            ring_height: Self::default_ring_height(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MountingHolesConfig {
    #[serde(default = "default_true", deserialize_with = "deserialize_flag")]
    pub enabled: bool,
    #[serde(default = "MountingHolesConfig::default_count")]
    pub count: u32,
    #[serde(default = "MountingHolesConfig::default_diameter")]
    pub diameter: Length,
    /// 孔中心节圆相对喉部底面外圆半径的内缩量。
    #[serde(default = "MountingHolesConfig::default_pitch_offset")]
    pub pitch_offset: Length,
    #[serde(default = "MountingHolesConfig::default_depth")]
    pub depth: Length,
}

impl MountingHolesConfig {
    fn default_count() -> u32 {
        4
    }

    fn default_diameter() -> Length {
        Length::from_cm(0.4)
    }

    fn default_pitch_offset() -> Length {
        Length::from_cm(0.6)
    }

    fn default_depth() -> Length {
        Length::from_cm(1.0)
    }
}

impl Default for MountingHolesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            count: Self::default_count(),
            diameter: Self::default_diameter(),
            pitch_offset: Self::default_pitch_offset(),
            depth: Self::default_depth(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PetalConnectorConfig {
    #[serde(default = "default_true", deserialize_with = "deserialize_flag")]
    pub enabled: bool,
    #[serde(default = "PetalConnectorConfig::default_slot_width")]
    pub slot_width: Length,
    #[serde(default = "PetalConnectorConfig::default_slot_depth")]
    pub slot_depth: Length,
    #[serde(default = "PetalConnectorConfig::default_tab_clearance")]
    pub tab_clearance: Length,
    #[serde(default = "PetalConnectorConfig::default_fillet_radius")]
    pub fillet_radius: Length,
}

impl PetalConnectorConfig {
    fn default_slot_width() -> Length {
        Length::from_cm(0.4)
    }

    fn default_slot_depth() -> Length {
        Length::from_cm(0.3)
    }

    fn default_tab_clearance() -> Length {
        Length::from_cm(0.02)
    }

    fn default_fillet_radius() -> Length {
        Length::from_cm(0.05)
    }
}

impl Default for PetalConnectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            slot_width: Self::default_slot_width(),
            slot_depth: Self::default_slot_depth(),
            tab_clearance: Self::default_tab_clearance(),
            fillet_radius: Self::default_fillet_radius(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub enabled: bool,
    #[serde(default = "ExportConfig::default_directory")]
    pub directory: PathBuf,
    #[serde(default = "ExportConfig::default_format")]
    pub format: String,
}

impl ExportConfig {
    fn default_directory() -> PathBuf {
        PathBuf::from("export")
    }

    fn default_format() -> String {
        "stl".to_string()
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: Self::default_directory(),
            format: Self::default_format(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// 开关字段既接受 TOML 布尔值，也接受字符串；字符串仅在等于 `"True"` 时为真。
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawFlag {
        Bool(bool),
        Text(String),
    }

    Ok(match RawFlag::deserialize(deserializer)? {
        RawFlag::Bool(value) => value,
        RawFlag::Text(text) => text == "True",
    })
}

impl<'de> Deserialize<'de> for Length {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawLength {
            Number(f64),
            Expression(String),
        }

        match RawLength::deserialize(deserializer)? {
            RawLength::Number(value) => Ok(Length::from_cm(value)),
            RawLength::Expression(text) => {
                Length::from_str(&text).map_err(serde::de::Error::custom)
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("无法求值尺寸表达式 \"{expression}\": {reason}")]
    Expression { expression: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.profile.round_back);
        assert!(!cfg.profile.lenient);
        assert!((cfg.throat.length.cm() - 8.0).abs() < 1e-12);
        assert!(cfg.mounting_holes.enabled);
        assert_eq!(cfg.mounting_holes.count, 4);
        assert!(cfg.petal_connector.enabled);
        assert!(!cfg.export.enabled);
        assert_eq!(cfg.export.format, "stl");
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [Profile]
            round_back = "True"
            lenient = true
            search_roots = ["../profiles"]

            [Throat]
            length = "65 mm"
            ring_height = "0.25 cm"

            [MountingHoles]
            enabled = "False"
            count = 6
            diameter = "3.5 mm"

            [PetalConnector]
            slot_width = "5 mm + 0.5 mm"
            fillet_radius = 0.1

            [Export]
            enabled = "True"
            directory = "out"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.profile.round_back);
        assert!(cfg.profile.lenient);
        assert_eq!(cfg.profile.search_roots.len(), 1);
        assert!((cfg.throat.length.cm() - 6.5).abs() < 1e-12);
        assert!((cfg.throat.ring_height.cm() - 0.25).abs() < 1e-12);
        assert!((cfg.throat.ring_outer_inset.cm() - 0.5).abs() < 1e-12);
        assert!(!cfg.mounting_holes.enabled);
        assert_eq!(cfg.mounting_holes.count, 6);
        assert!((cfg.mounting_holes.diameter.cm() - 0.35).abs() < 1e-12);
        assert!((cfg.petal_connector.slot_width.cm() - 0.55).abs() < 1e-12);
        assert!((cfg.petal_connector.fillet_radius.cm() - 0.1).abs() < 1e-12);
        assert!(cfg.export.enabled);
        assert_eq!(cfg.export.directory, PathBuf::from("out"));
    }

    #[test]
    fn flag_strings_other_than_true_are_false() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [Profile]
            round_back = "true"
            "#,
        )
        .expect("parse config");
        assert!(!cfg.profile.round_back);
    }

    #[test]
    fn malformed_expression_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [Throat]
            length = "eight cm"
            "#
        )
        .unwrap();

        let err = AppConfig::from_file(file.path()).expect_err("表达式无效");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn sidecar_sits_next_to_profile() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let profile = dir.path().join("horn.afp");
        let sidecar = sidecar_path(&profile).expect("sidecar path");
        assert_eq!(sidecar, dir.path().join("horn.toml"));

        fs::write(&sidecar, "[Throat]\nlength = \"10 cm\"\n").expect("write sidecar");
        let cfg = AppConfig::discover_for(Some(&profile)).expect("discover sidecar");
        assert!((cfg.throat.length.cm() - 10.0).abs() < 1e-12);
    }

    fn discovery_fixture() -> (tempfile::TempDir, PathBuf, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let profile = dir.path().join("horn.afp");
        let sidecar = dir.path().join("horn.toml");
        let default = dir.path().join("config").join("default.toml");
        fs::create_dir_all(dir.path().join("config")).expect("create config dir");
        fs::write(&sidecar, "[Throat]\nlength = \"3 cm\"\n").expect("write sidecar");
        fs::write(&default, "[Throat]\nlength = \"5 cm\"\n").expect("write default");
        (dir, profile, sidecar, default)
    }

    #[test]
    fn env_override_beats_sidecar_and_default() {
        let (dir, profile, _, _) = discovery_fixture();
        let explicit = dir.path().join("explicit.toml");
        fs::write(&explicit, "[Throat]\nlength = \"7 cm\"\n").expect("write explicit");

        let chosen = discovery_path(Some(explicit.clone()), Some(&profile), Some(dir.path()));
        assert_eq!(chosen.as_deref(), Some(explicit.as_path()));
        let cfg = AppConfig::from_file(explicit).expect("load explicit");
        assert!((cfg.throat.length.cm() - 7.0).abs() < 1e-12);
    }

    #[test]
    fn sidecar_beats_default() {
        let (dir, profile, sidecar, _) = discovery_fixture();
        let chosen = discovery_path(None, Some(&profile), Some(dir.path()));
        assert_eq!(chosen, Some(sidecar));
    }

    #[test]
    fn default_file_is_used_without_sidecar() {
        let (dir, _, _, default) = discovery_fixture();
        let other = dir.path().join("other.afp");
        let chosen = discovery_path(None, Some(&other), Some(dir.path()));
        assert_eq!(chosen, Some(default.clone()));
        assert_eq!(discovery_path(None, None, Some(dir.path())), Some(default.clone()));

        let cfg = AppConfig::from_file(default).expect("load default");
        assert!((cfg.throat.length.cm() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn nothing_found_falls_back_to_builtin_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let profile = dir.path().join("horn.afp");
        assert_eq!(discovery_path(None, Some(&profile), Some(dir.path())), None);
        assert_eq!(discovery_path(None, None, None), None);
    }

    #[test]
    fn sidecar_for_reads_only_the_sidecar() {
        let (dir, profile, _, _) = discovery_fixture();
        let cfg = AppConfig::sidecar_for(&profile)
            .expect("load sidecar")
            .expect("sidecar exists");
        assert!((cfg.throat.length.cm() - 3.0).abs() < 1e-12);

        let lonely = dir.path().join("lonely.afp");
        assert!(AppConfig::sidecar_for(&lonely).expect("no error").is_none());
    }
}
