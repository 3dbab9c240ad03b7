use std::env;
use std::path::{Path, PathBuf};

use athwg_config::AppConfig;
use tracing::{debug, trace};

const PROFILE_ROOTS_ENV: &str = "ATHWG_PROFILE_ROOTS";

/// 在工作目录、配置的搜索路径与环境变量 `ATHWG_PROFILE_ROOTS` 中查找剖面文件。
pub struct ProfileLocator {
    search_roots: Vec<PathBuf>,
}

impl ProfileLocator {
    pub fn from_config(base_dir: Option<&Path>, config: &AppConfig) -> Self {
        let mut roots: Vec<PathBuf> = Vec::new();

        if let Some(dir) = base_dir {
            roots.push(dir.to_path_buf());
        }

        roots.extend(
            config
                .profile
                .search_roots
                .iter()
                .cloned()
                .filter(|path| path.is_dir()),
        );

        if let Some(env_paths) = env::var_os(PROFILE_ROOTS_ENV) {
            roots.extend(env::split_paths(&env_paths).filter(|path| path.is_dir()));
        }

        // 去重，保持靠前优先级。
        let mut deduped: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !deduped.contains(&root) {
                deduped.push(root);
            }
        }

        ProfileLocator {
            search_roots: deduped,
        }
    }

    pub fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    /// 绝对路径只检查存在性；相对路径按搜索路径顺序尝试。
    pub fn resolve(&self, path: &Path) -> Option<PathBuf> {
        if path.is_absolute() {
            if path.is_file() {
                return Some(path.to_path_buf());
            }
            debug!(path = %path.display(), "剖面路径为绝对路径但未找到对应文件");
            return None;
        }

        self.search_roots.iter().find_map(|root| {
            let candidate = root.join(path);
            trace!(candidate = %candidate.display(), "profile locator candidate");
            candidate.is_file().then_some(candidate)
        })
    }
}
