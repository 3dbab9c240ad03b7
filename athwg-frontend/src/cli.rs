use std::path::PathBuf;

use athwg_config::AppConfig;
use athwg_core::profile::{Curve, Profile};
use athwg_engine::memory::{Operation, RecordingBackend};
use athwg_engine::{WaveguideBuilder, WaveguideParts};
use athwg_io::ParseMode;
use tracing::info;

use crate::errors::FrontendError;
use crate::loader::{
    LoadedProfile, ParseOverrides, config_for_resolved, locate_profile, parse_located,
};

/// 一次命令行调用的参数。
#[derive(Debug, Clone, Default)]
pub struct CliRequest {
    pub profile: PathBuf,
    /// 通过 `--config` 显式指定的配置文件。
    pub config: Option<PathBuf>,
    pub overrides: ParseOverrides,
    /// 以记录型后端执行建模流程并打印调用序列。
    pub plan: bool,
}

/// 定位剖面、确定最终配置并解析剖面。
pub fn prepare(
    request: &CliRequest,
    config: &AppConfig,
) -> Result<(AppConfig, LoadedProfile), FrontendError> {
    let path = locate_profile(&request.profile, config)?;
    let config = config_for_resolved(&request.profile, &path, request.config.is_some(), config)?;
    let loaded = parse_located(path, &config, request.overrides)?;
    Ok((config, loaded))
}

pub fn run(request: &CliRequest, config: &AppConfig) -> Result<(), FrontendError> {
    let (config, loaded) = prepare(request, config)?;
    for line in profile_report(&loaded) {
        println!("{line}");
    }

    if request.plan {
        let mut backend = RecordingBackend::new();
        let parts = WaveguideBuilder::new(&config).build(&loaded.outcome.profile, &mut backend)?;
        info!(operations = backend.operations().len(), "建模计划生成完成");
        for line in plan_report(&parts, &backend) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn profile_report(loaded: &LoadedProfile) -> Vec<String> {
    let profile = &loaded.outcome.profile;
    let mut lines = vec![
        format!("剖面文件：{}", loaded.path.display()),
        format!(
            "解析模式：{}，圆弧回折：{}",
            match loaded.options.mode {
                ParseMode::Strict => "严格",
                ParseMode::Lenient => "宽松",
            },
            if loaded.options.round_back { "是" } else { "否" }
        ),
    ];
    let live = profile.live_point_count();
    let records = profile.points().len();
    if live == records {
        lines.push(format!("点数量：{live}"));
    } else {
        lines.push(format!("点数量：{live}（点记录 {records} 条，{} 条被重复定义覆盖）", records - live));
    }
    if let Some(bounds) = profile.bounds() {
        let (min, max) = (bounds.min(), bounds.max());
        lines.push(format!(
            "包围盒：({:.2}, {:.2}) - ({:.2}, {:.2})",
            min.x(),
            min.y(),
            max.x(),
            max.y()
        ));
    }

    lines.push(format!("曲线数量：{}", profile.curves().len()));
    for (index, curve) in profile.curves().iter().enumerate() {
        lines.push(format!("  {:>3}. {}", index + 1, describe_curve(profile, curve)));
    }

    if !loaded.outcome.warnings.is_empty() {
        lines.push(format!("解析提示：{} 条", loaded.outcome.warnings.len()));
    }
    lines
}

fn describe_curve(profile: &Profile, curve: &Curve) -> String {
    let labels: Vec<&str> = curve
        .point_ids()
        .into_iter()
        .map(|id| profile.point(id).map_or("?", |point| point.label.as_str()))
        .collect();
    match curve {
        Curve::Segment { .. } => format!("线段 {}", labels.join(" -> ")),
        Curve::Spline { points } => format!("样条 {} 点: {}", points.len(), labels.join(" ")),
        Curve::Arc(arc) => format!(
            "圆弧 {} 圆心 ({:.2}, {:.2}) 半径 {:.2}",
            labels.join(" -> "),
            arc.center.x(),
            arc.center.y(),
            arc.radius
        ),
    }
}

pub fn plan_report(parts: &WaveguideParts, backend: &RecordingBackend) -> Vec<String> {
    let mut lines = vec![format!("建模计划：{} 步", backend.operations().len())];
    lines.extend(
        backend
            .operations()
            .iter()
            .enumerate()
            .map(|(index, op)| format!("  {:>3}. {}", index + 1, describe_operation(op))),
    );
    lines.push(format!(
        "喉部半径 {:.2} cm，安装孔 {} 个，花瓣连接件 {} 组",
        parts.throat_radius, parts.mounting_holes, parts.petal_connectors
    ));
    for path in &parts.exported {
        lines.push(format!("  导出 {}", path.display()));
    }
    lines
}

fn describe_operation(op: &Operation) -> String {
    match op {
        Operation::CreateSketch {
            sketch,
            target,
            name,
        } => format!("创建草图 {name} ({sketch}) 于 {target:?}"),
        Operation::Draw {
            sketch,
            entity,
            kind,
        } => format!("{sketch} 绘制 {kind} #{}", entity.get()),
        Operation::Revolve {
            region,
            body,
            angle,
        } => format!("旋转 {region} {:.1}° -> {body}", angle.to_degrees()),
        Operation::OffsetPlane {
            plane,
            base,
            distance,
        } => format!("偏移平面 {base:?} {distance:.2} cm -> {plane}"),
        Operation::SplitBody { body, plane, parts } => {
            format!("以 {plane:?} 分割 {body} -> {}, {}", parts.0, parts.1)
        }
        Operation::Extrude {
            region,
            extent,
            operation,
            body,
        } => format!("拉伸 {region} {extent:?} {operation:?} -> {body}"),
        Operation::Fillet { edges, radius } => format!("圆角 {edges} 条边 r={radius:.3} cm"),
        Operation::RenameBody { body, name } => format!("命名 {body} 为 {name}"),
        Operation::ExportMesh { body, path } => format!("导出 {body} 到 {}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use athwg_core::geometry::Point2;
    use athwg_io::{ParseOptions, ParseOutcome, ParseWarning};

    use super::*;

    fn loaded() -> LoadedProfile {
        let mut profile = Profile::new();
        let a = profile.push_point("1", Point2::new(0.0, 0.0), 1);
        let b = profile.push_point("2", Point2::new(0.0, 1.0), 2);
        let c = profile.push_point("3", Point2::new(2.0, 3.0), 3);
        profile.push_curve(Curve::Segment { start: a, end: b });
        profile.push_curve(Curve::Spline {
            points: vec![b, c, a],
        });
        LoadedProfile {
            path: PathBuf::from("horn.afp"),
            options: ParseOptions::new(false, ParseMode::Lenient),
            outcome: ParseOutcome {
                profile,
                warnings: vec![ParseWarning::UnknownRecord {
                    line: 9,
                    discriminator: "X".to_string(),
                }],
            },
        }
    }

    #[test]
    fn profile_report_lists_every_curve() {
        let report = profile_report(&loaded());
        assert_eq!(report[0], "剖面文件：horn.afp");
        assert!(report[1].contains("宽松"));
        assert!(report.iter().any(|line| line == "曲线数量：2"));
        assert!(report.iter().any(|line| line.ends_with("线段 1 -> 2")));
        assert!(report.iter().any(|line| line.ends_with("样条 3 点: 2 3 1")));
        assert_eq!(report.last().map(String::as_str), Some("解析提示：1 条"));
    }

    #[test]
    fn report_counts_only_live_points() {
        let mut loaded = loaded();
        loaded
            .outcome
            .profile
            .push_point("1", Point2::new(50.0, 50.0), 10);
        let report = profile_report(&loaded);
        assert!(
            report
                .iter()
                .any(|line| line == "点数量：3（点记录 4 条，1 条被重复定义覆盖）")
        );
    }

    #[test]
    fn prepare_reads_sidecar_of_profile_found_in_search_root() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(
            dir.path().join("horn.afp"),
            "P 1 0 0\nP 2 0 10\nP 3 20 10\nL 1 2\nL 2 3\nL 3 1\n",
        )
        .expect("write profile");
        fs::write(
            dir.path().join("horn.toml"),
            "[Throat]\nlength = \"3 cm\"\n[Profile]\nlenient = \"True\"\n",
        )
        .expect("write sidecar");

        let mut config = AppConfig::default();
        config.profile.search_roots = vec![dir.path().to_path_buf()];
        let request = CliRequest {
            profile: PathBuf::from("horn.afp"),
            ..CliRequest::default()
        };
        let (settled, loaded) = prepare(&request, &config).expect("prepare");

        assert_eq!(loaded.path, dir.path().join("horn.afp"));
        assert!((settled.throat.length.cm() - 3.0).abs() < 1e-12);
        assert_eq!(loaded.options.mode, ParseMode::Lenient, "侧车配置应作用于解析选项");
        assert_eq!(loaded.outcome.profile.curves().len(), 3);
    }

    #[test]
    fn plan_report_starts_with_operation_count() {
        let loaded = loaded();
        let mut backend = RecordingBackend::new();
        let parts = WaveguideBuilder::new(&AppConfig::default())
            .build(&loaded.outcome.profile, &mut backend)
            .expect("建模流程失败");
        let report = plan_report(&parts, &backend);
        assert_eq!(report[0], format!("建模计划：{} 步", backend.operations().len()));
        assert!(report[1].contains("创建草图 AthProfile"));
        assert_eq!(report.len(), backend.operations().len() + 2);
    }
}
