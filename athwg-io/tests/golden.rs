use athwg_core::profile::{Curve, Profile};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;

const FLOAT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Serialize, Deserialize)]
pub struct GoldenProfile {
    points: Vec<GoldenPoint>,
    curves: Vec<GoldenCurve>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GoldenPoint {
    label: String,
    position: [f64; 2],
}

#[derive(Debug, Serialize, Deserialize)]
struct GoldenCurve {
    kind: String,
    points: Vec<String>,
    data: Value,
}

pub fn assert_golden(name: &str, profile: &Profile) {
    let snapshot = GoldenProfile::from_profile(profile);
    let base_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/golden");
    if let Err(err) = fs::create_dir_all(&base_dir) {
        panic!("无法创建黄金数据目录 {}: {err}", base_dir.display());
    }
    let golden_path = base_dir.join(format!("{name}.json"));
    let serialized = serde_json::to_string_pretty(&snapshot).expect("序列化黄金快照失败");

    if !golden_path.exists() {
        fs::write(&golden_path, &serialized)
            .unwrap_or_else(|err| panic!("写入黄金文件 {} 失败: {err}", golden_path.display()));
        panic!(
            "黄金文件 {} 不存在，已自动生成。请确认内容后重新运行测试。",
            golden_path.display()
        );
    }

    let expected_str = fs::read_to_string(&golden_path)
        .unwrap_or_else(|err| panic!("读取黄金文件 {} 失败: {err}", golden_path.display()));
    let expected: Value = serde_json::from_str(&expected_str)
        .unwrap_or_else(|err| panic!("解析黄金文件 {} 失败: {err}", golden_path.display()));
    let actual = serde_json::to_value(&snapshot).expect("转换黄金快照失败");

    if !values_match(&expected, &actual) {
        let diff_path = base_dir.join(format!("{name}.actual.json"));
        fs::write(&diff_path, &serialized).expect("写入差异文件失败");
        panic!(
            "黄金文件 {} 与当前解析结果不一致。已生成对照输出 {}。",
            golden_path.display(),
            diff_path.display()
        );
    }
}

impl GoldenProfile {
    fn from_profile(profile: &Profile) -> Self {
        let points = profile
            .points()
            .iter()
            .map(|point| GoldenPoint {
                label: point.label.clone(),
                position: [point.position.x(), point.position.y()],
            })
            .collect();
        let curves = profile
            .curves()
            .iter()
            .map(|curve| GoldenCurve {
                kind: curve.kind_name().to_string(),
                points: curve
                    .point_ids()
                    .into_iter()
                    .filter_map(|id| profile.point(id))
                    .map(|point| point.label.clone())
                    .collect(),
                data: curve_data(curve),
            })
            .collect();
        Self { points, curves }
    }
}

fn curve_data(curve: &Curve) -> Value {
    match curve {
        Curve::Segment { .. } | Curve::Spline { .. } => Value::Null,
        Curve::Arc(arc) => json!({
            "center": [arc.center.x(), arc.center.y()],
            "radius": arc.radius,
            "start_angle": arc.start_angle,
            "sweep": arc.sweep
        }),
    }
}

/// 结构相等，浮点数按容差比较（整数与浮点表示视为同一数值）。
fn values_match(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < FLOAT_TOLERANCE,
            _ => false,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_match(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_match(x, y)))
        }
        _ => expected == actual,
    }
}
