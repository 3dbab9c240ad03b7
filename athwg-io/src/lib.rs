use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use athwg_core::{
    geometry::Point2,
    profile::{ArcCurve, Curve, PointId, Profile},
};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// 源格式坐标到建模单位（厘米）的固定换算系数。
pub const UNIT_SCALE: f64 = 0.1;

/// 启用圆背选项时，以该标签开头的 `L` 记录改为半圆弧。
pub const ROUND_BACK_LABEL: &str = "61";

/// 短于该字符数的行视同空行。
const MIN_RECORD_LEN: usize = 3;

const MIN_SPLINE_POINTS: usize = 3;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid profile {path:?}: {source}")]
    Profile {
        path: PathBuf,
        #[source]
        source: ProfileError,
    },
}

/// 剖面解析失败。所有错误都会中止解析，不返回部分结果。
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("第 {line} 行记录格式错误: {kind}")]
    Parse { line: usize, kind: ParseErrorKind },
    #[error("第 {line} 行引用了未定义的点 \"{label}\"")]
    Lookup { line: usize, label: String },
    #[error("读取剖面数据失败: {source}")]
    Read {
        #[source]
        source: std::io::Error,
    },
}

impl ProfileError {
    /// 出错记录所在行号；读取错误没有行号。
    pub fn line(&self) -> Option<usize> {
        match self {
            ProfileError::Parse { line, .. } | ProfileError::Lookup { line, .. } => Some(*line),
            ProfileError::Read { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("{discriminator} 记录至少需要 {expected} 个字段，实际只有 {found} 个")]
    MissingFields {
        discriminator: char,
        expected: usize,
        found: usize,
    },
    #[error("字段 {field} 的值 \"{value}\" 无法解析为数值")]
    InvalidNumber { field: &'static str, value: String },
    #[error("样条区间端点 \"{value}\" 不是整数")]
    InvalidRangeBound { value: String },
    #[error("样条至少需要 3 个点，实际只有 {found} 个")]
    TooFewSplinePoints { found: usize },
}

/// 解析过程中的非致命提示。
#[derive(Debug, Clone, PartialEq)]
pub enum ParseWarning {
    /// 同一标签被再次定义，后者覆盖前者。
    DuplicateLabel {
        label: String,
        first_line: usize,
        line: usize,
    },
    /// 宽松模式下被丢弃的格式错误记录。
    SkippedRecord { line: usize, reason: ParseErrorKind },
    /// 无法识别的记录类型，两种模式下都会跳过。
    UnknownRecord { line: usize, discriminator: String },
}

impl ParseWarning {
    pub fn line(&self) -> usize {
        match self {
            ParseWarning::DuplicateLabel { line, .. }
            | ParseWarning::SkippedRecord { line, .. }
            | ParseWarning::UnknownRecord { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// 格式错误的记录立即报错。
    #[default]
    Strict,
    /// 与旧脚本一致：格式错误的记录被静默跳过。
    Lenient,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub round_back: bool,
    pub mode: ParseMode,
}

impl ParseOptions {
    pub fn new(round_back: bool, mode: ParseMode) -> Self {
        Self { round_back, mode }
    }
}

/// 解析结果：不可变的剖面以及解析期间收集的提示。
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub profile: Profile,
    pub warnings: Vec<ParseWarning>,
}

/// 单遍读取曲线定义流，返回按文件顺序排列的剖面。
pub fn parse_profile<R: BufRead>(
    source: R,
    options: ParseOptions,
) -> Result<ParseOutcome, ProfileError> {
    let mut parser = AfpParser::new(options);
    for (index, line) in source.lines().enumerate() {
        let line = line.map_err(|source| ProfileError::Read { source })?;
        parser.parse_line(index + 1, &line)?;
    }
    Ok(parser.finish())
}

pub fn parse_profile_str(source: &str, options: ParseOptions) -> Result<ParseOutcome, ProfileError> {
    parse_profile(source.as_bytes(), options)
}

pub trait ProfileLoader {
    fn load(&self, path: &Path) -> Result<ParseOutcome, IoError>;
}

/// `.afp` 剖面文件的读取入口。
#[derive(Debug, Clone, Copy, Default)]
pub struct AfpFacade {
    options: ParseOptions,
}

impl AfpFacade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    #[inline]
    pub fn options(&self) -> ParseOptions {
        self.options
    }
}

impl ProfileLoader for AfpFacade {
    fn load(&self, path: &Path) -> Result<ParseOutcome, IoError> {
        let file = File::open(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        parse_profile(BufReader::new(file), self.options).map_err(|err| match err {
            ProfileError::Read { source } => IoError::ReadError {
                path: path.to_path_buf(),
                source,
            },
            other => IoError::Profile {
                path: path.to_path_buf(),
                source: other,
            },
        })
    }
}

/// 单条记录的处理失败：格式问题可按模式跳过，引用错误始终致命。
#[derive(Debug)]
enum RecordError {
    Malformed(ParseErrorKind),
    Fatal(ProfileError),
}

impl From<ParseErrorKind> for RecordError {
    fn from(kind: ParseErrorKind) -> Self {
        Self::Malformed(kind)
    }
}

struct AfpParser {
    options: ParseOptions,
    profile: Profile,
    labels: HashMap<String, PointId>,
    warnings: Vec<ParseWarning>,
}

impl AfpParser {
    fn new(options: ParseOptions) -> Self {
        Self {
            options,
            profile: Profile::new(),
            labels: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    fn finish(self) -> ParseOutcome {
        debug!(
            points = self.profile.points().len(),
            curves = self.profile.curves().len(),
            warnings = self.warnings.len(),
            "剖面解析完成"
        );
        ParseOutcome {
            profile: self.profile,
            warnings: self.warnings,
        }
    }

    fn parse_line(&mut self, line_no: usize, raw: &str) -> Result<(), ProfileError> {
        let line = raw.trim_end();
        // 过短的行与注释行不做切分
        if line.chars().count() < MIN_RECORD_LEN || line.starts_with('#') {
            return Ok(());
        }

        let mut tokens = line.split_whitespace();
        let Some(discriminator) = tokens.next() else {
            return Ok(());
        };
        let fields: Vec<&str> = tokens.collect();

        let result = match discriminator {
            "P" => self.parse_point(line_no, &fields),
            "L" => self.parse_segment(line_no, &fields),
            "S" => self.parse_range_spline(line_no, &fields),
            "U" => self.parse_list_spline(line_no, &fields),
            other => {
                trace!(line = line_no, discriminator = other, "跳过未知记录");
                self.warnings.push(ParseWarning::UnknownRecord {
                    line: line_no,
                    discriminator: other.to_string(),
                });
                Ok(())
            }
        };

        match result {
            Ok(()) => Ok(()),
            Err(RecordError::Fatal(err)) => Err(err),
            Err(RecordError::Malformed(kind)) => match self.options.mode {
                ParseMode::Strict => Err(ProfileError::Parse {
                    line: line_no,
                    kind,
                }),
                ParseMode::Lenient => {
                    debug!(line = line_no, reason = %kind, "宽松模式下跳过格式错误的记录");
                    self.warnings.push(ParseWarning::SkippedRecord {
                        line: line_no,
                        reason: kind,
                    });
                    Ok(())
                }
            },
        }
    }

    fn parse_point(&mut self, line_no: usize, fields: &[&str]) -> Result<(), RecordError> {
        require_fields('P', fields, 3)?;
        let label = fields[0];
        let x = parse_coord(fields[1], "x")?;
        let y = parse_coord(fields[2], "y")?;

        let position = Point2::new(UNIT_SCALE * x, UNIT_SCALE * y);
        let id = self.profile.push_point(label, position, line_no);
        if let Some(previous) = self.labels.insert(label.to_string(), id) {
            let first_line = self
                .profile
                .point(previous)
                .map(|point| point.line)
                .unwrap_or_default();
            warn!(label, first_line, line = line_no, "点标签重复定义，后者覆盖前者");
            self.warnings.push(ParseWarning::DuplicateLabel {
                label: label.to_string(),
                first_line,
                line: line_no,
            });
        }
        Ok(())
    }

    fn parse_segment(&mut self, line_no: usize, fields: &[&str]) -> Result<(), RecordError> {
        require_fields('L', fields, 2)?;
        let start = self.lookup(line_no, fields[0])?;
        let end = self.lookup(line_no, fields[1])?;

        if self.options.round_back && fields[0] == ROUND_BACK_LABEL {
            let (Some(start_pos), Some(end_pos)) =
                (self.profile.position(start), self.profile.position(end))
            else {
                return Err(RecordError::Fatal(ProfileError::Lookup {
                    line: line_no,
                    label: fields[0].to_string(),
                }));
            };
            trace!(line = line_no, "圆背选项生效，线段替换为半圆弧");
            self.profile
                .push_curve(Curve::Arc(ArcCurve::half_circle(start, start_pos, end, end_pos)));
        } else {
            self.profile.push_curve(Curve::Segment { start, end });
        }
        Ok(())
    }

    fn parse_range_spline(&mut self, line_no: usize, fields: &[&str]) -> Result<(), RecordError> {
        require_fields('S', fields, 2)?;
        let first = parse_range_bound(fields[0])?;
        let last = parse_range_bound(fields[1])?;

        // 先校验点数，避免对倒置区间逐一查找
        let count = if last >= first {
            last.saturating_sub(first).saturating_add(1)
        } else {
            0
        };
        if count < MIN_SPLINE_POINTS as i64 {
            return Err(ParseErrorKind::TooFewSplinePoints {
                found: count as usize,
            }
            .into());
        }

        let mut points = Vec::new();
        for label in first..=last {
            points.push(self.lookup(line_no, &label.to_string())?);
        }
        self.profile.push_curve(Curve::Spline { points });
        Ok(())
    }

    fn parse_list_spline(&mut self, line_no: usize, fields: &[&str]) -> Result<(), RecordError> {
        if fields.len() < MIN_SPLINE_POINTS {
            return Err(ParseErrorKind::TooFewSplinePoints {
                found: fields.len(),
            }
            .into());
        }
        let points = fields
            .iter()
            .map(|label| self.lookup(line_no, label))
            .collect::<Result<Vec<_>, _>>()?;
        self.profile.push_curve(Curve::Spline { points });
        Ok(())
    }

    fn lookup(&self, line_no: usize, label: &str) -> Result<PointId, RecordError> {
        self.labels.get(label).copied().ok_or_else(|| {
            RecordError::Fatal(ProfileError::Lookup {
                line: line_no,
                label: label.to_string(),
            })
        })
    }
}

fn require_fields(discriminator: char, fields: &[&str], expected: usize) -> Result<(), ParseErrorKind> {
    if fields.len() < expected {
        return Err(ParseErrorKind::MissingFields {
            discriminator,
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

fn parse_coord(raw: &str, field: &'static str) -> Result<f64, ParseErrorKind> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ParseErrorKind::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

fn parse_range_bound(raw: &str) -> Result<i64, ParseErrorKind> {
    raw.parse::<i64>()
        .map_err(|_| ParseErrorKind::InvalidRangeBound {
            value: raw.to_string(),
        })
}
