//! 尺寸表达式求值。
//!
//! 表达式由若干项以 `+`/`-` 连接，每项为十进制数，可后缀单位
//! （`mm`、`cm`、`m`、`in`、`ft`）。无单位的项按默认单位厘米计。
//! 结果统一换算为厘米，与剖面坐标使用同一长度单位。

use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Millimeter,
    Centimeter,
    Meter,
    Inch,
    Foot,
}

impl LengthUnit {
    /// 建模系统的默认长度单位。
    pub const DEFAULT: LengthUnit = LengthUnit::Centimeter;

    #[inline]
    pub fn to_cm(self) -> f64 {
        match self {
            LengthUnit::Millimeter => 0.1,
            LengthUnit::Centimeter => 1.0,
            LengthUnit::Meter => 100.0,
            LengthUnit::Inch => 2.54,
            LengthUnit::Foot => 30.48,
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "mm" => Some(LengthUnit::Millimeter),
            "cm" => Some(LengthUnit::Centimeter),
            "m" => Some(LengthUnit::Meter),
            "in" => Some(LengthUnit::Inch),
            "ft" => Some(LengthUnit::Foot),
            _ => None,
        }
    }
}

/// 以厘米保存的长度值。
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Length(f64);

impl Length {
    #[inline]
    pub fn from_cm(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn new(value: f64, unit: LengthUnit) -> Self {
        Self(value * unit.to_cm())
    }

    #[inline]
    pub fn cm(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn mm(self) -> f64 {
        self.0 * 10.0
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cm", self.0)
    }
}

impl FromStr for Length {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        ExpressionParser::new(text).evaluate().map(Length)
    }
}

struct ExpressionParser<'a> {
    source: &'a str,
    chars: Peekable<Chars<'a>>,
}

impl<'a> ExpressionParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
        }
    }

    fn evaluate(mut self) -> Result<f64, ConfigError> {
        let mut total = self.term()?;
        loop {
            self.skip_whitespace();
            match self.chars.next() {
                None => return Ok(total),
                Some('+') => total += self.term()?,
                Some('-') => total -= self.term()?,
                Some(other) => return Err(self.error(format!("意外的字符 '{other}'"))),
            }
        }
    }

    fn term(&mut self) -> Result<f64, ConfigError> {
        self.skip_whitespace();
        let mut sign = 1.0;
        while let Some(c) = self.chars.next_if(|c| *c == '+' || *c == '-') {
            if c == '-' {
                sign = -sign;
            }
            self.skip_whitespace();
        }

        let number = self.take_while(|c| c.is_ascii_digit() || c == '.');
        if number.is_empty() {
            return Err(self.error("缺少数值".to_string()));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| self.error(format!("无法解析数值 \"{number}\"")))?;

        self.skip_whitespace();
        let symbol = self.take_while(|c| c.is_ascii_alphabetic());
        let unit = if symbol.is_empty() {
            LengthUnit::DEFAULT
        } else {
            LengthUnit::from_symbol(&symbol)
                .ok_or_else(|| self.error(format!("未知单位 \"{symbol}\"")))?
        };
        Ok(sign * value * unit.to_cm())
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let mut taken = String::new();
        while let Some(&c) = self.chars.peek() {
            if !predicate(c) {
                break;
            }
            taken.push(c);
            self.chars.next();
        }
        taken
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn error(&self, reason: String) -> ConfigError {
        ConfigError::Expression {
            expression: self.source.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cm(text: &str) -> f64 {
        text.parse::<Length>().expect("表达式应可求值").cm()
    }

    #[test]
    fn plain_number_uses_default_unit() {
        assert!((cm("8") - 8.0).abs() < 1e-12);
        assert!((cm("  0.25 ") - 0.25).abs() < 1e-12);
    }

    #[test]
    fn units_are_converted_to_centimetres() {
        assert!((cm("8 cm") - 8.0).abs() < 1e-12);
        assert!((cm("4mm") - 0.4).abs() < 1e-12);
        assert!((cm("1 in") - 2.54).abs() < 1e-12);
        assert!((cm("0.5 m") - 50.0).abs() < 1e-12);
    }

    #[test]
    fn terms_are_summed() {
        assert!((cm("8 cm + 2 mm") - 8.2).abs() < 1e-12);
        assert!((cm("1 cm - 5 mm") - 0.5).abs() < 1e-12);
        assert!((cm("-2 mm") + 0.2).abs() < 1e-12);
    }

    #[test]
    fn invalid_expressions_are_rejected() {
        for text in ["", "cm", "8 parsec", "8 cm +", "8 * 2", "1.2.3 mm"] {
            let err = text.parse::<Length>().expect_err(text);
            assert!(matches!(err, ConfigError::Expression { .. }), "{text}");
        }
    }

    #[test]
    fn display_reports_centimetres() {
        assert_eq!(Length::new(1.0, LengthUnit::Inch).to_string(), "2.54 cm");
    }
}
