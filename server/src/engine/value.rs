//! Column types and cell values.

use std::cmp::Ordering;
use std::fmt;

use super::EngineError;

/// A column type supported by the memory engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
}

impl DataType {
    /// Parse a type name as written in `CREATE TABLE`.
    pub fn parse(name: &str) -> Result<Self, EngineError> {
        Ok(match name {
            "UInt8" => Self::UInt8,
            "UInt16" => Self::UInt16,
            "UInt32" => Self::UInt32,
            "UInt64" => Self::UInt64,
            "Int8" => Self::Int8,
            "Int16" => Self::Int16,
            "Int32" => Self::Int32,
            "Int64" => Self::Int64,
            "Float32" => Self::Float32,
            "Float64" => Self::Float64,
            "String" => Self::String,
            other => return Err(EngineError::UnknownType(other.to_owned())),
        })
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UInt8 => "UInt8",
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Float32 => "Float32",
            Self::Float64 => "Float64",
            Self::String => "String",
        }
    }

    /// Inclusive bounds of an unsigned type.
    const fn unsigned_max(self) -> Option<u64> {
        match self {
            Self::UInt8 => Some(u8::MAX as u64),
            Self::UInt16 => Some(u16::MAX as u64),
            Self::UInt32 => Some(u32::MAX as u64),
            Self::UInt64 => Some(u64::MAX),
            _ => None,
        }
    }

    /// Inclusive bounds of a signed type.
    const fn signed_range(self) -> Option<(i64, i64)> {
        match self {
            Self::Int8 => Some((i8::MIN as i64, i8::MAX as i64)),
            Self::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            Self::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            Self::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Convert a literal into a value of this type.
    ///
    /// Integers are range-checked, integers widen to floats, and nothing
    /// converts to or from `String`.
    pub fn coerce(self, value: Value) -> Result<Value, EngineError> {
        let mismatch = |value: &Value| {
            EngineError::InvalidValue(format!("cannot store {value:?} in a {} column", self.name()))
        };

        if let Some(max) = self.unsigned_max() {
            return match value {
                Value::UInt(v) if v <= max => Ok(Value::UInt(v)),
                Value::Int(v) if u64::try_from(v).is_ok_and(|u| u <= max) => {
                    Ok(Value::UInt(v.unsigned_abs()))
                }
                other @ (Value::UInt(_) | Value::Int(_)) => Err(EngineError::InvalidValue(format!(
                    "value {other} is out of range for {}",
                    self.name()
                ))),
                other => Err(mismatch(&other)),
            };
        }

        if let Some((min, max)) = self.signed_range() {
            let as_signed = match value {
                Value::Int(v) => Some(v),
                Value::UInt(v) => i64::try_from(v).ok(),
                ref other @ (Value::Float(_) | Value::String(_)) => return Err(mismatch(other)),
            };
            return match as_signed {
                Some(v) if (min..=max).contains(&v) => Ok(Value::Int(v)),
                _ => Err(EngineError::InvalidValue(format!(
                    "value {value} is out of range for {}",
                    self.name()
                ))),
            };
        }

        match (self, value) {
            (Self::Float32 | Self::Float64, Value::Float(v)) => Ok(Value::Float(v)),
            #[allow(clippy::cast_precision_loss)]
            (Self::Float32 | Self::Float64, Value::UInt(v)) => Ok(Value::Float(v as f64)),
            #[allow(clippy::cast_precision_loss)]
            (Self::Float32 | Self::Float64, Value::Int(v)) => Ok(Value::Float(v as f64)),
            (Self::String, Value::String(s)) => Ok(Value::String(s)),
            (_, other) => Err(mismatch(&other)),
        }
    }

    /// Parse one unescaped text field (from a formatted insert) into a value.
    pub fn parse_text(self, field: &str) -> Result<Value, EngineError> {
        if self == Self::String {
            return Ok(Value::String(field.to_owned()));
        }
        let literal = Value::parse_number(field.trim()).ok_or_else(|| {
            EngineError::InvalidValue(format!("cannot parse '{field}' as {}", self.name()))
        })?;
        self.coerce(literal)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    UInt(u64),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Parse a numeric literal. Non-negative integers become `UInt`.
    #[must_use]
    pub fn parse_number(text: &str) -> Option<Self> {
        if let Ok(v) = text.parse::<u64>() {
            return Some(Self::UInt(v));
        }
        if let Ok(v) = text.parse::<i64>() {
            return Some(Self::Int(v));
        }
        match text {
            "inf" | "+inf" => Some(Self::Float(f64::INFINITY)),
            "-inf" => Some(Self::Float(f64::NEG_INFINITY)),
            "nan" => Some(Self::Float(f64::NAN)),
            _ if text.bytes().any(|b| b.is_ascii_digit()) => text.parse::<f64>().ok().map(Self::Float),
            _ => None,
        }
    }

    /// The type a bare literal of this value reports.
    #[must_use]
    pub const fn literal_type(&self) -> DataType {
        match self {
            Self::UInt(_) => DataType::UInt64,
            Self::Int(_) => DataType::Int64,
            Self::Float(_) => DataType::Float64,
            Self::String(_) => DataType::String,
        }
    }

    #[must_use]
    pub fn negate(self) -> Option<Self> {
        match self {
            Self::UInt(v) if v <= i64::MIN.unsigned_abs() => {
                Some(Self::Int(0_i64.wrapping_sub_unsigned(v)))
            }
            Self::Int(v) => v.checked_neg().map(Self::Int),
            Self::Float(v) => Some(Self::Float(-v)),
            Self::UInt(_) | Self::String(_) => None,
        }
    }

    /// Total order used by `ORDER BY` and comparisons.
    ///
    /// Numbers compare by value across variants and sort before strings.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::UInt(a), Self::UInt(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::UInt(a), Self::Int(b)) => cmp_unsigned_signed(*a, *b),
            (Self::Int(a), Self::UInt(b)) => cmp_unsigned_signed(*b, *a).reverse(),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::String(_), _) => Ordering::Greater,
            (_, Self::String(_)) => Ordering::Less,
            (a, b) => a.as_f64().total_cmp(&b.as_f64()),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(&self) -> f64 {
        match self {
            Self::UInt(v) => *v as f64,
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
            Self::String(_) => f64::NAN,
        }
    }
}

fn cmp_unsigned_signed(a: u64, b: i64) -> Ordering {
    if b < 0 {
        Ordering::Greater
    } else {
        a.cmp(&b.unsigned_abs())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) if v.is_nan() => f.write_str("nan"),
            Self::Float(v) if v.is_infinite() => {
                f.write_str(if v.is_sign_negative() { "-inf" } else { "inf" })
            }
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// A row is one value per column, in column order.
pub type Row = Vec<Value>;
