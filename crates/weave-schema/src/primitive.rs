use core::fmt;
use std::sync::LazyLock;

use regex::Regex;
use weave_document::PrimitiveValue;

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-\.]{1,64}$").expect("invalid id regex"));

static CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s]+( [^\s]+)*$").expect("invalid code regex"));

static INTEGER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0|[-+]?[1-9][0-9]*)$").expect("invalid integer regex"));

static DECIMAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?$")
        .expect("invalid decimal regex")
});

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}(-(0[1-9]|1[0-2])(-(0[1-9]|[12][0-9]|3[01]))?)?$")
        .expect("invalid date regex")
});

static DATE_TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9]{4}(-(0[1-9]|1[0-2])(-(0[1-9]|[12][0-9]|3[01])(T([01][0-9]|2[0-3]):[0-5][0-9]:([0-5][0-9]|60)(\.[0-9]+)?(Z|[+-]((0[0-9]|1[0-3]):[0-5][0-9]|14:00)))?)?)?$",
    )
    .expect("invalid dateTime regex")
});

static INSTANT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9]{4}-(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])T([01][0-9]|2[0-3]):[0-5][0-9]:([0-5][0-9]|60)(\.[0-9]+)?(Z|[+-]((0[0-9]|1[0-3]):[0-5][0-9]|14:00))$",
    )
    .expect("invalid instant regex")
});

#[derive(Debug, PartialEq, Eq, thiserror::Error, Clone)]
pub enum ScalarError {
    #[error("empty value is not a valid {kind}")]
    Empty { kind: PrimitiveKind },
    #[error("'{raw}' is not a valid {kind}")]
    Invalid { kind: PrimitiveKind, raw: String },
    #[error("{raw} is out of range for {kind}")]
    OutOfRange { kind: PrimitiveKind, raw: String },
}

/// Leaf scalar types known to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Code,
    Id,
    Uri,
    Boolean,
    Integer,
    UnsignedInt,
    PositiveInt,
    Decimal,
    Date,
    DateTime,
    Instant,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 12] = [
        PrimitiveKind::String,
        PrimitiveKind::Code,
        PrimitiveKind::Id,
        PrimitiveKind::Uri,
        PrimitiveKind::Boolean,
        PrimitiveKind::Integer,
        PrimitiveKind::UnsignedInt,
        PrimitiveKind::PositiveInt,
        PrimitiveKind::Decimal,
        PrimitiveKind::Date,
        PrimitiveKind::DateTime,
        PrimitiveKind::Instant,
    ];

    /// The type name used for values of this kind.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Code => "code",
            PrimitiveKind::Id => "id",
            PrimitiveKind::Uri => "uri",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::UnsignedInt => "unsignedInt",
            PrimitiveKind::PositiveInt => "positiveInt",
            PrimitiveKind::Decimal => "decimal",
            PrimitiveKind::Date => "date",
            PrimitiveKind::DateTime => "dateTime",
            PrimitiveKind::Instant => "instant",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Validate the lexical form of `raw` and convert it.
    ///
    /// Empty input is rejected for every kind; absence of a value is expressed
    /// by not calling this at all.
    pub fn parse(self, raw: &str) -> Result<PrimitiveValue, ScalarError> {
        if raw.is_empty() {
            return Err(ScalarError::Empty { kind: self });
        }
        let invalid = || ScalarError::Invalid {
            kind: self,
            raw: raw.to_string(),
        };
        match self {
            PrimitiveKind::String => Ok(PrimitiveValue::String(raw.to_string())),
            PrimitiveKind::Uri => {
                if raw.chars().any(char::is_whitespace) {
                    return Err(invalid());
                }
                Ok(PrimitiveValue::String(raw.to_string()))
            }
            PrimitiveKind::Code => Self::matching(&CODE_PATTERN, raw).ok_or_else(invalid),
            PrimitiveKind::Id => Self::matching(&ID_PATTERN, raw).ok_or_else(invalid),
            PrimitiveKind::Date => Self::matching(&DATE_PATTERN, raw).ok_or_else(invalid),
            PrimitiveKind::DateTime => Self::matching(&DATE_TIME_PATTERN, raw).ok_or_else(invalid),
            PrimitiveKind::Instant => Self::matching(&INSTANT_PATTERN, raw).ok_or_else(invalid),
            PrimitiveKind::Boolean => match raw {
                "true" => Ok(PrimitiveValue::Boolean(true)),
                "false" => Ok(PrimitiveValue::Boolean(false)),
                _ => Err(invalid()),
            },
            PrimitiveKind::Decimal => {
                if !DECIMAL_PATTERN.is_match(raw) {
                    return Err(invalid());
                }
                Ok(PrimitiveValue::Decimal(raw.to_string()))
            }
            PrimitiveKind::Integer | PrimitiveKind::UnsignedInt | PrimitiveKind::PositiveInt => {
                self.parse_integer(raw)
            }
        }
    }

    fn matching(pattern: &Regex, raw: &str) -> Option<PrimitiveValue> {
        pattern
            .is_match(raw)
            .then(|| PrimitiveValue::String(raw.to_string()))
    }

    fn parse_integer(self, raw: &str) -> Result<PrimitiveValue, ScalarError> {
        if !INTEGER_PATTERN.is_match(raw) {
            return Err(ScalarError::Invalid {
                kind: self,
                raw: raw.to_string(),
            });
        }
        let out_of_range = || ScalarError::OutOfRange {
            kind: self,
            raw: raw.to_string(),
        };
        let value: i32 = raw.parse().map_err(|_| out_of_range())?;
        let min = match self {
            PrimitiveKind::UnsignedInt => 0,
            PrimitiveKind::PositiveInt => 1,
            _ => i32::MIN,
        };
        if value < min {
            return Err(out_of_range());
        }
        Ok(PrimitiveValue::Integer(i64::from(value)))
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
