//! Angular quantities as reported by image headers, with unit conversion.

use std::{f64::consts::PI, fmt, str::FromStr};

use pest::Parser;
use serde::{Deserialize, Serialize};

use crate::{
    error::{RestoreError, Result},
    parser::{RestoreParser, Rule},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    Rad,
    Deg,
    Arcmin,
    Arcsec,
    Mas,
}

impl AngleUnit {
    /// How many of this unit make up one degree.
    pub fn per_degree(self) -> f64 {
        match self {
            AngleUnit::Rad => PI / 180.0,
            AngleUnit::Deg => 1.0,
            AngleUnit::Arcmin => 60.0,
            AngleUnit::Arcsec => 3600.0,
            AngleUnit::Mas => 3.6e6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AngleUnit::Rad => "rad",
            AngleUnit::Deg => "deg",
            AngleUnit::Arcmin => "arcmin",
            AngleUnit::Arcsec => "arcsec",
            AngleUnit::Mas => "mas",
        }
    }
}

impl FromStr for AngleUnit {
    type Err = RestoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rad" | "radian" | "radians" => Ok(AngleUnit::Rad),
            "deg" | "degree" | "degrees" => Ok(AngleUnit::Deg),
            "arcmin" | "amin" => Ok(AngleUnit::Arcmin),
            "arcsec" | "asec" => Ok(AngleUnit::Arcsec),
            "mas" => Ok(AngleUnit::Mas),
            _ => Err(RestoreError::UnknownUnit(s.to_string())),
        }
    }
}

impl fmt::Display for AngleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: AngleUnit,
}

impl Quantity {
    pub fn new(value: f64, unit: AngleUnit) -> Self {
        Self { value, unit }
    }

    pub fn deg(value: f64) -> Self {
        Self::new(value, AngleUnit::Deg)
    }

    pub fn arcsec(value: f64) -> Self {
        Self::new(value, AngleUnit::Arcsec)
    }

    /// Parses strings such as `1.5arcsec` or `30 deg`. A bare number is taken as degrees.
    pub fn parse(text: &str) -> Result<Self> {
        let mut pairs = RestoreParser::parse(Rule::quantity, text)
            .map_err(|_| RestoreError::Quantity(text.to_string()))?;
        let quantity = pairs
            .next()
            .ok_or_else(|| RestoreError::Quantity(text.to_string()))?;

        let mut value = None;
        let mut unit = AngleUnit::Deg;
        for pair in quantity.into_inner() {
            match pair.as_rule() {
                Rule::signed => {
                    value = Some(
                        pair.as_str()
                            .parse::<f64>()
                            .map_err(|_| RestoreError::Quantity(text.to_string()))?,
                    )
                }
                Rule::unit => unit = pair.as_str().parse()?,
                _ => {}
            }
        }
        value
            .map(|value| Self::new(value, unit))
            .ok_or_else(|| RestoreError::Quantity(text.to_string()))
    }

    pub fn convert(&self, unit: AngleUnit) -> Self {
        if unit == self.unit {
            return *self;
        }
        Self::new(self.value / self.unit.per_degree() * unit.per_degree(), unit)
    }

    pub fn to_deg(&self) -> f64 {
        self.convert(AngleUnit::Deg).value
    }

    pub fn to_arcsec(&self) -> f64 {
        self.convert(AngleUnit::Arcsec).value
    }

    pub fn to_radians(&self) -> f64 {
        self.convert(AngleUnit::Rad).value
    }
}

impl FromStr for Quantity {
    type Err = RestoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", format_value(self.value), self.unit)
    }
}

/// Formats a value for command lines, dropping float noise beyond 10 decimals.
pub fn format_value(value: f64) -> String {
    let s = format!("{:.10}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" || s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
