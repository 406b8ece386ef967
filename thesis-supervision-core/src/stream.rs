//! Stream catalog: academic stream codes and their grammar.
//!
//! A stream identifies a cohort+specialty+course combination, e.g. `FES-2`
//! or `FEP-2VPK`. Codes follow a strict grammar and are immutable once
//! slots or requests reference them.

use core::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

static STREAM_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(FEI|FES|FEM|FEL|FEP)-([1-4])(m|VPK)?$").expect("stream code grammar")
});

// Cohort codes carry a group digit after the course digit ("FES-21") and,
// for the military-programme cohorts, a VPK suffix after a possibly
// two-digit course+group number ("FEP-22VPK").
static COHORT_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(FEI|FES|FEM|FEL|FEP)-([1-4])([0-9]{0,2})(m|VPK)?$").expect("cohort code grammar")
});

/// Faculty prefix of a stream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Faculty {
    Fei,
    Fes,
    Fem,
    Fel,
    Fep,
}

impl Faculty {
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "FEI" => Some(Self::Fei),
            "FES" => Some(Self::Fes),
            "FEM" => Some(Self::Fem),
            "FEL" => Some(Self::Fel),
            "FEP" => Some(Self::Fep),
            _ => None,
        }
    }

    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Fei => "FEI",
            Self::Fes => "FES",
            Self::Fem => "FEM",
            Self::Fel => "FEL",
            Self::Fep => "FEP",
        }
    }

    /// Only two faculties run master programmes.
    pub const fn offers_master(self) -> bool {
        matches!(self, Self::Fei | Self::Fem)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum StreamSuffix {
    #[default]
    None,
    Master,
    Vpk,
}

impl StreamSuffix {
    const fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Master => "m",
            Self::Vpk => "VPK",
        }
    }
}

/// A validated stream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamCode {
    pub faculty: Faculty,
    pub course: u8,
    pub suffix: StreamSuffix,
}

impl StreamCode {
    pub fn new(faculty: Faculty, course: u8, suffix: StreamSuffix) -> Result<Self, CoreError> {
        let code = Self {
            faculty,
            course,
            suffix,
        };
        if !(1..=4).contains(&course) {
            return Err(code.invalid());
        }
        // Master streams exist only at the two master-level faculties and
        // only for the first two courses of the programme.
        if suffix == StreamSuffix::Master && (!faculty.offers_master() || course > 2) {
            return Err(code.invalid());
        }
        Ok(code)
    }

    pub fn parse(code: &str) -> Result<Self, CoreError> {
        let captures = STREAM_CODE
            .captures(code)
            .ok_or_else(|| CoreError::InvalidStreamCode {
                code: code.to_owned(),
            })?;
        let faculty = Faculty::from_prefix(&captures[1]).ok_or_else(|| {
            CoreError::InvalidStreamCode {
                code: code.to_owned(),
            }
        })?;
        let course = captures[2].parse::<u8>().map_err(|_| {
            CoreError::InvalidStreamCode {
                code: code.to_owned(),
            }
        })?;
        let suffix = match captures.get(3).map(|m| m.as_str()) {
            Some("m") => StreamSuffix::Master,
            Some("VPK") => StreamSuffix::Vpk,
            _ => StreamSuffix::None,
        };
        Self::new(faculty, course, suffix)
    }

    /// Derives the stream a cohort belongs to from its cohort (academic
    /// group) code: prefix plus the first course digit, keeping the master
    /// or VPK suffix when present.
    pub fn from_cohort(cohort: &str) -> Result<Self, CoreError> {
        let captures = COHORT_CODE
            .captures(cohort)
            .ok_or_else(|| CoreError::InvalidStreamCode {
                code: cohort.to_owned(),
            })?;
        let faculty = Faculty::from_prefix(&captures[1]).ok_or_else(|| {
            CoreError::InvalidStreamCode {
                code: cohort.to_owned(),
            }
        })?;
        let course = captures[2].parse::<u8>().map_err(|_| {
            CoreError::InvalidStreamCode {
                code: cohort.to_owned(),
            }
        })?;
        let suffix = match captures.get(4).map(|m| m.as_str()) {
            Some("m") => StreamSuffix::Master,
            Some("VPK") => StreamSuffix::Vpk,
            _ => StreamSuffix::None,
        };
        Self::new(faculty, course, suffix).map_err(|_| CoreError::InvalidStreamCode {
            code: cohort.to_owned(),
        })
    }

    pub const fn is_master(&self) -> bool {
        matches!(self.suffix, StreamSuffix::Master)
    }

    fn invalid(&self) -> CoreError {
        CoreError::InvalidStreamCode {
            code: self.to_string(),
        }
    }
}

impl fmt::Display for StreamCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}{}",
            self.faculty.prefix(),
            self.course,
            self.suffix.as_str()
        )
    }
}

impl TryFrom<String> for StreamCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StreamCode> for String {
    fn from(value: StreamCode) -> Self {
        value.to_string()
    }
}

/// Reference data for one registered stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub code: StreamCode,
    pub specialty_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_codes() {
        let code = StreamCode::parse("FES-2").unwrap();
        assert_eq!(code.faculty, Faculty::Fes);
        assert_eq!(code.course, 2);
        assert_eq!(code.suffix, StreamSuffix::None);
        assert_eq!(code.to_string(), "FES-2");
    }

    #[test]
    fn parses_master_and_vpk_suffixes() {
        assert!(StreamCode::parse("FEI-1m").unwrap().is_master());
        assert_eq!(
            StreamCode::parse("FEP-2VPK").unwrap().suffix,
            StreamSuffix::Vpk
        );
    }

    #[test]
    fn rejects_malformed_codes() {
        for code in ["FES", "FES-5", "FXX-2", "FES-2x", "fes-2", "FES-0"] {
            assert!(
                matches!(
                    StreamCode::parse(code),
                    Err(CoreError::InvalidStreamCode { .. })
                ),
                "{code} should be invalid"
            );
        }
    }

    #[test]
    fn master_restricted_to_two_faculties_and_low_courses() {
        assert!(StreamCode::parse("FES-1m").is_err());
        assert!(StreamCode::parse("FEL-2m").is_err());
        assert!(StreamCode::parse("FEI-3m").is_err());
        assert!(StreamCode::parse("FEM-2m").is_ok());
    }

    #[test]
    fn derives_stream_from_cohort() {
        assert_eq!(
            StreamCode::from_cohort("FES-21").unwrap().to_string(),
            "FES-2"
        );
        assert_eq!(
            StreamCode::from_cohort("FEI-11m").unwrap().to_string(),
            "FEI-1m"
        );
    }

    #[test]
    fn vpk_cohorts_keep_suffix_and_first_course_digit() {
        assert_eq!(
            StreamCode::from_cohort("FEP-22VPK").unwrap().to_string(),
            "FEP-2VPK"
        );
        assert_eq!(
            StreamCode::from_cohort("FEP-2VPK").unwrap().to_string(),
            "FEP-2VPK"
        );
    }

    #[test]
    fn rejects_malformed_cohorts() {
        assert!(StreamCode::from_cohort("FES21").is_err());
        assert!(StreamCode::from_cohort("ABC-21").is_err());
    }
}
