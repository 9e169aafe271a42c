//! Physical-property data bank: a table of string values keyed by parameter name and
//! species name, both case-insensitive.
//!
//! Layout of a bank file: six free lines, a header line whose first token is a label and
//! whose remaining tokens are parameter names, one more free line, then one row per
//! species (`NAME v1 v2 ...`) up to the first blank line or the end of the file.
use log::{debug, info};
use nom::{
    IResult, Parser,
    bytes::complete::take_while1,
    character::complete::{space0, space1},
    multi::separated_list1,
    sequence::delimited,
};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

const SKIPPED_LINES_BEFORE_HEADER: usize = 6;
const SKIPPED_LINES_AFTER_HEADER: usize = 1;

/// densities of the condensed phases, kg/m^3, which the bank does not carry
pub const DENSITIES: [(&str, &str); 8] = [
    ("AL(S)", "2690"),
    ("GA(L)", "5900"),
    ("ALN(S)", "3200"),
    ("GAN(S)", "6150"),
    ("AL", "2690"),
    ("GA", "5900"),
    ("ALN", "3200"),
    ("GAN", "6150"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum ThermoDataError {
    Io { path: String, message: String },
    /// the text ends before the header or the header names no parameters
    MissingHeader,
    MalformedRow { line: usize, expected: usize, found: usize },
    MissingParameter(String),
    MissingSpecies { parameter: String, species: String },
    InvalidNumber { parameter: String, species: String, value: String },
}

impl fmt::Display for ThermoDataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ThermoDataError::Io { path, message } => {
                write!(f, "Cannot read data bank {}: {}", path, message)
            }
            ThermoDataError::MissingHeader => write!(f, "Data bank has no parameter header"),
            ThermoDataError::MalformedRow {
                line,
                expected,
                found,
            } => write!(
                f,
                "Line {}: expected species name and {} values, found {} tokens",
                line, expected, found
            ),
            ThermoDataError::MissingParameter(p) => write!(f, "Unknown parameter {}", p),
            ThermoDataError::MissingSpecies { parameter, species } => {
                write!(f, "No value of {} for species {}", parameter, species)
            }
            ThermoDataError::InvalidNumber {
                parameter,
                species,
                value,
            } => write!(
                f,
                "Value '{}' of {} for species {} is not a number",
                value, parameter, species
            ),
        }
    }
}

impl std::error::Error for ThermoDataError {}

/// whitespace-separated tokens of one line
fn parse_tokens(input: &str) -> IResult<&str, Vec<&str>> {
    let token = take_while1(|c: char| !c.is_whitespace());
    delimited(space0, separated_list1(space1, token), space0).parse(input)
}

fn tokens(line: &str) -> Vec<&str> {
    match parse_tokens(line) {
        Ok((_, tokens)) => tokens,
        Err(_) => Vec::new(),
    }
}

/// Immutable parameter/species table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThermoData {
    data: HashMap<String, HashMap<String, String>>,
}

impl ThermoData {
    pub fn from_file(path: &Path) -> Result<Self, ThermoDataError> {
        let text = fs::read_to_string(path).map_err(|e| ThermoDataError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let data: ThermoData = text.parse()?;
        info!(
            "data bank {} loaded: {} parameters",
            path.display(),
            data.data.len()
        );
        Ok(data)
    }

    fn insert(&mut self, parameter: &str, species: &str, value: &str) {
        self.data
            .entry(parameter.to_uppercase())
            .or_default()
            .insert(species.to_uppercase(), value.to_string());
    }

    pub fn get(&self, parameter: &str, species: &str) -> Result<&str, ThermoDataError> {
        let values = self
            .data
            .get(&parameter.to_uppercase())
            .ok_or_else(|| ThermoDataError::MissingParameter(parameter.to_string()))?;
        values
            .get(&species.to_uppercase())
            .map(|s| s.as_str())
            .ok_or_else(|| ThermoDataError::MissingSpecies {
                parameter: parameter.to_string(),
                species: species.to_string(),
            })
    }

    pub fn get_f64(&self, parameter: &str, species: &str) -> Result<f64, ThermoDataError> {
        let value = self.get(parameter, species)?;
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| ThermoDataError::InvalidNumber {
                parameter: parameter.to_string(),
                species: species.to_string(),
                value: value.to_string(),
            })
    }

    pub fn contains(&self, parameter: &str, species: &str) -> bool {
        self.get(parameter, species).is_ok()
    }

    /// parameter names, upper-cased and sorted
    pub fn parameters(&self) -> Vec<String> {
        let mut names: Vec<String> = self.data.keys().cloned().collect();
        names.sort();
        names
    }
}

impl FromStr for ThermoData {
    type Err = ThermoDataError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut lines = text.lines().enumerate().skip(SKIPPED_LINES_BEFORE_HEADER);
        let (_, header) = lines.next().ok_or(ThermoDataError::MissingHeader)?;
        let parameters: Vec<String> = tokens(header)
            .into_iter()
            .skip(1)
            .map(|p| p.to_uppercase())
            .collect();
        if parameters.is_empty() {
            return Err(ThermoDataError::MissingHeader);
        }
        let mut data = ThermoData::default();
        for p in &parameters {
            data.data.entry(p.clone()).or_default();
        }
        let mut rows = 0;
        for (index, line) in lines.skip(SKIPPED_LINES_AFTER_HEADER) {
            let row = tokens(line);
            if row.is_empty() {
                break;
            }
            if row.len() != parameters.len() + 1 {
                return Err(ThermoDataError::MalformedRow {
                    line: index + 1,
                    expected: parameters.len(),
                    found: row.len(),
                });
            }
            for (parameter, value) in parameters.iter().zip(&row[1..]) {
                data.insert(parameter, row[0], value);
            }
            rows += 1;
        }
        // condensed phases are not in the bank
        data.data.remove("DENSITY");
        for (species, density) in DENSITIES {
            data.insert("DENSITY", species, density);
        }
        debug!(
            "data bank parsed: {} species, parameters {:?}",
            rows, parameters
        );
        Ok(data)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    pub(crate) const BANK: &str = "\
Thermodynamic data bank fragment
free line 2
free line 3
free line 4
free line 5
free line 6
Species  Phase  H       f1     mu
-------------------------------------
HCl      g      -92310  10.5   36.461
AlCl     G      -51032  12.1   62.434
N2       g      0       9.5    28.013

trailing notes are ignored
";

    #[test]
    fn test_parse_bank() {
        let data: ThermoData = BANK.parse().unwrap();
        assert_eq!(data.get("H", "HCl").unwrap(), "-92310");
        assert_eq!(data.get("phase", "alcl").unwrap(), "G");
        assert_eq!(data.get_f64("MU", "n2").unwrap(), 28.013);
        assert_eq!(
            data.parameters(),
            vec!["DENSITY", "F1", "H", "MU", "PHASE"]
        );
    }

    #[test]
    fn test_builtin_density() {
        let data: ThermoData = BANK.parse().unwrap();
        assert_eq!(data.get_f64("density", "AlN(s)").unwrap(), 3200.0);
        assert_eq!(data.get_f64("Density", "Ga").unwrap(), 5900.0);
        assert_eq!(data.get_f64("DENSITY", "GAN(S)").unwrap(), 6150.0);
        assert_eq!(data.get_f64("density", "Al").unwrap(), 2690.0);
    }

    #[test]
    fn test_missing_keys_fail_loudly() {
        let data: ThermoData = BANK.parse().unwrap();
        assert_eq!(
            data.get("sigma", "HCl"),
            Err(ThermoDataError::MissingParameter("sigma".to_string()))
        );
        assert_eq!(
            data.get("H", "GaCl"),
            Err(ThermoDataError::MissingSpecies {
                parameter: "H".to_string(),
                species: "GaCl".to_string()
            })
        );
        assert!(matches!(
            data.get_f64("phase", "HCl"),
            Err(ThermoDataError::InvalidNumber { .. })
        ));
        assert!(!data.contains("H", "GaCl"));
    }

    #[test]
    fn test_malformed_row() {
        let text = BANK.replace("AlCl     G      -51032  12.1   62.434", "AlCl G -51032");
        let err = text.parse::<ThermoData>().unwrap_err();
        assert_eq!(
            err,
            ThermoDataError::MalformedRow {
                line: 10,
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            "one\ntwo\n".parse::<ThermoData>(),
            Err(ThermoDataError::MissingHeader)
        );
        assert_eq!(
            "1\n2\n3\n4\n5\n6\nSpecies\n---\nHCl 1\n".parse::<ThermoData>(),
            Err(ThermoDataError::MissingHeader)
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(BANK.as_bytes()).unwrap();
        let data = ThermoData::from_file(file.path()).unwrap();
        assert_eq!(data.get_f64("f1", "hcl").unwrap(), 10.5);
        let missing = ThermoData::from_file(Path::new("/definitely/not/here.dat"));
        assert!(matches!(missing, Err(ThermoDataError::Io { .. })));
    }

    #[test]
    fn test_tokens() {
        assert_eq!(tokens("  a\tbb   c  "), vec!["a", "bb", "c"]);
        assert!(tokens("   ").is_empty());
        assert!(tokens("").is_empty());
    }
}
