//! OS detection guesses and traceroute hops

use crate::error::ModelError;
use serde::Serialize;

/// One OS class line of an OS guess
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OsMatch {
    pub os_type: Option<String>,
    pub vendor: Option<String>,
    pub family: Option<String>,
    pub generation: Option<String>,
    pub cpes: Vec<String>,
}

/// An OS guess with its accuracy (0-100)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatingSystem {
    name: String,
    accuracy: f32,
    matches: Vec<OsMatch>,
}

impl OperatingSystem {
    pub fn new(name: impl Into<String>, accuracy: f32) -> Result<Self, ModelError> {
        if !(0.0..=100.0).contains(&accuracy) {
            return Err(ModelError::InvalidValue {
                field: "OS accuracy",
                value: accuracy.to_string(),
            });
        }

        Ok(Self {
            name: name.into(),
            accuracy,
            matches: Vec::new(),
        })
    }

    pub fn add_match(&mut self, os_match: OsMatch) {
        self.matches.push(os_match);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accuracy(&self) -> f32 {
        self.accuracy
    }

    pub fn matches(&self) -> &[OsMatch] {
        &self.matches
    }
}

/// A traceroute hop; reports always carry `ttl`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Hop {
    pub ttl: Option<u32>,
    pub ip: Option<String>,
    pub rtt: Option<f64>,
    pub host: Option<String>,
}
