//! Export table of host-callable functions.

use crate::binding::Binding;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use tensorcv_core::Error as CoreError;

/// Functions a host runtime can call, under their registered names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostFunction {
    TrackPoints,
    DenseOpticalFlow,
    CreateFREAK,
    DeleteFREAK,
    ComputeFREAK,
    ComputeFREAKfromKeyPoints,
    Remap,
    TrainFREAK,
    MatchFREAK,
    ComputeFAST,
    Version,
}

impl HostFunction {
    pub const ALL: [HostFunction; 11] = [
        HostFunction::TrackPoints,
        HostFunction::DenseOpticalFlow,
        HostFunction::CreateFREAK,
        HostFunction::DeleteFREAK,
        HostFunction::ComputeFREAK,
        HostFunction::ComputeFREAKfromKeyPoints,
        HostFunction::Remap,
        HostFunction::TrainFREAK,
        HostFunction::MatchFREAK,
        HostFunction::ComputeFAST,
        HostFunction::Version,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HostFunction::TrackPoints => "TrackPoints",
            HostFunction::DenseOpticalFlow => "DenseOpticalFlow",
            HostFunction::CreateFREAK => "CreateFREAK",
            HostFunction::DeleteFREAK => "DeleteFREAK",
            HostFunction::ComputeFREAK => "ComputeFREAK",
            HostFunction::ComputeFREAKfromKeyPoints => "ComputeFREAKfromKeyPoints",
            HostFunction::Remap => "Remap",
            HostFunction::TrainFREAK => "TrainFREAK",
            HostFunction::MatchFREAK => "MatchFREAK",
            HostFunction::ComputeFAST => "ComputeFAST",
            HostFunction::Version => "Version",
        }
    }

    /// False for the functions that work without the vision library.
    pub fn requires_vision_library(self) -> bool {
        !matches!(
            self,
            HostFunction::CreateFREAK
                | HostFunction::DeleteFREAK
                | HostFunction::MatchFREAK
                | HostFunction::Version
        )
    }

    /// Available in this build.
    pub fn is_available(self) -> bool {
        cfg!(feature = "opencv") || !self.requires_vision_library()
    }
}

impl fmt::Display for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HostFunction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // older hosts register dense flow under its block-matching name
        if s == "DenseOpticalFlowBlockMatching" {
            return Ok(HostFunction::DenseOpticalFlow);
        }
        HostFunction::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| CoreError::Configuration(format!("unknown host function '{}'", s)))
    }
}

impl Binding {
    /// Export table and live state as JSON.
    pub fn describe(&self) -> serde_json::Value {
        let functions: Vec<_> = HostFunction::ALL
            .iter()
            .map(|f| {
                json!({
                    "name": f.name(),
                    "available": f.is_available(),
                })
            })
            .collect();
        json!({
            "library": self.version(),
            "functions": functions,
            "freak_instances": self.freak_count(),
            "search_range": self.config().matcher.search_range,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for f in HostFunction::ALL {
            assert_eq!(f.name().parse::<HostFunction>().unwrap(), f);
        }
        assert_eq!(
            "DenseOpticalFlowBlockMatching".parse::<HostFunction>().unwrap(),
            HostFunction::DenseOpticalFlow
        );
        assert!("Nope".parse::<HostFunction>().is_err());
    }

    #[test]
    fn test_always_available() {
        assert!(HostFunction::MatchFREAK.is_available());
        assert!(HostFunction::Version.is_available());
        assert_eq!(
            HostFunction::Remap.is_available(),
            cfg!(feature = "opencv")
        );
    }

    #[test]
    fn test_describe_lists_every_function() {
        let binding = Binding::default();
        let value = binding.describe();
        assert_eq!(value["functions"].as_array().unwrap().len(), 11);
        assert_eq!(value["freak_instances"], 0);
        assert_eq!(value["search_range"], "from_row");
    }
}
