//! Feature-toggle configuration (§4.10), read at startup from a YAML file
//! under the project state directory. Toggles gate only user-facing paths;
//! the data model always carries the optional fields.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureConfig {
    pub success_criteria: bool,
    pub feedback: bool,
    pub telemetry: bool,
    pub completion_summaries: bool,
    pub time_tracking: bool,
    pub deadlines: bool,
    pub minimal_mode: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            success_criteria: false,
            feedback: false,
            telemetry: true,
            completion_summaries: false,
            time_tracking: false,
            deadlines: false,
            minimal_mode: false,
        }
    }
}

impl FeatureConfig {
    /// `minimal_mode` overrides every other toggle to false (§4.10).
    pub fn effective(&self) -> FeatureConfig {
        if self.minimal_mode {
            FeatureConfig {
                success_criteria: false,
                feedback: false,
                telemetry: false,
                completion_summaries: false,
                time_tracking: false,
                deadlines: false,
                minimal_mode: true,
            }
        } else {
            self.clone()
        }
    }

    pub fn enable(&mut self, feature: &str) -> bool {
        self.set(feature, true)
    }

    pub fn disable(&mut self, feature: &str) -> bool {
        self.set(feature, false)
    }

    fn set(&mut self, feature: &str, value: bool) -> bool {
        match feature {
            "success_criteria" => self.success_criteria = value,
            "feedback" => self.feedback = value,
            "telemetry" => self.telemetry = value,
            "completion_summaries" => self.completion_summaries = value,
            "time_tracking" => self.time_tracking = value,
            "deadlines" => self.deadlines = value,
            "minimal_mode" => self.minimal_mode = value,
            _ => return false,
        }
        true
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn from_yaml(input: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(input)
    }
}
