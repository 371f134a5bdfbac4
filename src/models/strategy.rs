use serde::{Deserialize, Serialize};

/// How files are chosen for the next annotation batch.
///
/// - `Random`: uniform sample of the unannotated pool (default)
/// - `ActiveLearning`: highest model confidence first
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PickStrategy {
    #[default]
    Random,
    ActiveLearning,
}

impl PickStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::ActiveLearning => "active_learning",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "random" => Some(Self::Random),
            "active_learning" => Some(Self::ActiveLearning),
            _ => None,
        }
    }
}

/// Which local files predictions are kept up to date for.
///
/// - `Unlabeled`: files not yet uploaded for annotation (default)
/// - `AllFiles`: every local file
/// - `Disabled`: never predict
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStrategy {
    #[default]
    Unlabeled,
    AllFiles,
    Disabled,
}

impl PredictionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unlabeled => "unlabeled",
            Self::AllFiles => "all_files",
            Self::Disabled => "disabled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unlabeled" => Some(Self::Unlabeled),
            "all_files" => Some(Self::AllFiles),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// Which model is used for pre-labeling.
///
/// - `Latest`: most recently trained model, replaced after every training (default)
/// - `Manual`: whatever the user selected; training never replaces it
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelStrategy {
    #[default]
    Latest,
    Manual,
}

impl ModelStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Manual => "manual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "latest" => Some(Self::Latest),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Where training happens.
///
/// - `Local`: the training tool trains on this machine (default)
/// - `Cloud`: the dataset is exported as an archive for remote training
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMode {
    #[default]
    Local,
    Cloud,
}

impl TrainingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Self::Local),
            "cloud" => Some(Self::Cloud),
            _ => None,
        }
    }
}
