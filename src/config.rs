use serde::{Deserialize, Serialize};

/// Default embedding model (matches the classic sentence-transformers
/// baseline; -q variants and the bge family are also accepted)
const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
/// Default held-out fraction when training the classifier
const DEFAULT_TEST_SPLIT: f32 = 0.2;
/// Default seed for the deterministic train/held-out shuffle
const DEFAULT_SEED: u64 = 42;
/// Default number of keyphrases returned by extraction
const DEFAULT_TOP_N: usize = 8;
/// Default number of classifier artifact versions kept on disk
const DEFAULT_ARTIFACT_RETENTION: usize = 3;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Embedding model name (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Held-out fraction for the training accuracy report, in (0, 1)
    #[serde(default = "default_test_split")]
    pub test_split: f32,

    /// Seed for the train/held-out shuffle
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Keyphrases returned when the caller does not ask for a count
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,

    /// Classifier artifact versions kept on disk (>= 1)
    #[serde(default = "default_artifact_retention")]
    pub artifact_retention: usize,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            test_split: DEFAULT_TEST_SPLIT,
            seed: DEFAULT_SEED,
            default_top_n: DEFAULT_TOP_N,
            artifact_retention: DEFAULT_ARTIFACT_RETENTION,
            base_path: String::new(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_test_split() -> f32 {
    DEFAULT_TEST_SPLIT
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_artifact_retention() -> usize {
    DEFAULT_ARTIFACT_RETENTION
}

impl Config {
    fn validate(&self) {
        if self.model.trim().is_empty() {
            panic!("model must not be empty");
        }

        if !(0.0..1.0).contains(&self.test_split) || self.test_split == 0.0 {
            panic!(
                "test_split must be between 0 and 1 exclusive, got {}",
                self.test_split
            );
        }

        if self.artifact_retention == 0 {
            panic!("artifact_retention must be at least 1");
        }
    }

    pub fn load_with(base_path: &str) -> Self {
        std::fs::create_dir_all(base_path).expect("couldnt create base directory");

        let config_path = format!("{base_path}/config.yaml");

        // create new if does not exist
        if std::fs::metadata(&config_path).is_err() {
            std::fs::write(
                &config_path,
                serde_yml::to_string(&Self::default()).unwrap().as_bytes(),
            )
            .expect("couldnt write default config");
        }

        let config_str =
            std::fs::read_to_string(&config_path).expect("config file is not valid utf8");
        let mut config: Self = serde_yml::from_str(&config_str).expect("config is malformed");

        config.base_path = base_path.to_string();

        config.validate();

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config).unwrap() {
            config.save();
        }

        config
    }

    pub fn save(&self) {
        let config_path = format!("{}/config.yaml", self.base_path);
        let config_str = serde_yml::to_string(&self).unwrap();
        std::fs::write(config_path, config_str.as_bytes()).expect("couldnt write config");
    }
}
