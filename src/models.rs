use serde::{Deserialize, Serialize};

/// One row of the encrypted index, as listed to the user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub id: String,
    pub app: String,
    pub desc: String,
    pub format: String,
}

/// Fields of a secret about to be stored. The verified answer is bound
/// separately at execution time.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub app: String,
    pub desc: String,
    pub format: String,
    pub payload: String,
    pub push_to_cloud: bool,
}

/// Tool availability as reported by the environment probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentReport {
    pub git: bool,
    pub gpg: bool,
}
