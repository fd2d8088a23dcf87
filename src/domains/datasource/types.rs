use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// Datasource type of the stream holding the subject's identity record
pub const USER_INFO_TYPE: &str = "USER_INFO";

/// Datasource type of the stream holding the study identity record
pub const STUDY_INFO_TYPE: &str = "STUDY_INFO";

/// Table a stream's records are stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordTable {
    Data,
    RawData,
}

impl RecordTable {
    pub fn table_name(self) -> &'static str {
        match self {
            RecordTable::Data => "data",
            RecordTable::RawData => "rawdata",
        }
    }
}

/// Identifier/type pair for a platform, platform app or application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceComponent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl SourceComponent {
    pub fn new(id: Option<String>, kind: Option<String>) -> Option<Self> {
        if id.is_none() && kind.is_none() {
            None
        } else {
            Some(Self { id, kind })
        }
    }
}

/// Static metadata for one record stream. Read once per export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDescriptor {
    pub id: i64,
    pub datasource_id: Option<String>,
    #[serde(rename = "type")]
    pub datasource_type: Option<String>,
    pub platform: Option<SourceComponent>,
    pub platform_app: Option<SourceComponent>,
    pub application: Option<SourceComponent>,
    pub persistent: bool,
    pub data_descriptors: Vec<BTreeMap<String, String>>,
}

impl StreamDescriptor {
    /// Output file name without extension: all identifiers joined with `_`
    pub fn file_stem(&self) -> String {
        fn pair(component: &Option<SourceComponent>) -> [String; 2] {
            match component {
                Some(c) => [
                    c.id.clone().unwrap_or_default(),
                    c.kind.clone().unwrap_or_default(),
                ],
                None => [String::new(), String::new()],
            }
        }

        let mut parts = vec![
            self.id.to_string(),
            self.datasource_id.clone().unwrap_or_default(),
            self.datasource_type.clone().unwrap_or_default(),
        ];
        parts.extend(pair(&self.platform));
        parts.extend(pair(&self.platform_app));
        parts.extend(pair(&self.application));
        parts.join("_")
    }
}

/// Extra descriptor fields kept in the `datasource` column as JSON
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DescriptorExtras {
    #[serde(default = "default_persistent")]
    pub persistent: bool,
    #[serde(default)]
    pub data_descriptors: Vec<BTreeMap<String, String>>,
}

fn default_persistent() -> bool {
    true
}

impl Default for DescriptorExtras {
    fn default() -> Self {
        Self {
            persistent: true,
            data_descriptors: Vec::new(),
        }
    }
}

/// Subject identity record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub uuid: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Study identity record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Everything written ahead of the `data` array of a JSON document
#[derive(Debug, Clone, PartialEq)]
pub struct ExportHeader {
    pub userinfo: UserInfo,
    pub studyinfo: StudyInfo,
    pub datasource: StreamDescriptor,
}
