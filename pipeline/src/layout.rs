use kiln_vfs::path::join;

/// VFS mount names the pipeline reads from and writes to.
///
/// Resource names are relative to `data`; outputs are relative to `cache`;
/// per-request staging directories live under `temp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub data: String,
    pub cache: String,
    pub temp: String,
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self {
            data: "data".into(),
            cache: "cache".into(),
            temp: "temp".into(),
        }
    }
}

impl ProjectLayout {
    pub fn data_path(&self, resource_name: &str) -> String {
        join(&self.data, resource_name)
    }

    pub fn cache_path(&self, output_name: &str) -> String {
        join(&self.cache, output_name)
    }

    pub fn temp_path(&self, name: &str) -> String {
        join(&self.temp, name)
    }
}
