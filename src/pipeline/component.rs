//! Splitting components into chunks and naming their output directories.

use crate::config::ComponentConfig;
use std::path::{Path, PathBuf};

/// A slice of a component's files, processed by one looper.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub component: String,
    /// Position within the component, `None` when the component is not split
    pub index: Option<usize>,
    pub files: Vec<PathBuf>,
}

impl Chunk {
    /// Output directory name: `<component>` or `<component>_Chunk<i>`.
    pub fn name(&self) -> String {
        match self.index {
            Some(i) => format!("{}_Chunk{}", self.component, i),
            None => self.component.clone(),
        }
    }
}

/// Split a component into `split_factor` chunks.
///
/// Files are distributed in order, the first chunks taking one extra file
/// when the count does not divide evenly.
pub fn split_component(component: &ComponentConfig) -> Vec<Chunk> {
    let n = component.split_factor.clamp(1, component.files.len().max(1));
    if n == 1 {
        return vec![Chunk {
            component: component.name.clone(),
            index: None,
            files: component.files.clone(),
        }];
    }

    let base = component.files.len() / n;
    let extra = component.files.len() % n;
    let mut start = 0;
    (0..n)
        .map(|i| {
            let size = base + usize::from(i < extra);
            let files = component.files[start..start + size].to_vec();
            start += size;
            Chunk {
                component: component.name.clone(),
                index: Some(i),
                files,
            }
        })
        .collect()
}

/// `base` if it does not exist, otherwise `base_1`, `base_2`, ...
pub fn unique_output_dir(base: &Path) -> PathBuf {
    if !base.exists() {
        return base.to_path_buf();
    }
    let stem = base.as_os_str().to_string_lossy().into_owned();
    (1..)
        .map(|i| PathBuf::from(format!("{}_{}", stem, i)))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| base.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn component(files: usize, split_factor: usize) -> ComponentConfig {
        ComponentConfig {
            name: "ZH".to_string(),
            files: (0..files).map(|i| PathBuf::from(format!("f{}.jsonl", i))).collect(),
            split_factor,
        }
    }

    #[test]
    fn test_unsplit_component() {
        let chunks = split_component(&component(3, 1));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name(), "ZH");
        assert_eq!(chunks[0].files.len(), 3);
    }

    #[test]
    fn test_split_preserves_order() {
        let chunks = split_component(&component(5, 2));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].name(), "ZH_Chunk0");
        assert_eq!(chunks[1].name(), "ZH_Chunk1");
        assert_eq!(chunks[0].files.len(), 3);
        assert_eq!(chunks[1].files.len(), 2);
        assert_eq!(chunks[1].files[0], PathBuf::from("f3.jsonl"));
    }

    #[test]
    fn test_unique_output_dir() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("ZH");
        assert_eq!(unique_output_dir(&base), base);

        std::fs::create_dir(&base).unwrap();
        assert_eq!(unique_output_dir(&base), dir.path().join("ZH_1"));

        std::fs::create_dir(dir.path().join("ZH_1")).unwrap();
        assert_eq!(unique_output_dir(&base), dir.path().join("ZH_2"));
    }
}
