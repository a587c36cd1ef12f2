pub mod identity;

use serde::{Deserialize, Serialize};

use identity::{DocId, PATH_DELIMITER, identify};

/// The projected document for one filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsNode {
    /// Final path segment.
    pub name: String,
    /// Absolute path as reported by the watcher, `/`-separated.
    pub full_path: String,
    pub is_dir: bool,
    /// True iff `full_path` is the root of the watch session that reported it.
    pub is_watch_folder: bool,
}

impl FsNode {
    /// Build a node for `full_path`, flagging it when it is the watch folder itself.
    pub fn new(full_path: &str, is_dir: bool, watch_folder: &str) -> Self {
        Self {
            name: name_of(full_path).to_owned(),
            full_path: full_path.to_owned(),
            is_dir,
            is_watch_folder: watch_folder == full_path,
        }
    }

    pub fn id(&self) -> DocId {
        identify(&self.full_path, self.is_dir)
    }

    /// Point the node at `new_path`, keeping its type and watch-folder flag.
    pub fn relocate(&mut self, new_path: &str) {
        self.name = name_of(new_path).to_owned();
        self.full_path = new_path.to_owned();
    }
}

/// Last `/`-delimited segment of `path`, or the whole path when it has no delimiter.
pub fn name_of(path: &str) -> &str {
    match path.rfind(PATH_DELIMITER) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_of() {
        assert_eq!(name_of("/watch/2019/report.pdf"), "report.pdf");
        assert_eq!(name_of("report.pdf"), "report.pdf");
        assert_eq!(name_of("/watch/dir/"), "");
    }

    #[test]
    fn test_new_flags_watch_folder() {
        let root = FsNode::new("/watch", true, "/watch");
        assert!(root.is_watch_folder);
        assert_eq!(root.name, "watch");

        let child = FsNode::new("/watch/a", true, "/watch");
        assert!(!child.is_watch_folder);
    }

    #[test]
    fn test_relocate_keeps_flags() {
        let mut node = FsNode::new("/watch", true, "/watch");
        node.relocate("/watched");
        assert_eq!(node.full_path, "/watched");
        assert_eq!(node.name, "watched");
        assert!(node.is_dir);
        assert!(node.is_watch_folder);
        assert_eq!(node.id().as_str(), "dir_/watched");
    }

    #[test]
    fn test_serializes_camel_case() {
        let node = FsNode::new("/w/a.txt", false, "/w");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["fullPath"], "/w/a.txt");
        assert_eq!(json["isDir"], false);
        assert_eq!(json["isWatchFolder"], false);
        assert_eq!(json["name"], "a.txt");
    }
}
