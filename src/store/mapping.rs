use serde_json::{Value, json};

/// Sub-field of `fullPath` holding the raw path, used for sorting.
pub const SORT_FIELD: &str = "fullPath.keyword";

/// Sub-field of `fullPath` tokenized by path hierarchy (`/a`, `/a/b`, `/a/b/c`).
/// A `term` query on it returns exactly one subtree.
pub const TREE_FIELD: &str = "fullPath.tree";

/// Index settings and mappings created when the index does not exist yet.
pub fn index_definition() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0,
            "analysis": {
                "analyzer": {
                    "path_tree": { "tokenizer": "path_tree" }
                },
                "tokenizer": {
                    "path_tree": { "type": "path_hierarchy", "delimiter": "/" }
                }
            }
        },
        "mappings": {
            "properties": {
                "name": { "type": "keyword", "index": false },
                "isDir": { "type": "boolean" },
                "isWatchFolder": { "type": "boolean" },
                "fullPath": {
                    "type": "text",
                    "fields": {
                        "keyword": { "type": "keyword" },
                        "tree": {
                            "type": "text",
                            "analyzer": "path_tree",
                            "search_analyzer": "keyword"
                        }
                    }
                }
            }
        }
    })
}
