use serde::{Deserialize, Serialize};

/// How the body of an upload task is transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadMode {
    /// Whole file in a single request.
    Stream,
    /// Fixed-size chunks submitted by index.
    Chunk,
}

impl UploadMode {
    /// Picks chunked mode for files larger than one chunk.
    pub fn for_size(size: u64, chunk_size: u64) -> Self {
        if chunk_size > 0 && size > chunk_size {
            UploadMode::Chunk
        } else {
            UploadMode::Stream
        }
    }
}

/// Server-side state of an upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Uploading,
    Success,
    Failed,
}

/// Chunk cursor for a chunked upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub chunk_size: u64,
    pub chunk_total: u32,
    /// Index of the next chunk the server expects.
    pub chunk_cur: u32,
}

/// Declared metadata sent when creating an upload task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUploadTask {
    /// Destination directory on the server.
    pub path: String,
    /// Source path relative to the upload root (equals `name` for single files).
    pub web_path: String,
    pub name: String,
    pub size: u64,
    /// Last-modified time, unix seconds.
    pub modified: i64,
    pub mime_type: String,
    pub mode: UploadMode,
    /// Overwrite an existing file with the same name.
    pub wipe: bool,
}

/// An upload task (session) as reported by the server.
///
/// The `session_id` is opaque and must not be reused once the task has been
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTask {
    pub session_id: String,
    pub path: String,
    #[serde(default)]
    pub web_path: String,
    pub name: String,
    pub size: u64,
    pub modified: i64,
    pub mime_type: String,
    pub status: UploadStatus,
    pub mode: UploadMode,
    pub wipe: bool,
    #[serde(default)]
    pub chunk_info: Option<ChunkInfo>,
    /// Bytes already stored on the server.
    #[serde(default)]
    pub uploaded: u64,
}

impl UploadTask {
    /// Returns `true` once the server has assembled the whole file.
    pub fn is_complete(&self) -> bool {
        self.status == UploadStatus::Success
    }

    /// Index of the next chunk the server expects (0 for stream tasks).
    pub fn next_chunk_index(&self) -> u32 {
        self.chunk_info.map(|c| c.chunk_cur).unwrap_or(0)
    }
}

/// Body of the upload-task delete request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdRequest {
    pub session_id: String,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub is_dir: bool,
    #[serde(default)]
    pub size: u64,
    /// Last-modified time, unix seconds.
    #[serde(default)]
    pub modified: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Parameters identifying a path inside a share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareQuery {
    pub mark: String,
    pub path: String,
    #[serde(default)]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_mode_wire_names() {
        assert_eq!(serde_json::to_string(&UploadMode::Stream).unwrap(), r#""STREAM""#);
        assert_eq!(serde_json::to_string(&UploadMode::Chunk).unwrap(), r#""CHUNK""#);
        let status: UploadStatus = serde_json::from_str(r#""UPLOADING""#).unwrap();
        assert_eq!(status, UploadStatus::Uploading);
    }

    #[test]
    fn mode_for_size() {
        assert_eq!(UploadMode::for_size(10, 10), UploadMode::Stream);
        assert_eq!(UploadMode::for_size(11, 10), UploadMode::Chunk);
        assert_eq!(UploadMode::for_size(11, 0), UploadMode::Stream);
    }

    #[test]
    fn upload_task_from_server_record() {
        let json = r#"{
            "id": 7,
            "session_id": "0f9c",
            "path": "/disk/docs/",
            "web_path": "/report.pdf",
            "name": "report.pdf",
            "size": 70,
            "modified": 1700000000,
            "mime_type": "application/pdf",
            "status": "UPLOADING",
            "mode": "CHUNK",
            "wipe": false,
            "chunk_info": {"chunk_size": 30, "chunk_total": 3, "chunk_cur": 1},
            "uploaded": 30
        }"#;
        let task: UploadTask = serde_json::from_str(json).unwrap();
        assert_eq!(task.session_id, "0f9c");
        assert_eq!(task.next_chunk_index(), 1);
        assert_eq!(task.uploaded, 30);
        assert!(!task.is_complete());
    }

    #[test]
    fn stream_task_without_chunk_info() {
        let json = r#"{
            "session_id": "s", "path": "/d/", "name": "a", "size": 1,
            "modified": 0, "mime_type": "text/plain", "status": "SUCCESS",
            "mode": "STREAM", "wipe": true, "chunk_info": null
        }"#;
        let task: UploadTask = serde_json::from_str(json).unwrap();
        assert_eq!(task.next_chunk_index(), 0);
        assert_eq!(task.uploaded, 0);
        assert!(task.is_complete());
    }

    #[test]
    fn directory_entry_optional_fields() {
        let e: DirectoryEntry =
            serde_json::from_str(r#"{"name":"docs","is_dir":true,"size":0,"modified":0}"#).unwrap();
        assert!(e.is_dir);
        assert!(e.file_type.is_none());
        let json = serde_json::to_string(&e).unwrap();
        assert!(!json.contains("thumbnail"));
    }
}
