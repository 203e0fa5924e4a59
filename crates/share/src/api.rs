use lanyue_protocol::{ApiFuture, DirectoryEntry, ShareQuery};

/// Directory listing inside a share (`POST /share/view`).
pub trait ShareApi: Send + Sync {
    fn view(&self, query: &ShareQuery) -> ApiFuture<'_, Vec<DirectoryEntry>>;
}
