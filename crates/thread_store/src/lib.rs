mod error;
mod id;
mod paths;
mod schema;
mod store;

pub use error::ThreadStoreError;
pub use id::{new_thread_id, thread_id_at};
pub use paths::{default_thread_root, ensure_within, thread_file_name, THREAD_FILE_SUFFIX};
pub use schema::Thread;
pub use store::{select_prefix_match, FsThreadStore, ThreadStore};
