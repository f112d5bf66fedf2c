pub mod error;

pub mod config;

pub mod logging;
pub use logging::LoggerBuilder;

pub mod model {
    pub mod attributes;
    pub use attributes::FileAttributes;

    pub mod file;
    pub use file::File;

    pub mod file_info;
    pub use file_info::{DeepCounts, FileInfo, FileKind};

    pub mod uri;
    pub use uri::Uri;
}

pub mod cache {
    pub mod file_cache;
    pub use file_cache::{FileCache, Reconciled};
}

pub mod backend {
    pub mod retry;

    pub mod search;
    pub use search::SearchBackend;

    pub mod traits;
    pub use traits::{
        Backend, BackendEvent, BackendFactory, FileRecord, SchemeBackendFactory, StatOutcome,
        WatchHandle,
    };

    pub mod vfs;
    pub use vfs::VfsBackend;
}

pub mod search {
    pub mod engine;
    pub use engine::{ListenerId, SearchEngine, SearchEvent, SearchListener, SearchState};

    pub mod query;
    pub use query::Query;
}

pub mod directory {
    pub mod engine;
    pub use engine::{Directory, ListState};

    pub mod events;
    pub use events::DirectoryEvent;

    pub mod registry;
    pub use registry::{DirectoryRegistry, get_by_uri, global, install_global};

    pub mod registry_table;
    pub use registry_table::{CallbackId, ClientId, MonitorCallback, ReadyCallback};
}

pub use config::Config;
pub use directory::{ClientId, Directory, DirectoryEvent, DirectoryRegistry};
pub use error::{CoreError, CoreResult};
pub use model::{File, FileAttributes, Uri};
