mod cancel;
mod definition;
pub mod delete;
pub mod force;
pub mod fs;
mod path;
pub mod retention;
pub mod safety;
pub mod scan;
pub mod score;
pub mod signature;
pub mod utils;

pub use cancel::*;
pub use definition::*;
pub use delete::{
    DeletionEngine,
    DeletionOptions,
    DeletionResult,
    Disposition,
};
pub use path::*;
pub use safety::{
    is_system_critical_path,
    PathSafetyGate,
};
pub use scan::{
    PreviewItem,
    PreviewKind,
    Report,
    ScanError,
    ScanOptions,
    Scanner,
};
pub use signature::{
    SignatureCatalog,
    SignatureSnapshot,
};
