use anyhow::Result;
use vault_core::{LinkageType, Vault, VersionRef};

/// Declarative assertions on vault state
pub enum Assertion {
    // Versions
    VersionCount(usize),
    VersionExists(VersionRef),

    // Lineage
    ParentOf {
        child: VersionRef,
        parent: VersionRef,
        linkage_type: LinkageType,
    },
    IsRoot(VersionRef),
    EdgeCount(usize),
    BranchHead {
        branch: String,
        label: String,
    },
    GraphNodeCount(usize),

    // Content
    ArchiveEntries {
        version: VersionRef,
        paths: Vec<String>,
    },
    ArchiveFileEquals {
        version: VersionRef,
        path: String,
        content: Vec<u8>,
    },
    FileEquals {
        version: VersionRef,
        path: String,
        content: Vec<u8>,
    },
    FileMissing {
        version: VersionRef,
        path: String,
    },
    StoredKeyShared {
        version: VersionRef,
        first: String,
        second: String,
    },

    // Codebase
    CodebaseCount(usize),
    CodebaseGone,

    // Custom (receives the vault and the current codebase ID)
    Custom(Box<dyn Fn(&Vault, &str) -> Result<()> + Send + Sync>),
}

impl Assertion {
    /// Wrap a closure as a custom assertion
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Vault, &str) -> Result<()> + Send + Sync + 'static,
    {
        Self::Custom(Box::new(f))
    }
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VersionCount(n) => write!(f, "VersionCount({})", n),
            Self::VersionExists(v) => write!(f, "VersionExists({})", v),
            Self::ParentOf {
                child,
                parent,
                linkage_type,
            } => write!(
                f,
                "ParentOf {{ child: {}, parent: {}, linkage_type: {} }}",
                child, parent, linkage_type
            ),
            Self::IsRoot(v) => write!(f, "IsRoot({})", v),
            Self::EdgeCount(n) => write!(f, "EdgeCount({})", n),
            Self::BranchHead { branch, label } => {
                write!(f, "BranchHead {{ branch: {:?}, label: {:?} }}", branch, label)
            }
            Self::GraphNodeCount(n) => write!(f, "GraphNodeCount({})", n),
            Self::ArchiveEntries { version, paths } => {
                write!(f, "ArchiveEntries {{ version: {}, paths: {:?} }}", version, paths)
            }
            Self::ArchiveFileEquals { version, path, .. } => {
                write!(f, "ArchiveFileEquals {{ version: {}, path: {:?} }}", version, path)
            }
            Self::FileEquals { version, path, .. } => {
                write!(f, "FileEquals {{ version: {}, path: {:?} }}", version, path)
            }
            Self::FileMissing { version, path } => {
                write!(f, "FileMissing {{ version: {}, path: {:?} }}", version, path)
            }
            Self::StoredKeyShared {
                version,
                first,
                second,
            } => write!(
                f,
                "StoredKeyShared {{ version: {}, first: {:?}, second: {:?} }}",
                version, first, second
            ),
            Self::CodebaseCount(n) => write!(f, "CodebaseCount({})", n),
            Self::CodebaseGone => write!(f, "CodebaseGone"),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}
