use thiserror::Error;

use crate::kernel::{ComponentKind, EntityId};

/// Failures of scene graph operations
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("an entity named '{0}' already exists")]
    DuplicateName(String),

    #[error("entity {0:?} does not exist")]
    NoSuchEntity(EntityId),

    #[error("the root entity cannot be {0}")]
    RootEntity(&'static str),

    #[error("'{child}' is not a child of '{parent}'")]
    NotAChild { parent: String, child: String },

    #[error("cannot move '{entity}' under its own descendant '{parent}'")]
    CyclicParent { entity: String, parent: String },

    #[error("'{entity}' already has a {kind} component")]
    ComponentOccupied { entity: String, kind: ComponentKind },

    #[error("'{entity}' has no {kind} component")]
    MissingComponent { entity: String, kind: ComponentKind },
}

/// Failures of scene loading, reported before the scene is modified
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read scene file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed scene file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate entity name '{0}' in scene file")]
    DuplicateName(String),

    #[error("scene file has no active camera")]
    MissingCamera,

    #[error("scene file has more than one active camera: {0:?}")]
    MultipleCameras(Vec<String>),

    #[error("node '{node}' declares more than one {kind} component")]
    DuplicateComponent { node: String, kind: ComponentKind },

    #[error("node '{node}' uses unknown behavior '{kind}'")]
    UnknownBehavior { node: String, kind: String },

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Failures reported by the renderer front-end and its backends
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no active camera to render from")]
    NoActiveCamera,

    #[error("unknown {kind} id {id}")]
    UnknownResource { kind: &'static str, id: u32 },

    #[error("failed to load mesh '{path}': {source}")]
    MeshLoad {
        path: String,
        #[source]
        source: tobj::LoadError,
    },

    #[error("mesh '{0}' contains no geometry")]
    EmptyMesh(String),

    #[error("out of buffer memory after {0} buffers")]
    OutOfBuffers(usize),

    #[error("texture data is {len} bytes, expected {width}x{height} RGBA")]
    InvalidTexture { width: u32, height: u32, len: usize },

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Failures of console commands; rendered with an `Error: ` prefix
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("too few arguments (expected {expected}, got {got})")]
    TooFewArguments { expected: usize, got: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unknown target '{0}'")]
    UnknownTarget(String),

    #[error("'{target}' has no command '{command}'")]
    UnknownCommand { target: String, command: String },

    #[error("missing command for '{0}'")]
    MissingCommand(String),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("{0}")]
    Failed(String),
}
