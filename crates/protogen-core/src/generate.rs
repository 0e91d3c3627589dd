//! The end-to-end generation run

use crate::codegen::{EmitContext, GeneratedFile, SpicyGrammar, emit_all};
use crate::config::Configuration;
use crate::error::{Error, ErrorKind, GenResult, IoError};
use crate::graph::TypeGraph;
use crate::key::DEFAULT_SCOPE;
use crate::loader::load_scopes;
use crate::output::write_atomic;
use crate::reach::reachable_from;
use crate::resolve::resolve_imports;
use serde::Serialize;
use std::any::Any;
use std::fs;
use std::panic;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Outcome of one run, as reported to callers that must not see a panic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationResult {
    Success {
        emitted_files: Vec<PathBuf>,
    },
    Failure {
        kind: ErrorKind,
        phase: String,
        detail: String,
    },
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Success { .. })
    }

    /// Process exit code: 0 on success, otherwise per [`ErrorKind::exit_code`]
    pub fn exit_code(&self) -> u8 {
        match self {
            GenerationResult::Success { .. } => 0,
            GenerationResult::Failure { kind, .. } => kind.exit_code(),
        }
    }
}

impl From<GenResult<Vec<PathBuf>>> for GenerationResult {
    fn from(result: GenResult<Vec<PathBuf>>) -> Self {
        match result {
            Ok(emitted_files) => GenerationResult::Success { emitted_files },
            Err(e) => GenerationResult::Failure {
                kind: e.kind(),
                phase: e.phase().to_string(),
                detail: e.to_string(),
            },
        }
    }
}

/// Directory holding the scope directories for a configuration file
///
/// Normally the directory containing `config.json`. When that directory is
/// itself the default scope (`<root>/default/config.json`), its parent.
pub fn schema_root(config_path: &Path) -> PathBuf {
    let dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    match (dir.file_name(), dir.parent()) {
        (Some(name), Some(parent)) if name == DEFAULT_SCOPE => parent.to_path_buf(),
        _ => dir.to_path_buf(),
    }
}

/// Render every output file in memory
pub fn render(config: &Configuration, schema_root: &Path) -> GenResult<Vec<GeneratedFile>> {
    let schema = load_scopes(schema_root, config)?;

    let graph = TypeGraph::build(&schema);
    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "type graph built"
    );

    let reachable = reachable_from(&graph, &config.entry_key())?;
    let imports = resolve_imports(&graph, &reachable);

    let ctx = EmitContext {
        config,
        schema: &schema,
        graph: &graph,
        reachable: &reachable,
        imports: &imports,
    };
    Ok(emit_all(&SpicyGrammar, &ctx))
}

/// Run the pipeline, propagating errors
///
/// All files are rendered before the first write, so a failing run leaves
/// the output root untouched.
pub fn run(config_path: &Path, output_root: &Path) -> GenResult<Vec<PathBuf>> {
    let config = Configuration::load(config_path)?;
    let root = schema_root(config_path);
    info!(
        protocol = %config.protocol,
        entry = %config.entry_point,
        root = %root.display(),
        "generating"
    );

    let files = render(&config, &root)?;

    fs::create_dir_all(output_root).map_err(|source| IoError::WriteFailure {
        path: output_root.to_path_buf(),
        source,
    })?;

    let mut emitted = Vec::with_capacity(files.len());
    for file in files {
        let path = output_root.join(&file.file_name);
        write_atomic(&path, &file.contents)?;
        info!(path = %path.display(), "emitted");
        emitted.push(path);
    }

    Ok(emitted)
}

/// Run the pipeline and report the outcome as a value
///
/// Never panics outward: a panic inside the pipeline becomes a failure of
/// kind [`ErrorKind::Internal`].
pub fn generate(config_path: &Path, output_root: &Path) -> GenerationResult {
    let result = panic::catch_unwind(|| run(config_path, output_root)).unwrap_or_else(|payload| {
        let message = panic_to_string(&payload);
        error!("generation panicked: {}", message);
        Err(Error::Internal(message))
    });

    if let Err(e) = &result {
        error!(phase = e.phase(), kind = ?e.kind(), "generation failed: {}", e);
    }

    result.into()
}

fn panic_to_string(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with unknown payload".to_string()
    }
}
