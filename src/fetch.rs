use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use scopeguard::ScopeGuard;

use std::fs;
use std::path::{Path, PathBuf};

use log::*;

use crate::Error;

pub const WEIGHTS_FILE: &str = "rust_model.ot";
pub const CONFIG_FILE: &str = "config.json";
/// Anything smaller is an error page from the host, not model weights.
pub const MIN_MODEL_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    Hub {
        repo: String,
        revision: Option<String>,
    },
    Local(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelFiles {
    pub weights: PathBuf,
    pub config: PathBuf,
    pub vocab: PathBuf,
    pub merges: Option<PathBuf>,
}

pub struct FetchRequest<'a> {
    pub source: ModelSource,
    pub vocab_file: &'a str,
    pub merges_file: Option<&'a str>,
    pub cache_dir: Option<&'a Path>,
    pub min_model_bytes: u64,
}

/// Locate or download the model files.
///
/// A failed hub download removes whatever it fetched so the next call starts
/// from scratch. Local directories are only checked, never modified.
pub fn acquire(request: &FetchRequest) -> Result<ModelFiles, Error> {
    match &request.source {
        ModelSource::Local(dir) => {
            info!("Using local model in {}", dir.display());
            collect_files(
                |name| {
                    let path = dir.join(name);
                    if path.is_file() {
                        Ok(path)
                    } else {
                        Err(Error::ModelUnavailable(format!("{} is missing", path.display())))
                    }
                },
                request,
                false,
            )
        }
        ModelSource::Hub { repo, revision } => {
            info!("Fetching model from Hugging Face: {}", repo);
            let mut builder = ApiBuilder::new().with_progress(false);
            if let Some(cache_dir) = request.cache_dir {
                builder = builder.with_cache_dir(cache_dir.to_path_buf());
            }
            let api = builder.build()?;
            let repo = match revision {
                Some(revision) => api.repo(Repo::with_revision(
                    repo.to_string(),
                    RepoType::Model,
                    revision.to_string(),
                )),
                None => api.model(repo.to_string()),
            };
            collect_files(|name| Ok(repo.get(name)?), request, true)
        }
    }
}

fn collect_files<F>(mut get: F, request: &FetchRequest, discard_on_failure: bool) -> Result<ModelFiles, Error>
where
    F: FnMut(&str) -> Result<PathBuf, Error>,
{
    let mut fetched = scopeguard::guard(Vec::<PathBuf>::new(), |paths| {
        if discard_on_failure {
            for path in paths {
                discard(&path);
            }
        }
    });

    let mut fetch = |name: &str| -> Result<PathBuf, Error> {
        debug!("Fetching {}", name);
        let path = get(name)?;
        fetched.push(path.clone());
        Ok(path)
    };

    let weights = fetch(WEIGHTS_FILE)?;
    check_weights(&weights, request.min_model_bytes)?;
    let config = fetch(CONFIG_FILE)?;
    let vocab = fetch(request.vocab_file)?;
    let merges = match request.merges_file {
        Some(merges_file) => Some(fetch(merges_file)?),
        None => None,
    };

    // Success: keep the files.
    let _ = ScopeGuard::into_inner(fetched);
    debug!("Model files ready: {}", weights.display());

    Ok(ModelFiles {
        weights,
        config,
        vocab,
        merges,
    })
}

fn check_weights(path: &Path, min_bytes: u64) -> Result<(), Error> {
    let size = fs::metadata(path)?.len();
    if size < min_bytes {
        return Err(Error::ModelUnavailable(format!(
            "{} is only {} bytes; the model host probably refused access (is the repository public?)",
            path.display(),
            size
        )));
    }
    Ok(())
}

/// Remove a fetched file along with the cache blob it links to.
fn discard(path: &Path) {
    if let Ok(target) = fs::canonicalize(path) {
        if target != path {
            if let Err(e) = fs::remove_file(&target) {
                warn!("Could not remove {}: {}", target.display(), e);
            }
        }
    }
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}
