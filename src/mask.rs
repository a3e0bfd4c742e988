//! Per-frame mask resolution.
//!
//! A mask is an 8-bit grayscale image the engine uses to ignore parts of a
//! frame (the camera operator, a vehicle hood, moving people). The policy is
//! decided once from the configured path and never changes during a run:
//!
//! - no path, or a path that does not exist → no mask;
//! - a file → that one mask for every frame;
//! - a directory → `<dir>/<index:04>.jpg`, re-read on every call so masks
//!   can change frame by frame.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use image::GrayImage;

use crate::utilities::mask_file_name;

/// How masks are supplied for the run.
#[derive(Debug, Clone)]
pub enum MaskProvider {
    /// Frames are fed without a mask.
    None,
    /// One mask, loaded up front, applied to every frame.
    Static(GrayImage),
    /// One mask file per frame index inside this directory.
    PerFrameIndexed(PathBuf),
}

impl MaskProvider {
    /// Decide the policy for `path`.
    ///
    /// Never fails: a path that is neither a file nor a directory, or a mask
    /// file that cannot be decoded, degrades to [`MaskProvider::None`] with a
    /// warning.
    pub fn resolve_policy(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return MaskProvider::None;
        };

        if path.is_dir() {
            log::info!(
                "use different mask for each frame, and load mask from {}",
                path.display()
            );
            return MaskProvider::PerFrameIndexed(path.to_path_buf());
        }

        if path.is_file() {
            return match image::open(path) {
                Ok(mask) => {
                    log::info!(
                        "use uniform mask for each frame, and load mask from {}",
                        path.display()
                    );
                    MaskProvider::Static(mask.into_luma8())
                }
                Err(error) => {
                    log::warn!(
                        "mask {} could not be decoded ({error}); running without a mask",
                        path.display()
                    );
                    MaskProvider::None
                }
            };
        }

        log::warn!(
            "mask path {} is neither a file nor a directory; running without a mask",
            path.display()
        );
        MaskProvider::None
    }

    /// The mask for physical frame `index`, if any.
    ///
    /// A missing or unreadable per-frame file yields `None` for that frame
    /// only.
    pub fn resolve(&self, index: u64) -> Option<Cow<'_, GrayImage>> {
        match self {
            MaskProvider::None => None,
            MaskProvider::Static(mask) => Some(Cow::Borrowed(mask)),
            MaskProvider::PerFrameIndexed(directory) => {
                let mask_path = directory.join(mask_file_name(index));
                match image::open(&mask_path) {
                    Ok(mask) => Some(Cow::Owned(mask.into_luma8())),
                    Err(error) => {
                        log::debug!("no mask for frame {index} at {}: {error}", mask_path.display());
                        None
                    }
                }
            }
        }
    }

    /// Path of the mask file that [`resolve`](MaskProvider::resolve) reads
    /// for `index`, in per-frame mode.
    pub fn indexed_path(&self, index: u64) -> Option<PathBuf> {
        match self {
            MaskProvider::PerFrameIndexed(directory) => Some(directory.join(mask_file_name(index))),
            _ => None,
        }
    }

    /// Short name of the policy, for log lines.
    pub fn policy_name(&self) -> &'static str {
        match self {
            MaskProvider::None => "none",
            MaskProvider::Static(_) => "static",
            MaskProvider::PerFrameIndexed(_) => "per-frame",
        }
    }
}
