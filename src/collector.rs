//! Archive unit collector: regroups per-page results into whole archives.
//!
//! Pages arrive tagged with the [`ArchiveId`] of their source archive, either
//! one at a time ([`ArchiveCollector::submit`]) or as an already-grouped
//! batch ([`ArchiveCollector::submit_batch`]). [`ArchiveCollector::drain`]
//! turns every pending group into an [`AssembledUnit`].
//!
//! Per archive id the lifecycle is
//! `absent → accumulating → (drain) → absent`; a later submit under the same
//! id starts a fresh group. Page order inside a group is arrival order and
//! is never re-sorted. Metadata is taken from the first page of a group.
//!
//! A collector is owned by one pipeline run and is not internally
//! synchronized. Wrap it in a `Mutex` if several threads must share it.

use std::collections::HashMap;

use miette::Diagnostic;
use thiserror::Error;

use crate::archive::OutputNaming;
use crate::comic_info::ComicMetadata;
use crate::model::{ArchiveId, AssembledUnit, Page};

/// Errors from the collector.
#[derive(Debug, Error, Diagnostic)]
pub enum CollectError {
    #[error("empty batch for {id}")]
    #[diagnostic(
        code(cbz::collector::empty_batch),
        help("A batch submission must carry at least one page.")
    )]
    EmptyBatch { id: String },

    #[error("nothing to emit: no pages are pending")]
    #[diagnostic(
        code(cbz::collector::nothing_to_emit),
        help(
            "No archive has pending pages yet. Submit pages first, or drain with \
             force to accept an empty result."
        )
    )]
    NothingToEmit,

    #[error("cannot use {attempted} ingestion while this drain cycle is {active}")]
    #[diagnostic(
        code(cbz::collector::mode_conflict),
        help(
            "Incremental and batch submissions must not be mixed within one drain \
             cycle. Drain first, or use a separate collector."
        )
    )]
    ModeConflict {
        active: IngestMode,
        attempted: IngestMode,
    },
}

/// Convenience alias for collector results.
pub type CollectResult<T> = std::result::Result<T, CollectError>;

/// Which ingestion style the current drain cycle is committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    #[default]
    Idle,
    Incremental,
    Batch,
}

impl std::fmt::Display for IngestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Incremental => write!(f, "incremental"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// Pages received so far for one archive id.
#[derive(Debug)]
struct CollectionGroup {
    pages: Vec<Page>,
    /// Metadata delivered with the first page.
    metadata: ComicMetadata,
}

/// Accumulates pages per archive and emits assembled units.
#[derive(Debug, Default)]
pub struct ArchiveCollector {
    naming: OutputNaming,
    groups: HashMap<ArchiveId, CollectionGroup>,
    /// Live group ids in first-arrival order.
    order: Vec<ArchiveId>,
    mode: IngestMode,
}

impl ArchiveCollector {
    /// A collector deriving output paths with the default naming rule.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_naming(naming: OutputNaming) -> Self {
        Self {
            naming,
            ..Default::default()
        }
    }

    pub fn naming(&self) -> &OutputNaming {
        &self.naming
    }

    pub fn mode(&self) -> IngestMode {
        self.mode
    }

    /// Number of archives with pending pages.
    pub fn pending_archives(&self) -> usize {
        self.order.len()
    }

    /// Number of pending pages across all archives.
    pub fn pending_pages(&self) -> usize {
        self.groups.values().map(|g| g.pages.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Append one page to the group for `id`, creating the group if needed.
    ///
    /// `metadata` is only kept when this page opens a new group.
    pub fn submit(
        &mut self,
        id: ArchiveId,
        page: Page,
        metadata: ComicMetadata,
    ) -> CollectResult<()> {
        self.enter(IngestMode::Incremental)?;

        match self.groups.get_mut(&id) {
            Some(group) => group.pages.push(page),
            None => {
                tracing::debug!(id = %id, "opening collection group");
                self.order.push(id.clone());
                self.groups.insert(
                    id,
                    CollectionGroup {
                        pages: vec![page],
                        metadata,
                    },
                );
            }
        }
        Ok(())
    }

    /// Build a unit directly from an already-complete archive.
    ///
    /// Pending groups are not touched.
    pub fn submit_batch(
        &mut self,
        id: ArchiveId,
        pages: Vec<Page>,
        metadata: ComicMetadata,
    ) -> CollectResult<AssembledUnit> {
        if pages.is_empty() {
            return Err(CollectError::EmptyBatch { id: id.to_string() });
        }
        self.enter(IngestMode::Batch)?;

        tracing::info!(id = %id, pages = pages.len(), "assembled batch unit");
        Ok(AssembledUnit {
            output_path: self.naming.output_path(&id),
            id,
            pages,
            metadata,
        })
    }

    /// Emit one unit per pending archive, in first-arrival order, and forget
    /// those groups.
    ///
    /// With nothing pending, fails with [`CollectError::NothingToEmit`]
    /// unless `force` is set, in which case the result is empty. Either way
    /// the drain cycle ends and the ingestion mode resets.
    pub fn drain(&mut self, force: bool) -> CollectResult<Vec<AssembledUnit>> {
        self.mode = IngestMode::Idle;

        if self.order.is_empty() {
            if force {
                tracing::debug!("forced drain with nothing pending");
                return Ok(Vec::new());
            }
            return Err(CollectError::NothingToEmit);
        }

        let mut units = Vec::with_capacity(self.order.len());
        for id in std::mem::take(&mut self.order) {
            let Some(group) = self.groups.remove(&id) else {
                continue;
            };
            tracing::info!(id = %id, pages = group.pages.len(), "emitting assembled unit");
            units.push(AssembledUnit {
                output_path: self.naming.output_path(&id),
                id,
                pages: group.pages,
                metadata: group.metadata,
            });
        }
        Ok(units)
    }

    fn enter(&mut self, attempted: IngestMode) -> CollectResult<()> {
        match self.mode {
            IngestMode::Idle => {
                self.mode = attempted;
                Ok(())
            }
            active if active == attempted => Ok(()),
            active => Err(CollectError::ModeConflict { active, attempted }),
        }
    }
}
