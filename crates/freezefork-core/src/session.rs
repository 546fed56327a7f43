//! Explicit CAD session with a busy guard.
//!
//! Live CAD object handles must not be touched from two scans at once. A
//! session owns the model, refuses a second concurrent scan (or package
//! assembly) instead of queueing it, and can be closed explicitly.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::builder::DependencyGraphBuilder;
use crate::cad::CadModel;
use crate::error::{GraphBuildError, PackageError};
use crate::graph::DependencyGraph;
use crate::identity::IdentityComputer;
use crate::package::{Package, PackageAssembler, PackageMetadata};
use crate::progress::ScanProgress;

/// Clears the flag it holds when dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One connection to a CAD host.
pub struct CadSession<M: CadModel> {
    model: M,
    builder: DependencyGraphBuilder,
    identity: IdentityComputer,
    assembler: PackageAssembler,
    open: AtomicBool,
    scanning: AtomicBool,
    assembling: AtomicBool,
}

impl<M: CadModel> CadSession<M> {
    /// Open a session over `model` with default scan settings.
    pub fn open(model: M) -> Self {
        Self::with_settings(model, DependencyGraphBuilder::new(), IdentityComputer::new())
    }

    pub fn with_settings(
        model: M,
        builder: DependencyGraphBuilder,
        identity: IdentityComputer,
    ) -> Self {
        info!("CAD session opened");
        Self {
            model,
            builder,
            identity,
            assembler: PackageAssembler::new(),
            open: AtomicBool::new(true),
            scanning: AtomicBool::new(false),
            assembling: AtomicBool::new(false),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Stop accepting scans. Idempotent.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            info!("CAD session closed");
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Scan the active document and compute content identities.
    pub fn scan(&self) -> Result<DependencyGraph, GraphBuildError> {
        self.scan_with_progress(&mut |_| {})
    }

    pub fn scan_with_progress(
        &self,
        on_progress: &mut dyn FnMut(&ScanProgress),
    ) -> Result<DependencyGraph, GraphBuildError> {
        if !self.is_open() {
            return Err(GraphBuildError::SessionClosed);
        }
        let _guard = BusyGuard::acquire(&self.scanning).ok_or(GraphBuildError::Busy)?;
        let root = self
            .model
            .root_document()
            .ok_or(GraphBuildError::NoActiveDocument)?;
        let graph = self
            .builder
            .build_with_progress(&self.model, &root, on_progress)?;
        Ok(self.identity.identify(graph))
    }

    /// Assemble a package from a graph produced by this session.
    pub fn package(
        &self,
        graph: &DependencyGraph,
        metadata: &PackageMetadata,
    ) -> Result<Package, PackageError> {
        let _guard = BusyGuard::acquire(&self.assembling).ok_or(PackageError::Busy)?;
        self.assembler.assemble(graph, metadata)
    }
}

impl<M: CadModel> Drop for CadSession<M> {
    fn drop(&mut self) {
        self.close();
    }
}
