//! Bootstrap coordinator.
//!
//! A [`Deployment`] owns everything one web application needs across passes:
//! its inputs, the live container sink, the installed descriptor and the
//! reload watcher. Passes never overlap because [`Deployment::deploy`] takes
//! `&mut self`; the reload loop moves the deployment onto the blocking pool
//! for each pass and coalesces reload requests that arrive meanwhile.

mod pass;
mod staged;

pub use pass::{AssemblyPass, AssemblyReport};
pub use staged::{ContainerOp, StagedContainer};

use crate::config::BootstrapConfig;
use crate::error::{AssemblyError, Result, WebscopeError};
use crate::merge::EffectiveDescriptor;
use crate::watch::{ReloadRequest, ReloadWatcher};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use webscope_api::{
    ClassAttributeReader, ClasspathScanner, ContainerSink, DeploymentSpec, DescriptorParser,
    InitializerHandle, InitializerLoader, LifecycleEvent, LifecycleListener,
};

/// External collaborators of an assembly pass.
#[derive(Clone)]
pub struct AssemblyServices {
    pub scanner: Arc<dyn ClasspathScanner>,
    pub reader: Arc<dyn ClassAttributeReader>,
    pub parser: Arc<dyn DescriptorParser>,
    pub initializers: Arc<dyn InitializerLoader>,
}

pub struct Deployment {
    spec: DeploymentSpec,
    config: BootstrapConfig,
    services: AssemblyServices,
    sink: Box<dyn ContainerSink>,
    primary_initializer: Option<InitializerHandle>,
    watcher: Option<Arc<ReloadWatcher>>,
    installed: Option<EffectiveDescriptor>,
    reload_tx: mpsc::UnboundedSender<ReloadRequest>,
    reload_rx: Option<mpsc::UnboundedReceiver<ReloadRequest>>,
    passes: u64,
}

impl Deployment {
    pub fn new(
        spec: DeploymentSpec,
        config: BootstrapConfig,
        services: AssemblyServices,
        sink: Box<dyn ContainerSink>,
    ) -> Self {
        let (reload_tx, reload_rx) = mpsc::unbounded_channel();
        Self {
            spec,
            config,
            services,
            sink,
            primary_initializer: None,
            watcher: None,
            installed: None,
            reload_tx,
            reload_rx: Some(reload_rx),
            passes: 0,
        }
    }

    /// An initializer invoked first on every pass, with no classes.
    pub fn with_primary_initializer(mut self, handle: InitializerHandle) -> Self {
        self.primary_initializer = Some(handle);
        self
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// The descriptor of the last successful pass.
    pub fn installed(&self) -> Option<&EffectiveDescriptor> {
        self.installed.as_ref()
    }

    pub fn watcher(&self) -> Option<&Arc<ReloadWatcher>> {
        self.watcher.as_ref()
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// A sender feeding this deployment's reload loop.
    pub fn reload_sender(&self) -> mpsc::UnboundedSender<ReloadRequest> {
        self.reload_tx.clone()
    }

    /// Run one assembly pass and install its result when it succeeded.
    ///
    /// A fresh watcher collects the files this pass visits; it replaces the
    /// current one once the scan has succeeded.
    pub fn deploy(&mut self) -> std::result::Result<AssemblyReport, AssemblyError> {
        self.passes += 1;
        let watcher = self.config.watching_enabled().then(|| {
            Arc::new(ReloadWatcher::new(
                self.spec.name.clone(),
                self.config.watcher_bounce(),
                self.reload_tx.clone(),
            ))
        });
        let mut visitor = |path: &Path| {
            if let Some(watcher) = &watcher {
                watcher.register(path);
            }
        };

        let report = AssemblyPass::new(&self.spec, &self.config, &self.services)
            .with_primary_initializer(self.primary_initializer.as_ref())
            .run(&mut visitor)?;

        if let Some(watcher) = watcher {
            if let Some(previous) = self.watcher.replace(watcher) {
                previous.close();
            }
        }

        if report.ok {
            report.staged.replay(self.sink.as_mut());
            self.installed = Some(report.descriptor.clone());
            info!("Installed descriptor of {} (pass {})", self.spec.name, self.passes);
        } else {
            warn!(
                "Pass {} of {} failed with {} failure(s); keeping the previous descriptor",
                self.passes,
                self.spec.name,
                report.failures.len()
            );
        }
        Ok(report)
    }

    /// Forward a container lifecycle signal to the watcher.
    pub fn lifecycle_event(&self, event: &LifecycleEvent) {
        if let Some(watcher) = &self.watcher {
            watcher.lifecycle_event(event);
        }
    }

    pub fn start(&self) {
        self.lifecycle_event(&LifecycleEvent::after_start(self.spec.name.clone()));
    }

    pub fn stop(&self) {
        self.lifecycle_event(&LifecycleEvent::before_stop(self.spec.name.clone()));
    }

    /// Serve reload requests until `cancel` fires. Requests that arrive while
    /// a pass is running are folded into one follow-up pass.
    pub async fn run_reload_loop(mut self, cancel: CancellationToken) -> Result<Self> {
        let Some(mut reload_rx) = self.reload_rx.take() else {
            return Err(WebscopeError::Internal(format!(
                "reload loop of {} is already running",
                self.spec.name
            )));
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break;
                }
                request = reload_rx.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    info!(
                        "Reload of {} requested for {} changed path(s)",
                        request.deployment,
                        request.paths.len()
                    );
                    loop {
                        drain(&mut reload_rx);
                        self = self.redeploy().await?;
                        if drain(&mut reload_rx) == 0 {
                            break;
                        }
                        info!("Changes arrived during the pass; reloading {} again", self.spec.name);
                    }
                }
            }
        }

        self.stop();
        self.reload_rx = Some(reload_rx);
        Ok(self)
    }

    async fn redeploy(self) -> Result<Self> {
        self.stop();
        let (this, result) = tokio::task::spawn_blocking(move || {
            let mut this = self;
            let result = this.deploy();
            (this, result)
        })
        .await
        .map_err(|e| WebscopeError::Internal(format!("assembly pass panicked: {e}")))?;

        if let Err(e) = result {
            error!("Reload of {} aborted: {}", this.spec.name, e);
        }
        this.start();
        Ok(this)
    }
}

/// Discard queued requests, returning how many there were.
fn drain(rx: &mut mpsc::UnboundedReceiver<ReloadRequest>) -> usize {
    let mut drained = 0;
    while rx.try_recv().is_ok() {
        drained += 1;
    }
    drained
}
