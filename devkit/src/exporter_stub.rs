/*!
Exporter enregistreur pour tests sans réseau

Garde chaque lot reçu et répond avec un résultat fixé à la construction.
*/

use futures::future::{BoxFuture, FutureExt};
use hostscan_kernel::{ExportBatch, Exporter};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone)]
pub struct RecordingExporter {
    batches: Arc<Mutex<Vec<ExportBatch>>>,
    succeed: bool,
}

impl RecordingExporter {
    pub fn new() -> Self {
        Self::answering(true)
    }

    /// Exporter qui répond toujours `succeed`
    pub fn answering(succeed: bool) -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
            succeed,
        }
    }

    pub fn batches(&self) -> Vec<ExportBatch> {
        self.batches.lock().clone()
    }

    pub fn last_batch(&self) -> Option<ExportBatch> {
        self.batches.lock().last().cloned()
    }
}

impl Default for RecordingExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter for RecordingExporter {
    fn name(&self) -> &str {
        "recording"
    }

    fn upload(&self, files: ExportBatch) -> BoxFuture<'_, bool> {
        tracing::info!("[MOCK] export of {} files", files.len());
        self.batches.lock().push(files);
        let succeed = self.succeed;
        async move { succeed }.boxed()
    }
}
