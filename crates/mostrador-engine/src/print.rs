//! # Print Pipeline
//!
//! Renders the document of a submitted transaction, saves it and sends it
//! to the printer.
//!
//! ```text
//! PrintJob ──► Backend::render_document ──► DocumentSink::save ──► DocumentPrinter::print
//!    ▲                 │ error                    │ error                  │ error
//!    │                 ▼                          ▼                        ▼
//!    └──── retry ◄──────────────── PrintFailure { job, stage, message } ───┘
//! ```
//!
//! A failure never touches the transaction: it is already final on the
//! backend. Retrying re-sends the identical render request.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{error, info, instrument};
use url::{Host, Url};

use crate::backend::Backend;
use crate::config::PrintSettings;
use crate::error::{EngineError, EngineResult};
use crate::wire::RenderRequest;

/// Raw printing port of network printers.
pub const RAW_PRINT_PORT: u16 = 9100;

// =============================================================================
// Sink
// =============================================================================

/// Where rendered documents are saved.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn save(&self, name: &str, bytes: &[u8]) -> EngineResult<PathBuf>;
}

/// Saves documents as files in one directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileSink { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DocumentSink for FileSink {
    async fn save(&self, name: &str, bytes: &[u8]) -> EngineResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "Document saved");
        Ok(path)
    }
}

// =============================================================================
// Printer
// =============================================================================

#[async_trait]
pub trait DocumentPrinter: Send + Sync {
    async fn print(&self, bytes: &[u8]) -> EngineResult<()>;

    /// False when printing is switched off.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Streams raw bytes to a TCP printer.
///
/// The host may be a name (`printer.local`); it is resolved on every
/// connect, so a printer that changes address is picked up on the next job.
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    host: String,
    port: u16,
    timeout: Duration,
}

impl NetworkPrinter {
    /// `host:port`, or a bare host on the raw printing port.
    pub fn from_addr(addr: &str) -> EngineResult<Self> {
        let addr = addr.trim();
        let invalid = || EngineError::InvalidConfig(format!("Invalid printer address: {}", addr));

        let url = Url::parse(&format!("tcp://{}", addr)).map_err(|_| invalid())?;
        if !matches!(url.path(), "" | "/") || !url.username().is_empty() {
            return Err(invalid());
        }
        let host = match url.host() {
            Some(Host::Domain(name)) if !name.is_empty() => name.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            _ => return Err(invalid()),
        };

        Ok(NetworkPrinter {
            host,
            port: url.port().unwrap_or(RAW_PRINT_PORT),
            timeout: Duration::from_secs(5),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl DocumentPrinter for NetworkPrinter {
    #[instrument(skip(self, bytes), fields(addr = %self.endpoint(), bytes = bytes.len()))]
    async fn print(&self, bytes: &[u8]) -> EngineResult<()> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let mut stream = tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| EngineError::PrintFailed(format!("Connection timeout: {}", self.endpoint())))?
            .map_err(|e| EngineError::PrintFailed(format!("{}: {}", self.endpoint(), e)))?;

        stream
            .write_all(bytes)
            .await
            .map_err(|e| EngineError::PrintFailed(format!("Write failed: {}", e)))?;
        stream.flush().await?;

        info!("Document sent to printer");
        Ok(())
    }
}

/// Used when no printer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPrinter;

#[async_trait]
impl DocumentPrinter for DisabledPrinter {
    async fn print(&self, _bytes: &[u8]) -> EngineResult<()> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// The printer described by the print settings.
pub fn printer_from_settings(settings: &PrintSettings) -> EngineResult<Arc<dyn DocumentPrinter>> {
    match settings.printer_addr.as_deref() {
        Some(addr) => Ok(Arc::new(
            NetworkPrinter::from_addr(addr)?
                .with_timeout(Duration::from_secs(settings.connect_timeout_secs)),
        )),
        None => Ok(Arc::new(DisabledPrinter)),
    }
}

// =============================================================================
// Jobs
// =============================================================================

/// A render request, kept so a retry sends exactly the same thing.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintJob {
    pub request: RenderRequest,
}

impl PrintJob {
    pub fn new(request: RenderRequest) -> Self {
        PrintJob { request }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStage {
    Render,
    Save,
    Print,
}

impl fmt::Display for PrintStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrintStage::Render => write!(f, "render"),
            PrintStage::Save => write!(f, "save"),
            PrintStage::Print => write!(f, "print"),
        }
    }
}

/// A failed job, carrying what is needed to retry it.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintFailure {
    pub job: PrintJob,
    pub stage: PrintStage,
    pub message: String,
}

impl fmt::Display for PrintFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintReceipt {
    pub saved_to: PathBuf,
    pub printed: bool,
}

// =============================================================================
// Pipeline
// =============================================================================

#[derive(Clone)]
pub struct PrintPipeline {
    backend: Arc<dyn Backend>,
    sink: Arc<dyn DocumentSink>,
    printer: Arc<dyn DocumentPrinter>,
}

impl PrintPipeline {
    pub fn new(
        backend: Arc<dyn Backend>,
        sink: Arc<dyn DocumentSink>,
        printer: Arc<dyn DocumentPrinter>,
    ) -> Self {
        PrintPipeline {
            backend,
            sink,
            printer,
        }
    }

    /// Render, save, then print.
    pub async fn run(&self, job: PrintJob) -> Result<PrintReceipt, PrintFailure> {
        let fail = |stage: PrintStage, err: EngineError| {
            error!(%stage, error = %err, id = job.request.transaccion.id, "Print pipeline failed");
            PrintFailure {
                job: job.clone(),
                stage,
                message: err.user_message(),
            }
        };

        let bytes = self
            .backend
            .render_document(&job.request)
            .await
            .map_err(|e| fail(PrintStage::Render, e))?;

        let saved_to = self
            .sink
            .save(&job.request.file_name(), &bytes)
            .await
            .map_err(|e| fail(PrintStage::Save, e))?;

        let printed = self.printer.is_enabled();
        if printed {
            self.printer
                .print(&bytes)
                .await
                .map_err(|e| fail(PrintStage::Print, e))?;
        }

        Ok(PrintReceipt { saved_to, printed })
    }

    /// Runs the failed job again with identical arguments.
    pub async fn retry(&self, failure: PrintFailure) -> Result<PrintReceipt, PrintFailure> {
        info!(stage = %failure.stage, "Retrying print job");
        self.run(failure.job).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IssuerSettings;
    use crate::fake::{product, FakeBackend};
    use crate::wire::RenderFlags;
    use mostrador_core::{
        prepare_transaction, Cart, CheckoutRequest, DocumentKind, LineRequest, LineSource, Money,
        PaymentMethod, PaymentReconciler, PriceList, Quantity, SurchargeSettings,
    };
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySink {
        saved: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl DocumentSink for MemorySink {
        async fn save(&self, name: &str, bytes: &[u8]) -> EngineResult<PathBuf> {
            self.saved.lock().unwrap().push((name.to_string(), bytes.to_vec()));
            Ok(PathBuf::from(name))
        }
    }

    fn job() -> PrintJob {
        let mut cart = Cart::new();
        cart.append_line(LineRequest::from_product(
            &product(1, "Yerba", 100),
            PriceList::Retail,
            Quantity::one(),
            LineSource::Manual,
        ))
        .unwrap();
        let mut payment = PaymentReconciler::new();
        payment.select_single(PaymentMethod::Transfer);
        let surcharges = SurchargeSettings::default();
        let tx = prepare_transaction(
            CheckoutRequest {
                cart: &cart,
                payment: &payment,
                panel_acknowledged: true,
                kind: DocumentKind::Comprobante,
                surcharges: &surcharges,
                observations: None,
            },
            |_| true,
        )
        .unwrap();
        assert_eq!(tx.final_total, Money::from_units(100));

        PrintJob::new(RenderRequest::new(
            &IssuerSettings::default(),
            &cart.client,
            42,
            &tx,
            RenderFlags {
                mostrar_leyenda_legal: true,
                mostrar_desglose_iva: false,
            },
        ))
    }

    #[tokio::test]
    async fn test_run_saves_rendered_document() {
        let backend = Arc::new(FakeBackend::default());
        let sink = Arc::new(MemorySink::default());
        let pipeline = PrintPipeline::new(backend, sink.clone(), Arc::new(DisabledPrinter));

        let receipt = pipeline.run(job()).await.unwrap();
        assert!(!receipt.printed);
        assert_eq!(receipt.saved_to, PathBuf::from("recibo_00000042.pdf"));
        assert_eq!(sink.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_sends_identical_request() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_render.store(true, Ordering::SeqCst);
        let pipeline = PrintPipeline::new(
            backend.clone(),
            Arc::new(MemorySink::default()),
            Arc::new(DisabledPrinter),
        );

        let failure = pipeline.run(job()).await.unwrap_err();
        assert_eq!(failure.stage, PrintStage::Render);

        backend.fail_render.store(false, Ordering::SeqCst);
        pipeline.retry(failure).await.unwrap();

        let rendered = backend.rendered.lock().unwrap();
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0], rendered[1]);
    }

    #[tokio::test]
    async fn test_file_sink_writes() {
        let dir = std::env::temp_dir().join(format!("mostrador-sink-{}", uuid::Uuid::new_v4()));
        let sink = FileSink::new(&dir);
        let path = sink.save("doc.pdf", b"%PDF").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF");
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn test_printer_address_parsing() {
        assert_eq!(NetworkPrinter::from_addr("192.168.1.50").unwrap().port(), 9100);
        assert_eq!(NetworkPrinter::from_addr("192.168.1.50:9200").unwrap().port(), 9200);

        let named = NetworkPrinter::from_addr("printer.local:9100").unwrap();
        assert_eq!(named.host(), "printer.local");
        assert_eq!(named.port(), 9100);
        assert_eq!(NetworkPrinter::from_addr(" impresora ").unwrap().host(), "impresora");

        assert!(NetworkPrinter::from_addr("").is_err());
        assert!(NetworkPrinter::from_addr("impresora:abc").is_err());
        assert!(NetworkPrinter::from_addr("impresora/cola").is_err());
        assert!(!DisabledPrinter.is_enabled());
    }

    #[tokio::test]
    async fn test_network_printer_resolves_host_names() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let printer = NetworkPrinter::from_addr(&format!("localhost:{}", port)).unwrap();
        printer.print(b"ticket").await.unwrap();

        assert_eq!(received.await.unwrap(), b"ticket");
    }
}
