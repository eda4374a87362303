//! End-to-end tests for the billsum pipeline.
//!
//! Everything except `live_openai_summary` runs offline: providers, OCR and
//! the page rasteriser are replaced by in-process fakes and remote documents
//! are served from a local socket.
//!
//! The live test makes a real OpenAI call and is gated behind `E2E_ENABLED`:
//!   E2E_ENABLED=1 OPENAI_API_KEY=... cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use billsum::error::{ExtractError, PageError, ProviderError};
use billsum::pipeline::pdf::TextLayer;
use billsum::pipeline::render::PageRasterizer;
use billsum::{
    ContentKind, Feedback, GenerationOptions, Input, LlmSummarizer, MemorySummaryStore, OcrEngine,
    PdfExtractor, Pipeline, PipelineConfig, Rating, SqliteSummaryStore, Summarizer,
    SummarizerKind, SummarizerSet, SummaryError, SummaryRequest, SummaryStore,
};
use image::DynamicImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// A PDF with no text layer.
struct ScannedOnly;
impl TextLayer for ScannedOnly {
    fn extract(&self, _pdf: &[u8]) -> Result<String, ExtractError> {
        Ok(String::new())
    }
}

/// Renders `pages` blank pages.
struct BlankPages(usize);
impl PageRasterizer for BlankPages {
    fn rasterize(&self, _pdf: &[u8]) -> Result<Vec<Result<DynamicImage, PageError>>, ExtractError> {
        Ok((0..self.0)
            .map(|_| Ok(DynamicImage::new_rgb8(8, 8)))
            .collect())
    }
}

#[derive(Default)]
struct CountingOcr {
    calls: AtomicUsize,
}

#[async_trait]
impl OcrEngine for CountingOcr {
    async fn recognize(&self, page_num: usize, _image: &DynamicImage) -> Result<String, PageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "HOUSE BILL 12 page {page_num}. AN ACT relating to public libraries; \
             amending the county funding formula. This act takes effect July 1, 2026."
        ))
    }
}

/// Summarizer that answers from a script and remembers what it was sent.
#[derive(Default)]
struct FakeSummarizer {
    calls: AtomicUsize,
    messages: Mutex<Vec<String>>,
    reject_key: bool,
}

impl FakeSummarizer {
    fn rejecting() -> Self {
        Self {
            reject_key: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    fn provider(&self) -> &str {
        "fake"
    }

    fn model_id(&self) -> &str {
        "fake-1"
    }

    async fn complete(&self, message: &str, _options: &GenerationOptions) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.messages.lock().unwrap().push(message.to_string());
        if self.reject_key {
            return Err(ProviderError::InvalidCredentials {
                provider: "openai".into(),
            });
        }
        Ok("This bill changes library funding.".into())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

struct Harness {
    pipeline: Pipeline,
    summarizer: Arc<FakeSummarizer>,
    ocr: Arc<CountingOcr>,
    store: Arc<dyn SummaryStore>,
}

fn harness_with(summarizer: FakeSummarizer, store: Arc<dyn SummaryStore>) -> Harness {
    let summarizer = Arc::new(summarizer);
    let ocr = Arc::new(CountingOcr::default());
    let pdf = PdfExtractor::new(Arc::new(ScannedOnly), Arc::new(BlankPages(1)), ocr.clone(), 2);
    let set = SummarizerSet::new().with(SummarizerKind::Gpt4Mini, summarizer.clone());
    let pipeline = Pipeline::new(PipelineConfig::default(), pdf, set, store.clone()).unwrap();
    Harness {
        pipeline,
        summarizer,
        ocr,
        store,
    }
}

fn harness() -> Harness {
    harness_with(FakeSummarizer::default(), Arc::new(MemorySummaryStore::new()))
}

fn bill_txt() -> Input {
    Input::upload(
        "hb12.txt",
        "HOUSE BILL 12\n\nAN ACT relating to public libraries; amending the county \
         funding formula; providing an effective date.\n\nSECTION 1. Each county shall \
         receive a base grant."
            .as_bytes()
            .to_vec(),
    )
}

fn request(input: Input, prompt: &str) -> SummaryRequest {
    SummaryRequest::new(input, SummarizerKind::Gpt4Mini, prompt, "user-1").display_name("Ada")
}

/// Serve a single HTTP response on a local port; returns the base URL.
async fn serve_once(status: u16, content_type: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !String::from_utf8_lossy(&buf).contains("\r\n\r\n") {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let reply = format!(
            "HTTP/1.1 {status} X\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(reply.as_bytes()).await.unwrap();
    });
    format!("http://{addr}")
}

// ── Dedup ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn repeat_request_is_served_from_the_store() {
    let h = harness();
    let req = request(bill_txt(), "Summarize for voters.");

    let first = h.pipeline.try_process(&req).await.unwrap();
    let second = h.pipeline.try_process(&req).await.unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.summary_id, second.summary_id);
    assert_eq!(first.summary, second.summary);
    assert_eq!(h.summarizer.calls(), 1);
}

#[tokio::test]
async fn changed_prompt_generates_a_new_summary() {
    let h = harness();

    let a = h
        .pipeline
        .try_process(&request(bill_txt(), "Summarize for voters."))
        .await
        .unwrap();
    let b = h
        .pipeline
        .try_process(&request(bill_txt(), "List the fiscal impacts."))
        .await
        .unwrap();

    assert_ne!(a.summary_id, b.summary_id);
    assert!(!b.cached);
    assert_eq!(h.summarizer.calls(), 2);
    let records = h
        .store
        .find("user-1", "hb12.txt", SummarizerKind::Gpt4Mini)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn users_do_not_share_cached_summaries() {
    let h = harness();
    let req = request(bill_txt(), "Summarize.");
    h.pipeline.try_process(&req).await.unwrap();

    let other = SummaryRequest::new(bill_txt(), SummarizerKind::Gpt4Mini, "Summarize.", "user-2");
    let resp = h.pipeline.try_process(&other).await.unwrap();
    assert!(!resp.cached);
    assert_eq!(h.summarizer.calls(), 2);
}

// ── Inputs ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn scanned_pdf_upload_goes_through_ocr() {
    let h = harness();
    let input = Input::upload("bill.pdf", b"%PDF-1.7 scanned".to_vec());

    let resp = h
        .pipeline
        .try_process(&request(input, "Summarize."))
        .await
        .unwrap();

    assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 1);
    assert_eq!(resp.input_data, "bill.pdf");
    assert!(resp.summary_id.starts_with("bill.pdf_"));
    assert!(resp
        .summary
        .ends_with("This measure has an effective date of: July 1, 2026"));
    let sent = h.summarizer.messages.lock().unwrap()[0].clone();
    assert!(sent.contains("HOUSE BILL 12 page 1"));

    let records = h
        .store
        .find("user-1", "bill.pdf", SummarizerKind::Gpt4Mini)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].summary_id, resp.summary_id);
    assert_eq!(records[0].display_name, "Ada");
}

#[tokio::test]
async fn scanned_pdf_extracts_as_pdf() {
    let h = harness();
    let extracted = h
        .pipeline
        .extract(&Input::upload("bill.pdf", b"%PDF-1.7 scanned".to_vec()))
        .await;
    assert_eq!(extracted.content_type(), ContentKind::Pdf);
    assert!(extracted.text().contains("HOUSE BILL 12 page 1"));
    assert_eq!(h.ocr.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn html_url_is_fetched_and_stripped() {
    let h = harness();
    let base = serve_once(
        200,
        "text/html; charset=utf-8",
        "<html><head><title>HB 12</title><style>body { color: red }</style>\
         <script>trackVisitor()</script></head><body><h1>HOUSE BILL 12</h1>\
         <p>AN ACT relating to public libraries; amending the county funding formula \
         and providing for a base grant to every county library district.</p></body></html>",
    )
    .await;
    let url = format!("{base}/bills/hb12");

    let resp = h
        .pipeline
        .try_process(&request(Input::url(url.clone()), "Summarize."))
        .await
        .unwrap();

    assert_eq!(resp.input_data, url);
    let sent = h.summarizer.messages.lock().unwrap()[0].clone();
    assert!(sent.contains("HOUSE BILL 12"));
    assert!(sent.contains("county library district"));
    assert!(!sent.contains("trackVisitor"));
    assert!(!sent.contains("color: red"));
}

#[tokio::test]
async fn http_error_becomes_an_error_outcome() {
    let h = harness();
    let base = serve_once(404, "text/html", "not found").await;

    let outcome = h
        .pipeline
        .process_input(&request(Input::url(format!("{base}/missing.pdf")), "Summarize."))
        .await;

    let error = outcome.error().expect("404 must fail");
    assert!(error.contains("404"), "got: {error}");
    assert_eq!(outcome.model(), SummarizerKind::Gpt4Mini);
    assert_eq!(h.summarizer.calls(), 0);
}

#[tokio::test]
async fn empty_prompt_is_rejected_before_fetching() {
    let h = harness();
    let outcome = h
        .pipeline
        .process_input(&request(Input::url("http://127.0.0.1:9/never-fetched.pdf"), "  "))
        .await;
    assert!(outcome.error().unwrap().contains("Please enter a prompt"));
}

// ── Providers ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_credentials_pass_through() {
    let h = harness_with(FakeSummarizer::rejecting(), Arc::new(MemorySummaryStore::new()));
    let req = request(bill_txt(), "Summarize.");

    let err = h.pipeline.try_process(&req).await.unwrap_err();
    assert!(err.is_invalid_credentials());

    let outcome = h.pipeline.process_input(&req).await;
    assert_eq!(outcome.error(), Some("Invalid openai API key provided."));
    assert!(h
        .store
        .find("user-1", "hb12.txt", SummarizerKind::Gpt4Mini)
        .await
        .unwrap()
        .is_empty());
}

// ── Feedback ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn feedback_is_recorded_on_sqlite_records() {
    let store = Arc::new(SqliteSummaryStore::in_memory().await.unwrap());
    let h = harness_with(FakeSummarizer::default(), store);
    let resp = h
        .pipeline
        .try_process(&request(bill_txt(), "Summarize."))
        .await
        .unwrap();

    h.pipeline
        .record_feedback(
            "user-1",
            &resp.summary_id,
            Feedback {
                rating: Rating::Dislike,
                comment: Some("missed section 4".into()),
            },
        )
        .await
        .unwrap();

    let stored = h.store.get("user-1", &resp.summary_id).await.unwrap().unwrap();
    let feedback = stored.feedback.unwrap();
    assert_eq!(feedback.rating, Rating::Dislike);
    assert_eq!(feedback.comment.as_deref(), Some("missed section 4"));

    let missing = h
        .pipeline
        .record_feedback(
            "user-1",
            "nope_1",
            Feedback {
                rating: Rating::Like,
                comment: None,
            },
        )
        .await;
    assert!(matches!(missing, Err(SummaryError::Store(_))));
}

// ── Live ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn live_openai_summary() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let summarizer = LlmSummarizer::for_kind(SummarizerKind::Gpt4Mini).expect("OPENAI_API_KEY");
    let pdf = PdfExtractor::new(
        Arc::new(ScannedOnly),
        Arc::new(BlankPages(0)),
        Arc::new(CountingOcr::default()),
        1,
    );
    let set = SummarizerSet::new().with(SummarizerKind::Gpt4Mini, Arc::new(summarizer));
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        pdf,
        set,
        Arc::new(MemorySummaryStore::new()),
    )
    .unwrap();

    let resp = pipeline
        .try_process(&request(bill_txt(), "Summarize this bill in one sentence."))
        .await
        .unwrap();
    println!("{}: {}", resp.summary_id, resp.summary);
    assert!(!resp.summary.trim().is_empty());
}
