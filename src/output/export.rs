//! Corpus export
//!
//! Dumps the latest stored version of every URL as a plain-text file under
//! `<out_dir>/docs/`, with one metadata TSV tying the files back to their
//! URLs. Text extraction drops script/style subtrees and collapses
//! whitespace; documents that come out empty are counted and skipped.
//! Optionally the raw HTML is kept alongside, gzipped, under
//! `<out_dir>/raw/`, and an optional `max_docs` cap bounds the dump size.

use crate::config::ExportConfig;
use crate::crawler::sha256_hex;
use crate::storage::Store;
use flate2::write::GzEncoder;
use flate2::Compression;
use ego_tree::iter::Edge;
use scraper::{Html, Node, Selector};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Counters from one export run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Text files written
    pub docs_written: u64,
    /// Documents with no extractable text
    pub skipped_empty: u64,
}

/// Exports the latest document versions to `cfg.out_dir`
///
/// File names are the SHA-256 of the document URL, so re-running the export
/// overwrites in place. Documents stream out of the store one row at a time,
/// so the corpus never sits in memory at once. The metadata TSV is written
/// to a temp file and renamed so a reader never sees it half-written.
///
/// When `cfg.max_docs` is set, the export stops after writing that many
/// documents. Documents skipped for having no text do not count against the
/// cap.
///
/// # Arguments
///
/// * `store` - The crawl store to export from
/// * `cfg` - Output directory, raw-HTML toggle, and optional document cap
///
/// # Returns
///
/// * `Ok(ExportReport)` - Export finished
/// * `Err(PapermillError)` - A query or file write failed
pub fn export_corpus(store: &Store, cfg: &ExportConfig) -> crate::Result<ExportReport> {
    let out_dir = Path::new(&cfg.out_dir);
    let docs_dir = out_dir.join("docs");
    fs::create_dir_all(&docs_dir)?;

    let raw_dir = out_dir.join("raw");
    if cfg.with_raw_html {
        fs::create_dir_all(&raw_dir)?;
    }

    tracing::info!("Exporting corpus to {}", out_dir.display());

    let meta_tmp = out_dir.join("meta.tsv.tmp");
    let mut meta = BufWriter::new(fs::File::create(&meta_tmp)?);
    meta.write_all(b"doc_id\turl\tsource\tcrawl_ts\ttitle\ttext_len\n")?;

    let mut report = ExportReport::default();

    store.for_each_latest_doc(|doc| {
        let document = Html::parse_document(&doc.raw_html);
        let text = document_text(&document);
        if text.is_empty() {
            report.skipped_empty += 1;
            return Ok(true);
        }

        let doc_id = sha256_hex(&doc.url);
        fs::write(docs_dir.join(format!("{}.txt", doc_id)), &text)?;

        if cfg.with_raw_html {
            write_raw_html(&raw_dir, &doc_id, &doc.raw_html)?;
        }

        let title = document_title(&document).unwrap_or_default();
        writeln!(
            meta,
            "{}\t{}\t{}\t{}\t{}\t{}",
            doc_id,
            doc.url,
            doc.source,
            doc.crawl_ts,
            tsv_field(&title),
            text.len()
        )?;
        report.docs_written += 1;

        if let Some(max) = cfg.max_docs {
            if report.docs_written >= max {
                tracing::info!("Stopping at export.max_docs = {}", max);
                return Ok(false);
            }
        }
        Ok(true)
    })?;

    meta.flush()?;
    drop(meta);
    fs::rename(&meta_tmp, out_dir.join("meta.tsv"))?;

    tracing::info!(
        "Export complete: {} written, {} skipped with no text",
        report.docs_written,
        report.skipped_empty
    );
    Ok(report)
}

/// All visible text of the document, whitespace-collapsed
fn document_text(document: &Html) -> String {
    let mut raw = String::new();
    let mut skip_depth = 0usize;

    for edge in document.root_element().traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Element(element) if is_skipped_tag(element.name()) => skip_depth += 1,
                Node::Text(text) if skip_depth == 0 => {
                    raw.push_str(text);
                    raw.push(' ');
                }
                _ => {}
            },
            Edge::Close(node) => {
                if let Node::Element(element) = node.value() {
                    if is_skipped_tag(element.name()) {
                        skip_depth -= 1;
                    }
                }
            }
        }
    }

    collapse_whitespace(&raw)
}

fn is_skipped_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "noscript" | "template" | "svg")
}

/// The document title, if there is a non-empty one
fn document_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

fn collapse_whitespace(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf.trim_end().to_string()
}

/// Keeps a value from breaking the TSV layout
fn tsv_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

fn write_raw_html(raw_dir: &Path, doc_id: &str, html: &str) -> crate::Result<()> {
    let file = fs::File::create(raw_dir.join(format!("{}.html.gz", doc_id)))?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(html.as_bytes())?;
    encoder.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn text_of(html: &str) -> String {
        document_text(&Html::parse_document(html))
    }

    #[test]
    fn test_document_text_collapses_whitespace() {
        let html = "<html><body><h1>A   Title</h1>\n\n  <p>Some\ttext.</p></body></html>";
        assert_eq!(text_of(html), "A Title Some text.");
    }

    #[test]
    fn test_document_text_drops_script_and_style() {
        let html = concat!(
            "<html><head><style>body { color: red }</style></head>",
            "<body><p>Kept.</p><script>var hidden = 1;</script>",
            "<noscript>also hidden</noscript></body></html>",
        );
        assert_eq!(text_of(html), "Kept.");
    }

    #[test]
    fn test_document_text_keeps_nested_markup() {
        let html = "<body><div>Authors: <span>A, <em>B</em></span> and C</div></body>";
        assert_eq!(text_of(html), "Authors: A, B and C");
    }

    #[test]
    fn test_document_text_empty_for_markup_only_pages() {
        assert_eq!(text_of("<html><body><script>x()</script></body></html>"), "");
    }

    #[test]
    fn test_document_title() {
        let document = Html::parse_document("<head><title> A Paper </title></head>");
        assert_eq!(document_title(&document).as_deref(), Some("A Paper"));

        let untitled = Html::parse_document("<head><title>  </title></head>");
        assert_eq!(document_title(&untitled), None);
    }

    #[test]
    fn test_tsv_field_strips_separators() {
        assert_eq!(tsv_field("a\tb\nc\rd"), "a b c d");
    }

    #[test]
    fn test_export_writes_latest_versions_and_meta() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::new_in_memory().unwrap();

        store
            .insert_doc(
                "https://example.com/a",
                "<html><title>Old</title><body>old text</body></html>",
                "arxiv",
                100,
            )
            .unwrap();
        store
            .insert_doc(
                "https://example.com/a",
                "<html><title>New</title><body>new text</body></html>",
                "arxiv",
                200,
            )
            .unwrap();
        store
            .insert_doc(
                "https://example.com/b",
                "<html><title>B</title><body>b text</body></html>",
                "acl-anthology",
                150,
            )
            .unwrap();

        let cfg = ExportConfig {
            out_dir: dir.path().to_str().unwrap().to_string(),
            with_raw_html: false,
            max_docs: None,
        };
        let report = export_corpus(&store, &cfg).unwrap();

        assert_eq!(report.docs_written, 2);
        assert_eq!(report.skipped_empty, 0);

        let a_id = sha256_hex("https://example.com/a");
        let a_text = fs::read_to_string(dir.path().join("docs").join(format!("{}.txt", a_id)))
            .unwrap();
        assert_eq!(a_text, "New new text");

        let meta = fs::read_to_string(dir.path().join("meta.tsv")).unwrap();
        let lines: Vec<&str> = meta.lines().collect();
        assert_eq!(lines[0], "doc_id\turl\tsource\tcrawl_ts\ttitle\ttext_len");
        assert_eq!(lines.len(), 3);
        assert!(meta.contains("https://example.com/a\tarxiv\t200\tNew"));
        assert!(meta.contains("https://example.com/b\tacl-anthology\t150\tB"));
        assert!(!dir.path().join("raw").exists());
        assert!(!dir.path().join("meta.tsv.tmp").exists());
    }

    #[test]
    fn test_export_skips_documents_without_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::new_in_memory().unwrap();

        store
            .insert_doc(
                "https://example.com/empty",
                "<html><body><script>nothing()</script></body></html>",
                "arxiv",
                100,
            )
            .unwrap();

        let cfg = ExportConfig {
            out_dir: dir.path().to_str().unwrap().to_string(),
            with_raw_html: false,
            max_docs: None,
        };
        let report = export_corpus(&store, &cfg).unwrap();

        assert_eq!(report.docs_written, 0);
        assert_eq!(report.skipped_empty, 1);

        let meta = fs::read_to_string(dir.path().join("meta.tsv")).unwrap();
        assert_eq!(meta.lines().count(), 1);
    }

    #[test]
    fn test_export_stops_at_max_docs() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::new_in_memory().unwrap();

        // The empty document sorts first and must not consume the cap
        store
            .insert_doc(
                "https://example.com/a",
                "<html><body><script>nothing()</script></body></html>",
                "arxiv",
                100,
            )
            .unwrap();
        for name in ["b", "c", "d"] {
            store
                .insert_doc(
                    &format!("https://example.com/{}", name),
                    &format!("<html><title>{0}</title><body>{0} text</body></html>", name),
                    "arxiv",
                    100,
                )
                .unwrap();
        }

        let cfg = ExportConfig {
            out_dir: dir.path().to_str().unwrap().to_string(),
            with_raw_html: false,
            max_docs: Some(2),
        };
        let report = export_corpus(&store, &cfg).unwrap();

        assert_eq!(report.docs_written, 2);
        assert_eq!(report.skipped_empty, 1);

        // Rows stream in URL order, so the cap keeps b and c and cuts d
        let docs_dir = dir.path().join("docs");
        for name in ["b", "c"] {
            let doc_id = sha256_hex(&format!("https://example.com/{}", name));
            assert!(docs_dir.join(format!("{}.txt", doc_id)).exists());
        }
        let d_id = sha256_hex("https://example.com/d");
        assert!(!docs_dir.join(format!("{}.txt", d_id)).exists());

        let meta = fs::read_to_string(dir.path().join("meta.tsv")).unwrap();
        assert_eq!(meta.lines().count(), 3);
    }

    #[test]
    fn test_export_with_raw_html_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::new_in_memory().unwrap();

        let html = "<html><title>T</title><body>content</body></html>";
        store
            .insert_doc("https://example.com/a", html, "arxiv", 100)
            .unwrap();

        let cfg = ExportConfig {
            out_dir: dir.path().to_str().unwrap().to_string(),
            with_raw_html: true,
            max_docs: None,
        };
        export_corpus(&store, &cfg).unwrap();

        let doc_id = sha256_hex("https://example.com/a");
        let gz = fs::File::open(dir.path().join("raw").join(format!("{}.html.gz", doc_id)))
            .unwrap();
        let mut decoded = String::new();
        GzDecoder::new(gz).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, html);
    }
}
