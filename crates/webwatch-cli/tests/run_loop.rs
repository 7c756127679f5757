//! # Run Loop Tests
//!
//! Drives `observe_the_web` with scripted collaborators against a real
//! storage directory: first runs, unchanged pages, availability flips,
//! screenshot changes, and per-page failures.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use webwatch_cli::config::PageUnderObservation;
use webwatch_cli::fetch::{FetchedPage, PageFetcher};
use webwatch_cli::observe::Observer;
use webwatch_cli::screenshot::Screenshotter;
use webwatch_cli::watch::{observe_the_web, RunReport};
use webwatch_core::{Availability, Fields, Screenshot};
use webwatch_diff::{ChangeKind, Diffa};
use webwatch_store::Storage;

/// Answers each URL with a scripted availability and body.
#[derive(Default)]
struct ScriptedFetcher {
    pages: RefCell<HashMap<String, (Availability, Option<&'static [u8]>)>>,
}

impl ScriptedFetcher {
    fn set(&self, url: &str, availability: Availability, body: Option<&'static [u8]>) {
        self.pages
            .borrow_mut()
            .insert(url.to_string(), (availability, body));
    }
}

impl PageFetcher for &ScriptedFetcher {
    fn fetch(&self, url: &str, work_dir: &Path) -> anyhow::Result<FetchedPage> {
        let pages = self.pages.borrow();
        let (availability, body) = pages
            .get(url)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no script for {url}"))?;
        let body = body
            .map(|bytes| -> anyhow::Result<_> {
                let (_, path) = tempfile::Builder::new()
                    .prefix("content-")
                    .tempfile_in(work_dir)?
                    .keep()?;
                fs::write(&path, bytes)?;
                Ok(path)
            })
            .transpose()?;
        Ok(FetchedPage { availability, body })
    }
}

/// Writes the scripted pixels for each URL as its screenshot.
#[derive(Default)]
struct ScriptedScreens {
    pixels: RefCell<HashMap<String, &'static [u8]>>,
}

impl ScriptedScreens {
    fn set(&self, url: &str, pixels: &'static [u8]) {
        self.pixels.borrow_mut().insert(url.to_string(), pixels);
    }
}

impl Screenshotter for &ScriptedScreens {
    fn take_screenshot_of(&self, url: &str, work_dir: &Path) -> anyhow::Result<Option<Screenshot>> {
        let Some(pixels) = self.pixels.borrow().get(url).copied() else {
            return Ok(None);
        };
        let path = tempfile::Builder::new()
            .prefix("screenshot-")
            .suffix(".png")
            .tempfile_in(work_dir)?
            .into_temp_path()
            .keep()?;
        fs::write(&path, pixels)?;
        Ok(Some(Screenshot::from_file(path)?))
    }
}

fn page(name: &str, url: &str) -> PageUnderObservation {
    PageUnderObservation {
        name: name.to_string(),
        url: url.to_string(),
    }
}

fn rendered(report: &RunReport) -> String {
    let mut out = Vec::new();
    report.render(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

struct Harness {
    _dir: tempfile::TempDir,
    work: tempfile::TempDir,
    storage: Storage,
    fetcher: ScriptedFetcher,
    screens: ScriptedScreens,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path().join("storage")).unwrap();
        Self {
            work: tempfile::tempdir().unwrap(),
            _dir: dir,
            storage,
            fetcher: ScriptedFetcher::default(),
            screens: ScriptedScreens::default(),
        }
    }

    fn run(&self, pages: &[PageUnderObservation]) -> RunReport {
        let observer = Observer::new(&self.fetcher, &self.screens, self.work.path());
        observe_the_web(&Diffa::new(), &self.storage, &observer, pages)
    }
}

const A: &str = "https://a.example/";
const B: &str = "https://b.example/";

#[test]
fn first_run_reports_every_page() {
    let h = Harness::new();
    h.fetcher.set(A, Availability::Available, Some(b"<p>a</p>"));
    h.screens.set(A, b"a pixels");
    h.fetcher.set(B, Availability::Unavailable, None);

    let report = h.run(&[page("a", A), page("b", B)]);
    assert!(report.is_success());
    assert_eq!(report.diffs.len(), 2);
    assert_eq!(report.diffs[0].0, A);
    let kinds: Vec<ChangeKind> = report.diffs[0]
        .1
        .differences()
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(
        kinds,
        vec![ChangeKind::Availability, ChangeKind::Screenshot, ChangeKind::Content]
    );

    let text = rendered(&report);
    assert!(text.starts_with("Differences in https://a.example/\n\tavailability: available\n"));
    assert!(text.contains("Differences in https://b.example/\n\tavailability: unavailable\n"));
    assert!(!text.contains("Errors:"));

    assert_eq!(h.storage.find(Fields::new()).fetch().unwrap().len(), 2);
}

#[test]
fn unchanged_page_reports_nothing_but_is_stored() {
    let h = Harness::new();
    h.fetcher.set(A, Availability::Available, Some(b"same"));
    h.screens.set(A, b"same pixels");

    h.run(&[page("a", A)]);
    let second = h.run(&[page("a", A)]);
    assert!(second.is_success());
    assert!(second.diffs.is_empty());
    assert_eq!(rendered(&second), "");

    let records = h.storage.observations_of(A).fetch().unwrap();
    assert_eq!(records.len(), 2);
    // Both bodies and both screenshots deduplicate to one artefact each.
    assert_eq!(
        fs::read_dir(h.storage.artefacts().dir()).unwrap().count(),
        2
    );
}

#[test]
fn availability_flip_is_reported() {
    let h = Harness::new();
    h.fetcher.set(A, Availability::Available, Some(b"up"));
    h.run(&[page("a", A)]);

    h.fetcher.set(A, Availability::Unavailable, None);
    let report = h.run(&[page("a", A)]);
    assert_eq!(
        rendered(&report),
        "Differences in https://a.example/\n\tavailability: unavailable\n"
    );
}

#[test]
fn screenshot_change_is_reported() {
    let h = Harness::new();
    h.fetcher.set(A, Availability::Available, None);
    h.screens.set(A, b"before");
    h.run(&[page("a", A)]);

    h.screens.set(A, b"after");
    let report = h.run(&[page("a", A)]);
    let diff = &report.diffs[0].1;
    assert!(diff.availability.is_none());
    let screenshot = diff.screenshot.as_ref().unwrap();
    assert_eq!(
        screenshot.old,
        Some(webwatch_core::digest_bytes(b"before"))
    );
    assert_eq!(screenshot.new, Some(webwatch_core::digest_bytes(b"after")));
}

#[test]
fn failing_page_does_not_stop_others() {
    let h = Harness::new();
    h.fetcher.set(B, Availability::Available, None);

    let report = h.run(&[page("a", A), page("b", B)]);
    assert!(!report.is_success());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, A);
    assert_eq!(report.diffs.len(), 1);
    assert_eq!(report.diffs[0].0, B);

    let text = rendered(&report);
    let errors_at = text.find("Errors:\n").unwrap();
    assert!(text.find("Differences in https://b.example/").unwrap() < errors_at);
    assert!(text[errors_at..].contains("While inspecting https://a.example/\n\t"));
    assert!(text.contains("no script for https://a.example/"));

    // Nothing stored for the failed page.
    assert!(h.storage.observations_of(A).fetch().unwrap().is_empty());
    assert_eq!(h.storage.observations_of(B).fetch().unwrap().len(), 1);
}

#[test]
fn change_is_reported_even_when_storing_fails() {
    let h = Harness::new();
    h.fetcher.set(A, Availability::Available, Some(b"up"));
    h.run(&[page("a", A)]);

    // Artefacts can no longer be written, but the log is still readable.
    let artefacts = h.storage.artefacts().dir().to_path_buf();
    fs::remove_dir_all(&artefacts).unwrap();
    fs::write(&artefacts, b"not a directory").unwrap();

    h.fetcher.set(A, Availability::Unavailable, Some(b"down"));
    let report = h.run(&[page("a", A)]);
    assert_eq!(report.diffs.len(), 1);
    assert_eq!(report.diffs[0].1.availability, Some(Availability::Unavailable));
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, A);

    let text = rendered(&report);
    assert!(text.starts_with("Differences in https://a.example/\n\tavailability: unavailable\n"));
    assert!(text.contains("Errors:\nWhile inspecting https://a.example/\n\tstoring observation: "));
    assert_eq!(h.storage.observations_of(A).fetch().unwrap().len(), 1);
}

#[test]
fn unreadable_newer_record_falls_back_to_older_observation() {
    let h = Harness::new();
    h.fetcher.set(A, Availability::Available, None);
    h.run(&[page("a", A)]);

    let log = h.storage.log().path().to_path_buf();
    let mut text = fs::read_to_string(&log).unwrap();
    text.push_str(
        "{\"type\": \"observation\", \"url\": \"https://a.example/\", \
         \"timestamp\": {\"__date\": \"2099-01-01 00:00:00.000000+0000\"}, \
         \"was_available\": \"maybe\"}\n",
    );
    fs::write(&log, text).unwrap();

    let report = h.run(&[page("a", A)]);
    assert!(report.is_success());
    assert!(report.diffs.is_empty());
}
