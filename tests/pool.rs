use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use latex_report::model::Plot;
use latex_report::pool::{self, FailurePolicy, PoolConfig, PoolError, ReportServer};
use latex_report::render::{RenderError, RenderOutput};
use latex_report::Report;

fn finalized(name: &str) -> Report {
    let mut report = Report::new(name);
    report
        .add_plot(&Plot::new(format!("{name}.png"), name))
        .expect("plot appended");
    report.finalize().expect("finalize once");
    report
}

fn output_for(report: &Report) -> RenderOutput {
    RenderOutput {
        report: report.name().to_owned(),
        tex: report.tex_path(),
        pdf: report.pdf_path(),
        png: None,
    }
}

/// Renderer that records which reports it saw and on which thread.
#[derive(Clone, Default)]
struct Recorder {
    rendered: Arc<Mutex<Vec<String>>>,
    threads: Arc<Mutex<HashSet<String>>>,
}

impl Recorder {
    fn renderer(&self) -> impl Fn(&Report) -> Result<RenderOutput, RenderError> + Send + Sync {
        let rendered = Arc::clone(&self.rendered);
        let threads = Arc::clone(&self.threads);
        move |report: &Report| {
            thread::sleep(Duration::from_millis(2));
            rendered.lock().unwrap().push(report.name().to_owned());
            if let Some(name) = thread::current().name() {
                threads.lock().unwrap().insert(name.to_owned());
            }
            Ok(output_for(report))
        }
    }
}

#[test]
fn every_report_is_rendered_exactly_once() {
    let k = 12;
    for workers in 1..=k {
        let recorder = Recorder::default();
        let reports = (0..k).map(|i| finalized(&format!("r{i}")));

        let summary = pool::render_all(PoolConfig::new(workers), recorder.renderer(), reports)
            .expect("pool drains");

        let mut rendered = recorder.rendered.lock().unwrap().clone();
        rendered.sort();
        let mut expected: Vec<String> = (0..k).map(|i| format!("r{i}")).collect();
        expected.sort();

        assert_eq!(rendered, expected, "workers = {workers}");
        assert_eq!(summary.submitted, k);
        assert_eq!(summary.rendered(), k);
        assert_eq!(summary.outputs.len(), k);
        assert!(summary.failures.is_empty());
    }
}

#[test]
fn one_shutdown_and_one_completion_per_worker() {
    for workers in [1, 2, 5] {
        let recorder = Recorder::default();
        let reports = (0..6).map(|i| finalized(&format!("doc{i}")));
        let summary = pool::render_all(PoolConfig::new(workers), recorder.renderer(), reports)
            .expect("pool drains");

        assert_eq!(summary.workers, workers);
        assert_eq!(summary.shutdown_signals, workers);
        assert_eq!(summary.completions.len(), workers);

        let ids: HashSet<usize> = summary.completions.iter().map(|c| c.worker).collect();
        assert_eq!(ids, (0..workers).collect::<HashSet<_>>());
    }
}

#[test]
fn empty_batch_still_drains_every_worker() {
    let recorder = Recorder::default();
    let summary = pool::render_all(PoolConfig::new(3), recorder.renderer(), Vec::new())
        .expect("pool drains");

    assert_eq!(summary.submitted, 0);
    assert_eq!(summary.shutdown_signals, 3);
    assert_eq!(summary.completions.len(), 3);
    assert!(recorder.rendered.lock().unwrap().is_empty());
}

#[test]
fn work_runs_on_named_worker_threads() {
    let recorder = Recorder::default();
    let reports = (0..4).map(|i| finalized(&format!("t{i}")));
    pool::render_all(PoolConfig::new(2), recorder.renderer(), reports).expect("pool drains");

    let threads = recorder.threads.lock().unwrap();
    assert!(!threads.is_empty());
    assert!(threads.iter().all(|name| name.starts_with("report-worker-")));
}

#[test]
fn zero_workers_is_rejected() {
    let recorder = Recorder::default();
    assert!(matches!(
        ReportServer::start(PoolConfig::new(0), recorder.renderer()),
        Err(PoolError::NoWorkers)
    ));
}

#[test]
fn unfinalized_reports_are_refused() {
    let recorder = Recorder::default();
    let server = ReportServer::start(PoolConfig::new(1), recorder.renderer()).expect("pool starts");

    assert!(matches!(
        server.submit(Report::new("draft")),
        Err(PoolError::NotFinalized(name)) if name == "draft"
    ));

    let summary = server.finish().expect("pool drains");
    assert_eq!(summary.submitted, 0);
}

fn failing_on(
    bad: &'static str,
    calls: Arc<AtomicUsize>,
) -> impl Fn(&Report) -> Result<RenderOutput, RenderError> + Send + Sync {
    move |report: &Report| {
        calls.fetch_add(1, Ordering::SeqCst);
        if report.name() == bad {
            Err(RenderError::Typesetting {
                report: report.name().to_owned(),
                output: "! Emergency stop.".to_owned(),
            })
        } else {
            Ok(output_for(report))
        }
    }
}

#[test]
fn isolated_failures_are_collected() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = PoolConfig::new(2).with_failure_policy(FailurePolicy::Isolate);
    let reports = ["a", "b", "bad", "c", "d"].map(finalized);

    let summary = pool::render_all(config, failing_on("bad", Arc::clone(&calls)), reports)
        .expect("isolated failures do not abort the pool");

    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(summary.rendered(), 4);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].report, "bad");
    assert_eq!(summary.completions.len(), 2);
}

#[test]
fn first_failure_aborts_the_batch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = ReportServer::start(PoolConfig::new(1), failing_on("bad", Arc::clone(&calls)))
        .expect("pool starts");

    server.submit(finalized("bad")).expect("submitted");
    for i in 0..5 {
        server.submit(finalized(&format!("after{i}"))).expect("submitted");
    }

    match server.finish() {
        Err(PoolError::JobFailed { report, source }) => {
            assert_eq!(report, "bad");
            assert!(matches!(source, RenderError::Typesetting { .. }));
        }
        other => panic!("expected the batch to abort, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1, "queued reports are skipped");
}

#[test]
fn outputs_point_at_report_files() {
    let recorder = Recorder::default();
    let report = finalized("single").with_output_dir("out");
    let summary = pool::render_all(PoolConfig::default(), recorder.renderer(), [report])
        .expect("pool drains");

    assert_eq!(summary.outputs[0].pdf, PathBuf::from("out").join("single.pdf"));
}
